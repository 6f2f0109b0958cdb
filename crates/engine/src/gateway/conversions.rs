//! Wire format types for the cart REST API and their conversion to core types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use cart_sync_core::{
    Cart, DiscountPercent, LineItem, LineItemId, Product, ProductId, ProductRef,
};

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Serialize)]
pub(super) struct AddItemRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
pub(super) struct SetQuantityRequest {
    pub quantity: u32,
}

// =============================================================================
// Responses
// =============================================================================

#[derive(Debug, Deserialize)]
pub(super) struct CartResponse {
    #[serde(default)]
    pub items: Vec<CartLineDto>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CartLineDto {
    pub id: LineItemId,
    pub product_id: ProductId,
    /// `null` when the product was deleted after the line was added.
    #[serde(default)]
    pub product: Option<ProductDto>,
    pub quantity: u32,
    pub price: Decimal,
}

#[derive(Debug, Deserialize)]
pub(super) struct ProductDto {
    pub id: ProductId,
    #[serde(default)]
    pub title: String,
    pub price: Decimal,
    #[serde(default)]
    pub discount: Option<Decimal>,
    #[serde(default)]
    pub stock: Option<u32>,
    #[serde(default)]
    pub image: Option<String>,
}

/// Error payload returned with non-success statuses.
#[derive(Debug, Deserialize)]
pub(super) struct ErrorBody {
    #[serde(alias = "message")]
    pub error: String,
}

// =============================================================================
// Conversions
// =============================================================================

pub(super) fn convert_cart(response: CartResponse) -> Cart {
    Cart::from_lines(response.items.into_iter().map(convert_line))
}

fn convert_line(line: CartLineDto) -> LineItem {
    LineItem {
        item_id: Some(line.id),
        product: ProductRef::Referenced {
            id: line.product_id,
            product: line.product.map(convert_product),
        },
        quantity: line.quantity,
        unit_price: line.price,
    }
}

fn convert_product(product: ProductDto) -> Product {
    let discount = product.discount.map_or(DiscountPercent::NONE, |percent| {
        DiscountPercent::new(percent).unwrap_or_else(|e| {
            warn!(product_id = %product.id, error = %e, "Ignoring invalid product discount");
            DiscountPercent::NONE
        })
    });

    Product {
        id: product.id,
        title: product.title,
        price: product.price,
        discount,
        stock: product.stock.unwrap_or(0),
        image: product.image,
    }
}
