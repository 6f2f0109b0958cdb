//! Read-only product catalog access.
//!
//! The cart reads product identity, price, discount and stock from the
//! catalog but never mutates it. [`CachedCatalog`] wraps any catalog with a
//! `moka` cache (5 minute TTL) so repeated lookups while a shopper browses
//! don't hit the backing source.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use thiserror::Error;
use tracing::{debug, instrument};

use cart_sync_core::{Product, ProductId};

/// Errors looking up products.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The backing catalog could not be reached.
    #[error("Catalog unavailable: {0}")]
    Unavailable(String),
}

/// Source of product data.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Look up a product, returning `None` if it does not exist.
    async fn product(&self, id: ProductId) -> Result<Option<Product>, CatalogError>;
}

/// Catalog backed by a fixed list of products.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    products: HashMap<ProductId, Product>,
}

impl StaticCatalog {
    #[must_use]
    pub fn new(products: impl IntoIterator<Item = Product>) -> Self {
        Self {
            products: products.into_iter().map(|p| (p.id, p)).collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.products.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

#[async_trait]
impl ProductCatalog for StaticCatalog {
    async fn product(&self, id: ProductId) -> Result<Option<Product>, CatalogError> {
        Ok(self.products.get(&id).cloned())
    }
}

/// Caching decorator for any [`ProductCatalog`].
///
/// Only found products are cached; misses are looked up again next time.
#[derive(Debug)]
pub struct CachedCatalog<C> {
    inner: C,
    cache: Cache<ProductId, Product>,
}

impl<C: ProductCatalog> CachedCatalog<C> {
    /// Wrap a catalog with the default cache (1000 entries, 5 minute TTL).
    #[must_use]
    pub fn new(inner: C) -> Self {
        Self::with_ttl(inner, Duration::from_secs(300))
    }

    #[must_use]
    pub fn with_ttl(inner: C, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(ttl)
            .build();
        Self { inner, cache }
    }

    /// Drop every cached product.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}

#[async_trait]
impl<C: ProductCatalog> ProductCatalog for CachedCatalog<C> {
    #[instrument(skip(self), fields(product_id = %id))]
    async fn product(&self, id: ProductId) -> Result<Option<Product>, CatalogError> {
        if let Some(product) = self.cache.get(&id).await {
            debug!("Cache hit for product");
            return Ok(Some(product));
        }

        let product = self.inner.product(id).await?;
        if let Some(product) = &product {
            self.cache.insert(id, product.clone()).await;
        }
        Ok(product)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rust_decimal::Decimal;

    use super::*;

    /// Counts lookups that reach the backing catalog.
    struct CountingCatalog {
        inner: StaticCatalog,
        lookups: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ProductCatalog for CountingCatalog {
        async fn product(&self, id: ProductId) -> Result<Option<Product>, CatalogError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.product(id).await
        }
    }

    fn tee() -> Product {
        Product::new(ProductId::new(1), "Tee", Decimal::from(20))
    }

    #[tokio::test]
    async fn test_static_catalog_lookup() {
        let catalog = StaticCatalog::new(vec![tee()]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.product(ProductId::new(1)).await.unwrap(), Some(tee()));
        assert_eq!(catalog.product(ProductId::new(2)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cached_catalog_hits_backend_once() {
        let lookups = Arc::new(AtomicUsize::new(0));
        let catalog = CachedCatalog::new(CountingCatalog {
            inner: StaticCatalog::new(vec![tee()]),
            lookups: Arc::clone(&lookups),
        });

        for _ in 0..3 {
            assert!(catalog.product(ProductId::new(1)).await.unwrap().is_some());
        }
        assert_eq!(lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cached_catalog_does_not_cache_misses() {
        let lookups = Arc::new(AtomicUsize::new(0));
        let catalog = CachedCatalog::new(CountingCatalog {
            inner: StaticCatalog::default(),
            lookups: Arc::clone(&lookups),
        });

        assert!(catalog.product(ProductId::new(7)).await.unwrap().is_none());
        assert!(catalog.product(ProductId::new(7)).await.unwrap().is_none());
        assert_eq!(lookups.load(Ordering::SeqCst), 2);
    }
}
