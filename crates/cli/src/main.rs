//! cartctl - inspect and edit a cart from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Show lines and totals of the guest cart saved on this machine
//! cartctl show
//!
//! # Add two units of product 7 from the catalog
//! cartctl --catalog demos/catalog.yaml add 7 -q 2
//!
//! # Change or remove a line
//! cartctl set product:7 5
//! cartctl remove product:7
//!
//! # Sign in and replace the cart with the server cart
//! cartctl login
//! ```
//!
//! # Commands
//!
//! - `show` - Print cart lines and totals
//! - `add` - Add a catalog product
//! - `set` - Set a line's quantity (0 or less removes it)
//! - `remove` - Remove a line
//! - `clear` - Empty the cart
//! - `login` - Reconcile with the server cart
//!
//! Passing `--signed-in` runs any command against the server cart instead of
//! the guest cart. Gateway and pricing settings come from the environment
//! (see `cart_sync::config`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cart_sync::config::EngineConfig;
use cart_sync_core::{ItemKey, ProductId};

mod commands;

#[derive(Parser)]
#[command(name = "cartctl")]
#[command(author, version, about = "Cart inspection and editing tools")]
struct Cli {
    /// Product catalog: a YAML list of products
    #[arg(long, global = true, default_value = "catalog.yaml")]
    catalog: PathBuf,

    /// Act on the signed-in shopper's server cart
    #[arg(long, global = true)]
    signed_in: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print cart lines and totals
    Show,
    /// Add a product from the catalog
    Add {
        /// Catalog product id
        product_id: ProductId,

        /// Units to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Set a line's quantity; 0 or less removes the line
    Set {
        /// Line key (`product:<id>`, `line:<id>`, or a bare product id)
        key: ItemKey,

        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Remove a line
    Remove {
        /// Line key (`product:<id>`, `line:<id>`, or a bare product id)
        key: ItemKey,
    },
    /// Empty the cart without touching the server cart
    Clear,
    /// Sign in and replace the cart with the server cart
    Login,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &EngineConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load configuration from environment (needed for Sentry init)
    let config = EngineConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cartctl=info,cart_sync=warn".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().without_time().with_target(false))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli, config).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: EngineConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = commands::cart::open_store(&config);
    if cli.signed_in || matches!(cli.command, Commands::Login) {
        commands::cart::sign_in(&store).await?;
    }

    match cli.command {
        Commands::Show | Commands::Login => {}
        Commands::Add {
            product_id,
            quantity,
        } => {
            let catalog = commands::catalog::load(&cli.catalog).await?;
            store.add_product(&catalog, product_id, quantity).await?;
        }
        Commands::Set { key, quantity } => store.set_quantity(key, quantity).await?,
        Commands::Remove { key } => store.remove_item(key).await?,
        Commands::Clear => store.clear()?,
    }

    commands::cart::show(&store);
    Ok(())
}
