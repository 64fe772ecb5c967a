//! SMM Storefront Server
//!
//! Checkout backend for a social media marketing reseller: catalog, priced
//! orders, coupons, PIX/card payments and order notifications.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::{ConfigLoader, get_database_url};
use server::{build_router, run_server};
use shutdown::spawn_config_reload_handler;
use smm_core::config::ConfigStore;
use smm_core::events::{EventSenders, charge_created_channel, order_event_channel};
use smm_core::framework::DatabaseProcessor;
use smm_core::gateway::{PaymentGateway, SandboxGateway};
use smm_core::processors::{NotificationSender, PaymentSync};
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// SMM Storefront - checkout backend for a social media marketing reseller
#[derive(Parser, Debug)]
#[command(name = "smm-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./smm-config.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();

    tracing::info!("Starting smm-server v{}", env!("CARGO_PKG_VERSION"));

    let config_loader = Arc::new(ConfigLoader::new(&args.config, args.listen));
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    let listen_addr = loaded_config.listen;
    tracing::info!("Configuration loaded from {:?}", args.config);

    let database_url = get_database_url().map_err(|e| {
        tracing::error!("DATABASE_URL environment variable not set");
        e
    })?;

    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    if args.migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&db_pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                e
            })?;
        tracing::info!("Migrations completed successfully");
    }

    let settings = ConfigStore::new(loaded_config.store);
    let gateway: Arc<dyn PaymentGateway> = Arc::new(SandboxGateway::new(Duration::from_secs(
        loaded_config.gateway.sandbox_approve_after_secs,
    )));
    tracing::info!(
        approve_after_secs = loaded_config.gateway.sandbox_approve_after_secs,
        "Using sandbox payment gateway"
    );

    // Background processors
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (order_tx, order_rx) = order_event_channel();
    let (charge_tx, charge_rx) = charge_created_channel();
    let processor = DatabaseProcessor::new(db_pool.clone());

    let notification_sender =
        NotificationSender::new(processor.clone(), settings.clone(), order_rx, shutdown_rx.clone());
    let notification_handle = tokio::spawn(notification_sender.run());

    let payment_sync = PaymentSync::new(processor, gateway.clone(), order_tx.clone());
    let sync_handle = tokio::spawn(payment_sync.run(shutdown_rx, charge_rx));

    let state = AppState::new(
        db_pool.clone(),
        settings.clone(),
        gateway,
        EventSenders::new(order_tx, charge_tx),
    );

    // Spawn config reload handler (listens for SIGHUP)
    let reload_notify = spawn_config_reload_handler(settings, config_loader);

    let router = build_router(state);

    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr).await;

    reload_notify.notify_one();
    let _ = shutdown_tx.send(true);
    for (name, handle) in [("NotificationSender", notification_handle), ("PaymentSync", sync_handle)] {
        if let Err(e) = handle.await {
            tracing::error!(processor = name, error = %e, "Processor task failed");
        }
    }

    tracing::info!("Closing database connections...");
    db_pool.close().await;
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,tower_http=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
