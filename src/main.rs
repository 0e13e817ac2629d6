//! Storefront Orders - cart and order service

use std::sync::Arc;

use anyhow::{Context, Result};
use storefront_orders::http::{self, AppState};
use storefront_orders::messaging::{EventPublisher, NatsPublisher, NoopPublisher};
use storefront_orders::services::{spawn_expiry_sweeper, CartService, OrderWorkflow};
use storefront_orders::store::{postgres, PgCartStore, PgOrderStore};
use storefront_orders::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();

    let config = Arc::new(Config::from_env()?);
    let db = postgres::connect(&config.database_url, config.database_max_connections).await.context("connecting to database")?;

    let events: Arc<dyn EventPublisher> = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Arc::new(NatsPublisher::new(client)),
            Err(err) => {
                tracing::warn!(error = %err, "NATS unavailable, events will be dropped");
                Arc::new(NoopPublisher)
            }
        },
        None => Arc::new(NoopPublisher),
    };

    let cart_store = Arc::new(PgCartStore::new(db.clone(), config.cart_ttl));
    let order_store = Arc::new(PgOrderStore::new(db));
    let carts = Arc::new(CartService::new(cart_store.clone(), events.clone(), config.tax_rate));
    let orders = Arc::new(OrderWorkflow::new(cart_store, order_store, events, config.tax_rate));

    let sweeper = spawn_expiry_sweeper(carts.clone(), config.cart_sweep_interval);
    let app = http::router(AppState { carts, orders, config: config.clone() });

    let addr = config.socket_addr();
    tracing::info!("🚀 Storefront Orders listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(&addr).await?, app).with_graceful_shutdown(shutdown_signal()).await?;

    sweeper.abort();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
