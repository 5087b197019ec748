//! API server entry point.

use api::config::Config;
use common::Money;
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::{InMemoryOrderStore, OrderStore, PostgresOrderStore};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Products loaded into the in-memory store so a local server is usable
/// without a database.
const DEMO_PRODUCTS: &[(&str, i64, i64)] = &[
    ("Espresso beans 1kg", 40, 2_450),
    ("Paper filters x100", 120, 399),
    ("Ceramic mug", 25, 1_200),
];

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

async fn serve<S: OrderStore + 'static>(
    store: S,
    config: &Config,
    metrics_handle: PrometheusHandle,
) {
    let app = api::create_app(api::create_state(store), metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Pick the store and serve
    match config.database_url.clone() {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(&url)
                .await
                .expect("failed to connect to PostgreSQL");
            let store = PostgresOrderStore::new(pool);
            store.run_migrations().await.expect("migrations failed");
            tracing::info!(
                max_connections = config.database_max_connections,
                "using PostgreSQL order store"
            );
            serve(store, &config, metrics_handle).await;
        }
        None => {
            let store = InMemoryOrderStore::new();
            for &(name, quantity, price) in DEMO_PRODUCTS {
                let product = store
                    .insert_product(name, quantity, Money::from_cents(price))
                    .await
                    .expect("failed to seed product");
                tracing::info!(product_id = %product.id, name, quantity, "seeded demo product");
            }
            tracing::warn!("DATABASE_URL not set, using in-memory order store");
            serve(store, &config, metrics_handle).await;
        }
    }
}
