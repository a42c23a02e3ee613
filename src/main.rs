use std::sync::Arc;

use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use palomito_server::config::Config;
use palomito_server::gateways::{AeroDataBoxGateway, FlightStatusGateway};
use palomito_server::promo::{InMemoryPromoCodes, PromoCodeEngine};
use palomito_server::routes::create_routes;
use palomito_server::state::AppState;
use palomito_server::store::{InMemoryPolicyStore, PgPolicyStore, PolicyStore};

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();

    let store: Arc<dyn PolicyStore> = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(url)
                .await
                .expect("failed to connect to database");

            sqlx::migrate!()
                .run(&pool)
                .await
                .expect("failed to run migrations");

            tracing::info!("using Postgres policy store");
            Arc::new(PgPolicyStore::new(pool))
        }
        None => {
            if config.seed_sample_data {
                tracing::info!("using in-memory policy store with sample data");
                Arc::new(InMemoryPolicyStore::with_sample_data())
            } else {
                tracing::info!("using in-memory policy store");
                Arc::new(InMemoryPolicyStore::new())
            }
        }
    };

    let promo = Arc::new(PromoCodeEngine::new(Box::new(InMemoryPromoCodes::seeded())));

    let flight: Option<Arc<dyn FlightStatusGateway>> = match config.aerodatabox_api_key {
        Some(key) => Some(Arc::new(AeroDataBoxGateway::new(key))),
        None => {
            tracing::warn!("AERODATABOX_API_KEY not set; flight status lookups disabled");
            None
        }
    };

    let state = AppState::new(store, promo, flight);
    let app = create_routes(state);

    tracing::info!("server listening on http://{}", config.bind_addr);
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .expect("failed to bind address");

    axum::serve(listener, app).await.expect("server failed");
}
