use std::env;
use std::net::SocketAddr;

pub mod cors;
pub mod headers;

pub use cors::create_cors_layer;
pub use headers::with_security_headers;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3001";

/// Runtime configuration, read once at startup.
pub struct Config {
    pub bind_addr: SocketAddr,
    /// When unset the server runs on the in-memory store.
    pub database_url: Option<String>,
    pub aerodatabox_api_key: Option<String>,
    /// Seed the in-memory store with reference policies (development).
    pub seed_sample_data: bool,
}

impl Config {
    pub fn from_env() -> Self {
        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .unwrap_or_else(|_| {
                tracing::warn!("invalid BIND_ADDR, falling back to {DEFAULT_BIND_ADDR}");
                DEFAULT_BIND_ADDR.parse().expect("default address parses")
            });

        Self {
            bind_addr,
            database_url: env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
            aerodatabox_api_key: env::var("AERODATABOX_API_KEY")
                .ok()
                .filter(|v| !v.is_empty()),
            seed_sample_data: env::var("SEED_SAMPLE_DATA")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}
