pub mod config;
pub mod gateways;
pub mod handlers;
pub mod lifecycle;
pub mod models;
pub mod premium;
pub mod promo;
pub mod routes;
pub mod state;
pub mod store;
pub mod utils;
