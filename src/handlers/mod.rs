use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

pub mod claims;
pub mod flight_status;
pub mod policies;
pub mod promo;

pub use claims::{create_claim, list_claims};
pub use flight_status::flight_status;
pub use policies::{create_policy, get_policy, list_policies};
pub use promo::apply_promo;

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> impl IntoResponse {
    Json(HealthPayload {
        status: "ok",
        service: "palomito-api",
    })
}
