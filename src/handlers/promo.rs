use axum::extract::State;
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::models::promo::Quote;
use crate::state::AppState;
use crate::utils::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyPromoRequest {
    pub code: String,
    pub ticket_price: Decimal,
}

pub async fn apply_promo(
    State(state): State<AppState>,
    Json(body): Json<ApplyPromoRequest>,
) -> Result<Json<Quote>, AppError> {
    let code = body.code.trim();
    if code.is_empty() {
        return Err(AppError::Validation("promo code is required".to_string()));
    }
    if body.ticket_price <= Decimal::ZERO {
        return Err(AppError::Validation(
            "ticket price must be positive".to_string(),
        ));
    }

    let quote = state.promo.apply_code(code, body.ticket_price)?;
    tracing::debug!(code = %quote.code, discount = %quote.discount_amount, "promo quote issued");
    Ok(Json(quote))
}
