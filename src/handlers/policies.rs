use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::models::policy::{is_onchain_id, FlightRef, NewPolicy, Policy, PolicyStatus};
use crate::premium::base_premium;
use crate::state::AppState;
use crate::utils::AppError;

/// Creation payload. Premium fields are optional; when absent they are
/// derived from the ticket price at the base rate with no discount.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePolicyRequest {
    pub owner_address: String,
    pub flight: FlightRef,
    pub ticket_price: Decimal,
    #[serde(default)]
    pub premium: Option<Decimal>,
    #[serde(default)]
    pub original_premium: Option<Decimal>,
    #[serde(default)]
    pub discount_amount: Option<Decimal>,
    #[serde(default)]
    pub promo_code: Option<String>,
    #[serde(default)]
    pub transaction_hash: Option<String>,
    #[serde(default)]
    pub expiration_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct OwnerFilter {
    pub owner: Option<String>,
}

pub async fn create_policy(
    State(state): State<AppState>,
    Json(body): Json<CreatePolicyRequest>,
) -> Result<(StatusCode, Json<Policy>), AppError> {
    if body.owner_address.trim().is_empty() {
        return Err(AppError::Validation(
            "owner address is required".to_string(),
        ));
    }
    if body.ticket_price <= Decimal::ZERO {
        return Err(AppError::Validation(
            "ticket price must be positive".to_string(),
        ));
    }
    if body.flight.airline.trim().is_empty() || body.flight.flight_number.trim().is_empty() {
        return Err(AppError::Validation(
            "airline and flight number are required".to_string(),
        ));
    }

    let original_premium = body
        .original_premium
        .unwrap_or_else(|| base_premium(body.ticket_price));
    let discount_amount = body.discount_amount.unwrap_or(Decimal::ZERO);
    let premium = body
        .premium
        .unwrap_or_else(|| (original_premium - discount_amount).max(Decimal::ZERO));

    if discount_amount < Decimal::ZERO
        || discount_amount > original_premium
        || premium != original_premium - discount_amount
        || premium < Decimal::ZERO
    {
        return Err(AppError::Validation(
            "premium, original premium and discount are inconsistent".to_string(),
        ));
    }

    let data = NewPolicy {
        owner_address: body.owner_address,
        ticket_price: body.ticket_price,
        premium,
        original_premium,
        discount_amount,
        promo_code: body.promo_code,
        status: PolicyStatus::Active,
        expiration_date: body.expiration_date.unwrap_or(body.flight.date),
        purchase_date: Utc::now().date_naive(),
        transaction_hash: body.transaction_hash.unwrap_or_default(),
        claim: None,
        flight: body.flight,
    };

    let policy = state.store.create(data).await?;
    tracing::info!(policy_id = %policy.id, "policy created");
    Ok((StatusCode::CREATED, Json(policy)))
}

pub async fn list_policies(
    State(state): State<AppState>,
    Query(filter): Query<OwnerFilter>,
) -> Result<Json<Vec<Policy>>, AppError> {
    let policies = match filter.owner.as_deref() {
        Some(owner) if !owner.is_empty() => state.store.list_by_owner(owner).await?,
        _ => state.store.list_all().await?,
    };
    Ok(Json(policies))
}

pub async fn get_policy(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Policy>, AppError> {
    // On-chain-only records are not addressable by id here; they only
    // surface through owner-filtered listings once reconciled.
    if is_onchain_id(&id) {
        return Err(AppError::NotFound(format!(
            "policy '{id}' lives on-chain; query policies by owner instead"
        )));
    }
    match state.store.get(&id).await? {
        Some(policy) => Ok(Json(policy)),
        None => Err(AppError::NotFound("policy not found".to_string())),
    }
}
