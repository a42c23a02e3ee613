use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::lifecycle::ClaimReceipt;
use crate::models::claim::Claim;
use crate::models::policy::Policy;
use crate::state::AppState;
use crate::utils::AppError;

use super::policies::OwnerFilter;

/// Claim request. The amount defaults to the policy's coverage; an
/// owner address is only needed for on-chain ids the mirror has not
/// seen yet.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub owner_address: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimResponse {
    pub claim: ClaimReceipt,
    pub policy: Policy,
    pub message: String,
}

pub async fn create_claim(
    State(state): State<AppState>,
    Path(policy_id): Path<String>,
    Json(body): Json<ClaimRequest>,
) -> Result<(StatusCode, Json<ClaimResponse>), AppError> {
    let amount = match body.amount {
        Some(amount) if amount > Decimal::ZERO => amount,
        Some(_) => {
            return Err(AppError::Validation(
                "claim amount must be positive".to_string(),
            ))
        }
        None => state
            .store
            .get(&policy_id)
            .await?
            .map(|p| p.coverage_amount())
            .ok_or_else(|| {
                AppError::Validation("claim amount is required".to_string())
            })?,
    };

    let (claim, policy) = state
        .lifecycle
        .request_claim(&policy_id, amount, body.owner_address.as_deref())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ClaimResponse {
            claim,
            policy,
            message: "claim submitted and queued for verification".to_string(),
        }),
    ))
}

pub async fn list_claims(
    State(state): State<AppState>,
    Query(filter): Query<OwnerFilter>,
) -> Result<Json<Vec<Claim>>, AppError> {
    let policies = match filter.owner.as_deref() {
        Some(owner) if !owner.is_empty() => state.store.list_by_owner(owner).await?,
        _ => state.store.list_all().await?,
    };

    let mut claims: Vec<Claim> = policies.iter().filter_map(Claim::from_policy).collect();
    claims.sort_by(|a, b| b.submitted_date.cmp(&a.submitted_date));
    Ok(Json(claims))
}
