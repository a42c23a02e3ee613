use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::policy::{ClaimSubStatus, Policy};

/// Read-only claim view derived from a policy's claim sub-record.
/// There is no separate claim table; a claim exists exactly when a
/// policy carries a populated claim record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub id: String,
    pub policy_id: String,
    pub airline: String,
    pub flight_number: String,
    pub date: NaiveDate,
    pub status: ClaimSubStatus,
    pub amount: Decimal,
    pub submitted_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
}

impl Claim {
    /// Derives the claim view from a policy, or `None` when the policy
    /// has no claim. Processed and payment dates come from the recorded
    /// verification and payout timestamps.
    pub fn from_policy(policy: &Policy) -> Option<Claim> {
        let record = policy.claim.as_ref()?;
        Some(Claim {
            id: format!("claim-{}", policy.id),
            policy_id: policy.id.clone(),
            airline: policy.flight.airline.clone(),
            flight_number: policy.flight.flight_number.clone(),
            date: policy.flight.date,
            status: record.claim_status,
            amount: record.claim_amount,
            submitted_date: record.claim_date,
            processed_date: record.processed_at.map(|t| t.date_naive()),
            payment_date: record.paid_at.map(|t| t.date_naive()),
            transaction_hash: if policy.transaction_hash.is_empty() {
                None
            } else {
                Some(policy.transaction_hash.clone())
            },
        })
    }
}
