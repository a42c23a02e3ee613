//! Policy lifecycle state machine.
//!
//! Top-level status moves forward only:
//!
//! ```text
//! active ──▶ claimed ──▶ (sub-status: in_verification ──▶ approved ──▶ paid)
//!    │                                       └──────────▶ rejected
//!    └─────▶ expired
//! ```
//!
//! A rejected claim stays a `claimed` policy with a `rejected` sub-status;
//! there is no transition back to `active`. All guarded transitions go
//! through [`PolicyStore::transition`], so for a single policy id at most
//! one of a racing claim/expire pair can succeed.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::policy::{
    is_onchain_id, ClaimRecord, ClaimSubStatus, FlightRef, Policy, PolicyStatus,
};
use crate::store::{PolicyPatch, PolicyStore, StoreError};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("policy not found")]
    PolicyNotFound,

    #[error("policy has already been claimed")]
    PolicyAlreadyClaimed,

    #[error("policy is not active")]
    PolicyNotActive,

    #[error("owner address is required for on-chain policy claims")]
    OwnerAddressRequired,

    #[error("claim is {actual}, not awaiting this step")]
    ClaimNotPending { actual: ClaimSubStatus },

    #[error("store error")]
    Store(#[from] StoreError),
}

/// What the caller gets back when a claim request is accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimReceipt {
    pub id: String,
    pub policy_id: String,
    pub status: ClaimSubStatus,
    pub amount: Decimal,
    pub submitted_date: NaiveDate,
}

pub struct PolicyLifecycle {
    store: Arc<dyn PolicyStore>,
}

impl PolicyLifecycle {
    pub fn new(store: Arc<dyn PolicyStore>) -> Self {
        Self { store }
    }

    /// Requests a claim, transitioning the policy `active -> claimed`.
    pub async fn request_claim(
        &self,
        policy_id: &str,
        amount: Decimal,
        owner_address: Option<&str>,
    ) -> Result<(ClaimReceipt, Policy), LifecycleError> {
        self.request_claim_at(policy_id, amount, owner_address, Utc::now().date_naive())
            .await
    }

    /// Like [`request_claim`](Self::request_claim) with an explicit
    /// claim date.
    ///
    /// Ids with the `onchain-` prefix that the mirror has never seen are
    /// materialized on the spot when the caller supplies an owner
    /// address: the mirror can lag behind chain state, and a claim
    /// against a chain-confirmed policy must not bounce on a cache miss.
    pub async fn request_claim_at(
        &self,
        policy_id: &str,
        amount: Decimal,
        owner_address: Option<&str>,
        today: NaiveDate,
    ) -> Result<(ClaimReceipt, Policy), LifecycleError> {
        let claim = ClaimRecord {
            claim_date: today,
            claim_amount: amount,
            claim_status: ClaimSubStatus::InVerification,
            processed_at: None,
            paid_at: None,
            payout_tx_hash: None,
        };

        let existing = self.store.get(policy_id).await?;
        let policy = match existing {
            Some(policy) => match policy.status {
                PolicyStatus::Active => {
                    let patch = PolicyPatch {
                        status: Some(PolicyStatus::Claimed),
                        claim: Some(claim.clone()),
                        ..Default::default()
                    };
                    match self
                        .store
                        .transition(policy_id, PolicyStatus::Active, patch)
                        .await
                    {
                        Ok(updated) => updated,
                        Err(StoreError::StatusConflict { actual }) => {
                            return Err(Self::conflict_error(actual))
                        }
                        Err(StoreError::NotFound) => {
                            return Err(LifecycleError::PolicyNotFound)
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                other => return Err(Self::conflict_error(other)),
            },
            None if is_onchain_id(policy_id) => {
                let owner =
                    owner_address.ok_or(LifecycleError::OwnerAddressRequired)?;
                let minimal = Policy {
                    id: policy_id.to_string(),
                    owner_address: owner.to_string(),
                    // Flight details live only on-chain for these records.
                    flight: FlightRef {
                        airline: String::new(),
                        flight_number: String::new(),
                        date: today,
                        departure_airport: None,
                    },
                    ticket_price: amount,
                    premium: Decimal::ZERO,
                    original_premium: Decimal::ZERO,
                    discount_amount: Decimal::ZERO,
                    promo_code: None,
                    status: PolicyStatus::Claimed,
                    expiration_date: today,
                    purchase_date: today,
                    transaction_hash: String::new(),
                    claim: Some(claim.clone()),
                };
                self.store.upsert_from_chain(minimal).await?
            }
            None => return Err(LifecycleError::PolicyNotFound),
        };

        tracing::info!(policy_id = %policy.id, %amount, "claim requested");

        let receipt = ClaimReceipt {
            id: format!("claim-{}", policy.id),
            policy_id: policy.id.clone(),
            status: ClaimSubStatus::InVerification,
            amount,
            submitted_date: today,
        };
        Ok((receipt, policy))
    }

    /// Marks an active policy expired. Expiring a claimed or already
    /// expired policy is rejected rather than silently ignored.
    pub async fn expire_policy(&self, policy_id: &str) -> Result<Policy, LifecycleError> {
        let patch = PolicyPatch {
            status: Some(PolicyStatus::Expired),
            ..Default::default()
        };
        match self
            .store
            .transition(policy_id, PolicyStatus::Active, patch)
            .await
        {
            Ok(policy) => {
                tracing::info!(policy_id = %policy.id, "policy expired");
                Ok(policy)
            }
            Err(StoreError::NotFound) => Err(LifecycleError::PolicyNotFound),
            Err(StoreError::StatusConflict { .. }) => Err(LifecycleError::PolicyNotActive),
            Err(e) => Err(e.into()),
        }
    }

    /// Applies the verification outcome to a pending claim. Driven by
    /// the on-chain `verify_and_pay_claim` result; `processed_at` is the
    /// confirmation timestamp of that transaction.
    pub async fn apply_verification(
        &self,
        policy_id: &str,
        approved: bool,
        processed_at: DateTime<Utc>,
    ) -> Result<Policy, LifecycleError> {
        let policy = self
            .store
            .get(policy_id)
            .await?
            .ok_or(LifecycleError::PolicyNotFound)?;
        let mut claim = match policy.claim {
            Some(claim) if claim.claim_status == ClaimSubStatus::InVerification => claim,
            Some(claim) => {
                return Err(LifecycleError::ClaimNotPending {
                    actual: claim.claim_status,
                })
            }
            None => return Err(LifecycleError::PolicyNotActive),
        };

        claim.claim_status = if approved {
            ClaimSubStatus::Approved
        } else {
            ClaimSubStatus::Rejected
        };
        claim.processed_at = Some(processed_at);

        let patch = PolicyPatch {
            claim: Some(claim),
            ..Default::default()
        };
        match self
            .store
            .transition(policy_id, PolicyStatus::Claimed, patch)
            .await
        {
            Ok(policy) => Ok(policy),
            Err(StoreError::NotFound) => Err(LifecycleError::PolicyNotFound),
            Err(StoreError::StatusConflict { .. }) => Err(LifecycleError::PolicyNotActive),
            Err(e) => Err(e.into()),
        }
    }

    /// Records a confirmed payout for an approved claim. `paid_at` is
    /// the confirmation timestamp of the payout transaction.
    pub async fn record_payout(
        &self,
        policy_id: &str,
        payout_tx_hash: &str,
        paid_at: DateTime<Utc>,
    ) -> Result<Policy, LifecycleError> {
        let policy = self
            .store
            .get(policy_id)
            .await?
            .ok_or(LifecycleError::PolicyNotFound)?;
        let mut claim = match policy.claim {
            Some(claim) if claim.claim_status == ClaimSubStatus::Approved => claim,
            Some(claim) => {
                return Err(LifecycleError::ClaimNotPending {
                    actual: claim.claim_status,
                })
            }
            None => return Err(LifecycleError::PolicyNotActive),
        };

        claim.claim_status = ClaimSubStatus::Paid;
        claim.paid_at = Some(paid_at);
        claim.payout_tx_hash = Some(payout_tx_hash.to_string());

        let patch = PolicyPatch {
            claim: Some(claim),
            ..Default::default()
        };
        match self
            .store
            .transition(policy_id, PolicyStatus::Claimed, patch)
            .await
        {
            Ok(policy) => Ok(policy),
            Err(StoreError::NotFound) => Err(LifecycleError::PolicyNotFound),
            Err(StoreError::StatusConflict { .. }) => Err(LifecycleError::PolicyNotActive),
            Err(e) => Err(e.into()),
        }
    }

    fn conflict_error(actual: PolicyStatus) -> LifecycleError {
        match actual {
            PolicyStatus::Claimed => LifecycleError::PolicyAlreadyClaimed,
            _ => LifecycleError::PolicyNotActive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::policy::NewPolicy;
    use crate::store::InMemoryPolicyStore;
    use chrono::TimeZone;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn new_policy(owner: &str) -> NewPolicy {
        NewPolicy {
            owner_address: owner.to_string(),
            flight: FlightRef {
                airline: "Aeroméxico".to_string(),
                flight_number: "AM123".to_string(),
                date: day(2024, 3, 15),
                departure_airport: Some("MEX".to_string()),
            },
            ticket_price: Decimal::from(8500),
            premium: Decimal::from(425),
            original_premium: Decimal::from(425),
            discount_amount: Decimal::ZERO,
            promo_code: None,
            status: PolicyStatus::Active,
            expiration_date: day(2024, 3, 15),
            purchase_date: day(2024, 2, 10),
            transaction_hash: String::new(),
            claim: None,
        }
    }

    async fn setup() -> (Arc<InMemoryPolicyStore>, PolicyLifecycle) {
        let store = Arc::new(InMemoryPolicyStore::new());
        let lifecycle = PolicyLifecycle::new(store.clone());
        (store, lifecycle)
    }

    #[tokio::test]
    async fn claim_moves_active_policy_to_claimed() {
        let (store, lifecycle) = setup().await;
        let policy = store.create(new_policy("0xAAA")).await.unwrap();

        let (receipt, updated) = lifecycle
            .request_claim_at(&policy.id, Decimal::from(8500), None, day(2024, 3, 16))
            .await
            .unwrap();

        assert_eq!(updated.status, PolicyStatus::Claimed);
        let claim = updated.claim.unwrap();
        assert_eq!(claim.claim_status, ClaimSubStatus::InVerification);
        assert_eq!(claim.claim_amount, Decimal::from(8500));
        assert_eq!(claim.claim_date, day(2024, 3, 16));
        assert_eq!(receipt.policy_id, policy.id);
        assert_eq!(receipt.id, format!("claim-{}", policy.id));
    }

    #[tokio::test]
    async fn claiming_twice_fails_and_keeps_the_first_claim() {
        let (store, lifecycle) = setup().await;
        let policy = store.create(new_policy("0xAAA")).await.unwrap();

        lifecycle
            .request_claim_at(&policy.id, Decimal::from(100), None, day(2024, 3, 16))
            .await
            .unwrap();

        let err = lifecycle
            .request_claim_at(&policy.id, Decimal::from(999), None, day(2024, 3, 17))
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::PolicyAlreadyClaimed));

        let current = store.get(&policy.id).await.unwrap().unwrap();
        let claim = current.claim.unwrap();
        assert_eq!(claim.claim_amount, Decimal::from(100));
        assert_eq!(claim.claim_date, day(2024, 3, 16));
    }

    #[tokio::test]
    async fn claiming_expired_policy_is_not_active() {
        let (store, lifecycle) = setup().await;
        let mut data = new_policy("0xAAA");
        data.status = PolicyStatus::Expired;
        let policy = store.create(data).await.unwrap();

        let err = lifecycle
            .request_claim_at(&policy.id, Decimal::from(100), None, day(2024, 3, 16))
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::PolicyNotActive));
    }

    #[tokio::test]
    async fn unknown_local_id_is_not_found() {
        let (_store, lifecycle) = setup().await;
        let err = lifecycle
            .request_claim_at("nope", Decimal::from(100), Some("0xAAA"), day(2024, 3, 16))
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::PolicyNotFound));
    }

    #[tokio::test]
    async fn onchain_id_without_owner_is_rejected() {
        let (_store, lifecycle) = setup().await;
        let err = lifecycle
            .request_claim_at("onchain-42", Decimal::from(100), None, day(2024, 3, 16))
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::OwnerAddressRequired));
    }

    #[tokio::test]
    async fn onchain_id_with_owner_materializes_a_claimed_record() {
        let (store, lifecycle) = setup().await;
        let (receipt, policy) = lifecycle
            .request_claim_at(
                "onchain-42",
                Decimal::from(3200),
                Some("0xAAA"),
                day(2024, 3, 16),
            )
            .await
            .unwrap();

        assert_eq!(policy.id, "onchain-42");
        assert_eq!(policy.status, PolicyStatus::Claimed);
        assert_eq!(policy.ticket_price, Decimal::from(3200));
        assert_eq!(receipt.status, ClaimSubStatus::InVerification);

        let stored = store.get("onchain-42").await.unwrap().unwrap();
        assert_eq!(stored.owner_address, "0xAAA");
        assert!(stored.claim.is_some());
    }

    #[tokio::test]
    async fn expire_active_policy() {
        let (store, lifecycle) = setup().await;
        let policy = store.create(new_policy("0xAAA")).await.unwrap();

        let expired = lifecycle.expire_policy(&policy.id).await.unwrap();
        assert_eq!(expired.status, PolicyStatus::Expired);
    }

    #[tokio::test]
    async fn expire_claimed_policy_fails() {
        let (store, lifecycle) = setup().await;
        let policy = store.create(new_policy("0xAAA")).await.unwrap();
        lifecycle
            .request_claim_at(&policy.id, Decimal::from(100), None, day(2024, 3, 16))
            .await
            .unwrap();

        let err = lifecycle.expire_policy(&policy.id).await.unwrap_err();
        assert!(matches!(err, LifecycleError::PolicyNotActive));

        let current = store.get(&policy.id).await.unwrap().unwrap();
        assert_eq!(current.status, PolicyStatus::Claimed);
    }

    #[tokio::test]
    async fn expire_twice_fails_the_second_time() {
        let (store, lifecycle) = setup().await;
        let policy = store.create(new_policy("0xAAA")).await.unwrap();
        lifecycle.expire_policy(&policy.id).await.unwrap();

        let err = lifecycle.expire_policy(&policy.id).await.unwrap_err();
        assert!(matches!(err, LifecycleError::PolicyNotActive));
    }

    #[tokio::test]
    async fn verification_approves_and_stamps_processed_at() {
        let (store, lifecycle) = setup().await;
        let policy = store.create(new_policy("0xAAA")).await.unwrap();
        lifecycle
            .request_claim_at(&policy.id, Decimal::from(8500), None, day(2024, 3, 16))
            .await
            .unwrap();

        let at = Utc.with_ymd_and_hms(2024, 3, 17, 9, 0, 0).unwrap();
        let updated = lifecycle
            .apply_verification(&policy.id, true, at)
            .await
            .unwrap();

        let claim = updated.claim.unwrap();
        assert_eq!(claim.claim_status, ClaimSubStatus::Approved);
        assert_eq!(claim.processed_at, Some(at));
        // Top-level status is unchanged by the sub-status move.
        assert_eq!(updated.status, PolicyStatus::Claimed);
    }

    #[tokio::test]
    async fn rejection_is_a_sub_status_not_a_reversal() {
        let (store, lifecycle) = setup().await;
        let policy = store.create(new_policy("0xAAA")).await.unwrap();
        lifecycle
            .request_claim_at(&policy.id, Decimal::from(8500), None, day(2024, 3, 16))
            .await
            .unwrap();

        let at = Utc.with_ymd_and_hms(2024, 3, 17, 9, 0, 0).unwrap();
        let updated = lifecycle
            .apply_verification(&policy.id, false, at)
            .await
            .unwrap();

        assert_eq!(updated.status, PolicyStatus::Claimed);
        assert_eq!(
            updated.claim.unwrap().claim_status,
            ClaimSubStatus::Rejected
        );
    }

    #[tokio::test]
    async fn verification_twice_reports_claim_not_pending() {
        let (store, lifecycle) = setup().await;
        let policy = store.create(new_policy("0xAAA")).await.unwrap();
        lifecycle
            .request_claim_at(&policy.id, Decimal::from(8500), None, day(2024, 3, 16))
            .await
            .unwrap();

        let at = Utc.with_ymd_and_hms(2024, 3, 17, 9, 0, 0).unwrap();
        lifecycle
            .apply_verification(&policy.id, true, at)
            .await
            .unwrap();
        let err = lifecycle
            .apply_verification(&policy.id, false, at)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::ClaimNotPending {
                actual: ClaimSubStatus::Approved
            }
        ));
    }

    #[tokio::test]
    async fn payout_requires_an_approved_claim() {
        let (store, lifecycle) = setup().await;
        let policy = store.create(new_policy("0xAAA")).await.unwrap();
        lifecycle
            .request_claim_at(&policy.id, Decimal::from(8500), None, day(2024, 3, 16))
            .await
            .unwrap();

        let at = Utc.with_ymd_and_hms(2024, 3, 18, 12, 0, 0).unwrap();
        let err = lifecycle
            .record_payout(&policy.id, "0xpay", at)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::ClaimNotPending {
                actual: ClaimSubStatus::InVerification
            }
        ));

        lifecycle
            .apply_verification(&policy.id, true, at)
            .await
            .unwrap();
        let paid = lifecycle
            .record_payout(&policy.id, "0xpay", at)
            .await
            .unwrap();

        let claim = paid.claim.unwrap();
        assert_eq!(claim.claim_status, ClaimSubStatus::Paid);
        assert_eq!(claim.paid_at, Some(at));
        assert_eq!(claim.payout_tx_hash.as_deref(), Some("0xpay"));
    }
}
