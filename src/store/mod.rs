//! Policy repository. The store is the single owner of off-chain policy
//! state; everything above it goes through the [`PolicyStore`] trait so
//! the in-memory and Postgres backends are interchangeable.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::policy::{ClaimRecord, NewPolicy, Policy, PolicyStatus};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryPolicyStore;
pub use postgres::PgPolicyStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("policy not found")]
    NotFound,

    /// A guarded transition found the policy in a different status than
    /// the caller expected. Carries what was actually there.
    #[error("policy is {actual}, not in the expected status")]
    StatusConflict { actual: PolicyStatus },

    #[error("database error")]
    Database(#[from] sqlx::Error),
}

/// Partial update merged over an existing policy. Absent fields are left
/// untouched.
#[derive(Debug, Clone, Default)]
pub struct PolicyPatch {
    pub status: Option<PolicyStatus>,
    pub transaction_hash: Option<String>,
    pub claim: Option<ClaimRecord>,
}

impl PolicyPatch {
    pub fn apply_to(&self, policy: &mut Policy) {
        if let Some(status) = self.status {
            policy.status = status;
        }
        if let Some(hash) = &self.transaction_hash {
            policy.transaction_hash = hash.clone();
        }
        if let Some(claim) = &self.claim {
            policy.claim = Some(claim.clone());
        }
    }
}

#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Inserts a new policy under a freshly assigned id.
    async fn create(&self, data: NewPolicy) -> Result<Policy, StoreError>;

    async fn get(&self, id: &str) -> Result<Option<Policy>, StoreError>;

    /// Unordered, case-insensitive owner match.
    async fn list_by_owner(&self, owner: &str) -> Result<Vec<Policy>, StoreError>;

    async fn list_all(&self) -> Result<Vec<Policy>, StoreError>;

    /// Merges `patch` over the policy, returning `None` for unknown ids
    /// rather than failing.
    async fn update(&self, id: &str, patch: PolicyPatch)
        -> Result<Option<Policy>, StoreError>;

    /// Atomically applies `patch` only while the policy is in `expected`
    /// status. Claim and expire requests for one id race through here,
    /// so at most one of them can win.
    async fn transition(
        &self,
        id: &str,
        expected: PolicyStatus,
        patch: PolicyPatch,
    ) -> Result<Policy, StoreError>;

    /// Idempotently reconciles an on-chain policy into the mirror, keyed
    /// by transaction hash first and id second (see [`merge_chain_policy`]).
    async fn upsert_from_chain(&self, incoming: Policy) -> Result<Policy, StoreError>;
}

/// Merge rule for chain reconciliation.
///
/// The chain is authoritative for lifecycle state (status, claim,
/// expiration, transaction hash) but knows nothing about the flight
/// descriptor or the promo quote, so those stay local when present.
/// Matching an existing record keeps its id stable, which prevents the
/// duplicate entries that per-field string matching used to produce.
pub fn merge_chain_policy(existing: Option<&Policy>, incoming: Policy) -> Policy {
    let Some(existing) = existing else {
        return incoming;
    };

    Policy {
        id: existing.id.clone(),
        owner_address: if incoming.owner_address.is_empty() {
            existing.owner_address.clone()
        } else {
            incoming.owner_address
        },
        flight: if incoming.flight.airline.is_empty() {
            existing.flight.clone()
        } else {
            incoming.flight
        },
        ticket_price: if incoming.ticket_price.is_zero() {
            existing.ticket_price
        } else {
            incoming.ticket_price
        },
        premium: existing.premium,
        original_premium: existing.original_premium,
        discount_amount: existing.discount_amount,
        promo_code: existing.promo_code.clone(),
        status: incoming.status,
        expiration_date: incoming.expiration_date,
        purchase_date: existing.purchase_date,
        transaction_hash: if incoming.transaction_hash.is_empty() {
            existing.transaction_hash.clone()
        } else {
            incoming.transaction_hash
        },
        claim: incoming.claim.or_else(|| existing.claim.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::policy::FlightRef;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn local_policy() -> Policy {
        Policy {
            id: "local-1".to_string(),
            owner_address: "0xAAA".to_string(),
            flight: FlightRef {
                airline: "Volaris".to_string(),
                flight_number: "Y4567".to_string(),
                date: NaiveDate::from_ymd_opt(2024, 2, 28).unwrap(),
                departure_airport: Some("MEX".to_string()),
            },
            ticket_price: Decimal::from(3200),
            premium: Decimal::from(160),
            original_premium: Decimal::from(160),
            discount_amount: Decimal::ZERO,
            promo_code: Some("WELCOME10".to_string()),
            status: PolicyStatus::Active,
            expiration_date: NaiveDate::from_ymd_opt(2024, 2, 28).unwrap(),
            purchase_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            transaction_hash: "0xfeed".to_string(),
            claim: None,
        }
    }

    fn chain_policy() -> Policy {
        Policy {
            id: "onchain-7".to_string(),
            owner_address: "0xaaa".to_string(),
            flight: FlightRef {
                airline: String::new(),
                flight_number: String::new(),
                date: NaiveDate::from_ymd_opt(2024, 2, 28).unwrap(),
                departure_airport: None,
            },
            ticket_price: Decimal::ZERO,
            premium: Decimal::ZERO,
            original_premium: Decimal::ZERO,
            discount_amount: Decimal::ZERO,
            promo_code: None,
            status: PolicyStatus::Expired,
            expiration_date: NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
            purchase_date: NaiveDate::from_ymd_opt(2024, 2, 28).unwrap(),
            transaction_hash: "0xfeed".to_string(),
            claim: None,
        }
    }

    #[test]
    fn merge_without_match_takes_incoming_as_is() {
        let incoming = chain_policy();
        let merged = merge_chain_policy(None, incoming.clone());
        assert_eq!(merged, incoming);
    }

    #[test]
    fn merge_keeps_local_descriptive_fields() {
        let local = local_policy();
        let merged = merge_chain_policy(Some(&local), chain_policy());

        // Stable local id, descriptive fields preserved.
        assert_eq!(merged.id, "local-1");
        assert_eq!(merged.flight.airline, "Volaris");
        assert_eq!(merged.promo_code.as_deref(), Some("WELCOME10"));
        assert_eq!(merged.ticket_price, Decimal::from(3200));
        assert_eq!(merged.premium, Decimal::from(160));

        // Chain-authoritative fields taken from incoming.
        assert_eq!(merged.status, PolicyStatus::Expired);
        assert_eq!(
            merged.expiration_date,
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
    }

    #[test]
    fn merge_is_idempotent() {
        let local = local_policy();
        let once = merge_chain_policy(Some(&local), chain_policy());
        let twice = merge_chain_policy(Some(&once), chain_policy());
        assert_eq!(once, twice);
    }

    #[test]
    fn patch_merges_only_present_fields() {
        let mut policy = local_policy();
        let patch = PolicyPatch {
            status: Some(PolicyStatus::Claimed),
            ..Default::default()
        };
        patch.apply_to(&mut policy);
        assert_eq!(policy.status, PolicyStatus::Claimed);
        assert_eq!(policy.transaction_hash, "0xfeed");
        assert!(policy.claim.is_none());
    }
}
