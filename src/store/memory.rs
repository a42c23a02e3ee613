//! In-memory policy store. Default backend when no database is
//! configured; also what the tests run against.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::{merge_chain_policy, PolicyPatch, PolicyStore, StoreError};
use crate::models::policy::{
    ClaimRecord, ClaimSubStatus, FlightRef, NewPolicy, Policy, PolicyStatus,
};

#[derive(Default)]
pub struct InMemoryPolicyStore {
    // All mutations take the write lock, which is what serializes
    // competing claim/expire transitions for the same id.
    policies: RwLock<HashMap<String, Policy>>,
}

impl InMemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store preloaded with the development sample policies: one
    /// active, one claimed-and-approved, one expired.
    pub fn with_sample_data() -> Self {
        let store = Self::new();
        let owner = "0x742d35Cc6634C0532925a3b844Bc9e7595f0bEb0";
        let samples = [
            Policy {
                id: Uuid::new_v4().to_string(),
                owner_address: owner.to_string(),
                flight: FlightRef {
                    airline: "Aeroméxico".to_string(),
                    flight_number: "AM123".to_string(),
                    date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
                    departure_airport: None,
                },
                ticket_price: Decimal::from(8500),
                premium: Decimal::from(425),
                original_premium: Decimal::from(425),
                discount_amount: Decimal::ZERO,
                promo_code: None,
                status: PolicyStatus::Active,
                expiration_date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
                purchase_date: NaiveDate::from_ymd_opt(2024, 2, 10).unwrap(),
                transaction_hash: format!("0x{:064x}", 1),
                claim: None,
            },
            Policy {
                id: Uuid::new_v4().to_string(),
                owner_address: owner.to_string(),
                flight: FlightRef {
                    airline: "Volaris".to_string(),
                    flight_number: "Y4567".to_string(),
                    date: NaiveDate::from_ymd_opt(2024, 2, 28).unwrap(),
                    departure_airport: None,
                },
                ticket_price: Decimal::from(3200),
                premium: Decimal::from(160),
                original_premium: Decimal::from(160),
                discount_amount: Decimal::ZERO,
                promo_code: None,
                status: PolicyStatus::Claimed,
                expiration_date: NaiveDate::from_ymd_opt(2024, 2, 28).unwrap(),
                purchase_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
                transaction_hash: format!("0x{:064x}", 2),
                claim: Some(ClaimRecord {
                    claim_date: NaiveDate::from_ymd_opt(2024, 2, 25).unwrap(),
                    claim_amount: Decimal::from(3200),
                    claim_status: ClaimSubStatus::Approved,
                    processed_at: None,
                    paid_at: None,
                    payout_tx_hash: None,
                }),
            },
            Policy {
                id: Uuid::new_v4().to_string(),
                owner_address: owner.to_string(),
                flight: FlightRef {
                    airline: "Interjet".to_string(),
                    flight_number: "IJ789".to_string(),
                    date: NaiveDate::from_ymd_opt(2024, 1, 20).unwrap(),
                    departure_airport: None,
                },
                ticket_price: Decimal::from(5200),
                premium: Decimal::from(260),
                original_premium: Decimal::from(260),
                discount_amount: Decimal::ZERO,
                promo_code: None,
                status: PolicyStatus::Expired,
                expiration_date: NaiveDate::from_ymd_opt(2024, 1, 20).unwrap(),
                purchase_date: NaiveDate::from_ymd_opt(2023, 12, 10).unwrap(),
                transaction_hash: format!("0x{:064x}", 3),
                claim: None,
            },
        ];

        {
            let mut map = store.policies.write().expect("lock poisoned");
            for policy in samples {
                map.insert(policy.id.clone(), policy);
            }
        }
        store
    }
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn create(&self, data: NewPolicy) -> Result<Policy, StoreError> {
        let policy = data.into_policy(Uuid::new_v4().to_string());
        let mut map = self.policies.write().expect("lock poisoned");
        map.insert(policy.id.clone(), policy.clone());
        Ok(policy)
    }

    async fn get(&self, id: &str) -> Result<Option<Policy>, StoreError> {
        let map = self.policies.read().expect("lock poisoned");
        Ok(map.get(id).cloned())
    }

    async fn list_by_owner(&self, owner: &str) -> Result<Vec<Policy>, StoreError> {
        let map = self.policies.read().expect("lock poisoned");
        Ok(map.values().filter(|p| p.owned_by(owner)).cloned().collect())
    }

    async fn list_all(&self) -> Result<Vec<Policy>, StoreError> {
        let map = self.policies.read().expect("lock poisoned");
        Ok(map.values().cloned().collect())
    }

    async fn update(
        &self,
        id: &str,
        patch: PolicyPatch,
    ) -> Result<Option<Policy>, StoreError> {
        let mut map = self.policies.write().expect("lock poisoned");
        Ok(map.get_mut(id).map(|policy| {
            patch.apply_to(policy);
            policy.clone()
        }))
    }

    async fn transition(
        &self,
        id: &str,
        expected: PolicyStatus,
        patch: PolicyPatch,
    ) -> Result<Policy, StoreError> {
        let mut map = self.policies.write().expect("lock poisoned");
        let policy = map.get_mut(id).ok_or(StoreError::NotFound)?;
        if policy.status != expected {
            return Err(StoreError::StatusConflict {
                actual: policy.status,
            });
        }
        patch.apply_to(policy);
        Ok(policy.clone())
    }

    async fn upsert_from_chain(&self, incoming: Policy) -> Result<Policy, StoreError> {
        let mut map = self.policies.write().expect("lock poisoned");
        let existing = if !incoming.transaction_hash.is_empty() {
            map.values()
                .find(|p| p.transaction_hash == incoming.transaction_hash)
                .cloned()
        } else {
            None
        };
        let existing = existing.or_else(|| map.get(&incoming.id).cloned());

        let merged = merge_chain_policy(existing.as_ref(), incoming);
        map.insert(merged.id.clone(), merged.clone());
        Ok(merged)
    }
}
