//! Postgres-backed policy store. Swappable production replacement for
//! the in-memory map; guarded transitions use a status predicate on the
//! UPDATE so concurrent claim/expire requests cannot both win.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use uuid::Uuid;

use super::{merge_chain_policy, PolicyPatch, PolicyStore, StoreError};
use crate::models::policy::{ClaimRecord, NewPolicy, Policy, PolicyStatus};

pub struct PgPolicyStore {
    pool: PgPool,
}

impl PgPolicyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct PolicyRow {
    id: String,
    owner_address: String,
    airline: String,
    flight_number: String,
    flight_date: NaiveDate,
    departure_airport: Option<String>,
    ticket_price: Decimal,
    premium: Decimal,
    original_premium: Decimal,
    discount_amount: Decimal,
    promo_code: Option<String>,
    status: String,
    expiration_date: NaiveDate,
    purchase_date: NaiveDate,
    transaction_hash: String,
    claim_date: Option<NaiveDate>,
    claim_amount: Option<Decimal>,
    claim_status: Option<String>,
    claim_processed_at: Option<DateTime<Utc>>,
    claim_paid_at: Option<DateTime<Utc>>,
    claim_payout_tx_hash: Option<String>,
}

impl PolicyRow {
    fn into_policy(self) -> Result<Policy, sqlx::Error> {
        let status = self
            .status
            .parse::<PolicyStatus>()
            .map_err(|e| sqlx::Error::Decode(e.into()))?;

        let claim = match (self.claim_date, self.claim_amount, self.claim_status) {
            (Some(claim_date), Some(claim_amount), Some(raw_status)) => Some(ClaimRecord {
                claim_date,
                claim_amount,
                claim_status: raw_status
                    .parse()
                    .map_err(|e: String| sqlx::Error::Decode(e.into()))?,
                processed_at: self.claim_processed_at,
                paid_at: self.claim_paid_at,
                payout_tx_hash: self.claim_payout_tx_hash,
            }),
            _ => None,
        };

        Ok(Policy {
            id: self.id,
            owner_address: self.owner_address,
            flight: crate::models::policy::FlightRef {
                airline: self.airline,
                flight_number: self.flight_number,
                date: self.flight_date,
                departure_airport: self.departure_airport,
            },
            ticket_price: self.ticket_price,
            premium: self.premium,
            original_premium: self.original_premium,
            discount_amount: self.discount_amount,
            promo_code: self.promo_code,
            status,
            expiration_date: self.expiration_date,
            purchase_date: self.purchase_date,
            transaction_hash: self.transaction_hash,
            claim,
        })
    }
}

const COLUMNS: &str = "id, owner_address, airline, flight_number, flight_date, \
     departure_airport, ticket_price, premium, original_premium, discount_amount, \
     promo_code, status, expiration_date, purchase_date, transaction_hash, \
     claim_date, claim_amount, claim_status, claim_processed_at, claim_paid_at, \
     claim_payout_tx_hash";

async fn upsert_row<'e, E>(executor: E, policy: &Policy) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    let claim = policy.claim.as_ref();
    let sql = format!(
        "INSERT INTO policies ({COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, \
                 $16, $17, $18, $19, $20, $21) \
         ON CONFLICT (id) DO UPDATE SET \
             owner_address = EXCLUDED.owner_address, \
             airline = EXCLUDED.airline, \
             flight_number = EXCLUDED.flight_number, \
             flight_date = EXCLUDED.flight_date, \
             departure_airport = EXCLUDED.departure_airport, \
             ticket_price = EXCLUDED.ticket_price, \
             premium = EXCLUDED.premium, \
             original_premium = EXCLUDED.original_premium, \
             discount_amount = EXCLUDED.discount_amount, \
             promo_code = EXCLUDED.promo_code, \
             status = EXCLUDED.status, \
             expiration_date = EXCLUDED.expiration_date, \
             purchase_date = EXCLUDED.purchase_date, \
             transaction_hash = EXCLUDED.transaction_hash, \
             claim_date = EXCLUDED.claim_date, \
             claim_amount = EXCLUDED.claim_amount, \
             claim_status = EXCLUDED.claim_status, \
             claim_processed_at = EXCLUDED.claim_processed_at, \
             claim_paid_at = EXCLUDED.claim_paid_at, \
             claim_payout_tx_hash = EXCLUDED.claim_payout_tx_hash"
    );

    sqlx::query(&sql)
        .bind(&policy.id)
        .bind(&policy.owner_address)
        .bind(&policy.flight.airline)
        .bind(&policy.flight.flight_number)
        .bind(policy.flight.date)
        .bind(&policy.flight.departure_airport)
        .bind(policy.ticket_price)
        .bind(policy.premium)
        .bind(policy.original_premium)
        .bind(policy.discount_amount)
        .bind(&policy.promo_code)
        .bind(policy.status.to_string())
        .bind(policy.expiration_date)
        .bind(policy.purchase_date)
        .bind(&policy.transaction_hash)
        .bind(claim.map(|c| c.claim_date))
        .bind(claim.map(|c| c.claim_amount))
        .bind(claim.map(|c| c.claim_status.to_string()))
        .bind(claim.and_then(|c| c.processed_at))
        .bind(claim.and_then(|c| c.paid_at))
        .bind(claim.and_then(|c| c.payout_tx_hash.clone()))
        .execute(executor)
        .await?;
    Ok(())
}

#[async_trait]
impl PolicyStore for PgPolicyStore {
    async fn create(&self, data: NewPolicy) -> Result<Policy, StoreError> {
        let policy = data.into_policy(Uuid::new_v4().to_string());
        upsert_row(&self.pool, &policy).await?;
        Ok(policy)
    }

    async fn get(&self, id: &str) -> Result<Option<Policy>, StoreError> {
        let sql = format!("SELECT {COLUMNS} FROM policies WHERE id = $1");
        let row = sqlx::query_as::<_, PolicyRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(PolicyRow::into_policy).transpose().map_err(Into::into)
    }

    async fn list_by_owner(&self, owner: &str) -> Result<Vec<Policy>, StoreError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM policies WHERE LOWER(owner_address) = LOWER($1)"
        );
        let rows = sqlx::query_as::<_, PolicyRow>(&sql)
            .bind(owner)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|r| r.into_policy().map_err(Into::into))
            .collect()
    }

    async fn list_all(&self) -> Result<Vec<Policy>, StoreError> {
        let sql = format!("SELECT {COLUMNS} FROM policies");
        let rows = sqlx::query_as::<_, PolicyRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|r| r.into_policy().map_err(Into::into))
            .collect()
    }

    async fn update(
        &self,
        id: &str,
        patch: PolicyPatch,
    ) -> Result<Option<Policy>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {COLUMNS} FROM policies WHERE id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, PolicyRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let mut policy = row.into_policy().map_err(StoreError::from)?;
        patch.apply_to(&mut policy);
        upsert_row(&mut *tx, &policy).await?;
        tx.commit().await?;
        Ok(Some(policy))
    }

    async fn transition(
        &self,
        id: &str,
        expected: PolicyStatus,
        patch: PolicyPatch,
    ) -> Result<Policy, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Row lock plus status predicate: the losing side of a race sees
        // the winner's status and reports the conflict.
        let sql = format!("SELECT {COLUMNS} FROM policies WHERE id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, PolicyRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::NotFound)?;

        let mut policy = row.into_policy().map_err(StoreError::from)?;
        if policy.status != expected {
            return Err(StoreError::StatusConflict {
                actual: policy.status,
            });
        }

        patch.apply_to(&mut policy);
        upsert_row(&mut *tx, &policy).await?;
        tx.commit().await?;
        Ok(policy)
    }

    async fn upsert_from_chain(&self, incoming: Policy) -> Result<Policy, StoreError> {
        let mut tx = self.pool.begin().await?;

        let existing = if !incoming.transaction_hash.is_empty() {
            let sql = format!(
                "SELECT {COLUMNS} FROM policies WHERE transaction_hash = $1 FOR UPDATE"
            );
            sqlx::query_as::<_, PolicyRow>(&sql)
                .bind(&incoming.transaction_hash)
                .fetch_optional(&mut *tx)
                .await?
        } else {
            None
        };
        let existing = match existing {
            Some(row) => Some(row),
            None => {
                let sql = format!("SELECT {COLUMNS} FROM policies WHERE id = $1 FOR UPDATE");
                sqlx::query_as::<_, PolicyRow>(&sql)
                    .bind(&incoming.id)
                    .fetch_optional(&mut *tx)
                    .await?
            }
        };
        let existing = existing
            .map(PolicyRow::into_policy)
            .transpose()
            .map_err(StoreError::from)?;

        let merged = merge_chain_policy(existing.as_ref(), incoming);
        upsert_row(&mut *tx, &merged).await?;
        tx.commit().await?;
        Ok(merged)
    }
}
