use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Id prefix for policies that exist on the contract but were never
/// written through this backend.
pub const ONCHAIN_ID_PREFIX: &str = "onchain-";

/// Whether a policy id refers to an on-chain-only record.
pub fn is_onchain_id(id: &str) -> bool {
    id.starts_with(ONCHAIN_ID_PREFIX)
}

/// Top-level policy status. Transitions move forward only:
/// `active -> claimed` and `active -> expired` are the only legal moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyStatus {
    Active,
    Claimed,
    Expired,
}

impl std::fmt::Display for PolicyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Claimed => "claimed",
            Self::Expired => "expired",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for PolicyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "claimed" => Ok(Self::Claimed),
            "expired" => Ok(Self::Expired),
            other => Err(format!("unknown policy status: {other}")),
        }
    }
}

/// Claim sub-status, independent of the top-level `PolicyStatus`.
/// A rejected claim does not move the policy back to `active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimSubStatus {
    InVerification,
    Approved,
    Paid,
    Rejected,
}

impl std::fmt::Display for ClaimSubStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::InVerification => "in_verification",
            Self::Approved => "approved",
            Self::Paid => "paid",
            Self::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for ClaimSubStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_verification" => Ok(Self::InVerification),
            "approved" => Ok(Self::Approved),
            "paid" => Ok(Self::Paid),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown claim status: {other}")),
        }
    }
}

/// The flight a policy covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightRef {
    pub airline: String,
    pub flight_number: String,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departure_airport: Option<String>,
}

/// Claim data attached to a policy once a claim has been requested.
///
/// `processed_at` and `paid_at` are the actual timestamps at which the
/// verification outcome and the payout confirmation were applied, not
/// estimates derived from the claim date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRecord {
    pub claim_date: NaiveDate,
    pub claim_amount: Decimal,
    pub claim_status: ClaimSubStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payout_tx_hash: Option<String>,
}

/// Off-chain mirror of an insurance policy. The contract is the source
/// of truth for purchase and payout; this record exists for UI reads and
/// must stay reconcilable against chain state by id or transaction hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub id: String,
    pub owner_address: String,
    pub flight: FlightRef,
    pub ticket_price: Decimal,
    /// Amount actually charged, after any discount.
    pub premium: Decimal,
    pub original_premium: Decimal,
    pub discount_amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promo_code: Option<String>,
    pub status: PolicyStatus,
    pub expiration_date: NaiveDate,
    pub purchase_date: NaiveDate,
    /// Empty until the purchase transaction is confirmed.
    pub transaction_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim: Option<ClaimRecord>,
}

impl Policy {
    /// Case-insensitive owner comparison, the convention for account
    /// addresses throughout the API.
    pub fn owned_by(&self, address: &str) -> bool {
        self.owner_address.eq_ignore_ascii_case(address)
    }

    /// Coverage equals the ticket price (full reimbursement model).
    pub fn coverage_amount(&self) -> Decimal {
        self.ticket_price
    }

    /// Checks the premium arithmetic invariants:
    /// premium = original - discount, discount <= original, premium >= 0.
    pub fn premium_invariants_hold(&self) -> bool {
        self.premium == self.original_premium - self.discount_amount
            && self.discount_amount <= self.original_premium
            && self.premium >= Decimal::ZERO
            && self.discount_amount >= Decimal::ZERO
    }
}

/// Payload for creating a policy; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPolicy {
    pub owner_address: String,
    pub flight: FlightRef,
    pub ticket_price: Decimal,
    pub premium: Decimal,
    pub original_premium: Decimal,
    pub discount_amount: Decimal,
    pub promo_code: Option<String>,
    pub status: PolicyStatus,
    pub expiration_date: NaiveDate,
    pub purchase_date: NaiveDate,
    pub transaction_hash: String,
    pub claim: Option<ClaimRecord>,
}

impl NewPolicy {
    pub fn into_policy(self, id: String) -> Policy {
        Policy {
            id,
            owner_address: self.owner_address,
            flight: self.flight,
            ticket_price: self.ticket_price,
            premium: self.premium,
            original_premium: self.original_premium,
            discount_amount: self.discount_amount,
            promo_code: self.promo_code,
            status: self.status,
            expiration_date: self.expiration_date,
            purchase_date: self.purchase_date,
            transaction_hash: self.transaction_hash,
            claim: self.claim,
        }
    }
}
