//! Typed interface to the insurance contract. The contract is the
//! source of truth for purchase and payout; this module only defines the
//! call surface and the parameter encodings both sides agree on.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::GatewayError;

/// Seconds in a day, used for the expiration floor.
const SECONDS_PER_DAY: i64 = 86_400;

/// Fixed-point scale of the settlement asset (USDC, 6 decimals).
const ASSET_DECIMALS: u32 = 6;

/// A policy as the contract stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnChainPolicy {
    pub id: u64,
    pub user: String,
    pub flight_id: u64,
    /// 6-decimal fixed point.
    pub ticket_price: u64,
    pub premium_paid: u64,
    pub coverage_amount: u64,
    /// Unix seconds.
    pub expiration: i64,
    pub active: bool,
    pub claimed: bool,
}

/// Parameters for `buy_policy`. Airline and flight number travel as
/// fixed 32-byte identifiers, the departure airport as its 3-byte IATA
/// code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuyPolicyParams {
    pub flight_id: u64,
    /// 6-decimal fixed point.
    pub ticket_price: u64,
    /// Unix seconds; must exceed the flight date by at least one day.
    pub expiration: i64,
    pub airline: [u8; 32],
    pub flight_number: [u8; 32],
    /// Unix seconds at the start of the flight day (UTC).
    pub flight_date: i64,
    pub departure_airport_iata: [u8; 3],
}

impl BuyPolicyParams {
    pub fn new(
        flight_date: NaiveDate,
        flight_number: &str,
        airline: &str,
        departure_airport_iata: &str,
        ticket_price: Decimal,
    ) -> Self {
        let flight_ts = flight_date
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always valid")
            .and_utc()
            .timestamp();
        Self {
            flight_id: flight_id(flight_date, flight_number),
            ticket_price: to_asset_units(ticket_price),
            expiration: expiration_for(flight_date),
            airline: encode_fixed::<32>(airline),
            flight_number: encode_fixed::<32>(flight_number),
            flight_date: flight_ts,
            departure_airport_iata: encode_fixed::<3>(departure_airport_iata),
        }
    }
}

/// Deterministic flight id: the digits of the date (`YYYYMMDD`) followed
/// by the digits of the flight number, truncated to 18 characters so the
/// result always fits a u64.
pub fn flight_id(date: NaiveDate, flight_number: &str) -> u64 {
    let date_digits = date.format("%Y%m%d").to_string();
    let number_digits: String = flight_number.chars().filter(|c| c.is_ascii_digit()).collect();
    let combined: String = format!("{date_digits}{number_digits}")
        .chars()
        .take(18)
        .collect();
    combined.parse().expect("date digits guarantee a numeric prefix")
}

/// Converts a decimal amount to the asset's 6-decimal fixed point,
/// truncating sub-unit precision.
pub fn to_asset_units(amount: Decimal) -> u64 {
    let scaled = amount * Decimal::from(10u64.pow(ASSET_DECIMALS));
    scaled.trunc().to_u64().unwrap_or(0)
}

/// Expiration for a flight date: the midnight after the flight day, i.e.
/// exactly one day past its start. The contract rejects expirations at
/// or before the flight date.
pub fn expiration_for(flight_date: NaiveDate) -> i64 {
    let start = flight_date
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always valid")
        .and_utc()
        .timestamp();
    start + SECONDS_PER_DAY
}

/// Right-pads `s` with zero bytes into a fixed-width identifier,
/// truncating if the input is longer.
pub fn encode_fixed<const N: usize>(s: &str) -> [u8; N] {
    let mut out = [0u8; N];
    let bytes = s.as_bytes();
    let len = bytes.len().min(N);
    out[..len].copy_from_slice(&bytes[..len]);
    out
}

/// The contract call surface this backend consumes.
#[async_trait]
pub trait ChainGateway: Send + Sync {
    async fn buy_policy(&self, params: BuyPolicyParams) -> Result<String, GatewayError>;

    async fn request_claim(&self, policy_id: u64) -> Result<String, GatewayError>;

    async fn verify_and_pay_claim(
        &self,
        policy_id: u64,
        triggered: bool,
    ) -> Result<String, GatewayError>;

    async fn get_policy(&self, policy_id: u64) -> Result<Option<OnChainPolicy>, GatewayError>;

    async fn get_user_policies(&self, address: &str) -> Result<Vec<u64>, GatewayError>;
}
