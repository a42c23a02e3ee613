use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

/// A promotional code as defined in the code registry.
///
/// Invariant: `current_uses <= max_uses` whenever `max_uses` is set.
/// Redemption tracking lives outside this model; applying a code never
/// mutates `current_uses` here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoCode {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_uses: Option<u32>,
    pub current_uses: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_ticket_price: Option<Decimal>,
    /// Manual kill-switch; an invalid code behaves as if it did not exist.
    pub is_valid: bool,
}

impl PromoCode {
    /// Uses left before the code is exhausted, `None` if unbounded.
    pub fn remaining_uses(&self) -> Option<u32> {
        self.max_uses
            .map(|max| max.saturating_sub(self.current_uses))
    }
}

/// A successful quote for a promo-code application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub discount_amount: Decimal,
    pub original_ticket_price: Decimal,
    pub original_premium: Decimal,
    pub discounted_premium: Decimal,
    pub final_premium: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_uses: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<NaiveDate>,
}
