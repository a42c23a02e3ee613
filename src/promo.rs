//! Promo-code validation and discount quoting.
//!
//! Applying a code is a pure read: the engine validates against the
//! registry and produces a quote, but never increments `current_uses`.
//! Redemption accounting belongs to whatever persists the registry.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use thiserror::Error;

use crate::models::promo::{DiscountType, PromoCode, Quote};
use crate::premium::base_premium;

/// Why a code could not be applied. Ordering of checks is part of the
/// contract: existence, expiry, exhaustion, minimum price.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PromoError {
    #[error("the promo code is not valid")]
    CodeNotFound,

    #[error("this promo code expired on {expired_on}")]
    CodeExpired { expired_on: NaiveDate },

    #[error("this promo code has reached its usage limit")]
    CodeExhausted,

    #[error("this promo code requires a minimum ticket price of {minimum}")]
    MinimumPriceNotMet { minimum: Decimal },
}

/// Read-only lookup over the code registry. Matching is case-insensitive.
pub trait PromoCodeRepository: Send + Sync {
    fn find(&self, code: &str) -> Option<PromoCode>;
}

/// Static in-memory registry. The production replacement is a database
/// table with transactional redemption; the lookup contract is the same.
pub struct InMemoryPromoCodes {
    codes: HashMap<String, PromoCode>,
}

impl InMemoryPromoCodes {
    pub fn new(codes: impl IntoIterator<Item = PromoCode>) -> Self {
        Self {
            codes: codes
                .into_iter()
                .map(|c| (c.code.to_uppercase(), c))
                .collect(),
        }
    }

    /// The launch campaign codes.
    pub fn seeded() -> Self {
        Self::new([
            PromoCode {
                code: "WELCOME10".to_string(),
                discount_type: DiscountType::Percentage,
                discount_value: Decimal::from(10),
                max_uses: Some(100),
                current_uses: 45,
                expires_at: NaiveDate::from_ymd_opt(2024, 12, 31),
                min_ticket_price: None,
                is_valid: true,
            },
            PromoCode {
                code: "SAVE50".to_string(),
                discount_type: DiscountType::Fixed,
                discount_value: Decimal::from(50),
                max_uses: Some(50),
                current_uses: 50,
                expires_at: None,
                min_ticket_price: None,
                is_valid: true,
            },
            PromoCode {
                code: "FLIGHT20".to_string(),
                discount_type: DiscountType::Percentage,
                discount_value: Decimal::from(20),
                max_uses: Some(200),
                current_uses: 120,
                expires_at: NaiveDate::from_ymd_opt(2024, 6, 30),
                min_ticket_price: Some(Decimal::from(5000)),
                is_valid: true,
            },
            PromoCode {
                code: "EARLYBIRD".to_string(),
                discount_type: DiscountType::Percentage,
                discount_value: Decimal::from(15),
                max_uses: None,
                current_uses: 0,
                expires_at: NaiveDate::from_ymd_opt(2024, 3, 31),
                min_ticket_price: None,
                is_valid: true,
            },
        ])
    }
}

impl PromoCodeRepository for InMemoryPromoCodes {
    fn find(&self, code: &str) -> Option<PromoCode> {
        self.codes.get(&code.to_uppercase()).cloned()
    }
}

/// What percentage discounts are computed against.
///
/// The shipped behavior computes them against the ticket price and then
/// subtracts the result from the premium, so a 20%-off code on an 8500
/// ticket wipes out a 425 premium entirely. Product has not signed off
/// on changing this, so `TicketPrice` stays the default and the
/// alternative is behind this knob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiscountBasis {
    #[default]
    TicketPrice,
    Premium,
}

/// Validates promo codes and computes discounted premium quotes.
pub struct PromoCodeEngine {
    repo: Box<dyn PromoCodeRepository>,
    basis: DiscountBasis,
}

impl PromoCodeEngine {
    pub fn new(repo: Box<dyn PromoCodeRepository>) -> Self {
        Self {
            repo,
            basis: DiscountBasis::default(),
        }
    }

    pub fn with_basis(repo: Box<dyn PromoCodeRepository>, basis: DiscountBasis) -> Self {
        Self { repo, basis }
    }

    /// Applies `code` to a quote for `ticket_price`, using today's date
    /// for expiry checks. Input validation (non-empty code, positive
    /// price) happens at the API boundary.
    pub fn apply_code(&self, code: &str, ticket_price: Decimal) -> Result<Quote, PromoError> {
        self.apply_code_at(code, ticket_price, Utc::now().date_naive())
    }

    /// Like [`apply_code`](Self::apply_code) with an explicit "today".
    pub fn apply_code_at(
        &self,
        code: &str,
        ticket_price: Decimal,
        today: NaiveDate,
    ) -> Result<Quote, PromoError> {
        let promo = self
            .repo
            .find(code)
            .filter(|c| c.is_valid)
            .ok_or(PromoError::CodeNotFound)?;

        if let Some(expires_at) = promo.expires_at {
            if expires_at < today {
                return Err(PromoError::CodeExpired {
                    expired_on: expires_at,
                });
            }
        }

        if let Some(max_uses) = promo.max_uses {
            if promo.current_uses >= max_uses {
                return Err(PromoError::CodeExhausted);
            }
        }

        if let Some(minimum) = promo.min_ticket_price {
            if ticket_price < minimum {
                return Err(PromoError::MinimumPriceNotMet { minimum });
            }
        }

        let original_premium = base_premium(ticket_price);
        let discount_amount = match promo.discount_type {
            DiscountType::Percentage => {
                let basis = match self.basis {
                    DiscountBasis::TicketPrice => ticket_price,
                    DiscountBasis::Premium => original_premium,
                };
                basis * promo.discount_value / Decimal::from(100)
            }
            DiscountType::Fixed => promo.discount_value.min(ticket_price),
        };
        let discounted_premium = (original_premium - discount_amount).max(Decimal::ZERO);

        Ok(Quote {
            code: promo.code.clone(),
            discount_type: promo.discount_type,
            discount_value: promo.discount_value,
            discount_amount,
            original_ticket_price: ticket_price,
            original_premium,
            discounted_premium,
            final_premium: discounted_premium,
            remaining_uses: promo.remaining_uses(),
            expires_at: promo.expires_at,
        })
    }
}
