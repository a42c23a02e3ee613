//! Premium arithmetic. The rate is mirrored on-chain and validated
//! independently by the contract, so both sides must agree exactly.

use rust_decimal::Decimal;

/// Premium rate in basis points: 500 bps = 5% of the ticket price.
pub const PREMIUM_BPS: u32 = 500;

/// Basis-point denominator shared with the contract.
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Base premium before any discount: ticket price x 5%.
pub fn base_premium(ticket_price: Decimal) -> Decimal {
    ticket_price * Decimal::from(PREMIUM_BPS) / Decimal::from(BPS_DENOMINATOR)
}

/// Coverage equals the ticket price (full reimbursement); the ratio is
/// fixed, not configurable per policy.
pub fn coverage_amount(ticket_price: Decimal) -> Decimal {
    ticket_price
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_premium_is_five_percent() {
        assert_eq!(base_premium(Decimal::from(8500)), Decimal::from(425));
        assert_eq!(base_premium(Decimal::from(3200)), Decimal::from(160));
        assert_eq!(base_premium(Decimal::from(5200)), Decimal::from(260));
    }

    #[test]
    fn base_premium_keeps_decimal_precision() {
        let price: Decimal = "1234.56".parse().unwrap();
        let expected: Decimal = "61.728".parse().unwrap();
        assert_eq!(base_premium(price), expected);
    }

    #[test]
    fn coverage_is_the_ticket_price() {
        let price = Decimal::from(8500);
        assert_eq!(coverage_amount(price), price);
    }
}
