pub mod claim;
pub mod flight;
pub mod policy;
pub mod promo;

pub use claim::Claim;
pub use flight::{FlightLeg, FlightStatus, FlightStatusInfo};
pub use policy::{ClaimRecord, ClaimSubStatus, FlightRef, NewPolicy, Policy, PolicyStatus};
pub use promo::{DiscountType, PromoCode, Quote};
