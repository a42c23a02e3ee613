//! External collaborators: the on-chain insurance contract and the
//! flight-status provider. Both are consumed through traits so handlers
//! and lifecycle code never depend on a concrete transport.

use thiserror::Error;

pub mod chain;
pub mod flight;

pub use chain::{BuyPolicyParams, ChainGateway, OnChainPolicy};
pub use flight::{AeroDataBoxGateway, FlightQuery, FlightStatusGateway};

/// Gateway failures. None of these mean "verified false": a timeout or
/// upstream error is a could-not-verify condition and callers must treat
/// it as such.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request to upstream service timed out")]
    Timeout,

    #[error("upstream service returned status {0}")]
    UpstreamStatus(u16),

    #[error("could not decode upstream response: {0}")]
    Decode(String),

    #[error("unsupported airline: {0}")]
    UnsupportedAirline(String),

    #[error("transport error")]
    Transport(#[from] reqwest::Error),
}
