use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Normalized flight status. Upstream providers each have their own
/// vocabulary; everything funnels through this enum before it reaches
/// quoting or claim handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightStatus {
    OnTime,
    Delayed,
    Cancelled,
    Diverted,
    InFlight,
    Completed,
    Unknown,
}

impl FlightStatus {
    /// Maps the AeroDataBox status vocabulary onto the normalized enum.
    /// Unrecognized values fall through to `Unknown` rather than failing
    /// the whole lookup.
    pub fn from_upstream(raw: &str) -> Self {
        match raw {
            "Expected" | "Scheduled" => Self::OnTime,
            "Delayed" => Self::Delayed,
            "Cancelled" => Self::Cancelled,
            "Diverted" => Self::Diverted,
            "In Flight" => Self::InFlight,
            "Landed" => Self::Completed,
            _ => Self::Unknown,
        }
    }

    /// Whether this status triggers the parametric payout condition.
    pub fn triggers_claim(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Diverted)
    }
}

/// One endpoint of a flight as reported upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightLeg {
    pub airport: String,
    pub airport_iata: String,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_time_local: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_time_utc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal: Option<String>,
}

/// A resolved flight-status lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightStatusInfo {
    pub airline: String,
    pub airline_iata: String,
    pub flight_number: String,
    pub date: NaiveDate,
    pub status: FlightStatus,
    /// The provider's untranslated status string, kept for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_status: Option<String>,
    pub departure: FlightLeg,
    pub arrival: FlightLeg,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aircraft: Option<String>,
}
