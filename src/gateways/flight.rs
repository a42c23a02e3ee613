//! Flight-status lookups against AeroDataBox.
//!
//! The lookup gates both purchase-time validation and claim triggers, so
//! it fails closed: a timeout or upstream failure surfaces as an error
//! ("cannot verify"), never as a not-found or a status.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

use super::GatewayError;
use crate::models::flight::{FlightLeg, FlightStatus, FlightStatusInfo};

const DEFAULT_BASE_URL: &str = "https://aerodatabox.p.rapidapi.com";
const RAPIDAPI_HOST: &str = "aerodatabox.p.rapidapi.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A flight to look up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlightQuery {
    pub airline: String,
    pub flight_number: String,
    pub date: NaiveDate,
    pub departure_airport: Option<String>,
}

#[async_trait]
pub trait FlightStatusGateway: Send + Sync {
    /// Resolves a flight's status. `Ok(None)` means the flight does not
    /// exist; errors mean the answer is unknown.
    async fn lookup(&self, query: &FlightQuery)
        -> Result<Option<FlightStatusInfo>, GatewayError>;
}

/// IATA code for a supported airline name, matched case-insensitively.
pub fn airline_iata(airline: &str) -> Option<&'static str> {
    match airline.to_lowercase().as_str() {
        "aeromexico" => Some("AM"),
        "volaris" => Some("Y4"),
        "vivaaerobus" => Some("VB"),
        "interjet" => Some("IJ"),
        "american" => Some("AA"),
        "delta" => Some("DL"),
        "copa" => Some("CM"),
        _ => None,
    }
}

/// Uppercases, strips whitespace, and drops a leading two-letter airline
/// prefix so "AM 123" and "123" query the same flight.
pub fn normalize_flight_number(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .to_uppercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let prefix_len = cleaned
        .chars()
        .take(2)
        .filter(|c| c.is_ascii_alphabetic())
        .count();
    if prefix_len == 2 {
        cleaned.chars().skip(2).collect()
    } else {
        cleaned
    }
}

// AeroDataBox wire types; everything optional because the upstream
// omits whatever it does not know.

#[derive(Debug, Deserialize)]
struct UpstreamFlight {
    number: Option<String>,
    airline: Option<UpstreamAirline>,
    departure: Option<UpstreamLeg>,
    arrival: Option<UpstreamLeg>,
    status: Option<String>,
    aircraft: Option<UpstreamAircraft>,
}

#[derive(Debug, Deserialize)]
struct UpstreamAirline {
    name: Option<String>,
    iata: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpstreamLeg {
    airport: Option<UpstreamAirport>,
    #[serde(rename = "scheduledTime")]
    scheduled_time: Option<UpstreamTime>,
    terminal: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpstreamAirport {
    name: Option<String>,
    iata: Option<String>,
    #[serde(rename = "municipalityName")]
    municipality_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpstreamTime {
    local: Option<String>,
    utc: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpstreamAircraft {
    model: Option<String>,
}

// Single-flight responses arrive as a bare object, multi-leg days as an
// array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UpstreamResponse {
    Many(Vec<UpstreamFlight>),
    One(Box<UpstreamFlight>),
}

impl UpstreamResponse {
    fn into_flights(self) -> Vec<UpstreamFlight> {
        match self {
            Self::Many(flights) => flights,
            Self::One(flight) => vec![*flight],
        }
    }
}

fn leg_from_upstream(leg: Option<UpstreamLeg>, fallback_iata: &str) -> FlightLeg {
    let leg = leg.unwrap_or(UpstreamLeg {
        airport: None,
        scheduled_time: None,
        terminal: None,
    });
    let airport = leg.airport;
    FlightLeg {
        airport: airport
            .as_ref()
            .and_then(|a| a.name.clone())
            .unwrap_or_else(|| "Unknown".to_string()),
        airport_iata: airport
            .as_ref()
            .and_then(|a| a.iata.clone())
            .unwrap_or_else(|| fallback_iata.to_string()),
        city: airport
            .and_then(|a| a.municipality_name)
            .unwrap_or_default(),
        scheduled_time_local: leg
            .scheduled_time
            .as_ref()
            .and_then(|t| t.local.as_deref())
            .and_then(|local| local.split('T').nth(1))
            .map(|time| time.chars().take(5).collect()),
        scheduled_time_utc: leg.scheduled_time.and_then(|t| t.utc),
        terminal: leg.terminal,
    }
}

fn map_flight(
    flight: UpstreamFlight,
    query: &FlightQuery,
    airline_code: &str,
    clean_number: &str,
) -> FlightStatusInfo {
    let status = flight
        .status
        .as_deref()
        .map(FlightStatus::from_upstream)
        .unwrap_or(FlightStatus::Unknown);

    FlightStatusInfo {
        airline: flight
            .airline
            .as_ref()
            .and_then(|a| a.name.clone())
            .unwrap_or_else(|| query.airline.clone()),
        airline_iata: flight
            .airline
            .and_then(|a| a.iata)
            .unwrap_or_else(|| airline_code.to_string()),
        flight_number: flight
            .number
            .unwrap_or_else(|| format!("{airline_code}{clean_number}")),
        date: query.date,
        status,
        raw_status: flight.status,
        departure: leg_from_upstream(
            flight.departure,
            query.departure_airport.as_deref().unwrap_or(""),
        ),
        arrival: leg_from_upstream(flight.arrival, ""),
        aircraft: flight.aircraft.and_then(|a| a.model),
    }
}

pub struct AeroDataBoxGateway {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AeroDataBoxGateway {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client construction cannot fail with static config");
        Self {
            client,
            api_key,
            base_url,
        }
    }
}

#[async_trait]
impl FlightStatusGateway for AeroDataBoxGateway {
    async fn lookup(
        &self,
        query: &FlightQuery,
    ) -> Result<Option<FlightStatusInfo>, GatewayError> {
        let airline_code = airline_iata(&query.airline)
            .ok_or_else(|| GatewayError::UnsupportedAirline(query.airline.clone()))?;
        let clean_number = normalize_flight_number(&query.flight_number);
        let date = query.date.format("%Y-%m-%d");

        let url = format!(
            "{}/flights/number/{airline_code}{clean_number}/{date}\
             ?withAircraftImage=false&withLocation=false&dateLocalRole=Both",
            self.base_url
        );

        let response = self
            .client
            .get(&url)
            .header("x-rapidapi-key", &self.api_key)
            .header("x-rapidapi-host", RAPIDAPI_HOST)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout
                } else {
                    GatewayError::Transport(e)
                }
            })?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "flight status lookup failed");
            return Err(GatewayError::UpstreamStatus(status.as_u16()));
        }

        let body = response.text().await.map_err(GatewayError::Transport)?;
        let parsed: UpstreamResponse = serde_json::from_str(&body)
            .map_err(|e| GatewayError::Decode(e.to_string()))?;

        let mut flights = parsed.into_flights();
        if let Some(wanted) = &query.departure_airport {
            flights.retain(|f| {
                f.departure
                    .as_ref()
                    .and_then(|leg| leg.airport.as_ref())
                    .and_then(|a| a.iata.as_deref())
                    .is_some_and(|iata| iata.eq_ignore_ascii_case(wanted))
            });
        }

        Ok(flights
            .into_iter()
            .next()
            .map(|f| map_flight(f, query, airline_code, &clean_number)))
    }
}
