use axum::extract::{Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::gateways::FlightQuery;
use crate::models::flight::FlightStatusInfo;
use crate::state::AppState;
use crate::utils::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightStatusParams {
    pub airline: String,
    pub flight_number: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub departure_airport: Option<String>,
}

pub async fn flight_status(
    State(state): State<AppState>,
    Query(params): Query<FlightStatusParams>,
) -> Result<Json<FlightStatusInfo>, AppError> {
    if params.airline.trim().is_empty() || params.flight_number.trim().is_empty() {
        return Err(AppError::Validation(
            "airline and flight number are required".to_string(),
        ));
    }

    let gateway = state.flight.as_ref().ok_or_else(|| {
        AppError::CouldNotVerify("flight status provider is not configured".to_string())
    })?;

    let query = FlightQuery {
        airline: params.airline,
        flight_number: params.flight_number,
        date: params.date,
        departure_airport: params.departure_airport,
    };

    match gateway.lookup(&query).await? {
        Some(info) => Ok(Json(info)),
        None => Err(AppError::NotFound("no matching flight found".to_string())),
    }
}
