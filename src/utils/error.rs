use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, warn};

use crate::gateways::GatewayError;
use crate::lifecycle::LifecycleError;
use crate::promo::PromoError;
use crate::store::StoreError;
use crate::utils::response::error as error_response;

/// Top-level API error. Everything a handler can fail with converges
/// here and maps onto one of five statuses: 400 validation, 404 not
/// found, 409 state conflict, 502 could-not-verify, 500 internal.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// An upstream dependency could not answer. Distinct from NotFound:
    /// the caller must not treat this as "the flight does not exist".
    #[error("{0}")]
    CouldNotVerify(String),

    #[error(transparent)]
    Promo(#[from] PromoError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("internal server error")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            // An unknown code is a missing resource; the other promo
            // failures are rejections of a valid request.
            Self::Promo(PromoError::CodeNotFound) => StatusCode::NOT_FOUND,
            Self::Promo(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::CouldNotVerify(_) => StatusCode::BAD_GATEWAY,
            Self::Lifecycle(e) => lifecycle_status(e),
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        let status = self.status_code();
        if status == StatusCode::BAD_REQUEST {
            "validation_error"
        } else if status == StatusCode::NOT_FOUND {
            "not_found"
        } else if status == StatusCode::CONFLICT {
            "conflict"
        } else if status == StatusCode::BAD_GATEWAY {
            "could_not_verify"
        } else {
            "internal_error"
        }
    }
}

fn lifecycle_status(e: &LifecycleError) -> StatusCode {
    match e {
        LifecycleError::PolicyNotFound => StatusCode::NOT_FOUND,
        LifecycleError::PolicyAlreadyClaimed
        | LifecycleError::PolicyNotActive
        | LifecycleError::ClaimNotPending { .. } => StatusCode::CONFLICT,
        LifecycleError::OwnerAddressRequired => StatusCode::BAD_REQUEST,
        LifecycleError::Store(StoreError::NotFound) => StatusCode::NOT_FOUND,
        LifecycleError::Store(StoreError::StatusConflict { .. }) => StatusCode::CONFLICT,
        LifecycleError::Store(StoreError::Database(_)) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => Self::NotFound("policy not found".to_string()),
            StoreError::StatusConflict { actual } => {
                Self::Conflict(format!("policy is {actual}"))
            }
            StoreError::Database(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::UnsupportedAirline(airline) => {
                Self::Validation(format!("unsupported airline: {airline}"))
            }
            other => Self::CouldNotVerify(format!(
                "could not verify flight status: {other}"
            )),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let kind = self.kind();

        // Internal details stay in the log; the wire message is sanitized.
        let public_message = match &self {
            Self::Internal(detail) => {
                error!(%detail, "internal error");
                "an unexpected error occurred".to_string()
            }
            Self::Lifecycle(LifecycleError::Store(StoreError::Database(e))) => {
                error!(error = ?e, "database error");
                "an unexpected error occurred".to_string()
            }
            other => {
                warn!(%status, error = %other, "request failed");
                other.to_string()
            }
        };

        error_response(kind, public_message, status)
    }
}
