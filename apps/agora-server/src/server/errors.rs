use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use super::{
    metrics::{record_auth_failure, record_operation_outcome},
    store::StoreError,
    types::AuthError,
};

/// Failures raised at the HTTP boundary, before any service runs.
#[derive(Debug)]
pub(crate) enum AuthFailure {
    InvalidRequest,
    Unauthorized,
    Internal,
}

impl std::fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl IntoResponse for AuthFailure {
    fn into_response(self) -> axum::response::Response {
        match self {
            Self::Unauthorized => record_auth_failure("unauthorized"),
            Self::InvalidRequest => record_auth_failure("invalid_request"),
            Self::Internal => {}
        }

        let (status, error) = match self {
            Self::InvalidRequest => (StatusCode::BAD_REQUEST, "invalid_request"),
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "invalid_credentials"),
            Self::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };
        (status, Json(AuthError { error })).into_response()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum FailureKind {
    NotFound,
    PermissionDenied,
    InvalidState,
    Conflict,
    Unexpected,
}

impl FailureKind {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::PermissionDenied => "permission_denied",
            Self::InvalidState => "invalid_state",
            Self::Conflict => "conflict",
            Self::Unexpected => "unexpected",
        }
    }

    pub(crate) const fn status(self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::PermissionDenied => StatusCode::FORBIDDEN,
            Self::InvalidState => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Unexpected => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Internal error of a service operation. Never crosses the service boundary;
/// `Outcome::settle` turns it into a failure result.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub(crate) struct ServiceError {
    pub(crate) kind: FailureKind,
    pub(crate) message: String,
}

impl ServiceError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self::new(FailureKind::NotFound, message)
    }

    pub(crate) fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(FailureKind::PermissionDenied, message)
    }

    pub(crate) fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(FailureKind::InvalidState, message)
    }

    pub(crate) fn conflict(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Conflict, message)
    }

    pub(crate) fn unexpected(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Unexpected, message)
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Duplicate => Self::conflict("Record already exists"),
            StoreError::VersionConflict => {
                Self::conflict("Record was modified concurrently, retry the operation")
            }
            other => Self::unexpected(other.to_string()),
        }
    }
}

pub(crate) type ServiceResult<T> = Result<T, ServiceError>;

/// The `(success, message, result)` triple every service operation returns.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct Outcome<T> {
    pub(crate) success: bool,
    pub(crate) message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) result: Option<T>,
    #[serde(skip)]
    pub(crate) failure: Option<FailureKind>,
}

impl<T> Outcome<T> {
    /// Converts a service result into an outcome and logs it under `event`.
    pub(crate) fn settle(
        event: &'static str,
        success_message: &str,
        result: ServiceResult<T>,
    ) -> Self {
        match result {
            Ok(value) => {
                tracing::info!(event = event, outcome = "ok");
                record_operation_outcome(event, "ok");
                Self {
                    success: true,
                    message: success_message.to_owned(),
                    result: Some(value),
                    failure: None,
                }
            }
            Err(error) => {
                if error.kind == FailureKind::Unexpected {
                    tracing::error!(event = event, outcome = error.kind.as_str(), error = %error.message);
                } else {
                    tracing::warn!(event = event, outcome = error.kind.as_str(), reason = %error.message);
                }
                record_operation_outcome(event, error.kind.as_str());
                Self {
                    success: false,
                    message: error.message,
                    result: None,
                    failure: Some(error.kind),
                }
            }
        }
    }

    pub(crate) fn is_success(&self) -> bool {
        self.success
    }

    pub(crate) fn failure(&self) -> Option<FailureKind> {
        self.failure
    }

    pub(crate) fn into_result(self) -> Option<T> {
        self.result
    }
}

impl<T: Serialize> IntoResponse for Outcome<T> {
    fn into_response(self) -> axum::response::Response {
        let status = self.failure.map_or(StatusCode::OK, FailureKind::status);
        (status, Json(self)).into_response()
    }
}

pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_current_span(true)
        .with_span_list(true)
        .init();
}
