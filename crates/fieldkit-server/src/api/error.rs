//! API error types and response handling.
//!
//! This module provides a unified error type for all API handlers
//! with automatic conversion to appropriate HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use fieldkit_core::FieldkitError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type.
///
/// Each variant maps to a specific HTTP status code and produces a
/// consistent JSON error response.
#[derive(Debug, Clone)]
pub enum ApiError {
    /// 400 Bad Request - Invalid input from client.
    BadRequest {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 403 Forbidden - A permission the feature needs has not been granted.
    Forbidden {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
        /// Feature and missing permission.
        details: Option<serde_json::Value>,
    },

    /// 404 Not Found - Resource does not exist.
    NotFound {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 409 Conflict - Operation cannot be completed due to current state.
    Conflict {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
        /// Identifier of the resource in conflict.
        resource_id: Option<String>,
    },

    /// 422 Unprocessable Entity - Well-formed input with invalid semantics.
    UnprocessableEntity {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 500 Internal Server Error - Unexpected server-side error.
    InternalError {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
        /// Optional details (not exposed to client in production).
        details: Option<String>,
    },

    /// 502 Bad Gateway - A peripheral rejected or dropped the request.
    BadGateway {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
        /// Device the failure concerns.
        resource_id: Option<String>,
    },

    /// 503 Service Unavailable - Radio hardware (Bluetooth, Wi-Fi) is unavailable.
    ServiceUnavailable {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
        /// Optional additional details.
        details: Option<String>,
    },
}

impl ApiError {
    /// 503 for Bluetooth routes when no adapter could be opened at startup.
    #[must_use]
    pub fn bluetooth_unavailable() -> Self {
        Self::from(FieldkitError::BluetoothAdapterNotFound)
    }
}

/// Standard JSON error response body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "INVALID_ZIPCODE",
    "message": "Invalid zipcode",
    "details": null
}))]
pub struct ErrorResponse {
    /// Machine-readable error code (e.g., "INVALID_ZIPCODE").
    #[schema(example = "INVALID_ZIPCODE")]
    pub error: String,

    /// Human-readable error message.
    #[schema(example = "Invalid zipcode")]
    pub message: String,

    /// Optional additional details for debugging.
    #[schema(nullable)]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match self {
            Self::BadRequest { error_code, message } => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: error_code,
                    message,
                    details: None,
                },
            ),

            Self::Forbidden {
                error_code,
                message,
                details,
            } => (
                StatusCode::FORBIDDEN,
                ErrorResponse {
                    error: error_code,
                    message,
                    details,
                },
            ),

            Self::NotFound { error_code, message } => (
                StatusCode::NOT_FOUND,
                ErrorResponse {
                    error: error_code,
                    message,
                    details: None,
                },
            ),

            Self::Conflict {
                error_code,
                message,
                resource_id,
            } => (
                StatusCode::CONFLICT,
                ErrorResponse {
                    error: error_code,
                    message,
                    details: resource_id.map(|id| serde_json::json!({ "id": id })),
                },
            ),

            Self::UnprocessableEntity { error_code, message } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorResponse {
                    error: error_code,
                    message,
                    details: None,
                },
            ),

            Self::InternalError {
                error_code,
                message,
                details,
            } => {
                // Log internal errors
                tracing::error!(
                    error_code = %error_code,
                    message = %message,
                    details = ?details,
                    "Internal server error"
                );

                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: error_code,
                        message,
                        details: details.map(|d| serde_json::json!(d)),
                    },
                )
            }

            Self::BadGateway {
                error_code,
                message,
                resource_id,
            } => (
                StatusCode::BAD_GATEWAY,
                ErrorResponse {
                    error: error_code,
                    message,
                    details: resource_id.map(|id| serde_json::json!({ "id": id })),
                },
            ),

            Self::ServiceUnavailable {
                error_code,
                message,
                details,
            } => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorResponse {
                    error: error_code,
                    message,
                    details: details.map(|d| serde_json::json!(d)),
                },
            ),
        };

        (status, Json(error_response)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest { message, .. } => write!(f, "Bad Request: {message}"),
            Self::Forbidden { message, .. } => write!(f, "Forbidden: {message}"),
            Self::NotFound { message, .. } => write!(f, "Not Found: {message}"),
            Self::Conflict { message, .. } => write!(f, "Conflict: {message}"),
            Self::UnprocessableEntity { message, .. } => {
                write!(f, "Unprocessable Entity: {message}")
            }
            Self::InternalError { message, .. } => {
                write!(f, "Internal Error: {message}")
            }
            Self::BadGateway { message, .. } => write!(f, "Bad Gateway: {message}"),
            Self::ServiceUnavailable { message, .. } => {
                write!(f, "Service Unavailable: {message}")
            }
        }
    }
}

impl std::error::Error for ApiError {}

/// Log a core error at a level matching how surprising it is.
///
/// Returns the level used.
fn log_core_error(err: &FieldkitError) -> Option<tracing::Level> {
    if err.is_expected_state() {
        tracing::debug!(error = %err, "Request refused");
        Some(tracing::Level::DEBUG)
    } else if err.is_recoverable() {
        tracing::warn!(error = %err, "Operation failed, a retry may succeed");
        Some(tracing::Level::WARN)
    } else if err.is_bluetooth_error() || err.is_wifi_error() {
        tracing::warn!(error = %err, "Radio unavailable");
        Some(tracing::Level::WARN)
    } else {
        // Client mistakes need no log; internal failures are logged on response.
        None
    }
}

/// Convert from fieldkit_core errors.
impl From<FieldkitError> for ApiError {
    fn from(err: FieldkitError) -> Self {
        log_core_error(&err);
        let error_code = err.error_code().to_string();
        let message = err.to_string();

        match err {
            FieldkitError::InvalidZipcode(_)
            | FieldkitError::InvalidCoordinates(_)
            | FieldkitError::EmptyBarcode
            | FieldkitError::InvalidDetail(_) => Self::BadRequest { error_code, message },
            FieldkitError::PermissionRequired {
                feature,
                permission,
            } => Self::Forbidden {
                error_code,
                message,
                details: Some(serde_json::json!({
                    "feature": feature,
                    "permission": permission
                })),
            },
            FieldkitError::DeviceNotFound(_) | FieldkitError::NetworkNotFound(_) => {
                Self::NotFound { error_code, message }
            }
            FieldkitError::DeviceNotAvailable(id) | FieldkitError::ConnectInProgress(id) => {
                Self::Conflict {
                    error_code,
                    message,
                    resource_id: Some(id),
                }
            }
            FieldkitError::ConfigParseError(_) | FieldkitError::ConfigValidationError(_) => {
                Self::UnprocessableEntity { error_code, message }
            }
            FieldkitError::ConnectFailed { id, .. } => Self::BadGateway {
                error_code,
                message,
                resource_id: Some(id),
            },
            FieldkitError::BluetoothAdapterNotFound
            | FieldkitError::BluetoothAdapterPoweredOff
            | FieldkitError::BluetoothScanFailed(_)
            | FieldkitError::WifiScanFailed(_)
            | FieldkitError::WifiUnavailable(_) => Self::ServiceUnavailable {
                error_code,
                message,
                details: None,
            },
            FieldkitError::ConfigNotFound(_)
            | FieldkitError::PersistenceError(_)
            | FieldkitError::IoError(_) => Self::InternalError {
                error_code,
                message,
                details: None,
            },
        }
    }
}

impl From<fieldkit_core::BluetoothError> for ApiError {
    fn from(err: fieldkit_core::BluetoothError) -> Self {
        Self::from(FieldkitError::from(err))
    }
}

impl From<fieldkit_core::WifiError> for ApiError {
    fn from(err: fieldkit_core::WifiError) -> Self {
        Self::from(FieldkitError::from(err))
    }
}

impl From<fieldkit_core::DetailError> for ApiError {
    fn from(err: fieldkit_core::DetailError) -> Self {
        Self::from(FieldkitError::from(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_request_error() {
        let err = ApiError::BadRequest {
            error_code: "test_error".to_string(),
            message: "Test message".to_string(),
        };
        assert!(err.to_string().contains("Bad Request"));
    }

    #[test]
    fn test_error_response_serialization() {
        let response = ErrorResponse {
            error: "test_error".to_string(),
            message: "Test message".to_string(),
            details: None,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("test_error"));
    }

    #[test]
    fn test_status_codes_follow_core_classification() {
        let cases = [
            FieldkitError::InvalidZipcode("00000".into()),
            FieldkitError::PermissionRequired {
                feature: "Bluetooth".into(),
                permission: "Location".into(),
            },
            FieldkitError::DeviceNotFound("AA".into()),
            FieldkitError::ConnectInProgress("AA".into()),
            FieldkitError::ConnectFailed {
                id: "AA".into(),
                message: "timeout".into(),
            },
            FieldkitError::WifiUnavailable("nmcli".into()),
            FieldkitError::PersistenceError("disk".into()),
        ];
        for err in cases {
            let expected = err.http_status_code();
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status().as_u16(), expected);
        }
    }

    #[test]
    fn test_log_level_follows_classification() {
        use tracing::Level;

        assert_eq!(
            log_core_error(&FieldkitError::InvalidZipcode("00000".into())),
            Some(Level::DEBUG)
        );
        assert_eq!(
            log_core_error(&FieldkitError::ConnectFailed {
                id: "AA".into(),
                message: "timeout".into(),
            }),
            Some(Level::WARN)
        );
        assert_eq!(
            log_core_error(&FieldkitError::BluetoothAdapterNotFound),
            Some(Level::WARN)
        );
        assert_eq!(log_core_error(&FieldkitError::EmptyBarcode), None);
        assert_eq!(
            log_core_error(&FieldkitError::PersistenceError("disk".into())),
            None
        );
    }

    #[test]
    fn test_connect_failure_message() {
        let err = ApiError::from(FieldkitError::ConnectFailed {
            id: "D0:2B:20:11:9F:04".into(),
            message: "le-connection-abort-by-local".into(),
        });
        match err {
            ApiError::BadGateway { message, .. } => {
                assert_eq!(message, "Failed to connect: le-connection-abort-by-local");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
