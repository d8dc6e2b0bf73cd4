// HTTP API Error Types
use axum::extract::rejection::JsonRejection;
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::database::error::DatabaseError;
use crate::services::provisioning::{ProvisioningError, ProvisioningStage};
use crate::vault::VaultError;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },
    InvalidJson(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 500 Internal Server Error
    InternalServerError(String),
    ProvisioningFailed {
        message: String,
        stage: ProvisioningStage,
    },

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ValidationError { .. } => 400,
            ApiError::InvalidJson(_) => 400,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::InternalServerError(_) => 500,
            ApiError::ProvisioningFailed { .. } => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ValidationError { message, .. } => message,
            ApiError::InvalidJson(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::ProvisioningFailed { message, .. } => message,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        match self {
            ApiError::ValidationError { message, field_errors } => {
                let mut response = json!({
                    "error": true,
                    "message": message,
                    "code": "VALIDATION_ERROR"
                });

                if let Some(field_errors) = field_errors {
                    response["field_errors"] = json!(field_errors);
                }

                response
            }
            ApiError::ProvisioningFailed { message, stage } => {
                json!({
                    "error": true,
                    "message": message,
                    "code": "PROVISIONING_FAILED",
                    "stage": stage
                })
            }
            _ => {
                json!({
                    "error": true,
                    "message": self.message(),
                    "code": self.error_code()
                })
            }
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::InvalidJson(_) => "INVALID_JSON",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ProvisioningFailed { .. } => "PROVISIONING_FAILED",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(message: impl Into<String>, field_errors: Option<HashMap<String, String>>) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors,
        }
    }

    pub fn invalid_json(message: impl Into<String>) -> Self {
        ApiError::InvalidJson(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

// Convert other error types to ApiError
impl From<ProvisioningError> for ApiError {
    fn from(err: ProvisioningError) -> Self {
        match err {
            ProvisioningError::Validation(msg) => ApiError::validation_error(msg, None),
            ProvisioningError::Conflict(msg) => ApiError::conflict(msg),
            ProvisioningError::NotFound(msg) => ApiError::not_found(msg),
            ProvisioningError::Resolution(msg) => {
                tracing::error!("Configuration resolution error: {}", msg);
                ApiError::internal_server_error("Tenant configuration is inconsistent")
            }
            ProvisioningError::Resource { stage, source } => ApiError::ProvisioningFailed {
                message: format!("Provisioning failed: {}", source),
                stage,
            },
            ProvisioningError::Decryption(e) => {
                tracing::error!("Secret decryption failed: {}", e);
                ApiError::internal_server_error("Stored secret could not be decrypted")
            }
            // Surfaced verbatim; the caller decides whether to retry
            ProvisioningError::Connection(e) => ApiError::service_unavailable(e.to_string()),
            ProvisioningError::Store(e) => e.into(),
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(msg) => ApiError::not_found(msg),
            DatabaseError::Duplicate(msg) => ApiError::conflict(format!("{} already exists", msg)),
            DatabaseError::ConfigMissing(what) => {
                tracing::error!("Missing configuration: {}", what);
                ApiError::service_unavailable("Database is not configured")
            }
            DatabaseError::Sqlx(sqlx::Error::PoolTimedOut) | DatabaseError::Sqlx(sqlx::Error::Io(_)) => {
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            DatabaseError::Migration(e) => {
                tracing::error!("Migration error: {}", e);
                ApiError::service_unavailable("Service is being updated, please try again later")
            }
            other => {
                // Log the real error but return generic message
                tracing::error!("Database error: {}", other);
                ApiError::internal_server_error("Database error occurred")
            }
        }
    }
}

impl From<VaultError> for ApiError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::MalformedIv(_) | VaultError::MalformedContent(_) | VaultError::MissingContent => {
                ApiError::bad_request(err.to_string())
            }
            other => {
                tracing::error!("Vault error: {}", other);
                ApiError::internal_server_error("Vault operation failed")
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::invalid_json(rejection.body_text())
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::registry::ConnectionError;
    use crate::services::provisioning::ResourceError;
    use crate::kv::KvError;

    #[test]
    fn provisioning_errors_map_to_status_codes() {
        let cases: Vec<(ProvisioningError, u16)> = vec![
            (ProvisioningError::Validation("bad".into()), 400),
            (ProvisioningError::Conflict("dup".into()), 409),
            (ProvisioningError::NotFound("gone".into()), 404),
            (ProvisioningError::Resolution("broken".into()), 500),
            (
                ProvisioningError::Resource {
                    stage: ProvisioningStage::ResourcesProvisioned,
                    source: ResourceError::Publish(KvError::Unavailable("down".into())),
                },
                500,
            ),
            (ProvisioningError::Decryption(VaultError::KeyMismatch), 500),
            (
                ProvisioningError::Connection(ConnectionError::Database {
                    target: "eu-1".into(),
                    source: sqlx::Error::PoolTimedOut,
                }),
                503,
            ),
            (ProvisioningError::Store(DatabaseError::Corrupt("x".into())), 500),
        ];
        for (err, status) in cases {
            let label = err.to_string();
            assert_eq!(ApiError::from(err).status_code(), status, "{}", label);
        }
    }

    #[test]
    fn resource_failure_reports_stage() {
        let err = ApiError::from(ProvisioningError::Resource {
            stage: ProvisioningStage::Resolved,
            source: ResourceError::Publish(KvError::Unavailable("down".into())),
        });
        let body = err.to_json();
        assert_eq!(body["code"], "PROVISIONING_FAILED");
        assert_eq!(body["stage"], "resolved");
        assert_eq!(body["error"], true);
    }

    #[test]
    fn connection_error_is_surfaced_verbatim() {
        let err = ApiError::from(ProvisioningError::Connection(ConnectionError::Database {
            target: "eu-1".into(),
            source: sqlx::Error::PoolTimedOut,
        }));
        assert!(err.message().contains("eu-1"));
    }
}
