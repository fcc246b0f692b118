//! Error handling for the provenance ledger.
//!
//! This module provides:
//! - A single error type with a stable, machine-readable [`ErrorCode`]
//! - User-facing vs internal messages
//! - HTTP status mapping for the API layer
//! - Severity-aware logging through `tracing`
//! - An error counter exported through `metrics`
//!
//! # Usage
//!
//! ```rust,ignore
//! use amprov_core::error::{ProvenanceError, Result, ErrorContext};
//!
//! fn decode(bytes: &[u8]) -> Result<Asset> {
//!     serde_json::from_slice(bytes).with_error_code(ErrorCode::DeserializationFailed)
//! }
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::{error, warn};

// ═══════════════════════════════════════════════════════════════════════════════
// Result Type Alias
// ═══════════════════════════════════════════════════════════════════════════════

/// A specialized Result type for ledger operations.
pub type Result<T> = std::result::Result<T, ProvenanceError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Error Codes
// ═══════════════════════════════════════════════════════════════════════════════

/// Machine-readable error codes.
///
/// These codes are stable: the HTTP layer serializes them and remote callers
/// rebuild the same failure kind from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Ledger Errors (1000-1099)
    AssetAlreadyExists,
    AssetNotFound,
    InvalidStageTransition,
    WriteConflict,
    InvalidInput,

    // Store Errors (2000-2099)
    PersistenceFailed,
    StoreConnectionFailed,

    // Serialization Errors (2200-2299)
    SerializationFailed,
    DeserializationFailed,

    // Harness / Transport Errors (3000-3099)
    CallTimeout,
    TransportFailed,

    // Configuration Errors (5000-5099)
    ConfigurationError,

    // Internal Errors (9000-9099)
    InternalError,
}

impl ErrorCode {
    /// Get the numeric code for this error.
    pub const fn numeric_code(&self) -> u32 {
        match self {
            Self::AssetAlreadyExists => 1000,
            Self::AssetNotFound => 1001,
            Self::InvalidStageTransition => 1002,
            Self::WriteConflict => 1003,
            Self::InvalidInput => 1004,

            Self::PersistenceFailed => 2000,
            Self::StoreConnectionFailed => 2001,

            Self::SerializationFailed => 2200,
            Self::DeserializationFailed => 2201,

            Self::CallTimeout => 3000,
            Self::TransportFailed => 3001,

            Self::ConfigurationError => 5000,

            Self::InternalError => 9000,
        }
    }

    /// Get the HTTP status code for this error.
    pub const fn http_status(&self) -> StatusCode {
        match self {
            Self::AssetNotFound => StatusCode::NOT_FOUND,

            Self::AssetAlreadyExists | Self::InvalidStageTransition | Self::WriteConflict => {
                StatusCode::CONFLICT
            }

            Self::InvalidInput => StatusCode::UNPROCESSABLE_ENTITY,

            Self::CallTimeout => StatusCode::GATEWAY_TIMEOUT,

            Self::StoreConnectionFailed => StatusCode::SERVICE_UNAVAILABLE,

            Self::TransportFailed => StatusCode::BAD_GATEWAY,

            Self::PersistenceFailed
            | Self::SerializationFailed
            | Self::DeserializationFailed
            | Self::ConfigurationError
            | Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error category for grouping.
    pub const fn category(&self) -> &'static str {
        match self.numeric_code() {
            1000..=1099 => "ledger",
            2000..=2099 => "store",
            2200..=2299 => "serialization",
            3000..=3099 => "transport",
            5000..=5099 => "configuration",
            9000..=9099 => "internal",
            _ => "unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Severity
// ═══════════════════════════════════════════════════════════════════════════════

/// Severity level for errors (affects logging).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Caller errors (bad input, duplicate or missing assets)
    Low,
    /// Operational issues (conflicts, timeouts)
    Medium,
    /// System errors (store or codec failures)
    High,
    /// Errors requiring immediate attention
    Critical,
}

impl ErrorSeverity {
    /// Get severity based on error code.
    pub const fn from_code(code: &ErrorCode) -> Self {
        match code {
            ErrorCode::AssetAlreadyExists
            | ErrorCode::AssetNotFound
            | ErrorCode::InvalidStageTransition
            | ErrorCode::InvalidInput => Self::Low,

            ErrorCode::WriteConflict | ErrorCode::CallTimeout | ErrorCode::TransportFailed => {
                Self::Medium
            }

            ErrorCode::PersistenceFailed
            | ErrorCode::SerializationFailed
            | ErrorCode::DeserializationFailed
            | ErrorCode::ConfigurationError => Self::High,

            ErrorCode::StoreConnectionFailed | ErrorCode::InternalError => Self::Critical,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Details
// ═══════════════════════════════════════════════════════════════════════════════

/// Additional structured details about an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Additional context key-value pairs
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,

    /// Related entity ID (asset id, tx id, store key)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,

    /// Related entity type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
}

impl ErrorDetails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(mut self, entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    fn is_empty(&self) -> bool {
        self.context.is_empty() && self.entity_id.is_none() && self.entity_type.is_none()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Main Error Type
// ═══════════════════════════════════════════════════════════════════════════════

/// The error type for every ledger, store, and harness operation.
#[derive(Error, Debug)]
pub struct ProvenanceError {
    /// Machine-readable error code
    code: ErrorCode,

    /// User-facing error message
    user_message: Cow<'static, str>,

    /// Detailed internal message (for logging only)
    internal_message: Option<String>,

    /// Additional structured details
    details: ErrorDetails,

    /// The source error that caused this error
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl fmt::Display for ProvenanceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.user_message)?;
        if let Some(ref internal) = self.internal_message {
            write!(f, " (internal: {})", internal)?;
        }
        Ok(())
    }
}

impl ProvenanceError {
    // ─────────────────────────────────────────────────────────────────────────
    // Constructors
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a new error with code and user message.
    pub fn new(code: ErrorCode, user_message: impl Into<Cow<'static, str>>) -> Self {
        let error = Self {
            code,
            user_message: user_message.into(),
            internal_message: None,
            details: ErrorDetails::default(),
            source: None,
        };
        error.record_metrics();
        error
    }

    /// Create an error with both user and internal messages.
    pub fn with_internal(
        code: ErrorCode,
        user_message: impl Into<Cow<'static, str>>,
        internal_message: impl Into<String>,
    ) -> Self {
        let mut error = Self::new(code, user_message);
        error.internal_message = Some(internal_message.into());
        error
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_internal(ErrorCode::InternalError, "An internal error occurred", message)
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigurationError, message.into())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Builder Methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a source error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Add error details.
    pub fn with_details(mut self, details: ErrorDetails) -> Self {
        self.details = details;
        self
    }

    /// Add context to details.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.details.context.insert(key.into(), v);
        }
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    pub fn internal_message(&self) -> Option<&str> {
        self.internal_message.as_deref()
    }

    pub fn details(&self) -> &ErrorDetails {
        &self.details
    }

    pub fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }

    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::from_code(&self.code)
    }

    /// True for the "already exists" failure kind.
    pub fn is_already_exists(&self) -> bool {
        self.code == ErrorCode::AssetAlreadyExists
    }

    /// True for the "not found" failure kind.
    pub fn is_not_found(&self) -> bool {
        self.code == ErrorCode::AssetNotFound
    }

    /// True for any store-side persistence failure.
    pub fn is_persistence(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::PersistenceFailed | ErrorCode::StoreConnectionFailed
        )
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Logging
    // ─────────────────────────────────────────────────────────────────────────

    /// Log this error with appropriate severity.
    pub fn log(&self) {
        let code = self.code.to_string();
        let category = self.code.category();
        let status = self.http_status().as_u16();

        match self.severity() {
            ErrorSeverity::Critical => {
                error!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    internal_message = ?self.internal_message,
                    details = ?self.details,
                    source = ?self.source,
                    "CRITICAL ERROR"
                );
            }
            ErrorSeverity::High => {
                error!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    internal_message = ?self.internal_message,
                    "High severity error"
                );
            }
            ErrorSeverity::Medium => {
                warn!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    "Medium severity error"
                );
            }
            ErrorSeverity::Low => {
                tracing::debug!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    "Low severity error"
                );
            }
        }
    }

    fn record_metrics(&self) {
        counter!(
            "amprov_errors_total",
            "code" => self.code.to_string(),
            "category" => self.code.category().to_string(),
            "severity" => format!("{:?}", self.severity()),
        )
        .increment(1);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// API Response
// ═══════════════════════════════════════════════════════════════════════════════

/// Error response body for API clients.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always false for errors
    pub success: bool,

    /// Error information
    pub error: ErrorInfo,
}

/// Detailed error information for API responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub numeric_code: u32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl From<&ProvenanceError> for ErrorResponse {
    fn from(error: &ProvenanceError) -> Self {
        Self {
            success: false,
            error: ErrorInfo {
                code: error.code,
                numeric_code: error.code.numeric_code(),
                message: error.user_message.to_string(),
                details: if error.details.is_empty() {
                    None
                } else {
                    Some(error.details.clone())
                },
                timestamp: chrono::Utc::now(),
            },
        }
    }
}

impl From<ErrorResponse> for ProvenanceError {
    fn from(response: ErrorResponse) -> Self {
        let info = response.error;
        let error = Self::new(info.code, info.message);
        match info.details {
            Some(details) => error.with_details(details),
            None => error,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Axum Integration
// ═══════════════════════════════════════════════════════════════════════════════

impl IntoResponse for ProvenanceError {
    fn into_response(self) -> Response {
        self.log();

        let status = self.http_status();
        let response = ErrorResponse::from(&self);

        (status, Json(response)).into_response()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Context Extension Trait
// ═══════════════════════════════════════════════════════════════════════════════

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Wrap the error as an internal error with a message.
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Wrap the error with a specific error code.
    fn with_error_code(self, code: ErrorCode) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| ProvenanceError::internal(message.into()).with_source(e))
    }

    fn with_error_code(self, code: ErrorCode) -> Result<T> {
        self.map_err(|e| ProvenanceError::new(code, e.to_string()).with_source(e))
    }
}

impl<T> ErrorContext<T> for Option<T> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.ok_or_else(|| ProvenanceError::internal(message.into()))
    }

    fn with_error_code(self, code: ErrorCode) -> Result<T> {
        self.ok_or_else(|| ProvenanceError::new(code, "Value not present"))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// From Implementations for Common Error Types
// ═══════════════════════════════════════════════════════════════════════════════

impl From<serde_json::Error> for ProvenanceError {
    fn from(error: serde_json::Error) -> Self {
        let code = if error.is_syntax() || error.is_data() || error.is_eof() {
            ErrorCode::DeserializationFailed
        } else {
            ErrorCode::SerializationFailed
        };

        Self::with_internal(code, "Failed to process record JSON", error.to_string())
            .with_source(error)
    }
}

impl From<redis::RedisError> for ProvenanceError {
    fn from(error: redis::RedisError) -> Self {
        let (code, user_msg) = if error.is_connection_refusal()
            || error.is_connection_dropped()
            || error.is_io_error()
        {
            (ErrorCode::StoreConnectionFailed, "Unable to reach the state store")
        } else if error.is_timeout() {
            (ErrorCode::PersistenceFailed, "State store operation timed out")
        } else {
            (ErrorCode::PersistenceFailed, "A state store error occurred")
        };

        Self::with_internal(code, user_msg, error.to_string()).with_source(error)
    }
}

impl From<tokio::time::error::Elapsed> for ProvenanceError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        Self::with_internal(ErrorCode::CallTimeout, "Call exceeded its deadline", error.to_string())
            .with_source(error)
    }
}

impl From<std::io::Error> for ProvenanceError {
    fn from(error: std::io::Error) -> Self {
        use std::io::ErrorKind;

        let (code, user_msg) = match error.kind() {
            ErrorKind::TimedOut => (ErrorCode::CallTimeout, "Operation timed out"),
            ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset => {
                (ErrorCode::StoreConnectionFailed, "Connection failed")
            }
            _ => (ErrorCode::InternalError, "An I/O error occurred"),
        };

        Self::with_internal(code, user_msg, error.to_string()).with_source(error)
    }
}

impl From<config::ConfigError> for ProvenanceError {
    fn from(error: config::ConfigError) -> Self {
        Self::with_internal(
            ErrorCode::ConfigurationError,
            "Configuration is invalid",
            error.to_string(),
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Convenience Constructors for Domain Errors
// ═══════════════════════════════════════════════════════════════════════════════

impl ProvenanceError {
    /// The asset id is already bound.
    pub fn asset_already_exists(asset_id: &str) -> Self {
        Self::new(
            ErrorCode::AssetAlreadyExists,
            format!("the asset {} already exists", asset_id),
        )
        .with_details(ErrorDetails::new().with_entity("asset", asset_id))
    }

    /// No asset is stored under the id.
    pub fn asset_not_found(asset_id: &str) -> Self {
        Self::new(
            ErrorCode::AssetNotFound,
            format!("the asset {} does not exist", asset_id),
        )
        .with_details(ErrorDetails::new().with_entity("asset", asset_id))
    }

    /// The operation is not legal from the asset's current stage.
    pub fn invalid_stage_transition(asset_id: &str, from: impl fmt::Display, operation: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::InvalidStageTransition,
            format!("cannot apply {} to asset {} in stage {}", operation, asset_id, from),
        )
        .with_details(
            ErrorDetails::new()
                .with_entity("asset", asset_id)
                .with_context("from_stage", from.to_string())
                .with_context("operation", operation.to_string()),
        )
    }

    /// Another writer updated the key between our read and our write.
    pub fn write_conflict(key: &str) -> Self {
        Self::new(
            ErrorCode::WriteConflict,
            format!("concurrent update detected on {}", key),
        )
        .with_details(ErrorDetails::new().with_entity("key", key))
    }

    /// The underlying store rejected or failed a write/read.
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::with_internal(ErrorCode::PersistenceFailed, "State store operation failed", message)
    }

    /// A call did not finish within its deadline.
    pub fn call_timeout(deadline: std::time::Duration) -> Self {
        Self::new(
            ErrorCode::CallTimeout,
            format!("call exceeded its {}ms deadline", deadline.as_millis()),
        )
        .with_context("deadline_ms", deadline.as_millis() as u64)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_http_status() {
        assert_eq!(ErrorCode::AssetNotFound.http_status(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::AssetAlreadyExists.http_status(), StatusCode::CONFLICT);
        assert_eq!(ErrorCode::InvalidInput.http_status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            ErrorCode::SerializationFailed.http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_taxonomy_predicates() {
        assert!(ProvenanceError::asset_already_exists("A1").is_already_exists());
        assert!(ProvenanceError::asset_not_found("A1").is_not_found());
        assert!(ProvenanceError::persistence("disk full").is_persistence());
    }

    #[test]
    fn test_serde_json_error_maps_to_deserialization() {
        let err: ProvenanceError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert_eq!(err.code(), ErrorCode::DeserializationFailed);
    }

    #[test]
    fn test_error_response_round_trip() {
        let original = ProvenanceError::asset_not_found("A7");
        let body = serde_json::to_string(&ErrorResponse::from(&original)).unwrap();
        assert!(body.contains("ASSET_NOT_FOUND"));

        let parsed: ErrorResponse = serde_json::from_str(&body).unwrap();
        let rebuilt = ProvenanceError::from(parsed);
        assert_eq!(rebuilt.code(), ErrorCode::AssetNotFound);
        assert_eq!(rebuilt.user_message(), "the asset A7 does not exist");
        assert_eq!(rebuilt.details().entity_id.as_deref(), Some("A7"));
    }

    #[test]
    fn test_error_severity() {
        assert_eq!(ErrorSeverity::from_code(&ErrorCode::AssetNotFound), ErrorSeverity::Low);
        assert_eq!(ErrorSeverity::from_code(&ErrorCode::WriteConflict), ErrorSeverity::Medium);
        assert_eq!(ErrorSeverity::from_code(&ErrorCode::PersistenceFailed), ErrorSeverity::High);
        assert_eq!(
            ErrorSeverity::from_code(&ErrorCode::StoreConnectionFailed),
            ErrorSeverity::Critical
        );
    }

    #[test]
    fn test_error_display() {
        let error = ProvenanceError::with_internal(
            ErrorCode::PersistenceFailed,
            "State store operation failed",
            "connection reset by peer",
        );

        let display = format!("{}", error);
        assert!(display.contains("PersistenceFailed"));
        assert!(display.contains("State store operation failed"));
        assert!(display.contains("connection reset"));
    }

    #[test]
    fn test_stage_transition_details() {
        let error = ProvenanceError::invalid_stage_transition("A1", "MATERIAL_CERTIFIED", "complete production");
        assert_eq!(error.code(), ErrorCode::InvalidStageTransition);
        assert!(error.details().context.contains_key("from_stage"));
    }
}
