//! Error types for the record store and the services built on it

use thiserror::Error;

/// Errors surfaced by storage engines, the unified store and the services
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// A uniqueness rule of one engine was violated. Never retried on another engine.
    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Payment already exists for this application: {payment_id}")]
    PaymentExists { payment_id: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    /// Connection or timeout failure talking to a remote engine
    #[error("Engine unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RecordError {
    /// Whether the unified store should retry the same call on the next engine.
    ///
    /// Uniqueness and validation failures are scoped to the caller's data, so another
    /// engine would reject them too (or silently accept a duplicate).
    pub fn is_fallback_signal(&self) -> bool {
        !matches!(
            self,
            RecordError::Constraint(_)
                | RecordError::PaymentExists { .. }
                | RecordError::Validation(_)
                | RecordError::PayloadTooLarge(_)
                | RecordError::NotFound(_)
                | RecordError::Unauthorized(_)
        )
    }

    /// Short machine-readable code used in HTTP error envelopes
    pub fn code(&self) -> &'static str {
        match self {
            RecordError::NotFound(_) => "NOT_FOUND",
            RecordError::Constraint(_) => "CONSTRAINT_VIOLATION",
            RecordError::PaymentExists { .. } => "PAYMENT_EXISTS",
            RecordError::Validation(_) => "VALIDATION_ERROR",
            RecordError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            RecordError::Unavailable(_) => "ENGINE_UNAVAILABLE",
            RecordError::Unauthorized(_) => "UNAUTHORIZED",
            RecordError::Config(_) => "CONFIG_ERROR",
            _ => "INTERNAL_ERROR",
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, RecordError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_signal() {
        assert!(RecordError::Unavailable("timeout".into()).is_fallback_signal());
        assert!(RecordError::Database("write failed".into()).is_fallback_signal());
        assert!(!RecordError::Constraint("email".into()).is_fallback_signal());
        assert!(!RecordError::Validation("amount".into()).is_fallback_signal());
        assert!(!RecordError::PaymentExists {
            payment_id: "PAY1".into()
        }
        .is_fallback_signal());
    }

    #[test]
    fn test_payment_exists_message_names_payment() {
        let err = RecordError::PaymentExists {
            payment_id: "PAY123".into(),
        };
        assert!(err.to_string().contains("PAY123"));
        assert_eq!(err.code(), "PAYMENT_EXISTS");
    }
}
