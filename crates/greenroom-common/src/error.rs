//! Centralized error types for Greenroom.
//!
//! Uses `thiserror` for ergonomic error definitions. Protocol-visible
//! failures (room not found, access denied) are NOT errors: they are
//! regular outbound events; this taxonomy covers the cases where an
//! in-flight operation has to be abandoned.

/// Core application error type used across all Greenroom services.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    // === Auth errors ===
    #[error("Invalid token")]
    InvalidToken,

    // === Identity provider errors ===
    #[error("Identity provider error: {0}")]
    Identity(String),

    // === Infrastructure errors ===
    #[error("Persistence error: {0}")]
    Persistence(#[from] redis::RedisError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl SignalError {
    /// Error code string for log lines and programmatic handling.
    pub fn error_code(&self) -> &str {
        match self {
            Self::InvalidToken => "INVALID_TOKEN",
            Self::Identity(_) => "IDENTITY_PROVIDER",
            Self::Persistence(_) => "PERSISTENCE",
            Self::Internal(_) => "INTERNAL",
        }
    }
}
