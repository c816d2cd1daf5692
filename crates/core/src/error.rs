//! Error types for the Toolstream domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; the top-level [`Error`]
//! wraps them.

use thiserror::Error;

/// The top-level error type for all Toolstream operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Ability errors ---
    #[error("Ability error: {0}")]
    Ability(#[from] AbilityError),

    // --- Agent loop ---
    #[error("Round limit exceeded: the model kept calling abilities after {limit} rounds")]
    RoundLimitExceeded { limit: u32 },

    // --- I/O (stream_to) ---
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Errors raised while defining or executing an ability.
///
/// Execution-side variants never escape [`crate::AbilityRegistry::execute`];
/// they are rendered into the `"Error: …"` tool-result text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbilityError {
    #[error("failed to define ability '{ability}': {reason}")]
    Definition { ability: String, reason: String },

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("missing required argument '{0}'")]
    MissingArgument(String),

    #[error("unexpected argument '{0}'")]
    UnexpectedArgument(String),

    #[error("{0}")]
    ExecutionFailed(String),
}

impl AbilityError {
    /// Convenience constructor for handler failures.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::ExecutionFailed(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn ability_error_displays_correctly() {
        let err = AbilityError::Definition {
            ability: "get weather".into(),
            reason: "name may only contain letters, digits, '_' and '-'".into(),
        };
        assert!(err.to_string().contains("get weather"));
        assert!(err.to_string().contains("letters"));

        assert_eq!(
            AbilityError::MissingArgument("city".into()).to_string(),
            "missing required argument 'city'"
        );
        assert_eq!(AbilityError::failed("boom").to_string(), "boom");
    }

    #[test]
    fn round_limit_mentions_limit() {
        let err = Error::RoundLimitExceeded { limit: 3 };
        assert!(err.to_string().contains("3 rounds"));
    }
}
