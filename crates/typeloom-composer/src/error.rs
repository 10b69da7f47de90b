//! Unified error handling for the composer
//!
//! Ordinary ambiguity and unknown-type conditions are diagnostics, not
//! errors. `ComposeError` covers invariant violations and the few conditions
//! a caller has to react to.

use thiserror::Error;

use crate::config::ConfigError;

/// Result type alias for composer operations
pub type Result<T> = std::result::Result<T, ComposeError>;

#[derive(Error, Debug)]
pub enum ComposeError {
    /// Alias chain revisits one of its own names
    #[error("Cyclic alias chain: {}", .0.join(" -> "))]
    CyclicAlias(Vec<String>),

    /// A non-extension declaration lost its symbol-table entry
    #[error("Declaration {0} has no canonical entry after unification")]
    MissingCanonical(String),

    /// Declaration handle outside the arena
    #[error("Invalid declaration handle: {0}")]
    InvalidHandle(usize),

    /// Resolver worker pool could not be created
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl ComposeError {
    pub fn cyclic_alias(chain: Vec<String>) -> Self {
        Self::CyclicAlias(chain)
    }

    pub fn missing_canonical(name: impl Into<String>) -> Self {
        Self::MissingCanonical(name.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Whether the pipeline absorbs this error as a diagnostic
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::CyclicAlias(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ComposeError::cyclic_alias(vec!["A".to_string(), "B".to_string(), "A".to_string()]);
        assert_eq!(err.to_string(), "Cyclic alias chain: A -> B -> A");
        assert!(err.is_recoverable());

        let err = ComposeError::missing_canonical("App.Foo");
        assert_eq!(
            err.to_string(),
            "Declaration App.Foo has no canonical entry after unification"
        );
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: ComposeError = json_err.into();
        assert!(matches!(err, ComposeError::Json(_)));
    }
}
