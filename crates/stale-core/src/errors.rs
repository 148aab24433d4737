//! Error types for the stale-state policy
//!
//! Only misconfiguration is ever returned as `Err` from policy operations.
//! Request failures, silent comparators and inconclusive quorums are contained
//! within the cycle that produced them and surface through the error handler.

use crate::quorum::Tally;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Failure reported by a reading source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("Request failed: {message}")]
pub struct RequestError {
    /// Description of the transport failure
    message: String,
}

impl RequestError {
    /// Create a request error with the given description
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Description of the failure
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<std::io::Error> for RequestError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Mandatory capability slots of a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// Obtains a fresh reading
    Request,
    /// Compares two readings
    Compare,
    /// Receives accepted readings
    Commit,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Request => f.write_str("request"),
            Capability::Compare => f.write_str("compare"),
            Capability::Commit => f.write_str("commit"),
        }
    }
}

/// Unified error type for stale-state operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StaleError {
    /// A mandatory capability was used before being registered
    #[error("Configuration error: missing {capability} capability")]
    MissingCapability {
        /// The slot that was never set
        capability: Capability,
    },

    /// Invalid configuration value
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message describing the invalid setting
        message: String,
    },

    /// The reading source reported a failure
    #[error(transparent)]
    Request(#[from] RequestError),

    /// The comparator returned without signalling an outcome
    #[error("Comparator returned without signalling an outcome")]
    ComparatorSilent,

    /// No tally bucket reached the majority after verification
    #[error("Consensus inconclusive: {tally}")]
    ConsensusInconclusive {
        /// Tally collected during verification
        tally: Tally,
    },
}

impl StaleError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a missing-capability error
    pub fn missing(capability: Capability) -> Self {
        Self::MissingCapability { capability }
    }

    /// Whether this error is a caller bug rather than a runtime condition
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingCapability { .. } | Self::Configuration { .. }
        )
    }
}

/// Standard Result type for stale-state operations
pub type Result<T> = std::result::Result<T, StaleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_capability_names_the_slot() {
        let err = StaleError::missing(Capability::Commit);
        assert_eq!(
            err.to_string(),
            "Configuration error: missing commit capability"
        );
        assert!(err.is_configuration());
    }

    #[test]
    fn request_errors_are_runtime_conditions() {
        let err: StaleError = RequestError::new("connection reset").into();
        assert!(!err.is_configuration());
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn io_errors_convert_to_request_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "replica timed out");
        let err = RequestError::from(io);
        assert_eq!(err.message(), "replica timed out");
    }

    #[test]
    fn inconclusive_displays_tally() {
        let err = StaleError::ConsensusInconclusive {
            tally: Tally {
                accept: 3,
                decline: 2,
                same: 1,
            },
        };
        assert!(err.to_string().contains("3 accept, 2 decline, 1 same"));
    }
}
