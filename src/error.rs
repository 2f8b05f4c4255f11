//! Error types for the GitOps explorer

use thiserror::Error;

/// Main error type for tree building and GitOps lifecycle operations
///
/// Payloads are plain strings so a single fetch result can be handed to every
/// caller that joined it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum Error {
    /// A listing or probing call against the cluster failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// An install, uninstall or managed enable call failed
    #[error("command failed: {0}")]
    CommandFailed(String),

    /// Settings could not be read or parsed
    #[error("configuration error: {0}")]
    Config(String),

    /// No usable kubeconfig could be loaded
    #[error("kubeconfig error: {0}")]
    Kubeconfig(String),
}

impl Error {
    /// Create a query failure with the given message
    pub fn query_failed(msg: impl Into<String>) -> Self {
        Self::QueryFailed(msg.into())
    }

    /// Create a command failure with the given message
    pub fn command_failed(msg: impl Into<String>) -> Self {
        Self::CommandFailed(msg.into())
    }

    /// Create a configuration error with the given message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a kubeconfig error with the given message
    pub fn kubeconfig(msg: impl Into<String>) -> Self {
        Self::Kubeconfig(msg.into())
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn when_a_listing_fails_the_message_names_the_failure_kind() {
        let err = Error::query_failed("kubectl get kustomizations: forbidden");
        assert_eq!(
            err.to_string(),
            "query failed: kubectl get kustomizations: forbidden"
        );
    }

    #[test]
    fn when_an_install_fails_the_message_names_the_failure_kind() {
        let err = Error::command_failed("flux install exited with 1");
        assert!(err.to_string().starts_with("command failed:"));
        assert!(matches!(err, Error::CommandFailed(_)));
    }

    #[test]
    fn errors_can_be_cloned_for_every_waiting_caller() {
        let err = Error::query_failed("timeout");
        assert_eq!(err.clone(), err);
    }
}
