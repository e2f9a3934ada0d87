//! Error types for the reconciliation engine.

use thiserror::Error;

use crate::schema::Diagnostic;

/// Convenience alias used throughout the crate.
pub type Result<T, E = ReconcileError> = std::result::Result<T, E>;

/// Errors that can occur while reconciling a resource.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The HTTP transport failed before a response was received.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The transport gave up waiting for the server.
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// The server answered with a status the engine cannot continue past.
    #[error("Request has failed: status={status}, {body}")]
    Api {
        /// HTTP status code of the failed call.
        status: u16,
        /// Raw response text, kept for diagnostics.
        body: String,
    },

    /// The requested resource type is not in the catalog.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// The descriptor has no handler for the requested lifecycle verb.
    #[error("Resource '{resource}' does not support operation '{operation}'")]
    UnsupportedOperation {
        /// Resource type name.
        resource: String,
        /// The verb that was requested.
        operation: String,
    },

    /// A resource descriptor violates one of its construction invariants.
    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(String),

    /// Caller arguments failed schema validation.
    #[error("Invalid parameters: {}", summarize(.0))]
    InvalidParameters(Vec<Diagnostic>),

    /// A URL template placeholder had no value.
    #[error("Missing value for path parameter '{0}'")]
    MissingPathParameter(String),

    /// Connection configuration is incomplete.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A URL could not be parsed or joined.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ReconcileError {
    /// Get the error message as a string.
    pub fn message(&self) -> String {
        match self {
            Self::Transport(msg)
            | Self::DeadlineExceeded(msg)
            | Self::UnknownResource(msg)
            | Self::InvalidDescriptor(msg)
            | Self::MissingPathParameter(msg)
            | Self::Configuration(msg) => msg.clone(),
            Self::Api { body, .. } => body.clone(),
            Self::UnsupportedOperation { operation, .. } => operation.clone(),
            Self::InvalidParameters(diagnostics) => summarize(diagnostics),
            Self::Serialization(err) => err.to_string(),
            Self::InvalidUrl(err) => err.to_string(),
        }
    }

    /// HTTP status carried by the error, if the server produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ReconcileError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::DeadlineExceeded(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

fn summarize(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| match &d.attribute {
            Some(attr) => format!("{} ({})", d.summary, attr),
            None => d.summary.clone(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ReconcileError::Api {
            status: 500,
            body: "boom".to_string(),
        };
        assert_eq!(format!("{}", err), "Request has failed: status=500, boom");

        let err = ReconcileError::UnknownResource("vcenter_cluster".to_string());
        assert_eq!(format!("{}", err), "Unknown resource type: vcenter_cluster");

        let err = ReconcileError::UnsupportedOperation {
            resource: "vcenter_host".to_string(),
            operation: "publish".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "Resource 'vcenter_host' does not support operation 'publish'"
        );
    }

    #[test]
    fn test_invalid_parameters_display() {
        let err = ReconcileError::InvalidParameters(vec![
            Diagnostic::error("Missing required parameter 'vm'").with_attribute("vm"),
            Diagnostic::error("Unsupported parameter 'colour'"),
        ]);
        assert_eq!(
            format!("{}", err),
            "Invalid parameters: Missing required parameter 'vm' (vm); Unsupported parameter 'colour'"
        );
    }

    #[test]
    fn test_message_method() {
        let err = ReconcileError::Configuration("vcenter_hostname cannot be empty".to_string());
        assert_eq!(err.message(), "vcenter_hostname cannot be empty");

        let err = ReconcileError::Api {
            status: 503,
            body: "unavailable".to_string(),
        };
        assert_eq!(err.message(), "unavailable");
    }

    #[test]
    fn test_status_method() {
        let err = ReconcileError::Api {
            status: 502,
            body: String::new(),
        };
        assert_eq!(err.status(), Some(502));
        assert_eq!(ReconcileError::Transport("refused".into()).status(), None);
    }

    #[test]
    fn test_from_serde_error() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: ReconcileError = parse_err.into();
        assert!(matches!(err, ReconcileError::Serialization(_)));
    }
}
