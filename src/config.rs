//! Connection settings for a vCenter server.
//!
//! Settings are resolved once, either explicitly through the builder methods
//! or from the environment, before a transport is constructed.
//!
//! # Environment Variables
//!
//! - `VMWARE_HOST`: vCenter hostname (or a full base URL)
//! - `VMWARE_USER`: user name
//! - `VMWARE_PASSWORD`: password
//! - `VMWARE_VALIDATE_CERTS`: verify TLS certificates (default `true`)
//! - `VMWARE_REST_LOG_FILE`: write engine logs to this file
//! - `VMWARE_TIMEOUT`: request timeout in seconds (default 30)

use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::error::{ReconcileError, Result};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for one vCenter server.
#[derive(Debug)]
pub struct ConnectionConfig {
    /// Hostname, or a full `scheme://host[:port]` base URL.
    pub hostname: String,
    /// User name for session creation.
    pub username: String,
    /// Password for session creation.
    pub password: SecretString,
    /// Whether TLS certificates are verified.
    pub validate_certs: bool,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Optional file receiving engine logs, used by
    /// [`init_logging_from_config`](crate::init_logging_from_config).
    pub rest_log_file: Option<PathBuf>,
}

impl ConnectionConfig {
    /// Create settings with default TLS verification and timeout.
    pub fn new(
        hostname: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            username: username.into(),
            password: SecretString::from(password.into()),
            validate_certs: true,
            timeout: DEFAULT_TIMEOUT,
            rest_log_file: None,
        }
    }

    /// Resolve settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new(
            lookup("VMWARE_HOST").unwrap_or_default(),
            lookup("VMWARE_USER").unwrap_or_default(),
            lookup("VMWARE_PASSWORD").unwrap_or_default(),
        );

        if let Some(raw) = lookup("VMWARE_VALIDATE_CERTS") {
            config.validate_certs = parse_bool(&raw).ok_or_else(|| {
                ReconcileError::Configuration(format!(
                    "VMWARE_VALIDATE_CERTS must be a boolean, got '{}'",
                    raw
                ))
            })?;
        }

        if let Some(raw) = lookup("VMWARE_TIMEOUT") {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                ReconcileError::Configuration(format!(
                    "VMWARE_TIMEOUT must be a number of seconds, got '{}'",
                    raw
                ))
            })?;
            config.timeout = Duration::from_secs(secs);
        }

        config.rest_log_file = lookup("VMWARE_REST_LOG_FILE")
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);

        Ok(config)
    }

    /// Set whether TLS certificates are verified.
    pub fn with_validate_certs(mut self, validate: bool) -> Self {
        self.validate_certs = validate;
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the log file.
    pub fn with_rest_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.rest_log_file = Some(path.into());
        self
    }

    /// Reject incomplete settings.
    pub fn validate(&self) -> Result<()> {
        if self.hostname.trim().is_empty() {
            return Err(ReconcileError::Configuration(
                "vcenter_hostname cannot be empty".to_string(),
            ));
        }
        if self.username.is_empty() {
            return Err(ReconcileError::Configuration(
                "vcenter_username cannot be empty".to_string(),
            ));
        }
        if self.password.expose_secret().is_empty() {
            return Err(ReconcileError::Configuration(
                "vcenter_password cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// The base URL request paths are joined onto.
    pub fn base_url(&self) -> Result<Url> {
        let host = self.hostname.trim().trim_end_matches('/');
        if host.is_empty() {
            return Err(ReconcileError::Configuration(
                "vcenter_hostname cannot be empty".to_string(),
            ));
        }
        let raw = if host.contains("://") {
            format!("{}/", host)
        } else {
            format!("https://{}/", host)
        };
        Ok(Url::parse(&raw)?)
    }

    /// Build a `reqwest::Client` honouring the timeout and TLS settings.
    pub fn build_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("vrest-reconcile/", env!("CARGO_PKG_VERSION")));

        if !self.validate_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }

        builder.build().map_err(|e| {
            ReconcileError::Configuration(format!("failed to build HTTP client: {}", e))
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "y" => Some(true),
        "0" | "false" | "no" | "off" | "n" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config = ConnectionConfig::from_lookup(lookup(&[
            ("VMWARE_HOST", "vcenter.example.com"),
            ("VMWARE_USER", "administrator@vsphere.local"),
            ("VMWARE_PASSWORD", "hunter2"),
        ]))
        .unwrap();

        assert_eq!(config.hostname, "vcenter.example.com");
        assert!(config.validate_certs);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert!(config.rest_log_file.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = ConnectionConfig::from_lookup(lookup(&[
            ("VMWARE_HOST", "vcenter.example.com"),
            ("VMWARE_USER", "admin"),
            ("VMWARE_PASSWORD", "pw"),
            ("VMWARE_VALIDATE_CERTS", "no"),
            ("VMWARE_TIMEOUT", "5"),
            ("VMWARE_REST_LOG_FILE", "/tmp/rest.log"),
        ]))
        .unwrap();

        assert!(!config.validate_certs);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.rest_log_file, Some(PathBuf::from("/tmp/rest.log")));
    }

    #[test]
    fn test_from_lookup_rejects_bad_values() {
        let err = ConnectionConfig::from_lookup(lookup(&[("VMWARE_VALIDATE_CERTS", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Configuration(_)));

        let err =
            ConnectionConfig::from_lookup(lookup(&[("VMWARE_TIMEOUT", "soon")])).unwrap_err();
        assert!(err.message().contains("VMWARE_TIMEOUT"));
    }

    #[test]
    fn test_validate_empty_fields() {
        let err = ConnectionConfig::new("", "admin", "pw").validate().unwrap_err();
        assert_eq!(err.message(), "vcenter_hostname cannot be empty");

        let err = ConnectionConfig::new("vc", "", "pw").validate().unwrap_err();
        assert_eq!(err.message(), "vcenter_username cannot be empty");

        let err = ConnectionConfig::new("vc", "admin", "").validate().unwrap_err();
        assert_eq!(err.message(), "vcenter_password cannot be empty");
    }

    #[test]
    fn test_base_url() {
        let config = ConnectionConfig::new("vcenter.example.com", "admin", "pw");
        assert_eq!(
            config.base_url().unwrap().as_str(),
            "https://vcenter.example.com/"
        );

        let config = ConnectionConfig::new("http://127.0.0.1:8080/", "admin", "pw");
        assert_eq!(config.base_url().unwrap().as_str(), "http://127.0.0.1:8080/");
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = ConnectionConfig::new("vc", "admin", "hunter2");
        assert!(!format!("{:?}", config).contains("hunter2"));
    }

    #[test]
    fn test_build_client() {
        let config = ConnectionConfig::new("vc", "admin", "pw")
            .with_validate_certs(false)
            .with_timeout(Duration::from_secs(2));
        assert!(config.build_client().is_ok());
    }
}
