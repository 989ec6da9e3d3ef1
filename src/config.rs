//! Server configuration.
//!
//! Defaults match the usual in-cluster layout: certificates mounted from a
//! secret at `/etc/webhook/certs/`, webhooks on 9443, probes on 8080. Each
//! value can be overridden through the environment.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Default path to webhook TLS certificate
pub const WEBHOOK_CERT_PATH: &str = "/etc/webhook/certs/tls.crt";
/// Default path to webhook TLS private key
pub const WEBHOOK_KEY_PATH: &str = "/etc/webhook/certs/tls.key";
/// Default webhook server port
pub const WEBHOOK_PORT: u16 = 9443;
/// Default health server port
pub const HEALTH_PORT: u16 = 8080;

/// Listener settings for the webhook and health servers
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub health_port: u16,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: WEBHOOK_PORT,
            health_port: HEALTH_PORT,
            cert_path: PathBuf::from(WEBHOOK_CERT_PATH),
            key_path: PathBuf::from(WEBHOOK_KEY_PATH),
        }
    }
}

impl ServerConfig {
    /// Read `WEBHOOK_PORT`, `HEALTH_PORT`, `WEBHOOK_CERT_PATH` and
    /// `WEBHOOK_KEY_PATH` from the environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            port: parse_port(&lookup, "WEBHOOK_PORT", defaults.port)?,
            health_port: parse_port(&lookup, "HEALTH_PORT", defaults.health_port)?,
            cert_path: lookup("WEBHOOK_CERT_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.cert_path),
            key_path: lookup("WEBHOOK_KEY_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.key_path),
        })
    }

    /// TLS is used when both the certificate and key are present
    pub fn tls_available(&self) -> bool {
        Path::new(&self.cert_path).exists() && Path::new(&self.key_path).exists()
    }
}

fn parse_port<F>(lookup: &F, name: &str, default: u16) -> Result<u16, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidSetting {
            name: name.to_string(),
            value,
        }),
    }
}
