//! Configuration lookup and endpoint/cipher settings.
//!
//! Settings live in an external configuration service that maps
//! `(domain, service name, version)` to a JSON document. This module defines
//! the narrow interface the transport consumes ([`ConfigSource`]), a simple
//! in-memory implementation for tests and the CLI, and the typed settings
//! structures parsed out of the JSON.
//!
//! # Settings Shape
//!
//! ```json
//! {
//!   "settings": {
//!     "role": "server",
//!     "host": "localhost",
//!     "port": 5000,
//!     "security": {
//!       "max_connections_per_window": 10,
//!       "max_bytes_per_window": 1048576,
//!       "socket_timeout_seconds": 10,
//!       "window_seconds": 60
//!     },
//!     "crypto": {"type": "xor", "params": {"byte": 42}}
//!   }
//! }
//! ```
//!
//! The `security` and `crypto` sections are optional; security falls back to
//! defaults, crypto lookup fails only when a cipher is actually requested.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{Result, SealwireError};

/// Domain under which all transport settings are stored.
pub const NETWORK_DOMAIN: &str = "network";

/// Source of JSON configuration documents.
///
/// This is the boundary to the external configuration store. Implementations
/// return the raw JSON string for a `(domain, service, version)` triple, or
/// `None` when no such entry exists.
pub trait ConfigSource: Send + Sync {
    /// Look up the configuration document for a service.
    fn get_configuration(&self, domain: &str, service: &str, version: &str) -> Option<String>;
}

/// In-memory [`ConfigSource`] backed by a `HashMap`.
///
/// Used by the CLI (which loads a JSON file into it) and by tests.
#[derive(Default)]
pub struct MemoryConfigSource {
    entries: HashMap<(String, String, String), String>,
}

impl MemoryConfigSource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a configuration document for a `(domain, service, version)` triple.
    pub fn insert(
        &mut self,
        domain: impl Into<String>,
        service: impl Into<String>,
        version: impl Into<String>,
        document: impl Into<String>,
    ) {
        self.entries.insert(
            (domain.into(), service.into(), version.into()),
            document.into(),
        );
    }
}

impl ConfigSource for MemoryConfigSource {
    fn get_configuration(&self, domain: &str, service: &str, version: &str) -> Option<String> {
        self.entries
            .get(&(domain.to_string(), service.to_string(), version.to_string()))
            .cloned()
    }
}

/// Role of an endpoint: the side that listens, or the side that dials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Server,
}

/// Flood-protection settings for one endpoint.
///
/// All limits apply per source IP over a sliding window of
/// `window_seconds`. `max_bytes_per_window` doubles as the absolute
/// single-message ceiling during payload validation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecurityPolicy {
    /// Maximum connections admitted per source IP per window.
    pub max_connections_per_window: u32,
    /// Maximum bytes admitted per source IP per window.
    pub max_bytes_per_window: u64,
    /// Read/write timeout applied to every socket, in seconds.
    pub socket_timeout_seconds: u64,
    /// Length of the sliding window, in seconds.
    pub window_seconds: u64,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            max_connections_per_window: 10,
            max_bytes_per_window: 1024 * 1024, // 1 MiB
            socket_timeout_seconds: 10,
            window_seconds: 60,
        }
    }
}

/// Resolved socket settings for one endpoint. Immutable after construction.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    pub role: Role,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub security: SecurityPolicy,
}

/// Cipher selection plus its raw parameters.
///
/// `kind` is the registry tag (`"xor"`, `"aes-cbc"`, `"aes-gcm"`); `params`
/// is validated by the selected cipher's constructor.
#[derive(Debug, Clone, Deserialize)]
pub struct CipherConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Top-level settings document.
#[derive(Debug, Deserialize)]
struct SettingsDocument {
    settings: Settings,
}

#[derive(Debug, Deserialize)]
struct Settings {
    role: Role,
    host: String,
    port: u16,
    #[serde(default)]
    security: SecurityPolicy,
    crypto: Option<CipherConfig>,
}

fn fetch_settings(source: &dyn ConfigSource, service: &str, version: &str) -> Result<Settings> {
    let document = source
        .get_configuration(NETWORK_DOMAIN, service, version)
        .ok_or_else(|| {
            SealwireError::Configuration(format!(
                "socket configuration not found for {}:{}",
                service, version
            ))
        })?;

    let parsed: SettingsDocument = serde_json::from_str(&document).map_err(|e| {
        SealwireError::Configuration(format!(
            "invalid socket configuration for {}:{}: {}",
            service, version, e
        ))
    })?;

    Ok(parsed.settings)
}

/// Loads and validates the endpoint configuration for a service.
///
/// # Errors
///
/// Returns `Configuration` if the entry is absent, the JSON is malformed,
/// or the role is not `client`/`server`. Port range is enforced by the
/// `u16` type.
pub fn load_endpoint_config(
    source: &dyn ConfigSource,
    service: &str,
    version: &str,
) -> Result<EndpointConfig> {
    let settings = fetch_settings(source, service, version)?;

    tracing::debug!(
        service,
        version,
        role = ?settings.role,
        host = %settings.host,
        port = settings.port,
        "loaded endpoint configuration"
    );

    Ok(EndpointConfig {
        role: settings.role,
        host: settings.host,
        port: settings.port,
        security: settings.security,
    })
}

/// Loads the cipher configuration for a service.
///
/// # Errors
///
/// Returns `Configuration` if the entry is absent, the JSON is malformed,
/// or no `crypto` section is present.
pub fn load_cipher_config(
    source: &dyn ConfigSource,
    service: &str,
    version: &str,
) -> Result<CipherConfig> {
    let settings = fetch_settings(source, service, version)?;

    settings.crypto.ok_or_else(|| {
        SealwireError::Configuration(format!(
            "crypto configuration not found for {}:{}",
            service, version
        ))
    })
}
