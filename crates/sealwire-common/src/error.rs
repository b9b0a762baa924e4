use thiserror::Error;

/// Errors produced by the sealwire transport.
///
/// The taxonomy follows the lifecycle of a channel:
/// - `Configuration` — bad or missing settings, fatal at construction,
///   never retried.
/// - `Transport` / `Timeout` — socket-level failures; the offending socket
///   is closed and the error surfaces to the caller, who decides whether to
///   open a fresh connection.
/// - `Crypto` — bad key material at construction, or a decryption /
///   authentication failure at runtime (hostile or corrupted peer).
///
/// Rate-limit and validation rejections deliberately produce *no* error:
/// the connection is dropped silently so a flooding peer cannot distinguish
/// rejection from a crashed peer.
#[derive(Error, Debug)]
pub enum SealwireError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Operation timed out after {0}s")]
    Timeout(u64),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SealwireError {
    /// Map IO errors to appropriate variants.
    ///
    /// Timeouts and would-block conditions become `Timeout`; connection
    /// resets and aborts become `Transport` with context; everything else
    /// passes through as `Io`.
    pub fn from_io(err: std::io::Error, context: &str, timeout_secs: u64) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                SealwireError::Timeout(timeout_secs)
            }
            std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::NotConnected => {
                SealwireError::Transport(format!("{}: connection lost", context))
            }
            _ => SealwireError::Io(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, SealwireError>;
