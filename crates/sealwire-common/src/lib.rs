//! Sealwire Core Library
//!
//! This crate provides the building blocks of the sealwire secure TCP
//! transport: pluggable symmetric ciphers, per-source-IP flood protection,
//! role-based socket establishment, and an encrypted message channel.
//!
//! # Architecture
//!
//! The wire protocol is deliberately small:
//! - **Transport**: plain TCP with read/write timeouts
//! - **Message Format**: `[4-byte length prefix as u32 big-endian] + [ciphertext]`
//! - **Encryption**: one cipher per channel, fixed by configuration on both
//!   peers and never negotiated on the wire
//!
//! # Components
//!
//! - [`cipher`] - XOR, AES-CBC, and AES-GCM ciphers behind one interface
//! - [`config`] - configuration source abstraction and settings parsing
//! - [`security`] - sliding-window connection and data rate limiting per IP
//! - [`transport`] - framing, endpoints, and the secure channel
//! - [`error`] - the crate-wide error type
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use sealwire_common::cipher::Cipher;
//! use sealwire_common::config::{CipherConfig, EndpointConfig, Role, SecurityPolicy};
//! use sealwire_common::transport::{Endpoint, SecureChannel};
//!
//! # fn main() -> sealwire_common::Result<()> {
//! let endpoint = Endpoint::new(EndpointConfig {
//!     role: Role::Client,
//!     host: "127.0.0.1".to_string(),
//!     port: 9000,
//!     security: SecurityPolicy::default(),
//! });
//!
//! let cipher = Cipher::from_config(&CipherConfig {
//!     kind: "xor".to_string(),
//!     params: serde_json::json!({"byte": 42}),
//! })?;
//!
//! let channel = SecureChannel::new(cipher, endpoint.guard());
//! let mut stream = endpoint.connect()?;
//! let response = channel.send_and_receive(&mut stream, b"Hello, Server!")?;
//! println!("{}", String::from_utf8_lossy(&response));
//! # Ok(())
//! # }
//! ```

pub mod cipher;
pub mod config;
pub mod error;
pub mod security;
pub mod transport;

pub use cipher::Cipher;
pub use config::{CipherConfig, ConfigSource, EndpointConfig, MemoryConfigSource, Role, SecurityPolicy};
pub use error::{Result, SealwireError};
pub use security::SecurityGuard;
pub use transport::{Endpoint, SecureChannel};
