//! Secure TCP transport.
//!
//! Three layers, bottom up:
//!
//! - [`frame`]: the wire format, a 4-byte big-endian length prefix
//!   followed by ciphertext.
//! - [`endpoint`]: role-based socket establishment with per-IP admission
//!   control on the server side.
//! - [`channel`]: encrypted request/response exchange and the server loop.

pub mod channel;
pub mod endpoint;
pub mod frame;

pub use channel::SecureChannel;
pub use endpoint::Endpoint;
