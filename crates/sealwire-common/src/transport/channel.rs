//! Encrypted request/response exchange over a connected socket.
//!
//! A [`SecureChannel`] pairs a cipher with a security guard and speaks the
//! length-prefixed frame format from [`frame`](super::frame). The channel
//! does not own the socket: the caller establishes it (see
//! [`Endpoint`](super::Endpoint)) and decides when to stop.
//!
//! Server-side rejections are silent. When an inbound frame fails payload
//! validation or the data rate limit, the serve loop returns without
//! writing anything, the socket is dropped, and the peer observes only a
//! closed connection.

use std::net::TcpStream;
use std::sync::Arc;

use crate::cipher::Cipher;
use crate::error::{Result, SealwireError};
use crate::security::SecurityGuard;
use crate::transport::frame;

/// An encrypted, length-prefixed message channel.
pub struct SecureChannel {
    cipher: Cipher,
    guard: Arc<SecurityGuard>,
}

impl SecureChannel {
    pub fn new(cipher: Cipher, guard: Arc<SecurityGuard>) -> Self {
        Self { cipher, guard }
    }

    /// Sends one encrypted message and waits for the encrypted response.
    ///
    /// A peer that closes the connection without responding yields an empty
    /// response, not an error: the server signals rejection by closing. This
    /// covers both a clean close and an abortive one (reset), since a server
    /// that rejects a frame drops the socket without draining it.
    ///
    /// # Errors
    ///
    /// Returns `Timeout` when the peer stalls, `Transport` on write
    /// failures or when the response exceeds the policy's byte ceiling,
    /// and `Crypto` when the response fails to decrypt.
    pub fn send_and_receive(&self, stream: &mut TcpStream, plaintext: &[u8]) -> Result<Vec<u8>> {
        let timeout_secs = self.guard.policy().socket_timeout_seconds;
        let max_len = self.guard.policy().max_bytes_per_window;

        let ciphertext = self.cipher.encrypt(plaintext)?;
        frame::write_frame(stream, &ciphertext, timeout_secs)?;
        tracing::debug!(bytes = ciphertext.len(), "request sent");

        let len = match frame::read_len(stream, timeout_secs) {
            Ok(Some(len)) => len,
            Ok(None) | Err(SealwireError::Transport(_)) => {
                tracing::debug!("peer closed without responding");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        if len > max_len {
            return Err(SealwireError::Transport(format!(
                "response too large: {} bytes (max {} bytes)",
                len, max_len
            )));
        }

        let response = frame::read_body(stream, len as usize, timeout_secs)?;
        tracing::debug!(bytes = response.len(), "response received");
        self.cipher.decrypt(&response)
    }

    /// Serves a connected peer as an echo: every decrypted message is sent
    /// back unchanged. Equivalent to `serve_with(stream, |m| m)`.
    pub fn serve(&self, stream: TcpStream) -> Result<()> {
        self.serve_with(stream, |message| message)
    }

    /// Serves a connected peer, answering each inbound message with
    /// `respond(message)`, until the peer disconnects.
    ///
    /// Each frame's announced length is checked against the payload rules
    /// and the peer's data budget before a single byte of the body is
    /// read; a violation ends the loop silently (`Ok`, nothing written,
    /// socket closed on return).
    ///
    /// # Errors
    ///
    /// Returns `Transport`/`Timeout` on socket failures and `Crypto` when
    /// an inbound frame fails to decrypt. The socket is closed either way.
    pub fn serve_with<F>(&self, mut stream: TcpStream, mut respond: F) -> Result<()>
    where
        F: FnMut(Vec<u8>) -> Vec<u8>,
    {
        let timeout_secs = self.guard.policy().socket_timeout_seconds;
        let peer = stream.peer_addr().map_err(|e| {
            SealwireError::Transport(format!("failed to read peer address: {}", e))
        })?;

        loop {
            let len = match frame::read_len(&mut stream, timeout_secs)? {
                Some(len) => len,
                None => {
                    tracing::debug!(%peer, "peer disconnected");
                    return Ok(());
                }
            };

            if !self.guard.validate_payload(len) || !self.guard.admit_data(peer.ip(), len) {
                tracing::warn!(%peer, len, "closing connection without response");
                return Ok(());
            }

            let ciphertext = frame::read_body(&mut stream, len as usize, timeout_secs)?;
            let message = self.cipher.decrypt(&ciphertext)?;
            tracing::debug!(%peer, bytes = message.len(), "message received");

            let reply = self.cipher.encrypt(&respond(message))?;
            frame::write_frame(&mut stream, &reply, timeout_secs)?;
        }
    }
}
