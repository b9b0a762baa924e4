//! Role-based socket lifecycle.
//!
//! An [`Endpoint`] owns one side of a TCP conversation. The same type
//! serves both roles; configuration decides which one, and [`connect`]
//! dispatches accordingly:
//!
//! - **Client**: resolves the configured address and dials it with the
//!   policy's timeout.
//! - **Server**: binds, accepts a single admissible peer, and hands the
//!   connected socket back. The listener is consumed by `accept`, so each
//!   `connect` call serves exactly one conversation.
//!
//! Every socket that leaves this module already carries the policy's
//! read/write timeouts.
//!
//! [`connect`]: Endpoint::connect

use std::net::{TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{self, ConfigSource, EndpointConfig, Role};
use crate::error::{Result, SealwireError};
use crate::security::SecurityGuard;

/// One configured side of a secure TCP conversation.
pub struct Endpoint {
    config: EndpointConfig,
    guard: Arc<SecurityGuard>,
}

impl Endpoint {
    /// Creates an endpoint, deriving a fresh [`SecurityGuard`] from the
    /// configuration's security policy.
    pub fn new(config: EndpointConfig) -> Self {
        let guard = Arc::new(SecurityGuard::new(config.security.clone()));
        Self { config, guard }
    }

    /// Creates an endpoint that shares an existing guard, so several
    /// endpoints (or a server's connection workers) enforce one budget.
    pub fn with_guard(config: EndpointConfig, guard: Arc<SecurityGuard>) -> Self {
        Self { config, guard }
    }

    /// Loads the endpoint configuration for `service`/`version` from a
    /// configuration source and builds the endpoint.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` when the entry is missing or malformed.
    pub fn from_source(
        source: &dyn ConfigSource,
        service: &str,
        version: &str,
    ) -> Result<Self> {
        let config = config::load_endpoint_config(source, service, version)?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    /// The guard enforcing this endpoint's security policy.
    pub fn guard(&self) -> Arc<SecurityGuard> {
        Arc::clone(&self.guard)
    }

    /// Establishes a connected socket according to the configured role.
    ///
    /// For a server this is bind, listen, and accept one admissible peer;
    /// for a client it is a dial with the policy timeout. Either way the
    /// returned socket has read/write timeouts applied and is ready for
    /// framed traffic.
    pub fn connect(&self) -> Result<TcpStream> {
        match self.config.role {
            Role::Server => {
                let listener = self.bind()?;
                self.accept(listener)
            }
            Role::Client => self.dial(),
        }
    }

    /// Binds and listens on the configured address. Server role only.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` when called on a client endpoint, and
    /// `Transport` when the address cannot be bound.
    pub fn bind(&self) -> Result<TcpListener> {
        if self.config.role != Role::Server {
            return Err(SealwireError::Configuration(
                "bind requires the server role".to_string(),
            ));
        }

        let listener =
            TcpListener::bind((self.config.host.as_str(), self.config.port)).map_err(|e| {
                SealwireError::Transport(format!(
                    "failed to bind {}:{}: {}",
                    self.config.host, self.config.port, e
                ))
            })?;

        tracing::info!(
            host = %self.config.host,
            port = self.config.port,
            "listening for connections"
        );
        Ok(listener)
    }

    /// Accepts the next admissible peer and consumes the listener.
    ///
    /// The first admitted peer ends the accept cycle, and dropping the
    /// listener here stops further connection attempts from being queued:
    /// one `connect` call serves exactly one conversation.
    pub fn accept(&self, listener: TcpListener) -> Result<TcpStream> {
        self.accept_from(&listener)
    }

    /// Accepts the next admissible peer without consuming the listener,
    /// for servers that keep serving new connections.
    ///
    /// Peers rejected by the connection rate limit are dropped without any
    /// response and the loop keeps waiting.
    pub fn accept_from(&self, listener: &TcpListener) -> Result<TcpStream> {
        loop {
            let (stream, peer) = listener.accept().map_err(|e| {
                SealwireError::from_io(
                    e,
                    "accepting connection",
                    self.guard.policy().socket_timeout_seconds,
                )
            })?;

            if !self.guard.admit_connection(peer.ip()) {
                tracing::warn!(%peer, "dropping rate-limited connection");
                drop(stream);
                continue;
            }

            self.guard.apply_timeout(&stream)?;
            tracing::info!(%peer, "accepted connection");
            return Ok(stream);
        }
    }

    /// Dials the configured address, trying each resolved candidate with
    /// the policy's timeout.
    fn dial(&self) -> Result<TcpStream> {
        let timeout = Duration::from_secs(self.guard.policy().socket_timeout_seconds);

        let addrs = (self.config.host.as_str(), self.config.port)
            .to_socket_addrs()
            .map_err(|e| {
                SealwireError::Transport(format!(
                    "failed to resolve {}:{}: {}",
                    self.config.host, self.config.port, e
                ))
            })?;

        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    self.guard.apply_timeout(&stream)?;
                    tracing::info!(%addr, "connected");
                    return Ok(stream);
                }
                Err(e) => {
                    tracing::debug!(%addr, error = %e, "connection attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(match last_error {
            Some(e) => SealwireError::from_io(
                e,
                "connecting",
                self.guard.policy().socket_timeout_seconds,
            ),
            None => SealwireError::Transport(format!(
                "no addresses resolved for {}:{}",
                self.config.host, self.config.port
            )),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecurityPolicy;

    fn endpoint_config(role: Role, port: u16) -> EndpointConfig {
        EndpointConfig {
            role,
            host: "127.0.0.1".to_string(),
            port,
            security: SecurityPolicy::default(),
        }
    }

    #[test]
    fn test_bind_rejected_for_client_role() {
        let endpoint = Endpoint::new(endpoint_config(Role::Client, 0));
        assert!(matches!(
            endpoint.bind(),
            Err(SealwireError::Configuration(_))
        ));
    }

    #[test]
    fn test_client_connect_to_dead_port_fails() {
        // Port 1 on localhost: nothing should be listening there.
        let mut config = endpoint_config(Role::Client, 1);
        config.security.socket_timeout_seconds = 1;

        let endpoint = Endpoint::new(config);
        assert!(endpoint.connect().is_err());
    }

    #[test]
    fn test_server_accepts_admissible_peer() {
        let endpoint = Endpoint::new(endpoint_config(Role::Server, 0));
        let listener = endpoint.bind().unwrap();
        let addr = listener.local_addr().unwrap();

        let dialer = std::thread::spawn(move || TcpStream::connect(addr).unwrap());

        let stream = endpoint.accept(listener).unwrap();
        assert!(stream.read_timeout().unwrap().is_some());
        assert!(stream.write_timeout().unwrap().is_some());
        dialer.join().unwrap();
    }

    #[test]
    fn test_server_drops_rate_limited_peer() {
        let mut config = endpoint_config(Role::Server, 0);
        config.security.max_connections_per_window = 1;
        config.security.window_seconds = 1;

        let endpoint = Endpoint::new(config);

        // Exhaust the budget for localhost before anyone dials.
        assert!(endpoint.guard().admit_connection("127.0.0.1".parse().unwrap()));

        let listener = endpoint.bind().unwrap();
        let addr = listener.local_addr().unwrap();

        let dialer = std::thread::spawn(move || {
            use std::io::Read;

            // First peer is over budget and gets silently dropped; it sees
            // EOF without ever receiving a byte.
            let mut rejected = TcpStream::connect(addr).unwrap();
            let mut buf = [0u8; 1];
            assert_eq!(rejected.read(&mut buf).unwrap(), 0);

            // After the window has passed, a retry is admitted.
            std::thread::sleep(Duration::from_millis(1200));
            TcpStream::connect(addr).unwrap()
        });

        let stream = endpoint.accept(listener).unwrap();
        assert!(stream.read_timeout().unwrap().is_some());
        dialer.join().unwrap();
    }
}
