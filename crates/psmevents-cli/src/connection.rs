//! Live connection to a PSM JSON-RPC endpoint.
//!
//! Opens the TCP stream, hands its read side to a [`PeekingDecoder`] and
//! keeps the write side for subscription requests.

use std::io::Write;
use std::net::{IpAddr, SocketAddr};

use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::info;

use psmevents_core::config::SubscriptionConfig;
use psmevents_core::{Category, HandshakeError, OBJECT_EVENTS, PeekingDecoder};

/// Port used when the address does not name one.
pub const DEFAULT_PORT: u16 = 3994;

/// Append [`DEFAULT_PORT`] to `addr` unless it already carries a port.
pub fn resolve_addr(addr: &str) -> String {
    if addr.parse::<SocketAddr>().is_ok() {
        return addr.to_string();
    }
    if let Ok(ip) = addr.parse::<IpAddr>() {
        return SocketAddr::new(ip, DEFAULT_PORT).to_string();
    }
    if let Some((host, port)) = addr.rsplit_once(':') {
        if !host.is_empty() && !host.contains(':') && port.parse::<u16>().is_ok() {
            return addr.to_string();
        }
    }
    format!("{addr}:{DEFAULT_PORT}")
}

/// Connection errors.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Subscribing to {category} events failed: {source}")]
    Subscribe {
        category: Category,
        #[source]
        source: HandshakeError,
    },

    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

/// An open connection to the endpoint.
///
/// The write half lives as long as the connection so the socket is never
/// half-closed while events are still being read.
pub struct LiveConnection {
    addr: String,
    decoder: PeekingDecoder<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl LiveConnection {
    /// Connect to `addr`, adding the default port when none is given.
    pub async fn connect(addr: &str) -> Result<Self, ConnectionError> {
        let addr = resolve_addr(addr);
        info!(addr = %addr, "Connecting");
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|source| ConnectionError::Connect {
                addr: addr.clone(),
                source,
            })?;
        let (read_half, writer) = stream.into_split();
        Ok(Self {
            addr,
            decoder: PeekingDecoder::new(read_half),
            writer,
        })
    }

    /// Address the connection was opened to.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Subscribe to every enabled category, one round-trip each, reporting
    /// each success on `out`.
    pub async fn subscribe<W: Write>(
        &mut self,
        config: &SubscriptionConfig,
        out: &mut W,
    ) -> Result<(), ConnectionError> {
        for category in config.categories() {
            psmevents_core::subscribe(
                &mut self.writer,
                &mut self.decoder,
                category,
                &OBJECT_EVENTS,
            )
            .await
            .map_err(|source| ConnectionError::Subscribe { category, source })?;
            info!(%category, "Subscribed");
            writeln!(out, "Subscribed to {category} events")?;
        }
        Ok(())
    }

    /// Decoder over the incoming side of the connection.
    pub fn decoder_mut(&mut self) -> &mut PeekingDecoder<OwnedReadHalf> {
        &mut self.decoder
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_gets_default_port() {
        assert_eq!(resolve_addr("psm.example"), "psm.example:3994");
        assert_eq!(resolve_addr("192.0.2.23"), "192.0.2.23:3994");
    }

    #[test]
    fn explicit_port_is_kept() {
        assert_eq!(resolve_addr("192.0.2.23:4000"), "192.0.2.23:4000");
        assert_eq!(resolve_addr("psm.example:3995"), "psm.example:3995");
        assert_eq!(resolve_addr("[2001:db8::1]:4000"), "[2001:db8::1]:4000");
    }

    #[test]
    fn bare_ipv6_is_bracketed() {
        assert_eq!(resolve_addr("::1"), "[::1]:3994");
        assert_eq!(resolve_addr("2001:db8::1"), "[2001:db8::1]:3994");
    }

    #[test]
    fn non_numeric_port_is_treated_as_host() {
        assert_eq!(resolve_addr("psm.example:http"), "psm.example:http:3994");
    }

    #[tokio::test]
    async fn refused_connection_names_address() {
        // Bind then drop to find a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = LiveConnection::connect(&addr.to_string())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ConnectionError::Connect { .. }));
        assert!(err.to_string().contains(&addr.to_string()));
    }
}
