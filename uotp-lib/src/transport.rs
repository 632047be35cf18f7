use crate::constants::{DEFAULT_ENDPOINT, LENGTH_HEADER_SIZE};
use crate::error::UotpError;
use crate::packet::parse_length_header;
use bytes::Bytes;
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;

// Default timeouts for network operations
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(10);

/// One request/reply exchange with the server.
pub trait Transport {
    /// Send a complete request frame and return the reply body, i.e. the
    /// reply frame without its 6-byte length header.
    ///
    /// Fails with [`UotpError::Cancelled`] once `cancel` fires. The token only
    /// scopes this call; later exchanges are unaffected.
    fn exchange(
        &self,
        frame: Bytes,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Bytes, UotpError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// `host:port` of the server
    pub endpoint: String,
    pub connect_timeout: Duration,
    /// Applies to each write and read separately
    pub io_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            io_timeout: DEFAULT_IO_TIMEOUT,
        }
    }
}

/// Opens a fresh TCP connection for every exchange.
#[derive(Debug, Clone, Default)]
pub struct TcpTransport {
    config: TransportConfig,
}

impl TcpTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    async fn round_trip(&self, frame: Bytes) -> Result<Bytes, UotpError> {
        let io_timeout = self.config.io_timeout;

        debug!("Connecting to {}", self.config.endpoint);
        let mut stream = timeout(self.config.connect_timeout, TcpStream::connect(&self.config.endpoint)).await??;

        timeout(io_timeout, stream.write_all(&frame)).await??;
        debug!("Sent {} bytes", frame.len());

        let mut header = [0u8; LENGTH_HEADER_SIZE];
        timeout(io_timeout, stream.read_exact(&mut header)).await??;
        let length = parse_length_header(&header)?;

        let mut body = vec![0u8; length];
        timeout(io_timeout, stream.read_exact(&mut body)).await??;
        debug!("Received {} bytes", LENGTH_HEADER_SIZE + length);

        Ok(Bytes::from(body))
    }
}

impl Transport for TcpTransport {
    async fn exchange(&self, frame: Bytes, cancel: &CancellationToken) -> Result<Bytes, UotpError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Exchange with {} cancelled", self.config.endpoint);
                Err(UotpError::Cancelled)
            }
            result = self.round_trip(frame) => result,
        }
    }
}
