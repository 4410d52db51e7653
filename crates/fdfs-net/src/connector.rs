//! Dialling daemons.
//!
//! [`Connector`] is the seam between the pool and the transport: production
//! code uses [`TcpConnector`], tests hand in connectors that return
//! in-memory streams.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::error::NetError;

/// A bidirectional byte stream a [`Connection`](crate::Connection) can run on.
pub trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> AsyncStream for T {}

pub type BoxedStream = Box<dyn AsyncStream>;

/// Trait for types that can establish new connections to a daemon.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, host: &str, port: u16) -> Result<BoxedStream, NetError>;
}

/// Plain TCP connector with a dial timeout.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    connect_timeout: Duration,
}

impl TcpConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, host: &str, port: u16) -> Result<BoxedStream, NetError> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| NetError::ConnectTimeout {
                peer: format!("{host}:{port}"),
                after: self.connect_timeout,
            })??;
        stream.set_nodelay(true)?;
        tracing::trace!(host, port, "dialled");
        Ok(Box::new(stream))
    }
}
