use std::time::Duration;

use fdfs_proto::ProtoError;
use thiserror::Error;

/// Errors that can occur in the connection layer.
#[derive(Debug, Error)]
pub enum NetError {
    /// The connection was closed by the remote peer.
    #[error("connection closed")]
    ConnectionClosed,

    /// Dialling a daemon did not finish within the connect timeout.
    #[error("connect to {peer} timed out after {after:?}")]
    ConnectTimeout { peer: String, after: Duration },

    /// A send or receive did not finish within the network timeout.
    #[error("{op} timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },

    /// An I/O error from the underlying transport.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An I/O error on a local file while streaming it to or from a daemon.
    #[error("local file error: {0}")]
    Local(#[source] std::io::Error),

    /// A packet body could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Proto(#[from] ProtoError),

    /// The daemon answered with a non-zero status byte.
    #[error("server returned status {status} ({})", describe_status(.status))]
    ServerStatus { status: u8 },

    /// The daemon answered with something other than a response packet.
    #[error("unexpected response command {0}")]
    UnexpectedResponse(u8),

    /// The pool was closed before or while the connection was requested.
    #[error("connection pool closed")]
    PoolClosed,

    /// The pool has no hosts to dial.
    #[error("connection pool has no hosts")]
    NoHosts,
}

/// The daemons report errno values in the status byte.
fn describe_status(status: &u8) -> String {
    match *status {
        2 => "no such file".to_owned(),
        17 => "file exists".to_owned(),
        22 => "invalid argument".to_owned(),
        28 => "no space left".to_owned(),
        95 => "operation not supported".to_owned(),
        other => std::io::Error::from_raw_os_error(other as i32).to_string(),
    }
}

impl NetError {
    /// Whether the connection that produced this error can still be reused.
    ///
    /// A status error leaves the stream in sync because the daemon sends an
    /// empty body with it; everything else may have left bytes in flight.
    pub fn keeps_connection(&self) -> bool {
        matches!(self, NetError::ServerStatus { .. })
    }
}
