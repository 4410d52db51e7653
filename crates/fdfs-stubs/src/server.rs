//! Accept loop and packet framing shared by both fake daemons.

use std::sync::Arc;

use fdfs_proto::{Command, PacketHeader, HEADER_SIZE};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::ClusterState;

/// What a daemon does with one request.
pub(crate) enum Reply {
    /// Success response carrying this body.
    Body(Vec<u8>),
    /// Failure response with this status and no body.
    Status(u8),
    /// Hang up without answering.
    Close,
}

pub(crate) type Handler = fn(&ClusterState, u8, &[u8]) -> Reply;

/// errno values the daemons report.
pub(crate) const ENOENT: u8 = 2;
pub(crate) const EEXIST: u8 = 17;
pub(crate) const EINVAL: u8 = 22;

pub(crate) async fn serve(listener: TcpListener, state: Arc<ClusterState>, handler: Handler) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(error = %e, "fake daemon accept failed");
                continue;
            }
        };
        tracing::trace!(%peer, "fake daemon accepted connection");
        tokio::spawn(session(stream, Arc::clone(&state), handler));
    }
}

async fn session(mut stream: TcpStream, state: Arc<ClusterState>, handler: Handler) {
    loop {
        let mut raw = [0u8; HEADER_SIZE];
        if stream.read_exact(&mut raw).await.is_err() {
            return;
        }
        let header = PacketHeader::from_bytes(&raw);
        let mut body = vec![0u8; header.pkg_len as usize];
        if stream.read_exact(&mut body).await.is_err() {
            return;
        }
        state.record(header.cmd);

        let reply = if header.cmd == Command::Quit as u8 {
            Reply::Close
        } else if header.cmd == Command::ActiveTest as u8 {
            Reply::Body(Vec::new())
        } else {
            handler(&state, header.cmd, &body)
        };

        let (status, body) = match reply {
            Reply::Body(body) => (0, body),
            Reply::Status(status) => (status, Vec::new()),
            Reply::Close => return,
        };
        let mut frame = PacketHeader::response(status, body.len() as u64)
            .to_bytes()
            .to_vec();
        frame.extend_from_slice(&body);
        if stream.write_all(&frame).await.is_err() {
            return;
        }
    }
}
