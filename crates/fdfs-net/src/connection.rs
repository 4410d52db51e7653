//! A single framed connection to a daemon.
//!
//! Every exchange is one request packet followed by one response packet.
//! Requests that carry file content are written as header + head bytes and
//! then the content, either from memory or streamed from a reader.

use std::future::Future;
use std::time::{Duration, Instant};

use bytes::Bytes;
use fdfs_proto::header::ResponseCheck;
use fdfs_proto::{Command, PacketHeader, HEADER_SIZE};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::connector::BoxedStream;
use crate::error::NetError;

/// Chunk size used when streaming file content.
const STREAM_CHUNK_SIZE: usize = 256 * 1024;

/// Upper bound on up-front allocation for in-memory bodies.
const MAX_PREALLOC: u64 = 64 * 1024 * 1024;

fn chunk_len(len: u64) -> usize {
    (len.min(STREAM_CHUNK_SIZE as u64) as usize).max(1)
}

async fn with_timeout<T, F>(after: Duration, op: &'static str, fut: F) -> Result<T, NetError>
where
    F: Future<Output = std::io::Result<T>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(NetError::ConnectionClosed)
        }
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(NetError::Timeout { op, after }),
    }
}

/// One stream to one daemon, plus the bookkeeping the pool needs.
pub struct Connection {
    stream: BoxedStream,
    host: String,
    port: u16,
    network_timeout: Duration,
    last_used: Instant,
    broken: bool,
}

impl Connection {
    pub fn new(stream: BoxedStream, host: &str, port: u16, network_timeout: Duration) -> Self {
        Self {
            stream,
            host: host.to_owned(),
            port,
            network_timeout,
            last_used: Instant::now(),
            broken: false,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Time since the connection last finished an exchange.
    pub fn idle_for(&self) -> Duration {
        self.last_used.elapsed()
    }

    /// Whether an earlier failure left the stream in an unknown state.
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// Keep this connection out of the pool once it is released.
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    fn track<T>(&mut self, res: Result<T, NetError>) -> Result<T, NetError> {
        match &res {
            Ok(_) => self.last_used = Instant::now(),
            Err(e) if e.keeps_connection() => self.last_used = Instant::now(),
            Err(_) => self.broken = true,
        }
        res
    }

    /// Write a request header followed by `head` (which may be the whole body).
    ///
    /// `body_len` is the full body length announced in the header; anything
    /// beyond `head` must be sent afterwards with [`send_bytes`](Self::send_bytes)
    /// or [`send_from`](Self::send_from).
    pub async fn send_request(
        &mut self,
        cmd: Command,
        body_len: u64,
        head: &[u8],
    ) -> Result<(), NetError> {
        let header = PacketHeader::request(cmd, body_len);
        let mut frame = Vec::with_capacity(HEADER_SIZE + head.len());
        frame.extend_from_slice(&header.to_bytes());
        frame.extend_from_slice(head);
        self.send_bytes(&frame).await
    }

    pub async fn send_bytes(&mut self, data: &[u8]) -> Result<(), NetError> {
        let res = with_timeout(self.network_timeout, "send", self.stream.write_all(data)).await;
        self.track(res)
    }

    /// Stream exactly `len` bytes from `reader`.
    ///
    /// Read failures on `reader` are reported as [`NetError::Local`]; the
    /// connection is marked broken either way since the announced body was
    /// not sent in full.
    pub async fn send_from<R>(&mut self, reader: &mut R, len: u64) -> Result<(), NetError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut remaining = len;
        let mut buf = vec![0u8; chunk_len(len)];
        while remaining > 0 {
            let want = buf.len().min(remaining as usize);
            let n = match reader.read(&mut buf[..want]).await {
                Ok(0) => {
                    self.broken = true;
                    return Err(NetError::Local(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "local file shorter than announced size",
                    )));
                }
                Ok(n) => n,
                Err(e) => {
                    self.broken = true;
                    return Err(NetError::Local(e));
                }
            };
            self.send_bytes(&buf[..n]).await?;
            remaining -= n as u64;
        }
        Ok(())
    }

    /// Read a response header and check it reports success.
    pub async fn recv_header(&mut self) -> Result<PacketHeader, NetError> {
        let res = self.recv_header_inner().await;
        self.track(res)
    }

    async fn recv_header_inner(&mut self) -> Result<PacketHeader, NetError> {
        let mut raw = [0u8; HEADER_SIZE];
        with_timeout(
            self.network_timeout,
            "recv header",
            self.stream.read_exact(&mut raw),
        )
        .await?;
        let header = PacketHeader::from_bytes(&raw);
        match header.expect_response() {
            Ok(()) => Ok(header),
            Err(ResponseCheck::Command(cmd)) => Err(NetError::UnexpectedResponse(cmd)),
            Err(ResponseCheck::Status(status)) => {
                if header.pkg_len != 0 {
                    // Unread body bytes: the stream cannot be reused.
                    self.broken = true;
                }
                Err(NetError::ServerStatus { status })
            }
        }
    }

    /// Read exactly `len` body bytes into memory.
    pub async fn recv_body(&mut self, len: u64) -> Result<Bytes, NetError> {
        let mut buf = Vec::with_capacity(len.min(MAX_PREALLOC) as usize);
        self.recv_into(&mut buf, len).await?;
        Ok(Bytes::from(buf))
    }

    /// Stream exactly `len` body bytes into `writer`.
    ///
    /// Write failures on `writer` are reported as [`NetError::Local`]. The
    /// network timeout applies to each read, not to the whole body.
    pub async fn recv_into<W>(&mut self, writer: &mut W, len: u64) -> Result<(), NetError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut remaining = len;
        let mut buf = vec![0u8; chunk_len(len)];
        while remaining > 0 {
            let want = buf.len().min(remaining as usize);
            let read =
                with_timeout(self.network_timeout, "recv body", self.stream.read(&mut buf[..want]))
                    .await;
            let n = match self.track(read)? {
                0 => {
                    self.broken = true;
                    return Err(NetError::ConnectionClosed);
                }
                n => n,
            };
            if let Err(e) = writer.write_all(&buf[..n]).await {
                self.broken = true;
                return Err(NetError::Local(e));
            }
            remaining -= n as u64;
        }
        writer.flush().await.map_err(NetError::Local)
    }

    /// Send a request with an in-memory body and read back the whole response body.
    pub async fn call(&mut self, cmd: Command, body: &[u8]) -> Result<Bytes, NetError> {
        self.send_request(cmd, body.len() as u64, body).await?;
        let header = self.recv_header().await?;
        self.recv_body(header.pkg_len).await
    }

    /// Probe the daemon with ACTIVE_TEST.
    pub async fn active_test(&mut self) -> Result<(), NetError> {
        let body = self.call(Command::ActiveTest, &[]).await?;
        if !body.is_empty() {
            self.broken = true;
            return Err(NetError::Proto(fdfs_proto::ProtoError::BadLength {
                command: Command::ActiveTest.name(),
                expected: 0,
                actual: body.len() as u64,
            }));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("broken", &self.broken)
            .finish()
    }
}
