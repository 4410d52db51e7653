//! Storage daemon client.
//!
//! Each call checks a connection out of the pool it is handed, performs one
//! request/response exchange and returns the connection. File content is
//! streamed: uploads from a path read the file in chunks straight onto the
//! socket, downloads to a path write chunks as they arrive.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use fdfs_net::{Connection, ConnectionPool, NetError};
use fdfs_proto::storage::{AppendReq, DeleteReq, DownloadReq, UploadReq, UploadRsp, UploadSlaveReq};
use fdfs_proto::{Command, ProtoError, StorageServer};
use tokio::fs::File;
use tokio::io::BufWriter;

use crate::error::{ClientError, ClientResult, UPLOADING};
use crate::file_id::FileId;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Where an upload landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFileResponse {
    pub group_name: String,
    /// Encoded [`FileId`] of the new file.
    pub remote_file_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadContent {
    /// The bytes were written to this local file.
    File(PathBuf),
    Buffer(Bytes),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadFileResponse {
    pub remote_file_id: String,
    pub content: DownloadContent,
    /// Number of bytes the daemon sent.
    pub download_size: u64,
}

/// Upload content: a caller buffer or a local file.
#[derive(Debug, Clone, Copy)]
pub enum Content<'a> {
    Buffer(&'a [u8]),
    File(&'a Path),
}

impl<'a> Content<'a> {
    fn path(&self) -> Option<&'a Path> {
        match *self {
            Content::Buffer(_) => None,
            Content::File(path) => Some(path),
        }
    }

    /// Extension used for the stored name when uploading a file by path.
    fn file_ext(&self) -> &'a str {
        match *self {
            Content::File(path) => path.extension().and_then(|e| e.to_str()).unwrap_or(""),
            Content::Buffer(_) => "",
        }
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Storage-tier operations. Every method runs against `server` over a
/// connection from `pool`.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Upload a new file. `ext` is ignored for [`Content::File`], which
    /// takes the extension of the path.
    async fn upload(
        &self,
        pool: &Arc<ConnectionPool>,
        server: &StorageServer,
        content: Content<'_>,
        ext: &str,
    ) -> ClientResult<UploadFileResponse>;

    /// Upload a new file that can later be appended to.
    async fn upload_appender(
        &self,
        pool: &Arc<ConnectionPool>,
        server: &StorageServer,
        content: Content<'_>,
        ext: &str,
    ) -> ClientResult<UploadFileResponse>;

    /// Upload a slave of `master_filename`, named after it plus `prefix`.
    async fn upload_slave(
        &self,
        pool: &Arc<ConnectionPool>,
        server: &StorageServer,
        content: Content<'_>,
        master_filename: &str,
        prefix: &str,
        ext: &str,
    ) -> ClientResult<UploadFileResponse>;

    /// Append to a file created by an appender upload.
    async fn append(
        &self,
        pool: &Arc<ConnectionPool>,
        server: &StorageServer,
        content: Content<'_>,
        appender_filename: &str,
    ) -> ClientResult<()>;

    async fn delete_file(
        &self,
        pool: &Arc<ConnectionPool>,
        server: &StorageServer,
        remote_filename: &str,
    ) -> ClientResult<()>;

    /// Download `size` bytes from `offset` (0 meaning to the end) into `path`.
    async fn download_to_file(
        &self,
        pool: &Arc<ConnectionPool>,
        server: &StorageServer,
        path: &Path,
        remote_filename: &str,
        offset: u64,
        size: u64,
    ) -> ClientResult<DownloadFileResponse>;

    async fn download_to_buffer(
        &self,
        pool: &Arc<ConnectionPool>,
        server: &StorageServer,
        remote_filename: &str,
        offset: u64,
        size: u64,
    ) -> ClientResult<DownloadFileResponse>;
}

// ---------------------------------------------------------------------------
// Implementation
// ---------------------------------------------------------------------------

/// Map a connection-layer failure of `command`. Local file errors are
/// reported against `path`; everything else is a storage failure.
fn failure(command: Command, path: Option<&Path>, context: &'static str, source: NetError) -> ClientError {
    match (source, path) {
        (NetError::Local(e), Some(path)) => ClientError::local_file(path, context, e),
        (source, _) => ClientError::StorageOperation { command, source },
    }
}

/// Content opened and sized, ready to stream.
enum Source<'a> {
    Buffer(&'a [u8]),
    File(File, u64),
}

impl<'a> Source<'a> {
    async fn open(content: Content<'a>) -> ClientResult<Self> {
        match content {
            Content::Buffer(buf) => Ok(Source::Buffer(buf)),
            Content::File(path) => {
                let fail = |e: std::io::Error| ClientError::local_file(path, UPLOADING, e);
                let file = File::open(path).await.map_err(fail)?;
                let size = file.metadata().await.map_err(fail)?.len();
                Ok(Source::File(file, size))
            }
        }
    }

    fn size(&self) -> u64 {
        match self {
            Source::Buffer(buf) => buf.len() as u64,
            Source::File(_, size) => *size,
        }
    }

    async fn send(&mut self, conn: &mut Connection) -> Result<(), NetError> {
        match self {
            Source::Buffer(buf) if buf.is_empty() => Ok(()),
            Source::Buffer(buf) => conn.send_bytes(buf).await,
            Source::File(file, size) => conn.send_from(file, *size).await,
        }
    }
}

#[derive(Debug, Default)]
pub struct StorageClientImpl;

impl StorageClientImpl {
    pub fn new() -> Self {
        Self
    }

    /// Send `head` followed by the content and read back the response body.
    async fn send_with_content<H>(
        &self,
        pool: &Arc<ConnectionPool>,
        cmd: Command,
        content: Content<'_>,
        head: H,
    ) -> ClientResult<Bytes>
    where
        H: FnOnce(u64) -> Result<Vec<u8>, ProtoError> + Send,
    {
        let mut source = Source::open(content).await?;
        let path = content.path();
        let fail = |e: NetError| failure(cmd, path, UPLOADING, e);

        let head = head(source.size()).map_err(|e| fail(e.into()))?;
        let mut conn = pool.get().await.map_err(fail)?;
        conn.send_request(cmd, head.len() as u64 + source.size(), &head)
            .await
            .map_err(fail)?;
        source.send(&mut conn).await.map_err(fail)?;
        let header = conn.recv_header().await.map_err(fail)?;
        conn.recv_body(header.pkg_len).await.map_err(fail)
    }

    async fn upload_with<H>(
        &self,
        pool: &Arc<ConnectionPool>,
        cmd: Command,
        content: Content<'_>,
        head: H,
    ) -> ClientResult<UploadFileResponse>
    where
        H: FnOnce(u64) -> Result<Vec<u8>, ProtoError> + Send,
    {
        let body = self.send_with_content(pool, cmd, content, head).await?;
        let rsp = UploadRsp::decode(&body)
            .map_err(|e| failure(cmd, None, UPLOADING, e.into()))?;
        tracing::debug!(
            command = %cmd,
            group = %rsp.group_name,
            remote_filename = %rsp.remote_filename,
            "uploaded"
        );
        Ok(UploadFileResponse {
            remote_file_id: FileId::encode(&rsp.group_name, &rsp.remote_filename),
            group_name: rsp.group_name,
        })
    }

    fn download_req(server: &StorageServer, remote_filename: &str, offset: u64, size: u64) -> DownloadReq {
        DownloadReq {
            offset,
            download_size: size,
            group_name: server.group_name.clone(),
            remote_filename: remote_filename.to_owned(),
        }
    }
}

#[async_trait]
impl StorageClient for StorageClientImpl {
    async fn upload(
        &self,
        pool: &Arc<ConnectionPool>,
        server: &StorageServer,
        content: Content<'_>,
        ext: &str,
    ) -> ClientResult<UploadFileResponse> {
        let ext = content.path().map_or(ext, |_| content.file_ext());
        let index = server.store_path_index;
        self.upload_with(pool, Command::UploadFile, content, |size| {
            UploadReq::new(index, size, ext).encode_head()
        })
        .await
    }

    async fn upload_appender(
        &self,
        pool: &Arc<ConnectionPool>,
        server: &StorageServer,
        content: Content<'_>,
        ext: &str,
    ) -> ClientResult<UploadFileResponse> {
        let ext = content.path().map_or(ext, |_| content.file_ext());
        let index = server.store_path_index;
        self.upload_with(pool, Command::UploadAppenderFile, content, |size| {
            UploadReq::new(index, size, ext).encode_head()
        })
        .await
    }

    async fn upload_slave(
        &self,
        pool: &Arc<ConnectionPool>,
        _server: &StorageServer,
        content: Content<'_>,
        master_filename: &str,
        prefix: &str,
        ext: &str,
    ) -> ClientResult<UploadFileResponse> {
        let ext = content.path().map_or(ext, |_| content.file_ext());
        self.upload_with(pool, Command::UploadSlaveFile, content, |size| {
            UploadSlaveReq::new(master_filename, size, prefix, ext).encode_head()
        })
        .await
    }

    async fn append(
        &self,
        pool: &Arc<ConnectionPool>,
        _server: &StorageServer,
        content: Content<'_>,
        appender_filename: &str,
    ) -> ClientResult<()> {
        self.send_with_content(pool, Command::AppendFile, content, |size| {
            AppendReq {
                appender_filename: appender_filename.to_owned(),
                file_size: size,
            }
            .encode_head()
        })
        .await?;
        Ok(())
    }

    async fn delete_file(
        &self,
        pool: &Arc<ConnectionPool>,
        server: &StorageServer,
        remote_filename: &str,
    ) -> ClientResult<()> {
        let cmd = Command::DeleteFile;
        let fail = |source: NetError| ClientError::StorageOperation { command: cmd, source };
        let req = DeleteReq {
            group_name: server.group_name.clone(),
            remote_filename: remote_filename.to_owned(),
        };
        let body = req.encode().map_err(|e| fail(e.into()))?;
        let mut conn = pool.get().await.map_err(fail)?;
        conn.call(cmd, &body).await.map_err(fail)?;
        Ok(())
    }

    async fn download_to_file(
        &self,
        pool: &Arc<ConnectionPool>,
        server: &StorageServer,
        path: &Path,
        remote_filename: &str,
        offset: u64,
        size: u64,
    ) -> ClientResult<DownloadFileResponse> {
        let cmd = Command::DownloadFile;
        let fail = |e: NetError| failure(cmd, Some(path), "", e);
        let req = Self::download_req(server, remote_filename, offset, size);
        let body = req.encode().map_err(|e| fail(e.into()))?;

        let mut conn = pool.get().await.map_err(fail)?;
        conn.send_request(cmd, body.len() as u64, &body)
            .await
            .map_err(fail)?;
        let header = conn.recv_header().await.map_err(fail)?;

        // Only touch the local file once the daemon has accepted the request.
        let file = match File::create(path).await {
            Ok(file) => file,
            Err(e) => {
                // The body is still in flight.
                conn.mark_broken();
                return Err(ClientError::local_file(path, "", e));
            }
        };
        let mut writer = BufWriter::new(file);
        conn.recv_into(&mut writer, header.pkg_len)
            .await
            .map_err(fail)?;

        Ok(DownloadFileResponse {
            remote_file_id: FileId::encode(&server.group_name, remote_filename),
            content: DownloadContent::File(path.to_path_buf()),
            download_size: header.pkg_len,
        })
    }

    async fn download_to_buffer(
        &self,
        pool: &Arc<ConnectionPool>,
        server: &StorageServer,
        remote_filename: &str,
        offset: u64,
        size: u64,
    ) -> ClientResult<DownloadFileResponse> {
        let cmd = Command::DownloadFile;
        let fail = |source: NetError| ClientError::StorageOperation { command: cmd, source };
        let req = Self::download_req(server, remote_filename, offset, size);
        let body = req.encode().map_err(|e| fail(e.into()))?;

        let mut conn = pool.get().await.map_err(fail)?;
        let data = conn.call(cmd, &body).await.map_err(fail)?;
        Ok(DownloadFileResponse {
            remote_file_id: FileId::encode(&server.group_name, remote_filename),
            download_size: data.len() as u64,
            content: DownloadContent::Buffer(data),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use fdfs_net::{PoolConfig, TcpConnector};
    use fdfs_stubs::FakeCluster;

    struct Fixture {
        cluster: FakeCluster,
        pool: Arc<ConnectionPool>,
        server: StorageServer,
        client: StorageClientImpl,
    }

    async fn fixture() -> Fixture {
        let cluster = FakeCluster::start().await.unwrap();
        let addr = cluster.storage_addr();
        let pool = ConnectionPool::connect(
            vec![addr.ip().to_string()],
            addr.port(),
            PoolConfig {
                min_idle: 1,
                ..PoolConfig::default()
            },
            Arc::new(TcpConnector::default()),
        )
        .await
        .unwrap();
        let server = StorageServer {
            group_name: "group1".into(),
            ip_addr: addr.ip().to_string(),
            port: addr.port(),
            store_path_index: 0,
        };
        Fixture {
            cluster,
            pool,
            server,
            client: StorageClientImpl::new(),
        }
    }

    fn remote_name(rsp: &UploadFileResponse) -> String {
        FileId::decode(&rsp.remote_file_id).unwrap().remote_filename
    }

    #[tokio::test]
    async fn test_upload_buffer() {
        let f = fixture().await;
        let rsp = f
            .client
            .upload(&f.pool, &f.server, Content::Buffer(b"hello"), ".txt")
            .await
            .unwrap();
        assert_eq!(rsp.group_name, "group1");
        assert!(rsp.remote_file_id.starts_with("group1:M00/"));
        assert!(rsp.remote_file_id.ends_with(".txt"));
        let stored = f.cluster.file(&remote_name(&rsp)).unwrap();
        assert_eq!(stored.content, b"hello");
        assert!(!stored.appender);
    }

    #[tokio::test]
    async fn test_upload_file_streams_content() {
        let f = fixture().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        let data: Vec<u8> = (0..700_000u32).map(|i| (i % 253) as u8).collect();
        std::fs::write(&path, &data).unwrap();

        let rsp = f
            .client
            .upload(&f.pool, &f.server, Content::File(&path), "ignored")
            .await
            .unwrap();
        assert!(rsp.remote_file_id.ends_with(".bin"));
        assert_eq!(f.cluster.file(&remote_name(&rsp)).unwrap().content, data);
    }

    #[tokio::test]
    async fn test_upload_missing_file() {
        let f = fixture().await;
        let err = f
            .client
            .upload(&f.pool, &f.server, Content::File(Path::new("/no/such/file")), "")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LocalFile);
        assert!(err.to_string().ends_with("(uploading)"));
        assert_eq!(f.cluster.storage_operations(), 0);
    }

    #[tokio::test]
    async fn test_appender_and_append() {
        let f = fixture().await;
        let rsp = f
            .client
            .upload_appender(&f.pool, &f.server, Content::Buffer(b"abc"), "log")
            .await
            .unwrap();
        let name = remote_name(&rsp);
        assert!(f.cluster.file(&name).unwrap().appender);

        f.client
            .append(&f.pool, &f.server, Content::Buffer(b"def"), &name)
            .await
            .unwrap();
        assert_eq!(f.cluster.file(&name).unwrap().content, b"abcdef");
    }

    #[tokio::test]
    async fn test_append_to_plain_file_fails() {
        let f = fixture().await;
        f.cluster.put_file("M00/00/00/plain", b"x", false);
        let err = f
            .client
            .append(&f.pool, &f.server, Content::Buffer(b"y"), "M00/00/00/plain")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageOperation);
        assert_eq!(err.server_status(), Some(22));
    }

    #[tokio::test]
    async fn test_upload_slave() {
        let f = fixture().await;
        f.cluster.put_file("M00/00/00/master.jpg", b"master", false);
        let rsp = f
            .client
            .upload_slave(
                &f.pool,
                &f.server,
                Content::Buffer(b"thumb"),
                "M00/00/00/master.jpg",
                "_150x150",
                "jpg",
            )
            .await
            .unwrap();
        assert_eq!(rsp.remote_file_id, "group1:M00/00/00/master_150x150.jpg");
        assert_eq!(
            f.cluster.file("M00/00/00/master_150x150.jpg").unwrap().content,
            b"thumb"
        );
    }

    #[tokio::test]
    async fn test_delete() {
        let f = fixture().await;
        f.cluster.put_file("M00/00/00/gone", b"x", false);
        f.client
            .delete_file(&f.pool, &f.server, "M00/00/00/gone")
            .await
            .unwrap();
        assert!(f.cluster.file("M00/00/00/gone").is_none());

        let err = f
            .client
            .delete_file(&f.pool, &f.server, "M00/00/00/gone")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::StorageOperation {
                command: Command::DeleteFile,
                ..
            }
        ));
        assert_eq!(err.server_status(), Some(2));
    }

    #[tokio::test]
    async fn test_download_range() {
        let f = fixture().await;
        f.cluster.put_file("M00/00/00/data", b"0123456789", false);

        let rsp = f
            .client
            .download_to_buffer(&f.pool, &f.server, "M00/00/00/data", 2, 5)
            .await
            .unwrap();
        assert_eq!(rsp.remote_file_id, "group1:M00/00/00/data");
        assert_eq!(rsp.download_size, 5);
        assert_eq!(rsp.content, DownloadContent::Buffer(Bytes::from_static(b"23456")));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out");
        let rsp = f
            .client
            .download_to_file(&f.pool, &f.server, &path, "M00/00/00/data", 0, 0)
            .await
            .unwrap();
        assert_eq!(rsp.download_size, 10);
        assert_eq!(rsp.content, DownloadContent::File(path.clone()));
        assert_eq!(std::fs::read(&path).unwrap(), b"0123456789");
    }

    #[tokio::test]
    async fn test_download_missing_leaves_no_file() {
        let f = fixture().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out");
        let err = f
            .client
            .download_to_file(&f.pool, &f.server, &path, "M00/00/00/none", 0, 0)
            .await
            .unwrap_err();
        assert_eq!(err.server_status(), Some(2));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_download_to_unwritable_path() {
        let f = fixture().await;
        f.cluster.put_file("M00/00/00/data", b"abc", false);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("out");
        let err = f
            .client
            .download_to_file(&f.pool, &f.server, &path, "M00/00/00/data", 0, 0)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LocalFile);
        assert!(!err.to_string().contains("uploading"));
    }
}
