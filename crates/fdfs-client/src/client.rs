//! The client façade.
//!
//! Every operation follows the same path: check local input, ask the
//! tracker where to go, pin the storage pool for that daemon and hand the
//! request to the storage client. The tracker pool lives as long as the
//! client; the storage pool is bound lazily and swapped when routing moves
//! to another daemon.
//!
//! ```ignore
//! let client = Client::new(ConfigSource::File("/etc/fdfs/client.conf".into())).await?;
//! let rsp = client.upload_by_buffer(b"hello", "txt").await?;
//! let data = client.download_to_buffer(&rsp.remote_file_id, 0, 0).await?;
//! client.close().await;
//! ```

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use fdfs_net::{ConnectionPool, Connector, TcpConnector};
use fdfs_proto::StorageServer;
use tracing::instrument::WithSubscriber;
use tracing::Dispatch;

use crate::config::{ClientConfig, ConfigSource};
use crate::error::{ClientError, ClientResult, Operation, OperationError, UPLOADING};
use crate::file_id::FileId;
use crate::pool_slot::{StoragePoolLease, StoragePoolSlot};
use crate::storage::{Content, DownloadFileResponse, StorageClient, StorageClientImpl, UploadFileResponse};
use crate::tracker::{Route, TrackerClient, TrackerClientImpl};

pub type OpResult<T> = Result<T, OperationError>;

/// Builder for [`Client`], for callers that want to inject a logger or a
/// custom transport.
pub struct ClientBuilder {
    source: ConfigSource,
    logger: Option<Dispatch>,
    connector: Option<Arc<dyn Connector>>,
}

impl ClientBuilder {
    /// Dispatcher every client operation logs to. Defaults to a no-op one.
    pub fn logger(mut self, dispatch: Dispatch) -> Self {
        self.logger = Some(dispatch);
        self
    }

    /// Transport used to dial tracker and storage daemons. Defaults to TCP
    /// with the configured connect timeout.
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Resolve the configuration and connect to the tracker.
    pub async fn build(self) -> ClientResult<Client> {
        let logger = self.logger.unwrap_or_else(fdfs_logging::noop_dispatch);
        let source = self.source;
        let connector = self.connector;
        Client::connect(source, connector, logger.clone())
            .with_subscriber(logger)
            .await
    }
}

/// FastDFS client. Cheap to share across tasks behind an `Arc`.
pub struct Client {
    config: ClientConfig,
    tracker: TrackerClientImpl,
    storage: StorageClientImpl,
    storage_pools: StoragePoolSlot,
    logger: Dispatch,
}

impl Client {
    pub fn builder(source: ConfigSource) -> ClientBuilder {
        ClientBuilder {
            source,
            logger: None,
            connector: None,
        }
    }

    /// Build a client with the default logger and transport.
    pub async fn new(source: ConfigSource) -> ClientResult<Self> {
        Self::builder(source).build().await
    }

    async fn connect(
        source: ConfigSource,
        connector: Option<Arc<dyn Connector>>,
        logger: Dispatch,
    ) -> ClientResult<Self> {
        let config = ClientConfig::resolve(&source).await?;
        let connector: Arc<dyn Connector> = match connector {
            Some(c) => c,
            None => Arc::new(TcpConnector::new(config.connect_timeout)),
        };
        let pool_config = config.pool_config();

        let tracker_pool = ConnectionPool::connect(
            config.tracker.hosts.clone(),
            config.tracker.port,
            pool_config.clone(),
            Arc::clone(&connector),
        )
        .await
        .map_err(|source| ClientError::PoolCreation {
            peer: format!("{}:{}", config.tracker.hosts.join(","), config.tracker.port),
            source,
        })?;
        tracing::info!(
            trackers = ?config.tracker.hosts,
            port = config.tracker.port,
            "client connected to tracker"
        );

        Ok(Self {
            tracker: TrackerClientImpl::new(tracker_pool),
            storage: StorageClientImpl::new(),
            storage_pools: StoragePoolSlot::new(pool_config, connector),
            config,
            logger,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Run one public operation under the client's logger, tagging failures.
    async fn run<T, F>(&self, op: Operation, fut: F) -> OpResult<T>
    where
        F: Future<Output = ClientResult<T>>,
    {
        fut.with_subscriber(self.logger.clone())
            .await
            .map_err(|source| {
                tracing::dispatcher::with_default(&self.logger, || {
                    tracing::debug!(%op, error = %source, "operation failed");
                });
                OperationError { op, source }
            })
    }

    /// Ask the tracker for `route` and pin the storage pool it points at.
    async fn route(&self, route: Route<'_>) -> ClientResult<(StoragePoolLease, StorageServer)> {
        let server = self.tracker.resolve(route).await?;
        tracing::debug!(
            route = %route.kind(),
            group = %server.group_name,
            host = %server.ip_addr,
            port = server.port,
            "resolved storage"
        );
        let lease = self
            .storage_pools
            .resolve(&server.ip_addr, server.port)
            .await?;
        Ok((lease, server))
    }

    pub async fn upload_by_filename(&self, path: impl AsRef<Path>) -> OpResult<UploadFileResponse> {
        let path = path.as_ref();
        self.run(Operation::UploadByFilename, async {
            check_local_file(path).await?;
            let (pool, server) = self.route(Route::Store { group: None }).await?;
            self.storage
                .upload(&pool, &server, Content::File(path), "")
                .await
        })
        .await
    }

    pub async fn upload_by_buffer(&self, buf: &[u8], ext: &str) -> OpResult<UploadFileResponse> {
        self.run(Operation::UploadByBuffer, async {
            let (pool, server) = self.route(Route::Store { group: None }).await?;
            self.storage
                .upload(&pool, &server, Content::Buffer(buf), ext)
                .await
        })
        .await
    }

    /// Upload `path` as a slave of `master_id`, in the master's group.
    pub async fn upload_slave_by_filename(
        &self,
        path: impl AsRef<Path>,
        master_id: &str,
        prefix: &str,
    ) -> OpResult<UploadFileResponse> {
        let path = path.as_ref();
        self.run(Operation::UploadSlaveByFilename, async {
            check_local_file(path).await?;
            let master = FileId::decode(master_id)?;
            let (pool, server) = self
                .route(Route::Store {
                    group: Some(master.group_name.as_str()),
                })
                .await?;
            self.storage
                .upload_slave(&pool, &server, Content::File(path), &master.remote_filename, prefix, "")
                .await
        })
        .await
    }

    pub async fn upload_slave_by_buffer(
        &self,
        buf: &[u8],
        master_id: &str,
        prefix: &str,
        ext: &str,
    ) -> OpResult<UploadFileResponse> {
        self.run(Operation::UploadSlaveByBuffer, async {
            let master = FileId::decode(master_id)?;
            let (pool, server) = self
                .route(Route::Store {
                    group: Some(master.group_name.as_str()),
                })
                .await?;
            self.storage
                .upload_slave(&pool, &server, Content::Buffer(buf), &master.remote_filename, prefix, ext)
                .await
        })
        .await
    }

    pub async fn upload_appender_by_filename(
        &self,
        path: impl AsRef<Path>,
    ) -> OpResult<UploadFileResponse> {
        let path = path.as_ref();
        self.run(Operation::UploadAppenderByFilename, async {
            check_local_file(path).await?;
            let (pool, server) = self.route(Route::Store { group: None }).await?;
            self.storage
                .upload_appender(&pool, &server, Content::File(path), "")
                .await
        })
        .await
    }

    pub async fn upload_appender_by_buffer(
        &self,
        buf: &[u8],
        ext: &str,
    ) -> OpResult<UploadFileResponse> {
        self.run(Operation::UploadAppenderByBuffer, async {
            let (pool, server) = self.route(Route::Store { group: None }).await?;
            self.storage
                .upload_appender(&pool, &server, Content::Buffer(buf), ext)
                .await
        })
        .await
    }

    /// Append the contents of `path` to an appender file.
    pub async fn append_by_filename(
        &self,
        path: impl AsRef<Path>,
        appender_id: &str,
    ) -> OpResult<()> {
        let path = path.as_ref();
        self.run(Operation::AppendByFilename, async {
            check_local_file(path).await?;
            let id = FileId::decode(appender_id)?;
            let (pool, server) = self.route(Route::Update(&id)).await?;
            self.storage
                .append(&pool, &server, Content::File(path), &id.remote_filename)
                .await
        })
        .await
    }

    pub async fn append_by_buffer(&self, buf: &[u8], appender_id: &str) -> OpResult<()> {
        self.run(Operation::AppendByBuffer, async {
            let id = FileId::decode(appender_id)?;
            let (pool, server) = self.route(Route::Update(&id)).await?;
            self.storage
                .append(&pool, &server, Content::Buffer(buf), &id.remote_filename)
                .await
        })
        .await
    }

    pub async fn delete_file(&self, file_id: &str) -> OpResult<()> {
        self.run(Operation::DeleteFile, async {
            let id = FileId::decode(file_id)?;
            let (pool, server) = self.route(Route::Update(&id)).await?;
            self.storage
                .delete_file(&pool, &server, &id.remote_filename)
                .await
        })
        .await
    }

    /// Download `size` bytes from `offset` into `path`. A `size` of 0 reads
    /// to the end of the file.
    pub async fn download_to_file(
        &self,
        path: impl AsRef<Path>,
        file_id: &str,
        offset: u64,
        size: u64,
    ) -> OpResult<DownloadFileResponse> {
        let path = path.as_ref();
        self.run(Operation::DownloadToFile, async {
            let id = FileId::decode(file_id)?;
            let (pool, server) = self.route(Route::Fetch(&id)).await?;
            self.storage
                .download_to_file(&pool, &server, path, &id.remote_filename, offset, size)
                .await
        })
        .await
    }

    pub async fn download_to_buffer(
        &self,
        file_id: &str,
        offset: u64,
        size: u64,
    ) -> OpResult<DownloadFileResponse> {
        self.run(Operation::DownloadToBuffer, async {
            let id = FileId::decode(file_id)?;
            let (pool, server) = self.route(Route::Fetch(&id)).await?;
            self.storage
                .download_to_buffer(&pool, &server, &id.remote_filename, offset, size)
                .await
        })
        .await
    }

    /// Close the tracker pool and the bound storage pool, if any. Later
    /// operations fail.
    pub async fn close(&self) {
        let tracker_closed = self.tracker.pool().close();
        let storage_closed = self.storage_pools.close().await;
        tracing::dispatcher::with_default(&self.logger, || {
            tracing::info!(tracker_closed, storage_closed, "client closed");
        });
    }

    #[cfg(test)]
    pub(crate) async fn storage_pool(&self) -> Option<Arc<ConnectionPool>> {
        self.storage_pools.current().await
    }
}

/// The file must exist, be a regular file and be readable.
async fn check_local_file(path: &Path) -> ClientResult<()> {
    let fail = |e: std::io::Error| ClientError::local_file(path, UPLOADING, e);
    let meta = tokio::fs::metadata(path).await.map_err(fail)?;
    if !meta.is_file() {
        return Err(fail(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "not a regular file",
        )));
    }
    tokio::fs::File::open(path).await.map_err(fail)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::storage::DownloadContent;
    use fdfs_proto::Command;
    use fdfs_stubs::FakeCluster;
    use parking_lot::Mutex;
    use std::io::Write;

    async fn client_for(cluster: &FakeCluster) -> Client {
        Client::new(ConfigSource::Text(cluster.client_conf()))
            .await
            .unwrap()
    }

    fn remote_name(file_id: &str) -> String {
        FileId::decode(file_id).unwrap().remote_filename
    }

    #[tokio::test]
    async fn test_upload_and_download_buffer() {
        let cluster = FakeCluster::start().await.unwrap();
        let client = client_for(&cluster).await;

        let rsp = client.upload_by_buffer(b"hello world", "txt").await.unwrap();
        assert_eq!(rsp.group_name, "group1");
        assert!(rsp.remote_file_id.starts_with("group1:"));

        let got = client
            .download_to_buffer(&rsp.remote_file_id, 0, 0)
            .await
            .unwrap();
        assert_eq!(got.remote_file_id, rsp.remote_file_id);
        assert_eq!(got.download_size, 11);
        assert_eq!(got.content, DownloadContent::Buffer(bytes::Bytes::from_static(b"hello world")));
        assert_eq!(cluster.command_count(Command::QueryStoreWithoutGroupOne), 1);
        assert_eq!(cluster.command_count(Command::QueryFetchOne), 1);
    }

    #[tokio::test]
    async fn test_upload_missing_file_makes_no_calls() {
        let cluster = FakeCluster::start().await.unwrap();
        let client = client_for(&cluster).await;

        let err = client
            .upload_by_filename("/definitely/not/here.jpg")
            .await
            .unwrap_err();
        assert_eq!(err.op, Operation::UploadByFilename);
        assert_eq!(err.kind(), ErrorKind::LocalFile);
        assert!(err.to_string().ends_with("(uploading)"), "{err}");
        assert_eq!(cluster.tracker_queries(), 0);
        assert_eq!(cluster.storage_operations(), 0);
        assert!(client.storage_pool().await.is_none());
    }

    #[tokio::test]
    async fn test_upload_directory_is_rejected() {
        let cluster = FakeCluster::start().await.unwrap();
        let client = client_for(&cluster).await;
        let dir = tempfile::tempdir().unwrap();

        let err = client
            .upload_appender_by_filename(dir.path())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LocalFile);
        assert!(err.to_string().ends_with("(uploading)"));
        assert_eq!(cluster.tracker_queries(), 0);
    }

    #[tokio::test]
    async fn test_delete_with_failed_update_route() {
        let cluster = FakeCluster::start().await.unwrap();
        cluster.put_file("file1", b"keep me", false);
        cluster.fail_route(Command::QueryUpdate, 2);
        let client = client_for(&cluster).await;

        let err = client.delete_file("group1:file1").await.unwrap_err();
        assert_eq!(err.op, Operation::DeleteFile);
        assert_eq!(err.kind(), ErrorKind::TrackerQuery);
        assert_eq!(cluster.command_count(Command::QueryUpdate), 1);
        assert_eq!(cluster.command_count(Command::DeleteFile), 0);
        assert!(cluster.file("file1").is_some());
    }

    #[tokio::test]
    async fn test_delete() {
        let cluster = FakeCluster::start().await.unwrap();
        let client = client_for(&cluster).await;
        let rsp = client.upload_by_buffer(b"bye", "").await.unwrap();

        client.delete_file(&rsp.remote_file_id).await.unwrap();
        assert_eq!(cluster.file_count(), 0);
        assert_eq!(cluster.command_count(Command::QueryUpdate), 1);

        let err = client.delete_file(&rsp.remote_file_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageOperation);
        assert_eq!(err.cause().server_status(), Some(2));
    }

    #[tokio::test]
    async fn test_invalid_file_id_makes_no_calls() {
        let cluster = FakeCluster::start().await.unwrap();
        let client = client_for(&cluster).await;

        for id in ["group1", "a:b:c", ":file"] {
            let err = client.download_to_buffer(id, 0, 0).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidFileId);
            let err = client.delete_file(id).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidFileId);
        }
        let err = client
            .upload_slave_by_buffer(b"x", "nogroup", "_s", "jpg")
            .await
            .unwrap_err();
        assert_eq!(err.op, Operation::UploadSlaveByBuffer);
        assert_eq!(err.kind(), ErrorKind::InvalidFileId);
        assert_eq!(cluster.tracker_queries(), 0);
    }

    #[tokio::test]
    async fn test_download_file_matches_buffer() {
        let cluster = FakeCluster::start().await.unwrap();
        let client = client_for(&cluster).await;
        let data: Vec<u8> = (0..100_000u32).map(|i| (i * 7 % 256) as u8).collect();
        let rsp = client.upload_by_buffer(&data, "bin").await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("copy.bin");
        let to_file = client
            .download_to_file(&path, &rsp.remote_file_id, 1000, 5000)
            .await
            .unwrap();
        let to_buf = client
            .download_to_buffer(&rsp.remote_file_id, 1000, 5000)
            .await
            .unwrap();

        assert_eq!(to_file.download_size, 5000);
        assert_eq!(to_buf.download_size, 5000);
        let file_bytes = std::fs::read(&path).unwrap();
        let DownloadContent::Buffer(buf_bytes) = to_buf.content else {
            panic!("expected an in-memory download");
        };
        assert_eq!(file_bytes, buf_bytes.as_ref());
        assert_eq!(file_bytes, &data[1000..6000]);
    }

    #[tokio::test]
    async fn test_upload_by_filename() {
        let cluster = FakeCluster::start().await.unwrap();
        let client = client_for(&cluster).await;
        let mut local = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        local.write_all(b"\x89PNG fake").unwrap();

        let rsp = client.upload_by_filename(local.path()).await.unwrap();
        assert!(rsp.remote_file_id.ends_with(".png"));
        let stored = cluster.file(&remote_name(&rsp.remote_file_id)).unwrap();
        assert_eq!(stored.content, b"\x89PNG fake");
    }

    #[tokio::test]
    async fn test_slave_uploads() {
        let cluster = FakeCluster::start().await.unwrap();
        let client = client_for(&cluster).await;
        let master = client.upload_by_buffer(b"master", "jpg").await.unwrap();

        let small = client
            .upload_slave_by_buffer(b"small", &master.remote_file_id, "_small", "jpg")
            .await
            .unwrap();
        let master_name = remote_name(&master.remote_file_id);
        let stem = master_name.trim_end_matches(".jpg");
        assert_eq!(small.remote_file_id, format!("group1:{stem}_small.jpg"));

        let mut local = tempfile::Builder::new().suffix(".jpg").tempfile().unwrap();
        local.write_all(b"large").unwrap();
        let large = client
            .upload_slave_by_filename(local.path(), &master.remote_file_id, "_large")
            .await
            .unwrap();
        assert_eq!(large.remote_file_id, format!("group1:{stem}_large.jpg"));
        assert_eq!(cluster.command_count(Command::QueryStoreWithGroupOne), 2);
        assert_eq!(cluster.command_count(Command::UploadSlaveFile), 2);
    }

    #[tokio::test]
    async fn test_appender_flow() {
        let cluster = FakeCluster::start().await.unwrap();
        let client = client_for(&cluster).await;

        let rsp = client.upload_appender_by_buffer(b"line1\n", "log").await.unwrap();
        client
            .append_by_buffer(b"line2\n", &rsp.remote_file_id)
            .await
            .unwrap();

        let mut local = tempfile::NamedTempFile::new().unwrap();
        local.write_all(b"line3\n").unwrap();
        client
            .append_by_filename(local.path(), &rsp.remote_file_id)
            .await
            .unwrap();

        let got = client
            .download_to_buffer(&rsp.remote_file_id, 0, 0)
            .await
            .unwrap();
        assert_eq!(
            got.content,
            DownloadContent::Buffer(bytes::Bytes::from_static(b"line1\nline2\nline3\n"))
        );
        assert_eq!(cluster.command_count(Command::QueryUpdate), 2);
    }

    #[tokio::test]
    async fn test_append_missing_local_file() {
        let cluster = FakeCluster::start().await.unwrap();
        let client = client_for(&cluster).await;
        let err = client
            .append_by_filename("/no/such/chunk", "group1:M00/00/00/x.log")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LocalFile);
        assert!(err.to_string().ends_with("(uploading)"));
        assert_eq!(cluster.tracker_queries(), 0);
    }

    #[tokio::test]
    async fn test_storage_pool_reused_across_operations() {
        let cluster = FakeCluster::start().await.unwrap();
        let client = client_for(&cluster).await;

        let rsp = client.upload_by_buffer(b"a", "").await.unwrap();
        let first = client.storage_pool().await.unwrap();
        client.download_to_buffer(&rsp.remote_file_id, 0, 0).await.unwrap();
        client.delete_file(&rsp.remote_file_id).await.unwrap();
        let after = client.storage_pool().await.unwrap();

        assert!(Arc::ptr_eq(&first, &after));
        assert!(!first.is_closed());
    }

    #[tokio::test]
    async fn test_concurrent_operations() {
        let cluster = FakeCluster::start().await.unwrap();
        let client = Arc::new(client_for(&cluster).await);

        let handles: Vec<_> = (0..16u8)
            .map(|i| {
                let client = Arc::clone(&client);
                tokio::spawn(async move {
                    let rsp = client.upload_by_buffer(&[i; 32], "dat").await.unwrap();
                    let got = client
                        .download_to_buffer(&rsp.remote_file_id, 0, 0)
                        .await
                        .unwrap();
                    (i, got.content)
                })
            })
            .collect();
        for h in handles {
            let (i, content) = h.await.unwrap();
            assert_eq!(content, DownloadContent::Buffer(bytes::Bytes::from(vec![i; 32])));
        }
        assert_eq!(cluster.file_count(), 16);
    }

    #[tokio::test]
    async fn test_fetch_on_other_node_rebinds_storage_pool() {
        let cluster = FakeCluster::start_with_fetch_host("127.0.0.2").await.unwrap();
        let client = Arc::new(client_for(&cluster).await);

        let rsp = client.upload_by_buffer(b"moved", "txt").await.unwrap();
        let store_pool = client.storage_pool().await.unwrap();
        assert_eq!(store_pool.hosts(), ["127.0.0.1".to_string()]);

        let got = client
            .download_to_buffer(&rsp.remote_file_id, 0, 0)
            .await
            .unwrap();
        assert_eq!(got.content, DownloadContent::Buffer(bytes::Bytes::from_static(b"moved")));
        let fetch_pool = client.storage_pool().await.unwrap();
        assert!(store_pool.is_closed());
        assert!(!fetch_pool.is_closed());
        assert_eq!(fetch_pool.hosts(), ["127.0.0.2".to_string()]);
        assert_eq!(fetch_pool.port(), cluster.storage_addr().port());

        // Store and update go to one address, fetch to the other: every task
        // forces the slot to swap back and forth.
        let handles: Vec<_> = (0..24u8)
            .map(|i| {
                let client = Arc::clone(&client);
                tokio::spawn(async move {
                    let data = vec![i; 64];
                    let rsp = client.upload_by_buffer(&data, "bin").await.unwrap();
                    let got = client
                        .download_to_buffer(&rsp.remote_file_id, 0, 0)
                        .await
                        .unwrap();
                    assert_eq!(got.content, DownloadContent::Buffer(bytes::Bytes::from(data)));
                    client.delete_file(&rsp.remote_file_id).await.unwrap();
                })
            })
            .collect();
        tokio::time::timeout(std::time::Duration::from_secs(60), async {
            for h in handles {
                h.await.unwrap();
            }
        })
        .await
        .expect("alternating storage nodes stalled");

        assert_eq!(cluster.file_count(), 1);
        assert_eq!(cluster.command_count(Command::QueryFetchOne), 25);
        assert_eq!(cluster.command_count(Command::QueryUpdate), 24);
    }

    #[tokio::test]
    async fn test_construction_errors() {
        let err = match Client::new(ConfigSource::Text("# empty\n".into())).await {
            Ok(_) => panic!("construction should fail"),
            Err(e) => e,
        };
        assert_eq!(err.kind(), ErrorKind::Config);

        let port = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        let conf = format!("connect_timeout = 2\ntracker_server = 127.0.0.1:{port}\n");
        let err = match Client::new(ConfigSource::Text(conf)).await {
            Ok(_) => panic!("construction should fail"),
            Err(e) => e,
        };
        assert_eq!(err.kind(), ErrorKind::PoolCreation);
    }

    #[tokio::test]
    async fn test_close() {
        let cluster = FakeCluster::start().await.unwrap();
        let client = client_for(&cluster).await;
        client.upload_by_buffer(b"x", "").await.unwrap();
        let storage = client.storage_pool().await.unwrap();

        client.close().await;
        assert!(storage.is_closed());
        assert!(client.storage_pool().await.is_none());

        let err = client.upload_by_buffer(b"y", "").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TrackerQuery);

        // A route resolved before close must not bind a new storage pool.
        let addr = cluster.storage_addr();
        assert!(client
            .storage_pools
            .resolve(&addr.ip().to_string(), addr.port())
            .await
            .is_err());
        assert!(client.storage_pool().await.is_none());
    }

    /// Collects formatted log output in memory.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_injected_logger_sees_routing() {
        let cluster = FakeCluster::start().await.unwrap();
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let client = Client::builder(ConfigSource::Text(cluster.client_conf()))
            .logger(Dispatch::new(subscriber))
            .build()
            .await
            .unwrap();
        client.upload_by_buffer(b"logged", "txt").await.unwrap();
        let _ = client.delete_file("group1:missing").await;

        let text = String::from_utf8(captured.0.lock().clone()).unwrap();
        assert!(text.contains("client connected to tracker"), "{text}");
        assert!(text.contains("resolved storage"), "{text}");
        assert!(text.contains("storage pool created"), "{text}");
        assert!(text.contains("operation failed"), "{text}");
    }
}
