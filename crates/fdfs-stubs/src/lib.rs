//! Fake FastDFS daemons for tests.
//!
//! [`FakeCluster`] runs one tracker and one storage daemon on loopback
//! ports, speaking the real wire protocol. Files live in memory. Tests can
//! inspect what was stored, count the commands each daemon received and
//! make a tracker route fail with a chosen status byte.
//!
//! [`FakeCluster::start_with_fetch_host`] makes fetch routes name a second
//! loopback address for the same storage daemon, so a client sees two
//! storage nodes.

mod server;
mod storage;
mod tracker;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use fdfs_proto::Command;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub use storage::StoredFile;

/// State shared by both daemons and the test driving them.
pub(crate) struct ClusterState {
    pub group_name: String,
    pub storage_ip: String,
    pub storage_port: u16,
    /// Address handed out for fetch routes, when it differs from `storage_ip`.
    pub fetch_ip: Option<String>,
    pub files: DashMap<String, StoredFile>,
    pub next_file_id: AtomicU64,
    pub commands: DashMap<u8, usize>,
    pub failing: DashMap<u8, u8>,
}

impl ClusterState {
    pub(crate) fn record(&self, cmd: u8) {
        *self.commands.entry(cmd).or_insert(0) += 1;
    }

    pub(crate) fn next_id(&self) -> u64 {
        self.next_file_id.fetch_add(1, Ordering::Relaxed)
    }
}

pub struct FakeCluster {
    state: Arc<ClusterState>,
    tracker_addr: SocketAddr,
    storage_addr: SocketAddr,
    tasks: Vec<JoinHandle<()>>,
}

impl FakeCluster {
    /// Start a cluster serving group `group1`.
    pub async fn start() -> std::io::Result<Self> {
        Self::start_with_group("group1").await
    }

    pub async fn start_with_group(group_name: &str) -> std::io::Result<Self> {
        Self::launch(group_name, None).await
    }

    /// Start a `group1` cluster whose tracker answers fetch routes with
    /// `fetch_host` (another loopback address, e.g. `127.0.0.2`) instead of
    /// `127.0.0.1`. The storage daemon listens on all interfaces so both
    /// addresses reach it.
    pub async fn start_with_fetch_host(fetch_host: &str) -> std::io::Result<Self> {
        Self::launch("group1", Some(fetch_host)).await
    }

    async fn launch(group_name: &str, fetch_host: Option<&str>) -> std::io::Result<Self> {
        let tracker = TcpListener::bind("127.0.0.1:0").await?;
        let storage_bind = if fetch_host.is_some() {
            "0.0.0.0:0"
        } else {
            "127.0.0.1:0"
        };
        let storage = TcpListener::bind(storage_bind).await?;
        let tracker_addr = tracker.local_addr()?;
        let storage_addr = SocketAddr::from(([127, 0, 0, 1], storage.local_addr()?.port()));

        let state = Arc::new(ClusterState {
            group_name: group_name.to_owned(),
            storage_ip: storage_addr.ip().to_string(),
            storage_port: storage_addr.port(),
            fetch_ip: fetch_host.map(str::to_owned),
            files: DashMap::new(),
            next_file_id: AtomicU64::new(1),
            commands: DashMap::new(),
            failing: DashMap::new(),
        });

        let tasks = vec![
            tokio::spawn(server::serve(tracker, Arc::clone(&state), tracker::handle)),
            tokio::spawn(server::serve(storage, Arc::clone(&state), storage::handle)),
        ];
        tracing::debug!(%tracker_addr, %storage_addr, "fake cluster started");

        Ok(Self {
            state,
            tracker_addr,
            storage_addr,
            tasks,
        })
    }

    pub fn group_name(&self) -> &str {
        &self.state.group_name
    }

    pub fn tracker_port(&self) -> u16 {
        self.tracker_addr.port()
    }

    pub fn storage_addr(&self) -> SocketAddr {
        self.storage_addr
    }

    /// Client configuration text pointing at this cluster's tracker.
    pub fn client_conf(&self) -> String {
        format!(
            "# fake cluster\nconnect_timeout = 5\nnetwork_timeout = 5\ntracker_server = {}\n",
            self.tracker_addr
        )
    }

    /// Make every tracker query using `cmd` answer with `status`.
    pub fn fail_route(&self, cmd: Command, status: u8) {
        self.state.failing.insert(cmd as u8, status);
    }

    pub fn clear_failures(&self) {
        self.state.failing.clear();
    }

    /// How many packets with command `cmd` the daemons have received.
    pub fn command_count(&self, cmd: Command) -> usize {
        self.state.commands.get(&(cmd as u8)).map_or(0, |n| *n)
    }

    /// Tracker queries received, over all routes.
    pub fn tracker_queries(&self) -> usize {
        [
            Command::QueryStoreWithoutGroupOne,
            Command::QueryStoreWithGroupOne,
            Command::QueryFetchOne,
            Command::QueryUpdate,
        ]
        .into_iter()
        .map(|cmd| self.command_count(cmd))
        .sum()
    }

    /// File operations received by the storage daemon.
    pub fn storage_operations(&self) -> usize {
        [
            Command::UploadFile,
            Command::UploadAppenderFile,
            Command::UploadSlaveFile,
            Command::AppendFile,
            Command::DeleteFile,
            Command::DownloadFile,
        ]
        .into_iter()
        .map(|cmd| self.command_count(cmd))
        .sum()
    }

    pub fn file(&self, remote_filename: &str) -> Option<StoredFile> {
        self.state.files.get(remote_filename).map(|f| f.clone())
    }

    pub fn file_count(&self) -> usize {
        self.state.files.len()
    }

    /// Seed a file directly, bypassing the upload path.
    pub fn put_file(&self, remote_filename: &str, content: &[u8], appender: bool) {
        self.state.files.insert(
            remote_filename.to_owned(),
            StoredFile {
                content: content.to_vec(),
                appender,
            },
        );
    }
}

impl Drop for FakeCluster {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
