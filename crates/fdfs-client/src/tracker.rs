//! Tracker client.
//!
//! Every query asks the tracker which storage daemon should serve one kind
//! of request. Store routes pick a node for a new file (optionally inside a
//! given group), update routes pick the node that may mutate an existing
//! file, fetch routes pick any node holding a copy.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use fdfs_net::{ConnectionPool, NetError};
use fdfs_proto::tracker::{QueryFileReq, QueryStoreReq};
use fdfs_proto::{Command, StorageServer};

use crate::error::{ClientError, ClientResult};
use crate::file_id::FileId;

/// Category of tracker query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteKind {
    StoreWithoutGroup,
    StoreWithGroup,
    Update,
    Fetch,
}

impl RouteKind {
    pub fn name(self) -> &'static str {
        match self {
            RouteKind::StoreWithoutGroup => "store",
            RouteKind::StoreWithGroup => "store-with-group",
            RouteKind::Update => "update",
            RouteKind::Fetch => "fetch",
        }
    }
}

impl fmt::Display for RouteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A tracker query together with its arguments.
#[derive(Debug, Clone, Copy)]
pub enum Route<'a> {
    Store { group: Option<&'a str> },
    Update(&'a FileId),
    Fetch(&'a FileId),
}

impl Route<'_> {
    pub fn kind(&self) -> RouteKind {
        match self {
            Route::Store { group: None } => RouteKind::StoreWithoutGroup,
            Route::Store { group: Some(_) } => RouteKind::StoreWithGroup,
            Route::Update(_) => RouteKind::Update,
            Route::Fetch(_) => RouteKind::Fetch,
        }
    }
}

#[async_trait]
pub trait TrackerClient: Send + Sync {
    /// Pick a storage daemon for a new file, inside `group` when given.
    async fn query_store(&self, group: Option<&str>) -> ClientResult<StorageServer>;

    /// The storage daemon allowed to modify or delete a file.
    async fn query_update(&self, group: &str, remote_filename: &str) -> ClientResult<StorageServer>;

    /// A storage daemon that can serve a file for download.
    async fn query_fetch(&self, group: &str, remote_filename: &str) -> ClientResult<StorageServer>;

    async fn resolve(&self, route: Route<'_>) -> ClientResult<StorageServer> {
        match route {
            Route::Store { group } => self.query_store(group).await,
            Route::Update(id) => self.query_update(&id.group_name, &id.remote_filename).await,
            Route::Fetch(id) => self.query_fetch(&id.group_name, &id.remote_filename).await,
        }
    }
}

/// [`TrackerClient`] over a pool of tracker connections.
pub struct TrackerClientImpl {
    pool: Arc<ConnectionPool>,
}

impl TrackerClientImpl {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    async fn exchange(&self, cmd: Command, body: &[u8]) -> Result<bytes::Bytes, NetError> {
        let mut conn = self.pool.get().await?;
        conn.call(cmd, body).await
    }

    async fn query_file(
        &self,
        cmd: Command,
        route: RouteKind,
        group: &str,
        remote_filename: &str,
    ) -> ClientResult<StorageServer> {
        let res = async {
            let req = QueryFileReq {
                group_name: group.to_owned(),
                remote_filename: remote_filename.to_owned(),
            };
            let body = self.exchange(cmd, &req.encode()?).await?;
            Ok::<_, NetError>(StorageServer::decode_fetch(&body)?)
        }
        .await;
        res.map_err(|source| ClientError::TrackerQuery { route, source })
    }
}

#[async_trait]
impl TrackerClient for TrackerClientImpl {
    async fn query_store(&self, group: Option<&str>) -> ClientResult<StorageServer> {
        let req = QueryStoreReq {
            group_name: group.map(str::to_owned),
        };
        let route = if group.is_some() {
            RouteKind::StoreWithGroup
        } else {
            RouteKind::StoreWithoutGroup
        };
        let res = async {
            let body = self.exchange(req.command(), &req.encode()?).await?;
            Ok::<_, NetError>(StorageServer::decode_store(&body)?)
        }
        .await;
        res.map_err(|source| ClientError::TrackerQuery { route, source })
    }

    async fn query_update(&self, group: &str, remote_filename: &str) -> ClientResult<StorageServer> {
        self.query_file(Command::QueryUpdate, RouteKind::Update, group, remote_filename)
            .await
    }

    async fn query_fetch(&self, group: &str, remote_filename: &str) -> ClientResult<StorageServer> {
        self.query_file(Command::QueryFetchOne, RouteKind::Fetch, group, remote_filename)
            .await
    }
}
