//! Single-slot cache for the storage connection pool.
//!
//! The client talks to one storage daemon at a time. The slot holds the
//! pool for that daemon and swaps it out when a route resolves somewhere
//! else. Resolution hands back a [`StoragePoolLease`] that pins the pool
//! until the operation using it is done, so a swap never closes a pool that
//! still has work in flight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fdfs_net::{ConnectionPool, Connector, NetError, PoolConfig};
use tokio::sync::{OwnedRwLockReadGuard, RwLock};

use crate::error::{ClientError, ClientResult};

type Slot = Option<Arc<ConnectionPool>>;

pub struct StoragePoolSlot {
    slot: Arc<RwLock<Slot>>,
    config: PoolConfig,
    connector: Arc<dyn Connector>,
    closed: AtomicBool,
}

/// A storage pool pinned for the duration of one operation.
pub struct StoragePoolLease {
    pool: Arc<ConnectionPool>,
    _pinned: OwnedRwLockReadGuard<Slot>,
}

impl StoragePoolLease {
    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }
}

impl std::ops::Deref for StoragePoolLease {
    type Target = Arc<ConnectionPool>;

    fn deref(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }
}

fn bound_to(pool: &ConnectionPool, addr: &str) -> bool {
    pool.hosts().first().is_some_and(|host| host == addr)
}

impl StoragePoolSlot {
    pub fn new(config: PoolConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            slot: Arc::new(RwLock::new(None)),
            config,
            connector,
            closed: AtomicBool::new(false),
        }
    }

    /// Pool for the storage daemon at `addr:port`.
    ///
    /// The cache key is the address alone: a bound pool for `addr` is reused
    /// whatever `port` is. Deployments run one storage daemon per host, so a
    /// changed port on the same host is not treated as a new target.
    ///
    /// Otherwise the bound pool, if any, is closed and replaced by a fresh one
    /// for `addr:port`. That waits until every outstanding lease is dropped.
    /// If the fresh pool cannot be created the slot is left empty. After
    /// [`close`](Self::close) nothing is bound again.
    pub async fn resolve(&self, addr: &str, port: u16) -> ClientResult<StoragePoolLease> {
        let read = Arc::clone(&self.slot).read_owned().await;
        let hit = read.as_ref().filter(|p| bound_to(p, addr)).cloned();
        if let Some(pool) = hit {
            return Ok(StoragePoolLease {
                pool,
                _pinned: read,
            });
        }
        drop(read);

        let mut write = Arc::clone(&self.slot).write_owned().await;
        // Another task may have bound it while we waited.
        let hit = write.as_ref().filter(|p| bound_to(p, addr)).cloned();
        if let Some(pool) = hit {
            return Ok(StoragePoolLease {
                pool,
                _pinned: write.downgrade(),
            });
        }
        if self.closed.load(Ordering::Acquire) {
            return Err(ClientError::PoolCreation {
                peer: format!("{addr}:{port}"),
                source: NetError::PoolClosed,
            });
        }
        if let Some(old) = write.take() {
            old.close();
            tracing::info!(
                old_host = old.hosts().first().map(String::as_str),
                old_port = old.port(),
                new_host = addr,
                new_port = port,
                "replacing storage pool"
            );
        }

        let pool = ConnectionPool::connect(
            vec![addr.to_owned()],
            port,
            self.config.clone(),
            Arc::clone(&self.connector),
        )
        .await
        .map_err(|source| ClientError::PoolCreation {
            peer: format!("{addr}:{port}"),
            source,
        })?;
        tracing::info!(host = addr, port, idle = pool.idle_len(), "storage pool created");

        *write = Some(Arc::clone(&pool));
        Ok(StoragePoolLease {
            pool,
            _pinned: write.downgrade(),
        })
    }

    /// The currently bound pool, if any.
    pub async fn current(&self) -> Option<Arc<ConnectionPool>> {
        self.slot.read().await.clone()
    }

    /// Close and unbind the current pool, and refuse to bind another one.
    /// Returns whether a pool was bound.
    pub async fn close(&self) -> bool {
        let mut slot = self.slot.write().await;
        self.closed.store(true, Ordering::Release);
        match slot.take() {
            Some(pool) => {
                pool.close();
                true
            }
            None => false,
        }
    }
}
