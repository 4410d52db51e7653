//! Bounded pool of connections to one daemon host set.
//!
//! Idle connections sit in a lock-free [`ArrayQueue`] sized to `max_idle`.
//! A checkout hands out a [`PooledConnection`] guard that puts the
//! connection back on drop, unless it broke while in use or the pool has
//! been closed in the meantime.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::queue::ArrayQueue;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::connection::Connection;
use crate::connector::Connector;
use crate::error::NetError;

/// Sizing and timing of a [`ConnectionPool`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Connections dialled when the pool is created.
    pub min_idle: usize,
    /// Upper bound on connections kept idle; extra returns are dropped.
    pub max_idle: usize,
    /// Per read/write timeout on every pooled connection.
    #[serde(with = "crate::duration_secs")]
    pub network_timeout: Duration,
    /// Idle time after which a connection is probed before reuse.
    #[serde(with = "crate::duration_secs")]
    pub health_check_after: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_idle: 10,
            max_idle: 150,
            network_timeout: Duration::from_secs(60),
            health_check_after: Duration::from_secs(30),
        }
    }
}

pub struct ConnectionPool {
    hosts: Vec<String>,
    port: u16,
    config: PoolConfig,
    connector: Arc<dyn Connector>,
    idle: ArrayQueue<Connection>,
    closed: AtomicBool,
}

impl ConnectionPool {
    /// Create a pool for `hosts:port` and dial `min_idle` connections.
    ///
    /// Each connection goes to a randomly picked host. If any dial fails the
    /// connections made so far are dropped and the error is returned.
    pub async fn connect(
        hosts: Vec<String>,
        port: u16,
        config: PoolConfig,
        connector: Arc<dyn Connector>,
    ) -> Result<Arc<Self>, NetError> {
        if hosts.is_empty() {
            return Err(NetError::NoHosts);
        }
        let capacity = config.max_idle.max(1);
        let pool = Arc::new(Self {
            hosts,
            port,
            idle: ArrayQueue::new(capacity),
            config,
            connector,
            closed: AtomicBool::new(false),
        });

        let eager = pool.config.min_idle.min(capacity);
        for _ in 0..eager {
            let conn = pool.dial().await?;
            if pool.idle.push(conn).is_err() {
                break;
            }
        }
        tracing::debug!(
            hosts = ?pool.hosts,
            port = pool.port,
            idle = pool.idle.len(),
            "connection pool ready"
        );
        Ok(pool)
    }

    async fn dial(&self) -> Result<Connection, NetError> {
        let host = self
            .hosts
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or(NetError::NoHosts)?;
        let stream = self.connector.connect(&host, self.port).await?;
        Ok(Connection::new(
            stream,
            &host,
            self.port,
            self.config.network_timeout,
        ))
    }

    /// Check out a connection, reusing an idle one when possible.
    pub async fn get(self: &Arc<Self>) -> Result<PooledConnection, NetError> {
        if self.is_closed() {
            return Err(NetError::PoolClosed);
        }
        while let Some(mut conn) = self.idle.pop() {
            if conn.idle_for() < self.config.health_check_after {
                return Ok(self.wrap(conn));
            }
            match conn.active_test().await {
                Ok(()) => return Ok(self.wrap(conn)),
                Err(e) => {
                    tracing::warn!(
                        host = conn.host(),
                        port = conn.port(),
                        error = %e,
                        "discarding idle connection that failed its health check"
                    );
                }
            }
        }
        let conn = self.dial().await?;
        Ok(self.wrap(conn))
    }

    fn wrap(self: &Arc<Self>, conn: Connection) -> PooledConnection {
        PooledConnection {
            conn: Some(conn),
            pool: Arc::clone(self),
        }
    }

    fn put_back(&self, conn: Connection) {
        if conn.is_broken() || self.is_closed() {
            return;
        }
        if self.idle.push(conn).is_err() {
            return;
        }
        // Raced with close(): it may have drained before our push landed.
        if self.is_closed() {
            self.drain();
        }
    }

    fn drain(&self) -> usize {
        let mut n = 0;
        while self.idle.pop().is_some() {
            n += 1;
        }
        n
    }

    /// Close the pool and drop its idle connections.
    ///
    /// Returns `true` on the first call only. Connections still checked out
    /// are dropped when their guards are.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        let dropped = self.drain();
        tracing::debug!(
            hosts = ?self.hosts,
            port = self.port,
            dropped,
            "connection pool closed"
        );
        true
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of connections currently waiting in the idle queue.
    pub fn idle_len(&self) -> usize {
        self.idle.len()
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("hosts", &self.hosts)
            .field("port", &self.port)
            .field("idle", &self.idle.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// A checked-out connection; goes back to its pool on drop.
pub struct PooledConnection {
    // Always `Some` until drop.
    conn: Option<Connection>,
    pool: Arc<ConnectionPool>,
}

impl PooledConnection {
    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }
}

impl std::ops::Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection present until drop")
    }
}

impl std::ops::DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection present until drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.put_back(conn);
        }
    }
}
