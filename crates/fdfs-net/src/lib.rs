pub mod connection;
pub mod connector;
pub mod duration_secs;
pub mod error;
pub mod pool;

pub use connection::Connection;
pub use connector::{AsyncStream, BoxedStream, Connector, TcpConnector};
pub use error::NetError;
pub use pool::{ConnectionPool, PoolConfig, PooledConnection};
