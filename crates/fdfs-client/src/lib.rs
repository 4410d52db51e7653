//! FastDFS client.
//!
//! [`Client`] routes every file operation through a tracker, then runs it
//! against the storage daemon the tracker picked over a pooled connection.

pub mod client;
pub mod config;
pub mod error;
pub mod file_id;
pub mod pool_slot;
pub mod storage;
pub mod tracker;

pub use client::{Client, ClientBuilder, OpResult};
pub use config::{
    resolve_tracker_config, ClientConfig, ConfigError, ConfigSource, TrackerConfig, POOL_MAX_IDLE,
    POOL_MIN_IDLE,
};
pub use error::{ClientError, ClientResult, ErrorKind, Operation, OperationError};
pub use file_id::{FileId, FILE_ID_SEPARATOR};
pub use pool_slot::{StoragePoolLease, StoragePoolSlot};
pub use storage::{
    Content, DownloadContent, DownloadFileResponse, StorageClient, StorageClientImpl,
    UploadFileResponse,
};
pub use tracker::{Route, RouteKind, TrackerClient, TrackerClientImpl};
