//! Client error types.

use std::path::PathBuf;

use fdfs_net::NetError;
use fdfs_proto::Command;

use crate::config::ConfigError;
use crate::tracker::RouteKind;

/// Appended to local-file errors raised while preparing an upload.
pub const UPLOADING: &str = " (uploading)";

/// Errors that can occur during client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The tracker configuration could not be read or is malformed.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// A tracker or storage connection pool could not be established.
    #[error("cannot create connection pool for {peer}: {source}")]
    PoolCreation {
        peer: String,
        #[source]
        source: NetError,
    },

    /// The tracker was unreachable or refused to resolve a route.
    #[error("tracker query for {route} route failed: {source}")]
    TrackerQuery {
        route: RouteKind,
        #[source]
        source: NetError,
    },

    /// A local file is missing, unreadable or unwritable.
    #[error("{}: {source}{context}", path.display())]
    LocalFile {
        path: PathBuf,
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// A file id does not split into a group and a remote filename.
    #[error("invalid file id {0:?}: expected <group>:<remote filename>")]
    InvalidFileId(String),

    /// The storage daemon failed or rejected an operation.
    #[error("storage {command} failed: {source}")]
    StorageOperation {
        command: Command,
        #[source]
        source: NetError,
    },
}

/// Discriminant of a [`ClientError`], for callers that branch on the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Config,
    PoolCreation,
    TrackerQuery,
    LocalFile,
    InvalidFileId,
    StorageOperation,
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Config(_) => ErrorKind::Config,
            ClientError::PoolCreation { .. } => ErrorKind::PoolCreation,
            ClientError::TrackerQuery { .. } => ErrorKind::TrackerQuery,
            ClientError::LocalFile { .. } => ErrorKind::LocalFile,
            ClientError::InvalidFileId(_) => ErrorKind::InvalidFileId,
            ClientError::StorageOperation { .. } => ErrorKind::StorageOperation,
        }
    }

    /// The status byte the daemon answered with, if that is what failed.
    pub fn server_status(&self) -> Option<u8> {
        match self {
            ClientError::TrackerQuery { source, .. }
            | ClientError::StorageOperation { source, .. }
            | ClientError::PoolCreation { source, .. } => match source {
                NetError::ServerStatus { status } => Some(*status),
                _ => None,
            },
            _ => None,
        }
    }

    pub(crate) fn local_file(path: impl Into<PathBuf>, context: &'static str, source: std::io::Error) -> Self {
        ClientError::LocalFile {
            path: path.into(),
            context,
            source,
        }
    }
}

/// Convenience result type.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Public operations of [`Client`](crate::Client), used to tag errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    UploadByFilename,
    UploadByBuffer,
    UploadSlaveByFilename,
    UploadSlaveByBuffer,
    UploadAppenderByFilename,
    UploadAppenderByBuffer,
    AppendByFilename,
    AppendByBuffer,
    DeleteFile,
    DownloadToFile,
    DownloadToBuffer,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Operation::UploadByFilename => "upload_by_filename",
            Operation::UploadByBuffer => "upload_by_buffer",
            Operation::UploadSlaveByFilename => "upload_slave_by_filename",
            Operation::UploadSlaveByBuffer => "upload_slave_by_buffer",
            Operation::UploadAppenderByFilename => "upload_appender_by_filename",
            Operation::UploadAppenderByBuffer => "upload_appender_by_buffer",
            Operation::AppendByFilename => "append_by_filename",
            Operation::AppendByBuffer => "append_by_buffer",
            Operation::DeleteFile => "delete_file",
            Operation::DownloadToFile => "download_to_file",
            Operation::DownloadToBuffer => "download_to_buffer",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What every public [`Client`](crate::Client) operation fails with: the
/// operation that failed and why.
#[derive(Debug, thiserror::Error)]
#[error("{op}: {source}")]
pub struct OperationError {
    pub op: Operation,
    #[source]
    pub source: ClientError,
}

impl OperationError {
    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }

    pub fn cause(&self) -> &ClientError {
        &self.source
    }

    pub fn into_cause(self) -> ClientError {
        self.source
    }
}
