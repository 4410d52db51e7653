//! Wire protocol shared by the tracker and storage tiers.
//!
//! Every packet is a fixed 10-byte [`PacketHeader`] followed by a body whose
//! layout depends on the command. The tracker bodies live in [`tracker`],
//! the storage bodies in [`storage`]; [`codec`] holds the fixed-width field
//! helpers both of them use.

pub mod codec;
pub mod error;
pub mod header;
pub mod storage;
pub mod tracker;

pub use error::ProtoError;
pub use header::{Command, PacketHeader, HEADER_SIZE};
pub use tracker::StorageServer;

/// Width of a group name field.
pub const GROUP_NAME_MAX_LEN: usize = 16;

/// Width of an IP address field in requests.
pub const IP_ADDRESS_SIZE: usize = 16;

/// Width of a file extension field (without the leading dot).
pub const FILE_EXT_NAME_MAX_LEN: usize = 6;

/// Width of the slave file prefix field.
pub const FILE_PREFIX_MAX_LEN: usize = 16;

/// Width of every integer field on the wire.
pub const PKG_LEN_SIZE: usize = 8;

/// Tracker port used when the configuration does not name one.
pub const DEFAULT_TRACKER_PORT: u16 = 22122;
