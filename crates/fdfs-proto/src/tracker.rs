//! Tracker query bodies.
//!
//! Commands:
//!   101 - query store, no group   (empty body)
//!   104 - query store, with group (group)
//!   102 - query fetch             (group + filename)
//!   103 - query update            (group + filename)
//!
//! Store responses are `group(16) ip(15) port(8) store_path_index(1)`;
//! fetch and update responses drop the trailing index byte.

use bytes::BufMut;
use serde::{Deserialize, Serialize};

use crate::codec::{get_fixed_str, get_len, get_tail_str, get_u8, put_fixed_str, put_len};
use crate::error::ProtoError;
use crate::header::Command;
use crate::{GROUP_NAME_MAX_LEN, IP_ADDRESS_SIZE, PKG_LEN_SIZE};

/// IP field width inside tracker responses (the request width minus the NUL).
const RESPONSE_IP_SIZE: usize = IP_ADDRESS_SIZE - 1;

/// Body length of a query-store response.
pub const STORE_BODY_LEN: usize = GROUP_NAME_MAX_LEN + RESPONSE_IP_SIZE + PKG_LEN_SIZE + 1;

/// Body length of a query-fetch / query-update response.
pub const FETCH_BODY_LEN: usize = GROUP_NAME_MAX_LEN + RESPONSE_IP_SIZE + PKG_LEN_SIZE;

/// A storage endpoint handed out by the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageServer {
    pub group_name: String,
    pub ip_addr: String,
    pub port: u16,
    /// Store path on the storage node; only meaningful for store routes.
    pub store_path_index: u8,
}

impl StorageServer {
    /// Decode a query-store response body.
    pub fn decode_store(body: &[u8]) -> Result<Self, ProtoError> {
        check_len(Command::QueryStoreWithoutGroupOne, STORE_BODY_LEN, body)?;
        let mut off = 0;
        let mut server = Self::decode_common(body, &mut off)?;
        server.store_path_index = get_u8(body, &mut off)?;
        Ok(server)
    }

    /// Decode a query-fetch or query-update response body.
    pub fn decode_fetch(body: &[u8]) -> Result<Self, ProtoError> {
        check_len(Command::QueryFetchOne, FETCH_BODY_LEN, body)?;
        let mut off = 0;
        Self::decode_common(body, &mut off)
    }

    fn decode_common(body: &[u8], off: &mut usize) -> Result<Self, ProtoError> {
        let group_name = get_fixed_str(body, off, "group_name", GROUP_NAME_MAX_LEN)?;
        let ip_addr = get_fixed_str(body, off, "ip_addr", RESPONSE_IP_SIZE)?;
        let port = get_len(body, off)?;
        let port = u16::try_from(port).map_err(|_| ProtoError::InvalidPort(port))?;
        Ok(Self {
            group_name,
            ip_addr,
            port,
            store_path_index: 0,
        })
    }

    /// Encode as a query-store response body.
    pub fn encode_store(&self) -> Result<Vec<u8>, ProtoError> {
        let mut buf = Vec::with_capacity(STORE_BODY_LEN);
        self.encode_common(&mut buf)?;
        buf.put_u8(self.store_path_index);
        Ok(buf)
    }

    /// Encode as a query-fetch / query-update response body.
    pub fn encode_fetch(&self) -> Result<Vec<u8>, ProtoError> {
        let mut buf = Vec::with_capacity(FETCH_BODY_LEN);
        self.encode_common(&mut buf)?;
        Ok(buf)
    }

    fn encode_common(&self, buf: &mut Vec<u8>) -> Result<(), ProtoError> {
        put_fixed_str(buf, "group_name", &self.group_name, GROUP_NAME_MAX_LEN)?;
        put_fixed_str(buf, "ip_addr", &self.ip_addr, RESPONSE_IP_SIZE)?;
        put_len(buf, self.port as u64);
        Ok(())
    }
}

fn check_len(command: Command, expected: usize, body: &[u8]) -> Result<(), ProtoError> {
    if body.len() != expected {
        return Err(ProtoError::BadLength {
            command: command.name(),
            expected: expected as u64,
            actual: body.len() as u64,
        });
    }
    Ok(())
}

/// Query for a node to store a new file on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryStoreReq {
    pub group_name: Option<String>,
}

impl QueryStoreReq {
    pub fn command(&self) -> Command {
        match self.group_name {
            Some(_) => Command::QueryStoreWithGroupOne,
            None => Command::QueryStoreWithoutGroupOne,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, ProtoError> {
        let mut buf = Vec::new();
        if let Some(group) = &self.group_name {
            put_fixed_str(&mut buf, "group_name", group, GROUP_NAME_MAX_LEN)?;
        }
        Ok(buf)
    }

    pub fn decode(command: Command, body: &[u8]) -> Result<Self, ProtoError> {
        let group_name = match command {
            Command::QueryStoreWithGroupOne => {
                let mut off = 0;
                Some(get_fixed_str(body, &mut off, "group_name", GROUP_NAME_MAX_LEN)?)
            }
            _ => None,
        };
        Ok(Self { group_name })
    }
}

/// Query for the node holding an existing file (fetch or update route).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryFileReq {
    pub group_name: String,
    pub remote_filename: String,
}

impl QueryFileReq {
    pub fn encode(&self) -> Result<Vec<u8>, ProtoError> {
        let mut buf = Vec::with_capacity(GROUP_NAME_MAX_LEN + self.remote_filename.len());
        put_fixed_str(&mut buf, "group_name", &self.group_name, GROUP_NAME_MAX_LEN)?;
        buf.put_slice(self.remote_filename.as_bytes());
        Ok(buf)
    }

    pub fn decode(body: &[u8]) -> Result<Self, ProtoError> {
        let mut off = 0;
        let group_name = get_fixed_str(body, &mut off, "group_name", GROUP_NAME_MAX_LEN)?;
        let remote_filename = get_tail_str(body, &mut off, "remote_filename")?;
        Ok(Self {
            group_name,
            remote_filename,
        })
    }
}
