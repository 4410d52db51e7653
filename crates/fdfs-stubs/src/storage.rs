//! Fake storage daemon backed by an in-memory file table.

use fdfs_proto::storage::{
    AppendReq, DeleteReq, DownloadReq, UploadReq, UploadRsp, UploadSlaveReq,
};
use fdfs_proto::{Command, ProtoError};

use crate::server::{Reply, EEXIST, EINVAL, ENOENT};
use crate::ClusterState;

/// A file held by the fake storage daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub content: Vec<u8>,
    /// Created by an appender upload, so append is allowed.
    pub appender: bool,
}

type Outcome = Result<Vec<u8>, u8>;

fn bad(_: ProtoError) -> u8 {
    EINVAL
}

pub(crate) fn handle(state: &ClusterState, cmd: u8, body: &[u8]) -> Reply {
    let outcome = match Command::try_from(cmd) {
        Ok(Command::UploadFile) => upload(state, body, false),
        Ok(Command::UploadAppenderFile) => upload(state, body, true),
        Ok(Command::UploadSlaveFile) => upload_slave(state, body),
        Ok(Command::AppendFile) => append(state, body),
        Ok(Command::DeleteFile) => delete(state, body),
        Ok(Command::DownloadFile) => download(state, body),
        _ => Err(EINVAL),
    };
    match outcome {
        Ok(body) => Reply::Body(body),
        Err(status) => Reply::Status(status),
    }
}

fn content_of(body: &[u8], off: usize, file_size: u64) -> Result<&[u8], u8> {
    let content = &body[off.min(body.len())..];
    if content.len() as u64 != file_size {
        return Err(EINVAL);
    }
    Ok(content)
}

fn stored(state: &ClusterState, remote_filename: String, content: &[u8], appender: bool) -> Outcome {
    state.files.insert(
        remote_filename.clone(),
        StoredFile {
            content: content.to_vec(),
            appender,
        },
    );
    UploadRsp {
        group_name: state.group_name.clone(),
        remote_filename,
    }
    .encode()
    .map_err(bad)
}

fn with_ext(stem: String, ext: &str) -> String {
    if ext.is_empty() {
        stem
    } else {
        format!("{stem}.{ext}")
    }
}

fn upload(state: &ClusterState, body: &[u8], appender: bool) -> Outcome {
    let (req, off) = UploadReq::decode_head(body).map_err(bad)?;
    let content = content_of(body, off, req.file_size)?;
    let stem = format!("M0{}/00/00/{:016X}", req.store_path_index, state.next_id());
    stored(state, with_ext(stem, &req.ext_name), content, appender)
}

/// Slave names are the master's name with the prefix spliced in before the
/// extension; the slave's own extension wins when given.
fn slave_name(master: &str, prefix: &str, ext: &str) -> String {
    let (stem, master_ext) = match master.rfind('.') {
        Some(dot) if !master[dot..].contains('/') => (&master[..dot], &master[dot + 1..]),
        _ => (master, ""),
    };
    let ext = if ext.is_empty() { master_ext } else { ext };
    with_ext(format!("{stem}{prefix}"), ext)
}

fn upload_slave(state: &ClusterState, body: &[u8]) -> Outcome {
    let (req, off) = UploadSlaveReq::decode_head(body).map_err(bad)?;
    let content = content_of(body, off, req.file_size)?;
    if req.prefix_name.is_empty() {
        return Err(EINVAL);
    }
    if !state.files.contains_key(&req.master_filename) {
        return Err(ENOENT);
    }
    let name = slave_name(&req.master_filename, &req.prefix_name, &req.ext_name);
    if state.files.contains_key(&name) {
        return Err(EEXIST);
    }
    stored(state, name, content, false)
}

fn append(state: &ClusterState, body: &[u8]) -> Outcome {
    let (req, off) = AppendReq::decode_head(body).map_err(bad)?;
    let content = content_of(body, off, req.file_size)?;
    let mut file = state.files.get_mut(&req.appender_filename).ok_or(ENOENT)?;
    if !file.appender {
        return Err(EINVAL);
    }
    file.content.extend_from_slice(content);
    Ok(Vec::new())
}

fn delete(state: &ClusterState, body: &[u8]) -> Outcome {
    let req = DeleteReq::decode(body).map_err(bad)?;
    if req.group_name != state.group_name {
        return Err(ENOENT);
    }
    state.files.remove(&req.remote_filename).ok_or(ENOENT)?;
    Ok(Vec::new())
}

fn download(state: &ClusterState, body: &[u8]) -> Outcome {
    let req = DownloadReq::decode(body).map_err(bad)?;
    if req.group_name != state.group_name {
        return Err(ENOENT);
    }
    let file = state.files.get(&req.remote_filename).ok_or(ENOENT)?;
    let len = file.content.len() as u64;
    if req.offset > len {
        return Err(EINVAL);
    }
    let end = match req.download_size {
        0 => len,
        size => req.offset.checked_add(size).filter(|&end| end <= len).ok_or(EINVAL)?,
    };
    Ok(file.content[req.offset as usize..end as usize].to_vec())
}
