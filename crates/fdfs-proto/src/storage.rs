//! Storage request and response bodies.
//!
//! Commands:
//!   11 - upload file            store_path_index(1) size(8) ext(6) | content
//!   23 - upload appender file   same layout as upload
//!   21 - upload slave file      master_len(8) size(8) prefix(16) ext(6) master | content
//!   24 - append file            appender_len(8) size(8) appender | content
//!   12 - delete file            group(16) filename
//!   14 - download file          offset(8) size(8) group(16) filename
//!
//! Requests that carry file content are split into a head (everything
//! before the content) and the content itself, so callers can stream large
//! files straight from disk after writing the head.

use bytes::BufMut;

use crate::codec::{
    get_fixed_str, get_len, get_tail_str, get_u8, normalize_ext, put_fixed_str, put_len,
};
use crate::error::ProtoError;
use crate::{FILE_EXT_NAME_MAX_LEN, FILE_PREFIX_MAX_LEN, GROUP_NAME_MAX_LEN, PKG_LEN_SIZE};

fn non_negative(v: i64, field: &'static str) -> Result<u64, ProtoError> {
    u64::try_from(v).map_err(|_| ProtoError::Negative { field, value: v })
}

// ---------------------------------------------------------------------------
// Upload (plain and appender)
// ---------------------------------------------------------------------------

/// Head of an upload or upload-appender request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReq {
    pub store_path_index: u8,
    pub file_size: u64,
    pub ext_name: String,
}

impl UploadReq {
    pub const HEAD_LEN: usize = 1 + PKG_LEN_SIZE + FILE_EXT_NAME_MAX_LEN;

    pub fn new(store_path_index: u8, file_size: u64, ext_name: &str) -> Self {
        Self {
            store_path_index,
            file_size,
            ext_name: normalize_ext(ext_name).to_owned(),
        }
    }

    /// Total body length including the content.
    pub fn body_len(&self) -> u64 {
        Self::HEAD_LEN as u64 + self.file_size
    }

    pub fn encode_head(&self) -> Result<Vec<u8>, ProtoError> {
        let mut buf = Vec::with_capacity(Self::HEAD_LEN);
        buf.put_u8(self.store_path_index);
        put_len(&mut buf, self.file_size);
        put_fixed_str(&mut buf, "ext_name", &self.ext_name, FILE_EXT_NAME_MAX_LEN)?;
        Ok(buf)
    }

    /// Decode the head; returns it with the offset where content starts.
    pub fn decode_head(body: &[u8]) -> Result<(Self, usize), ProtoError> {
        let mut off = 0;
        let store_path_index = get_u8(body, &mut off)?;
        let file_size = non_negative(get_len(body, &mut off)?, "file_size")?;
        let ext_name = get_fixed_str(body, &mut off, "ext_name", FILE_EXT_NAME_MAX_LEN)?;
        Ok((
            Self {
                store_path_index,
                file_size,
                ext_name,
            },
            off,
        ))
    }
}

// ---------------------------------------------------------------------------
// Upload slave
// ---------------------------------------------------------------------------

/// Head of an upload-slave request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadSlaveReq {
    pub master_filename: String,
    pub file_size: u64,
    pub prefix_name: String,
    pub ext_name: String,
}

impl UploadSlaveReq {
    const FIXED_LEN: usize = 2 * PKG_LEN_SIZE + FILE_PREFIX_MAX_LEN + FILE_EXT_NAME_MAX_LEN;

    pub fn new(master_filename: &str, file_size: u64, prefix_name: &str, ext_name: &str) -> Self {
        Self {
            master_filename: master_filename.to_owned(),
            file_size,
            prefix_name: prefix_name.to_owned(),
            ext_name: normalize_ext(ext_name).to_owned(),
        }
    }

    pub fn head_len(&self) -> usize {
        Self::FIXED_LEN + self.master_filename.len()
    }

    pub fn body_len(&self) -> u64 {
        self.head_len() as u64 + self.file_size
    }

    pub fn encode_head(&self) -> Result<Vec<u8>, ProtoError> {
        let mut buf = Vec::with_capacity(self.head_len());
        put_len(&mut buf, self.master_filename.len() as u64);
        put_len(&mut buf, self.file_size);
        put_fixed_str(&mut buf, "prefix_name", &self.prefix_name, FILE_PREFIX_MAX_LEN)?;
        put_fixed_str(&mut buf, "ext_name", &self.ext_name, FILE_EXT_NAME_MAX_LEN)?;
        buf.put_slice(self.master_filename.as_bytes());
        Ok(buf)
    }

    pub fn decode_head(body: &[u8]) -> Result<(Self, usize), ProtoError> {
        let mut off = 0;
        let master_len = non_negative(get_len(body, &mut off)?, "master_filename_len")? as usize;
        let file_size = non_negative(get_len(body, &mut off)?, "file_size")?;
        let prefix_name = get_fixed_str(body, &mut off, "prefix_name", FILE_PREFIX_MAX_LEN)?;
        let ext_name = get_fixed_str(body, &mut off, "ext_name", FILE_EXT_NAME_MAX_LEN)?;
        let master_filename = get_fixed_str(body, &mut off, "master_filename", master_len)?;
        Ok((
            Self {
                master_filename,
                file_size,
                prefix_name,
                ext_name,
            },
            off,
        ))
    }
}

// ---------------------------------------------------------------------------
// Append
// ---------------------------------------------------------------------------

/// Head of an append request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppendReq {
    pub appender_filename: String,
    pub file_size: u64,
}

impl AppendReq {
    pub fn head_len(&self) -> usize {
        2 * PKG_LEN_SIZE + self.appender_filename.len()
    }

    pub fn body_len(&self) -> u64 {
        self.head_len() as u64 + self.file_size
    }

    pub fn encode_head(&self) -> Result<Vec<u8>, ProtoError> {
        let mut buf = Vec::with_capacity(self.head_len());
        put_len(&mut buf, self.appender_filename.len() as u64);
        put_len(&mut buf, self.file_size);
        buf.put_slice(self.appender_filename.as_bytes());
        Ok(buf)
    }

    pub fn decode_head(body: &[u8]) -> Result<(Self, usize), ProtoError> {
        let mut off = 0;
        let name_len = non_negative(get_len(body, &mut off)?, "appender_filename_len")? as usize;
        let file_size = non_negative(get_len(body, &mut off)?, "file_size")?;
        let appender_filename = get_fixed_str(body, &mut off, "appender_filename", name_len)?;
        Ok((
            Self {
                appender_filename,
                file_size,
            },
            off,
        ))
    }
}

// ---------------------------------------------------------------------------
// Delete / download
// ---------------------------------------------------------------------------

/// Delete request body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteReq {
    pub group_name: String,
    pub remote_filename: String,
}

impl DeleteReq {
    pub fn encode(&self) -> Result<Vec<u8>, ProtoError> {
        let mut buf = Vec::with_capacity(GROUP_NAME_MAX_LEN + self.remote_filename.len());
        put_fixed_str(&mut buf, "group_name", &self.group_name, GROUP_NAME_MAX_LEN)?;
        buf.put_slice(self.remote_filename.as_bytes());
        Ok(buf)
    }

    pub fn decode(body: &[u8]) -> Result<Self, ProtoError> {
        let mut off = 0;
        Ok(Self {
            group_name: get_fixed_str(body, &mut off, "group_name", GROUP_NAME_MAX_LEN)?,
            remote_filename: get_tail_str(body, &mut off, "remote_filename")?,
        })
    }
}

/// Download request body. A `download_size` of 0 means "to the end".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadReq {
    pub offset: u64,
    pub download_size: u64,
    pub group_name: String,
    pub remote_filename: String,
}

impl DownloadReq {
    pub fn encode(&self) -> Result<Vec<u8>, ProtoError> {
        let mut buf =
            Vec::with_capacity(2 * PKG_LEN_SIZE + GROUP_NAME_MAX_LEN + self.remote_filename.len());
        put_len(&mut buf, self.offset);
        put_len(&mut buf, self.download_size);
        put_fixed_str(&mut buf, "group_name", &self.group_name, GROUP_NAME_MAX_LEN)?;
        buf.put_slice(self.remote_filename.as_bytes());
        Ok(buf)
    }

    pub fn decode(body: &[u8]) -> Result<Self, ProtoError> {
        let mut off = 0;
        let offset = non_negative(get_len(body, &mut off)?, "offset")?;
        let download_size = non_negative(get_len(body, &mut off)?, "download_size")?;
        Ok(Self {
            offset,
            download_size,
            group_name: get_fixed_str(body, &mut off, "group_name", GROUP_NAME_MAX_LEN)?,
            remote_filename: get_tail_str(body, &mut off, "remote_filename")?,
        })
    }
}

// ---------------------------------------------------------------------------
// Upload response
// ---------------------------------------------------------------------------

/// Response to every upload flavour: where the daemon stored the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadRsp {
    pub group_name: String,
    pub remote_filename: String,
}

impl UploadRsp {
    pub fn encode(&self) -> Result<Vec<u8>, ProtoError> {
        let mut buf = Vec::with_capacity(GROUP_NAME_MAX_LEN + self.remote_filename.len());
        put_fixed_str(&mut buf, "group_name", &self.group_name, GROUP_NAME_MAX_LEN)?;
        buf.put_slice(self.remote_filename.as_bytes());
        Ok(buf)
    }

    pub fn decode(body: &[u8]) -> Result<Self, ProtoError> {
        if body.len() <= GROUP_NAME_MAX_LEN {
            return Err(ProtoError::BadLength {
                command: "UPLOAD_FILE",
                expected: GROUP_NAME_MAX_LEN as u64 + 1,
                actual: body.len() as u64,
            });
        }
        let mut off = 0;
        Ok(Self {
            group_name: get_fixed_str(body, &mut off, "group_name", GROUP_NAME_MAX_LEN)?,
            remote_filename: get_tail_str(body, &mut off, "remote_filename")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_head_layout() {
        let req = UploadReq::new(1, 5, ".txt");
        let head = req.encode_head().unwrap();
        assert_eq!(head.len(), UploadReq::HEAD_LEN);
        assert_eq!(head[0], 1);
        assert_eq!(&head[1..9], &5u64.to_be_bytes());
        assert_eq!(&head[9..12], b"txt");
        assert_eq!(req.body_len(), 15 + 5);

        let mut body = head.clone();
        body.extend_from_slice(b"hello");
        let (decoded, off) = UploadReq::decode_head(&body).unwrap();
        assert_eq!(decoded, req);
        assert_eq!(&body[off..], b"hello");
    }

    #[test]
    fn test_upload_slave_head() {
        let req = UploadSlaveReq::new("M00/00/00/master.jpg", 3, "_150x150", "jpg");
        let head = req.encode_head().unwrap();
        assert_eq!(head.len(), 8 + 8 + 16 + 6 + "M00/00/00/master.jpg".len());
        let (decoded, off) = UploadSlaveReq::decode_head(&head).unwrap();
        assert_eq!(decoded, req);
        assert_eq!(off, head.len());
    }

    #[test]
    fn test_upload_slave_prefix_too_long() {
        let req = UploadSlaveReq::new("M00/x", 0, "a-prefix-longer-than-16", "jpg");
        assert!(matches!(
            req.encode_head(),
            Err(ProtoError::FieldTooLong {
                field: "prefix_name",
                ..
            })
        ));
    }

    #[test]
    fn test_append_head() {
        let req = AppendReq {
            appender_filename: "M00/00/00/app".into(),
            file_size: 10,
        };
        let head = req.encode_head().unwrap();
        assert_eq!(req.body_len(), head.len() as u64 + 10);
        let (decoded, _) = AppendReq::decode_head(&head).unwrap();
        assert_eq!(decoded, req);
    }

    #[test]
    fn test_download_req() {
        let req = DownloadReq {
            offset: 4,
            download_size: 16,
            group_name: "group1".into(),
            remote_filename: "M00/00/00/abc".into(),
        };
        let body = req.encode().unwrap();
        assert_eq!(&body[0..8], &4u64.to_be_bytes());
        assert_eq!(DownloadReq::decode(&body).unwrap(), req);
    }

    #[test]
    fn test_delete_req() {
        let req = DeleteReq {
            group_name: "group3".into(),
            remote_filename: "M01/0A/0B/file".into(),
        };
        assert_eq!(DeleteReq::decode(&req.encode().unwrap()).unwrap(), req);
    }

    #[test]
    fn test_upload_rsp_too_short() {
        assert!(matches!(
            UploadRsp::decode(&[0u8; 16]),
            Err(ProtoError::BadLength { .. })
        ));
    }
}
