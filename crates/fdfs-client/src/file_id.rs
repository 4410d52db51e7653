//! File identifiers: `<group>:<remote filename>`.

use std::fmt;
use std::str::FromStr;

use crate::error::ClientError;

pub const FILE_ID_SEPARATOR: char = ':';

/// Address of a stored file: its group plus the name the storage daemon
/// assigned it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileId {
    pub group_name: String,
    pub remote_filename: String,
}

impl FileId {
    pub fn new(group_name: impl Into<String>, remote_filename: impl Into<String>) -> Self {
        Self {
            group_name: group_name.into(),
            remote_filename: remote_filename.into(),
        }
    }

    pub fn encode(group_name: &str, remote_filename: &str) -> String {
        format!("{group_name}{FILE_ID_SEPARATOR}{remote_filename}")
    }

    /// Split `id` into exactly two non-empty parts.
    pub fn decode(id: &str) -> Result<Self, ClientError> {
        let mut parts = id.split(FILE_ID_SEPARATOR);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(group), Some(name), None) if !group.is_empty() && !name.is_empty() => {
                Ok(Self::new(group, name))
            }
            _ => Err(ClientError::InvalidFileId(id.to_owned())),
        }
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{FILE_ID_SEPARATOR}{}", self.group_name, self.remote_filename)
    }
}

impl FromStr for FileId {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_decode() {
        let id = FileId::decode("group1:M00/00/00/wKgBZ1.jpg").unwrap();
        assert_eq!(id.group_name, "group1");
        assert_eq!(id.remote_filename, "M00/00/00/wKgBZ1.jpg");
        assert_eq!(id.to_string(), "group1:M00/00/00/wKgBZ1.jpg");
    }

    #[test]
    fn test_encode_decode() {
        for (group, name) in [("group1", "file1"), ("g", "M00/00/00/a"), ("group2", "x.tar.gz")] {
            let id = FileId::decode(&FileId::encode(group, name)).unwrap();
            assert_eq!(id, FileId::new(group, name));
        }
    }

    #[test]
    fn test_rejects_malformed() {
        for bad in ["", "group1", ":file", "group1:", ":", "a:b:c", "group1::file"] {
            let err = FileId::decode(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidFileId, "{bad:?}");
        }
    }

    #[test]
    fn test_from_str() {
        let id: FileId = "group1:file1".parse().unwrap();
        assert_eq!(id, FileId::new("group1", "file1"));
        assert!("nope".parse::<FileId>().is_err());
    }
}
