use std::fmt;

use crate::error::ProtoError;

/// Size of the packet header in bytes.
pub const HEADER_SIZE: usize = 10;

/// Command codes understood by the tracker and storage daemons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Response to any request.
    Response = 100,
    QueryStoreWithoutGroupOne = 101,
    QueryFetchOne = 102,
    QueryUpdate = 103,
    QueryStoreWithGroupOne = 104,
    UploadFile = 11,
    DeleteFile = 12,
    DownloadFile = 14,
    UploadSlaveFile = 21,
    UploadAppenderFile = 23,
    AppendFile = 24,
    Quit = 82,
    ActiveTest = 111,
}

impl Command {
    /// Protocol name of the command, used in logs and error messages.
    pub fn name(self) -> &'static str {
        match self {
            Command::Response => "RESP",
            Command::QueryStoreWithoutGroupOne => "QUERY_STORE_WITHOUT_GROUP_ONE",
            Command::QueryFetchOne => "QUERY_FETCH_ONE",
            Command::QueryUpdate => "QUERY_UPDATE",
            Command::QueryStoreWithGroupOne => "QUERY_STORE_WITH_GROUP_ONE",
            Command::UploadFile => "UPLOAD_FILE",
            Command::DeleteFile => "DELETE_FILE",
            Command::DownloadFile => "DOWNLOAD_FILE",
            Command::UploadSlaveFile => "UPLOAD_SLAVE_FILE",
            Command::UploadAppenderFile => "UPLOAD_APPENDER_FILE",
            Command::AppendFile => "APPEND_FILE",
            Command::Quit => "QUIT",
            Command::ActiveTest => "ACTIVE_TEST",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for Command {
    type Error = ProtoError;

    fn try_from(v: u8) -> Result<Self, ProtoError> {
        Ok(match v {
            100 => Self::Response,
            101 => Self::QueryStoreWithoutGroupOne,
            102 => Self::QueryFetchOne,
            103 => Self::QueryUpdate,
            104 => Self::QueryStoreWithGroupOne,
            11 => Self::UploadFile,
            12 => Self::DeleteFile,
            14 => Self::DownloadFile,
            21 => Self::UploadSlaveFile,
            23 => Self::UploadAppenderFile,
            24 => Self::AppendFile,
            82 => Self::Quit,
            111 => Self::ActiveTest,
            other => return Err(ProtoError::UnexpectedCommand(other)),
        })
    }
}

/// Header prepended to every packet.
///
/// Layout: 8-byte big-endian body length, 1-byte command, 1-byte status.
/// A non-zero status in a response is the errno reported by the daemon.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacketHeader {
    pub pkg_len: u64,
    pub cmd: u8,
    pub status: u8,
}

impl PacketHeader {
    /// Header for a request carrying `body_len` bytes.
    pub fn request(cmd: Command, body_len: u64) -> Self {
        Self {
            pkg_len: body_len,
            cmd: cmd as u8,
            status: 0,
        }
    }

    /// Header for a response carrying `body_len` bytes with the given status.
    pub fn response(status: u8, body_len: u64) -> Self {
        Self {
            pkg_len: body_len,
            cmd: Command::Response as u8,
            status,
        }
    }

    pub fn from_bytes(data: &[u8; HEADER_SIZE]) -> Self {
        let mut len = [0u8; 8];
        len.copy_from_slice(&data[0..8]);
        Self {
            pkg_len: u64::from_be_bytes(len),
            cmd: data[8],
            status: data[9],
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..8].copy_from_slice(&self.pkg_len.to_be_bytes());
        buf[8] = self.cmd;
        buf[9] = self.status;
        buf
    }

    /// Decoded command code, if it is one this crate knows.
    pub fn command(&self) -> Result<Command, ProtoError> {
        Command::try_from(self.cmd)
    }

    pub fn is_ok(&self) -> bool {
        self.status == 0
    }

    /// Check that this is a successful response header.
    ///
    /// Returns the status byte as the error value when the daemon reported a
    /// failure, so the caller can surface it unchanged.
    pub fn expect_response(&self) -> Result<(), ResponseCheck> {
        if self.cmd != Command::Response as u8 {
            return Err(ResponseCheck::Command(self.cmd));
        }
        if !self.is_ok() {
            return Err(ResponseCheck::Status(self.status));
        }
        Ok(())
    }
}

/// Why a header failed [`PacketHeader::expect_response`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCheck {
    Command(u8),
    Status(u8),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_byte_layout() {
        let hdr = PacketHeader::request(Command::UploadFile, 0x0102);
        let bytes = hdr.to_bytes();
        assert_eq!(&bytes[0..8], &[0, 0, 0, 0, 0, 0, 0x01, 0x02]);
        assert_eq!(bytes[8], 11);
        assert_eq!(bytes[9], 0);
    }

    #[test]
    fn test_header_from_bytes() {
        let data = [0, 0, 0, 0, 0, 0, 0, 40, 100, 0];
        let hdr = PacketHeader::from_bytes(&data);
        assert_eq!(hdr.pkg_len, 40);
        assert_eq!(hdr.command().unwrap(), Command::Response);
        assert!(hdr.is_ok());
    }

    #[test]
    fn test_expect_response() {
        assert!(PacketHeader::response(0, 0).expect_response().is_ok());
        assert_eq!(
            PacketHeader::response(2, 0).expect_response(),
            Err(ResponseCheck::Status(2))
        );
        assert_eq!(
            PacketHeader::request(Command::ActiveTest, 0).expect_response(),
            Err(ResponseCheck::Command(111))
        );
    }

    #[test]
    fn test_command_codes() {
        assert_eq!(Command::try_from(104).unwrap(), Command::QueryStoreWithGroupOne);
        assert_eq!(Command::AppendFile as u8, 24);
        assert!(matches!(
            Command::try_from(7),
            Err(ProtoError::UnexpectedCommand(7))
        ));
    }

    #[test]
    fn test_command_display() {
        assert_eq!(Command::QueryUpdate.to_string(), "QUERY_UPDATE");
    }
}
