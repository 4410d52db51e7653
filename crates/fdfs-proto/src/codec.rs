//! Fixed-width field helpers.
//!
//! Text fields are NUL-padded to their width; integers are 8-byte
//! big-endian. Decoding reads from a slice and advances an offset, the same
//! shape the rest of the codebase uses for wire structs.

use bytes::BufMut;

use crate::error::ProtoError;
use crate::PKG_LEN_SIZE;

/// Append `value` padded with NULs to exactly `width` bytes.
pub fn put_fixed_str(
    buf: &mut impl BufMut,
    field: &'static str,
    value: &str,
    width: usize,
) -> Result<(), ProtoError> {
    let bytes = value.as_bytes();
    if bytes.len() > width {
        return Err(ProtoError::FieldTooLong {
            field,
            len: bytes.len(),
            max: width,
        });
    }
    buf.put_slice(bytes);
    buf.put_bytes(0, width - bytes.len());
    Ok(())
}

/// Append an 8-byte big-endian integer.
pub fn put_len(buf: &mut impl BufMut, value: u64) {
    buf.put_u64(value);
}

fn take<'a>(buf: &'a [u8], offset: &mut usize, n: usize) -> Result<&'a [u8], ProtoError> {
    let have = buf.len().saturating_sub(*offset);
    if have < n {
        return Err(ProtoError::InsufficientData { need: n, have });
    }
    let slice = &buf[*offset..*offset + n];
    *offset += n;
    Ok(slice)
}

/// Read a NUL-padded text field of `width` bytes.
pub fn get_fixed_str(
    buf: &[u8],
    offset: &mut usize,
    field: &'static str,
    width: usize,
) -> Result<String, ProtoError> {
    let raw = take(buf, offset, width)?;
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    std::str::from_utf8(&raw[..end])
        .map(str::to_owned)
        .map_err(|_| ProtoError::InvalidUtf8(field))
}

/// Read an 8-byte big-endian integer.
pub fn get_len(buf: &[u8], offset: &mut usize) -> Result<i64, ProtoError> {
    let raw = take(buf, offset, PKG_LEN_SIZE)?;
    let mut be = [0u8; PKG_LEN_SIZE];
    be.copy_from_slice(raw);
    Ok(i64::from_be_bytes(be))
}

/// Read one byte.
pub fn get_u8(buf: &[u8], offset: &mut usize) -> Result<u8, ProtoError> {
    Ok(take(buf, offset, 1)?[0])
}

/// Read the rest of the buffer as text.
pub fn get_tail_str(buf: &[u8], offset: &mut usize, field: &'static str) -> Result<String, ProtoError> {
    let raw = &buf[(*offset).min(buf.len())..];
    *offset = buf.len();
    std::str::from_utf8(raw)
        .map(str::to_owned)
        .map_err(|_| ProtoError::InvalidUtf8(field))
}

/// Normalize a file extension for the 6-byte ext field.
///
/// A leading dot is dropped and anything past the field width is cut off,
/// matching what the daemons expect from stock clients.
pub fn normalize_ext(ext: &str) -> &str {
    let ext = ext.strip_prefix('.').unwrap_or(ext);
    let mut end = ext.len().min(crate::FILE_EXT_NAME_MAX_LEN);
    while !ext.is_char_boundary(end) {
        end -= 1;
    }
    &ext[..end]
}
