use thiserror::Error;

/// Errors raised while encoding or decoding packet bodies.
#[derive(Debug, Error)]
pub enum ProtoError {
    /// The body is shorter than the fixed part of the layout.
    #[error("insufficient data: need {need} bytes but only {have} remain")]
    InsufficientData { need: usize, have: usize },

    /// A response body length does not match the layout of its command.
    #[error("bad body length for {command}: expected {expected}, got {actual}")]
    BadLength {
        command: &'static str,
        expected: u64,
        actual: u64,
    },

    /// A value does not fit into its fixed-width field.
    #[error("field {field} too long: {len} bytes (max {max})")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    /// A text field holds bytes that are not UTF-8.
    #[error("field {0} is not valid UTF-8")]
    InvalidUtf8(&'static str),

    /// A length or offset field holds a negative value.
    #[error("field {field} is negative: {value}")]
    Negative { field: &'static str, value: i64 },

    /// A port field holds a value outside the u16 range.
    #[error("invalid port number {0}")]
    InvalidPort(i64),

    /// The response header carries an unexpected command code.
    #[error("unexpected response command {0}")]
    UnexpectedCommand(u8),
}
