//! Error kinds surfaced by the codec, file map, and manager layers.

use core::fmt;

/// Error kinds surfaced by the frame codec, file map, reassembler, and
/// manager layers.
///
/// These map onto the abstract error names from the reference
/// implementation's `apx_error.h` catalogue, narrowed to the kinds this
/// crate can actually raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ApxError {
    /// A required argument was invalid (e.g. zero-length buffer).
    InvalidArgument,
    /// A buffer was too small to hold a required boundary (e.g. a header).
    BufferBoundary,
    /// A destination buffer was not large enough to hold the serialized data.
    BufferFull,
    /// The message queue has no free slots.
    QueueFull,
    /// Generic parse failure, not otherwise categorized.
    Parse,
    /// Serialization into a destination buffer failed.
    Pack,
    /// Deserialization from a source buffer failed.
    Unpack,
    /// A frame carried data where none was expected, or vice versa.
    UnexpectedData,
    /// A command frame was malformed or carried an unknown command code.
    InvalidMsg,
    /// An operation was attempted in a state that forbids it.
    InvalidState,
    /// A null/absent reference was supplied where one was required.
    NullPtr,
    /// A `FILE_INFO` reply did not match the requested file's length.
    LengthMismatch,
    /// No file matches the requested address or name.
    NotFound,
    /// A file's length exceeds `MAX_FILE_SIZE`.
    FileTooLarge,
    /// A message would exceed `MAX_CMD_BUF_SIZE`.
    MsgTooLarge,
    /// A file name exceeds `MAX_FILE_NAME`.
    NameTooLong,
    /// The transport reported an error while committing a send.
    TransmitError,
}

impl fmt::Display for ApxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ApxError::InvalidArgument => "invalid argument",
            ApxError::BufferBoundary => "buffer too small for boundary",
            ApxError::BufferFull => "destination buffer full",
            ApxError::QueueFull => "message queue full",
            ApxError::Parse => "parse error",
            ApxError::Pack => "pack error",
            ApxError::Unpack => "unpack error",
            ApxError::UnexpectedData => "unexpected data",
            ApxError::InvalidMsg => "invalid message",
            ApxError::InvalidState => "invalid state",
            ApxError::NullPtr => "null reference",
            ApxError::LengthMismatch => "length mismatch",
            ApxError::NotFound => "not found",
            ApxError::FileTooLarge => "file too large",
            ApxError::MsgTooLarge => "message too large",
            ApxError::NameTooLong => "name too long",
            ApxError::TransmitError => "transmit error",
        };
        f.write_str(msg)
    }
}

#[cfg(any(feature = "std", test))]
impl std::error::Error for ApxError {}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, ApxError>;
