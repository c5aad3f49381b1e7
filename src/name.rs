//! A bounded, stack-resident file name, avoiding any heap allocation.

use core::fmt;

use crate::error::{ApxError, Result};
use crate::wire::command::MAX_FILE_NAME;

/// A file name bounded to [`MAX_FILE_NAME`] bytes, stored inline.
#[derive(Clone, Copy)]
pub struct FileName {
    bytes: [u8; MAX_FILE_NAME],
    len: u8,
}

impl FileName {
    /// Build a `FileName` from a `&str`, failing if it does not fit.
    pub fn new(name: &str) -> Result<Self> {
        if name.len() >= MAX_FILE_NAME || name.len() > u8::MAX as usize {
            return Err(ApxError::NameTooLong);
        }
        let mut bytes = [0u8; MAX_FILE_NAME];
        bytes[..name.len()].copy_from_slice(name.as_bytes());
        Ok(FileName {
            bytes,
            len: name.len() as u8,
        })
    }

    /// Parse a `FileName` out of a NUL-terminated byte slice, returning the
    /// name and the number of bytes consumed including the terminator.
    pub fn from_nul_terminated(data: &[u8]) -> Result<(Self, usize)> {
        let nul_pos = memchr::memchr(0, data).ok_or(ApxError::Parse)?;
        if nul_pos >= MAX_FILE_NAME {
            return Err(ApxError::NameTooLong);
        }
        let name = core::str::from_utf8(&data[..nul_pos]).map_err(|_| ApxError::Parse)?;
        Ok((FileName::new(name)?, nul_pos + 1))
    }

    /// Borrow the name as a `&str`.
    pub fn as_str(&self) -> &str {
        // SAFETY: `new` and `from_nul_terminated` only ever store valid UTF-8.
        core::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or("")
    }

    /// Length in bytes, excluding any NUL terminator.
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Whether the name is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl PartialEq for FileName {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}
impl Eq for FileName {}

impl fmt::Debug for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
