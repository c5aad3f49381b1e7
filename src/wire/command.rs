//! Command-channel payloads: `FILE_INFO` and `FILE_OPEN`.
//!
//! All integers here are little-endian, the opposite of the header's
//! big-endian addresses — an intentional, bit-exact asymmetry.

use zerocopy::byteorder::little_endian::{U16 as LeU16, U32 as LeU32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::{ApxError, Result};
use crate::name::FileName;

/// Size in bytes of a file's digest.
pub const DIGEST_SIZE: usize = 24;

/// Maximum length (not counting the NUL terminator) of a file name.
pub const MAX_FILE_NAME: usize = 64;

/// Size of the `FILE_INFO` fixed-layout prefix (before the name), in bytes.
pub const CMD_FILE_INFO_BASE_SIZE: usize = size_of::<FileInfoFixed>();

/// Size of the `FILE_OPEN` payload, in bytes (excluding the command code).
pub const FILE_OPEN_CMD_LEN: usize = 4;

/// Size of the little-endian command-code prefix shared by every command.
const CMD_CODE_SIZE: usize = 2;

/// Command codes carried on the command channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum CommandCode {
    /// Announces a local file's address, length, type and digest.
    FileInfo = 1,
    /// Requests that the peer open (and start sending) a file.
    FileOpen = 2,
}

impl CommandCode {
    fn from_u16(v: u16) -> Result<Self> {
        match v {
            1 => Ok(CommandCode::FileInfo),
            2 => Ok(CommandCode::FileOpen),
            _ => Err(ApxError::InvalidMsg),
        }
    }
}

/// Peek at the command code without consuming anything.
pub fn deserialize_cmd_type(data: &[u8]) -> Result<CommandCode> {
    let bytes: [u8; CMD_CODE_SIZE] = data
        .get(..CMD_CODE_SIZE)
        .and_then(|s| s.try_into().ok())
        .ok_or(ApxError::BufferBoundary)?;
    CommandCode::from_u16(u16::from_le_bytes(bytes))
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub(crate) struct FileInfoFixed {
    address: LeU32,
    length: LeU32,
    file_type: LeU16,
    digest_type: LeU16,
    digest: [u8; DIGEST_SIZE],
}

/// An announced file's attributes, bit-exact with the wire `FILE_INFO`
/// record (36 bytes fixed + name).
#[derive(Debug, Clone, Copy)]
pub struct FileInfo {
    /// The base address the peer has assigned the file.
    pub address: u32,
    /// The file's length in bytes.
    pub length: u32,
    /// The file's type (fixed or dynamic), as a raw wire value.
    pub file_type: u16,
    /// The digest algorithm identifier, as a raw wire value.
    pub digest_type: u16,
    /// The digest bytes (only the leading `digest_type`-relevant bytes are
    /// meaningful; unused trailing bytes are zero).
    pub digest: [u8; DIGEST_SIZE],
    /// The file's name.
    pub name: FileName,
}

/// Serialize a `FILE_INFO` command (code + fixed fields + NUL-terminated
/// name) into `buf`. Returns the number of bytes written.
pub fn serialize_file_info(buf: &mut [u8], info: &FileInfo) -> Result<usize> {
    let name = info.name.as_str();
    let total = CMD_CODE_SIZE + CMD_FILE_INFO_BASE_SIZE + name.len() + 1;
    if buf.len() < total {
        return Err(ApxError::BufferFull);
    }
    buf[0..CMD_CODE_SIZE].copy_from_slice(&(CommandCode::FileInfo as u16).to_le_bytes());
    let fixed = FileInfoFixed {
        address: info.address.into(),
        length: info.length.into(),
        file_type: info.file_type.into(),
        digest_type: info.digest_type.into(),
        digest: info.digest,
    };
    let fixed_start = CMD_CODE_SIZE;
    let fixed_end = fixed_start + CMD_FILE_INFO_BASE_SIZE;
    buf[fixed_start..fixed_end].copy_from_slice(fixed.as_bytes());
    let name_start = fixed_end;
    buf[name_start..name_start + name.len()].copy_from_slice(name.as_bytes());
    buf[name_start + name.len()] = 0;
    Ok(total)
}

/// Deserialize a `FILE_INFO` command from `data` (the command code must
/// already have been consumed/peeked by the caller via
/// [`deserialize_cmd_type`] — this function re-checks it).
pub fn deserialize_file_info(data: &[u8]) -> Result<FileInfo> {
    if deserialize_cmd_type(data)? != CommandCode::FileInfo {
        return Err(ApxError::UnexpectedData);
    }
    if data.len() < CMD_CODE_SIZE + CMD_FILE_INFO_BASE_SIZE {
        return Err(ApxError::BufferBoundary);
    }
    let fixed_bytes = &data[CMD_CODE_SIZE..CMD_CODE_SIZE + CMD_FILE_INFO_BASE_SIZE];
    let (fixed, _) =
        zerocopy::Ref::<_, FileInfoFixed>::from_prefix(fixed_bytes).map_err(|_| ApxError::Unpack)?;
    let fixed: &FileInfoFixed = zerocopy::Ref::into_ref(fixed);
    let name_data = &data[CMD_CODE_SIZE + CMD_FILE_INFO_BASE_SIZE..];
    let (name, _consumed) = FileName::from_nul_terminated(name_data)?;
    Ok(FileInfo {
        address: fixed.address.get(),
        length: fixed.length.get(),
        file_type: fixed.file_type.get(),
        digest_type: fixed.digest_type.get(),
        digest: fixed.digest,
        name,
    })
}

/// Serialize a `FILE_OPEN` command into `buf`. Returns bytes written.
pub fn serialize_open_file(buf: &mut [u8], address: u32) -> Result<usize> {
    let total = CMD_CODE_SIZE + FILE_OPEN_CMD_LEN;
    if buf.len() < total {
        return Err(ApxError::BufferFull);
    }
    buf[0..CMD_CODE_SIZE].copy_from_slice(&(CommandCode::FileOpen as u16).to_le_bytes());
    buf[CMD_CODE_SIZE..total].copy_from_slice(&address.to_le_bytes());
    Ok(total)
}

/// Deserialize a `FILE_OPEN` command, returning the requested address.
pub fn deserialize_open_file(data: &[u8]) -> Result<u32> {
    if deserialize_cmd_type(data)? != CommandCode::FileOpen {
        return Err(ApxError::UnexpectedData);
    }
    if data.len() < CMD_CODE_SIZE + FILE_OPEN_CMD_LEN {
        return Err(ApxError::BufferBoundary);
    }
    let bytes: [u8; 4] = data[CMD_CODE_SIZE..CMD_CODE_SIZE + FILE_OPEN_CMD_LEN]
        .try_into()
        .map_err(|_| ApxError::BufferBoundary)?;
    Ok(u32::from_le_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_info() -> FileInfo {
        FileInfo {
            address: 0x1234,
            length: 4,
            file_type: 0,
            digest_type: 0,
            digest: [0u8; DIGEST_SIZE],
            name: FileName::new("X.out").unwrap(),
        }
    }

    #[test]
    fn file_info_roundtrip() {
        let info = sample_info();
        let mut buf = [0u8; 128];
        let len = serialize_file_info(&mut buf, &info).unwrap();
        let decoded = deserialize_file_info(&buf[..len]).unwrap();
        assert_eq!(decoded.address, info.address);
        assert_eq!(decoded.length, info.length);
        assert_eq!(decoded.file_type, info.file_type);
        assert_eq!(decoded.digest_type, info.digest_type);
        assert_eq!(decoded.digest, info.digest);
        assert_eq!(decoded.name.as_str(), "X.out");
    }

    #[test]
    fn file_info_fixed_size_is_36_bytes() {
        assert_eq!(CMD_FILE_INFO_BASE_SIZE, 36);
    }

    #[test]
    fn open_file_roundtrip() {
        let mut buf = [0u8; 16];
        let len = serialize_open_file(&mut buf, 0x0020_0000).unwrap();
        assert_eq!(deserialize_open_file(&buf[..len]).unwrap(), 0x0020_0000);
    }

    #[test]
    fn truncated_file_info_is_unpack_error() {
        let mut buf = [0u8; 128];
        let len = serialize_file_info(&mut buf, &sample_info()).unwrap();
        assert_eq!(
            deserialize_file_info(&buf[..len - 2]).unwrap_err(),
            ApxError::Parse
        );
    }

    #[test]
    fn mismatched_cmd_type_is_rejected() {
        let mut buf = [0u8; 16];
        serialize_open_file(&mut buf, 4).unwrap();
        assert_eq!(
            deserialize_file_info(&buf).unwrap_err(),
            ApxError::UnexpectedData
        );
    }
}
