//! Addressable byte regions: the `File` data model (§3) and its read/write
//! hooks into caller-owned port-data memory.

use core::cell::Cell;

use crate::error::{ApxError, Result};
use crate::name::FileName;
use crate::wire::command::{DIGEST_SIZE, FileInfo};
use crate::wire::INVALID_ADDRESS;

/// Upper bound on a file's length, mirroring `MAX_FILE_SIZE`.
pub const MAX_FILE_SIZE: u32 = u32::MAX - 1;

/// Whether a file's length is fixed for the connection's lifetime or can
/// change (dynamic signal lists / node definitions that get rebuilt).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum FileType {
    /// Length never changes after creation.
    Fixed = 0,
    /// Length may be renegotiated (not handled by this core; informational).
    Dynamic = 1,
}

/// Read/write hooks binding a [`File`] to the embedder's port-data memory.
///
/// Implementations are expected to be cheap and infallible in the common
/// case; errors here abort the in-progress pack/unpack but never panic the
/// manager.
pub trait FileOps {
    /// Fill `buf` with `buf.len()` bytes read from `offset` into the file's
    /// backing memory.
    fn read(&self, offset: u32, buf: &mut [u8]) -> Result<()>;

    /// Write `data` into the file's backing memory starting at `offset`.
    fn write(&self, offset: u32, data: &[u8]) -> Result<()>;
}

#[derive(Clone, Copy)]
struct MutableMeta {
    base_address: u32,
    file_type: u16,
    digest_type: u16,
    digest_data: [u8; DIGEST_SIZE],
    is_open: bool,
}

/// An addressable byte region: port data, a node definition, or metadata.
///
/// Owned by the embedder; the file manager only ever holds borrowed
/// references (`&'a File<'a>`) into a caller-owned registry, eliminating the
/// manager/file ownership cycle the reference implementation has via raw
/// pointers.
pub struct File<'a> {
    name: FileName,
    length: u32,
    ops: &'a dyn FileOps,
    meta: Cell<MutableMeta>,
}

impl core::fmt::Debug for File<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("File")
            .field("name", &self.name)
            .field("length", &self.length)
            .field("base_address", &self.base_address())
            .field("is_open", &self.is_open())
            .finish_non_exhaustive()
    }
}

impl<'a> File<'a> {
    /// Create a new file. `base_address` is `None` until the manager
    /// assigns (local files, via [`crate::file_map::FileMap::auto_insert`])
    /// or learns (remote/required files, via a matching `FILE_INFO`) one.
    pub fn new(
        name: &str,
        length: u32,
        file_type: FileType,
        digest_type: u16,
        digest_data: [u8; DIGEST_SIZE],
        ops: &'a dyn FileOps,
    ) -> Result<Self> {
        if length > MAX_FILE_SIZE {
            return Err(ApxError::FileTooLarge);
        }
        Ok(File {
            name: FileName::new(name)?,
            length,
            ops,
            meta: Cell::new(MutableMeta {
                base_address: INVALID_ADDRESS,
                file_type: file_type as u16,
                digest_type,
                digest_data,
                is_open: false,
            }),
        })
    }

    /// The file's name.
    pub fn name(&self) -> &FileName {
        &self.name
    }

    /// The file's length in bytes. Immutable for the file's lifetime.
    pub fn length(&self) -> u32 {
        self.length
    }

    /// The file's base address, if one has been assigned yet.
    pub fn base_address(&self) -> Option<u32> {
        let addr = self.meta.get().base_address;
        (addr != INVALID_ADDRESS).then_some(addr)
    }

    /// Whether the remote peer has opened this file (or, for remote files,
    /// whether we have opened it).
    pub fn is_open(&self) -> bool {
        self.meta.get().is_open
    }

    pub(crate) fn set_open(&self, open: bool) {
        let mut m = self.meta.get();
        m.is_open = open;
        self.meta.set(m);
    }

    /// Raw wire `file_type` value.
    pub fn file_type_raw(&self) -> u16 {
        self.meta.get().file_type
    }

    /// Raw wire `digest_type` value.
    pub fn digest_type(&self) -> u16 {
        self.meta.get().digest_type
    }

    /// The file's digest bytes.
    pub fn digest(&self) -> [u8; DIGEST_SIZE] {
        self.meta.get().digest_data
    }

    /// Assign a base address to a file that does not yet have one. Used by
    /// [`crate::file_map::FileMap::auto_insert`] for local files.
    pub(crate) fn assign_base_address(&self, address: u32) {
        let mut m = self.meta.get();
        debug_assert_eq!(m.base_address, INVALID_ADDRESS, "base_address is write-once");
        m.base_address = address;
        self.meta.set(m);
    }

    /// Copy in the address/type/digest learned from a matching remote
    /// `FILE_INFO`, as done for a previously-requested file.
    pub(crate) fn resolve_from_remote(&self, info: &FileInfo) {
        let mut m = self.meta.get();
        m.base_address = info.address;
        m.file_type = info.file_type;
        m.digest_type = info.digest_type;
        m.digest_data = info.digest;
        self.meta.set(m);
    }

    /// Build the `FileInfo` record to announce this file over the wire.
    pub(crate) fn to_file_info(&self) -> FileInfo {
        FileInfo {
            address: self.base_address().unwrap_or(INVALID_ADDRESS),
            length: self.length,
            file_type: self.file_type_raw(),
            digest_type: self.digest_type(),
            digest: self.digest(),
            name: self.name,
        }
    }

    /// Read `buf.len()` bytes starting at `offset` via the embedder hook.
    pub(crate) fn read(&self, offset: u32, buf: &mut [u8]) -> Result<()> {
        self.ops.read(offset, buf)
    }

    /// Write `data` starting at `offset` via the embedder hook.
    pub(crate) fn write(&self, offset: u32, data: &[u8]) -> Result<()> {
        self.ops.write(offset, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullOps;
    impl FileOps for NullOps {
        fn read(&self, _offset: u32, _buf: &mut [u8]) -> Result<()> {
            Ok(())
        }
        fn write(&self, _offset: u32, _data: &[u8]) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn base_address_write_once() {
        let ops = NullOps;
        let f = File::new("X.out", 4, FileType::Fixed, 0, [0; DIGEST_SIZE], &ops).unwrap();
        assert_eq!(f.base_address(), None);
        f.assign_base_address(0x100);
        assert_eq!(f.base_address(), Some(0x100));
    }

    #[test]
    fn rejects_oversized_length() {
        let ops = NullOps;
        assert!(File::new("X.out", u32::MAX, FileType::Fixed, 0, [0; DIGEST_SIZE], &ops).is_err());
    }
}
