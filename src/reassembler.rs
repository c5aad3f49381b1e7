//! Reception reassembler (C5): accepts inbound data frames, reassembles
//! fragmented writes into a fixed receive buffer, and delivers completed
//! writes to the target file — dropping silently on overflow or an offset
//! mismatch rather than surfacing an error to the transport.

use crate::error::Result;
use crate::file::File;

/// Fixed-capacity reassembly state for one connection.
///
/// `C` is the receive buffer capacity in bytes; a single fragmented write
/// larger than `C` is dropped (§4.3, B3) rather than accepted partially.
pub struct Reassembler<'a, const C: usize> {
    buf: [u8; C],
    /// Address the current reassembly started at (`R`); used to compute the
    /// write offset passed to `file_write` once the final fragment lands.
    start_address: u32,
    /// Bytes accumulated into `buf` so far (`O`).
    offset: usize,
    /// File being reassembled into (`F`), `None` when idle.
    current_file: Option<&'a File<'a>>,
    /// Whether the current reassembly has been abandoned (`D`).
    drop: bool,
}

impl<'a, const C: usize> Reassembler<'a, C> {
    /// An idle reassembler.
    pub const fn new() -> Self {
        Reassembler {
            buf: [0u8; C],
            start_address: 0,
            offset: 0,
            current_file: None,
            drop: false,
        }
    }

    /// Whether a reassembly is currently in progress (reassembling or
    /// dropping).
    pub fn is_idle(&self) -> bool {
        self.current_file.is_none()
    }

    fn reset(&mut self) {
        self.current_file = None;
        self.start_address = 0;
        self.offset = 0;
        self.drop = false;
    }

    /// Feed one inbound data frame. `remote_file` is the destination file,
    /// already resolved (and open-checked) by the caller — but only needed
    /// to *start* a new reassembly; an in-progress one keeps using the file
    /// it started with and ignores this argument, so the caller need not
    /// (and per §7, must not fail to deliver a frame because it couldn't)
    /// re-resolve it for every fragment. Pass `None` once non-idle.
    pub fn on_frame(&mut self, remote_file: Option<&'a File<'a>>, addr: u32, data: &[u8], more: bool) -> Result<()> {
        if self.is_idle() {
            let Some(remote_file) = remote_file else {
                return Ok(());
            };
            if !more {
                if let Some(base) = remote_file.base_address() {
                    if let Some(rel) = addr.checked_sub(base) {
                        remote_file.write(rel, data)?;
                    }
                }
                return Ok(());
            }
            if data.len() <= C {
                self.buf[..data.len()].copy_from_slice(data);
                self.offset = data.len();
                self.start_address = addr;
                self.current_file = Some(remote_file);
            } else {
                self.start_address = addr;
                self.drop = true;
                self.current_file = Some(remote_file);
            }
            return Ok(());
        }

        let file = self.current_file.expect("checked not idle above");
        if !self.drop {
            let base = file.base_address().unwrap_or(self.start_address);
            let expected = addr.checked_sub(base).map(|v| v as usize);
            match expected {
                Some(o) if o == self.offset && self.offset + data.len() <= C => {
                    self.buf[self.offset..self.offset + data.len()].copy_from_slice(data);
                    self.offset += data.len();
                }
                _ => self.drop = true,
            }
        }

        if !more {
            if !self.drop {
                if let Some(base) = file.base_address() {
                    if let Some(rel) = self.start_address.checked_sub(base) {
                        file.write(rel, &self.buf[..self.offset])?;
                    }
                }
            }
            self.reset();
        }
        Ok(())
    }
}

impl<const C: usize> core::fmt::Debug for Reassembler<'_, C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Reassembler")
            .field("capacity", &C)
            .field("offset", &self.offset)
            .field("is_idle", &self.is_idle())
            .field("drop", &self.drop)
            .finish_non_exhaustive()
    }
}

impl<const C: usize> Default for Reassembler<'_, C> {
    fn default() -> Self {
        Self::new()
    }
}
