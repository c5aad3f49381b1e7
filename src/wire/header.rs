//! Frame header pack/unpack: the bi-modal (2-byte / 4-byte) address header.

use bitflags::bitflags;

use crate::error::{ApxError, Result};
use crate::wire::{
    DATA_HIGH_ADDR_MASK, DATA_HIGH_MIN_ADDR, DATA_LOW_ADDR_MASK, HIGH_ADDRESS_SIZE,
    LOW_ADDRESS_SIZE,
};

bitflags! {
    /// The header's two control bits, independent of address form.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct HeaderFlags: u8 {
        /// Form selector: set means the 4-byte (high) header is in use.
        const FORM = 0x80;
        /// More-bit: another fragment of this logical write follows.
        const MORE = 0x40;
    }
}

/// Second-most-significant bit of the header's first byte, either form.
const MORE_BIT_HIGH: u32 = 0x4000_0000;
const MORE_BIT_LOW: u32 = 0x4000;

/// An unpacked header plus the data slice that follows it in the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnpackedMsg<'a> {
    /// Destination address carried by the header.
    pub address: u32,
    /// Remaining bytes of the frame, after the header.
    pub data: &'a [u8],
    /// Whether another fragment of this same logical write follows.
    pub more: bool,
}

/// Returns the header form's length in bytes for the given destination
/// address, without packing anything.
pub fn header_len_for_address(address: u32) -> u32 {
    if address < DATA_HIGH_MIN_ADDR {
        LOW_ADDRESS_SIZE
    } else {
        HIGH_ADDRESS_SIZE
    }
}

/// Pack a header for `address` (choosing low or high form automatically)
/// into the start of `buf`. Returns the number of bytes written.
pub fn pack_header(buf: &mut [u8], address: u32, more: bool) -> Result<u32> {
    let len = header_len_for_address(address);
    if (buf.len() as u32) < len {
        return Err(ApxError::BufferBoundary);
    }
    if len == LOW_ADDRESS_SIZE {
        if address > DATA_LOW_ADDR_MASK {
            return Err(ApxError::InvalidArgument);
        }
        let mut v = address & DATA_LOW_ADDR_MASK;
        if more {
            v |= MORE_BIT_LOW;
        }
        buf[0] = (v >> 8) as u8;
        buf[1] = v as u8;
    } else {
        let mut v = 0x8000_0000u32 | (address & DATA_HIGH_ADDR_MASK);
        if more {
            v |= MORE_BIT_HIGH;
        }
        buf[0..4].copy_from_slice(&v.to_be_bytes());
    }
    Ok(len)
}

/// Unpack a header (and borrow the trailing data) from `buf`.
pub fn unpack_msg(buf: &[u8]) -> Result<UnpackedMsg<'_>> {
    let first = *buf.first().ok_or(ApxError::BufferBoundary)?;
    let flags = HeaderFlags::from_bits_retain(first);
    if flags.contains(HeaderFlags::FORM) {
        if buf.len() < 4 {
            return Err(ApxError::BufferBoundary);
        }
        let v = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        Ok(UnpackedMsg {
            address: v & DATA_HIGH_ADDR_MASK,
            data: &buf[4..],
            more: v & MORE_BIT_HIGH != 0,
        })
    } else {
        if buf.len() < 2 {
            return Err(ApxError::BufferBoundary);
        }
        let v = u16::from_be_bytes([buf[0], buf[1]]) as u32;
        Ok(UnpackedMsg {
            address: v & DATA_LOW_ADDR_MASK,
            data: &buf[2..],
            more: v & MORE_BIT_LOW != 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::DATA_HIGH_MIN_ADDR;

    #[test]
    fn low_form_roundtrip() {
        for &more in &[false, true] {
            let mut buf = [0u8; 4];
            let len = pack_header(&mut buf, 0x123, more).unwrap();
            assert_eq!(len, 2);
            let msg = unpack_msg(&buf[..len as usize]).unwrap();
            assert_eq!(msg.address, 0x123);
            assert_eq!(msg.more, more);
        }
    }

    #[test]
    fn high_form_roundtrip() {
        for &more in &[false, true] {
            let mut buf = [0u8; 4];
            let len = pack_header(&mut buf, 0x12_3456, more).unwrap();
            assert_eq!(len, 4);
            let msg = unpack_msg(&buf[..len as usize]).unwrap();
            assert_eq!(msg.address, 0x12_3456);
            assert_eq!(msg.more, more);
        }
    }

    #[test]
    fn form_switches_exactly_at_boundary() {
        assert_eq!(header_len_for_address(DATA_HIGH_MIN_ADDR - 1), 2);
        assert_eq!(header_len_for_address(DATA_HIGH_MIN_ADDR), 4);
    }

    #[test]
    fn low_form_rejects_out_of_range_address() {
        let mut buf = [0u8; 4];
        assert_eq!(
            pack_header(&mut buf, DATA_HIGH_MIN_ADDR, false),
            Ok(4)
        );
        // An address that fits the low range must not be forced into high form
        // by a caller-chosen header_len; pack_header always picks the correct
        // form for the given address, so this is purely a self-consistency
        // check that the two helpers agree.
        assert_eq!(header_len_for_address(0x3FFF), 2);
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        assert_eq!(unpack_msg(&[]), Err(ApxError::BufferBoundary));
        assert_eq!(unpack_msg(&[0x80, 0x00, 0x00]), Err(ApxError::BufferBoundary));
    }
}
