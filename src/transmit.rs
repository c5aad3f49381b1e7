//! The transport-facing interface the scheduler (C6) drives each `run()`.
//!
//! Mirrors the reference implementation's four-function transmit handler,
//! minus the `arg`-as-`optimal_write_size` pointer trick: that was a C-ism
//! for avoiding an extra vtable slot and isn't idiomatic here, so
//! `optimal_write_size` is simply a fourth trait method queried once at
//! registration time.

/// Transport-facing half of the scheduler contract: reserve a buffer, fill
/// it, commit it.
pub trait TransmitHandler {
    /// Preferred number of bytes to accumulate before flushing. Read once at
    /// registration and cached, it caps how many bytes the scheduler
    /// reserves via `send_buffer` on any single `run()` call, even when more
    /// is reported available.
    fn optimal_write_size(&self) -> u32;

    /// Bytes currently reservable via `send_buffer`. Negative means the
    /// transport cannot currently accept anything.
    fn send_available(&mut self) -> i32;

    /// Reserve a contiguous buffer of `len` bytes to fill before calling
    /// `send`. Returns `None` if `len` bytes are not available.
    fn send_buffer(&mut self, len: u32) -> Option<&mut [u8]>;

    /// Commit `len` bytes starting at `offset` of the most recently reserved
    /// buffer. Negative return means a transport error.
    fn send(&mut self, offset: u32, len: u32) -> i32;
}
