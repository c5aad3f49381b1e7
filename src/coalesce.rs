//! Write-notify coalescing (C7): a single deferred write-notify slot that
//! absorbs repeated `on_file_update` calls between scheduler ticks, so a
//! busy producer results in exactly one read of the file at transmit time
//! rather than one message per update.

use crate::queue::{MessageQueue, WorkItem};

/// A deferred, not-yet-queued write notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingWrite {
    /// Base address of the file that changed.
    pub address: u32,
    /// Offset within the file where the dirty range starts.
    pub offset: u32,
    /// Length of the dirty range, in bytes.
    pub length: u32,
}

/// Holds at most one [`PendingWrite`], per §4.4's coalescing rules.
pub struct WriteCoalescer {
    pending: Option<PendingWrite>,
}

impl WriteCoalescer {
    /// An empty coalescer.
    pub const fn new() -> Self {
        WriteCoalescer { pending: None }
    }

    /// Record a new write notification. `frag_capacity` is the largest
    /// extended length still worth sending as one fragment
    /// (`FRAG_THRESHOLD - HIGH_HEADER_SIZE`). Returns a notification that
    /// must be flushed to the message queue immediately, if the new one
    /// displaced an unrelated pending one.
    pub fn notify(&mut self, address: u32, offset: u32, length: u32, frag_capacity: u32) -> Option<PendingWrite> {
        let new = PendingWrite { address, offset, length };
        match self.pending {
            None => {
                self.pending = Some(new);
                None
            }
            Some(q) => {
                if address == q.address
                    && offset == q.offset + q.length
                    && q.length + length <= frag_capacity
                {
                    self.pending = Some(PendingWrite {
                        address,
                        offset: q.offset,
                        length: q.length + length,
                    });
                    None
                } else if address == q.address
                    && offset >= q.offset
                    && offset + length <= q.offset + q.length
                {
                    // Already covered by the pending range; the eventual
                    // read of the file will pick it up.
                    None
                } else {
                    self.pending = Some(new);
                    Some(q)
                }
            }
        }
    }

    /// Take the pending notification, if any, leaving the coalescer empty.
    pub fn flush(&mut self) -> Option<PendingWrite> {
        self.pending.take()
    }

    /// Whether a write notification is currently deferred.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}

impl core::fmt::Debug for WriteCoalescer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WriteCoalescer").field("pending", &self.pending).finish()
    }
}

impl Default for WriteCoalescer {
    fn default() -> Self {
        Self::new()
    }
}

/// Push `pending` onto `queue` as a [`WorkItem::WriteNotify`], skipping the
/// push if an identical item is already queued.
pub(crate) fn enqueue_deduped<const N: usize>(
    queue: &mut MessageQueue<N>,
    pending: PendingWrite,
) -> crate::error::Result<()> {
    let item = WorkItem::WriteNotify {
        address: pending.address,
        offset: pending.offset,
        len: pending.length,
    };
    if queue.contains(&item) {
        return Ok(());
    }
    queue.push(item)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAP: u32 = 56;

    #[test]
    fn first_notify_is_held_not_flushed() {
        let mut c = WriteCoalescer::new();
        assert_eq!(c.notify(0x100, 0, 4, CAP), None);
        assert!(c.has_pending());
    }

    #[test]
    fn contiguous_notify_extends_pending() {
        let mut c = WriteCoalescer::new();
        c.notify(0x100, 0, 4, CAP);
        assert_eq!(c.notify(0x100, 4, 4, CAP), None);
        assert_eq!(
            c.flush(),
            Some(PendingWrite {
                address: 0x100,
                offset: 0,
                length: 8
            })
        );
    }

    #[test]
    fn extension_past_capacity_flushes_and_replaces() {
        let mut c = WriteCoalescer::new();
        c.notify(0x100, 0, 50, CAP);
        let flushed = c.notify(0x100, 50, 50, CAP);
        assert_eq!(
            flushed,
            Some(PendingWrite {
                address: 0x100,
                offset: 0,
                length: 50
            })
        );
        assert_eq!(
            c.flush(),
            Some(PendingWrite {
                address: 0x100,
                offset: 50,
                length: 50
            })
        );
    }

    #[test]
    fn notify_strictly_inside_pending_is_dropped() {
        let mut c = WriteCoalescer::new();
        c.notify(0x100, 0, 16, CAP);
        assert_eq!(c.notify(0x100, 4, 4, CAP), None);
        assert_eq!(
            c.flush(),
            Some(PendingWrite {
                address: 0x100,
                offset: 0,
                length: 16
            })
        );
    }

    #[test]
    fn unrelated_notify_flushes_the_old_one() {
        let mut c = WriteCoalescer::new();
        c.notify(0x100, 0, 4, CAP);
        let flushed = c.notify(0x200, 0, 4, CAP);
        assert_eq!(
            flushed,
            Some(PendingWrite {
                address: 0x100,
                offset: 0,
                length: 4
            })
        );
        assert!(c.has_pending());
    }

    #[test]
    fn enqueue_deduped_skips_existing_item() {
        let mut q: MessageQueue<4> = MessageQueue::new();
        let pw = PendingWrite {
            address: 0x100,
            offset: 0,
            length: 4,
        };
        enqueue_deduped(&mut q, pw).unwrap();
        enqueue_deduped(&mut q, pw).unwrap();
        assert_eq!(q.len(), 1);
    }
}
