//! File manager façade (C8): the public API embedders drive, folding in the
//! transmit scheduler (C6).

use crate::coalesce::{self, WriteCoalescer};
use crate::error::{ApxError, Result};
use crate::file::File;
use crate::file_map::FileMap;
use crate::queue::{MessageQueue, WorkItem};
use crate::reassembler::Reassembler;
use crate::transmit::TransmitHandler;
use crate::wire::command::{
    deserialize_cmd_type, deserialize_file_info, deserialize_open_file, serialize_file_info,
    serialize_open_file, CommandCode, FileInfo,
};
use crate::wire::header::{header_len_for_address, pack_header, unpack_msg};
use crate::wire::CMD_START_ADDR;

/// Matches the reference implementation's `APX_MSQ_QUEUE_WARN_THRESHOLD`:
/// log a warning once the outbound queue's free slots drop to this count or
/// fewer, checked right before each insertion point adds to it.
const MSG_QUEUE_WARN_THRESHOLD: usize = 2;

/// An in-progress large write being fragmented across `run()` calls: a
/// port-data write-notify or an initial full-file push.
struct FileWriteJob<'a> {
    file: &'a File<'a>,
    write_address: u32,
    read_offset: u32,
    remain: u32,
}

/// The embedded remote file manager core.
///
/// Const generics size every piece of fixed storage: `LOCAL`/`REMOTE` bound
/// the local and remote file maps, `REQUESTS` bounds the pending
/// remote-file request list, `QUEUE` bounds the outbound message queue,
/// `RECV` is the reassembly receive-buffer capacity, and `FRAG_THRESHOLD`
/// is the minimum free transmit-buffer space worth fragmenting a large
/// write into (must be at least the largest command's wire size).
pub struct FileManager<
    'a,
    H,
    const LOCAL: usize,
    const REMOTE: usize,
    const REQUESTS: usize,
    const QUEUE: usize,
    const RECV: usize,
    const FRAG_THRESHOLD: u32,
> {
    local_map: FileMap<'a, LOCAL>,
    remote_map: FileMap<'a, REMOTE>,
    requests: [Option<&'a File<'a>>; REQUESTS],
    request_len: usize,
    queue: MessageQueue<QUEUE>,
    reassembler: Reassembler<'a, RECV>,
    coalescer: WriteCoalescer,
    transmit_handler: Option<H>,
    /// Cached result of `H::optimal_write_size`, read once at registration
    /// time; `0` means no handler has been registered yet.
    optimal_write_size: u32,
    is_connected: bool,
    pending_cmd: Option<WorkItem>,
    pending_write: Option<FileWriteJob<'a>>,
}

impl<
        'a,
        H: TransmitHandler,
        const LOCAL: usize,
        const REMOTE: usize,
        const REQUESTS: usize,
        const QUEUE: usize,
        const RECV: usize,
        const FRAG_THRESHOLD: u32,
    > FileManager<'a, H, LOCAL, REMOTE, REQUESTS, QUEUE, RECV, FRAG_THRESHOLD>
{
    /// Create an empty, disconnected file manager. All storage — maps,
    /// queue, receive buffer — is inline; there is nothing to pass in, this
    /// is the Rust counterpart of the reference implementation's `create`
    /// (which only ever failed on a null caller-provided buffer, a
    /// condition that cannot arise here).
    pub const fn new() -> Self {
        FileManager {
            local_map: FileMap::new(),
            remote_map: FileMap::new(),
            requests: [None; REQUESTS],
            request_len: 0,
            queue: MessageQueue::new(),
            reassembler: Reassembler::new(),
            coalescer: WriteCoalescer::new(),
            transmit_handler: None,
            optimal_write_size: 0,
            is_connected: false,
            pending_cmd: None,
            pending_write: None,
        }
    }

    /// Attach a local file, auto-assigning it the next free address.
    pub fn attach_local_file(&mut self, file: &'a File<'a>) -> Result<()> {
        self.local_map.auto_insert(file)
    }

    /// Request a remote file by name; it resolves to an address once a
    /// matching `FILE_INFO` arrives. Rejects a file already requested by the
    /// same name, and rejects silently-at-the-API-level (via `Result`) when
    /// the request list is full.
    pub fn request_remote_file(&mut self, file: &'a File<'a>) -> Result<()> {
        let already_requested = self.requests[..self.request_len]
            .iter()
            .any(|f| f.map(|existing| existing.name() == file.name()).unwrap_or(false));
        if already_requested {
            return Err(ApxError::InvalidArgument);
        }
        if self.request_len >= REQUESTS {
            return Err(ApxError::BufferFull);
        }
        self.requests[self.request_len] = Some(file);
        self.request_len += 1;
        Ok(())
    }

    fn remove_request(&mut self, idx: usize) {
        for i in idx..self.request_len - 1 {
            self.requests[i] = self.requests[i + 1];
        }
        self.requests[self.request_len - 1] = None;
        self.request_len -= 1;
    }

    /// Register the transport. `optimal_write_size` is read once and cached
    /// for the life of the handler (there is no pointer-reinterpretation
    /// trick here, unlike the reference implementation), and caps how many
    /// bytes `run()` reserves per call.
    pub fn set_transmit_handler(&mut self, handler: H) {
        self.optimal_write_size = handler.optimal_write_size();
        self.transmit_handler = Some(handler);
    }

    /// Borrow the registered transmit handler, if any. Mainly useful for
    /// tests driving a fake transport; embedders typically don't need to
    /// reach back into the handler once it's registered.
    pub fn transmit_handler_mut(&mut self) -> Option<&mut H> {
        self.transmit_handler.as_mut()
    }

    /// Log a fill warning if `free` (the queue's free slots) is at or below
    /// [`MSG_QUEUE_WARN_THRESHOLD`], checked just before an insertion. Takes
    /// the free-slot count rather than `&self` so it can be called from
    /// `run()` without conflicting with a live borrow of another field.
    fn warn_if_queue_filling(free: usize, what: &str) {
        if free <= MSG_QUEUE_WARN_THRESHOLD {
            log::warn!("message queue fill warning for {what}, free slots before add: {free}");
        }
    }

    /// Mark the connection up and announce every local file.
    pub fn on_connected(&mut self) {
        self.is_connected = true;
        for i in 0..self.local_map.length() {
            Self::warn_if_queue_filling(QUEUE - self.queue.len(), "FILE_INFO");
            if self.queue.push(WorkItem::FileInfo { file_index: i }).is_err() {
                log::warn!("message queue full while announcing local files at connect");
                break;
            }
        }
    }

    /// Mark the connection down and discard all in-flight state.
    pub fn on_disconnected(&mut self) {
        self.is_connected = false;
        self.remote_map.clear();
        self.queue.clear();
        self.reassembler = Reassembler::new();
        self.coalescer = WriteCoalescer::new();
        self.pending_cmd = None;
        self.pending_write = None;
    }

    /// Feed one inbound frame: a command (FILE_INFO/FILE_OPEN) or a data
    /// write destined for a remote file.
    pub fn on_msg_received(&mut self, bytes: &[u8]) {
        let msg = match unpack_msg(bytes) {
            Ok(msg) => msg,
            Err(_) => {
                log::warn!("malformed inbound frame, discarding");
                return;
            }
        };
        if msg.address == CMD_START_ADDR {
            self.handle_command(msg.data);
        } else {
            self.handle_data(msg.address, msg.data, msg.more);
        }
    }

    fn handle_command(&mut self, data: &[u8]) {
        let code = match deserialize_cmd_type(data) {
            Ok(code) => code,
            Err(_) => {
                log::warn!("malformed command, discarding");
                return;
            }
        };
        match code {
            CommandCode::FileInfo => match deserialize_file_info(data) {
                Ok(info) => self.handle_file_info(info),
                Err(_) => log::warn!("malformed FILE_INFO, discarding"),
            },
            CommandCode::FileOpen => match deserialize_open_file(data) {
                Ok(address) => self.handle_file_open(address),
                Err(_) => log::warn!("malformed FILE_OPEN, discarding"),
            },
        }
    }

    fn handle_file_info(&mut self, info: FileInfo) {
        let Some(idx) = self.requests[..self.request_len]
            .iter()
            .position(|f| f.map(|existing| existing.name() == &info.name).unwrap_or(false))
        else {
            return;
        };
        let file = self.requests[idx].expect("position found a Some entry");
        if file.length() != info.length {
            log::warn!("FILE_INFO length mismatch for {}", file.name());
            return;
        }
        file.resolve_from_remote(&info);
        self.remove_request(idx);
        if self.remote_map.insert(file).is_err() {
            log::warn!("remote file map full or overlapping, dropping {}", file.name());
            return;
        }
        file.set_open(true);
        let address = file.base_address().expect("just resolved from remote info");
        Self::warn_if_queue_filling(QUEUE - self.queue.len(), "FILE_OPEN");
        if self.queue.push(WorkItem::OpenFile { address }).is_err() {
            log::warn!("message queue full, deferring FILE_OPEN for {}", file.name());
        }
    }

    fn handle_file_open(&mut self, address: u32) {
        let Some(file_index) = self.local_map.position_of_address(address) else {
            return;
        };
        if let Some(file) = self.local_map.get(file_index) {
            file.set_open(true);
        }
        Self::warn_if_queue_filling(QUEUE - self.queue.len(), "FILE_SEND");
        if self.queue.push(WorkItem::FileSend { file_index }).is_err() {
            log::warn!("message queue full, dropping FILE_SEND request");
        }
    }

    fn handle_data(&mut self, address: u32, data: &[u8], more: bool) {
        if self.reassembler.is_idle() {
            // Only look up the destination file to *start* a reassembly;
            // once one is in progress the reassembler keeps using the file
            // it started with and ignores this argument entirely.
            let Some(file) = self.remote_map.find_by_address(address) else {
                return;
            };
            if !file.is_open() {
                return;
            }
            let _ = self.reassembler.on_frame(Some(file), address, data, more);
        } else {
            let _ = self.reassembler.on_frame(None, address, data, more);
        }
    }

    /// Record that `[offset, offset+length)` of `file` changed, coalescing
    /// it with any not-yet-flushed pending notification. Silently ignored
    /// while disconnected or for a zero-length update.
    pub fn on_file_update(&mut self, file: &'a File<'a>, offset: u32, length: u32) {
        if !self.is_connected || length == 0 {
            return;
        }
        let Some(address) = file.base_address() else {
            return;
        };
        let frag_capacity = FRAG_THRESHOLD - crate::wire::HIGH_ADDRESS_SIZE;
        if let Some(flushed) = self.coalescer.notify(address, offset, length, frag_capacity) {
            Self::warn_if_queue_filling(QUEUE - self.queue.len(), "WRITE_NOTIFY");
            if coalesce::enqueue_deduped(&mut self.queue, flushed).is_err() {
                log::warn!("message queue full, dropping coalesced write-notify");
            }
        }
    }

    /// Drain one tick of outbound work. Reserves one transmit buffer from
    /// the handler, fills it with as many serialized messages/fragments as
    /// fit, and commits it; returns without doing anything if disconnected
    /// or if no transmit handler is registered.
    pub fn run(&mut self) {
        if !self.is_connected {
            return;
        }
        let Some(handler) = self.transmit_handler.as_mut() else {
            return;
        };
        let available = handler.send_available();
        if available <= 0 {
            return;
        }
        let mut reserve = available as u32;
        if self.optimal_write_size > 0 {
            reserve = reserve.min(self.optimal_write_size);
        }
        let Some(buf) = handler.send_buffer(reserve) else {
            return;
        };

        let mut used = 0u32;

        if let Some(job) = self.pending_write.take() {
            used = Self::drive_write_job(job, buf, used, &mut self.pending_write);
        }

        if self.pending_write.is_none() {
            if let Some(item) = self.pending_cmd.take() {
                match Self::serialize_item(&self.local_map, item, &mut buf[used as usize..]) {
                    Ok(n) => used += n,
                    Err(_) => self.pending_cmd = Some(item),
                }
            }
        }

        if self.pending_write.is_none() && self.pending_cmd.is_none() {
            if let Some(pending) = self.coalescer.flush() {
                Self::warn_if_queue_filling(QUEUE - self.queue.len(), "delayed WRITE_NOTIFY");
                let _ = coalesce::enqueue_deduped(&mut self.queue, pending);
            }
        }

        while self.pending_write.is_none() && self.pending_cmd.is_none() {
            let Some(item) = self.queue.peek().copied() else {
                break;
            };
            match item {
                WorkItem::FileInfo { .. } | WorkItem::OpenFile { .. } => {
                    match Self::serialize_item(&self.local_map, item, &mut buf[used as usize..]) {
                        Ok(n) => {
                            self.queue.pop();
                            used += n;
                        }
                        Err(_) => {
                            self.queue.pop();
                            self.pending_cmd = Some(item);
                        }
                    }
                }
                WorkItem::WriteNotify { address, offset, len } => {
                    self.queue.pop();
                    if let Some(file) = self.local_map.find_by_address(address) {
                        let job = FileWriteJob {
                            file,
                            write_address: address + offset,
                            read_offset: offset,
                            remain: len,
                        };
                        used = Self::drive_write_job(job, buf, used, &mut self.pending_write);
                    }
                }
                WorkItem::FileSend { file_index } => {
                    self.queue.pop();
                    if let Some(file) = self.local_map.get(file_index) {
                        if let Some(base) = file.base_address() {
                            let job = FileWriteJob {
                                file,
                                write_address: base,
                                read_offset: 0,
                                remain: file.length(),
                            };
                            used = Self::drive_write_job(job, buf, used, &mut self.pending_write);
                        }
                    }
                }
            }
        }

        if used > 0 {
            let handler = self.transmit_handler.as_mut().expect("checked above");
            let sent = handler.send(0, used);
            debug_assert!(sent >= 0, "send failed after a buffer was reserved");
        }
    }

    fn serialize_item(local_map: &FileMap<'a, LOCAL>, item: WorkItem, buf: &mut [u8]) -> Result<u32> {
        match item {
            WorkItem::FileInfo { file_index } => {
                let file = local_map.get(file_index).ok_or(ApxError::NotFound)?;
                let hlen = pack_header(buf, CMD_START_ADDR, false)?;
                let info = file.to_file_info();
                let n = serialize_file_info(&mut buf[hlen as usize..], &info)?;
                Ok(hlen + n as u32)
            }
            WorkItem::OpenFile { address } => {
                let hlen = pack_header(buf, CMD_START_ADDR, false)?;
                let n = serialize_open_file(&mut buf[hlen as usize..], address)?;
                Ok(hlen + n as u32)
            }
            WorkItem::WriteNotify { .. } | WorkItem::FileSend { .. } => {
                unreachable!("large writes are driven through FileWriteJob, not serialize_item")
            }
        }
    }

    /// Write as many fragments of `job` as fit in `buf[used..]`, leaving the
    /// remainder (if any) in `*pending`.
    fn drive_write_job(
        mut job: FileWriteJob<'a>,
        buf: &mut [u8],
        mut used: u32,
        pending: &mut Option<FileWriteJob<'a>>,
    ) -> u32 {
        loop {
            let available = buf.len() as u32 - used;
            if available < FRAG_THRESHOLD {
                break;
            }
            let header_len = header_len_for_address(job.write_address);
            if available <= header_len {
                break;
            }
            let chunk = job.remain.min(available - header_len);
            if chunk == 0 {
                break;
            }
            let more = chunk < job.remain;
            let Ok(hlen) = pack_header(&mut buf[used as usize..], job.write_address, more) else {
                break;
            };
            let data_start = (used + hlen) as usize;
            let data_end = data_start + chunk as usize;
            if job.file.read(job.read_offset, &mut buf[data_start..data_end]).is_err() {
                log::warn!("file_read failed mid-fragmentation, abandoning write job");
                return used;
            }
            used = data_end as u32;
            job.remain -= chunk;
            job.read_offset += chunk;
            job.write_address += chunk;
            if job.remain == 0 {
                break;
            }
        }
        if job.remain > 0 {
            *pending = Some(job);
        }
        used
    }
}

impl<
        'a,
        H: TransmitHandler,
        const LOCAL: usize,
        const REMOTE: usize,
        const REQUESTS: usize,
        const QUEUE: usize,
        const RECV: usize,
        const FRAG_THRESHOLD: u32,
    > Default for FileManager<'a, H, LOCAL, REMOTE, REQUESTS, QUEUE, RECV, FRAG_THRESHOLD>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<
        'a,
        H: TransmitHandler,
        const LOCAL: usize,
        const REMOTE: usize,
        const REQUESTS: usize,
        const QUEUE: usize,
        const RECV: usize,
        const FRAG_THRESHOLD: u32,
    > core::fmt::Debug for FileManager<'a, H, LOCAL, REMOTE, REQUESTS, QUEUE, RECV, FRAG_THRESHOLD>
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FileManager")
            .field("is_connected", &self.is_connected)
            .field("local_map", &self.local_map)
            .field("remote_map", &self.remote_map)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}
