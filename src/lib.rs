//! Embedded remote file manager core for the APX signal-exchange framework.
//!
//! This crate implements the fragmented wire protocol and file-map/queue
//! bookkeeping of an APX node's remote file manager, the part of the stack
//! responsible for announcing local files, requesting remote ones, and
//! moving their contents over a byte-oriented transport in bounded
//! fragments. It does not implement an APX definition parser, a pack/unpack
//! VM, or any concrete transport — those live above or below this crate.
//!
//! There is no dynamic allocation anywhere in this core: file registries,
//! the outbound message queue and the reassembly receive buffer are all
//! fixed-capacity, sized by const generics at the call site. See
//! [`manager::FileManager`] for the public entry point.

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms, unreachable_pub)]

pub mod coalesce;
pub mod error;
pub mod file;
pub mod file_map;
pub mod manager;
pub mod name;
pub mod queue;
pub mod reassembler;
pub mod transmit;
pub mod wire;

pub use crate::coalesce::{PendingWrite, WriteCoalescer};
pub use crate::error::{ApxError, Result};
pub use crate::file::{File, FileOps, FileType};
pub use crate::file_map::FileMap;
pub use crate::manager::FileManager;
pub use crate::name::FileName;
pub use crate::queue::{MessageQueue, WorkItem};
pub use crate::reassembler::Reassembler;
pub use crate::transmit::TransmitHandler;
pub use crate::wire::command::{CommandCode, FileInfo, DIGEST_SIZE, MAX_FILE_NAME};
