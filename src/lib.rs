#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![warn(missing_copy_implementations)]
#![warn(missing_debug_implementations)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![warn(unused_qualifications)]
#![warn(variant_size_differences)]

//! Demonstration of a memory-retention quirk of reference counting: a weak
//! observer can keep a payload's memory resident after the last owning handle
//! is gone, if (and only if) the payload shares its allocation with the
//! reference-count bookkeeping.
//!
//! # The effect
//!
//! A [`Strong`] handle owns a payload; an [`Observer`] derived from it does
//! not. Both point at one control structure carrying two independent counts.
//! Releasing the last `Strong` drops the payload *value*; the control block's
//! memory is only returned to the allocator once the last `Observer` is
//! released too. These are two separate events, and the gap between them is
//! where the effect lives:
//!
//! - Under [`Placement::Combined`], one allocation holds both the counts and
//!   the payload value. If the payload is an embedded byte array
//!   ([`Shape::EmbeddedArray`]), "dropping" it frees nothing, so a surviving
//!   observer retains the full payload memory until it is released.
//! - Under [`Placement::Split`], the payload lives in its own allocation
//!   which is freed the moment the last `Strong` goes. The observer only
//!   keeps the (small) control block alive.
//!
//! The payload shape matters for the same reason: a payload that merely owns
//! a separate buffer through a small handle ([`Shape::BufferHandle`]) frees
//! that buffer when its drop glue runs, so even a combined allocation
//! releases the bulk of the memory at the last strong release.
//!
//! Whether the retained bytes show up in process accounting depends on the
//! allocator physically co-locating bookkeeping and payload and returning
//! large blocks to the operating system when freed; the demonstration prints
//! expectations as expectations, not guarantees.
//!
//! # Observing it
//!
//! [`report_memory_usage`] reads the process's virtual memory size and
//! resident set size from the OS process accounting (`/proc/self/stat`) and
//! prints both in kilobytes as `VM: <float>; RSS: <float>`. The
//! [`run_scenario`] runner interleaves such reports with the
//! create / observe / release-strong / release-observer lifecycle; the binary
//! runs all four placement × shape scenarios in a fixed sequence.
//!
//! The accounting source is injectable through [`StatSource`], so unit tests
//! feed synthetic records instead of relying on real allocator behavior.
//!
//! # Example
//!
//! ```
//! use weakhold::{Placement, Shape, Strong};
//!
//! let mut strong = Strong::allocate(Placement::Combined, Shape::EmbeddedArray, 4096)?;
//! let mut observer = strong.downgrade();
//!
//! strong.release();
//! // The payload value is gone, but the observer still holds the combined
//! // block, payload bytes included.
//! assert!(observer.upgrade().is_none());
//! assert_eq!(observer.weak_count(), 1);
//!
//! observer.release();
//! # Ok::<(), weakhold::AllocError>(())
//! ```
//!
//! Like `std::rc`, [`Strong`] and [`Observer`] are not `Send` and are not
//! `Sync`; the whole experiment is single-threaded.

#![doc(html_root_url = "https://docs.rs/weakhold/0.1.0")]

#[macro_use]
extern crate log;

mod block;
mod error;
mod handle;
mod report;
mod scenario;

pub use block::{Placement, Shape};
pub use error::{AllocError, Error, ReportError};
pub use handle::{Observer, Strong};
pub use report::{
    parse_stat_record, report_memory_usage, sample, MemorySample, ProcStat, StatSource,
};
pub use scenario::{
    run_combined_allocation_scenario, run_scenario, run_split_allocation_scenario, PAYLOAD_LEN,
};
