//! # brkalloc - A First-Fit Program Break Allocator
//!
//! This crate provides a thread safe **first-fit free-list allocator** that
//! manages memory by moving the program break with `sbrk(2)` and `brk(2)`,
//! without delegating to any other allocator.
//!
//! ## Overview
//!
//! Every chunk of the heap starts with a header, and all headers form one
//! chain ordered by address:
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                         HEAP MEMORY                                  │
//!   │                                                                      │
//!   │   ┌────┬─────┬────┬──────────┬────┬─────┬────┬──────────────┐       │
//!   │   │ H  │ A1  │ H  │   free   │ H  │ A2  │ H  │      A3      │       │
//!   │   └────┴─────┴────┴──────────┴────┴─────┴────┴──────────────┘       │
//!   │     ▲                                                        ▲       │
//!   │     │                                                        │       │
//!   │   head                                                   Program     │
//!   │                                                           Break      │
//!   └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **Allocation** walks the chain and takes the first free block that is
//!   large enough, splitting off the excess when it can hold another block.
//!   When nothing fits, the break moves up and a new block is appended.
//! - **Release** marks the block free and merges it with free neighbours, so
//!   no two free blocks ever sit next to each other. A free block at the end
//!   of the heap is handed back by moving the break down.
//! - **Resize** shrinks in place, grows into a free right neighbour, or moves
//!   the contents to a new block.
//!
//! ## Crate Structure
//!
//! ```text
//!   brkalloc
//!   ├── align      - Alignment macro and checked rounding
//!   ├── block      - Block header and payload checks
//!   ├── chain      - First-fit search, split and coalesce (internal)
//!   ├── heap       - Allocation engine, unsynchronized (internal)
//!   ├── region     - Program break and arena region controllers
//!   ├── allocator  - HeapAllocator, the locked public API
//!   ├── config     - Runtime configuration
//!   ├── error      - Error types
//!   └── global     - Process wide heap and C shaped functions
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use brkalloc::{ArenaRegion, HeapAllocator};
//!
//! let heap = HeapAllocator::new(ArenaRegion::with_capacity(1 << 20).unwrap());
//!
//! unsafe {
//!   let address = heap.allocate(42).unwrap().as_ptr();
//!   address.write_bytes(7, 42);
//!
//!   let address = heap.resize(address, 1024).unwrap().as_ptr();
//!   assert_eq!(*address.add(41), 7);
//!
//!   heap.release(address);
//! }
//! ```
//!
//! On the real program break, use [`global`]:
//!
//! ```rust,no_run
//! use brkalloc::global;
//!
//! let address = global::calloc(4, 8);
//! unsafe { global::free(address) };
//! ```
//!
//! ## Limitations
//!
//! - **Eight byte alignment**: layouts with stricter alignment are refused.
//! - **One break heap**: the break is process wide and this crate assumes it
//!   is the only code moving it. Before handing memory back it checks, on a
//!   best effort basis, that the break is still where it was left; a
//!   concurrent foreign `sbrk` can still race with that check.
//! - **Unix-only**: requires `libc`, `sbrk` and `brk`.
//!
//! ## Safety
//!
//! Releasing and resizing take raw pointers and are `unsafe`. Pointers that
//! do not name a live block are detected and ignored, but a live pointer
//! released by someone who does not own it cannot be told apart.

/// Emits a `log` record when the given [`Config`] has logging on.
macro_rules! heap_event {
  ($config:expr, $level:ident, $($arg:tt)+) => {
    if $config.logging {
      log::$level!($($arg)+);
    }
  };
}

#[macro_use]
pub mod align;
mod allocator;
mod block;
mod chain;
mod config;
mod error;
pub mod global;
mod heap;
mod region;

pub use allocator::HeapAllocator;
pub use block::{BlockInfo, HEADER_SIZE, MIN_SPLIT_REMAINDER};
pub use config::Config;
pub use error::{Error, InvariantViolation, Result};
pub use region::{ArenaRegion, RegionController, Sbrk};
