//! The process wide heap on the program break, with C shaped entry points.
//!
//! The heap starts out empty and claims memory from the break on the first
//! allocation. It lives until the process exits. Logging is off, because
//! this heap may be serving the allocations of the logger itself.
//!
//! ```rust,no_run
//! use brkalloc::global::{self, Brk};
//!
//! // Every Box, Vec and String in the program goes through the break heap.
//! #[global_allocator]
//! static GLOBAL: Brk = Brk;
//!
//! fn main() {
//!   let address = global::malloc(16);
//!   assert!(!address.is_null());
//!   unsafe { global::free(address) };
//! }
//! ```

use std::{
  alloc::{GlobalAlloc, Layout},
  ptr::{self, NonNull},
};

use crate::{allocator::HeapAllocator, config::Config, region::Sbrk};

/// The one heap that owns the program break.
pub static HEAP: HeapAllocator<Sbrk> = HeapAllocator::with_config(Sbrk::new(), Config::quiet());

/// Allocates `size` bytes, or returns null when the break cannot move.
pub fn malloc(size: usize) -> *mut u8 {
  HEAP.allocate(size).map_or(ptr::null_mut(), NonNull::as_ptr)
}

/// Allocates `count * elem_size` zeroed bytes, or returns null.
pub fn calloc(
  count: usize,
  elem_size: usize,
) -> *mut u8 {
  HEAP
    .zero_allocate(count, elem_size)
    .map_or(ptr::null_mut(), NonNull::as_ptr)
}

/// Resizes `address` to `size` bytes. Returns null, leaving `address`
/// untouched, when the pointer is not live or memory runs out.
///
/// # Safety
///
/// See [`HeapAllocator::resize`].
pub unsafe fn realloc(
  address: *mut u8,
  size: usize,
) -> *mut u8 {
  unsafe { HEAP.resize(address, size) }.map_or(ptr::null_mut(), NonNull::as_ptr)
}

/// Releases `address`. Null and foreign pointers are ignored.
///
/// # Safety
///
/// See [`HeapAllocator::release`].
pub unsafe fn free(address: *mut u8) {
  unsafe { HEAP.release(address) }
}

/// Zero sized handle to [`HEAP`] for use as `#[global_allocator]`.
pub struct Brk;

unsafe impl GlobalAlloc for Brk {
  unsafe fn alloc(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    unsafe { HEAP.alloc(layout) }
  }

  unsafe fn alloc_zeroed(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    unsafe { HEAP.alloc_zeroed(layout) }
  }

  unsafe fn dealloc(
    &self,
    address: *mut u8,
    layout: Layout,
  ) {
    unsafe { HEAP.dealloc(address, layout) }
  }

  unsafe fn realloc(
    &self,
    address: *mut u8,
    layout: Layout,
    new_size: usize,
  ) -> *mut u8 {
    unsafe { HEAP.realloc(address, layout, new_size) }
  }
}
