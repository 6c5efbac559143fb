use std::{
  mem,
  ptr::{self, NonNull},
};

use static_assertions::const_assert_eq;

use crate::align::ALIGNMENT;

/// Header written at the start of every chunk of the managed region.
///
/// ```text
///   ┌───────────────────────┬────────────────────────────────┐
///   │    Block Header       │         Payload                │
///   │  ┌─────────────────┐  │                                │
///   │  │ size: N         │  │  ┌──────────────────────────┐  │
///   │  │ is_free         │  │  │                          │  │
///   │  │ next / prev     │  │  │     N bytes usable       │  │
///   │  │ payload ────────┼──┼─►│                          │  │
///   │  └─────────────────┘  │  └──────────────────────────┘  │
///   └───────────────────────┴────────────────────────────────┘
/// ```
///
/// Blocks form a chain ordered by address. `next` is the block that follows
/// in the region, `prev` is only a back-reference for reaching the left
/// neighbour in O(1).
#[repr(C, align(8))]
pub struct Block {
  /// Payload capacity in bytes, excluding the header. Always a multiple of
  /// [`ALIGNMENT`].
  pub size: usize,
  pub is_free: bool,
  pub next: Option<NonNull<Block>>,
  pub prev: Option<NonNull<Block>>,
  /// Address right after this header. Cached so a payload pointer can be
  /// checked against the header it claims to belong to.
  pub payload: *mut u8,
}

pub const HEADER_SIZE: usize = mem::size_of::<Block>();

/// A free block is only carved in two when the leftover can hold a header
/// plus the smallest non-empty payload.
pub const MIN_SPLIT_REMAINDER: usize = HEADER_SIZE + ALIGNMENT;

const_assert_eq!(HEADER_SIZE % ALIGNMENT, 0);

/// Snapshot of one block, as reported by [`crate::HeapAllocator::walk`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockInfo {
  /// Address of the header.
  pub address: usize,
  pub size: usize,
  pub is_free: bool,
}

impl Block {
  /// Writes a fresh header at `address` and returns a pointer to it.
  ///
  /// # Safety
  ///
  /// `address` must be aligned to [`ALIGNMENT`] and valid for writes of
  /// `HEADER_SIZE + size` bytes.
  pub unsafe fn write(
    address: NonNull<u8>,
    size: usize,
    is_free: bool,
    prev: Option<NonNull<Block>>,
    next: Option<NonNull<Block>>,
  ) -> NonNull<Block> {
    unsafe {
      let block = address.cast::<Block>();
      block.as_ptr().write(Block {
        size,
        is_free,
        next,
        prev,
        payload: address.as_ptr().add(HEADER_SIZE),
      });
      block
    }
  }

  #[inline]
  pub fn address_of(block: NonNull<Block>) -> usize {
    block.as_ptr() as usize
  }

  /// First address past the payload of `block`.
  #[inline]
  pub unsafe fn end_address(block: NonNull<Block>) -> usize {
    Self::address_of(block) + HEADER_SIZE + unsafe { (*block.as_ptr()).size }
  }

  /// Whether `b` starts exactly where `a` ends.
  #[inline]
  pub unsafe fn is_adjacent(
    a: NonNull<Block>,
    b: NonNull<Block>,
  ) -> bool {
    unsafe { Self::end_address(a) == Self::address_of(b) }
  }

  #[inline]
  pub unsafe fn payload_of(block: NonNull<Block>) -> NonNull<u8> {
    unsafe { NonNull::new_unchecked((*block.as_ptr()).payload) }
  }

  /// Derives the header of a payload pointer, trusting nothing until the
  /// candidate header lies inside `[lower, upper)` and records `address` as
  /// its payload.
  ///
  /// # Safety
  ///
  /// Every address in `[lower, upper)` must be readable.
  pub unsafe fn from_payload(
    address: *const u8,
    lower: usize,
    upper: usize,
  ) -> Option<NonNull<Block>> {
    let address = address as usize;

    if address % ALIGNMENT != 0 {
      return None;
    }

    let header = address.checked_sub(HEADER_SIZE)?;

    if header < lower || address > upper {
      return None;
    }

    let block = header as *mut Block;
    let recorded = unsafe { ptr::addr_of!((*block).payload).read() };

    if recorded as usize != address {
      return None;
    }

    NonNull::new(block)
  }

  pub(crate) unsafe fn info(block: NonNull<Block>) -> BlockInfo {
    let header = unsafe { block.as_ref() };

    BlockInfo {
      address: Self::address_of(block),
      size: header.size,
      is_free: header.is_free,
    }
  }
}
