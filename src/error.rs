use std::fmt;

/// Failures reported by the allocator engine.
///
/// The raw-pointer surface ([`crate::global`] and the [`std::alloc::GlobalAlloc`]
/// implementations) flattens every variant into a null pointer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
  /// The region could not be extended, or the requested size does not fit
  /// in the address space.
  OutOfMemory,
  /// The pointer does not name the payload of a live block.
  InvalidPointer,
  /// The region refused to move its top back, usually because something
  /// else moved the program break after us. Never returned by public calls.
  ShrinkRefused,
}

impl fmt::Display for Error {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      Error::OutOfMemory => f.write_str("out of memory"),
      Error::InvalidPointer => f.write_str("pointer was not returned by this allocator"),
      Error::ShrinkRefused => f.write_str("region top could not be moved back"),
    }
  }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// First broken structural invariant found by [`crate::HeapAllocator::check`].
/// Addresses are block header addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvariantViolation {
  /// The cached payload address does not follow the header.
  PayloadMismatch { block: usize },
  /// Header address or payload capacity is not a multiple of the alignment.
  Misaligned { block: usize },
  /// A back-reference or the tail pointer disagrees with the forward links.
  BrokenLink { block: usize },
  /// A block starts before its predecessor ends.
  Overlap { block: usize },
  /// Two neighbouring free blocks were left unmerged.
  AdjacentFree { block: usize },
  /// The last block does not end at the top of the region.
  DetachedTop { end: usize, top: usize },
}

impl fmt::Display for InvariantViolation {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      Self::PayloadMismatch { block } => {
        write!(f, "block {block:#x} records a foreign payload address")
      }
      Self::Misaligned { block } => write!(f, "block {block:#x} is misaligned"),
      Self::BrokenLink { block } => write!(f, "links around block {block:#x} are inconsistent"),
      Self::Overlap { block } => write!(f, "block {block:#x} overlaps its predecessor"),
      Self::AdjacentFree { block } => write!(f, "free block {block:#x} follows a free neighbour"),
      Self::DetachedTop { end, top } => {
        write!(f, "chain ends at {end:#x} but region top is {top:#x}")
      }
    }
  }
}

impl std::error::Error for InvariantViolation {}
