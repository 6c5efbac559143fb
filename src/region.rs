use std::{
  alloc::{self, Layout},
  ptr::NonNull,
};

use libc::{c_void, intptr_t, sbrk};

use crate::{
  align::ALIGNMENT,
  error::{Error, Result},
};

/// The single primitive the allocator needs from its host: a contiguous
/// region whose top can move up and back down.
///
/// # Safety
///
/// Implementors must guarantee that the address returned by
/// [`RegionController::grow`] is aligned to [`ALIGNMENT`] and valid for reads
/// and writes of the requested number of bytes until the region is shrunk
/// below it.
pub unsafe trait RegionController {
  /// Extends the region by exactly `size` bytes and returns the previous top,
  /// where the new block will start.
  fn grow(
    &mut self,
    size: usize,
  ) -> Result<NonNull<u8>>;

  /// Moves the top of the region back to `address`.
  fn shrink(
    &mut self,
    address: NonNull<u8>,
  ) -> Result<()>;

  /// Current top of the region.
  fn top(&self) -> *mut u8;
}

/// Program break controller built on `sbrk(2)` and `brk(2)`.
///
/// ```text
///   High Address ┌─────────────────────┐
///                │       Stack         │ ↓ grows down
///                │                     │
///                │       Heap          │ ↑ grows up (sbrk)
///                ├─────────────────────┤ ← Program Break
///                │       Data          │
///   Low Address  └─────────────────────┘
/// ```
///
/// Assumes it is the only code moving the break. Growing pads a misaligned
/// break, and shrinking is refused unless the break still sits where we left
/// it. That check is best effort: `sbrk(0)` and `brk` are two calls, and a
/// foreign `sbrk` landing between them is not detected.
pub struct Sbrk {
  /// Break as of our last successful grow or shrink.
  top: usize,
}

impl Sbrk {
  pub const fn new() -> Self {
    Self { top: 0 }
  }
}

impl Default for Sbrk {
  fn default() -> Self {
    Self::new()
  }
}

fn sbrk_failed(address: *mut c_void) -> bool {
  address as usize == usize::MAX
}

unsafe impl RegionController for Sbrk {
  fn grow(
    &mut self,
    size: usize,
  ) -> Result<NonNull<u8>> {
    let increment = intptr_t::try_from(size).map_err(|_| Error::OutOfMemory)?;

    unsafe {
      let current = sbrk(0) as usize;
      let padding = align!(current) - current;

      if padding > 0 && sbrk_failed(sbrk(padding as intptr_t)) {
        return Err(Error::OutOfMemory);
      }

      let address = sbrk(increment);

      if sbrk_failed(address) {
        if padding > 0 {
          sbrk(-(padding as intptr_t));
        }
        return Err(Error::OutOfMemory);
      }

      self.top = address as usize + size;

      NonNull::new(address.cast()).ok_or(Error::OutOfMemory)
    }
  }

  fn shrink(
    &mut self,
    address: NonNull<u8>,
  ) -> Result<()> {
    unsafe {
      if sbrk(0) as usize != self.top {
        return Err(Error::ShrinkRefused);
      }

      if libc::brk(address.as_ptr().cast()) != 0 {
        return Err(Error::ShrinkRefused);
      }
    }

    self.top = address.as_ptr() as usize;

    Ok(())
  }

  fn top(&self) -> *mut u8 {
    unsafe { sbrk(0) }.cast()
  }
}

/// Fixed capacity region carved out of one owned buffer. The top starts at
/// the base of the buffer and growing past the capacity fails with
/// [`Error::OutOfMemory`].
///
/// Useful for building a heap that never touches the program break.
pub struct ArenaRegion {
  base: NonNull<u8>,
  layout: Layout,
  capacity: usize,
  used: usize,
}

unsafe impl Send for ArenaRegion {}

impl ArenaRegion {
  /// Reserves `capacity` zeroed bytes up front.
  pub fn with_capacity(capacity: usize) -> Result<Self> {
    let layout = Layout::from_size_align(capacity.max(ALIGNMENT), ALIGNMENT)
      .map_err(|_| Error::OutOfMemory)?;
    let base = NonNull::new(unsafe { alloc::alloc_zeroed(layout) }).ok_or(Error::OutOfMemory)?;

    Ok(Self {
      base,
      layout,
      capacity,
      used: 0,
    })
  }

  pub fn base(&self) -> *mut u8 {
    self.base.as_ptr()
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Bytes between the base and the current top.
  pub fn used(&self) -> usize {
    self.used
  }
}

unsafe impl RegionController for ArenaRegion {
  fn grow(
    &mut self,
    size: usize,
  ) -> Result<NonNull<u8>> {
    if size > self.capacity - self.used {
      return Err(Error::OutOfMemory);
    }

    let address = unsafe { self.base.add(self.used) };
    self.used += size;

    Ok(address)
  }

  fn shrink(
    &mut self,
    address: NonNull<u8>,
  ) -> Result<()> {
    let offset = (address.as_ptr() as usize)
      .checked_sub(self.base.as_ptr() as usize)
      .ok_or(Error::ShrinkRefused)?;

    if offset > self.used {
      return Err(Error::ShrinkRefused);
    }

    self.used = offset;

    Ok(())
  }

  fn top(&self) -> *mut u8 {
    unsafe { self.base.as_ptr().add(self.used) }
  }
}

impl Drop for ArenaRegion {
  fn drop(&mut self) {
    unsafe { alloc::dealloc(self.base.as_ptr(), self.layout) }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn arena_grows_and_shrinks() {
    let mut region = ArenaRegion::with_capacity(128).unwrap();
    let base = region.base();

    assert_eq!(region.top(), base);
    assert_eq!(base as usize % ALIGNMENT, 0);

    let first = region.grow(48).unwrap();
    assert_eq!(first.as_ptr(), base);

    let second = region.grow(80).unwrap();
    assert_eq!(second.as_ptr(), unsafe { base.add(48) });
    assert_eq!(region.used(), 128);

    assert_eq!(region.grow(8), Err(Error::OutOfMemory));
    assert_eq!(region.used(), 128);

    region.shrink(second).unwrap();
    assert_eq!(region.top(), second.as_ptr());

    region.shrink(first).unwrap();
    assert_eq!(region.used(), 0);
  }

  #[test]
  fn arena_rejects_shrink_above_top() {
    let mut region = ArenaRegion::with_capacity(64).unwrap();
    let base = region.base();

    region.grow(16).unwrap();

    let above = NonNull::new(unsafe { base.add(32) }).unwrap();
    assert_eq!(region.shrink(above), Err(Error::ShrinkRefused));
    assert_eq!(region.used(), 16);
  }
}
