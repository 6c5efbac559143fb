use std::{
  alloc::{GlobalAlloc, Layout},
  ptr::{self, NonNull},
};

use spin::Mutex;

use crate::{
  align::ALIGNMENT,
  block::BlockInfo,
  config::Config,
  error::{Error, InvariantViolation, Result},
  heap::{Heap, Resized},
  region::RegionController,
};

/// First-fit allocator over a [`RegionController`].
///
/// Every operation that reads or edits the block chain or the region top
/// runs with one lock held. The only work done outside the lock is touching
/// payload bytes the caller already owns: zero-filling in
/// [`HeapAllocator::zero_allocate`] and the copy of a relocating
/// [`HeapAllocator::resize`].
///
/// # Examples
///
/// ```rust
/// use brkalloc::{ArenaRegion, HeapAllocator};
///
/// let heap = HeapAllocator::new(ArenaRegion::with_capacity(64 * 1024).unwrap());
///
/// unsafe {
///   let address = heap.allocate(13).unwrap();
///   assert_eq!(heap.usable_size(address.as_ptr()), Ok(16));
///
///   let address = heap.resize(address.as_ptr(), 8).unwrap();
///   heap.release(address.as_ptr());
/// }
///
/// heap.check().unwrap();
/// ```
pub struct HeapAllocator<R> {
  heap: Mutex<Heap<R>>,
}

impl<R: RegionController> HeapAllocator<R> {
  pub const fn new(region: R) -> Self {
    Self::with_config(region, Config::DEFAULT)
  }

  pub const fn with_config(
    region: R,
    config: Config,
  ) -> Self {
    Self {
      heap: Mutex::new(Heap::new(region, config)),
    }
  }

  /// Returns a payload of at least `size` bytes, rounded up to a multiple
  /// of eight.
  pub fn allocate(
    &self,
    size: usize,
  ) -> Result<NonNull<u8>> {
    self.heap.lock().allocate(size)
  }

  /// Allocates room for `count` elements of `elem_size` bytes and zeroes
  /// the whole rounded-up capacity.
  pub fn zero_allocate(
    &self,
    count: usize,
    elem_size: usize,
  ) -> Result<NonNull<u8>> {
    let size = count.checked_mul(elem_size).ok_or(Error::OutOfMemory)?;
    let address = self.allocate(size)?;

    unsafe { ptr::write_bytes(address.as_ptr(), 0, align!(size)) };

    Ok(address)
  }

  /// Resizes the block behind `address` to at least `new_size` bytes, in
  /// place when possible. Null behaves like [`HeapAllocator::allocate`]. On
  /// failure the old block is left untouched.
  ///
  /// # Safety
  ///
  /// `address` must be null or a pointer returned by this allocator that is
  /// still owned by the caller. Pointers that fail the payload check are
  /// rejected, but a live pointer owned by someone else is not detected.
  pub unsafe fn resize(
    &self,
    address: *mut u8,
    new_size: usize,
  ) -> Result<NonNull<u8>> {
    let Some(address) = NonNull::new(address) else {
      return self.allocate(new_size);
    };

    let resized = {
      let mut heap = self.heap.lock();

      match heap.resize(address, new_size) {
        Ok(resized) => resized,
        Err(err) => {
          heap_event!(
            heap.config(),
            warn,
            "resize({:p}, {}) failed: {}",
            address,
            new_size,
            err
          );
          return Err(err);
        }
      }
    };

    match resized {
      Resized::InPlace(address) => Ok(address),
      Resized::Moved { from, to, count } => {
        unsafe { ptr::copy_nonoverlapping(from.as_ptr(), to.as_ptr(), count) };

        let released = self.heap.lock().release(from.as_ptr());
        debug_assert_eq!(released, Ok(()));

        Ok(to)
      }
    }
  }

  /// Gives the block behind `address` back to the heap. Null and pointers
  /// that do not name a live block are ignored.
  ///
  /// # Safety
  ///
  /// `address` must be null or a pointer returned by this allocator that is
  /// still owned by the caller, and it must not be used afterwards.
  pub unsafe fn release(
    &self,
    address: *mut u8,
  ) {
    if address.is_null() {
      return;
    }

    let mut heap = self.heap.lock();

    if let Err(err) = heap.release(address) {
      heap_event!(heap.config(), warn, "release({:p}) ignored: {}", address, err);
    }
  }

  pub fn usable_size(
    &self,
    address: *const u8,
  ) -> Result<usize> {
    self.heap.lock().usable_size(address)
  }

  /// Calls `f` with every block in address order while holding the lock.
  /// `f` must not call back into this allocator.
  pub fn walk(
    &self,
    f: impl FnMut(BlockInfo),
  ) {
    self.heap.lock().blocks().for_each(f);
  }

  /// Verifies the structural invariants of the heap.
  pub fn check(&self) -> std::result::Result<(), InvariantViolation> {
    self.heap.lock().check()
  }

  pub fn top(&self) -> *mut u8 {
    self.heap.lock().top()
  }
}

/// Serves layouts aligned to at most eight bytes; anything stricter gets a
/// null pointer.
unsafe impl<R: RegionController> GlobalAlloc for HeapAllocator<R> {
  unsafe fn alloc(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    if layout.align() > ALIGNMENT {
      return ptr::null_mut();
    }

    self.allocate(layout.size()).map_or(ptr::null_mut(), NonNull::as_ptr)
  }

  unsafe fn alloc_zeroed(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    if layout.align() > ALIGNMENT {
      return ptr::null_mut();
    }

    self.zero_allocate(1, layout.size()).map_or(ptr::null_mut(), NonNull::as_ptr)
  }

  unsafe fn dealloc(
    &self,
    address: *mut u8,
    _layout: Layout,
  ) {
    unsafe { self.release(address) }
  }

  unsafe fn realloc(
    &self,
    address: *mut u8,
    layout: Layout,
    new_size: usize,
  ) -> *mut u8 {
    if layout.align() > ALIGNMENT {
      return ptr::null_mut();
    }

    unsafe { self.resize(address, new_size) }.map_or(ptr::null_mut(), NonNull::as_ptr)
  }
}

#[cfg(test)]
mod tests {
  use std::{
    sync::Barrier,
    thread::{self, ThreadId},
  };

  use super::*;
  use crate::{block::HEADER_SIZE, region::ArenaRegion};

  fn allocator(capacity: usize) -> HeapAllocator<ArenaRegion> {
    HeapAllocator::with_config(ArenaRegion::with_capacity(capacity).unwrap(), Config::quiet())
  }

  fn verify_heap_is_empty(allocator: &HeapAllocator<ArenaRegion>) {
    let mut blocks = 0;
    allocator.walk(|_| blocks += 1);
    assert_eq!(blocks, 0);
    allocator.check().unwrap();
  }

  #[test]
  fn zero_allocate_clears_reused_memory() {
    let allocator = allocator(64 * 1024);

    unsafe {
      let dirty = allocator.allocate(100).unwrap();
      let _guard = allocator.allocate(8).unwrap();
      ptr::write_bytes(dirty.as_ptr(), 0xAB, 104);
      allocator.release(dirty.as_ptr());

      let zeroed = allocator.zero_allocate(25, 4).unwrap();
      assert_eq!(zeroed, dirty);

      for i in 0..104 {
        assert_eq!(*zeroed.as_ptr().add(i), 0);
      }
    }
  }

  #[test]
  fn zero_allocate_overflow_is_out_of_memory() {
    let allocator = allocator(4096);

    assert_eq!(allocator.zero_allocate(usize::MAX, 2), Err(Error::OutOfMemory));
    verify_heap_is_empty(&allocator);
  }

  #[test]
  fn resize_null_allocates() {
    let allocator = allocator(4096);

    unsafe {
      let address = allocator.resize(ptr::null_mut(), 20).unwrap();
      assert_eq!(allocator.usable_size(address.as_ptr()), Ok(24));
      allocator.release(address.as_ptr());
    }

    verify_heap_is_empty(&allocator);
  }

  #[test]
  fn resize_keeps_contents_when_moving() {
    let allocator = allocator(64 * 1024);

    unsafe {
      let address = allocator.allocate(64).unwrap();
      let busy = allocator.allocate(8).unwrap();

      for i in 0..64 {
        *address.as_ptr().add(i) = i as u8;
      }

      let moved = allocator.resize(address.as_ptr(), 4096).unwrap();
      assert_ne!(moved, address);

      for i in 0..64 {
        assert_eq!(*moved.as_ptr().add(i), i as u8);
      }

      // The old block went back to the heap.
      assert_eq!(allocator.usable_size(address.as_ptr()), Err(Error::InvalidPointer));

      let smaller = allocator.resize(moved.as_ptr(), 16).unwrap();
      assert_eq!(smaller, moved);

      allocator.release(smaller.as_ptr());
      allocator.release(busy.as_ptr());
    }

    verify_heap_is_empty(&allocator);
  }

  #[test]
  fn resize_invalid_pointer_has_no_effect() {
    let allocator = allocator(4096);

    unsafe {
      let address = allocator.allocate(32).unwrap();
      let inside = address.as_ptr().add(8);

      assert_eq!(allocator.resize(inside, 64), Err(Error::InvalidPointer));
      assert_eq!(allocator.usable_size(address.as_ptr()), Ok(32));

      allocator.release(address.as_ptr());
    }
  }

  #[test]
  fn release_ignores_garbage() {
    let allocator = allocator(4096);

    unsafe {
      let address = allocator.allocate(32).unwrap();

      allocator.release(ptr::null_mut());
      allocator.release(address.as_ptr().add(1));
      allocator.release(address.as_ptr());
      allocator.release(address.as_ptr());
    }

    verify_heap_is_empty(&allocator);
  }

  #[test]
  fn global_alloc_interface() {
    let allocator = allocator(64 * 1024);

    unsafe {
      let layout = Layout::array::<u32>(10).unwrap();
      let address = allocator.alloc(layout);
      assert!(!address.is_null());

      let zeroed = allocator.alloc_zeroed(layout);
      for i in 0..layout.size() {
        assert_eq!(*zeroed.add(i), 0);
      }

      let grown = allocator.realloc(address, layout, 400);
      assert!(!grown.is_null());

      let over_aligned = Layout::from_size_align(64, 64).unwrap();
      assert!(allocator.alloc(over_aligned).is_null());

      allocator.dealloc(zeroed, layout);
      allocator.dealloc(grown, Layout::array::<u8>(400).unwrap());
    }

    verify_heap_is_empty(&allocator);
  }

  #[test]
  fn top_follows_region() {
    let allocator = allocator(4096);
    let bottom = allocator.top();

    let address = allocator.allocate(40).unwrap();
    assert_eq!(allocator.top(), unsafe { bottom.add(HEADER_SIZE + 40) });

    unsafe { allocator.release(address.as_ptr()) };
    assert_eq!(allocator.top(), bottom);
  }

  /// All threads allocate at the same time, wait for each other and then
  /// release at the same time.
  #[test]
  fn multiple_threads_synchronized_allocs_and_releases() {
    let allocator = allocator(4 * 1024 * 1024);
    let num_threads = 8;
    let barrier = Barrier::new(num_threads);

    thread::scope(|scope| {
      for _ in 0..num_threads {
        scope.spawn(|| unsafe {
          let num_elements = 1024;
          let size = num_elements * std::mem::size_of::<ThreadId>();
          let address = allocator.allocate(size).unwrap().cast::<ThreadId>();
          let id = thread::current().id();

          for i in 0..num_elements {
            address.as_ptr().add(i).write(id);
          }

          barrier.wait();

          for i in 0..num_elements {
            assert_eq!(*address.as_ptr().add(i), id);
          }

          allocator.release(address.as_ptr().cast());
        });
      }
    });

    verify_heap_is_empty(&allocator);
  }

  /// Threads allocate, resize and release interchangeably.
  #[test]
  fn multiple_threads_unsynchronized_allocs_and_releases() {
    let allocator = allocator(16 * 1024 * 1024);
    let num_threads = 8;
    let barrier = Barrier::new(num_threads);

    thread::scope(|scope| {
      for t in 0..num_threads {
        let allocator = &allocator;
        let barrier = &barrier;

        scope.spawn(move || unsafe {
          let sizes = [16, 256, 1024, 2048, 4096, 8192];
          let value = t as u8;

          for size in sizes {
            barrier.wait();

            for _ in 0..200 {
              let address = allocator.allocate(size).unwrap();
              ptr::write_bytes(address.as_ptr(), value, size);

              let address = allocator.resize(address.as_ptr(), size * 2).unwrap();
              for i in 0..size {
                assert_eq!(*address.as_ptr().add(i), value);
              }

              allocator.release(address.as_ptr());
            }
          }
        });
      }
    });

    verify_heap_is_empty(&allocator);
  }
}
