use std::{cmp, ptr::NonNull};

use crate::{
  align::{self, ALIGNMENT},
  block::{Block, BlockInfo, HEADER_SIZE},
  chain::Chain,
  config::Config,
  error::{Error, InvariantViolation, Result},
  region::RegionController,
};

/// Outcome of [`Heap::resize`].
pub(crate) enum Resized {
  /// The block was shrunk or grown where it stands.
  InPlace(NonNull<u8>),
  /// A new block was allocated. The caller still has to copy `count` bytes
  /// from `from` to `to` and then release `from`.
  Moved {
    from: NonNull<u8>,
    to: NonNull<u8>,
    count: usize,
  },
}

/// The whole allocator state: the block chain and the region it lives in.
/// Not synchronized, see [`crate::HeapAllocator`] for the locked wrapper.
pub(crate) struct Heap<R> {
  region: R,
  chain: Chain,
  config: Config,
}

unsafe impl<R: Send> Send for Heap<R> {}

impl<R: RegionController> Heap<R> {
  pub const fn new(
    region: R,
    config: Config,
  ) -> Self {
    Self {
      region,
      chain: Chain::new(),
      config,
    }
  }

  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Result<NonNull<u8>> {
    let size = align::checked_align(size).ok_or(Error::OutOfMemory)?;

    let block = if self.chain.is_empty() {
      self.extend(None, size)?
    } else {
      let fit = unsafe { self.chain.find_fit(size) };

      match fit.block {
        Some(block) => unsafe {
          if let Some(rest) = self.chain.split_excess(block, size) {
            heap_event!(self.config, trace, "split {:p} at {}, rest {:p}", block, size, rest);
          }
          (*block.as_ptr()).is_free = false;
          block
        },
        None => self.extend(fit.last, size)?,
      }
    };

    let address = unsafe { Block::payload_of(block) };
    heap_event!(self.config, trace, "allocate({}) -> {:p}", size, address);

    Ok(address)
  }

  /// Grows the region by one block of `size` bytes and links it after
  /// `last`, the current tail.
  fn extend(
    &mut self,
    last: Option<NonNull<Block>>,
    size: usize,
  ) -> Result<NonNull<Block>> {
    let total = size.checked_add(HEADER_SIZE).ok_or(Error::OutOfMemory)?;

    let address = match self.region.grow(total) {
      Ok(address) => address,
      Err(err) => {
        heap_event!(self.config, warn, "grow({}) failed: {}", total, err);
        return Err(err);
      }
    };

    let block = unsafe {
      let block = Block::write(address, size, false, last, None);
      self.chain.append(block);
      block
    };

    heap_event!(self.config, trace, "grew region by {} bytes at {:p}", total, address);

    Ok(block)
  }

  /// Header of a live block, derived from its payload pointer.
  fn find_block(
    &self,
    address: *const u8,
  ) -> Result<NonNull<Block>> {
    if self.chain.is_empty() {
      return Err(Error::InvalidPointer);
    }

    unsafe {
      let (lower, upper) = self.chain.bounds();
      let block = Block::from_payload(address, lower, upper).ok_or(Error::InvalidPointer)?;

      if (*block.as_ptr()).is_free {
        return Err(Error::InvalidPointer);
      }

      Ok(block)
    }
  }

  pub fn release(
    &mut self,
    address: *mut u8,
  ) -> Result<()> {
    let mut block = self.find_block(address)?;

    unsafe {
      (*block.as_ptr()).is_free = true;

      if let Some(prev) = (*block.as_ptr()).prev {
        if (*prev.as_ptr()).is_free && self.chain.coalesce(prev) {
          heap_event!(self.config, trace, "coalesced {:p} into {:p}", block, prev);
          block = prev;
        }
      }

      self.settle(block);
    }

    heap_event!(self.config, trace, "release({:p})", address);

    Ok(())
  }

  /// Merges the free `block` with a free right neighbour, then gives it back
  /// to the region if it is the tail.
  unsafe fn settle(
    &mut self,
    block: NonNull<Block>,
  ) {
    unsafe {
      if self.chain.coalesce(block) {
        heap_event!(self.config, trace, "coalesced successor into {:p}", block);
      }

      if (*block.as_ptr()).next.is_none() {
        self.trim(block);
      }
    }
  }

  unsafe fn trim(
    &mut self,
    block: NonNull<Block>,
  ) {
    if !self.config.trim {
      return;
    }

    let prev = unsafe { (*block.as_ptr()).prev };

    match self.region.shrink(block.cast()) {
      Ok(()) => {
        unsafe { self.chain.pop_tail(prev) };
        heap_event!(self.config, trace, "shrunk region to {:p}", block);
      }
      Err(err) => {
        heap_event!(self.config, warn, "keeping free tail {:p}: {}", block, err);
      }
    }
  }

  /// Tries to resize the block of `address` in place: first by shrinking,
  /// then by absorbing a free right neighbour. Otherwise allocates a new
  /// block and leaves the copy and the release of the old one to the caller.
  pub fn resize(
    &mut self,
    address: NonNull<u8>,
    new_size: usize,
  ) -> Result<Resized> {
    let block = self.find_block(address.as_ptr())?;
    let size = align::checked_align(new_size).ok_or(Error::OutOfMemory)?;

    let old_size = unsafe {
      let header = block.as_ptr();
      let old_size = (*header).size;

      if old_size >= size {
        if let Some(rest) = self.chain.split_excess(block, size) {
          self.settle(rest);
        }
        heap_event!(
          self.config,
          debug,
          "resize({:p}) {} -> {} shrunk in place",
          address,
          old_size,
          size
        );
        return Ok(Resized::InPlace(address));
      }

      if let Some(next) = (*header).next {
        let next_size = (*next.as_ptr()).size;

        if (*next.as_ptr()).is_free
          && Block::is_adjacent(block, next)
          && old_size + HEADER_SIZE + next_size >= size
        {
          self.chain.coalesce(block);
          if let Some(rest) = self.chain.split_excess(block, size) {
            self.settle(rest);
          }
          heap_event!(
            self.config,
            debug,
            "resize({:p}) {} -> {} grew in place",
            address,
            old_size,
            size
          );
          return Ok(Resized::InPlace(address));
        }
      }

      old_size
    };

    let to = self.allocate(size)?;
    heap_event!(
      self.config,
      debug,
      "resize({:p}) {} -> {} moving to {:p}",
      address,
      old_size,
      size,
      to
    );

    Ok(Resized::Moved {
      from: address,
      to,
      count: cmp::min(old_size, size),
    })
  }

  /// Capacity of the live block behind `address`.
  pub fn usable_size(
    &self,
    address: *const u8,
  ) -> Result<usize> {
    let block = self.find_block(address)?;
    Ok(unsafe { (*block.as_ptr()).size })
  }

  pub fn blocks(&self) -> impl Iterator<Item = BlockInfo> + '_ {
    self.chain.iter().infos()
  }

  pub fn top(&self) -> *mut u8 {
    self.region.top()
  }

  pub fn config(&self) -> Config {
    self.config
  }

  /// Verifies the structural invariants of the chain, stopping at the first
  /// violation.
  pub fn check(&self) -> std::result::Result<(), InvariantViolation> {
    let mut prev: Option<NonNull<Block>> = None;

    for block in self.chain.iter() {
      let address = Block::address_of(block);

      unsafe {
        let header = block.as_ref();

        if header.payload as usize != address + HEADER_SIZE {
          return Err(InvariantViolation::PayloadMismatch { block: address });
        }

        if address % ALIGNMENT != 0 || header.size % ALIGNMENT != 0 {
          return Err(InvariantViolation::Misaligned { block: address });
        }

        if header.prev != prev {
          return Err(InvariantViolation::BrokenLink { block: address });
        }

        if let Some(prev) = prev {
          if Block::end_address(prev) > address {
            return Err(InvariantViolation::Overlap { block: address });
          }

          if prev.as_ref().is_free && header.is_free && Block::is_adjacent(prev, block) {
            return Err(InvariantViolation::AdjacentFree { block: address });
          }
        }
      }

      prev = Some(block);
    }

    if prev != self.chain.tail {
      return Err(InvariantViolation::BrokenLink {
        block: self.chain.tail.map_or(0, Block::address_of),
      });
    }

    if let Some(tail) = prev {
      let end = unsafe { Block::end_address(tail) };
      let top = self.region.top() as usize;

      if end != top {
        return Err(InvariantViolation::DetachedTop { end, top });
      }
    }

    Ok(())
  }
}
