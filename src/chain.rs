use std::ptr::{self, NonNull};

use crate::block::{Block, BlockInfo, HEADER_SIZE, MIN_SPLIT_REMAINDER};

/// Address ordered list of every block in the region, free or not. Only the
/// chain itself edits links.
pub(crate) struct Chain {
  pub head: Option<NonNull<Block>>,
  pub tail: Option<NonNull<Block>>,
}

/// Result of a first-fit search.
pub(crate) struct Fit {
  /// First free block large enough for the request.
  pub block: Option<NonNull<Block>>,
  /// Last block visited. When nothing fits this is the tail, which is where
  /// the region has to be extended from.
  pub last: Option<NonNull<Block>>,
}

impl Chain {
  pub const fn new() -> Self {
    Self {
      head: None,
      tail: None,
    }
  }

  pub fn is_empty(&self) -> bool {
    self.head.is_none()
  }

  pub unsafe fn find_fit(
    &self,
    size: usize,
  ) -> Fit {
    unsafe {
      let mut last = None;
      let mut current = self.head;

      while let Some(block) = current {
        let header = block.as_ref();

        if header.is_free && header.size >= size {
          return Fit {
            block: Some(block),
            last,
          };
        }

        last = Some(block);
        current = header.next;
      }

      Fit { block: None, last }
    }
  }

  /// Links a freshly written block after its recorded `prev`, which must be
  /// the current tail.
  pub unsafe fn append(
    &mut self,
    block: NonNull<Block>,
  ) {
    unsafe {
      debug_assert_eq!((*block.as_ptr()).prev, self.tail);

      match self.tail {
        Some(tail) => (*tail.as_ptr()).next = Some(block),
        None => self.head = Some(block),
      }

      self.tail = Some(block);
    }
  }

  /// Carves `block` into a prefix of `size` bytes and a free sibling holding
  /// the rest, and returns the sibling. `block` keeps its free flag.
  ///
  /// # Safety
  ///
  /// `block.size - size` must be at least [`MIN_SPLIT_REMAINDER`] and `size`
  /// must be aligned.
  pub unsafe fn split(
    &mut self,
    block: NonNull<Block>,
    size: usize,
  ) -> NonNull<Block> {
    unsafe {
      let header = block.as_ptr();
      debug_assert!((*header).size - size >= MIN_SPLIT_REMAINDER);

      let address = NonNull::new_unchecked((*header).payload.add(size));
      let rest = (*header).size - size - HEADER_SIZE;
      let sibling = Block::write(address, rest, true, Some(block), (*header).next);

      match (*header).next {
        Some(next) => (*next.as_ptr()).prev = Some(sibling),
        None => self.tail = Some(sibling),
      }

      (*header).size = size;
      (*header).next = Some(sibling);

      sibling
    }
  }

  /// Like [`Chain::split`], but only when the leftover can hold a block.
  pub unsafe fn split_excess(
    &mut self,
    block: NonNull<Block>,
    size: usize,
  ) -> Option<NonNull<Block>> {
    unsafe {
      if (*block.as_ptr()).size - size >= MIN_SPLIT_REMAINDER {
        Some(self.split(block, size))
      } else {
        None
      }
    }
  }

  /// Folds the successor of `block` into it when that successor is free and
  /// starts right where `block` ends. Returns whether a merge happened.
  pub unsafe fn coalesce(
    &mut self,
    block: NonNull<Block>,
  ) -> bool {
    unsafe {
      let header = block.as_ptr();

      let Some(next) = (*header).next else {
        return false;
      };

      if !(*next.as_ptr()).is_free || !Block::is_adjacent(block, next) {
        return false;
      }

      (*header).size += HEADER_SIZE + (*next.as_ptr()).size;
      (*header).next = (*next.as_ptr()).next;

      match (*header).next {
        Some(after) => (*after.as_ptr()).prev = Some(block),
        None => self.tail = Some(block),
      }

      // The absorbed header stays behind as payload bytes; make sure it can
      // never pass the payload check again.
      (*next.as_ptr()).payload = ptr::null_mut();

      true
    }
  }

  /// Unlinks the tail. `prev` is the tail's predecessor, read before the
  /// memory holding the tail header was given back.
  pub unsafe fn pop_tail(
    &mut self,
    prev: Option<NonNull<Block>>,
  ) {
    unsafe {
      match prev {
        Some(prev) => (*prev.as_ptr()).next = None,
        None => self.head = None,
      }

      self.tail = prev;
    }
  }

  /// From the first header to the end of the last payload. `(0, 0)` when
  /// empty.
  pub unsafe fn bounds(&self) -> (usize, usize) {
    match (self.head, self.tail) {
      (Some(head), Some(tail)) => {
        (Block::address_of(head), unsafe { Block::end_address(tail) })
      }
      _ => (0, 0),
    }
  }

  pub fn iter(&self) -> Blocks {
    Blocks { current: self.head }
  }
}

/// Iterator over the headers of a [`Chain`], in address order.
pub(crate) struct Blocks {
  current: Option<NonNull<Block>>,
}

impl Iterator for Blocks {
  type Item = NonNull<Block>;

  fn next(&mut self) -> Option<Self::Item> {
    let block = self.current?;
    self.current = unsafe { (*block.as_ptr()).next };
    Some(block)
  }
}

impl Blocks {
  pub fn infos(self) -> impl Iterator<Item = BlockInfo> {
    self.map(|block| unsafe { Block::info(block) })
  }
}
