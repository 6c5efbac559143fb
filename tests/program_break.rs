//! Moves the real program break by hand, so the whole scenario is one test.

use brkalloc::{Error, RegionController, Sbrk};
use libc::{intptr_t, sbrk};

#[test]
fn sbrk_region_only_shrinks_its_own_break() {
  let mut region = Sbrk::new();

  unsafe {
    let start = sbrk(0) as usize;
    if start % 8 == 0 {
      sbrk(3);
    }
    let misaligned = sbrk(0) as usize;
    assert_ne!(misaligned % 8, 0);

    // Padding is rolled back when the growth itself fails.
    assert_eq!(region.grow(isize::MAX as usize), Err(Error::OutOfMemory));
    assert_eq!(sbrk(0) as usize, misaligned);

    let block = region.grow(64).unwrap();
    assert_eq!(block.as_ptr() as usize % 8, 0);
    assert!(block.as_ptr() as usize >= misaligned);
    assert_eq!(region.top(), block.as_ptr().add(64));

    sbrk(8);
    assert_eq!(region.shrink(block), Err(Error::ShrinkRefused));

    sbrk(-8 as intptr_t);
    assert_eq!(region.shrink(block), Ok(()));
    assert_eq!(region.top(), block.as_ptr());
  }
}
