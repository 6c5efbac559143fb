/// Every block size and every payload address is a multiple of this value.
pub const ALIGNMENT: usize = 8;

/// Rounds the given size up to the next multiple of [`ALIGNMENT`].
///
/// Sizes whose low three bits are already zero are returned unchanged.
///
/// # Examples
///
/// ```rust
/// use brkalloc::align;
///
/// assert_eq!(align!(13), 16);
/// assert_eq!(align!(16), 16);
/// assert_eq!(align!(0), 0);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    ($value + $crate::align::ALIGNMENT - 1) & !($crate::align::ALIGNMENT - 1)
  };
}

/// Same as [`align!`] but returns `None` instead of wrapping when the
/// rounded size does not fit in a `usize`.
#[inline]
pub fn checked_align(size: usize) -> Option<usize> {
  if size & (ALIGNMENT - 1) == 0 {
    return Some(size);
  }

  size
    .checked_add(ALIGNMENT - 1)
    .map(|size| size & !(ALIGNMENT - 1))
}
