/// Runtime knobs of a [`crate::HeapAllocator`].
///
/// ```rust
/// use brkalloc::{ArenaRegion, Config, HeapAllocator};
///
/// let region = ArenaRegion::with_capacity(4096).unwrap();
/// let heap = HeapAllocator::with_config(region, Config::quiet().with_trim(false));
///
/// let address = heap.allocate(64).unwrap();
/// unsafe { heap.release(address.as_ptr()) };
///
/// // Without trimming the freed tail stays in the heap for reuse.
/// let mut free_blocks = 0;
/// heap.walk(|block| free_blocks += block.is_free as usize);
/// assert_eq!(free_blocks, 1);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
  /// Emit `log` records for every structural change. Must stay off for a
  /// heap that serves the global allocator, since a logger that allocates
  /// would call back into it.
  pub logging: bool,
  /// Give a free trailing block back to the region.
  pub trim: bool,
}

impl Config {
  pub const DEFAULT: Config = Config {
    logging: true,
    trim: true,
  };

  /// Default configuration with logging disabled.
  pub const fn quiet() -> Self {
    Self {
      logging: false,
      ..Self::DEFAULT
    }
  }

  pub const fn with_logging(
    self,
    logging: bool,
  ) -> Self {
    Self { logging, ..self }
  }

  pub const fn with_trim(
    self,
    trim: bool,
  ) -> Self {
    Self { trim, ..self }
  }
}

impl Default for Config {
  fn default() -> Self {
    Self::DEFAULT
  }
}
