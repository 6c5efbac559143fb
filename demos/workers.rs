//! Three waves of worker threads sharing the break heap: allocators grab a
//! small, a medium and a large block each; fillers stamp their thread number
//! into one triple; savers append a triple to `file_for_saving.txt` and free
//! it. Run `verify` afterwards to check the file.

use std::{
  fs::OpenOptions,
  io::Write,
  sync::{
    Mutex,
    atomic::{AtomicPtr, Ordering},
  },
  thread,
};

use anyhow::{Context, Result, bail};
use brkalloc::global::{self, Brk};

#[global_allocator]
static GLOBAL: Brk = Brk;

const THREADS: usize = 9;
const GROUP: usize = THREADS / 3;
const SIZES: [usize; 3] = [16, 1024, 1048576];
const OUTPUT: &str = "file_for_saving.txt";

/// One slot per block: `GROUP` triples.
struct Blocks([AtomicPtr<i32>; THREADS]);

impl Blocks {
  fn new() -> Self {
    Self(std::array::from_fn(|_| AtomicPtr::default()))
  }

  fn triple(
    &self,
    group: usize,
  ) -> [&AtomicPtr<i32>; 3] {
    [&self.0[group * 3], &self.0[group * 3 + 1], &self.0[group * 3 + 2]]
  }
}

fn allocate(
  blocks: &Blocks,
  group: usize,
) -> Result<()> {
  let mut addresses = [std::ptr::null_mut(); 3];

  for ((slot, size), address) in blocks.triple(group).into_iter().zip(SIZES).zip(&mut addresses) {
    *address = global::malloc(size).cast::<i32>();

    if address.is_null() {
      bail!("allocating {size} bytes failed");
    }

    slot.store(*address, Ordering::Release);
  }

  println!("{:p} {:p} {:p}", addresses[0], addresses[1], addresses[2]);

  Ok(())
}

fn fill(
  blocks: &Blocks,
  n: usize,
) {
  for slot in blocks.triple(n % GROUP) {
    unsafe { slot.load(Ordering::Acquire).write(n as i32) };
  }
}

fn save(
  blocks: &Blocks,
  n: usize,
  file: &Mutex<()>,
) -> Result<()> {
  let triple = blocks.triple(n % GROUP);
  let values = triple.map(|slot| unsafe { slot.load(Ordering::Acquire).read() });

  {
    let _guard = file.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let mut output = OpenOptions::new()
      .create(true)
      .append(true)
      .open(OUTPUT)
      .with_context(|| format!("opening {OUTPUT}"))?;

    writeln!(output, "{} {} {}\n", values[0], values[1], values[2])?;
  }

  for slot in triple {
    unsafe { global::free(slot.swap(std::ptr::null_mut(), Ordering::AcqRel).cast()) };
  }

  Ok(())
}

fn main() -> Result<()> {
  let blocks = Blocks::new();
  let file = Mutex::new(());

  let blocks = &blocks;
  let file = &file;

  thread::scope(|scope| -> Result<()> {
    let allocators: Vec<_> = (0..GROUP)
      .map(|group| scope.spawn(move || allocate(blocks, group)))
      .collect();
    for handle in allocators {
      handle.join().map_err(|_| anyhow::anyhow!("allocator panicked"))??;
    }

    let fillers: Vec<_> = (GROUP..2 * GROUP)
      .map(|n| scope.spawn(move || fill(blocks, n)))
      .collect();
    for handle in fillers {
      handle.join().map_err(|_| anyhow::anyhow!("filler panicked"))?;
    }

    let savers: Vec<_> = (2 * GROUP..THREADS)
      .map(|n| scope.spawn(move || save(blocks, n, file)))
      .collect();
    for handle in savers {
      handle.join().map_err(|_| anyhow::anyhow!("saver panicked"))??;
    }

    Ok(())
  })
}
