use std::{io::Read, ptr};

use brkalloc::{HEADER_SIZE, global};
use libc::sbrk;

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap` or
/// `gdb`, or just visually track how allocations move the program break.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    unsafe { sbrk(0) },
  );
}

fn print_alloc(
  size: usize,
  address: *mut u8,
) {
  println!(
    "Allocated {} bytes (capacity {:?}), address = {:?}, program break = {:?}",
    size,
    global::HEAP.usable_size(address),
    address,
    unsafe { sbrk(0) }
  );
}

fn main() {
  println!("Every block carries a {HEADER_SIZE} byte header.");
  print_program_break("start");
  block_until_enter_pressed();

  // 1) A u32 is rounded up to an 8 byte block.
  let first = global::malloc(4);
  println!("\n[1] Allocate u32");
  print_alloc(4, first);
  unsafe { first.cast::<u32>().write(0xDEADBEEF) };
  block_until_enter_pressed();

  // 2) A large block right after it.
  let second = global::malloc(64 * 1024);
  println!("\n[2] Allocate 64 KiB");
  print_alloc(64 * 1024, second);
  unsafe { ptr::write_bytes(second, 0xAB, 64 * 1024) };
  block_until_enter_pressed();

  // 3) A guard block keeps the freed 64 KiB away from the end of the heap.
  let guard = global::malloc(16);
  println!("\n[3] Allocate guard block");
  print_alloc(16, guard);

  unsafe { global::free(second) };
  println!("[3] Freed the 64 KiB block, the break does not move");
  print_program_break("after free");
  block_until_enter_pressed();

  // 4) A small request is carved out of the freed block.
  let reused = global::malloc(128);
  println!("\n[4] Allocate 128 bytes (check reuse of freed block)");
  print_alloc(128, reused);
  println!(
    "[4] reused == second? {}",
    if reused == second {
      "Yes, it was split out of the freed block"
    } else {
      "No, it was allocated somewhere else"
    }
  );
  block_until_enter_pressed();

  // 5) Freeing everything merges the blocks and moves the break back down.
  unsafe {
    global::free(reused);
    global::free(guard);
    global::free(first);
  }
  println!("\n[5] Freed everything");
  print_program_break("end");
}
