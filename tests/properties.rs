use brkalloc::{ArenaRegion, Config, HeapAllocator};
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Op {
  Allocate(usize),
  Release(usize),
  Resize(usize, usize),
}

fn op() -> impl Strategy<Value = Op> {
  prop_oneof![
    (0usize..4096).prop_map(Op::Allocate),
    any::<usize>().prop_map(Op::Release),
    (any::<usize>(), 0usize..8192).prop_map(|(index, size)| Op::Resize(index, size)),
  ]
}

proptest! {
  #[test]
  fn capacity_is_smallest_multiple_of_eight(size in 0usize..1_000_000) {
    let heap = HeapAllocator::with_config(
      ArenaRegion::with_capacity(2 * 1024 * 1024).unwrap(),
      Config::quiet(),
    );

    let address = heap.allocate(size).unwrap();
    let capacity = heap.usable_size(address.as_ptr()).unwrap();

    prop_assert_eq!(capacity % 8, 0);
    prop_assert!(capacity >= size);
    prop_assert!(capacity < size + 8);
  }

  #[test]
  fn random_workloads_keep_invariants(ops in prop::collection::vec(op(), 1..200)) {
    let heap = HeapAllocator::with_config(
      ArenaRegion::with_capacity(4 * 1024 * 1024).unwrap(),
      Config::quiet(),
    );
    let bottom = heap.top();
    let mut live: Vec<(*mut u8, usize, u8)> = Vec::new();

    for (step, op) in ops.into_iter().enumerate() {
      let stamp = step as u8;

      match op {
        Op::Allocate(size) => {
          let address = heap.allocate(size).unwrap().as_ptr();
          unsafe { address.write_bytes(stamp, size) };
          live.push((address, size, stamp));
        }
        Op::Release(index) if !live.is_empty() => {
          let (address, _, _) = live.swap_remove(index % live.len());
          unsafe { heap.release(address) };
        }
        Op::Resize(index, new_size) if !live.is_empty() => {
          let index = index % live.len();
          let (address, size, value) = live[index];
          let resized = unsafe { heap.resize(address, new_size) }.unwrap().as_ptr();

          let kept = size.min(new_size);
          for offset in 0..kept {
            prop_assert_eq!(unsafe { *resized.add(offset) }, value);
          }

          live[index] = (resized, kept, value);
        }
        _ => {}
      }

      prop_assert_eq!(heap.check(), Ok(()));
    }

    for (address, size, value) in &live {
      for offset in 0..*size {
        prop_assert_eq!(unsafe { *address.add(offset) }, *value);
      }
    }

    for (address, _, _) in live {
      unsafe { heap.release(address) };
    }

    prop_assert_eq!(heap.top(), bottom);
  }
}
