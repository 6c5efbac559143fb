//! Checks the first record written by the `workers` demo: its first value
//! must be the number of one of the filler threads.

use std::{
  fs::File,
  io::{BufRead, BufReader},
};

use anyhow::{Context, Result};

const INPUT: &str = "file_for_saving.txt";
const FILLERS: [&str; 3] = ["3", "4", "5"];

fn main() -> Result<()> {
  let file = File::open(INPUT).with_context(|| format!("opening {INPUT}"))?;

  let mut line = String::new();
  let read = BufReader::new(file)
    .read_line(&mut line)
    .with_context(|| format!("reading {INPUT}"))?;

  if read == 0 {
    println!("reading the file is finished");
    std::process::exit(1);
  }

  match line.split_whitespace().next() {
    Some(first) if FILLERS.contains(&first) => println!("test passed!"),
    _ => println!("test failed!"),
  }

  Ok(())
}
