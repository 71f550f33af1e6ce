use std::path::PathBuf;

use crate::error::{Error, Result};

/// Bytes in one gigabyte, as the command line counts them.
pub const GIB: u64 = 1024 * 1024 * 1024;

/// Defines the strategy used for reading the source snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStrategy {
  /// Uses a `BufReader` over the file.
  /// Safe, reliable, and respectful of memory limits.
  StandardIo,

  /// Memory-maps the source file.
  /// Fastest for large local snapshots.
  /// WARNING: carries SIGBUS risks if the file is truncated while mapped.
  Mmap,
}

/// Defines what a shard's database section header declares as its
/// key count and TTL count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionCounts {
  /// Headers are written with zero counts in fixed-width form, and the true
  /// counts are patched in when the shard is closed. The shard checksum is
  /// recomputed afterwards.
  Patch,

  /// Headers carry zero counts that are never corrected.
  /// Compact, and matches shards written by tools that never fix up counts.
  Placeholder,
}

#[derive(Debug, Clone)]
pub struct SplitOptions {
  /// Directory that receives `part1.rdb`, `part2.rdb`, ...
  pub output_dir: PathBuf,

  // --- Shard Rotation ---
  /// Soft limit for the accumulated record size of one shard, in bytes.
  /// A new shard is opened once the next record would push the active shard
  /// past this size. A shard always receives at least one record.
  /// Default: 4 GB.
  pub target_size: u64,

  // --- Resources ---
  /// Size of the in-memory write buffer of each shard.
  /// Default: 64 KB.
  pub write_buffer_size: usize,

  /// Size of the buffer used for reading the source with `StandardIo`.
  /// Default: 128 KB.
  pub read_buffer_size: usize,

  // --- Behavior ---
  pub read_strategy: ReadStrategy,
  pub section_counts: SectionCounts,

  /// Verify the CRC64 trailer of the source snapshot.
  /// Default: true.
  pub verify_checksum: bool,

  /// LZF-compress string values written to shards.
  /// Default: false.
  pub compression: bool,

  /// Strings shorter than this (in bytes) are written uncompressed even if
  /// `compression` is enabled.
  /// Default: 21 bytes.
  pub min_compression_size: usize,
}

impl Default for SplitOptions {
  fn default() -> Self {
    Self {
      output_dir: PathBuf::from("./rdb_dir"),
      target_size: 4 * GIB,
      write_buffer_size: 64 * 1024, // 64 KB
      read_buffer_size: 128 * 1024, // 128 KB
      read_strategy: ReadStrategy::StandardIo,
      section_counts: SectionCounts::Patch,
      verify_checksum: true,
      compression: false,
      min_compression_size: 21,
    }
  }
}

impl SplitOptions {
  pub fn new(output_dir: impl Into<PathBuf>) -> Self {
    Self {
      output_dir: output_dir.into(),
      ..Default::default()
    }
  }

  /// Sets the target shard size from a whole number of gigabytes.
  pub fn with_target_size_gb(mut self, gb: u64) -> Self {
    self.target_size = gb.saturating_mul(GIB);
    self
  }

  /// Checks the rotation threshold against the size of the source snapshot.
  /// Must pass before any shard is created.
  pub fn validate(&self, source_size: u64) -> Result<()> {
    if self.target_size == 0 {
      return Err(Error::Config("target size must be > 0".into()));
    }
    let half = source_size / 2;
    if self.target_size >= half {
      return Err(Error::Config(format!(
        "target size {} bytes must be below half of the source size ({} bytes, {} GB)",
        self.target_size,
        half,
        half / GIB
      )));
    }
    if self.write_buffer_size == 0 || self.read_buffer_size == 0 {
      return Err(Error::Config("buffer sizes must be > 0".into()));
    }
    Ok(())
  }
}
