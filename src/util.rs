use crate::error::Result;
use std::fs;
use std::path::Path;

pub const SHARD_EXTENSION: &str = "rdb";

/// Generates a shard filename from its 1-based index.
/// Format: part7.rdb
pub fn shard_filename(index: u32) -> String {
  format!("part{}.{}", index, SHARD_EXTENSION)
}

/// Parses a shard index from a shard filename.
pub fn parse_shard_index(filename: &str) -> Option<u32> {
  let index = filename
    .strip_prefix("part")?
    .strip_suffix(SHARD_EXTENSION)?
    .strip_suffix('.')?
    .parse::<u32>()
    .ok()?;
  if index == 0 { None } else { Some(index) }
}

/// Lists the shard indexes present in `dir`, sorted ascending.
pub fn list_shards(dir: &Path) -> Result<Vec<u32>> {
  let mut indexes = Vec::new();
  if !dir.exists() {
    return Ok(indexes);
  }
  for entry in fs::read_dir(dir)? {
    let entry = entry?;
    let filename = entry.file_name().to_string_lossy().to_string();
    if let Some(index) = parse_shard_index(&filename) {
      indexes.push(index);
    }
  }
  indexes.sort_unstable();
  Ok(indexes)
}
