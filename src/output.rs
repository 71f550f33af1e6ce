use std::cell::RefCell;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::warn;

use crate::config::SplitOptions;
use crate::encoder::{ContainerWriter, Encoder};
use crate::error::{Error, Result};
use crate::util::{self, shard_filename};

/// Creates the sink of each shard as the splitter rotates.
pub trait ShardOutput {
  type Writer: ContainerWriter;

  /// Opens a fresh, empty sink for shard `index` (1-based).
  fn create(&mut self, index: u32) -> Result<Self::Writer>;

  /// Human readable name of shard `index`, for logs.
  fn location(&self, index: u32) -> String;
}

/// Writes shards as `part<N>.rdb` files in a directory.
pub struct DirOutput {
  dir: PathBuf,
  options: SplitOptions,
}

impl DirOutput {
  /// Creates the output directory. An existing directory is reused.
  pub fn new(options: &SplitOptions) -> Result<Self> {
    let dir = options.output_dir.clone();
    if let Err(e) = fs::create_dir(&dir) {
      if e.kind() != io::ErrorKind::AlreadyExists {
        return Err(Error::Io(io::Error::new(
          e.kind(),
          format!("create dir {}: {}", dir.display(), e),
        )));
      }
    }
    Ok(Self {
      dir,
      options: options.clone(),
    })
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }
}

/// Warns about `part<N>.rdb` files in `dir` beyond `produced`, left over from
/// an earlier run. Returns their indexes.
pub fn warn_stale(dir: &Path, produced: u32) -> Result<Vec<u32>> {
  let stale: Vec<u32> = util::list_shards(dir)?
    .into_iter()
    .filter(|&index| index > produced)
    .collect();
  for &index in &stale {
    warn!(
      target: "rdbsplit",
      "{} is left over from a previous run and is not part of this split",
      dir.join(shard_filename(index)).display()
    );
  }
  Ok(stale)
}

impl ShardOutput for DirOutput {
  type Writer = Encoder<File>;

  fn create(&mut self, index: u32) -> Result<Self::Writer> {
    let path = self.dir.join(shard_filename(index));
    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(true)
      .open(&path)
      .map_err(|e| Error::Io(io::Error::new(e.kind(), format!("create {}: {}", path.display(), e))))?;
    Ok(Encoder::new(file, &self.options))
  }

  fn location(&self, index: u32) -> String {
    self.dir.join(shard_filename(index)).display().to_string()
  }
}

/// A growable in-memory sink whose bytes stay reachable after the encoder
/// that wrote them is gone.
#[derive(Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Cursor<Vec<u8>>>>);

impl SharedBuffer {
  pub fn bytes(&self) -> Vec<u8> {
    self.0.borrow().get_ref().clone()
  }
}

impl Read for SharedBuffer {
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    self.0.borrow_mut().read(buf)
  }
}

impl Write for SharedBuffer {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.0.borrow_mut().write(buf)
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}

impl Seek for SharedBuffer {
  fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
    self.0.borrow_mut().seek(pos)
  }
}

/// Keeps every shard in memory.
///
/// Clones share the same shards, so a clone kept aside can read back what a
/// splitter produced after the splitter is gone.
#[derive(Clone)]
pub struct MemoryOutput {
  options: SplitOptions,
  shards: Rc<RefCell<Vec<SharedBuffer>>>,
}

impl MemoryOutput {
  pub fn new(options: &SplitOptions) -> Self {
    Self {
      options: options.clone(),
      shards: Rc::new(RefCell::new(Vec::new())),
    }
  }

  /// Bytes of every shard created so far, in index order.
  pub fn shards(&self) -> Vec<Vec<u8>> {
    self.shards.borrow().iter().map(SharedBuffer::bytes).collect()
  }
}

impl ShardOutput for MemoryOutput {
  type Writer = Encoder<SharedBuffer>;

  fn create(&mut self, index: u32) -> Result<Self::Writer> {
    let mut shards = self.shards.borrow_mut();
    if index as usize != shards.len() + 1 {
      return Err(Error::Config(format!(
        "shard {} requested after {} shards",
        index,
        shards.len()
      )));
    }
    let buffer = SharedBuffer::default();
    shards.push(buffer.clone());
    Ok(Encoder::new(buffer, &self.options))
  }

  fn location(&self, index: u32) -> String {
    format!("memory:{}", shard_filename(index))
  }
}
