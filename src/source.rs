use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use memmap2::Mmap;

use crate::config::{ReadStrategy, SplitOptions};
use crate::error::Result;

/// The source snapshot opened for READING.
pub enum SourceReader {
  Io(BufReader<File>),
  Mmap(Mmap, usize), // usize tracks the cursor position
}

impl SourceReader {
  pub fn open(path: &Path, options: &SplitOptions) -> Result<Self> {
    let file = File::open(path)?;

    if options.read_strategy == ReadStrategy::Mmap {
      // Safety: the source must not be modified while it is being split.
      let mmap = unsafe { Mmap::map(&file)? };
      return Ok(SourceReader::Mmap(mmap, 0));
    }

    let reader = BufReader::with_capacity(options.read_buffer_size, file);
    Ok(SourceReader::Io(reader))
  }
}

impl Read for SourceReader {
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    match self {
      Self::Io(reader) => reader.read(buf),
      Self::Mmap(mmap, cursor) => {
        let remaining = &mmap[*cursor..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        *cursor += n;
        Ok(n)
      }
    }
  }
}
