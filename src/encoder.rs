use std::io::{BufWriter, Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, WriteBytesExt};
use crc::Digest;

use crate::config::{SectionCounts, SplitOptions};
use crate::error::{Error, Result};
use crate::format::{self, ObjectType, opcode, string_enc};
use crate::lzf;
use crate::record::ZSetEntry;

/// Writes one output container.
///
/// Every method fails synchronously with the underlying I/O error. Records
/// carry an optional absolute expiration in unix milliseconds.
pub trait ContainerWriter {
  fn write_header(&mut self) -> Result<()>;

  fn write_aux(&mut self, key: &str, value: &str) -> Result<()>;

  /// Starts a database section. Returns the byte offset of the section header.
  fn write_db_header(&mut self, db: u32, key_count: u64, ttl_count: u64) -> Result<u64>;

  /// Replaces the counts of the section header written at `offset`.
  fn patch_db_header(&mut self, offset: u64, key_count: u64, ttl_count: u64) -> Result<()>;

  fn write_string(&mut self, key: &[u8], value: &[u8], expire_ms: Option<u64>) -> Result<()>;

  fn write_list(&mut self, key: &[u8], values: &[Vec<u8>], expire_ms: Option<u64>) -> Result<()>;

  fn write_hash(&mut self, key: &[u8], fields: &[(Vec<u8>, Vec<u8>)], expire_ms: Option<u64>) -> Result<()>;

  fn write_set(&mut self, key: &[u8], members: &[Vec<u8>], expire_ms: Option<u64>) -> Result<()>;

  fn write_zset(&mut self, key: &[u8], entries: &[ZSetEntry], expire_ms: Option<u64>) -> Result<()>;

  /// Whether section header counts are patched at close or left as written.
  fn section_counts(&self) -> SectionCounts;

  /// Bytes emitted so far.
  fn bytes_written(&self) -> u64;

  /// Writes the trailer and releases the sink. Returns the container size.
  fn close(self) -> Result<u64>
  where
    Self: Sized;
}

#[derive(Debug, Clone, Copy)]
struct Patch {
  counts_offset: u64,
  key_count: u64,
  ttl_count: u64,
}

/// RDB encoder over a seekable sink.
///
/// Reads are only needed when section counts are patched: the checksum is
/// then recomputed from the finished bytes.
pub struct Encoder<W: Read + Write + Seek> {
  out: BufWriter<W>,
  digest: Digest<'static, u64>,
  written: u64,
  scratch: Vec<u8>,
  section_counts: SectionCounts,
  compression: bool,
  min_compression_size: usize,
  /// (header offset, counts offset) of every section header written.
  sections: Vec<(u64, u64)>,
  patches: Vec<Patch>,
}

impl<W: Read + Write + Seek> Encoder<W> {
  pub fn new(inner: W, options: &SplitOptions) -> Self {
    Self {
      out: BufWriter::with_capacity(options.write_buffer_size, inner),
      digest: format::checksum_digest(),
      written: 0,
      scratch: Vec::new(),
      section_counts: options.section_counts,
      compression: options.compression,
      min_compression_size: options.min_compression_size,
      sections: Vec::new(),
      patches: Vec::new(),
    }
  }

  /// Flushes the staged bytes into the sink and the running checksum.
  fn commit(&mut self) -> Result<()> {
    self.out.write_all(&self.scratch)?;
    self.digest.update(&self.scratch);
    self.written += self.scratch.len() as u64;
    self.scratch.clear();
    Ok(())
  }

  fn begin(&mut self, kind: ObjectType, key: &[u8], expire_ms: Option<u64>) -> Result<()> {
    self.scratch.clear();
    if let Some(ms) = expire_ms {
      self.scratch.push(opcode::EXPIRETIME_MS);
      self.scratch.write_u64::<LittleEndian>(ms)?;
    }
    self.scratch.push(kind as u8);
    self.stage_string(key)
  }

  /// Stages a string using the most compact encoding that applies.
  fn stage_string(&mut self, s: &[u8]) -> Result<()> {
    if let Some(v) = integer_encodable(s) {
      if let Ok(b) = i8::try_from(v) {
        self.scratch.push(0xC0 | string_enc::INT8);
        self.scratch.write_i8(b)?;
      } else if let Ok(h) = i16::try_from(v) {
        self.scratch.push(0xC0 | string_enc::INT16);
        self.scratch.write_i16::<LittleEndian>(h)?;
      } else {
        self.scratch.push(0xC0 | string_enc::INT32);
        self.scratch.write_i32::<LittleEndian>(v)?;
      }
      return Ok(());
    }

    if self.compression && s.len() >= self.min_compression_size {
      if let Some(compressed) = lzf::compress(s) {
        self.scratch.push(0xC0 | string_enc::LZF);
        format::write_length(&mut self.scratch, compressed.len() as u64)?;
        format::write_length(&mut self.scratch, s.len() as u64)?;
        self.scratch.extend_from_slice(&compressed);
        return Ok(());
      }
    }

    format::write_length(&mut self.scratch, s.len() as u64)?;
    self.scratch.extend_from_slice(s);
    Ok(())
  }

  fn stage_length(&mut self, len: usize) -> Result<()> {
    format::write_length(&mut self.scratch, len as u64)?;
    Ok(())
  }

  /// Writes the trailer, applies pending section patches and returns the sink.
  pub fn finish(mut self) -> Result<W> {
    self.scratch.clear();
    self.scratch.push(opcode::EOF);
    self.commit()?;

    if self.patches.is_empty() {
      let crc = self.digest.finalize();
      self.out.write_u64::<LittleEndian>(crc)?;
      self.out.flush()?;
      return self.out.into_inner().map_err(|e| Error::Io(e.into_error()));
    }

    let mut inner = self.out.into_inner().map_err(|e| Error::Io(e.into_error()))?;
    for patch in &self.patches {
      inner.seek(SeekFrom::Start(patch.counts_offset))?;
      format::write_fixed_length(&mut inner, patch.key_count)?;
      format::write_fixed_length(&mut inner, patch.ttl_count)?;
    }

    // The patched bytes invalidate the running checksum.
    inner.seek(SeekFrom::Start(0))?;
    let mut digest = format::checksum_digest();
    let mut buf = vec![0u8; 64 * 1024];
    let mut hashed = 0u64;
    {
      let mut body = (&mut inner).take(self.written);
      loop {
        let n = body.read(&mut buf)?;
        if n == 0 {
          break;
        }
        digest.update(&buf[..n]);
        hashed += n as u64;
      }
    }
    if hashed != self.written {
      return Err(Error::Corruption(format!(
        "Shard shrank while patching: wrote {} bytes, read back {}",
        self.written, hashed
      )));
    }

    inner.seek(SeekFrom::Start(self.written))?;
    inner.write_u64::<LittleEndian>(digest.finalize())?;
    inner.flush()?;
    Ok(inner)
  }
}

impl<W: Read + Write + Seek> ContainerWriter for Encoder<W> {
  fn write_header(&mut self) -> Result<()> {
    self.scratch.clear();
    self.scratch.extend_from_slice(format::MAGIC);
    self.scratch.extend_from_slice(format!("{:04}", format::WRITE_VERSION).as_bytes());
    self.commit()
  }

  fn write_aux(&mut self, key: &str, value: &str) -> Result<()> {
    self.scratch.clear();
    self.scratch.push(opcode::AUX);
    self.stage_string(key.as_bytes())?;
    self.stage_string(value.as_bytes())?;
    self.commit()
  }

  fn write_db_header(&mut self, db: u32, key_count: u64, ttl_count: u64) -> Result<u64> {
    let offset = self.written;
    self.scratch.clear();
    self.scratch.push(opcode::SELECTDB);
    format::write_length(&mut self.scratch, db as u64)?;
    self.scratch.push(opcode::RESIZEDB);
    self.sections.push((offset, offset + self.scratch.len() as u64));
    match self.section_counts {
      SectionCounts::Patch => {
        format::write_fixed_length(&mut self.scratch, key_count)?;
        format::write_fixed_length(&mut self.scratch, ttl_count)?;
      }
      SectionCounts::Placeholder => {
        format::write_length(&mut self.scratch, key_count)?;
        format::write_length(&mut self.scratch, ttl_count)?;
      }
    }
    self.commit()?;
    Ok(offset)
  }

  fn patch_db_header(&mut self, offset: u64, key_count: u64, ttl_count: u64) -> Result<()> {
    if self.section_counts != SectionCounts::Patch {
      return Err(Error::Config("section counts can only be patched in Patch mode".into()));
    }
    let counts_offset = self
      .sections
      .iter()
      .rev()
      .find(|(header, _)| *header == offset)
      .map(|(_, counts)| *counts)
      .ok_or_else(|| Error::Corruption(format!("No section header at offset {}", offset)))?;
    self.patches.push(Patch {
      counts_offset,
      key_count,
      ttl_count,
    });
    Ok(())
  }

  fn write_string(&mut self, key: &[u8], value: &[u8], expire_ms: Option<u64>) -> Result<()> {
    self.begin(ObjectType::String, key, expire_ms)?;
    self.stage_string(value)?;
    self.commit()
  }

  fn write_list(&mut self, key: &[u8], values: &[Vec<u8>], expire_ms: Option<u64>) -> Result<()> {
    self.begin(ObjectType::List, key, expire_ms)?;
    self.stage_length(values.len())?;
    for v in values {
      self.stage_string(v)?;
    }
    self.commit()
  }

  fn write_hash(&mut self, key: &[u8], fields: &[(Vec<u8>, Vec<u8>)], expire_ms: Option<u64>) -> Result<()> {
    self.begin(ObjectType::Hash, key, expire_ms)?;
    self.stage_length(fields.len())?;
    for (field, value) in fields {
      self.stage_string(field)?;
      self.stage_string(value)?;
    }
    self.commit()
  }

  fn write_set(&mut self, key: &[u8], members: &[Vec<u8>], expire_ms: Option<u64>) -> Result<()> {
    self.begin(ObjectType::Set, key, expire_ms)?;
    self.stage_length(members.len())?;
    for m in members {
      self.stage_string(m)?;
    }
    self.commit()
  }

  fn write_zset(&mut self, key: &[u8], entries: &[ZSetEntry], expire_ms: Option<u64>) -> Result<()> {
    self.begin(ObjectType::ZSet2, key, expire_ms)?;
    self.stage_length(entries.len())?;
    for entry in entries {
      self.stage_string(&entry.member)?;
      self.scratch.write_f64::<LittleEndian>(entry.score)?;
    }
    self.commit()
  }

  fn section_counts(&self) -> SectionCounts {
    self.section_counts
  }

  fn bytes_written(&self) -> u64 {
    self.written
  }

  fn close(self) -> Result<u64> {
    // EOF opcode + checksum
    let size = self.written + 1 + 8;
    self.finish()?;
    Ok(size)
  }
}

/// Returns the value when `s` is the canonical decimal form of a 32-bit integer.
fn integer_encodable(s: &[u8]) -> Option<i32> {
  if s.is_empty() || s.len() > 11 {
    return None;
  }
  let text = std::str::from_utf8(s).ok()?;
  let v: i32 = text.parse().ok()?;
  if v.to_string().as_bytes() == s { Some(v) } else { None }
}
