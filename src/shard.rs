use tracing::{debug, warn};

use crate::config::SectionCounts;
use crate::encoder::ContainerWriter;
use crate::error::Result;
use crate::record::{Payload, Record};

/// Informational aux fields every shard carries after its header.
pub const AUX_FIELDS: [(&str, &str); 3] = [("redis-ver", "6.2.6"), ("redis-bits", "64"), ("aof-preamble", "0")];

/// What one finalized shard holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardSummary {
  pub index: u32,
  /// Records written.
  pub records: u64,
  /// Unsupported records routed here and dropped.
  pub skipped: u64,
  /// Database section headers written.
  pub sections: u64,
  /// Sum of the source sizes of every record routed here.
  pub accumulated_size: u64,
  /// Size of the finished container.
  pub bytes_written: u64,
}

/// The shard currently receiving records.
pub struct Shard<W: ContainerWriter> {
  index: u32,
  writer: W,
  section_counts: SectionCounts,
  accumulated_size: u64,
  current_db: Option<u32>,
  /// Offset of the open section header.
  section_offset: Option<u64>,
  key_count: u64,
  ttl_count: u64,
  records: u64,
  skipped: u64,
  sections: u64,
}

impl<W: ContainerWriter> Shard<W> {
  /// Writes the container header and aux fields into a fresh sink. Section
  /// counts are handled the way the sink is configured.
  pub fn open(index: u32, mut writer: W) -> Result<Self> {
    let section_counts = writer.section_counts();
    writer.write_header()?;
    for (key, value) in AUX_FIELDS {
      if let Err(e) = writer.write_aux(key, value) {
        warn!(target: "rdbsplit", shard = index, "Failed to write aux field {}: {}", key, e);
      }
    }
    Ok(Self {
      index,
      writer,
      section_counts,
      accumulated_size: 0,
      current_db: None,
      section_offset: None,
      key_count: 0,
      ttl_count: 0,
      records: 0,
      skipped: 0,
      sections: 0,
    })
  }

  pub fn index(&self) -> u32 {
    self.index
  }

  pub fn accumulated_size(&self) -> u64 {
    self.accumulated_size
  }

  pub fn current_db(&self) -> Option<u32> {
    self.current_db
  }

  /// Keys and keys-with-expiration written since the open section header.
  pub fn open_section_counts(&self) -> (u64, u64) {
    (self.key_count, self.ttl_count)
  }

  /// Starts a section for `db` unless it is already the open one.
  pub fn enter_db(&mut self, db: u32) -> Result<()> {
    if self.current_db == Some(db) {
      return Ok(());
    }
    self.close_section()?;
    let offset = self.writer.write_db_header(db, 0, 0)?;
    debug!(target: "rdbsplit", shard = self.index, db, offset, "Opened database section");
    self.current_db = Some(db);
    self.section_offset = Some(offset);
    self.key_count = 0;
    self.ttl_count = 0;
    self.sections += 1;
    Ok(())
  }

  /// Writes the record into the open section. Returns false when the payload
  /// cannot be re-encoded and was dropped.
  pub fn write(&mut self, record: &Record) -> Result<bool> {
    let key = &record.key;
    let expire = record.expire_ms;
    match &record.payload {
      Payload::String(value) => self.writer.write_string(key, value, expire)?,
      Payload::List(values) => self.writer.write_list(key, values, expire)?,
      Payload::Hash(fields) => self.writer.write_hash(key, fields, expire)?,
      Payload::Set(members) => self.writer.write_set(key, members, expire)?,
      Payload::ZSet(entries) => self.writer.write_zset(key, entries, expire)?,
      Payload::Unsupported(_) => {
        debug!(
          target: "rdbsplit",
          shard = self.index,
          kind = record.payload.kind(),
          "Skipping {} value of key {:?}",
          record.payload.kind(),
          String::from_utf8_lossy(key)
        );
        self.skipped += 1;
        return Ok(false);
      }
    }
    self.key_count += 1;
    if expire.is_some() {
      self.ttl_count += 1;
    }
    self.records += 1;
    Ok(true)
  }

  pub fn add_size(&mut self, size: u64) {
    self.accumulated_size += size;
  }

  /// Records the true counts of the open section when they are patched.
  fn close_section(&mut self) -> Result<()> {
    if let Some(offset) = self.section_offset.take() {
      if self.section_counts == SectionCounts::Patch && (self.key_count > 0 || self.ttl_count > 0) {
        self.writer.patch_db_header(offset, self.key_count, self.ttl_count)?;
      }
    }
    Ok(())
  }

  /// Closes the open section, writes the trailer and releases the sink.
  pub fn finalize(mut self) -> Result<ShardSummary> {
    self.close_section()?;
    let bytes_written = self.writer.close()?;
    Ok(ShardSummary {
      index: self.index,
      records: self.records,
      skipped: self.skipped,
      sections: self.sections,
      accumulated_size: self.accumulated_size,
      bytes_written,
    })
  }
}
