#![allow(dead_code)]

use rdbsplit::{
  ContainerWriter, Decoder, Encoder, Payload, Record, Result, SectionCounts, ShardOutput, SplitOptions, ZSetEntry,
  list_shards, shard_filename,
};
use std::cell::RefCell;
use std::fs::{File, OpenOptions};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;

pub struct TestEnv {
  // Removes the source and every part on drop.
  pub _dir: TempDir,
  pub root: PathBuf,
  pub source: PathBuf,
  pub options: SplitOptions,
}

impl TestEnv {
  pub fn new(target_size: u64) -> Self {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    let mut options = SplitOptions::new(root.join("rdb_dir"));
    options.target_size = target_size;
    Self {
      source: root.join("dump.rdb"),
      _dir: dir,
      root,
      options,
    }
  }

  /// Writes `records` as the source snapshot and returns its size.
  pub fn write_source(&self, records: &[Record]) -> u64 {
    write_rdb(&self.source, records);
    std::fs::metadata(&self.source).unwrap().len()
  }

  /// Decodes every produced part, in index order.
  pub fn read_parts(&self) -> Vec<Vec<Record>> {
    list_shards(&self.options.output_dir)
      .unwrap()
      .into_iter()
      .map(|index| read_rdb(&self.options.output_dir.join(shard_filename(index))))
      .collect()
  }
}

/// Writes a complete snapshot holding `records`, one section per db run.
pub fn write_rdb(path: &Path, records: &[Record]) {
  let file = OpenOptions::new()
    .read(true)
    .write(true)
    .create(true)
    .truncate(true)
    .open(path)
    .unwrap();
  let mut opts = SplitOptions::default();
  opts.section_counts = SectionCounts::Placeholder;
  let mut enc = Encoder::new(file, &opts);
  enc.write_header().unwrap();
  enc.write_aux("redis-ver", "7.2.0").unwrap();
  let mut db = None;
  for record in records {
    if db != Some(record.db) {
      enc.write_db_header(record.db, 0, 0).unwrap();
      db = Some(record.db);
    }
    write_payload(&mut enc, record).unwrap();
  }
  enc.close().unwrap();
}

fn write_payload<W: ContainerWriter>(w: &mut W, record: &Record) -> Result<()> {
  let (key, expire) = (&record.key, record.expire_ms);
  match &record.payload {
    Payload::String(v) => w.write_string(key, v, expire),
    Payload::List(v) => w.write_list(key, v, expire),
    Payload::Hash(v) => w.write_hash(key, v, expire),
    Payload::Set(v) => w.write_set(key, v, expire),
    Payload::ZSet(v) => w.write_zset(key, v, expire),
    Payload::Unsupported(kind) => panic!("cannot write {:?}", kind),
  }
}

pub fn read_rdb(path: &Path) -> Vec<Record> {
  let file = BufReader::new(File::open(path).unwrap());
  Decoder::new(file).collect::<Result<_>>().unwrap()
}

/// Record identity without the encoded size, which is source specific.
pub fn strip(records: &[Record]) -> Vec<(u32, Vec<u8>, Payload, Option<u64>)> {
  records
    .iter()
    .map(|r| (r.db, r.key.clone(), r.payload.clone(), r.expire_ms))
    .collect()
}

/// A varied mix of value kinds spread over three databases.
pub fn sample_records(count: usize) -> Vec<Record> {
  (0..count)
    .map(|i| {
      let db = (i * 3 / count.max(1)) as u32;
      let key = format!("key:{:05}", i);
      let payload = match i % 5 {
        0 => Payload::String(format!("value-{}-{}", i, "x".repeat(i % 40)).into_bytes()),
        1 => Payload::List((0..(i % 7 + 1)).map(|j| format!("item{}", j).into_bytes()).collect()),
        2 => Payload::Hash(vec![
          (b"name".to_vec(), format!("user{}", i).into_bytes()),
          (b"visits".to_vec(), (i * 13).to_string().into_bytes()),
        ]),
        3 => Payload::Set((0..3).map(|j| format!("m{}-{}", i, j).into_bytes()).collect()),
        _ => Payload::ZSet(vec![
          ZSetEntry {
            member: b"low".to_vec(),
            score: -(i as f64),
          },
          ZSetEntry {
            member: b"high".to_vec(),
            score: i as f64 * 1.5,
          },
        ]),
      };
      let record = Record::new(db, key, payload);
      if i % 4 == 0 { record.with_expire_ms(1_700_000_000_000 + i as u64) } else { record }
    })
    .collect()
}

/// What a recording sink saw, in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
  Header,
  Aux(String, String),
  DbHeader { db: u32, offset: u64 },
  Patch { offset: u64, keys: u64, ttls: u64 },
  Record { key: Vec<u8>, ttl: bool },
  Close,
}

pub type Log = Rc<RefCell<Vec<Vec<Event>>>>;

/// Output whose writers only record the calls they receive.
#[derive(Clone, Default)]
pub struct RecordingOutput {
  pub log: Log,
  /// Writers leave section counts unpatched.
  pub placeholder: bool,
}

impl RecordingOutput {
  pub fn shards(&self) -> Vec<Vec<Event>> {
    self.log.borrow().clone()
  }
}

pub struct RecordingWriter {
  log: Log,
  slot: usize,
  written: u64,
  placeholder: bool,
}

impl RecordingWriter {
  fn push(&mut self, event: Event) {
    self.written += 1;
    self.log.borrow_mut()[self.slot].push(event);
  }

  fn record(&mut self, key: &[u8], expire_ms: Option<u64>) -> Result<()> {
    self.push(Event::Record {
      key: key.to_vec(),
      ttl: expire_ms.is_some(),
    });
    Ok(())
  }
}

impl ShardOutput for RecordingOutput {
  type Writer = RecordingWriter;

  fn create(&mut self, index: u32) -> Result<RecordingWriter> {
    let mut log = self.log.borrow_mut();
    assert_eq!(index as usize, log.len() + 1, "shards must be created in order");
    log.push(Vec::new());
    Ok(RecordingWriter {
      log: self.log.clone(),
      slot: log.len() - 1,
      written: 0,
      placeholder: self.placeholder,
    })
  }

  fn location(&self, index: u32) -> String {
    format!("recording:{}", index)
  }
}

impl ContainerWriter for RecordingWriter {
  fn write_header(&mut self) -> Result<()> {
    self.push(Event::Header);
    Ok(())
  }

  fn write_aux(&mut self, key: &str, value: &str) -> Result<()> {
    self.push(Event::Aux(key.to_string(), value.to_string()));
    Ok(())
  }

  fn write_db_header(&mut self, db: u32, _key_count: u64, _ttl_count: u64) -> Result<u64> {
    let offset = self.written;
    self.push(Event::DbHeader { db, offset });
    Ok(offset)
  }

  fn patch_db_header(&mut self, offset: u64, key_count: u64, ttl_count: u64) -> Result<()> {
    self.push(Event::Patch {
      offset,
      keys: key_count,
      ttls: ttl_count,
    });
    Ok(())
  }

  fn write_string(&mut self, key: &[u8], _value: &[u8], expire_ms: Option<u64>) -> Result<()> {
    self.record(key, expire_ms)
  }

  fn write_list(&mut self, key: &[u8], _values: &[Vec<u8>], expire_ms: Option<u64>) -> Result<()> {
    self.record(key, expire_ms)
  }

  fn write_hash(&mut self, key: &[u8], _fields: &[(Vec<u8>, Vec<u8>)], expire_ms: Option<u64>) -> Result<()> {
    self.record(key, expire_ms)
  }

  fn write_set(&mut self, key: &[u8], _members: &[Vec<u8>], expire_ms: Option<u64>) -> Result<()> {
    self.record(key, expire_ms)
  }

  fn write_zset(&mut self, key: &[u8], _entries: &[ZSetEntry], expire_ms: Option<u64>) -> Result<()> {
    self.record(key, expire_ms)
  }

  fn section_counts(&self) -> SectionCounts {
    if self.placeholder { SectionCounts::Placeholder } else { SectionCounts::Patch }
  }

  fn bytes_written(&self) -> u64 {
    self.written
  }

  fn close(mut self) -> Result<u64> {
    self.push(Event::Close);
    Ok(self.written)
  }
}
