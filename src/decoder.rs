use std::io::{self, Read};

use byteorder::{LittleEndian, ReadBytesExt};
use crc::Digest;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::format::{self, Length, ObjectType, opcode, string_enc};
use crate::lzf;
use crate::packed;
use crate::record::{Payload, Record, UnsupportedKind, ZSetEntry};

/// A pull-style supplier of records.
///
/// `parse` feeds records to `f` until the source is exhausted, `f` returns
/// `Ok(false)`, or an error occurs.
pub trait RecordSource {
  fn parse<F>(&mut self, f: F) -> Result<()>
  where
    F: FnMut(Record) -> Result<bool>;
}

impl<I> RecordSource for I
where
  I: Iterator<Item = Result<Record>>,
{
  fn parse<F>(&mut self, mut f: F) -> Result<()>
  where
    F: FnMut(Record) -> Result<bool>,
  {
    for record in self {
      if !f(record?)? {
        break;
      }
    }
    Ok(())
  }
}

/// Counts and checksums every byte pulled from the source.
struct Tracked<R> {
  inner: R,
  position: u64,
  digest: Option<Digest<'static, u64>>,
}

impl<R: Read> Read for Tracked<R> {
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    let n = self.inner.read(buf)?;
    self.position += n as u64;
    if let Some(digest) = self.digest.as_mut() {
      digest.update(&buf[..n]);
    }
    Ok(n)
  }
}

impl<R> Tracked<R> {
  /// Finalizes the running checksum. Later reads are not hashed.
  fn take_checksum(&mut self) -> u64 {
    self.digest.take().map(|d| d.finalize()).unwrap_or(0)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
  Header,
  Body,
  Done,
}

/// Decodes an RDB snapshot into a sequence of records.
pub struct Decoder<R> {
  reader: Tracked<R>,
  phase: Phase,
  version: u32,
  db: u32,
  verify_checksum: bool,
  aux: Vec<(Vec<u8>, Vec<u8>)>,
}

impl<R: Read> Decoder<R> {
  pub fn new(reader: R) -> Self {
    Self {
      reader: Tracked {
        inner: reader,
        position: 0,
        digest: Some(format::checksum_digest()),
      },
      phase: Phase::Header,
      version: 0,
      db: 0,
      verify_checksum: true,
      aux: Vec::new(),
    }
  }

  pub fn verify_checksum(mut self, verify: bool) -> Self {
    self.verify_checksum = verify;
    self
  }

  /// Snapshot version. Zero until the header has been read.
  pub fn version(&self) -> u32 {
    self.version
  }

  /// Bytes consumed so far.
  pub fn position(&self) -> u64 {
    self.reader.position
  }

  /// Aux fields seen so far, in source order.
  pub fn aux_fields(&self) -> &[(Vec<u8>, Vec<u8>)] {
    &self.aux
  }

  /// Reads the next record. Returns `None` once the EOF opcode is consumed.
  pub fn next_record(&mut self) -> Result<Option<Record>> {
    match self.phase {
      Phase::Done => return Ok(None),
      Phase::Header => {
        self.read_header()?;
        self.phase = Phase::Body;
      }
      Phase::Body => {}
    }

    let mut expire_ms = None;
    let mut record_start = None;

    loop {
      let op_start = self.reader.position;
      let op = self.reader.read_u8()?;
      match op {
        opcode::EXPIRETIME_MS => {
          record_start.get_or_insert(op_start);
          expire_ms = Some(self.reader.read_u64::<LittleEndian>()?);
        }
        opcode::EXPIRETIME => {
          record_start.get_or_insert(op_start);
          expire_ms = Some(self.reader.read_u32::<LittleEndian>()? as u64 * 1000);
        }
        opcode::IDLE => {
          record_start.get_or_insert(op_start);
          format::read_plain_length(&mut self.reader)?;
        }
        opcode::FREQ => {
          record_start.get_or_insert(op_start);
          self.reader.read_u8()?;
        }
        opcode::SELECTDB => {
          let db = format::read_plain_length(&mut self.reader)?;
          self.db = u32::try_from(db).map_err(|_| Error::Corruption(format!("Database index out of range: {}", db)))?;
          trace!(target: "rdbsplit", "select db {}", self.db);
        }
        opcode::RESIZEDB => {
          let keys = format::read_plain_length(&mut self.reader)?;
          let expires = format::read_plain_length(&mut self.reader)?;
          trace!(target: "rdbsplit", "db {} declares {} keys, {} with ttl", self.db, keys, expires);
        }
        opcode::AUX => {
          let key = self.read_string()?;
          let value = self.read_string()?;
          debug!(
            target: "rdbsplit",
            "aux {} = {}",
            String::from_utf8_lossy(&key),
            String::from_utf8_lossy(&value)
          );
          self.aux.push((key, value));
        }
        opcode::MODULE_AUX => self.skip_module_aux()?,
        opcode::FUNCTION2 => {
          self.read_string()?;
          debug!(target: "rdbsplit", "skipped function library");
        }
        opcode::SLOT_INFO => {
          for _ in 0..3 {
            format::read_plain_length(&mut self.reader)?;
          }
        }
        opcode::FUNCTION_PRE_GA => return Err(Error::UnsupportedType(op)),
        opcode::EOF => {
          self.read_trailer()?;
          self.phase = Phase::Done;
          return Ok(None);
        }
        type_byte => {
          let start = record_start.unwrap_or(op_start);
          let kind = ObjectType::try_from(type_byte)?;
          let key = self.read_string()?;
          let payload = self.read_payload(kind)?;
          return Ok(Some(Record {
            db: self.db,
            key,
            payload,
            expire_ms,
            size: self.reader.position - start,
          }));
        }
      }
    }
  }

  fn read_header(&mut self) -> Result<()> {
    let mut magic = [0u8; 5];
    self.reader.read_exact(&mut magic)?;
    if &magic != format::MAGIC {
      return Err(Error::Corruption(format!("Invalid RDB magic: {:?}", String::from_utf8_lossy(&magic))));
    }

    let mut digits = [0u8; 4];
    self.reader.read_exact(&mut digits)?;
    let version = std::str::from_utf8(&digits)
      .ok()
      .and_then(|s| s.parse::<u32>().ok())
      .ok_or_else(|| Error::Corruption(format!("Invalid RDB version: {:?}", digits)))?;
    if version == 0 || version > format::MAX_READ_VERSION {
      return Err(Error::UnsupportedVersion(version));
    }

    self.version = version;
    debug!(target: "rdbsplit", "rdb version {}", version);
    Ok(())
  }

  fn read_trailer(&mut self) -> Result<()> {
    let actual = self.reader.take_checksum();
    if self.version < format::CHECKSUM_VERSION {
      return Ok(());
    }

    let expected = self.reader.read_u64::<LittleEndian>()?;
    if expected == 0 {
      debug!(target: "rdbsplit", "source was saved without a checksum");
    } else if self.verify_checksum && expected != actual {
      return Err(Error::ChecksumMismatch { expected, actual });
    }
    Ok(())
  }

  fn read_string(&mut self) -> Result<Vec<u8>> {
    match format::read_length(&mut self.reader)? {
      Length::Plain(len) => self.read_bytes(len),
      Length::Encoded(string_enc::INT8) => Ok(self.reader.read_i8()?.to_string().into_bytes()),
      Length::Encoded(string_enc::INT16) => Ok(self.reader.read_i16::<LittleEndian>()?.to_string().into_bytes()),
      Length::Encoded(string_enc::INT32) => Ok(self.reader.read_i32::<LittleEndian>()?.to_string().into_bytes()),
      Length::Encoded(string_enc::LZF) => {
        let compressed_len = format::read_plain_length(&mut self.reader)?;
        let len = format::read_plain_length(&mut self.reader)?;
        let compressed = self.read_bytes(compressed_len)?;
        lzf::decompress(&compressed, len as usize)
      }
      Length::Encoded(enc) => Err(Error::Corruption(format!("Unknown string encoding: {}", enc))),
    }
  }

  /// Reads exactly `len` bytes without trusting `len` for the allocation.
  fn read_bytes(&mut self, len: u64) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    (&mut self.reader).take(len).read_to_end(&mut buf)?;
    if buf.len() as u64 != len {
      return Err(Error::Io(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("string of {} bytes truncated after {}", len, buf.len()),
      )));
    }
    Ok(buf)
  }

  fn skip_bytes(&mut self, len: u64) -> Result<()> {
    let copied = io::copy(&mut (&mut self.reader).take(len), &mut io::sink())?;
    if copied != len {
      return Err(Error::Io(io::ErrorKind::UnexpectedEof.into()));
    }
    Ok(())
  }

  fn read_strings(&mut self) -> Result<Vec<Vec<u8>>> {
    let len = format::read_plain_length(&mut self.reader)?;
    let mut out = Vec::new();
    for _ in 0..len {
      out.push(self.read_string()?);
    }
    Ok(out)
  }

  fn read_payload(&mut self, kind: ObjectType) -> Result<Payload> {
    let payload = match kind {
      ObjectType::String => Payload::String(self.read_string()?),
      ObjectType::List => Payload::List(self.read_strings()?),
      ObjectType::Set => Payload::Set(self.read_strings()?),
      ObjectType::Hash => {
        let len = format::read_plain_length(&mut self.reader)?;
        let mut fields = Vec::new();
        for _ in 0..len {
          let field = self.read_string()?;
          let value = self.read_string()?;
          fields.push((field, value));
        }
        Payload::Hash(fields)
      }
      ObjectType::ZSet | ObjectType::ZSet2 => {
        let len = format::read_plain_length(&mut self.reader)?;
        let mut entries = Vec::new();
        for _ in 0..len {
          let member = self.read_string()?;
          let score = if kind == ObjectType::ZSet2 {
            self.reader.read_f64::<LittleEndian>()?
          } else {
            self.read_text_score()?
          };
          entries.push(ZSetEntry { member, score });
        }
        Payload::ZSet(entries)
      }
      ObjectType::HashZipmap => Payload::Hash(packed::zipmap_pairs(&self.read_string()?)?),
      ObjectType::ListZiplist => Payload::List(packed::ziplist_entries(&self.read_string()?)?),
      ObjectType::SetIntset => Payload::Set(packed::intset_members(&self.read_string()?)?),
      ObjectType::SetListpack => Payload::Set(packed::listpack_entries(&self.read_string()?)?),
      ObjectType::HashZiplist => Payload::Hash(packed::pairs(packed::ziplist_entries(&self.read_string()?)?)?),
      ObjectType::HashListpack => Payload::Hash(packed::pairs(packed::listpack_entries(&self.read_string()?)?)?),
      ObjectType::ZSetZiplist => Payload::ZSet(zset_from_pairs(packed::pairs(packed::ziplist_entries(
        &self.read_string()?,
      )?)?)?),
      ObjectType::ZSetListpack => Payload::ZSet(zset_from_pairs(packed::pairs(packed::listpack_entries(
        &self.read_string()?,
      )?)?)?),
      ObjectType::ListQuicklist => {
        let nodes = format::read_plain_length(&mut self.reader)?;
        let mut values = Vec::new();
        for _ in 0..nodes {
          values.extend(packed::ziplist_entries(&self.read_string()?)?);
        }
        Payload::List(values)
      }
      ObjectType::ListQuicklist2 => {
        let nodes = format::read_plain_length(&mut self.reader)?;
        let mut values = Vec::new();
        for _ in 0..nodes {
          let container = format::read_plain_length(&mut self.reader)?;
          let blob = self.read_string()?;
          match container {
            format::QUICKLIST_NODE_PLAIN => values.push(blob),
            format::QUICKLIST_NODE_PACKED => values.extend(packed::listpack_entries(&blob)?),
            other => return Err(Error::Corruption(format!("Unknown quicklist container: {}", other))),
          }
        }
        Payload::List(values)
      }
      ObjectType::StreamListpacks | ObjectType::StreamListpacks2 | ObjectType::StreamListpacks3 => {
        self.skip_stream(kind)?;
        Payload::Unsupported(UnsupportedKind::Stream)
      }
      ObjectType::Module2 => {
        let module_id = format::read_plain_length(&mut self.reader)?;
        trace!(target: "rdbsplit", "skipping module value {:#x}", module_id);
        self.skip_module_values()?;
        Payload::Unsupported(UnsupportedKind::Module)
      }
      ObjectType::Module => return Err(Error::UnsupportedType(kind as u8)),
    };
    Ok(payload)
  }

  fn read_text_score(&mut self) -> Result<f64> {
    let len = self.reader.read_u8()?;
    match len {
      format::SCORE_NAN => Ok(f64::NAN),
      format::SCORE_POS_INF => Ok(f64::INFINITY),
      format::SCORE_NEG_INF => Ok(f64::NEG_INFINITY),
      _ => {
        let text = self.read_bytes(len as u64)?;
        parse_score(&text)
      }
    }
  }

  /// Walks a stream value without materializing it.
  fn skip_stream(&mut self, kind: ObjectType) -> Result<()> {
    let v2 = kind != ObjectType::StreamListpacks;
    let v3 = kind == ObjectType::StreamListpacks3;

    let nodes = format::read_plain_length(&mut self.reader)?;
    for _ in 0..nodes {
      self.read_string()?; // master entry id
      self.read_string()?; // listpack
    }

    // length, last id (ms, seq)
    let mut scalars = 3;
    if v2 {
      // first id, max deleted id, entries added
      scalars += 5;
    }
    for _ in 0..scalars {
      format::read_plain_length(&mut self.reader)?;
    }

    let groups = format::read_plain_length(&mut self.reader)?;
    for _ in 0..groups {
      self.read_string()?;
      format::read_plain_length(&mut self.reader)?;
      format::read_plain_length(&mut self.reader)?;
      if v2 {
        format::read_plain_length(&mut self.reader)?; // entries read
      }

      let pending = format::read_plain_length(&mut self.reader)?;
      for _ in 0..pending {
        self.skip_bytes(16 + 8)?; // raw id, delivery time
        format::read_plain_length(&mut self.reader)?; // delivery count
      }

      let consumers = format::read_plain_length(&mut self.reader)?;
      for _ in 0..consumers {
        self.read_string()?;
        self.skip_bytes(if v3 { 16 } else { 8 })?; // seen time, active time
        let owned = format::read_plain_length(&mut self.reader)?;
        self.skip_bytes(owned.saturating_mul(16))?;
      }
    }
    Ok(())
  }

  /// Module aux payload: module id, `when` opcode and value, then values.
  fn skip_module_aux(&mut self) -> Result<()> {
    let module_id = format::read_plain_length(&mut self.reader)?;
    let when_opcode = format::read_plain_length(&mut self.reader)?;
    if when_opcode != MODULE_OPCODE_UINT {
      return Err(Error::Corruption(format!(
        "Module aux {:#x} has bad when opcode {}",
        module_id, when_opcode
      )));
    }
    format::read_plain_length(&mut self.reader)?;
    self.skip_module_values()?;
    debug!(target: "rdbsplit", "skipped module aux {:#x}", module_id);
    Ok(())
  }

  /// Self-describing module serialization: (opcode, value)* terminated by EOF.
  fn skip_module_values(&mut self) -> Result<()> {
    loop {
      match format::read_plain_length(&mut self.reader)? {
        MODULE_OPCODE_EOF => return Ok(()),
        MODULE_OPCODE_SINT | MODULE_OPCODE_UINT => {
          format::read_plain_length(&mut self.reader)?;
        }
        MODULE_OPCODE_FLOAT => self.skip_bytes(4)?,
        MODULE_OPCODE_DOUBLE => self.skip_bytes(8)?,
        MODULE_OPCODE_STRING => {
          self.read_string()?;
        }
        other => return Err(Error::Corruption(format!("Unknown module opcode: {}", other))),
      }
    }
  }
}

const MODULE_OPCODE_EOF: u64 = 0;
const MODULE_OPCODE_SINT: u64 = 1;
const MODULE_OPCODE_UINT: u64 = 2;
const MODULE_OPCODE_FLOAT: u64 = 3;
const MODULE_OPCODE_DOUBLE: u64 = 4;
const MODULE_OPCODE_STRING: u64 = 5;

fn parse_score(text: &[u8]) -> Result<f64> {
  let s = std::str::from_utf8(text).map_err(|_| Error::Corruption("Non UTF-8 zset score".into()))?;
  match s {
    "inf" | "+inf" => Ok(f64::INFINITY),
    "-inf" => Ok(f64::NEG_INFINITY),
    "nan" => Ok(f64::NAN),
    _ => s
      .parse::<f64>()
      .map_err(|_| Error::Corruption(format!("Invalid zset score: {:?}", s))),
  }
}

fn zset_from_pairs(pairs: Vec<(Vec<u8>, Vec<u8>)>) -> Result<Vec<ZSetEntry>> {
  pairs
    .into_iter()
    .map(|(member, score)| {
      Ok(ZSetEntry {
        member,
        score: parse_score(&score)?,
      })
    })
    .collect()
}

impl<R: Read> Iterator for Decoder<R> {
  type Item = Result<Record>;

  fn next(&mut self) -> Option<Self::Item> {
    match self.next_record() {
      Ok(Some(record)) => Some(Ok(record)),
      Ok(None) => None,
      Err(e) => {
        // A decode error is terminal.
        self.phase = Phase::Done;
        Some(Err(e))
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use byteorder::WriteBytesExt;
  use std::io::Cursor;

  /// Builds a container by hand so the packed encodings can be exercised.
  struct Builder {
    buf: Vec<u8>,
  }

  impl Builder {
    fn new(version: &str) -> Self {
      let mut buf = b"REDIS".to_vec();
      buf.extend(version.as_bytes());
      Self { buf }
    }

    fn op(mut self, op: u8) -> Self {
      self.buf.push(op);
      self
    }

    fn len(mut self, len: u64) -> Self {
      format::write_length(&mut self.buf, len).unwrap();
      self
    }

    fn string(self, s: &[u8]) -> Self {
      let mut b = self.len(s.len() as u64);
      b.buf.extend(s);
      b
    }

    fn raw(mut self, bytes: &[u8]) -> Self {
      self.buf.extend(bytes);
      self
    }

    fn finish(mut self) -> Vec<u8> {
      self.buf.push(opcode::EOF);
      let crc = format::CRC64.checksum(&self.buf);
      self.buf.write_u64::<LittleEndian>(crc).unwrap();
      self.buf
    }
  }

  fn decode_all(bytes: Vec<u8>) -> Result<Vec<Record>> {
    Decoder::new(Cursor::new(bytes)).collect()
  }

  fn listpack(items: &[&[u8]]) -> Vec<u8> {
    let mut body = Vec::new();
    for item in items {
      assert!(item.len() < 64);
      body.push(0x80 | item.len() as u8);
      body.extend(*item);
      body.push(1 + item.len() as u8);
    }
    let mut blob = Vec::new();
    blob.extend(((6 + body.len() + 1) as u32).to_le_bytes());
    blob.extend((items.len() as u16).to_le_bytes());
    blob.extend(body);
    blob.push(0xFF);
    blob
  }

  #[test]
  fn test_plain_types_and_db_switch() {
    let bytes = Builder::new("0009")
      .op(opcode::AUX)
      .string(b"redis-ver")
      .string(b"7.0.0")
      .op(opcode::SELECTDB)
      .len(0)
      .op(opcode::RESIZEDB)
      .len(2)
      .len(1)
      .op(opcode::EXPIRETIME_MS)
      .raw(&1_700_000_000_000u64.to_le_bytes())
      .op(0)
      .string(b"greeting")
      .string(b"hello")
      .op(opcode::SELECTDB)
      .len(3)
      .op(1)
      .string(b"queue")
      .len(2)
      .string(b"a")
      .string(b"b")
      .finish();

    let records = decode_all(bytes).unwrap();
    assert_eq!(records.len(), 2);

    assert_eq!(records[0].db, 0);
    assert_eq!(records[0].key, b"greeting");
    assert_eq!(records[0].payload, Payload::String(b"hello".to_vec()));
    assert_eq!(records[0].expire_ms, Some(1_700_000_000_000));
    // expire opcode (9) + type (1) + key (9) + value (6)
    assert_eq!(records[0].size, 25);

    assert_eq!(records[1].db, 3);
    assert_eq!(records[1].payload, Payload::List(vec![b"a".to_vec(), b"b".to_vec()]));
    assert_eq!(records[1].expire_ms, None);
  }

  #[test]
  fn test_aux_fields_are_collected() {
    let bytes = Builder::new("0011").op(opcode::AUX).string(b"ctime").string(b"1").finish();
    let mut decoder = Decoder::new(Cursor::new(bytes));
    assert!(decoder.next_record().unwrap().is_none());
    assert_eq!(decoder.version(), 11);
    assert_eq!(decoder.aux_fields(), &[(b"ctime".to_vec(), b"1".to_vec())]);
  }

  #[test]
  fn test_int_encoded_strings_and_seconds_expiry() {
    let bytes = Builder::new("0009")
      .op(opcode::EXPIRETIME)
      .raw(&1_000u32.to_le_bytes())
      .op(0)
      .raw(&[0xC0, 0x07]) // key: int8 7
      .raw(&[0xC1])
      .raw(&(-1234i16).to_le_bytes())
      .finish();

    let records = decode_all(bytes).unwrap();
    assert_eq!(records[0].key, b"7");
    assert_eq!(records[0].payload, Payload::String(b"-1234".to_vec()));
    assert_eq!(records[0].expire_ms, Some(1_000_000));
  }

  #[test]
  fn test_lzf_string() {
    let value = b"abcabcabcabcabcabcabcabcabcabcabc".to_vec();
    let compressed = lzf::compress(&value).unwrap();
    let bytes = Builder::new("0009")
      .op(0)
      .string(b"k")
      .raw(&[0xC3])
      .len(compressed.len() as u64)
      .len(value.len() as u64)
      .raw(&compressed)
      .finish();

    let records = decode_all(bytes).unwrap();
    assert_eq!(records[0].payload, Payload::String(value));
  }

  #[test]
  fn test_lzf_string_with_huge_declared_length() {
    let bytes = Builder::new("0009")
      .op(opcode::SELECTDB)
      .len(0)
      .op(0)
      .string(b"k")
      .raw(&[0xC0 | string_enc::LZF])
      .len(1)
      .raw(&[0x81])
      .raw(&u64::MAX.to_be_bytes())
      .raw(&[0x00])
      .finish();
    assert!(matches!(decode_all(bytes), Err(Error::Corruption(_))));
  }

  #[test]
  fn test_packed_collections() {
    let mut intset = Vec::new();
    intset.extend(2u32.to_le_bytes());
    intset.extend(2u32.to_le_bytes());
    intset.extend(1i16.to_le_bytes());
    intset.extend(2i16.to_le_bytes());

    let bytes = Builder::new("0010")
      .op(ObjectType::HashListpack as u8)
      .string(b"h")
      .string(&listpack(&[b"f1", b"v1", b"f2", b"v2"]))
      .op(ObjectType::ZSetListpack as u8)
      .string(b"z")
      .string(&listpack(&[b"m", b"1.5"]))
      .op(ObjectType::SetIntset as u8)
      .string(b"s")
      .string(&intset)
      .op(ObjectType::ListQuicklist2 as u8)
      .string(b"l")
      .len(2)
      .len(format::QUICKLIST_NODE_PACKED)
      .string(&listpack(&[b"x", b"y"]))
      .len(format::QUICKLIST_NODE_PLAIN)
      .string(b"big")
      .finish();

    let records = decode_all(bytes).unwrap();
    assert_eq!(
      records[0].payload,
      Payload::Hash(vec![
        (b"f1".to_vec(), b"v1".to_vec()),
        (b"f2".to_vec(), b"v2".to_vec())
      ])
    );
    assert_eq!(
      records[1].payload,
      Payload::ZSet(vec![ZSetEntry {
        member: b"m".to_vec(),
        score: 1.5
      }])
    );
    assert_eq!(records[2].payload, Payload::Set(vec![b"1".to_vec(), b"2".to_vec()]));
    assert_eq!(
      records[3].payload,
      Payload::List(vec![b"x".to_vec(), b"y".to_vec(), b"big".to_vec()])
    );
  }

  #[test]
  fn test_text_zset_scores() {
    let bytes = Builder::new("0006")
      .op(ObjectType::ZSet as u8)
      .string(b"z")
      .len(2)
      .string(b"a")
      .raw(&[3])
      .raw(b"2.5")
      .string(b"b")
      .raw(&[format::SCORE_NEG_INF])
      .finish();

    let records = decode_all(bytes).unwrap();
    match &records[0].payload {
      Payload::ZSet(entries) => {
        assert_eq!(entries[0].score, 2.5);
        assert_eq!(entries[1].score, f64::NEG_INFINITY);
      }
      other => panic!("unexpected payload {:?}", other),
    }
  }

  #[test]
  fn test_stream_is_skipped_as_unsupported() {
    let bytes = Builder::new("0011")
      .op(ObjectType::StreamListpacks2 as u8)
      .string(b"events")
      .len(1)
      .string(&[0u8; 16])
      .string(&listpack(&[b"a"]))
      .len(1) // length
      .len(5)
      .len(0) // last id
      .len(5)
      .len(0) // first id
      .len(0)
      .len(0) // max deleted id
      .len(1) // entries added
      .len(1) // groups
      .string(b"g")
      .len(5)
      .len(0)
      .len(1) // entries read
      .len(1) // pending
      .raw(&[0u8; 24])
      .len(1)
      .len(1) // consumers
      .string(b"c")
      .raw(&[0u8; 8])
      .len(1)
      .raw(&[0u8; 16])
      .op(0)
      .string(b"after")
      .string(b"v")
      .finish();

    let records = decode_all(bytes).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].payload, Payload::Unsupported(UnsupportedKind::Stream));
    assert_eq!(records[1].key, b"after");
  }

  #[test]
  fn test_module_aux_and_function_skipped() {
    let bytes = Builder::new("0010")
      .op(opcode::MODULE_AUX)
      .len(0xABCD)
      .len(MODULE_OPCODE_UINT)
      .len(2)
      .len(MODULE_OPCODE_STRING)
      .string(b"blob")
      .len(MODULE_OPCODE_DOUBLE)
      .raw(&[0u8; 8])
      .len(MODULE_OPCODE_EOF)
      .op(opcode::FUNCTION2)
      .string(b"#!lua name=lib")
      .op(0)
      .string(b"k")
      .string(b"v")
      .finish();

    let records = decode_all(bytes).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].key, b"k");
  }

  #[test]
  fn test_checksum_mismatch() {
    let mut bytes = Builder::new("0009").op(0).string(b"k").string(b"v").finish();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;

    let err = decode_all(bytes.clone()).unwrap_err();
    assert!(matches!(err, Error::ChecksumMismatch { .. }));

    let records: Result<Vec<_>> = Decoder::new(Cursor::new(bytes)).verify_checksum(false).collect();
    assert_eq!(records.unwrap().len(), 1);
  }

  #[test]
  fn test_zero_checksum_is_accepted() {
    let mut bytes = Builder::new("0009").op(0).string(b"k").string(b"v").finish();
    let len = bytes.len();
    bytes[len - 8..].copy_from_slice(&[0u8; 8]);
    assert_eq!(decode_all(bytes).unwrap().len(), 1);
  }

  #[test]
  fn test_rejects_bad_header() {
    assert!(matches!(decode_all(b"REDIX0009\xff".to_vec()), Err(Error::Corruption(_))));
    assert!(matches!(
      decode_all(b"REDIS0099\xff".to_vec()),
      Err(Error::UnsupportedVersion(99))
    ));
  }

  #[test]
  fn test_truncated_value_stops_iteration() {
    let mut bytes = Builder::new("0009").op(0).string(b"k").string(b"value").finish();
    bytes.truncate(14);

    let mut decoder = Decoder::new(Cursor::new(bytes));
    assert!(decoder.next().unwrap().is_err());
    assert!(decoder.next().is_none());
  }

  #[test]
  fn test_parse_stops_when_asked() {
    let bytes = Builder::new("0009")
      .op(0)
      .string(b"a")
      .string(b"1")
      .op(0)
      .string(b"b")
      .string(b"2")
      .finish();

    let mut seen = Vec::new();
    Decoder::new(Cursor::new(bytes))
      .parse(|record| {
        seen.push(record.key);
        Ok(false)
      })
      .unwrap();
    assert_eq!(seen, vec![b"a".to_vec()]);
  }
}
