/// One member of a sorted set.
#[derive(Debug, Clone, PartialEq)]
pub struct ZSetEntry {
  pub member: Vec<u8>,
  pub score: f64,
}

/// Value kinds the splitter reads but cannot re-encode. They are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsupportedKind {
  Stream,
  Module,
}

/// The typed value of a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
  String(Vec<u8>),
  List(Vec<Vec<u8>>),
  /// Field/value pairs in source order.
  Hash(Vec<(Vec<u8>, Vec<u8>)>),
  Set(Vec<Vec<u8>>),
  ZSet(Vec<ZSetEntry>),
  Unsupported(UnsupportedKind),
}

impl Payload {
  pub fn kind(&self) -> &'static str {
    match self {
      Payload::String(_) => "string",
      Payload::List(_) => "list",
      Payload::Hash(_) => "hash",
      Payload::Set(_) => "set",
      Payload::ZSet(_) => "zset",
      Payload::Unsupported(UnsupportedKind::Stream) => "stream",
      Payload::Unsupported(UnsupportedKind::Module) => "module",
    }
  }

  pub fn is_supported(&self) -> bool {
    !matches!(self, Payload::Unsupported(_))
  }
}

/// A single key read from a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
  /// Logical database the key belongs to.
  pub db: u32,
  pub key: Vec<u8>,
  pub payload: Payload,
  /// Absolute expiration, unix milliseconds.
  pub expire_ms: Option<u64>,
  /// Serialized size in bytes. Drives shard rotation.
  pub size: u64,
}

impl Record {
  pub fn new(db: u32, key: impl Into<Vec<u8>>, payload: Payload) -> Self {
    Self {
      db,
      key: key.into(),
      payload,
      expire_ms: None,
      size: 0,
    }
  }

  pub fn with_expire_ms(mut self, expire_ms: u64) -> Self {
    self.expire_ms = Some(expire_ms);
    self
  }

  pub fn with_size(mut self, size: u64) -> Self {
    self.size = size;
    self
  }
}
