use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
  #[error("I/O Error: {0}")]
  Io(#[from] io::Error),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Data Corruption: {0}")]
  Corruption(String),

  #[error("CRC64 Checksum Mismatch: expected {expected:#018x}, got {actual:#018x}")]
  ChecksumMismatch { expected: u64, actual: u64 },

  #[error("Unsupported RDB version: {0}")]
  UnsupportedVersion(u32),

  #[error("Unsupported RDB object type or opcode: {0:#04x}")]
  UnsupportedType(u8),
}
