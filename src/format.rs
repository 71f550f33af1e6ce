use crate::error::{Error, Result};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use crc::{Crc, Digest, CRC_64_REDIS};
use std::io::{self, Read, Write};

pub const MAGIC: &[u8; 5] = b"REDIS";

/// Version stamped on every shard.
pub const WRITE_VERSION: u32 = 9;

/// Newest source version the decoder understands.
pub const MAX_READ_VERSION: u32 = 12;

/// First version that carries a CRC64 trailer.
pub const CHECKSUM_VERSION: u32 = 5;

pub mod opcode {
  pub const SLOT_INFO: u8 = 0xF4;
  pub const FUNCTION2: u8 = 0xF5;
  pub const FUNCTION_PRE_GA: u8 = 0xF6;
  pub const MODULE_AUX: u8 = 0xF7;
  pub const IDLE: u8 = 0xF8;
  pub const FREQ: u8 = 0xF9;
  pub const AUX: u8 = 0xFA;
  pub const RESIZEDB: u8 = 0xFB;
  pub const EXPIRETIME_MS: u8 = 0xFC;
  pub const EXPIRETIME: u8 = 0xFD;
  pub const SELECTDB: u8 = 0xFE;
  pub const EOF: u8 = 0xFF;
}

/// Object type bytes that precede a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ObjectType {
  String = 0,
  List = 1,
  Set = 2,
  ZSet = 3,
  Hash = 4,
  ZSet2 = 5,
  Module = 6,
  Module2 = 7,
  HashZipmap = 9,
  ListZiplist = 10,
  SetIntset = 11,
  ZSetZiplist = 12,
  HashZiplist = 13,
  ListQuicklist = 14,
  StreamListpacks = 15,
  HashListpack = 16,
  ZSetListpack = 17,
  ListQuicklist2 = 18,
  StreamListpacks2 = 19,
  SetListpack = 20,
  StreamListpacks3 = 21,
}

impl TryFrom<u8> for ObjectType {
  type Error = Error;
  fn try_from(v: u8) -> Result<Self> {
    Ok(match v {
      0 => ObjectType::String,
      1 => ObjectType::List,
      2 => ObjectType::Set,
      3 => ObjectType::ZSet,
      4 => ObjectType::Hash,
      5 => ObjectType::ZSet2,
      6 => ObjectType::Module,
      7 => ObjectType::Module2,
      9 => ObjectType::HashZipmap,
      10 => ObjectType::ListZiplist,
      11 => ObjectType::SetIntset,
      12 => ObjectType::ZSetZiplist,
      13 => ObjectType::HashZiplist,
      14 => ObjectType::ListQuicklist,
      15 => ObjectType::StreamListpacks,
      16 => ObjectType::HashListpack,
      17 => ObjectType::ZSetListpack,
      18 => ObjectType::ListQuicklist2,
      19 => ObjectType::StreamListpacks2,
      20 => ObjectType::SetListpack,
      21 => ObjectType::StreamListpacks3,
      _ => return Err(Error::UnsupportedType(v)),
    })
  }
}

/// Special string encodings carried in the low bits of a `11xxxxxx` length byte.
pub mod string_enc {
  pub const INT8: u8 = 0;
  pub const INT16: u8 = 1;
  pub const INT32: u8 = 2;
  pub const LZF: u8 = 3;
}

/// Quicklist v2 node containers.
pub const QUICKLIST_NODE_PLAIN: u64 = 1;
pub const QUICKLIST_NODE_PACKED: u64 = 2;

/// Textual zset scores use these length bytes for the non-finite values.
pub const SCORE_NAN: u8 = 253;
pub const SCORE_POS_INF: u8 = 254;
pub const SCORE_NEG_INF: u8 = 255;

/// A decoded length prefix.
///
/// [00|6 bits]             6-bit length
/// [01|6 bits][8 bits]     14-bit length, big endian
/// [0x80][4 bytes]         32-bit length, big endian
/// [0x81][8 bytes]         64-bit length, big endian
/// [11|6 bits]             special string encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Length {
  Plain(u64),
  Encoded(u8),
}

const LEN_6BIT: u8 = 0;
const LEN_14BIT: u8 = 1;
const LEN_32BIT: u8 = 0x80;
const LEN_64BIT: u8 = 0x81;
const LEN_ENCVAL: u8 = 3;

pub fn read_length<R: Read>(reader: &mut R) -> Result<Length> {
  let first = reader.read_u8()?;
  match first >> 6 {
    LEN_6BIT => Ok(Length::Plain((first & 0x3F) as u64)),
    LEN_14BIT => {
      let next = reader.read_u8()?;
      Ok(Length::Plain((((first & 0x3F) as u64) << 8) | next as u64))
    }
    LEN_ENCVAL => Ok(Length::Encoded(first & 0x3F)),
    _ => match first {
      LEN_32BIT => Ok(Length::Plain(reader.read_u32::<BigEndian>()? as u64)),
      LEN_64BIT => Ok(Length::Plain(reader.read_u64::<BigEndian>()?)),
      _ => Err(Error::Corruption(format!("Unknown length encoding: {:#04x}", first))),
    },
  }
}

/// Reads a length that must not carry a string encoding.
pub fn read_plain_length<R: Read>(reader: &mut R) -> Result<u64> {
  match read_length(reader)? {
    Length::Plain(len) => Ok(len),
    Length::Encoded(enc) => Err(Error::Corruption(format!(
      "Expected a plain length, found string encoding {}",
      enc
    ))),
  }
}

/// Writes `len` in the shortest form.
pub fn write_length<W: Write>(writer: &mut W, len: u64) -> io::Result<()> {
  if len < 1 << 6 {
    writer.write_u8(len as u8)
  } else if len < 1 << 14 {
    writer.write_u8((LEN_14BIT << 6) | (len >> 8) as u8)?;
    writer.write_u8(len as u8)
  } else if len <= u32::MAX as u64 {
    writer.write_u8(LEN_32BIT)?;
    writer.write_u32::<BigEndian>(len as u32)
  } else {
    write_fixed_length(writer, len)
  }
}

/// Writes `len` in the 9-byte form regardless of its value, so it can be
/// overwritten in place later.
pub fn write_fixed_length<W: Write>(writer: &mut W, len: u64) -> io::Result<()> {
  writer.write_u8(LEN_64BIT)?;
  writer.write_u64::<BigEndian>(len)
}

pub static CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_REDIS);

/// Starts a running CRC64 over a container's bytes.
pub fn checksum_digest() -> Digest<'static, u64> {
  CRC64.digest()
}
