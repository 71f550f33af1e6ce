//! Compact in-string encodings used by small collections: ziplist, listpack,
//! intset and zipmap. Each parser takes the raw blob and yields its elements
//! in order; integer elements come back as their decimal text.

use crate::error::{Error, Result};
use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};

const END: u8 = 0xFF;

fn take(cursor: &mut Cursor<&[u8]>, len: usize) -> Result<Vec<u8>> {
  let start = cursor.position() as usize;
  let buf = *cursor.get_ref();
  let end = start
    .checked_add(len)
    .filter(|&end| end <= buf.len())
    .ok_or_else(|| Error::Corruption(format!("Packed entry of {} bytes overruns its blob", len)))?;
  cursor.set_position(end as u64);
  Ok(buf[start..end].to_vec())
}

fn skip(cursor: &mut Cursor<&[u8]>, len: usize) -> Result<()> {
  take(cursor, len).map(|_| ())
}

fn int_text(v: i64) -> Vec<u8> {
  v.to_string().into_bytes()
}

/// Ziplist layout:
///
/// [zlbytes: 4][zltail: 4][zllen: 2][entry ...][0xFF]
///
/// entry = [prevlen: 1 or 0xFE + 4][encoding][data]
pub fn ziplist_entries(blob: &[u8]) -> Result<Vec<Vec<u8>>> {
  let mut c = Cursor::new(blob);
  let _zlbytes = c.read_u32::<LittleEndian>()?;
  let _zltail = c.read_u32::<LittleEndian>()?;
  let zllen = c.read_u16::<LittleEndian>()?;
  let mut entries = Vec::with_capacity(zllen as usize);

  loop {
    let prevlen = c.read_u8()?;
    if prevlen == END {
      break;
    }
    if prevlen == 0xFE {
      c.read_u32::<LittleEndian>()?;
    }

    let enc = c.read_u8()?;
    let entry = match enc >> 6 {
      0 => take(&mut c, (enc & 0x3F) as usize)?,
      1 => {
        let low = c.read_u8()?;
        take(&mut c, (((enc & 0x3F) as usize) << 8) | low as usize)?
      }
      2 => {
        let len = c.read_u32::<BigEndian>()?;
        take(&mut c, len as usize)?
      }
      _ => match enc {
        0xC0 => int_text(c.read_i16::<LittleEndian>()? as i64),
        0xD0 => int_text(c.read_i32::<LittleEndian>()? as i64),
        0xE0 => int_text(c.read_i64::<LittleEndian>()?),
        0xF0 => int_text(c.read_i24::<LittleEndian>()? as i64),
        0xFE => int_text(c.read_i8()? as i64),
        0xF1..=0xFD => int_text((enc & 0x0F) as i64 - 1),
        _ => return Err(Error::Corruption(format!("Unknown ziplist encoding: {:#04x}", enc))),
      },
    };
    entries.push(entry);
  }
  Ok(entries)
}

/// Listpack layout:
///
/// [total bytes: 4][count: 2][entry ...][0xFF]
///
/// entry = [encoding + data][backlen: 1..=5]
pub fn listpack_entries(blob: &[u8]) -> Result<Vec<Vec<u8>>> {
  let mut c = Cursor::new(blob);
  let _total = c.read_u32::<LittleEndian>()?;
  let count = c.read_u16::<LittleEndian>()?;
  let mut entries = Vec::with_capacity(count as usize);

  loop {
    let b = c.read_u8()?;
    if b == END {
      break;
    }

    let (entry, encoded_len) = if b & 0x80 == 0 {
      (int_text((b & 0x7F) as i64), 1)
    } else if b & 0xC0 == 0x80 {
      let len = (b & 0x3F) as usize;
      (take(&mut c, len)?, 1 + len)
    } else if b & 0xE0 == 0xC0 {
      let low = c.read_u8()?;
      let raw = (((b & 0x1F) as i64) << 8) | low as i64;
      let v = if raw >= 1 << 12 { raw - (1 << 13) } else { raw };
      (int_text(v), 2)
    } else if b & 0xF0 == 0xE0 {
      let low = c.read_u8()?;
      let len = (((b & 0x0F) as usize) << 8) | low as usize;
      (take(&mut c, len)?, 2 + len)
    } else {
      match b {
        0xF0 => {
          let len = c.read_u32::<LittleEndian>()? as usize;
          (take(&mut c, len)?, 5 + len)
        }
        0xF1 => (int_text(c.read_i16::<LittleEndian>()? as i64), 3),
        0xF2 => (int_text(c.read_i24::<LittleEndian>()? as i64), 4),
        0xF3 => (int_text(c.read_i32::<LittleEndian>()? as i64), 5),
        0xF4 => (int_text(c.read_i64::<LittleEndian>()?), 9),
        _ => return Err(Error::Corruption(format!("Unknown listpack encoding: {:#04x}", b))),
      }
    };

    skip(&mut c, backlen_size(encoded_len))?;
    entries.push(entry);
  }
  Ok(entries)
}

fn backlen_size(len: usize) -> usize {
  if len <= 127 {
    1
  } else if len < 16383 {
    2
  } else if len < 2097151 {
    3
  } else if len < 268435455 {
    4
  } else {
    5
  }
}

/// Intset layout:
///
/// [width: 4][count: 4][integers, little endian]
pub fn intset_members(blob: &[u8]) -> Result<Vec<Vec<u8>>> {
  let mut c = Cursor::new(blob);
  let width = c.read_u32::<LittleEndian>()?;
  let count = c.read_u32::<LittleEndian>()?;
  if (count as usize).saturating_mul(width as usize) > blob.len() {
    return Err(Error::Corruption(format!("Intset claims {} members of width {}", count, width)));
  }

  let mut members = Vec::with_capacity(count as usize);
  for _ in 0..count {
    let v = match width {
      2 => c.read_i16::<LittleEndian>()? as i64,
      4 => c.read_i32::<LittleEndian>()? as i64,
      8 => c.read_i64::<LittleEndian>()?,
      _ => return Err(Error::Corruption(format!("Unknown intset width: {}", width))),
    };
    members.push(int_text(v));
  }
  Ok(members)
}

/// Zipmap layout (pre 2.6 hashes):
///
/// [zmlen: 1]([len][key][len][free: 1][value][free bytes])... [0xFF]
pub fn zipmap_pairs(blob: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
  let mut c = Cursor::new(blob);
  let _zmlen = c.read_u8()?;
  let mut pairs = Vec::new();

  while let Some(key_len) = zipmap_len(&mut c)? {
    let key = take(&mut c, key_len)?;
    let value_len =
      zipmap_len(&mut c)?.ok_or_else(|| Error::Corruption("Zipmap ended between key and value".into()))?;
    let free = c.read_u8()? as usize;
    let value = take(&mut c, value_len)?;
    skip(&mut c, free)?;
    pairs.push((key, value));
  }
  Ok(pairs)
}

fn zipmap_len<R: Read>(reader: &mut R) -> Result<Option<usize>> {
  match reader.read_u8()? {
    END => Ok(None),
    254 => Ok(Some(reader.read_u32::<LittleEndian>()? as usize)),
    b => Ok(Some(b as usize)),
  }
}

/// Splits a flat element list into consecutive pairs.
pub fn pairs(entries: Vec<Vec<u8>>) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
  if entries.len() % 2 != 0 {
    return Err(Error::Corruption(format!(
      "Expected an even number of packed elements, got {}",
      entries.len()
    )));
  }
  let mut out = Vec::with_capacity(entries.len() / 2);
  let mut iter = entries.into_iter();
  while let (Some(a), Some(b)) = (iter.next(), iter.next()) {
    out.push((a, b));
  }
  Ok(out)
}
