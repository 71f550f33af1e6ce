//! LZF, the compression Redis applies to long strings inside snapshots.
//!
//! A compressed stream is a sequence of chunks:
//!
//! [000LLLLL][L+1 literal bytes]            literal run (1..=32 bytes)
//! [LLLOOOOO][OOOOOOOO]                     back reference, length L+2 (L in 1..=6)
//! [111OOOOO][LLLLLLLL][OOOOOOOO]           back reference, length L+9
//!
//! The 13-bit offset `O` addresses `O + 1` bytes behind the output cursor.

use crate::error::{Error, Result};

const MAX_LITERAL: usize = 32;
const MAX_OFFSET: usize = 1 << 13;
const MAX_REF: usize = (1 << 8) + (1 << 3); // 264
const HASH_LOG: u32 = 14;

pub fn decompress(input: &[u8], expected_len: usize) -> Result<Vec<u8>> {
  // A three byte back reference is the densest chunk.
  let max_len = input.len().saturating_mul(MAX_REF.div_ceil(3));
  if expected_len > max_len {
    return Err(Error::Corruption(format!(
      "LZF declares {} bytes but {} compressed bytes expand to at most {}",
      expected_len,
      input.len(),
      max_len
    )));
  }
  let mut out = Vec::with_capacity(expected_len);
  let mut i = 0;

  while i < input.len() {
    let ctrl = input[i] as usize;
    i += 1;

    if ctrl < MAX_LITERAL {
      let run = ctrl + 1;
      let end = i + run;
      if end > input.len() {
        return Err(Error::Corruption("LZF literal run past end of input".into()));
      }
      out.extend_from_slice(&input[i..end]);
      i = end;
      continue;
    }

    let mut len = ctrl >> 5;
    if len == 7 {
      len += *input
        .get(i)
        .ok_or_else(|| Error::Corruption("LZF reference truncated".into()))? as usize;
      i += 1;
    }
    let low = *input
      .get(i)
      .ok_or_else(|| Error::Corruption("LZF reference truncated".into()))? as usize;
    i += 1;

    let distance = ((ctrl & 0x1F) << 8) + low + 1;
    if distance > out.len() {
      return Err(Error::Corruption(format!(
        "LZF back reference {} exceeds {} decoded bytes",
        distance,
        out.len()
      )));
    }

    // Copy byte by byte: the source may overlap the bytes being produced.
    let start = out.len() - distance;
    for k in 0..len + 2 {
      let b = out[start + k];
      out.push(b);
    }
  }

  if out.len() != expected_len {
    return Err(Error::Corruption(format!(
      "LZF length mismatch: expected {}, got {}",
      expected_len,
      out.len()
    )));
  }
  Ok(out)
}

/// Compresses `input`. Returns `None` when the result would not be smaller.
pub fn compress(input: &[u8]) -> Option<Vec<u8>> {
  let n = input.len();
  if n < 4 {
    return None;
  }

  let mut out = Vec::with_capacity(n);
  // Last position (+1) at which each 3-byte hash was seen; 0 = never.
  let mut table = vec![0usize; 1 << HASH_LOG];
  let mut literal_start = 0;
  let mut i = 0;

  while i + 2 < n {
    let h = hash(input[i], input[i + 1], input[i + 2]);
    let candidate = table[h];
    table[h] = i + 1;

    if candidate != 0 {
      let r = candidate - 1;
      let offset = i - r - 1;
      if offset < MAX_OFFSET && input[r..r + 3] == input[i..i + 3] {
        let max_len = MAX_REF.min(n - i);
        let mut len = 3;
        while len < max_len && input[r + len] == input[i + len] {
          len += 1;
        }

        push_literals(&mut out, &input[literal_start..i]);

        let l = len - 2;
        if l < 7 {
          out.push(((l as u8) << 5) | (offset >> 8) as u8);
        } else {
          out.push((7 << 5) | (offset >> 8) as u8);
          out.push((l - 7) as u8);
        }
        out.push(offset as u8);

        i += len;
        literal_start = i;
        if out.len() >= n {
          return None;
        }
        continue;
      }
    }
    i += 1;
  }

  push_literals(&mut out, &input[literal_start..]);
  if out.len() < n { Some(out) } else { None }
}

fn push_literals(out: &mut Vec<u8>, literals: &[u8]) {
  for chunk in literals.chunks(MAX_LITERAL) {
    out.push((chunk.len() - 1) as u8);
    out.extend_from_slice(chunk);
  }
}

fn hash(a: u8, b: u8, c: u8) -> usize {
  let v = ((a as u32) << 16) | ((b as u32) << 8) | c as u32;
  (v.wrapping_mul(2654435761) >> (32 - HASH_LOG)) as usize
}
