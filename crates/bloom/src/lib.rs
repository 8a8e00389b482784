//! Bloom filter over table ids, embedded in every sealed segment file.
//!
//! A segment records each table that contributed rows or delete ranges. At
//! read time a negative [`TableBloom::may_contain`] means the table is
//! definitely absent from the file, so the whole segment can be skipped
//! without touching its directories.
//!
//! No false negatives; false positives bounded by the configured rate.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Cursor};

/// Bloom filter keyed by `(group_id, sub_id)` table ids.
///
/// Backed by a vector of `u64` words. Bit positions come from double
/// hashing: `h(i) = h1 + i * h2 (mod nbits)` with `h1`, `h2` two FNV-1a
/// hashes over the 16-byte little-endian encoding of the table id.
pub struct TableBloom {
    words: Vec<u64>,
    nbits: u64,
    nhashes: u32,
}

/// Serialized filters above this size are rejected as corrupt.
const MAX_WORDS: usize = 16 * 1024 * 1024;

impl TableBloom {
    /// Sizes the filter for `expected_tables` entries at `fpr` target
    /// false positive rate. `expected_tables` of 0 is treated as 1.
    #[must_use]
    pub fn new(expected_tables: usize, fpr: f64) -> Self {
        let n = expected_tables.max(1) as f64;
        let p = fpr.clamp(1e-6, 0.5);
        let nbits = ((-n * p.ln() / std::f64::consts::LN_2.powi(2)).ceil() as u64).max(64);
        let nhashes = (((nbits as f64 / n) * std::f64::consts::LN_2).ceil() as u32).clamp(1, 16);
        let nwords = nbits.div_ceil(64) as usize;
        Self {
            words: vec![0; nwords],
            nbits,
            nhashes,
        }
    }

    /// Records a table id in the filter.
    pub fn insert(&mut self, group_id: u64, sub_id: u64) {
        let (h1, h2) = hash_table_id(group_id, sub_id);
        for i in 0..self.nhashes {
            let bit = h1.wrapping_add((i as u64).wrapping_mul(h2)) % self.nbits;
            self.words[(bit / 64) as usize] |= 1u64 << (bit % 64);
        }
    }

    /// `false` means the table definitely contributed nothing to the file.
    #[must_use]
    pub fn may_contain(&self, group_id: u64, sub_id: u64) -> bool {
        let (h1, h2) = hash_table_id(group_id, sub_id);
        for i in 0..self.nhashes {
            let bit = h1.wrapping_add((i as u64).wrapping_mul(h2)) % self.nbits;
            if self.words[(bit / 64) as usize] & (1u64 << (bit % 64)) == 0 {
                return false;
            }
        }
        true
    }

    /// Encoded size in bytes: `nbits(u64) + nhashes(u32) + nwords(u32) + words`.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        8 + 4 + 4 + self.words.len() * 8
    }

    /// Appends the wire encoding (all little-endian) to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.reserve(self.encoded_len());
        out.extend_from_slice(&self.nbits.to_le_bytes());
        out.extend_from_slice(&self.nhashes.to_le_bytes());
        out.extend_from_slice(&(self.words.len() as u32).to_le_bytes());
        for w in &self.words {
            out.extend_from_slice(&w.to_le_bytes());
        }
    }

    /// Decodes a filter previously produced by [`encode_into`].
    ///
    /// [`encode_into`]: TableBloom::encode_into
    pub fn decode(buf: &[u8]) -> io::Result<Self> {
        let mut rdr = Cursor::new(buf);
        let nbits = rdr.read_u64::<LittleEndian>()?;
        let nhashes = rdr.read_u32::<LittleEndian>()?;
        let nwords = rdr.read_u32::<LittleEndian>()? as usize;
        if nbits == 0 || nhashes == 0 || nwords > MAX_WORDS || nbits.div_ceil(64) as usize != nwords
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "bloom filter header out of range",
            ));
        }
        let mut words = Vec::with_capacity(nwords);
        for _ in 0..nwords {
            words.push(rdr.read_u64::<LittleEndian>()?);
        }
        Ok(Self {
            words,
            nbits,
            nhashes,
        })
    }
}

impl std::fmt::Debug for TableBloom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableBloom")
            .field("nbits", &self.nbits)
            .field("nhashes", &self.nhashes)
            .finish()
    }
}

/// Two FNV-1a hashes with distinct bases over the LE table-id encoding.
fn hash_table_id(group_id: u64, sub_id: u64) -> (u64, u64) {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&group_id.to_le_bytes());
    key[8..].copy_from_slice(&sub_id.to_le_bytes());
    (fnv1a(&key, 0xcbf2_9ce4_8422_2325), fnv1a(&key, 0x6c62_272e_07bb_0142))
}

fn fnv1a(data: &[u8], basis: u64) -> u64 {
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut h = basis;
    for &b in data {
        h ^= b as u64;
        h = h.wrapping_mul(PRIME);
    }
    h
}

#[cfg(test)]
mod tests;
