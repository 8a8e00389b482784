//! Region codec for time-series blocks.
//!
//! A block is encoded as four regions, written in descending region index
//! order. Regions 3 and 2 carry the key columns so a reader can recover
//! every row key from the leading `key_size` bytes alone:
//!
//! ```text
//! region 3: prelude (28 B, never compressed)
//!           | ncols u16 | column kinds u8 x ncols | sub-id column
//! region 2: timestamp column | version column
//! region 1: fixed-width value columns, in schema order
//! region 0: variable-width value columns (end offsets, then payload)
//! ```
//!
//! The prelude carries the row count, schema version, compression code and
//! the four compressed region lengths. Empty regions are not written and
//! record length 0. All columns are little-endian 8-byte words except the
//! variable-width end offsets (4-byte words).

use crate::block::{ColumnData, RowBlock};
use crate::error::{Result, SegmentError};
use byteorder::{LittleEndian, ReadBytesExt};
use config::Compression;
use memtable::ColumnKind;
use std::io::Cursor;

/// Uncompressed leading bytes of region 3: rows(4) + schema_version(4) +
/// compression(1) + pad(3) + four region lengths(16).
pub const PRELUDE_LEN: usize = 28;

/// Reusable encode scratch space. Owned by the writer and passed into every
/// flush so block encoding allocates only on growth.
#[derive(Debug, Default)]
pub struct ScratchBuffers {
    raw: [Vec<u8>; 4],
    out: Vec<u8>,
}

impl ScratchBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// The assembled block bytes from the last [`encode_block`] call.
    pub fn encoded(&self) -> &[u8] {
        &self.out
    }
}

/// Encodes `block` into `scratch.out`, returning the key-region size
/// (prelude plus regions 3 and 2).
pub fn encode_block(block: &RowBlock, alg: Compression, scratch: &mut ScratchBuffers) -> u32 {
    let ScratchBuffers { raw, out } = scratch;
    let rows = block.len();
    for buf in raw.iter_mut() {
        buf.clear();
    }

    // Region 3: column kind table plus the sub-id key column.
    let kinds = &block.schema().columns;
    let r3 = &mut raw[3];
    r3.extend_from_slice(&(kinds.len() as u16).to_le_bytes());
    for kind in kinds {
        r3.push(kind.code());
    }
    for v in block.sub_ids() {
        r3.extend_from_slice(&v.to_le_bytes());
    }

    // Region 2: remaining key columns.
    let r2 = &mut raw[2];
    for v in block.timestamps() {
        r2.extend_from_slice(&v.to_le_bytes());
    }
    for v in block.versions() {
        r2.extend_from_slice(&v.to_le_bytes());
    }

    // Regions 1 and 0: value columns split by width class.
    for col in block.columns() {
        match col {
            ColumnData::I64(vals) => {
                let r1 = &mut raw[1];
                for v in vals {
                    r1.extend_from_slice(&v.to_le_bytes());
                }
            }
            ColumnData::F64(vals) => {
                let r1 = &mut raw[1];
                for v in vals {
                    r1.extend_from_slice(&v.to_le_bytes());
                }
            }
            ColumnData::Bytes { offsets, data } => {
                let r0 = &mut raw[0];
                for off in offsets {
                    r0.extend_from_slice(&off.to_le_bytes());
                }
                r0.extend_from_slice(data);
            }
        }
    }

    // Region buffers stay in the pool; only the LZ4 path produces a
    // transient compressed copy.
    let mut enc: [Vec<u8>; 4] = Default::default();
    let mut lens = [0u32; 4];
    for i in 0..4 {
        if raw[i].is_empty() {
            continue;
        }
        lens[i] = match alg {
            Compression::None => raw[i].len() as u32,
            Compression::Lz4 => {
                enc[i] = lz4_flex::compress_prepend_size(&raw[i]);
                enc[i].len() as u32
            }
        };
    }

    out.clear();
    out.extend_from_slice(&(rows as u32).to_le_bytes());
    out.extend_from_slice(&block.schema().version.to_le_bytes());
    out.push(alg.code());
    out.extend_from_slice(&[0u8; 3]);
    for len in &lens {
        out.extend_from_slice(&len.to_le_bytes());
    }
    for region in [3usize, 2, 1, 0] {
        match alg {
            Compression::None => out.extend_from_slice(&raw[region]),
            Compression::Lz4 => out.extend_from_slice(&enc[region]),
        }
    }

    PRELUDE_LEN as u32 + lens[3] + lens[2]
}

/// Decoded key columns of a block.
#[derive(Debug)]
pub struct BlockKeys {
    pub schema_version: u32,
    pub column_kinds: Vec<ColumnKind>,
    pub sub_ids: Vec<u64>,
    pub timestamps: Vec<i64>,
    pub versions: Vec<u64>,
}

/// Fully decoded block: key columns plus value columns in schema order.
#[derive(Debug)]
pub struct BlockRows {
    pub keys: BlockKeys,
    pub columns: Vec<ColumnData>,
}

impl BlockRows {
    pub fn len(&self) -> usize {
        self.keys.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.timestamps.is_empty()
    }
}

struct Prelude {
    rows: usize,
    schema_version: u32,
    alg: Compression,
    lens: [u32; 4],
}

fn decode_prelude(buf: &[u8]) -> Result<Prelude> {
    if buf.len() < PRELUDE_LEN {
        return Err(SegmentError::corrupt("block shorter than prelude"));
    }
    let mut rdr = Cursor::new(buf);
    let rows = rdr
        .read_u32::<LittleEndian>()
        .map_err(|_| SegmentError::corrupt("truncated block prelude"))? as usize;
    let schema_version = rdr
        .read_u32::<LittleEndian>()
        .map_err(|_| SegmentError::corrupt("truncated block prelude"))?;
    let code = buf[8];
    let alg = Compression::from_code(code)
        .ok_or_else(|| SegmentError::corrupt(format!("unknown compression code {code}")))?;
    let mut lens = [0u32; 4];
    for (i, len) in lens.iter_mut().enumerate() {
        let at = 12 + i * 4;
        *len = u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]);
    }
    if rows == 0 {
        return Err(SegmentError::corrupt("block with zero rows"));
    }
    Ok(Prelude {
        rows,
        schema_version,
        alg,
        lens,
    })
}

fn decompress(alg: Compression, buf: &[u8]) -> Result<Vec<u8>> {
    // An empty region was never written, so there is no size prefix to read.
    if buf.is_empty() {
        return Ok(Vec::new());
    }
    match alg {
        Compression::None => Ok(buf.to_vec()),
        Compression::Lz4 => lz4_flex::decompress_size_prepended(buf)
            .map_err(|e| SegmentError::corrupt(format!("lz4 region: {e}"))),
    }
}

fn decode_key_regions(buf: &[u8], p: &Prelude) -> Result<BlockKeys> {
    let len3 = p.lens[3] as usize;
    let len2 = p.lens[2] as usize;
    if buf.len() < PRELUDE_LEN + len3 + len2 {
        return Err(SegmentError::corrupt("block shorter than key regions"));
    }
    let r3 = decompress(p.alg, &buf[PRELUDE_LEN..PRELUDE_LEN + len3])?;
    let r2 = decompress(p.alg, &buf[PRELUDE_LEN + len3..PRELUDE_LEN + len3 + len2])?;

    let mut rdr = Cursor::new(r3.as_slice());
    let ncols = rdr
        .read_u16::<LittleEndian>()
        .map_err(|_| SegmentError::corrupt("truncated kind table"))? as usize;
    let mut column_kinds = Vec::with_capacity(ncols);
    for _ in 0..ncols {
        let code = rdr
            .read_u8()
            .map_err(|_| SegmentError::corrupt("truncated kind table"))?;
        column_kinds.push(
            ColumnKind::from_code(code)
                .ok_or_else(|| SegmentError::corrupt(format!("unknown column kind {code}")))?,
        );
    }
    if r3.len() != 2 + ncols + p.rows * 8 {
        return Err(SegmentError::corrupt("key region 3 size mismatch"));
    }
    let mut sub_ids = Vec::with_capacity(p.rows);
    for _ in 0..p.rows {
        sub_ids.push(
            rdr.read_u64::<LittleEndian>()
                .map_err(|_| SegmentError::corrupt("truncated sub-id column"))?,
        );
    }

    if r2.len() != p.rows * 16 {
        return Err(SegmentError::corrupt("key region 2 size mismatch"));
    }
    let mut rdr = Cursor::new(r2.as_slice());
    let mut timestamps = Vec::with_capacity(p.rows);
    for _ in 0..p.rows {
        timestamps.push(
            rdr.read_i64::<LittleEndian>()
                .map_err(|_| SegmentError::corrupt("truncated timestamp column"))?,
        );
    }
    let mut versions = Vec::with_capacity(p.rows);
    for _ in 0..p.rows {
        versions.push(
            rdr.read_u64::<LittleEndian>()
                .map_err(|_| SegmentError::corrupt("truncated version column"))?,
        );
    }

    Ok(BlockKeys {
        schema_version: p.schema_version,
        column_kinds,
        sub_ids,
        timestamps,
        versions,
    })
}

/// Decodes only the key columns from the leading `key_size` bytes of a
/// block (or a full block buffer).
pub fn decode_block_keys(buf: &[u8]) -> Result<BlockKeys> {
    let p = decode_prelude(buf)?;
    decode_key_regions(buf, &p)
}

/// Decodes a full block buffer.
pub fn decode_block(buf: &[u8]) -> Result<BlockRows> {
    let p = decode_prelude(buf)?;
    let total = PRELUDE_LEN + p.lens.iter().map(|&l| l as usize).sum::<usize>();
    if buf.len() != total {
        return Err(SegmentError::corrupt("block size mismatch"));
    }
    let keys = decode_key_regions(buf, &p)?;

    let off1 = PRELUDE_LEN + p.lens[3] as usize + p.lens[2] as usize;
    let off0 = off1 + p.lens[1] as usize;
    let r1 = decompress(p.alg, &buf[off1..off1 + p.lens[1] as usize])?;
    let r0 = decompress(p.alg, &buf[off0..off0 + p.lens[0] as usize])?;

    let nfixed = keys
        .column_kinds
        .iter()
        .filter(|k| !matches!(k, ColumnKind::Bytes))
        .count();
    if r1.len() != nfixed * p.rows * 8 {
        return Err(SegmentError::corrupt("value region 1 size mismatch"));
    }

    let mut fixed = Cursor::new(r1.as_slice());
    let mut var = Cursor::new(r0.as_slice());
    let mut columns = Vec::with_capacity(keys.column_kinds.len());
    for kind in &keys.column_kinds {
        columns.push(match kind {
            ColumnKind::I64 => {
                let mut vals = Vec::with_capacity(p.rows);
                for _ in 0..p.rows {
                    vals.push(
                        fixed
                            .read_i64::<LittleEndian>()
                            .map_err(|_| SegmentError::corrupt("truncated value column"))?,
                    );
                }
                ColumnData::I64(vals)
            }
            ColumnKind::F64 => {
                let mut vals = Vec::with_capacity(p.rows);
                for _ in 0..p.rows {
                    vals.push(
                        fixed
                            .read_f64::<LittleEndian>()
                            .map_err(|_| SegmentError::corrupt("truncated value column"))?,
                    );
                }
                ColumnData::F64(vals)
            }
            ColumnKind::Bytes => {
                let mut offsets = Vec::with_capacity(p.rows);
                for _ in 0..p.rows {
                    offsets.push(
                        var.read_u32::<LittleEndian>()
                            .map_err(|_| SegmentError::corrupt("truncated offset column"))?,
                    );
                }
                let data_len = *offsets.last().unwrap_or(&0) as usize;
                let start = var.position() as usize;
                if r0.len() < start + data_len {
                    return Err(SegmentError::corrupt("truncated bytes payload"));
                }
                let data = r0[start..start + data_len].to_vec();
                var.set_position((start + data_len) as u64);
                ColumnData::Bytes { offsets, data }
            }
        });
    }
    if var.position() as usize != r0.len() {
        return Err(SegmentError::corrupt("value region 0 size mismatch"));
    }

    Ok(BlockRows { keys, columns })
}
