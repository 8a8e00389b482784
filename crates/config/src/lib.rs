//! Shared configuration types for the tidemark segment tier.
//!
//! Kept dependency-free so every other crate in the workspace can consume it
//! without pulling anything along.

use std::path::PathBuf;

/// Block compression algorithm for time-series blocks.
///
/// The algorithm is chosen per segment file and recorded once in the file
/// header; statistics and delete blocks are always written raw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// Regions are stored as encoded, with no compression pass.
    None,
    /// LZ4 block compression with a length prefix.
    Lz4,
}

impl Compression {
    /// Single-byte code stored in the segment file header.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Compression::None => 0,
            Compression::Lz4 => 1,
        }
    }

    /// Decodes a header byte back into an algorithm, `None` if unknown.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Compression::None),
            1 => Some(Compression::Lz4),
            _ => None,
        }
    }
}

/// Configuration for one [`SegmentWriter`] instance (one output file).
///
/// [`SegmentWriter`]: ../segment/struct.SegmentWriter.html
#[derive(Debug, Clone)]
pub struct SegmentConfig {
    /// Destination path for the segment file.
    pub path: PathBuf,
    /// Row threshold for the time-series, statistics and delete buffers.
    /// A buffer reaching this many rows is flushed to a block.
    pub max_rows: usize,
    /// Compression applied to time-series block regions.
    pub compression: Compression,
    /// Page size recorded in the file header (advisory for the I/O layer).
    pub page_size: u32,
    /// Offset of the previous footer when extending a chained file,
    /// or 0 for a fresh segment.
    pub prev_footer: u64,
    /// Target false positive rate for the per-file table bloom filter.
    pub bloom_fpr: f64,
}

impl SegmentConfig {
    /// Config with defaults for everything except the target path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_rows: 4096,
            compression: Compression::Lz4,
            page_size: 4096,
            prev_footer: 0,
            bloom_fpr: 0.01,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compression_codes_round_trip() {
        for alg in [Compression::None, Compression::Lz4] {
            assert_eq!(Compression::from_code(alg.code()), Some(alg));
        }
        assert_eq!(Compression::from_code(0xff), None);
    }

    #[test]
    fn config_defaults() {
        let cfg = SegmentConfig::new("/tmp/x.seg");
        assert_eq!(cfg.max_rows, 4096);
        assert_eq!(cfg.prev_footer, 0);
        assert_eq!(cfg.compression, Compression::Lz4);
    }
}
