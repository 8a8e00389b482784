//! # Segment — sorted time-series segment files
//!
//! Immutable, on-disk storage tier of the tidemark engine. A segment holds
//! rows for many tables, sorted by `(group_id, sub_id, timestamp, version)`,
//! written once and then only read or compacted away.
//!
//! ## File layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ HEADER (64 B): magic "TSG1" | version | compression | page   │
//! ├──────────────────────────────────────────────────────────────┤
//! │ TIME-SERIES BLOCKS                                           │
//! │   four regions per block, keys separated from values so      │
//! │   key-only scans read a prefix of the block                  │
//! ├──────────────────────────────────────────────────────────────┤
//! │ STATISTICS BLOCKS (per-table time/version spans)             │
//! ├──────────────────────────────────────────────────────────────┤
//! │ DELETE BLOCKS (tombstone ranges)                             │
//! ├──────────────────────────────────────────────────────────────┤
//! │ BLOOM FILTER (table membership)                              │
//! ├──────────────────────────────────────────────────────────────┤
//! │ BLOCK / STATS / DELETE DIRECTORIES (fixed-size entries)      │
//! ├──────────────────────────────────────────────────────────────┤
//! │ FOOTER (96 B): prev footer | 4 x (offset, size) | "TFT1"     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian. The footer is the sole entry point; an
//! interrupted write leaves no valid footer and the file is rejected whole.
//!
//! Besides the writer and reader, this crate provides [`RowIter`], a
//! uniform forward iterator over segments, sealed row files and memtables,
//! and [`IterMerger`], the k-way merge used by compaction.

mod block;
mod codec;
mod error;
mod format;
mod fsio;
mod iter;
mod merge;
mod reader;
mod writer;

pub use block::{BlockSummary, ColumnData, DeleteEntry, StatsEntry};
pub use codec::{BlockKeys, BlockRows, ScratchBuffers};
pub use error::{Result, SegmentError};
pub use format::{
    BlockDirEntry, BlockRange, FilePtr, Footer, SpanDirEntry, BLOCK_ENTRY_LEN, FOOTER_LEN,
    FOOTER_MAGIC, HEADER_LEN, SEGMENT_MAGIC, SPAN_ENTRY_LEN,
};
pub use iter::{RowInfo, RowIter};
pub use merge::IterMerger;
pub use reader::SegmentReader;
pub use writer::SegmentWriter;

#[cfg(test)]
mod tests;
