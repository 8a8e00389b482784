//! # Engine - tidemark segment orchestration
//!
//! Ties the [`memtable`], [`rowfile`] and [`segment`] crates together into
//! the write-side workflows of the storage tier:
//!
//! ```text
//! Memtable ────── flush_memtable ──────┐
//!                                      │
//! Row file ────── ingest_rowfile ──────┼──> sealed segment file
//!                                      │
//! Segments ─┐                          │
//! Memtable ─┴──── compact (k-way) ─────┘
//! ```
//!
//! | Module      | Purpose                                              |
//! |-------------|------------------------------------------------------|
//! | [`flush`]   | memtable flush and row-file ingestion                |
//! | [`compact`] | k-way segment compaction with table dropping         |
//!
//! Rows inside a memtable or sealed row file are already in ascending key
//! order, so both flush paths satisfy the segment writer's per-table
//! timestamp contract by construction. Compaction relies on the merger's
//! strict global ordering for the same guarantee.

mod compact;
mod flush;

pub use compact::compact;
pub use flush::{flush_memtable, ingest_rowfile};

#[cfg(test)]
mod tests;
