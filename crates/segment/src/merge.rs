//! K-way merge over row iterators.
//!
//! Sources are supplied oldest first; when several sources hold a row with
//! the same identity key, the source later in the slice wins and the older
//! duplicates are consumed without being emitted. Emitted keys strictly
//! increase, so downstream consumers (the segment writer above all) see a
//! fully deduplicated sorted stream.

use crate::error::Result;
use crate::iter::{RowInfo, RowIter};
use memtable::{RowKey, TableId};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

struct HeapEntry {
    key: RowKey,
    source: usize,
}

// BinaryHeap is a max-heap; reverse the key order so the smallest key pops
// first, and on equal keys pop the higher source index (the newer source).
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .key
            .cmp(&self.key)
            .then_with(|| self.source.cmp(&other.source))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

/// Merges a slice of row iterators into one ascending deduplicated stream.
///
/// The merger borrows the iterators; it never owns their lifetime, and
/// dropping it leaves them wherever iteration stopped.
pub struct IterMerger<'i, 'a> {
    iters: &'i mut [RowIter<'a>],
    heap: BinaryHeap<HeapEntry>,
    /// Source of the row currently exposed by `get`.
    current: Option<usize>,
    closed: bool,
}

impl<'i, 'a> IterMerger<'i, 'a> {
    /// Primes every iterator and builds the merge heap. Iterators that are
    /// empty from the start simply never contribute.
    pub fn new(iters: &'i mut [RowIter<'a>]) -> Result<Self> {
        let mut heap = BinaryHeap::with_capacity(iters.len());
        for (source, iter) in iters.iter_mut().enumerate() {
            if let Some(info) = iter.next()? {
                heap.push(HeapEntry {
                    key: info.key(),
                    source,
                });
            }
        }
        Ok(Self {
            iters,
            heap,
            current: None,
            closed: false,
        })
    }

    /// Advances to the next distinct key, returning its winning row.
    pub fn next(&mut self) -> Result<Option<&RowInfo>> {
        if self.closed {
            return Ok(None);
        }
        if let Some(cur) = self.current.take() {
            self.rearm(cur)?;
        }
        let Some(top) = self.heap.pop() else {
            return Ok(None);
        };
        // Older sources holding the exact same key lose the tie; consume
        // their duplicates unemitted.
        while self.heap.peek().map_or(false, |p| p.key == top.key) {
            if let Some(dup) = self.heap.pop() {
                self.rearm(dup.source)?;
            }
        }
        self.current = Some(top.source);
        Ok(self.iters[top.source].get())
    }

    /// The row produced by the last `next`, if any.
    pub fn get(&self) -> Option<&RowInfo> {
        self.current.and_then(|i| self.iters[i].get())
    }

    /// Skips every remaining row of `table` across all sources.
    ///
    /// Sources whose head row is past the table are untouched; the merged
    /// stream resumes at the smallest key after the table.
    pub fn skip_table(&mut self, table: TableId) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if let Some(cur) = self.current.take() {
            let in_table = self.iters[cur].get().map_or(false, |c| c.table == table);
            if in_table {
                self.iters[cur].skip_table(table)?;
                self.push_head(cur);
            } else {
                self.rearm(cur)?;
            }
        }
        let pending: Vec<HeapEntry> = self.heap.drain().collect();
        for entry in pending {
            if entry.key.table == table {
                self.iters[entry.source].skip_table(table)?;
                self.push_head(entry.source);
            } else {
                self.heap.push(entry);
            }
        }
        Ok(())
    }

    /// Releases the merge state. Safe to call more than once; a closed
    /// merger yields nothing.
    pub fn close(&mut self) {
        self.heap.clear();
        self.current = None;
        self.closed = true;
    }

    /// Advances `source` and pushes its new head, if any.
    fn rearm(&mut self, source: usize) -> Result<()> {
        if let Some(info) = self.iters[source].next()? {
            self.heap.push(HeapEntry {
                key: info.key(),
                source,
            });
        }
        Ok(())
    }

    fn push_head(&mut self, source: usize) {
        if let Some(info) = self.iters[source].get() {
            self.heap.push(HeapEntry {
                key: info.key(),
                source,
            });
        }
    }
}
