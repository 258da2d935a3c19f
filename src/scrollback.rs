//! In-memory scrollback window, paging to/from disk history.
//!
//! Holds a bounded, contiguous range `[min, max)` of committed
//! [`LogicalLine`]s, where `max` always equals the live edge — the index
//! the next committed line will receive. Lines older than the window's
//! capacity are evicted to disk (if a [`DiskHistory`] is attached) rather
//! than dropped.

use std::collections::VecDeque;

use crate::error::{Error, Result};
use crate::history::DiskHistory;
use crate::line::LogicalLine;

/// A line's position in the unbounded, ever-growing commit sequence.
pub type GlobalLineIdx = u64;

/// Bounded window over committed scrollback, with optional disk backing.
pub struct ScrollbackWindow {
    lines: VecDeque<LogicalLine>,
    /// `GlobalLineIdx` of `lines[0]`.
    min: GlobalLineIdx,
    /// One past the most recently committed line — the live edge.
    max: GlobalLineIdx,
    /// Maximum resident lines before the oldest is evicted.
    capacity: usize,
    /// How many lines beyond the current viewport's far edge to keep
    /// paged in proactively, in each direction.
    margin_above: usize,
    margin_below: usize,
    disk: Option<DiskHistory>,
}

impl ScrollbackWindow {
    /// Build a window with the given in-memory capacity (lines) and
    /// optional disk backing. `margin` controls proactive paging on either
    /// side of a [`ScrollbackWindow::page_around`] call.
    pub fn new(capacity: usize, margin_above: usize, margin_below: usize, disk: Option<DiskHistory>) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity.min(4096)),
            min: 0,
            max: 0,
            capacity: capacity.max(1),
            margin_above,
            margin_below,
            disk,
        }
    }

    /// The live edge: index the next committed line will receive.
    pub fn live_edge(&self) -> GlobalLineIdx {
        self.max
    }

    /// Oldest index still resident in memory (not necessarily the oldest
    /// index that exists at all — older lines may still be on disk).
    pub fn resident_min(&self) -> GlobalLineIdx {
        self.min
    }

    /// Total number of lines ever committed, resident or not.
    pub fn total_committed(&self) -> u64 {
        self.max
    }

    /// Commit a new line at the live edge, evicting the oldest resident
    /// line (flushing it to disk) if the window is at capacity.
    pub fn commit(&mut self, line: LogicalLine) -> GlobalLineIdx {
        let idx = self.max;
        self.lines.push_back(line);
        self.max += 1;

        if self.lines.len() > self.capacity {
            self.evict_oldest();
        }
        idx
    }

    fn evict_oldest(&mut self) {
        if let Some(line) = self.lines.pop_front() {
            let idx = self.min;
            self.min += 1;
            if let Some(disk) = self.disk.as_mut() {
                if let Err(e) = disk.append(idx, &line, false) {
                    log::warn!("failed to flush evicted scrollback line {idx} to disk: {e}");
                }
            }
        }
    }

    /// Fetch a single line by global index, paging in from disk if needed.
    pub fn get(&mut self, idx: GlobalLineIdx) -> Result<LogicalLine> {
        if idx >= self.max {
            return Err(Error::PagingMiss(idx));
        }
        if idx >= self.min {
            let offset = (idx - self.min) as usize;
            return self
                .lines
                .get(offset)
                .cloned()
                .ok_or(Error::PagingMiss(idx));
        }
        match self.disk.as_mut() {
            Some(disk) => disk.read(idx),
            None => Err(Error::PagingMiss(idx)),
        }
    }

    /// Proactively page disk lines into memory around `center`, pulling in
    /// `margin_above`/`margin_below` lines beyond it. No-op if disk is
    /// disabled or `center` is already within the resident window.
    ///
    /// This only ever grows the resident window at its head (older side);
    /// the live edge is always resident by construction, so there's
    /// nothing to page in below it.
    pub fn page_around(&mut self, center: GlobalLineIdx) -> Result<()> {
        let Some(disk) = self.disk.as_mut() else { return Ok(()) };
        let want_min = center.saturating_sub(self.margin_above as u64);
        if want_min >= self.min {
            return Ok(());
        }
        let fetched = disk.range(want_min, self.min)?;
        for (idx, line) in fetched.into_iter().rev() {
            if idx + 1 == self.min {
                self.lines.push_front(line);
                self.min = idx;
            }
        }
        Ok(())
    }

    /// Configured below-viewport paging margin, for callers computing how
    /// far ahead to request.
    pub fn margin_below(&self) -> usize {
        self.margin_below
    }

    /// Path to the backing disk history file, if any.
    pub fn disk_path(&self) -> Option<&std::path::Path> {
        self.disk.as_ref().map(DiskHistory::path)
    }

    /// Discard all scrollback history (`ED 3`, "erase saved lines"). The
    /// live edge is unchanged — only backlog is dropped. Disk history is
    /// detached rather than truncated in place, since `DiskHistory` is
    /// append-only; a caller that wants disk history to continue should
    /// attach a fresh one afterward.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.min = self.max;
        self.disk = None;
    }

    /// Re-wrap only the paragraphs that intersect (or are about to
    /// intersect) the visible window at the new width: the last
    /// `viewport_rows + margin_above + margin_below` resident lines,
    /// walked back to the nearest paragraph boundary so a paragraph is
    /// never split mid-reflow. This is `O(|paragraphs near the live
    /// edge| * new_cols)`, not `O(|resident history|)` — lines further
    /// back (and anything already evicted to disk) are left at their old
    /// width and reflowed the same way, lazily, the next time a resize
    /// brings them within range of the window.
    pub fn reflow(&mut self, new_cols: u16, viewport_rows: usize) {
        let window = viewport_rows.saturating_add(self.margin_above).saturating_add(self.margin_below).max(1);
        let mut split_at = self.lines.len().saturating_sub(window);
        while split_at > 0 && self.lines[split_at - 1].soft_wrapped {
            split_at -= 1;
        }

        let tail: Vec<LogicalLine> = self.lines.drain(split_at..).collect();

        let mut paragraphs: Vec<Vec<crate::cell::Cell>> = Vec::new();
        let mut current: Vec<crate::cell::Cell> = Vec::new();
        for line in tail {
            let was_wrapped = line.soft_wrapped;
            current.extend_from_slice(line.cells());
            if !was_wrapped {
                paragraphs.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            paragraphs.push(current);
        }

        let new_cols = new_cols.max(1) as usize;
        for paragraph in paragraphs {
            let mut chunk = paragraph;
            if chunk.is_empty() {
                self.lines.push_back(LogicalLine::new());
                continue;
            }
            while !chunk.is_empty() {
                let take = chunk.len().min(new_cols);
                let rest = chunk.split_off(take);
                let is_last = rest.is_empty();
                self.lines.push_back(LogicalLine::reflowable(chunk, !is_last));
                chunk = rest;
            }
        }

        self.max = self.min + self.lines.len() as u64;
    }
}
