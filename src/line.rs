//! Logical line — a width-independent sequence of attributed cells.
//!
//! The unit of scrollback. Either reflowable (and possibly soft-wrapped at
//! its tail) or fixed at a specific capture width and never reflowed.

use smallvec::SmallVec;

use crate::cell::Cell;

/// Cells fitting inline before a [`LogicalLine`] spills to the heap. Chosen
/// to cover a full 80-column row without allocating.
const INLINE_CELLS: usize = 80;

/// A width-independent sequence of cells, the unit of scrollback.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalLine {
    cells: SmallVec<[Cell; INLINE_CELLS]>,
    /// True when the producer filled the right margin and continued on the
    /// next physical row without a line feed. Reflowed on resize.
    pub soft_wrapped: bool,
    /// 0 when reflowable; otherwise the width this line was captured at
    /// (alt-screen/TUI captures). `soft_wrapped` and `fixed_width` are
    /// mutually exclusive — see [`LogicalLine::invariant_holds`].
    pub fixed_width: u16,
}

impl LogicalLine {
    /// An empty, reflowable line.
    pub fn new() -> Self {
        Self { cells: SmallVec::new(), soft_wrapped: false, fixed_width: 0 }
    }

    /// A line captured verbatim at a fixed width (e.g. an alt-screen row).
    pub fn fixed(cells: impl IntoIterator<Item = Cell>, width: u16) -> Self {
        Self { cells: cells.into_iter().collect(), soft_wrapped: false, fixed_width: width }
    }

    /// Build a reflowable line from existing cells.
    pub fn reflowable(cells: impl IntoIterator<Item = Cell>, soft_wrapped: bool) -> Self {
        Self { cells: cells.into_iter().collect(), soft_wrapped, fixed_width: 0 }
    }

    /// Number of cells stored.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the line holds no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Read-only cell access.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Append a cell with no width constraint.
    pub fn append_cell(&mut self, cell: Cell) {
        self.cells.push(cell);
    }

    /// Invariant from §4.2: `soft_wrapped` implies `fixed_width == 0`.
    pub fn invariant_holds(&self) -> bool {
        !self.soft_wrapped || self.fixed_width == 0
    }

    /// Index one past the last non-blank cell — the trimmed length used
    /// for serialization. A cell counts as blank when it is uninitialized
    /// or holds a plain space with no background paint and no attributes.
    pub fn trimmed_length(&self) -> usize {
        for (i, cell) in self.cells.iter().enumerate().rev() {
            if !is_trim_blank(cell) {
                return i + 1;
            }
        }
        0
    }

    /// Split at `col`: cells `[0, col)` stay in `self`, `[col, len)` move
    /// into the returned tail. Used by reflow when a line wider than the
    /// new width must be broken. The head keeps `fixed_width`/soft-wrap
    /// metadata; the caller is responsible for setting the tail's
    /// `soft_wrapped` flag (the split point is an imposed wrap, not an
    /// original one).
    pub fn split_at(&mut self, col: usize) -> LogicalLine {
        let col = col.min(self.cells.len());
        let tail_cells: SmallVec<[Cell; INLINE_CELLS]> = self.cells.drain(col..).collect();
        LogicalLine { cells: tail_cells, soft_wrapped: false, fixed_width: 0 }
    }

    /// Concatenate `other` onto the end of `self`, consuming it. Used by
    /// reflow when two soft-wrapped lines merge after widening —
    /// `soft_wrapped` transfers from the tail (`other`), since the merged
    /// line's wrap status now reflects whether the *combined* line fills
    /// the margin at its tail.
    pub fn concat(&mut self, other: LogicalLine) {
        self.cells.extend(other.cells);
        self.soft_wrapped = other.soft_wrapped;
    }
}

impl Default for LogicalLine {
    fn default() -> Self {
        Self::new()
    }
}

fn is_trim_blank(cell: &Cell) -> bool {
    cell.is_uninitialized() || (cell.contents() == ' ' && !has_visible_paint(cell))
}

fn has_visible_paint(cell: &Cell) -> bool {
    !matches!(cell.bg, crate::cell::Color::Default) || !cell.attr.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{Color, SgrState};

    fn printable_line(s: &str) -> LogicalLine {
        let sgr = SgrState::reset();
        LogicalLine::reflowable(s.chars().map(|c| Cell::printable(c, &sgr)), false)
    }

    #[test]
    fn trimmed_length_ignores_trailing_blanks() {
        let mut line = printable_line("hello");
        line.append_cell(Cell::default());
        line.append_cell(Cell::default());
        assert_eq!(line.trimmed_length(), 5);
    }

    #[test]
    fn trimmed_length_keeps_painted_trailing_blank() {
        let mut line = printable_line("hi");
        let painted_blank = Cell { rune: ' ', bg: Color::Standard(1), ..Cell::default() };
        line.append_cell(painted_blank);
        assert_eq!(line.trimmed_length(), 3);
    }

    #[test]
    fn split_at_moves_tail_cells() {
        let mut line = printable_line("0123456789");
        let tail = line.split_at(6);
        assert_eq!(line.len(), 6);
        assert_eq!(tail.len(), 4);
        assert_eq!(tail.cells()[0].rune, '6');
    }

    #[test]
    fn concat_transfers_soft_wrap_from_tail() {
        let mut head = printable_line("abc");
        head.soft_wrapped = true;
        let mut tail = printable_line("def");
        tail.soft_wrapped = false;
        head.concat(tail);
        assert!(!head.soft_wrapped);
        assert_eq!(head.len(), 6);
    }

    #[test]
    fn invariant_rejects_soft_wrap_with_fixed_width() {
        let mut line = printable_line("x");
        line.soft_wrapped = true;
        assert!(line.invariant_holds());
        line.fixed_width = 80;
        assert!(!line.invariant_holds());
    }
}
