//! Cell & Color model.
//!
//! A [`Cell`] is a single grid position. Colors are never pre-baked to a
//! concrete RGB value here — `Color::Default` is a semantic marker the
//! renderer resolves against its own palette.

use serde::{Deserialize, Serialize};

/// A terminal color, tagged by how it should be resolved at render time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    /// Renderer-resolved default foreground/background.
    Default,
    /// One of the 16 standard ANSI colors (0..=15).
    Standard(u8),
    /// An indexed 256-color palette entry.
    Palette256(u8),
    /// A direct 24-bit color.
    Rgb(u8, u8, u8),
}

impl Default for Color {
    fn default() -> Self {
        Color::Default
    }
}

bitflags::bitflags! {
    /// Bit set of SGR visual attributes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AttrSet: u16 {
        /// SGR 1.
        const BOLD = 1 << 0;
        /// SGR 2.
        const DIM = 1 << 1;
        /// SGR 3.
        const ITALIC = 1 << 2;
        /// SGR 4.
        const UNDERLINE = 1 << 3;
        /// SGR 5.
        const BLINK = 1 << 4;
        /// SGR 7. A render-time foreground/background swap, not a color edit.
        const REVERSE = 1 << 5;
        /// SGR 8.
        const HIDDEN = 1 << 6;
        /// SGR 9.
        const STRIKETHROUGH = 1 << 7;
    }
}

impl Default for AttrSet {
    fn default() -> Self {
        AttrSet::empty()
    }
}

/// Current `{fg, bg, attr}` applied to every newly written cell.
///
/// Reset to all-default on `SGR 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SgrState {
    /// Foreground color.
    pub fg: Color,
    /// Background color.
    pub bg: Color,
    /// Active attribute bits.
    pub attr: AttrSet,
}

impl SgrState {
    /// The post-`SGR 0` state.
    pub fn reset() -> Self {
        Self::default()
    }
}

/// A single grid position.
///
/// `rune = '\0'` means "uninitialized" — consumers must treat it as a
/// space; [`Cell::contents`] does this coercion for callers that want a
/// printable character without special-casing the sentinel themselves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    /// The codepoint occupying this cell, or `'\0'` if never written.
    pub rune: char,
    /// Foreground color.
    pub fg: Color,
    /// Background color.
    pub bg: Color,
    /// Active attribute bits.
    pub attr: AttrSet,
    /// Set when this cell is the last column of a row that was filled by
    /// autowrap (the producer continued onto the next row without a line
    /// feed). Carried per-cell so `DisplayBuffer` can mirror it onto the
    /// physical row without re-deriving it from the logical line.
    pub wrapped: bool,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            rune: '\0',
            fg: Color::Default,
            bg: Color::Default,
            attr: AttrSet::empty(),
            wrapped: false,
        }
    }
}

impl Cell {
    /// A blank cell painted with `sgr`'s *background*, per the erase
    /// invariant: erases always paint with the background in effect at the
    /// erase instant, including `Color::Default`.
    pub fn blank(sgr: &SgrState) -> Self {
        Self {
            rune: ' ',
            fg: Color::Default,
            bg: sgr.bg,
            attr: AttrSet::empty(),
            wrapped: false,
        }
    }

    /// Construct a cell for a printable rune, carrying the given SGR state.
    pub fn printable(rune: char, sgr: &SgrState) -> Self {
        Self {
            rune,
            fg: sgr.fg,
            bg: sgr.bg,
            attr: sgr.attr,
            wrapped: false,
        }
    }

    /// Whether this cell has never been written.
    pub fn is_uninitialized(&self) -> bool {
        self.rune == '\0'
    }

    /// The character this cell displays — the uninitialized sentinel reads
    /// as a space.
    pub fn contents(&self) -> char {
        if self.is_uninitialized() {
            ' '
        } else {
            self.rune
        }
    }

    /// Compare two cells for equality ignoring the wrap flag, for diffing
    /// (dirty-row detection doesn't care whether a row's wrap marker
    /// changed independent of its visible content... in practice it always
    /// changes together with content, but dirty comparisons key off this
    /// so a resize-induced wrap-flag flip alone doesn't get missed either
    /// way — see `DisplayBuffer::project_row`).
    pub fn eq_ignoring_wrap(&self, other: &Cell) -> bool {
        self.rune == other.rune
            && self.fg == other.fg
            && self.bg == other.bg
            && self.attr == other.attr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uninitialized_cell_reads_as_space() {
        let c = Cell::default();
        assert!(c.is_uninitialized());
        assert_eq!(c.contents(), ' ');
    }

    #[test]
    fn blank_uses_current_background_not_default_marker() {
        let sgr = SgrState {
            fg: Color::Standard(2),
            bg: Color::Palette256(240),
            attr: AttrSet::BOLD,
        };
        let blank = Cell::blank(&sgr);
        assert_eq!(blank.rune, ' ');
        assert_eq!(blank.bg, Color::Palette256(240));
        // Foreground and attrs do not carry into a blank.
        assert_eq!(blank.fg, Color::Default);
        assert!(blank.attr.is_empty());
    }

    #[test]
    fn blank_with_default_background_is_still_distinct_from_black() {
        let sgr = SgrState::reset();
        let blank = Cell::blank(&sgr);
        assert_eq!(blank.bg, Color::Default);
        assert_ne!(blank.bg, Color::Standard(0));
    }

    #[test]
    fn eq_ignoring_wrap_ignores_only_wrap_flag() {
        let sgr = SgrState::reset();
        let a = Cell { wrapped: true, ..Cell::printable('x', &sgr) };
        let b = Cell { wrapped: false, ..Cell::printable('x', &sgr) };
        assert!(a.eq_ignoring_wrap(&b));
        let c = Cell::printable('y', &sgr);
        assert!(!a.eq_ignoring_wrap(&c));
    }
}
