//! The terminal state machine — cursor motion, erase, SGR, scroll regions,
//! alt-screen, and shell-integration tracking. Implements [`VTHandler`] so
//! a [`crate::parser::VtParser`] can drive it directly.

use std::collections::VecDeque;

use crate::cell::{AttrSet, Cell, Color, SgrState};
use crate::line::LogicalLine;
use crate::parser::{CsiParams, VTHandler};
use crate::screen::{SavedCursor, Screen, ScrollRegion};

/// OSC 133 shell-integration phase, tracked so a caller can tell prompt
/// output from command input from command output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellPhase {
    Idle,
    PromptActive,
    InputActive,
    CommandActive,
}

/// The terminal's full mutable state: grid(s), cursor, modes, and the
/// shell-integration tracker.
pub struct VTerm {
    primary: Screen,
    alt: Option<Screen>,
    in_alt_screen: bool,
    sgr: SgrState,
    saved_alt_cursor: Option<SavedCursor>,

    autowrap: bool,
    origin_mode: bool,
    application_cursor_keys: bool,
    bracketed_paste: bool,

    title: String,

    shell_phase: ShellPhase,
    input_start_col: Option<(u16, u16)>,
    input_length_threshold: Option<usize>,
    /// Whether the current input region has already crossed
    /// `input_length_threshold` — latched so the overflow event fires
    /// exactly once per region, not on every subsequent character.
    input_overflow_fired: bool,
    /// One-shot overflow event awaiting collection by the controller.
    input_overflow_event: bool,

    /// Lines that scrolled off the top of the primary screen, awaiting
    /// collection by the controller into scrollback.
    committed: VecDeque<LogicalLine>,
    /// DSR/DA1 device replies awaiting collection by the controller, to be
    /// written back to the PTY.
    replies: VecDeque<u8>,
    /// Count of BEL (`0x07`) bytes executed since the last
    /// [`VTerm::take_bell_count`] — an observable side effect a compositor
    /// drains to trigger a visual-bell effect.
    bell_count: u32,
    /// Set by `ED 3` (erase saved lines). `VTerm` has no handle to the
    /// scrollback window itself, so this just surfaces the request as an
    /// observable event for the controller to act on.
    scrollback_clear_requested: bool,
}

impl VTerm {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            primary: Screen::new(cols, rows),
            alt: None,
            in_alt_screen: false,
            sgr: SgrState::reset(),
            saved_alt_cursor: None,
            autowrap: true,
            origin_mode: false,
            application_cursor_keys: false,
            bracketed_paste: false,
            title: String::new(),
            shell_phase: ShellPhase::Idle,
            input_start_col: None,
            input_length_threshold: None,
            input_overflow_fired: false,
            input_overflow_event: false,
            committed: VecDeque::new(),
            replies: VecDeque::new(),
            bell_count: 0,
            scrollback_clear_requested: false,
        }
    }

    pub fn screen(&self) -> &Screen {
        if self.in_alt_screen {
            self.alt.as_ref().unwrap_or(&self.primary)
        } else {
            &self.primary
        }
    }

    fn screen_mut(&mut self) -> &mut Screen {
        if self.in_alt_screen {
            self.alt.get_or_insert_with(|| Screen::new(self.primary.cols(), self.primary.rows()))
        } else {
            &mut self.primary
        }
    }

    pub fn in_alt_screen(&self) -> bool {
        self.in_alt_screen
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn shell_phase(&self) -> ShellPhase {
        self.shell_phase
    }

    /// Screen position the current input region started at (since the
    /// last `OSC 133;B`), if any.
    pub fn input_start_col(&self) -> Option<(u16, u16)> {
        self.input_start_col
    }

    pub fn cursor_position(&self) -> (u16, u16) {
        (self.screen().cursor.row, self.screen().cursor.col)
    }

    pub fn cursor_visible(&self) -> bool {
        self.screen().cursor.visible
    }

    pub fn application_cursor_keys(&self) -> bool {
        self.application_cursor_keys
    }

    pub fn bracketed_paste(&self) -> bool {
        self.bracketed_paste
    }

    /// Set a maximum pasted/typed input length before
    /// [`VTerm::take_input_overflow`] starts reporting truncation.
    pub fn set_input_length_threshold(&mut self, threshold: Option<usize>) {
        self.input_length_threshold = threshold;
    }

    /// Override the DECAWM autowrap boot default (normally on).
    pub fn set_autowrap(&mut self, enabled: bool) {
        self.autowrap = enabled;
    }

    /// Drain lines committed to scrollback since the last call.
    pub fn take_committed_lines(&mut self) -> Vec<LogicalLine> {
        self.committed.drain(..).collect()
    }

    /// Drain bytes queued as a device reply (DSR, DA1) since the last call.
    pub fn take_replies(&mut self) -> Vec<u8> {
        self.replies.drain(..).collect()
    }

    /// Drain the number of bell (`BEL`) events seen since the last call.
    pub fn take_bell_count(&mut self) -> u32 {
        std::mem::take(&mut self.bell_count)
    }

    /// Whether `ED 3` (erase saved lines) has fired since the last call.
    /// The controller clears the scrollback window in response, since
    /// `VTerm` has no handle to it.
    pub fn take_scrollback_clear_requested(&mut self) -> bool {
        std::mem::take(&mut self.scrollback_clear_requested)
    }

    /// Resize both screens. Content reflow across the width change is the
    /// controller's job (it owns scrollback); this only reshapes the grid.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        self.primary.resize(cols, rows, &self.sgr);
        if let Some(alt) = self.alt.as_mut() {
            alt.resize(cols, rows, &self.sgr);
        }
    }

    fn commit_scrolled_row(&mut self, cells: Vec<Cell>) {
        let wrapped = cells.last().is_some_and(|c| c.wrapped);
        self.committed.push_back(LogicalLine::reflowable(cells, wrapped));
    }

    /// Scroll the active region up by `n`, capturing rows that fall off
    /// the live screen into scrollback — only when on the primary screen
    /// and the region's top edge is row 0 (a partial scroll region, or
    /// the alt screen, never feeds scrollback).
    fn scroll_region_up(&mut self, n: u16) {
        let capture = !self.in_alt_screen && self.primary.region.top == 0;
        if capture {
            let bottom = self.primary.region.bottom.min(self.primary.rows().saturating_sub(1));
            let height = bottom + 1;
            let n_eff = n.min(height);
            let rows: Vec<Vec<Cell>> = (0..n_eff).map(|r| self.primary.row_cells(r).to_vec()).collect();
            for cells in rows {
                self.commit_scrolled_row(cells);
            }
        }
        let sgr = self.sgr;
        self.screen_mut().scroll_up(n, &sgr);
    }

    fn scroll_region_down(&mut self, n: u16) {
        let sgr = self.sgr;
        self.screen_mut().scroll_down(n, &sgr);
    }

    fn line_feed(&mut self) {
        let region = self.screen().region;
        let row = self.screen().cursor.row;
        if row >= region.bottom.min(self.screen().rows().saturating_sub(1)) {
            self.scroll_region_up(1);
        } else {
            self.screen_mut().cursor.row = row + 1;
        }
        self.screen_mut().cursor.pending_wrap = false;
    }

    fn reverse_index(&mut self) {
        let region = self.screen().region;
        let row = self.screen().cursor.row;
        if row <= region.top {
            self.scroll_region_down(1);
        } else {
            self.screen_mut().cursor.row = row - 1;
        }
    }

    fn carriage_return(&mut self) {
        self.screen_mut().cursor.col = 0;
        self.screen_mut().cursor.pending_wrap = false;
    }

    fn backspace(&mut self) {
        let cur = &mut self.screen_mut().cursor;
        if cur.col > 0 {
            cur.col -= 1;
        }
        cur.pending_wrap = false;
    }

    fn tab_forward(&mut self) {
        let cols = self.screen().cols();
        let col = self.screen().cursor.col;
        let next = self
            .screen()
            .tab_stops
            .iter()
            .copied()
            .find(|&c| c > col)
            .unwrap_or(cols.saturating_sub(1));
        self.screen_mut().cursor.col = next.min(cols.saturating_sub(1));
    }

    /// Clamp an already-absolute target row. When origin mode is active
    /// the cursor may never leave the scroll region, regardless of which
    /// command is moving it; `row` itself is always absolute (callers
    /// addressing relative to the region, like CUP under origin mode,
    /// must add the region's top themselves before calling this).
    fn clamp_cursor_row_origin(&self, row: i64) -> u16 {
        let rows = self.screen().rows();
        if self.origin_mode {
            let top = self.screen().region.top;
            let bottom = self.screen().region.bottom.min(rows.saturating_sub(1));
            row.clamp(top as i64, bottom as i64) as u16
        } else {
            row.clamp(0, rows.saturating_sub(1) as i64) as u16
        }
    }

    fn move_cursor_to(&mut self, row: i64, col: i64) {
        let cols = self.screen().cols();
        let new_row = self.clamp_cursor_row_origin(row);
        let new_col = col.clamp(0, cols.saturating_sub(1) as i64) as u16;
        let cur = &mut self.screen_mut().cursor;
        cur.row = new_row;
        cur.col = new_col;
        cur.pending_wrap = false;
    }

    fn erase_cells(&mut self, row: u16, from_col: u16, to_col: u16) {
        let blank = Cell::blank(&self.sgr);
        let cols = self.screen().cols();
        let to_col = to_col.min(cols);
        if from_col >= to_col {
            return;
        }
        let slice = self.screen_mut().row_cells_mut(row);
        slice[from_col as usize..to_col as usize].iter_mut().for_each(|c| *c = blank);
    }

    fn erase_in_display(&mut self, mode: u16) {
        let rows = self.screen().rows();
        let cols = self.screen().cols();
        let (row, col) = (self.screen().cursor.row, self.screen().cursor.col);
        match mode {
            0 => {
                self.erase_cells(row, col, cols);
                for r in (row + 1)..rows {
                    self.erase_cells(r, 0, cols);
                }
            }
            1 => {
                for r in 0..row {
                    self.erase_cells(r, 0, cols);
                }
                self.erase_cells(row, 0, col + 1);
            }
            2 | 3 => {
                for r in 0..rows {
                    self.erase_cells(r, 0, cols);
                }
                if mode == 3 {
                    self.scrollback_clear_requested = true;
                }
            }
            _ => {}
        }
    }

    fn erase_in_line(&mut self, mode: u16) {
        let cols = self.screen().cols();
        let (row, col) = (self.screen().cursor.row, self.screen().cursor.col);
        match mode {
            0 => self.erase_cells(row, col, cols),
            1 => self.erase_cells(row, 0, col + 1),
            2 => self.erase_cells(row, 0, cols),
            _ => {}
        }
    }

    fn insert_lines(&mut self, n: u16) {
        let region = self.screen().region;
        let row = self.screen().cursor.row;
        if row < region.top || row > region.bottom {
            return;
        }
        let saved_top = self.screen().region.top;
        self.screen_mut().region.top = row;
        self.scroll_region_down(n);
        self.screen_mut().region.top = saved_top;
    }

    fn delete_lines(&mut self, n: u16) {
        let region = self.screen().region;
        let row = self.screen().cursor.row;
        if row < region.top || row > region.bottom {
            return;
        }
        let saved_top = self.screen().region.top;
        self.screen_mut().region.top = row;
        self.scroll_region_up(n);
        self.screen_mut().region.top = saved_top;
    }

    fn delete_chars(&mut self, n: u16) {
        let cols = self.screen().cols();
        let row = self.screen().cursor.row;
        let col = self.screen().cursor.col;
        let n = n.min(cols.saturating_sub(col));
        let tail: Vec<Cell> = self.screen().row_cells(row)[(col + n) as usize..].to_vec();
        let blank = Cell::blank(&self.sgr);
        let slice = self.screen_mut().row_cells_mut(row);
        slice[col as usize..col as usize + tail.len()].copy_from_slice(&tail);
        slice[col as usize + tail.len()..].iter_mut().for_each(|c| *c = blank);
    }

    fn insert_chars(&mut self, n: u16) {
        let cols = self.screen().cols();
        let row = self.screen().cursor.row;
        let col = self.screen().cursor.col;
        let n = n.min(cols.saturating_sub(col));
        let keep_len = cols - col - n;
        let head: Vec<Cell> = self.screen().row_cells(row)[col as usize..(col + keep_len) as usize].to_vec();
        let blank = Cell::blank(&self.sgr);
        let slice = self.screen_mut().row_cells_mut(row);
        slice[(col + n) as usize..cols as usize].copy_from_slice(&head);
        slice[col as usize..(col + n) as usize].iter_mut().for_each(|c| *c = blank);
    }

    fn set_scroll_region(&mut self, top: u16, bottom: u16) {
        let rows = self.screen().rows();
        let top = top.min(rows.saturating_sub(1));
        let bottom = bottom.min(rows.saturating_sub(1)).max(top);
        self.screen_mut().region = ScrollRegion { top, bottom };
        self.move_cursor_to(0, 0);
    }

    fn save_cursor(&mut self) {
        let s = &self.screen().cursor;
        let saved = SavedCursor { row: s.row, col: s.col, sgr: self.sgr, origin_mode: self.origin_mode };
        if self.in_alt_screen {
            self.saved_alt_cursor = Some(saved);
        } else {
            self.primary.cursor.saved = Some(saved);
        }
    }

    fn restore_cursor(&mut self) {
        let saved = if self.in_alt_screen { self.saved_alt_cursor } else { self.primary.cursor.saved };
        if let Some(s) = saved {
            self.sgr = s.sgr;
            self.origin_mode = s.origin_mode;
            let cur = &mut self.screen_mut().cursor;
            cur.row = s.row;
            cur.col = s.col;
            cur.pending_wrap = false;
        }
    }

    fn enter_alt_screen(&mut self) {
        if !self.in_alt_screen {
            self.alt = Some(Screen::new(self.primary.cols(), self.primary.rows()));
            self.in_alt_screen = true;
        }
    }

    fn exit_alt_screen(&mut self) {
        self.in_alt_screen = false;
        self.alt = None;
    }

    fn set_private_mode(&mut self, code: u16, enable: bool) {
        match code {
            1 => self.application_cursor_keys = enable,
            6 => {
                self.origin_mode = enable;
                self.move_cursor_to(0, 0);
            }
            7 => self.autowrap = enable,
            25 => self.screen_mut().cursor.visible = enable,
            47 | 1047 => {
                if enable {
                    self.enter_alt_screen();
                } else {
                    self.exit_alt_screen();
                }
            }
            1049 => {
                if enable {
                    self.save_cursor();
                    self.enter_alt_screen();
                } else {
                    self.exit_alt_screen();
                    self.restore_cursor();
                }
            }
            2004 => self.bracketed_paste = enable,
            _ => {}
        }
    }

    fn apply_sgr(&mut self, params: &CsiParams<'_>) {
        if params.is_empty() {
            self.sgr = SgrState::reset();
            return;
        }
        let mut i = 0;
        let n = params.len();
        while i < n {
            let group = params.group(i);
            let code = group.first().copied().unwrap_or(0);
            match code {
                0 => self.sgr = SgrState::reset(),
                1 => self.sgr.attr.insert(AttrSet::BOLD),
                2 => self.sgr.attr.insert(AttrSet::DIM),
                3 => self.sgr.attr.insert(AttrSet::ITALIC),
                4 => self.sgr.attr.insert(AttrSet::UNDERLINE),
                5 => self.sgr.attr.insert(AttrSet::BLINK),
                7 => self.sgr.attr.insert(AttrSet::REVERSE),
                8 => self.sgr.attr.insert(AttrSet::HIDDEN),
                9 => self.sgr.attr.insert(AttrSet::STRIKETHROUGH),
                22 => self.sgr.attr.remove(AttrSet::BOLD | AttrSet::DIM),
                23 => self.sgr.attr.remove(AttrSet::ITALIC),
                24 => self.sgr.attr.remove(AttrSet::UNDERLINE),
                25 => self.sgr.attr.remove(AttrSet::BLINK),
                27 => self.sgr.attr.remove(AttrSet::REVERSE),
                28 => self.sgr.attr.remove(AttrSet::HIDDEN),
                29 => self.sgr.attr.remove(AttrSet::STRIKETHROUGH),
                30..=37 => self.sgr.fg = Color::Standard((code - 30) as u8),
                39 => self.sgr.fg = Color::Default,
                40..=47 => self.sgr.bg = Color::Standard((code - 40) as u8),
                49 => self.sgr.bg = Color::Default,
                90..=97 => self.sgr.fg = Color::Standard((code - 90 + 8) as u8),
                100..=107 => self.sgr.bg = Color::Standard((code - 100 + 8) as u8),
                38 | 48 => {
                    let (color, consumed) = self.parse_extended_color(params, i, group);
                    if code == 38 {
                        self.sgr.fg = color;
                    } else {
                        self.sgr.bg = color;
                    }
                    i += consumed;
                    continue;
                }
                _ => {}
            }
            i += 1;
        }
    }

    /// Parses `38;5;N`, `38;2;R;G;B`, or the colon-joined sub-parameter
    /// forms (`38:2::R:G:B`). Returns the color and how many parameter
    /// *groups* (from `i`, inclusive) were consumed.
    fn parse_extended_color(&self, params: &CsiParams<'_>, i: usize, group: &[u16]) -> (Color, usize) {
        if group.len() >= 2 {
            return match group[1] {
                5 if group.len() >= 3 => (Color::Palette256(group[2] as u8), 1),
                2 if group.len() >= 5 => {
                    (Color::Rgb(group[2] as u8, group[3] as u8, group[4] as u8), 1)
                }
                2 if group.len() >= 6 => {
                    (Color::Rgb(group[3] as u8, group[4] as u8, group[5] as u8), 1)
                }
                _ => (Color::Default, 1),
            };
        }
        let selector = params.get_raw(i + 1, 0);
        match selector {
            5 => {
                let idx = params.get_raw(i + 2, 0) as u8;
                (Color::Palette256(idx), 3)
            }
            2 => {
                let r = params.get_raw(i + 2, 0) as u8;
                let g = params.get_raw(i + 3, 0) as u8;
                let b = params.get_raw(i + 4, 0) as u8;
                (Color::Rgb(r, g, b), 5)
            }
            _ => (Color::Default, 2),
        }
    }

    fn device_status_report(&mut self, code: u16) {
        match code {
            5 => self.replies.extend(b"\x1b[0n".iter().copied()),
            6 => {
                let (row, col) = (self.screen().cursor.row + 1, self.screen().cursor.col + 1);
                self.replies.extend(format!("\x1b[{row};{col}R").into_bytes());
            }
            _ => {}
        }
    }

    fn primary_device_attributes(&mut self) {
        self.replies.extend(b"\x1b[?62;1;2;6c".iter().copied());
    }

    fn osc_set_title(&mut self, payload: &[u8]) {
        self.title = String::from_utf8_lossy(payload).into_owned();
    }

    fn osc_133(&mut self, payload: &[u8]) {
        match payload {
            b"A" => {
                self.shell_phase = ShellPhase::PromptActive;
                self.input_start_col = None;
            }
            b"B" => {
                self.shell_phase = ShellPhase::InputActive;
                self.input_start_col = Some((self.screen().cursor.row, self.screen().cursor.col));
                self.input_overflow_fired = false;
            }
            b"C" => self.shell_phase = ShellPhase::CommandActive,
            b"D" => self.shell_phase = ShellPhase::Idle,
            _ => {}
        }
    }

    fn typed_input_length(&self) -> Option<usize> {
        let (start_row, start_col) = self.input_start_col?;
        if self.shell_phase != ShellPhase::InputActive {
            return None;
        }
        let cur = &self.screen().cursor;
        let cols = self.screen().cols() as usize;
        Some(
            (cur.row as usize * cols + cur.col as usize)
                .saturating_sub(start_row as usize * cols + start_col as usize),
        )
    }

    /// Whether the current input region (since the last OSC 133;B) has
    /// exceeded the configured threshold. Level-triggered — true for as
    /// long as the condition holds, unlike the one-shot event drained by
    /// [`VTerm::take_input_overflow_event`].
    pub fn input_overflowed(&self) -> bool {
        let Some(threshold) = self.input_length_threshold else { return false };
        self.typed_input_length().is_some_and(|typed| typed > threshold)
    }

    /// Called after anything that can grow the current input region, to
    /// latch the one-shot overflow event the first time the threshold is
    /// crossed.
    fn check_input_overflow(&mut self) {
        if self.input_overflow_fired {
            return;
        }
        let Some(threshold) = self.input_length_threshold else { return };
        if self.typed_input_length().is_some_and(|typed| typed > threshold) {
            self.input_overflow_fired = true;
            self.input_overflow_event = true;
        }
    }

    /// Drain the one-shot "input length threshold exceeded" event. Fires
    /// exactly once per input region (reset at the next `OSC 133;B`),
    /// regardless of how many more characters are typed afterward.
    pub fn take_input_overflow_event(&mut self) -> bool {
        std::mem::take(&mut self.input_overflow_event)
    }
}

impl VTHandler for VTerm {
    fn print(&mut self, c: char) {
        let cols = self.screen().cols();
        if self.screen().cursor.pending_wrap && self.autowrap {
            let row = self.screen().cursor.row;
            self.screen_mut().row_cells_mut(row)[cols as usize - 1].wrapped = true;
            self.screen_mut().cursor.pending_wrap = false;
            self.line_feed();
            self.screen_mut().cursor.col = 0;
        }
        let (row, col) = (self.screen().cursor.row, self.screen().cursor.col);
        let cell = Cell::printable(c, &self.sgr);
        *self.screen_mut().cell_mut(row, col) = cell;
        if col + 1 >= cols {
            self.screen_mut().cursor.pending_wrap = true;
        } else {
            self.screen_mut().cursor.col = col + 1;
        }
        self.check_input_overflow();
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            b'\n' | 0x0b | 0x0c => self.line_feed(),
            b'\r' => self.carriage_return(),
            0x08 => self.backspace(),
            b'\t' => self.tab_forward(),
            0x07 => self.bell_count += 1,
            _ => {}
        }
    }

    fn csi_dispatch(&mut self, params: &CsiParams<'_>, intermediates: &[u8], _ignore: bool, action: char) {
        let private = intermediates.first() == Some(&b'?');
        match action {
            'A' => {
                let n = params.get(0, 1);
                let row = self.screen().cursor.row;
                self.move_cursor_to(row as i64 - n as i64, self.screen().cursor.col as i64);
            }
            'B' | 'e' => {
                let n = params.get(0, 1);
                let row = self.screen().cursor.row;
                self.move_cursor_to(row as i64 + n as i64, self.screen().cursor.col as i64);
            }
            'C' | 'a' => {
                let n = params.get(0, 1);
                let col = self.screen().cursor.col;
                self.move_cursor_to(self.screen().cursor.row as i64, col as i64 + n as i64);
            }
            'D' => {
                let n = params.get(0, 1);
                let col = self.screen().cursor.col;
                self.move_cursor_to(self.screen().cursor.row as i64, col as i64 - n as i64);
            }
            'G' | '`' => {
                let col = params.get(0, 1).saturating_sub(1);
                self.move_cursor_to(self.screen().cursor.row as i64, col as i64);
            }
            'd' => {
                let row = params.get(0, 1).saturating_sub(1);
                self.move_cursor_to(row as i64, self.screen().cursor.col as i64);
            }
            'H' | 'f' => {
                let row = params.get(0, 1).saturating_sub(1);
                let col = params.get(1, 1).saturating_sub(1);
                let base = if self.origin_mode { self.screen().region.top } else { 0 };
                self.move_cursor_to(base as i64 + row as i64, col as i64);
            }
            'J' => self.erase_in_display(params.get(0, 0)),
            'K' => self.erase_in_line(params.get(0, 0)),
            'L' => self.insert_lines(params.get(0, 1)),
            'M' => self.delete_lines(params.get(0, 1)),
            'P' => self.delete_chars(params.get(0, 1)),
            '@' => self.insert_chars(params.get(0, 1)),
            'X' => {
                let n = params.get(0, 1);
                let row = self.screen().cursor.row;
                let col = self.screen().cursor.col;
                self.erase_cells(row, col, col + n);
            }
            'S' => self.scroll_region_up(params.get(0, 1)),
            'T' => self.scroll_region_down(params.get(0, 1)),
            'r' => {
                let top = params.get(0, 1).saturating_sub(1);
                let bottom = params.get(1, self.screen().rows()).saturating_sub(1);
                self.set_scroll_region(top, bottom);
            }
            's' if !private => self.save_cursor(),
            'u' if !private => self.restore_cursor(),
            'm' => self.apply_sgr(params),
            'n' => self.device_status_report(params.get(0, 0)),
            'c' if !private => self.primary_device_attributes(),
            'g' => {
                let mode = params.get(0, 0);
                let cols = self.screen().cursor.col;
                let stops = &mut self.screen_mut().tab_stops;
                match mode {
                    0 => stops.retain(|&c| c != cols),
                    3 => stops.clear(),
                    _ => {}
                }
            }
            'h' if private => {
                for g in params.iter() {
                    self.set_private_mode(g.first().copied().unwrap_or(0), true);
                }
            }
            'l' if private => {
                for g in params.iter() {
                    self.set_private_mode(g.first().copied().unwrap_or(0), false);
                }
            }
            _ => {}
        }
    }

    fn esc_dispatch(&mut self, intermediates: &[u8], _ignore: bool, byte: u8) {
        if !intermediates.is_empty() {
            return;
        }
        match byte {
            b'7' => self.save_cursor(),
            b'8' => self.restore_cursor(),
            b'D' => self.line_feed(),
            b'M' => self.reverse_index(),
            b'H' => {
                let col = self.screen().cursor.col;
                let stops = &mut self.screen_mut().tab_stops;
                if let Err(pos) = stops.binary_search(&col) {
                    stops.insert(pos, col);
                }
            }
            b'c' => {
                let (cols, rows) = (self.screen().cols(), self.screen().rows());
                *self = VTerm::new(cols, rows);
            }
            _ => {}
        }
    }

    fn osc_dispatch(&mut self, params: &[&[u8]], _bell_terminated: bool) {
        let Some(&kind) = params.first() else { return };
        match kind {
            b"0" | b"1" | b"2" => {
                if let Some(title) = params.get(1) {
                    self.osc_set_title(title);
                }
            }
            b"133" => {
                if let Some(sub) = params.get(1) {
                    self.osc_133(sub);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(vterm: &mut VTerm, bytes: &[u8]) {
        let mut parser = crate::parser::VtParser::new();
        parser.advance(vterm, bytes);
    }

    #[test]
    fn plain_text_wraps_at_margin() {
        let mut vterm = VTerm::new(5, 3);
        feed(&mut vterm, b"abcdefg");
        assert_eq!(vterm.screen().cursor.row, 1);
        assert_eq!(vterm.screen().cell(0, 4).rune, 'e');
        assert!(vterm.screen().cell(0, 4).wrapped);
        assert_eq!(vterm.screen().cell(1, 0).rune, 'f');
    }

    #[test]
    fn erase_in_line_paints_with_current_background() {
        let mut vterm = VTerm::new(5, 1);
        feed(&mut vterm, b"\x1b[41mhi");
        feed(&mut vterm, b"\x1b[0K");
        assert_eq!(vterm.screen().cell(0, 2).bg, Color::Standard(1));
        assert_eq!(vterm.screen().cell(0, 2).rune, ' ');
    }

    #[test]
    fn alt_screen_round_trip_preserves_primary_and_never_commits() {
        let mut vterm = VTerm::new(5, 2);
        feed(&mut vterm, b"one\n");
        feed(&mut vterm, b"\x1b[?1049h");
        feed(&mut vterm, b"two");
        assert!(vterm.in_alt_screen());
        assert!(vterm.take_committed_lines().is_empty());
        feed(&mut vterm, b"\x1b[?1049l");
        assert!(!vterm.in_alt_screen());
        assert_eq!(vterm.screen().cell(0, 0).rune, 'o');
    }

    #[test]
    fn scroll_region_line_feed_commits_top_row() {
        let mut vterm = VTerm::new(5, 2);
        feed(&mut vterm, b"aaaaa\n");
        feed(&mut vterm, b"bbbbb\n");
        let committed = vterm.take_committed_lines();
        assert_eq!(committed.len(), 1);
        assert_eq!(committed[0].cells()[0].rune, 'a');
    }

    #[test]
    fn shell_integration_tracks_input_phase() {
        let mut vterm = VTerm::new(20, 3);
        feed(&mut vterm, b"\x1b]133;A\x07");
        assert_eq!(vterm.shell_phase(), ShellPhase::PromptActive);
        feed(&mut vterm, b"\x1b]133;B\x07");
        assert_eq!(vterm.shell_phase(), ShellPhase::InputActive);
        vterm.set_input_length_threshold(Some(3));
        feed(&mut vterm, b"abcdef");
        assert!(vterm.input_overflowed());
    }

    #[test]
    fn input_overflow_event_fires_exactly_once_per_region() {
        let mut vterm = VTerm::new(20, 3);
        vterm.set_input_length_threshold(Some(3));
        feed(&mut vterm, b"\x1b]133;A\x07\x1b]133;B\x07");
        feed(&mut vterm, b"ab"); // under threshold
        assert!(!vterm.take_input_overflow_event());
        feed(&mut vterm, b"cd"); // crosses it
        assert!(vterm.take_input_overflow_event());
        feed(&mut vterm, b"ef"); // still over, but already latched
        assert!(!vterm.take_input_overflow_event());

        // A new input region re-arms the latch.
        feed(&mut vterm, b"\x1b]133;C\x07\x1b]133;A\x07\x1b]133;B\x07");
        feed(&mut vterm, b"zzzz");
        assert!(vterm.take_input_overflow_event());
    }

    #[test]
    fn sgr_extended_colors_parse_256_and_truecolor() {
        let mut vterm = VTerm::new(5, 1);
        feed(&mut vterm, b"\x1b[38;5;200mx");
        assert_eq!(vterm.screen().cell(0, 0).fg, Color::Palette256(200));
        feed(&mut vterm, b"\x1b[48;2;10;20;30my");
        assert_eq!(vterm.screen().cell(0, 1).bg, Color::Rgb(10, 20, 30));
    }

    #[test]
    fn sgr_reset_sub_codes_clear_individual_attributes() {
        let mut vterm = VTerm::new(5, 1);
        feed(&mut vterm, b"\x1b[1;4mx");
        assert!(vterm.sgr.attr.contains(AttrSet::BOLD));
        feed(&mut vterm, b"\x1b[22my");
        assert!(!vterm.sgr.attr.contains(AttrSet::BOLD));
        assert!(vterm.sgr.attr.contains(AttrSet::UNDERLINE));
    }

    #[test]
    fn ed_3_requests_scrollback_clear_but_not_ed_2() {
        let mut vterm = VTerm::new(5, 1);
        feed(&mut vterm, b"\x1b[2J");
        assert!(!vterm.take_scrollback_clear_requested());
        feed(&mut vterm, b"\x1b[3J");
        assert!(vterm.take_scrollback_clear_requested());
        assert!(!vterm.take_scrollback_clear_requested());
    }

    #[test]
    fn bel_is_counted_and_drained() {
        let mut vterm = VTerm::new(5, 1);
        feed(&mut vterm, b"\x07\x07");
        assert_eq!(vterm.take_bell_count(), 2);
        assert_eq!(vterm.take_bell_count(), 0);
    }

    #[test]
    fn cursor_position_report_replies_with_current_position() {
        let mut vterm = VTerm::new(10, 10);
        feed(&mut vterm, b"\x1b[5;6H");
        feed(&mut vterm, b"\x1b[6n");
        let reply = vterm.take_replies();
        assert_eq!(reply, b"\x1b[5;6R");
    }
}
