//! Controller — wires PTY bytes through the parser into the `VTerm`, keeps
//! scrollback and the display buffer in sync, and owns the refresh
//! notification channel.
//!
//! One mutex guards parser + VTerm + scrollback + display buffer, matching
//! the core's single-writer-single-reader concurrency model: a PTY-reader
//! task feeds bytes in, a key-writer task feeds input out, both serialized
//! through [`Controller::feed`] / [`Controller::handle_key`].

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::config::RuntimeConfig;
use crate::display::{DisplayBuffer, ProjectedRow};
use crate::error::Result;
use crate::history::DiskHistory;
use crate::key::{encode, Key, Modifiers};
use crate::line::LogicalLine;
use crate::parser::VtParser;
use crate::pty::ByteSink;
use crate::scrollback::{GlobalLineIdx, ScrollbackWindow};
use crate::vterm::{ShellPhase, VTerm};

/// Read-only snapshot of [`VTerm`] state a compositor needs but that isn't
/// part of the rendered grid itself — shell-integration phase and the
/// current scroll position relative to the live edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VTermView {
    pub input_active: bool,
    pub command_active: bool,
    pub prompt_active: bool,
    pub input_start_col: Option<(u16, u16)>,
    pub scroll_offset: u64,
    pub live_edge: GlobalLineIdx,
}

/// Everything the mutex actually guards.
struct Inner {
    parser: VtParser,
    vterm: VTerm,
    scrollback: ScrollbackWindow,
    display: DisplayBuffer,
    /// Lines above the live screen currently scrolled into view; 0 means
    /// the viewport is pinned to the live edge.
    scroll_offset: u64,
}

/// Coordinates the parser, terminal state, scrollback, and display
/// projection behind a single lock, plus a coalescing refresh channel.
pub struct Controller<S: ByteSink> {
    inner: Arc<Mutex<Inner>>,
    sink: Arc<Mutex<S>>,
    refresh_tx: Option<mpsc::Sender<()>>,
    bell_tx: Option<mpsc::Sender<()>>,
    input_overflow_tx: Option<mpsc::Sender<()>>,
}

impl<S: ByteSink> Controller<S> {
    pub fn new(cols: u16, rows: u16, sink: S) -> Self {
        Self::with_config(cols, rows, sink, &RuntimeConfig::default())
    }

    /// Build a controller honoring a [`RuntimeConfig`]'s scrollback sizing,
    /// autowrap default, input-length threshold, and disk history opt-in.
    /// If `persist_dir` is set but the directory can't be opened for
    /// writing, disk history degrades to memory-only (logged once).
    pub fn with_config(cols: u16, rows: u16, sink: S, config: &RuntimeConfig) -> Self {
        let disk = if config.disk_history_enabled() {
            match DiskHistory::create(&config.persist_dir, "session") {
                Ok(d) => Some(d),
                Err(e) => {
                    log::warn!("disk history unavailable at {}: {e}", config.persist_dir.display());
                    None
                }
            }
        } else {
            None
        };

        let mut vterm = VTerm::new(cols, rows);
        vterm.set_input_length_threshold(config.input_length_threshold);
        vterm.set_autowrap(config.autowrap);

        Self {
            inner: Arc::new(Mutex::new(Inner {
                parser: VtParser::new(),
                vterm,
                scrollback: ScrollbackWindow::new(config.max_memory_lines, config.margin_above, config.margin_below, disk),
                display: DisplayBuffer::new(cols, rows),
                scroll_offset: 0,
            })),
            sink: Arc::new(Mutex::new(sink)),
            refresh_tx: None,
            bell_tx: None,
            input_overflow_tx: None,
        }
    }

    /// Replace the scrollback window (e.g. to attach disk history).
    pub async fn set_scrollback(&self, window: ScrollbackWindow) {
        self.inner.lock().await.scrollback = window;
    }

    /// Install a refresh-notification channel. Sends use `try_send` so a
    /// slow consumer coalesces bursts instead of backing up the feed path.
    pub fn set_refresh_notifier(&mut self, tx: mpsc::Sender<()>) {
        self.refresh_tx = Some(tx);
    }

    fn notify_refresh(&self) {
        if let Some(tx) = &self.refresh_tx {
            let _ = tx.try_send(());
        }
    }

    /// Install a bell-notification channel, fired once per [`feed`](Self::feed)
    /// call that executed at least one `BEL` since the last drain.
    pub fn set_bell_notifier(&mut self, tx: mpsc::Sender<()>) {
        self.bell_tx = Some(tx);
    }

    fn notify_bell(&self) {
        if let Some(tx) = &self.bell_tx {
            let _ = tx.try_send(());
        }
    }

    /// Install the channel backing `on_input_length_exceeded` — fires
    /// exactly once per input region that crosses `input_length_threshold`,
    /// not once per character typed past it.
    pub fn set_input_overflow_notifier(&mut self, tx: mpsc::Sender<()>) {
        self.input_overflow_tx = Some(tx);
    }

    fn notify_input_overflow(&self) {
        if let Some(tx) = &self.input_overflow_tx {
            let _ = tx.try_send(());
        }
    }

    /// Feed a chunk of PTY output through parser -> VTerm -> scrollback ->
    /// display projection.
    pub async fn feed(&self, bytes: &[u8]) -> Result<()> {
        let (replies, bell_count, overflowed) = {
            let mut guard = self.inner.lock().await;
            let Inner { parser, vterm, scrollback, display, scroll_offset } = &mut *guard;
            parser.advance(&mut *vterm, bytes);

            for line in vterm.take_committed_lines() {
                scrollback.commit(line);
            }
            if vterm.take_scrollback_clear_requested() {
                scrollback.clear();
            }

            project_display(vterm, scrollback, display, *scroll_offset);
            (vterm.take_replies(), vterm.take_bell_count(), vterm.take_input_overflow_event())
        };

        if !replies.is_empty() {
            self.sink.lock().await.write_bytes(&replies)?;
        }
        if bell_count > 0 {
            self.notify_bell();
        }
        if overflowed {
            self.notify_input_overflow();
        }

        self.notify_refresh();
        Ok(())
    }

    /// Encode and write a key press to the PTY.
    pub async fn handle_key(&self, key: Key, modifiers: Modifiers) -> Result<()> {
        let app_cursor = self.inner.lock().await.vterm.application_cursor_keys();
        let bytes = encode(key, modifiers, app_cursor);
        self.sink.lock().await.write_bytes(&bytes)
    }

    /// Write raw bytes (printable input, pastes) straight to the PTY.
    pub async fn write_input(&self, bytes: &[u8]) -> Result<()> {
        self.sink.lock().await.write_bytes(bytes)
    }

    /// Resize the terminal. Zero or absurd dimensions are clamped to at
    /// least `(1, 1)` per the core's error-recovery policy rather than
    /// reaching the grid — nothing here ever panics on a caller-supplied
    /// size. Reflows resident scrollback so soft-wrapped paragraphs
    /// re-break at the new width; lines that are off the resident window
    /// are left to be reflowed lazily when paged in.
    pub async fn resize(&self, cols: u16, rows: u16) -> Result<()> {
        let (cols, rows) = if cols == 0 || rows == 0 {
            log::warn!(
                "{}",
                crate::error::Error::ResizeOutOfBounds { cols: cols as i64, rows: rows as i64 }
            );
            (cols.max(1), rows.max(1))
        } else {
            (cols, rows)
        };

        let mut guard = self.inner.lock().await;
        guard.vterm.resize(cols, rows);
        guard.display.resize(cols, rows);
        guard.scroll_offset = 0;
        guard.scrollback.reflow(cols, rows as usize);
        let Inner { vterm, scrollback, display, .. } = &mut *guard;
        project_display(vterm, scrollback, display, 0);
        drop(guard);
        self.sink.lock().await.resize(cols, rows)
    }

    /// Scroll the viewport by `delta` lines (positive = toward history,
    /// negative = toward the live edge), clamped to `[0, live_edge]`.
    /// Proactively pages disk history into the resident window around the
    /// new viewport center, per the margin configured on the scrollback
    /// window.
    pub async fn scroll_by(&self, delta: i64) {
        let mut guard = self.inner.lock().await;
        let live_edge = guard.scrollback.live_edge();
        let new_offset = (guard.scroll_offset as i64 + delta).clamp(0, live_edge as i64) as u64;
        self.apply_scroll_offset(&mut *guard, new_offset);
        drop(guard);
        self.notify_refresh();
    }

    /// Scroll the viewport so `global_line` is the topmost resident line
    /// shown, clamped to `[0, live_edge]`. The inverse of [`Self::scroll_by`]
    /// in terms of an absolute target rather than a relative step.
    pub async fn scroll_to(&self, global_line: GlobalLineIdx) {
        let mut guard = self.inner.lock().await;
        let live_edge = guard.scrollback.live_edge();
        let new_offset = live_edge.saturating_sub(global_line.min(live_edge));
        self.apply_scroll_offset(&mut *guard, new_offset);
        drop(guard);
        self.notify_refresh();
    }

    /// Shared by `scroll_by`/`scroll_to`: update the offset, page in
    /// scrollback around the new viewport center, and re-project.
    fn apply_scroll_offset(&self, guard: &mut Inner, new_offset: u64) {
        guard.scroll_offset = new_offset;
        let live_edge = guard.scrollback.live_edge();
        let center = live_edge.saturating_sub(new_offset);
        if let Err(e) = guard.scrollback.page_around(center) {
            log::warn!("failed to page scrollback around line {center}: {e}");
        }
        let Inner { vterm, scrollback, display, .. } = guard;
        project_display(vterm, scrollback, display, new_offset);
    }

    /// Current scrollback offset (0 == pinned to the live edge).
    pub async fn scroll_offset(&self) -> u64 {
        self.inner.lock().await.scroll_offset
    }

    /// The live edge: the global index the next committed scrollback line
    /// will receive.
    pub async fn live_edge_base(&self) -> GlobalLineIdx {
        self.inner.lock().await.scrollback.live_edge()
    }

    /// Read-only snapshot of shell-integration phase and scroll position.
    pub async fn vterm(&self) -> VTermView {
        let guard = self.inner.lock().await;
        let phase = guard.vterm.shell_phase();
        VTermView {
            input_active: phase == ShellPhase::InputActive,
            command_active: phase == ShellPhase::CommandActive,
            prompt_active: phase == ShellPhase::PromptActive,
            input_start_col: guard.vterm.input_start_col(),
            scroll_offset: guard.scroll_offset,
            live_edge: guard.scrollback.live_edge(),
        }
    }

    /// Current cursor position and visibility, for a compositor to draw.
    pub async fn cursor(&self) -> (u16, u16, bool) {
        let guard = self.inner.lock().await;
        let (row, col) = guard.vterm.cursor_position();
        (row, col, guard.vterm.cursor_visible())
    }

    /// Take the dirty row list for the next render.
    pub async fn take_dirty(&self) -> Vec<u16> {
        self.inner.lock().await.display.take_dirty()
    }

    /// Snapshot a projected row for rendering.
    pub async fn row(&self, row: u16) -> ProjectedRow {
        self.inner.lock().await.display.row(row).clone()
    }
}

/// Re-render every display row from the live screen and/or scrollback,
/// given the current scroll offset. Rows at the bottom of the viewport
/// come from the live screen once `scroll_offset` lines of history have
/// been paged above it.
fn project_display(
    vterm: &VTerm,
    scrollback: &mut ScrollbackWindow,
    display: &mut DisplayBuffer,
    scroll_offset: u64,
) {
    let rows = display.rows();
    let cols = display.cols() as usize;
    let live_edge = scrollback.live_edge();
    let screen = vterm.screen();

    let history_rows = scroll_offset.min(rows as u64) as u16;
    for r in 0..history_rows {
        let idx: GlobalLineIdx = live_edge.saturating_sub(scroll_offset) + r as u64;
        let projected = match scrollback.get(idx) {
            Ok(line) => project_logical_line(&line, cols),
            Err(_) => ProjectedRow { cells: vec![Default::default(); cols], wrapped: false },
        };
        display.set_row(r, projected);
    }

    for r in history_rows..rows {
        let screen_row = r - history_rows;
        if screen_row >= screen.rows() {
            continue;
        }
        let cells = screen.row_cells(screen_row).to_vec();
        let wrapped = cells.last().is_some_and(|c| c.wrapped);
        display.set_row(r, ProjectedRow { cells, wrapped });
    }
}

fn project_logical_line(line: &LogicalLine, cols: usize) -> ProjectedRow {
    let mut cells: Vec<_> = line.cells().iter().copied().collect();
    cells.resize(cols, Default::default());
    ProjectedRow { cells, wrapped: line.soft_wrapped }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pty::RecordingSink;

    #[tokio::test]
    async fn feed_projects_plain_text_into_display() {
        let ctrl = Controller::new(10, 3, RecordingSink::default());
        ctrl.feed(b"hi").await.unwrap();
        let row = ctrl.row(0).await;
        assert_eq!(row.cells[0].rune, 'h');
        assert_eq!(row.cells[1].rune, 'i');
    }

    #[tokio::test]
    async fn feed_reports_dirty_rows() {
        let ctrl = Controller::new(10, 3, RecordingSink::default());
        ctrl.take_dirty().await;
        ctrl.feed(b"x").await.unwrap();
        let dirty = ctrl.take_dirty().await;
        assert!(dirty.contains(&0));
    }

    #[tokio::test]
    async fn handle_key_writes_encoded_bytes() {
        let sink = RecordingSink::default();
        let ctrl = Controller::new(10, 3, sink.clone());
        ctrl.handle_key(Key::Up, Modifiers::default()).await.unwrap();
        assert_eq!(&*sink.written.lock().unwrap(), b"\x1b[A");
    }

    #[tokio::test]
    async fn cursor_position_report_is_written_back_to_sink() {
        let sink = RecordingSink::default();
        let ctrl = Controller::new(10, 3, sink.clone());
        ctrl.feed(b"\x1b[6n").await.unwrap();
        assert_eq!(&*sink.written.lock().unwrap(), b"\x1b[1;1R");
    }

    #[tokio::test]
    async fn resize_reprojects_and_marks_everything_dirty() {
        let ctrl = Controller::new(10, 3, RecordingSink::default());
        ctrl.feed(b"hello").await.unwrap();
        ctrl.take_dirty().await;
        ctrl.resize(20, 5).await.unwrap();
        let dirty = ctrl.take_dirty().await;
        assert_eq!(dirty.len(), 5);
    }

    #[tokio::test]
    async fn resize_reflows_scrollback_from_the_new_width() {
        let ctrl = Controller::new(4, 2, RecordingSink::default());
        // Fills the 4-wide screen, wrapping, then scrolls it into scrollback.
        ctrl.feed(b"abcdefgh\n\n\n").await.unwrap();
        ctrl.resize(8, 2).await.unwrap();
        let committed = ctrl.inner.lock().await.scrollback.get(0).unwrap();
        let text: String = committed.cells().iter().map(|c| c.rune).collect();
        assert_eq!(text, "abcdefgh");
    }

    #[tokio::test]
    async fn scroll_by_moves_offset_and_clamps() {
        let ctrl = Controller::new(10, 3, RecordingSink::default());
        for _ in 0..5 {
            ctrl.feed(b"line\n").await.unwrap();
        }
        ctrl.scroll_by(1000).await;
        let live_edge = ctrl.inner.lock().await.scrollback.live_edge();
        assert_eq!(ctrl.scroll_offset().await, live_edge);
        ctrl.scroll_by(-1000).await;
        assert_eq!(ctrl.scroll_offset().await, 0);
    }

    #[tokio::test]
    async fn scroll_by_pages_disk_history_into_the_resident_window() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = crate::config::RuntimeConfig::default();
        config.max_memory_lines = 2;
        config.margin_above = 5;
        config.persist_dir = dir.path().to_path_buf();

        let ctrl = Controller::with_config(4, 2, RecordingSink::default(), &config);
        for _ in 0..8 {
            ctrl.feed(b"x\n").await.unwrap();
        }
        let resident_before = ctrl.inner.lock().await.scrollback.resident_min();
        ctrl.scroll_by(10).await;
        let resident_after = ctrl.inner.lock().await.scrollback.resident_min();
        assert!(resident_after < resident_before);
    }

    #[tokio::test]
    async fn with_config_enables_disk_history_when_persist_dir_is_set() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = crate::config::RuntimeConfig::default();
        config.max_memory_lines = 2;
        config.persist_dir = dir.path().to_path_buf();

        let ctrl = Controller::with_config(4, 2, RecordingSink::default(), &config);
        for _ in 0..5 {
            ctrl.feed(b"x\n").await.unwrap();
        }
        let mut guard = ctrl.inner.lock().await;
        assert!(guard.scrollback.disk_path().is_some());
        assert!(guard.scrollback.get(0).is_ok());
    }

    #[tokio::test]
    async fn bel_notifies_once_per_feed_call_with_at_least_one_bell() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut ctrl = Controller::new(10, 3, RecordingSink::default());
        ctrl.set_bell_notifier(tx);
        ctrl.feed(b"\x07\x07").await.unwrap();
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());

        ctrl.feed(b"no bell here").await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn input_overflow_notifies_exactly_once_per_region() {
        let mut config = crate::config::RuntimeConfig::default();
        config.input_length_threshold = Some(3);
        let (tx, mut rx) = mpsc::channel(4);
        let mut ctrl = Controller::with_config(20, 3, RecordingSink::default(), &config);
        ctrl.set_input_overflow_notifier(tx);

        ctrl.feed(b"\x1b]133;A\x07\x1b]133;B\x07").await.unwrap();
        ctrl.feed(b"ab").await.unwrap();
        assert!(rx.try_recv().is_err());
        ctrl.feed(b"cd").await.unwrap();
        assert!(rx.try_recv().is_ok());
        ctrl.feed(b"ef").await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn scroll_to_is_the_inverse_of_scroll_by() {
        let ctrl = Controller::new(10, 3, RecordingSink::default());
        for _ in 0..5 {
            ctrl.feed(b"line\n").await.unwrap();
        }
        let live_edge = ctrl.live_edge_base().await;
        ctrl.scroll_to(0).await;
        assert_eq!(ctrl.scroll_offset().await, live_edge);

        ctrl.scroll_to(live_edge).await;
        assert_eq!(ctrl.scroll_offset().await, 0);

        // Out-of-range targets clamp rather than panic.
        ctrl.scroll_to(live_edge + 1000).await;
        assert_eq!(ctrl.scroll_offset().await, 0);
    }

    #[tokio::test]
    async fn vterm_view_reflects_shell_integration_phase_and_scroll_state() {
        let ctrl = Controller::new(10, 3, RecordingSink::default());
        ctrl.feed(b"\x1b]133;A\x07\x1b]133;B\x07").await.unwrap();
        let view = ctrl.vterm().await;
        assert!(view.input_active);
        assert!(!view.command_active);
        assert!(!view.prompt_active);
        assert_eq!(view.input_start_col, Some((0, 0)));

        ctrl.feed(b"line\n").await.unwrap();
        ctrl.scroll_by(1).await;
        let view = ctrl.vterm().await;
        assert_eq!(view.scroll_offset, 1);
        assert_eq!(view.live_edge, ctrl.live_edge_base().await);
    }

    #[tokio::test]
    async fn cursor_reports_position_and_visibility() {
        let ctrl = Controller::new(10, 3, RecordingSink::default());
        ctrl.feed(b"hi").await.unwrap();
        assert_eq!(ctrl.cursor().await, (0, 2, true));

        ctrl.feed(b"\x1b[?25l").await.unwrap();
        assert_eq!(ctrl.cursor().await, (0, 2, false));
    }
}
