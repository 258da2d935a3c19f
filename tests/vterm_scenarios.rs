//! End-to-end scenarios driving the parser + VTerm together, checking both
//! the projected grid and scrollback commits for each.

use texelterm::{Color, VTHandler, VTerm, VtParser};

fn feed(vterm: &mut VTerm, bytes: &[u8]) {
    let mut parser = VtParser::new();
    parser.advance(vterm, bytes);
}

#[test]
fn plain_wrap_splits_a_long_line_across_rows() {
    let mut vterm = VTerm::new(4, 4);
    feed(&mut vterm, b"abcdefgh");
    assert_eq!(vterm.screen().cell(0, 3).rune, 'd');
    assert!(vterm.screen().cell(0, 3).wrapped);
    assert_eq!(vterm.screen().cell(1, 0).rune, 'e');
    assert_eq!(vterm.screen().cell(1, 3).rune, 'h');
}

#[test]
fn erase_paints_with_background_in_effect_not_default() {
    let mut vterm = VTerm::new(6, 1);
    feed(&mut vterm, b"\x1b[44mhi\x1b[0J");
    // Erase from cursor (col 2) to end of line/display should be blank
    // but still carry the blue background that was active at erase time.
    assert_eq!(vterm.screen().cell(0, 2).bg, Color::Standard(4));
    assert_eq!(vterm.screen().cell(0, 2).rune, ' ');
}

#[test]
fn alt_screen_round_trip_never_touches_scrollback() {
    let mut vterm = VTerm::new(10, 3);
    feed(&mut vterm, b"a\nb\nc\n"); // scrolls the primary screen
    let before = vterm.take_committed_lines().len();
    feed(&mut vterm, b"\x1b[?1049h");
    feed(&mut vterm, b"alt content\n\n\n\n\n");
    assert!(vterm.take_committed_lines().is_empty());
    feed(&mut vterm, b"\x1b[?1049l");
    assert!(before >= 1);
    assert!(!vterm.in_alt_screen());
}

#[test]
fn scroll_region_confines_line_feed_scrolling() {
    let mut vterm = VTerm::new(5, 5);
    feed(&mut vterm, b"\x1b[2;4r"); // region rows 2..=4 (1-based) -> 1..=3 0-based
    feed(&mut vterm, b"\x1b[4;1H"); // move to the region's bottom row
    feed(&mut vterm, b"bottom");
    // Row 0 (outside the region) must be untouched by the region-confined scroll.
    feed(&mut vterm, b"\n\n\n\n");
    assert!(vterm.screen().cell(0, 0).is_uninitialized());
}

#[test]
fn shell_integration_osc133_marks_input_region() {
    let mut vterm = VTerm::new(20, 3);
    feed(&mut vterm, b"$ \x1b]133;A\x07\x1b]133;B\x07");
    feed(&mut vterm, b"echo hi");
    feed(&mut vterm, b"\x1b]133;C\x07");
    assert_eq!(vterm.shell_phase(), texelterm::ShellPhase::CommandActive);
}

#[test]
fn reflow_preserves_content_when_widening_a_soft_wrapped_paragraph() {
    let mut vterm = VTerm::new(4, 4);
    feed(&mut vterm, b"abcdefgh");
    let row0: String = vterm.screen().row_cells(0).iter().map(|c| c.contents()).collect();
    let row1: String = vterm.screen().row_cells(1).iter().map(|c| c.contents()).collect();
    assert_eq!(format!("{row0}{row1}"), "abcdefgh");
}
