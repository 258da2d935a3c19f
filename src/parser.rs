//! VT/ANSI byte-level parser.
//!
//! Thin wrapper around [`vte::Parser`], the same state-machine engine used
//! by other in-memory terminal implementations (e.g. shpool's vterm): it
//! handles C0/C1 control bytes, CSI, OSC, DCS and ESC framing, and calls
//! back into a [`VTHandler`] we implement ourselves rather than adopting a
//! full screen model from the `vte` crate's consumers.

use vte::Params;

/// At most this many CSI parameters are inspected; extras are ignored
/// rather than causing an error, matching real terminal behavior.
pub const MAX_CSI_PARAMS: usize = 16;

/// A borrowed view over CSI parameters, each itself a list of colon-joined
/// sub-parameters (used by SGR 38/48 extended color sequences).
pub struct CsiParams<'a> {
    inner: &'a Params,
}

impl<'a> CsiParams<'a> {
    fn new(inner: &'a Params) -> Self {
        Self { inner }
    }

    /// Number of parameter groups present, clamped to [`MAX_CSI_PARAMS`].
    pub fn len(&self) -> usize {
        self.inner.iter().count().min(MAX_CSI_PARAMS)
    }

    /// Whether no parameters were supplied at all.
    pub fn is_empty(&self) -> bool {
        self.inner.iter().next().is_none()
    }

    /// The sub-parameter slice at group `i` (e.g. `[38, 2, 255, 0, 0]`
    /// arrives as groups `[38]`, `[2]`, `[255]`, `[0]`, `[0]` when
    /// semicolon-joined, or as one group `[38, 2, 255, 0, 0]` when
    /// colon-joined). Returns an empty slice past [`MAX_CSI_PARAMS`] or
    /// past the end of what was supplied.
    pub fn group(&self, i: usize) -> &'a [u16] {
        if i >= MAX_CSI_PARAMS {
            return &[];
        }
        self.inner.iter().nth(i).unwrap_or(&[])
    }

    /// The first value in group `i`, or `default` if the group is absent
    /// or explicitly empty (`CSI ;5H` leaves the first parameter empty).
    pub fn get(&self, i: usize, default: u16) -> u16 {
        match self.group(i) {
            [] => default,
            [v, ..] => if *v == 0 { default } else { *v },
        }
    }

    /// Like [`CsiParams::get`] but treats an explicit `0` as significant
    /// (needed for e.g. SGR codes, where `0` means reset, not "default").
    pub fn get_raw(&self, i: usize, default: u16) -> u16 {
        match self.group(i) {
            [] => default,
            [v, ..] => *v,
        }
    }

    /// Iterate all groups, already clamped to [`MAX_CSI_PARAMS`].
    pub fn iter(&self) -> impl Iterator<Item = &'a [u16]> + '_ {
        self.inner.iter().take(MAX_CSI_PARAMS)
    }
}

/// Callback surface a [`VtParser`] drives as it decodes a byte stream.
///
/// Mirrors [`vte::Perform`] but hides `vte`'s `Params` type behind
/// [`CsiParams`] so the rest of the core doesn't depend on `vte` directly.
pub trait VTHandler {
    /// A printable character, already UTF-8 decoded.
    fn print(&mut self, c: char);
    /// A C0/C1 control byte (e.g. `\n`, `\r`, `\x08`).
    fn execute(&mut self, byte: u8);
    /// A complete CSI sequence, e.g. `CSI 1;2H`.
    fn csi_dispatch(&mut self, params: &CsiParams<'_>, intermediates: &[u8], ignore: bool, action: char);
    /// A complete two-byte (or intermediate-prefixed) escape sequence.
    fn esc_dispatch(&mut self, intermediates: &[u8], ignore: bool, byte: u8);
    /// A complete OSC sequence, already split on `;`.
    fn osc_dispatch(&mut self, params: &[&[u8]], bell_terminated: bool);
    /// DCS hook — start of a device control string. Unused by this core's
    /// supported sequence set; default no-op.
    fn hook(&mut self, _params: &CsiParams<'_>, _intermediates: &[u8], _ignore: bool, _action: char) {}
    /// DCS payload byte.
    fn put(&mut self, _byte: u8) {}
    /// DCS terminator.
    fn unhook(&mut self) {}
}

/// Drives a [`VTHandler`] from a raw byte stream.
#[derive(Default)]
pub struct VtParser {
    inner: vte::Parser,
}

impl VtParser {
    /// A fresh parser with no pending escape state.
    pub fn new() -> Self {
        Self { inner: vte::Parser::new() }
    }

    /// Feed a chunk of PTY output through the parser, invoking `handler`
    /// for every completed token.
    pub fn advance<H: VTHandler>(&mut self, handler: &mut H, bytes: &[u8]) {
        let mut adapter = PerformAdapter { handler };
        for &byte in bytes {
            self.inner.advance(&mut adapter, byte);
        }
    }
}

struct PerformAdapter<'h, H: VTHandler> {
    handler: &'h mut H,
}

impl<'h, H: VTHandler> vte::Perform for PerformAdapter<'h, H> {
    fn print(&mut self, c: char) {
        self.handler.print(c);
    }

    fn execute(&mut self, byte: u8) {
        self.handler.execute(byte);
    }

    fn hook(&mut self, params: &Params, intermediates: &[u8], ignore: bool, action: char) {
        self.handler.hook(&CsiParams::new(params), intermediates, ignore, action);
    }

    fn put(&mut self, byte: u8) {
        self.handler.put(byte);
    }

    fn unhook(&mut self) {
        self.handler.unhook();
    }

    fn osc_dispatch(&mut self, params: &[&[u8]], bell_terminated: bool) {
        self.handler.osc_dispatch(params, bell_terminated);
    }

    fn csi_dispatch(&mut self, params: &Params, intermediates: &[u8], ignore: bool, action: char) {
        self.handler.csi_dispatch(&CsiParams::new(params), intermediates, ignore, action);
    }

    fn esc_dispatch(&mut self, intermediates: &[u8], ignore: bool, byte: u8) {
        self.handler.esc_dispatch(intermediates, ignore, byte);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        printed: String,
        csi: Vec<(char, Vec<u16>)>,
        osc: Vec<Vec<u8>>,
    }

    impl VTHandler for Recorder {
        fn print(&mut self, c: char) {
            self.printed.push(c);
        }
        fn execute(&mut self, _byte: u8) {}
        fn csi_dispatch(&mut self, params: &CsiParams<'_>, _intermediates: &[u8], _ignore: bool, action: char) {
            let first_of_each: Vec<u16> = params.iter().map(|g| g.first().copied().unwrap_or(0)).collect();
            self.csi.push((action, first_of_each));
        }
        fn esc_dispatch(&mut self, _intermediates: &[u8], _ignore: bool, _byte: u8) {}
        fn osc_dispatch(&mut self, params: &[&[u8]], _bell_terminated: bool) {
            self.osc.push(params.concat());
        }
    }

    #[test]
    fn prints_plain_text() {
        let mut parser = VtParser::new();
        let mut rec = Recorder::default();
        parser.advance(&mut rec, b"hello");
        assert_eq!(rec.printed, "hello");
    }

    #[test]
    fn decodes_csi_cursor_position() {
        let mut parser = VtParser::new();
        let mut rec = Recorder::default();
        parser.advance(&mut rec, b"\x1b[12;34H");
        assert_eq!(rec.csi, vec![('H', vec![12, 34])]);
    }

    #[test]
    fn decodes_osc_title() {
        let mut parser = VtParser::new();
        let mut rec = Recorder::default();
        parser.advance(&mut rec, b"\x1b]0;my title\x07");
        assert_eq!(rec.osc, vec![b"0my title".to_vec()]);
    }

    #[test]
    fn missing_csi_param_defaults_via_get() {
        let mut parser = VtParser::new();
        let mut rec = Recorder::default();
        struct DefaultsCheck(bool);
        impl VTHandler for DefaultsCheck {
            fn print(&mut self, _c: char) {}
            fn execute(&mut self, _byte: u8) {}
            fn csi_dispatch(&mut self, params: &CsiParams<'_>, _i: &[u8], _ig: bool, action: char) {
                if action == 'H' {
                    assert_eq!(params.get(0, 1), 1);
                    assert_eq!(params.get(1, 1), 1);
                }
            }
            fn esc_dispatch(&mut self, _i: &[u8], _ig: bool, _b: u8) {}
            fn osc_dispatch(&mut self, _p: &[&[u8]], _b: bool) {}
        }
        let mut checker = DefaultsCheck(false);
        parser.advance(&mut checker, b"\x1b[H");
        let _ = &mut rec;
    }
}
