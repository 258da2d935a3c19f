//! Keyboard input encoding — turns a logical key press into the byte
//! sequence the PTY-attached program expects, honoring cursor-key mode and
//! xterm's modifier-encoding convention.

/// A non-printable key. Printable characters are sent as their UTF-8
/// bytes directly by the caller and never go through this encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Up,
    Down,
    Right,
    Left,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    Delete,
    Backspace,
    Tab,
    Enter,
    Escape,
    F(u8),
}

/// Modifier bits, combined per xterm's `CSI 1;<n><letter>` encoding where
/// `n = 1 + (shift ? 1 : 0) + (alt ? 2 : 0) + (ctrl ? 4 : 0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub alt: bool,
    pub ctrl: bool,
}

impl Modifiers {
    fn is_none(&self) -> bool {
        !self.shift && !self.alt && !self.ctrl
    }

    fn xterm_code(&self) -> u8 {
        1 + (self.shift as u8) + (self.alt as u8) * 2 + (self.ctrl as u8) * 4
    }
}

/// Encode `key` into the byte sequence to write to the PTY.
///
/// `application_cursor_keys` selects `SS3` (`ESC O`) vs `CSI` framing for
/// the arrow/Home/End cluster, per DECCKM.
pub fn encode(key: Key, modifiers: Modifiers, application_cursor_keys: bool) -> Vec<u8> {
    let plain_letter = match key {
        Key::Up => Some(b'A'),
        Key::Down => Some(b'B'),
        Key::Right => Some(b'C'),
        Key::Left => Some(b'D'),
        Key::Home => Some(b'H'),
        Key::End => Some(b'F'),
        _ => None,
    };

    if let Some(letter) = plain_letter {
        return if modifiers.is_none() {
            if application_cursor_keys {
                vec![0x1b, b'O', letter]
            } else {
                vec![0x1b, b'[', letter]
            }
        } else {
            format!("\x1b[1;{}{}", modifiers.xterm_code(), letter as char).into_bytes()
        };
    }

    match key {
        Key::PageUp => csi_tilde(5, modifiers),
        Key::PageDown => csi_tilde(6, modifiers),
        Key::Insert => csi_tilde(2, modifiers),
        Key::Delete => csi_tilde(3, modifiers),
        Key::Backspace => vec![0x7f],
        Key::Tab => {
            if modifiers.shift {
                vec![0x1b, b'[', b'Z']
            } else {
                vec![b'\t']
            }
        }
        Key::Enter => vec![b'\r'],
        Key::Escape => vec![0x1b],
        Key::F(n) => encode_function_key(n, modifiers),
        Key::Up | Key::Down | Key::Right | Key::Left | Key::Home | Key::End => unreachable!(),
    }
}

fn csi_tilde(code: u8, modifiers: Modifiers) -> Vec<u8> {
    if modifiers.is_none() {
        format!("\x1b[{code}~").into_bytes()
    } else {
        format!("\x1b[{code};{}~", modifiers.xterm_code()).into_bytes()
    }
}

fn encode_function_key(n: u8, modifiers: Modifiers) -> Vec<u8> {
    // F1-F4 use SS3 framing when unmodified; F5 and up (and any modified
    // function key) use the CSI-tilde cluster per xterm's numbering.
    if modifiers.is_none() {
        if let Some(letter) = match n {
            1 => Some(b'P'),
            2 => Some(b'Q'),
            3 => Some(b'R'),
            4 => Some(b'S'),
            _ => None,
        } {
            return vec![0x1b, b'O', letter];
        }
    }
    let code = match n {
        1 => 11,
        2 => 12,
        3 => 13,
        4 => 14,
        5 => 15,
        6 => 17,
        7 => 18,
        8 => 19,
        9 => 20,
        10 => 21,
        11 => 23,
        12 => 24,
        _ => return Vec::new(),
    };
    csi_tilde(code, modifiers)
}
