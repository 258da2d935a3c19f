//! texelterm — the terminal emulation core of Texelation.
//!
//! A VT/ANSI parser and cell grid with a three-level scrollback model:
//! disk history, an in-memory scrollback window, and the display buffer a
//! renderer actually draws from. Width-independent logical lines let
//! scrollback reflow cleanly across a resize.
//!
//! # Architecture
//!
//! ```text
//! PTY bytes -> VtParser -> VTerm (screen + cursor + modes)
//!                              |
//!                      committed lines
//!                              v
//!                      ScrollbackWindow <-> DiskHistory
//!                              |
//!                              v
//!                        DisplayBuffer  (dirty rows -> renderer)
//! ```
//!
//! [`Controller`] wires all of the above behind a single lock, matching a
//! one-PTY-reader-task / one-key-writer-task concurrency model.

pub mod cell;
pub mod config;
pub mod controller;
pub mod display;
pub mod error;
pub mod history;
pub mod key;
pub mod line;
pub mod logging;
pub mod parser;
pub mod pty;
pub mod screen;
pub mod scrollback;
pub mod vterm;

pub use cell::{AttrSet, Cell, Color, SgrState};
pub use config::RuntimeConfig;
pub use controller::{Controller, VTermView};
pub use display::{DisplayBuffer, ProjectedRow};
pub use error::{Error, Result};
pub use history::DiskHistory;
pub use key::{Key, Modifiers};
pub use line::LogicalLine;
pub use parser::{CsiParams, VTHandler, VtParser};
pub use pty::{ByteSink, PortablePty};
pub use screen::{Cursor, Screen, ScrollRegion};
pub use scrollback::{GlobalLineIdx, ScrollbackWindow};
pub use vterm::{ShellPhase, VTerm};
