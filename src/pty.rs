//! PTY collaborator — the byte sink the core reads from and writes to.
//!
//! The core never spawns processes itself; it is handed anything that can
//! produce and accept bytes. [`PortablePty`] is the concrete adapter over
//! `portable-pty`, grounded in the teacher's own PTY session wrapper.

use std::io::{Read, Write};
use std::sync::{Arc, Mutex};

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};

use crate::error::{Error, Result};

/// Minimal interface the controller needs from a PTY (or any other byte
/// stream standing in for one, e.g. in tests).
pub trait ByteSink: Send {
    /// Write bytes to the remote side (typically the shell's stdin).
    fn write_bytes(&mut self, data: &[u8]) -> Result<()>;
    /// Resize the remote side's notion of terminal size.
    fn resize(&mut self, cols: u16, rows: u16) -> Result<()>;
}

/// A spawned PTY session: the child process plus its master handle.
pub struct PortablePty {
    master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    child: Box<dyn Child + Send + Sync>,
}

impl PortablePty {
    /// Spawn `command` attached to a fresh PTY of the given size.
    pub fn spawn(command: CommandBuilder, cols: u16, rows: u16) -> Result<Self> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize { rows, cols, pixel_width: 0, pixel_height: 0 })
            .map_err(|e| Error::PtyIo(std::io::Error::other(e)))?;
        let child = pair
            .slave
            .spawn_command(command)
            .map_err(|e| Error::PtyIo(std::io::Error::other(e)))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| Error::PtyIo(std::io::Error::other(e)))?;
        drop(pair.slave);
        Ok(Self { master: pair.master, writer, child })
    }

    /// A reader for the PTY's output, to be pumped on its own task/thread.
    pub fn take_reader(&self) -> Result<Box<dyn Read + Send>> {
        self.master.try_clone_reader().map_err(|e| Error::PtyIo(std::io::Error::other(e)))
    }

    /// Block until the child exits.
    pub fn wait(&mut self) -> Result<()> {
        self.child.wait().map_err(|e| Error::PtyIo(std::io::Error::other(e)))?;
        Ok(())
    }
}

impl ByteSink for PortablePty {
    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data).map_err(Error::PtyIo)
    }

    fn resize(&mut self, cols: u16, rows: u16) -> Result<()> {
        self.master
            .resize(PtySize { rows, cols, pixel_width: 0, pixel_height: 0 })
            .map_err(|e| Error::PtyIo(std::io::Error::other(e)))
    }
}

/// A `ByteSink` wrapping an in-memory buffer, for tests that exercise the
/// controller without a real PTY.
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub written: Arc<Mutex<Vec<u8>>>,
    pub last_size: Arc<Mutex<(u16, u16)>>,
}

impl ByteSink for RecordingSink {
    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.written.lock().unwrap().extend_from_slice(data);
        Ok(())
    }

    fn resize(&mut self, cols: u16, rows: u16) -> Result<()> {
        *self.last_size.lock().unwrap() = (cols, rows);
        Ok(())
    }
}
