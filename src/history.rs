//! Disk history log — TXHIST02.
//!
//! An append-only binary file mapping `GlobalLineIdx -> LogicalLine`, with
//! a companion sparse index of `(global_idx, byte_offset)` every
//! [`DiskHistory::INDEX_STRIDE`] records. Created lazily, appended only,
//! never rewritten — one file per terminal session.
//!
//! # Wire format
//!
//! ```text
//! file   := MAGIC record*
//! MAGIC  := "TXHIST02"                      (8 bytes)
//! record := u32_le(body_len) body
//! body   := varint(global_idx) u8(flags) varint(fixed_width)
//!           varint(cell_count) cell*
//! cell   := varint(rune) u8(attr) color(fg) color(bg)
//! color  := u8(tag) payload
//!           tag 0 = default        (no payload)
//!           tag 1 = standard       (1 byte: index 0..=15)
//!           tag 2 = palette256     (1 byte: index)
//!           tag 3 = rgb            (3 bytes: r g b)
//! flags  := bit 0: soft_wrapped
//! ```
//!
//! Index file: back-to-back `(u64_le global_idx, u64_le offset)` pairs,
//! one every `INDEX_STRIDE` records, no header.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::cell::{AttrSet, Cell, Color};
use crate::error::{Error, Result};
use crate::line::LogicalLine;

const MAGIC: &[u8; 8] = b"TXHIST02";

/// Flag bit: line was soft-wrapped at its tail.
const FLAG_SOFT_WRAPPED: u8 = 1 << 0;

/// A sparse `(global_idx, offset)` checkpoint.
type Checkpoint = (u64, u64);

/// Append-only, indexed store of committed logical lines.
pub struct DiskHistory {
    path: PathBuf,
    index_path: PathBuf,
    data: BufWriter<File>,
    /// Byte offset the next record will be written at.
    write_offset: u64,
    /// Records appended since the file was created (for index striding).
    records_appended: u64,
    /// In-memory mirror of the sparse index, ascending by global_idx.
    index: Vec<Checkpoint>,
}

impl DiskHistory {
    /// Sparse index checkpoint interval, per spec.md's recommendation.
    pub const INDEX_STRIDE: u64 = 256;

    /// Create a fresh history file at `dir`, named after the session.
    ///
    /// Per §3, disk history is created once per terminal session and never
    /// reused — an existing file at the same path is truncated.
    pub fn create(dir: &Path, session_name: &str) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|source| Error::DiskUnavailable {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = dir.join(format!("{session_name}.txhist"));
        let index_path = dir.join(format!("{session_name}.txhist.idx"));

        let mut file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| Error::DiskUnavailable { path: path.clone(), source })?;
        file.write_all(MAGIC).map_err(|source| Error::DiskUnavailable {
            path: path.clone(),
            source,
        })?;
        let _ = File::create(&index_path).map_err(|source| Error::DiskUnavailable {
            path: index_path.clone(),
            source,
        })?;

        Ok(Self {
            path,
            index_path,
            data: BufWriter::new(file),
            write_offset: MAGIC.len() as u64,
            records_appended: 0,
            index: Vec::new(),
        })
    }

    /// Path to the data file, exposed so an external tool can delete it —
    /// retention policy is explicitly a deployment concern (§9 open
    /// questions), not something this type enforces.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a logical line under `global_idx`. Optionally fsyncs.
    pub fn append(&mut self, global_idx: u64, line: &LogicalLine, fsync: bool) -> Result<()> {
        let body = encode_record(global_idx, line);
        let len = body.len() as u32;

        let offset = self.write_offset;
        self.data
            .write_all(&len.to_le_bytes())
            .and_then(|()| self.data.write_all(&body))
            .map_err(|source| Error::DiskUnavailable { path: self.path.clone(), source })?;
        self.write_offset += 4 + body.len() as u64;
        self.records_appended += 1;

        if self.records_appended % Self::INDEX_STRIDE == 0 {
            self.checkpoint(global_idx, offset)?;
        }
        if fsync {
            self.data
                .flush()
                .and_then(|()| self.data.get_ref().sync_data())
                .map_err(|source| Error::DiskUnavailable { path: self.path.clone(), source })?;
        }
        Ok(())
    }

    fn checkpoint(&mut self, global_idx: u64, offset: u64) -> Result<()> {
        self.index.push((global_idx, offset));
        let mut idx_file = OpenOptions::new()
            .append(true)
            .open(&self.index_path)
            .map_err(|source| Error::DiskUnavailable { path: self.index_path.clone(), source })?;
        idx_file
            .write_all(&global_idx.to_le_bytes())
            .and_then(|()| idx_file.write_all(&offset.to_le_bytes()))
            .map_err(|source| Error::DiskUnavailable { path: self.index_path.clone(), source })?;
        Ok(())
    }

    /// Read the logical line committed under `global_idx`.
    ///
    /// Binary-searches the sparse index for the nearest earlier
    /// checkpoint, then scans forward.
    pub fn read(&mut self, global_idx: u64) -> Result<LogicalLine> {
        self.data.flush().map_err(|source| Error::DiskUnavailable {
            path: self.path.clone(),
            source,
        })?;
        let start_offset = nearest_checkpoint_offset(&self.index, global_idx);
        let mut reader = self.data.get_ref().try_clone().map_err(|source| {
            Error::DiskUnavailable { path: self.path.clone(), source }
        })?;
        scan_for(&mut reader, &self.path, start_offset, global_idx)
    }

    /// Iterate committed lines `[start, end)`, in ascending order. Pages a
    /// contiguous window in for the scrollback's proactive margin paging.
    pub fn range(&mut self, start: u64, end: u64) -> Result<Vec<(u64, LogicalLine)>> {
        self.data.flush().map_err(|source| Error::DiskUnavailable {
            path: self.path.clone(),
            source,
        })?;
        let start_offset = nearest_checkpoint_offset(&self.index, start);
        let mut reader = self.data.get_ref().try_clone().map_err(|source| {
            Error::DiskUnavailable { path: self.path.clone(), source }
        })?;
        reader.seek(SeekFrom::Start(start_offset)).map_err(|source| Error::DiskUnavailable {
            path: self.path.clone(),
            source,
        })?;

        let mut out = Vec::new();
        loop {
            match read_one_record(&mut reader) {
                Ok(Some((idx, line))) => {
                    if idx >= end {
                        break;
                    }
                    if idx >= start {
                        out.push((idx, line));
                    }
                }
                Ok(None) => break,
                Err(detail) => {
                    let last_good = reader
                        .stream_position()
                        .unwrap_or(start_offset);
                    log::warn!(
                        "TXHIST02 integrity error in {:?} at offset {last_good}: {detail}",
                        self.path
                    );
                    return Err(Error::DiskIntegrity {
                        path: self.path.clone(),
                        last_good_offset: last_good,
                        detail,
                    });
                }
            }
        }
        Ok(out)
    }
}

fn nearest_checkpoint_offset(index: &[Checkpoint], global_idx: u64) -> u64 {
    match index.binary_search_by_key(&global_idx, |&(idx, _)| idx) {
        Ok(pos) => index[pos].1,
        Err(0) => MAGIC.len() as u64,
        Err(pos) => index[pos - 1].1,
    }
}

fn scan_for(
    reader: &mut File,
    path: &Path,
    start_offset: u64,
    target: u64,
) -> Result<LogicalLine> {
    reader.seek(SeekFrom::Start(start_offset)).map_err(|source| Error::DiskUnavailable {
        path: path.to_path_buf(),
        source,
    })?;
    loop {
        match read_one_record(reader) {
            Ok(Some((idx, line))) => {
                if idx == target {
                    return Ok(line);
                }
                if idx > target {
                    return Err(Error::PagingMiss(target));
                }
            }
            Ok(None) => return Err(Error::PagingMiss(target)),
            Err(detail) => {
                let last_good = reader.stream_position().unwrap_or(start_offset);
                return Err(Error::DiskIntegrity {
                    path: path.to_path_buf(),
                    last_good_offset: last_good,
                    detail,
                });
            }
        }
    }
}

/// Reads one `(global_idx, LogicalLine)` record. `Ok(None)` at clean EOF,
/// `Err` on a broken record the caller should treat as corruption.
fn read_one_record(reader: &mut File) -> std::result::Result<Option<(u64, LogicalLine)>, String> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(format!("reading record length: {e}")),
    }
    let len = u32::from_le_bytes(len_buf) as usize;
    if len > 64 * 1024 * 1024 {
        return Err(format!("implausible record length {len}"));
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).map_err(|e| format!("reading record body: {e}"))?;
    decode_record(&body).map(Some)
}

fn encode_record(global_idx: u64, line: &LogicalLine) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + line.len() * 6);
    write_varint(&mut out, global_idx);
    let flags = if line.soft_wrapped { FLAG_SOFT_WRAPPED } else { 0 };
    out.push(flags);
    write_varint(&mut out, line.fixed_width as u64);
    write_varint(&mut out, line.len() as u64);
    for cell in line.cells() {
        write_varint(&mut out, cell.rune as u64);
        out.push(cell.attr.bits() as u8);
        write_color(&mut out, cell.fg);
        write_color(&mut out, cell.bg);
    }
    out
}

fn decode_record(body: &[u8]) -> std::result::Result<(u64, LogicalLine), String> {
    let mut cur = Cursor { buf: body, pos: 0 };
    let global_idx = read_varint(&mut cur)?;
    let flags = cur.byte()?;
    let fixed_width = read_varint(&mut cur)? as u16;
    let cell_count = read_varint(&mut cur)? as usize;
    if cell_count > 1_000_000 {
        return Err(format!("implausible cell count {cell_count}"));
    }
    let mut cells = Vec::with_capacity(cell_count);
    for _ in 0..cell_count {
        let rune_code = read_varint(&mut cur)?;
        let rune = char::from_u32(rune_code as u32).unwrap_or('\u{FFFD}');
        let attr_bits = cur.byte()?;
        let attr = AttrSet::from_bits_truncate(attr_bits as u16);
        let fg = read_color(&mut cur)?;
        let bg = read_color(&mut cur)?;
        cells.push(Cell { rune, fg, bg, attr, wrapped: false });
    }
    let mut line = LogicalLine::reflowable(cells, flags & FLAG_SOFT_WRAPPED != 0);
    line.fixed_width = fixed_width;
    Ok((global_idx, line))
}

fn write_color(out: &mut Vec<u8>, color: Color) {
    match color {
        Color::Default => out.push(0),
        Color::Standard(i) => {
            out.push(1);
            out.push(i);
        }
        Color::Palette256(i) => {
            out.push(2);
            out.push(i);
        }
        Color::Rgb(r, g, b) => {
            out.push(3);
            out.extend_from_slice(&[r, g, b]);
        }
    }
}

fn read_color(cur: &mut Cursor) -> std::result::Result<Color, String> {
    match cur.byte()? {
        0 => Ok(Color::Default),
        1 => Ok(Color::Standard(cur.byte()?)),
        2 => Ok(Color::Palette256(cur.byte()?)),
        3 => Ok(Color::Rgb(cur.byte()?, cur.byte()?, cur.byte()?)),
        tag => Err(format!("unknown color tag {tag}")),
    }
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn byte(&mut self) -> std::result::Result<u8, String> {
        let b = *self.buf.get(self.pos).ok_or("unexpected end of record")?;
        self.pos += 1;
        Ok(b)
    }
}

fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
}

fn read_varint(cur: &mut Cursor) -> std::result::Result<u64, String> {
    let mut result: u64 = 0;
    let mut shift = 0;
    loop {
        let byte = cur.byte()?;
        result |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
        if shift >= 64 {
            return Err("varint too long".to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::SgrState;

    fn sample_line(text: &str, soft_wrapped: bool) -> LogicalLine {
        let sgr = SgrState { fg: Color::Standard(3), bg: Color::Rgb(10, 20, 30), ..SgrState::reset() };
        LogicalLine::reflowable(text.chars().map(|c| Cell::printable(c, &sgr)), soft_wrapped)
    }

    #[test]
    fn append_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut hist = DiskHistory::create(dir.path(), "sess").unwrap();
        hist.append(0, &sample_line("hello", true), false).unwrap();
        hist.append(1, &sample_line("world", false), false).unwrap();

        let line0 = hist.read(0).unwrap();
        assert_eq!(line0.len(), 5);
        assert!(line0.soft_wrapped);
        assert_eq!(line0.cells()[0].rune, 'h');
        assert_eq!(line0.cells()[0].fg, Color::Standard(3));
        assert_eq!(line0.cells()[0].bg, Color::Rgb(10, 20, 30));

        let line1 = hist.read(1).unwrap();
        assert!(!line1.soft_wrapped);
        assert_eq!(line1.cells()[4].rune, 'd');
    }

    #[test]
    fn range_returns_half_open_window() {
        let dir = tempfile::tempdir().unwrap();
        let mut hist = DiskHistory::create(dir.path(), "sess").unwrap();
        for i in 0..10u64 {
            hist.append(i, &sample_line(&i.to_string(), false), false).unwrap();
        }
        let got = hist.range(3, 7).unwrap();
        let idxs: Vec<u64> = got.iter().map(|(i, _)| *i).collect();
        assert_eq!(idxs, vec![3, 4, 5, 6]);
    }

    #[test]
    fn sparse_index_checkpoints_every_stride() {
        let dir = tempfile::tempdir().unwrap();
        let mut hist = DiskHistory::create(dir.path(), "sess").unwrap();
        for i in 0..(DiskHistory::INDEX_STRIDE * 3) {
            hist.append(i, &sample_line("x", false), false).unwrap();
        }
        assert_eq!(hist.index.len(), 3);
        // Reading a line well past the first checkpoint still works via scan-forward.
        let target = DiskHistory::INDEX_STRIDE * 2 + 5;
        let line = hist.read(target).unwrap();
        assert_eq!(line.cells()[0].rune, 'x');
    }

    #[test]
    fn read_missing_line_is_paging_miss() {
        let dir = tempfile::tempdir().unwrap();
        let mut hist = DiskHistory::create(dir.path(), "sess").unwrap();
        hist.append(0, &sample_line("a", false), false).unwrap();
        let err = hist.read(5).unwrap_err();
        assert!(matches!(err, Error::PagingMiss(5)));
    }

    #[test]
    fn varint_round_trips_large_values() {
        let mut buf = Vec::new();
        write_varint(&mut buf, u64::MAX);
        let mut cur = Cursor { buf: &buf, pos: 0 };
        assert_eq!(read_varint(&mut cur).unwrap(), u64::MAX);
    }
}
