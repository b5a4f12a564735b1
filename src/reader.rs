//! The streaming row parser.

use std::io;
#[cfg(unix)]
use std::path::Path;

use log::debug;

use crate::buffered::{
    BufferedCursor, ChunkCursor, IterProducer, PullCursor, PullProducer, ReadCursor, ReadProducer,
};
#[cfg(unix)]
use crate::cursor::MappedFileCursor;
use crate::cursor::StreamCursor;
use crate::error::{Error, Result};
use crate::header::HeaderIndex;
use crate::row::{CsvCursor, ROW_CAPACITY};
use crate::spanner::StringSpanner;

/// Parser position within a record.
#[derive(Clone, Copy, Debug)]
enum State {
    /// Before the first cell of a record; skips blank lines and the second
    /// half of a CRLF consumed by the previous record.
    RowStart,
    /// At the first byte of a new cell.
    CellStart,
    /// Inside a quoted cell, scanning for the closing quote or an escape.
    InQuoted,
    /// One byte past a quote (or escape) hit inside a quoted cell.
    AfterQuoted,
    /// Inside an unquoted cell, scanning for a delimiter, CR, LF, or escape.
    InUnquoted,
    /// At a delimiter, CR, LF, or escape byte ending an unquoted span.
    AfterUnquoted,
}

/// Builds [`CsvReader`]s with non-default configuration.
///
/// # Example
///
/// ```
/// use csvjet::CsvReaderBuilder;
///
/// let data: &[u8] = b"a;b;c\n";
/// let mut reader = CsvReaderBuilder::new().delimiter(b';').from_reader(data);
/// assert!(reader.read_row()?);
/// assert_eq!(reader.row().count(), 3);
/// # Ok::<(), csvjet::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct CsvReaderBuilder {
    delimiter: u8,
    quote: u8,
    escape: Option<u8>,
    yield_incomplete_row: bool,
}

impl Default for CsvReaderBuilder {
    fn default() -> CsvReaderBuilder {
        CsvReaderBuilder {
            delimiter: b',',
            quote: b'"',
            escape: None,
            yield_incomplete_row: false,
        }
    }
}

impl CsvReaderBuilder {
    /// Creates a builder with the default configuration: comma delimiter,
    /// double-quote quoting, no escape byte, incomplete rows dropped.
    pub fn new() -> CsvReaderBuilder {
        CsvReaderBuilder::default()
    }

    /// Sets the field delimiter. Defaults to `,`.
    pub fn delimiter(&mut self, delimiter: u8) -> &mut CsvReaderBuilder {
        self.delimiter = delimiter;
        self
    }

    /// Sets the quoting byte. Defaults to `"`.
    pub fn quote(&mut self, quote: u8) -> &mut CsvReaderBuilder {
        self.quote = quote;
        self
    }

    /// Sets or disables the in-field escape byte. Defaults to none, in which
    /// case a doubled quote is the only escape mechanism.
    pub fn escape(&mut self, escape: Option<u8>) -> &mut CsvReaderBuilder {
        self.escape = escape;
        self
    }

    /// When set, a final record without a terminating newline is still
    /// emitted as a row at end-of-stream. Defaults to `false`.
    pub fn yield_incomplete_row(&mut self, yes: bool) -> &mut CsvReaderBuilder {
        self.yield_incomplete_row = yes;
        self
    }

    /// Builds a reader over any [`StreamCursor`].
    pub fn build<C: StreamCursor>(&self, cursor: C) -> CsvReader<C> {
        let escape = self.escape.unwrap_or(0);
        CsvReader {
            cursor,
            row: CsvCursor::new(),
            quoted: StringSpanner::new(&[self.quote, escape]),
            unquoted: StringSpanner::new(&[self.delimiter, b'\r', b'\n', escape]),
            delimiter: self.delimiter,
            quote: self.quote,
            escape,
            yield_incomplete_row: self.yield_incomplete_row,
            in_newline_skip: false,
        }
    }

    /// Memory-maps the file at `path` and builds a reader over it.
    #[cfg(unix)]
    pub fn open_path<P: AsRef<Path>>(&self, path: P) -> Result<CsvReader<MappedFileCursor>> {
        Ok(self.build(MappedFileCursor::open(path)?))
    }

    /// Builds a reader over any [`io::Read`] source.
    pub fn from_reader<R: io::Read>(&self, reader: R) -> CsvReader<ReadCursor<R>> {
        self.build(BufferedCursor::new(ReadProducer::new(reader)))
    }

    /// Builds a reader over a pull-callable yielding byte chunks; an empty
    /// chunk signals end-of-stream.
    pub fn from_pull<F>(&self, pull: F) -> CsvReader<PullCursor<F>>
    where
        F: FnMut() -> io::Result<Vec<u8>>,
    {
        self.build(BufferedCursor::new(PullProducer::new(pull)))
    }

    /// Builds a reader over an iterator of byte chunks; exhaustion or an
    /// empty chunk signals end-of-stream.
    pub fn from_chunks<I>(&self, chunks: I) -> CsvReader<ChunkCursor<I::IntoIter>>
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        self.build(BufferedCursor::new(IterProducer::new(chunks.into_iter())))
    }
}

/// A streaming CSV parser over a [`StreamCursor`].
///
/// The reader repeatedly carves rows out of the cursor's window, asking the
/// cursor to refill whenever a record cannot be completed within it. Rows
/// arrive in input order; the cells of the current row are zero-copy views
/// into the window and stay valid until the next [`read_row`](Self::read_row).
///
/// A reader is single-pass: one cursor feeds exactly one reader, and there is
/// no rewinding.
///
/// # Example
///
/// ```
/// use csvjet::CsvReader;
///
/// let data: &[u8] = b"foo,bar\nbaz,quux\n";
/// let mut reader = CsvReader::new(data);
/// let mut rows = 0;
/// while reader.read_row()? {
///     assert_eq!(reader.row().count(), 2);
///     rows += 1;
/// }
/// reader.finish()?;
/// assert_eq!(rows, 2);
/// # Ok::<(), csvjet::Error>(())
/// ```
#[derive(Debug)]
pub struct CsvReader<C> {
    cursor: C,
    row: CsvCursor,
    quoted: StringSpanner,
    unquoted: StringSpanner,
    delimiter: u8,
    quote: u8,
    /// Zero when no escape byte is configured.
    escape: u8,
    yield_incomplete_row: bool,
    in_newline_skip: bool,
}

impl<R: io::Read> CsvReader<ReadCursor<R>> {
    /// Creates a default-configured reader over any [`io::Read`] source.
    ///
    /// Use a [`CsvReaderBuilder`] to change the delimiter, quoting, or
    /// end-of-stream behaviour, or to parse a memory-mapped file.
    pub fn new(reader: R) -> CsvReader<ReadCursor<R>> {
        CsvReaderBuilder::new().from_reader(reader)
    }
}

#[cfg(unix)]
impl CsvReader<MappedFileCursor> {
    /// Memory-maps the file at `path` and creates a default-configured
    /// reader over it.
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<CsvReader<MappedFileCursor>> {
        CsvReaderBuilder::new().open_path(path)
    }
}

impl<C: StreamCursor> CsvReader<C> {
    /// Parses the next record.
    ///
    /// Returns `Ok(true)` when a row is available through [`row`](Self::row),
    /// `Ok(false)` at a clean end of stream, and `Err` when the producer
    /// fails or a record exceeds [`ROW_CAPACITY`] cells.
    pub fn read_row(&mut self) -> Result<bool> {
        loop {
            if let Some(consumed) = self.try_parse(false)? {
                self.cursor.consume(consumed);
                return Ok(true);
            }
            debug!("record did not fit the window; refilling past {} pending bytes", self.cursor.size());
            if !self.cursor.fill()? {
                break;
            }
        }

        if self.yield_incomplete_row {
            if let Some(consumed) = self.try_parse(true)? {
                self.cursor.consume(consumed);
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Returns the most recently parsed row.
    pub fn row(&self) -> &CsvCursor {
        &self.row
    }

    /// Reports whether the parser stopped cleanly between records.
    ///
    /// After `read_row` returns `Ok(false)`, this distinguishes a benign
    /// trailing newline (or an emitted incomplete row) from a record cut off
    /// mid-parse.
    pub fn in_newline_skip(&self) -> bool {
        self.in_newline_skip
    }

    /// Verifies that the stream ended cleanly between records.
    ///
    /// Returns [`Error::TrailingBytes`] when unparsed bytes remain and the
    /// parser was cut off mid-record, which indicates a missing final
    /// newline or unbalanced quotes.
    pub fn finish(&self) -> Result<()> {
        let count = self.cursor.size();
        if count > 0 && !self.in_newline_skip {
            return Err(Error::TrailingBytes { count });
        }
        Ok(())
    }

    /// Reads the next record and builds a [`HeaderIndex`] from it.
    pub fn read_header(&mut self) -> Result<HeaderIndex> {
        if !self.read_row()? {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "could not read header row",
            )));
        }
        Ok(HeaderIndex::from_row(&self.row, self.quote, self.escape))
    }

    /// Finds the column of the current row whose value equals `value`,
    /// materializing escaped cells with this reader's configuration.
    pub fn find_column(&self, value: &[u8]) -> Option<usize> {
        self.row.by_value(value, self.quote, self.escape)
    }

    /// The configured quoting byte.
    pub fn quote(&self) -> u8 {
        self.quote
    }

    /// The configured escape byte, or zero when none is set.
    pub fn escape(&self) -> u8 {
        self.escape
    }

    /// Attempts to parse one record out of the cursor's current window.
    ///
    /// Returns the number of window bytes consumed by a completed record, or
    /// `None` when the record ran past the window end. With `at_eof` set,
    /// the window end itself terminates the record for any cell not inside
    /// an open quote.
    fn try_parse(&mut self, at_eof: bool) -> Result<Option<usize>> {
        self.row.clear();
        self.in_newline_skip = false;

        let base = self.cursor.buf();
        let size = self.cursor.size();
        // SAFETY: the cursor guarantees `size` readable bytes at `base`.
        let endp = unsafe { base.add(size) };

        let mut p = base;
        let mut state = State::RowStart;
        let mut cell_start = p;
        let mut escaped = false;

        // All pointer reads below stay inside the window or its 16-byte
        // guard: single-byte reads happen only at `p < endp`, and the
        // spanner's 16-byte loads start at `p < endp` and end at most 15
        // bytes past it, inside the guard the cursor keeps readable.
        while p < endp {
            match state {
                State::RowStart => {
                    let ch = unsafe { *p };
                    if ch == b'\r' || ch == b'\n' {
                        p = unsafe { p.add(1) };
                    } else {
                        state = State::CellStart;
                    }
                }

                State::CellStart => {
                    let ch = unsafe { *p };
                    if ch == b'\r' || ch == b'\n' {
                        // A lone delimiter right before the line end leaves
                        // a trailing empty cell.
                        self.push_cell(p, 0, false)?;
                        p = unsafe { p.add(1) };
                        return Ok(Some(p as usize - base as usize));
                    } else if ch == self.quote {
                        p = unsafe { p.add(1) };
                        cell_start = p;
                        escaped = false;
                        state = State::InQuoted;
                    } else {
                        cell_start = p;
                        escaped = false;
                        state = State::InUnquoted;
                    }
                }

                State::InQuoted => {
                    let rc = unsafe { self.quoted.find(p) };
                    if rc == 16 {
                        p = unsafe { p.add(16) };
                    } else {
                        p = unsafe { p.add(rc + 1) };
                        state = State::AfterQuoted;
                    }
                }

                State::AfterQuoted => {
                    let ch = unsafe { *p };
                    if ch == self.delimiter {
                        let len = p as usize - cell_start as usize - 1;
                        self.push_cell(cell_start, len, escaped)?;
                        p = unsafe { p.add(1) };
                        state = State::CellStart;
                    } else if ch == b'\r' || ch == b'\n' {
                        let len = p as usize - cell_start as usize - 1;
                        self.push_cell(cell_start, len, escaped)?;
                        p = unsafe { p.add(1) };
                        return Ok(Some(p as usize - base as usize));
                    } else {
                        // Doubled quote, or an escape pair; the cell keeps
                        // going and needs materialization later.
                        escaped = true;
                        p = unsafe { p.add(1) };
                        state = State::InQuoted;
                    }
                }

                State::InUnquoted => {
                    let rc = unsafe { self.unquoted.find(p) };
                    if rc == 16 {
                        p = unsafe { p.add(16) };
                    } else {
                        p = unsafe { p.add(rc) };
                        state = State::AfterUnquoted;
                    }
                }

                State::AfterUnquoted => {
                    let ch = unsafe { *p };
                    if ch == self.delimiter {
                        let len = p as usize - cell_start as usize;
                        self.push_cell(cell_start, len, escaped)?;
                        p = unsafe { p.add(1) };
                        state = State::CellStart;
                    } else if ch == b'\r' || ch == b'\n' {
                        let len = p as usize - cell_start as usize;
                        self.push_cell(cell_start, len, escaped)?;
                        p = unsafe { p.add(1) };
                        return Ok(Some(p as usize - base as usize));
                    } else {
                        // Escape byte: skip it and the byte it protects.
                        escaped = true;
                        p = unsafe { p.add(2) };
                        state = State::InUnquoted;
                    }
                }
            }
        }

        // Ran off the window. At end-of-stream the window end terminates the
        // record, except inside an open quote; `CellStart` here always
        // follows a delimiter, so it closes a trailing empty cell.
        if at_eof {
            match state {
                State::InUnquoted => {
                    let len = endp as usize - cell_start as usize;
                    self.push_cell(cell_start, len, escaped)?;
                    self.in_newline_skip = true;
                    return Ok(Some(size));
                }
                State::AfterQuoted => {
                    let len = endp as usize - cell_start as usize - 1;
                    self.push_cell(cell_start, len, escaped)?;
                    self.in_newline_skip = true;
                    return Ok(Some(size));
                }
                State::CellStart => {
                    self.push_cell(endp, 0, false)?;
                    self.in_newline_skip = true;
                    return Ok(Some(size));
                }
                State::RowStart | State::InQuoted | State::AfterUnquoted => {}
            }
        }

        self.in_newline_skip = matches!(state, State::RowStart);
        Ok(None)
    }

    fn push_cell(&mut self, ptr: *const u8, len: usize, escaped: bool) -> Result<()> {
        if self.row.push(ptr, len, escaped) {
            Ok(())
        } else {
            Err(Error::RowTooWide { capacity: ROW_CAPACITY })
        }
    }
}
