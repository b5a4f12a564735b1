//! The `csvjet` crate provides a streaming, zero-copy CSV parser.
//!
//! # Primary Focuses
//!
//! csvjet is built to ingest large delimiter-separated files (billing
//! exports, log dumps) at speeds approaching memory bandwidth. It gets there
//! by never allocating per cell, since cells are views into the input
//! buffer, and by scanning cell content 16 bytes at a time with a SIMD
//! character-class scan (`PCMPISTRI` on `x86_64`, a byte-table scan with the
//! same semantics elsewhere).
//!
//! - **Vectorized**: the inner loop over cell content is a 16-byte SIMD scan.
//! - **Zero copy**: cells borrow from the cursor's window; owned bytes are
//!   produced only on request, via [`CsvCell::materialize`].
//! - **Streaming**: input arrives through a refillable cursor, so a file
//!   descriptor, a pull-callable, or an iterator of chunks parses with a
//!   peak buffer bounded by the longest record plus one chunk. Files parse
//!   fastest through a single memory-mapped window.
//! - **Minimal hidden costs**: a row is a fixed array of cell views,
//!   overwritten in place by each [`CsvReader::read_row`].
//!
//! # Supported Features
//!
//! `csvjet` parses RFC 4180-style input with minor extensions:
//!
//! - Cells may be quoted; a doubled quote inside a quoted cell encodes one
//!   quote byte.
//! - Records end with LF or CRLF, interchangeably; blank lines between
//!   records are skipped.
//! - The delimiter, the quote byte, and an optional in-field escape byte are
//!   configurable; input is treated as bytes throughout.
//! - A final record without a terminating newline is either surfaced as a
//!   diagnostic or emitted as a row, by configuration.
//!
//! # Examples
//!
//! ```
//! use csvjet::CsvReader;
//!
//! let data: &[u8] = b"name,age\nalice,30\nbob,25\n";
//! let mut reader = CsvReader::new(data);
//!
//! let header = reader.read_header()?;
//! let age = header.get(b"age").unwrap();
//!
//! let mut total = 0.0;
//! while reader.read_row()? {
//!     total += reader.row()[age].as_double();
//! }
//! reader.finish()?;
//! assert_eq!(total, 55.0);
//! # Ok::<(), csvjet::Error>(())
//! ```
//!
//! Cells keep quote pairs in place until materialized:
//!
//! ```
//! use csvjet::CsvReader;
//!
//! let data: &[u8] = b"a,\"he said \"\"hi\"\"\",b\n";
//! let mut reader = CsvReader::new(data);
//! assert!(reader.read_row()?);
//!
//! let row = reader.row();
//! assert!(row[1].is_escaped());
//! assert_eq!(row[1].materialize(b'"', 0), b"he said \"hi\"");
//! # Ok::<(), csvjet::Error>(())
//! ```
//!
//! # Lifetimes and ownership
//!
//! Cells of the current row stay valid until the next
//! [`read_row`](CsvReader::read_row): the row is reachable only through a
//! shared borrow of the reader, which the next read (requiring `&mut`) ends.
//! Callers that keep cell data across rows materialize it into owned bytes
//! first.

#![deny(missing_docs)]

mod buffered;
mod cursor;
mod error;
mod header;
mod reader;
mod row;
mod spanner;

pub use buffered::{
    BufferedCursor, ChunkCursor, IterProducer, Producer, PullCursor, PullProducer, ReadCursor,
    ReadProducer, Refill,
};
#[cfg(unix)]
pub use cursor::MappedFileCursor;
pub use cursor::StreamCursor;
pub use error::{Error, Result};
pub use header::HeaderIndex;
pub use reader::{CsvReader, CsvReaderBuilder};
pub use row::{CsvCell, CsvCursor, ROW_CAPACITY};
pub use spanner::StringSpanner;
