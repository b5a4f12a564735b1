//! The crate-wide error type.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A type alias for `Result<T, csvjet::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced while opening a source or reading rows.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The input file could not be opened or mapped.
    #[error("{}: {source}", path.display())]
    Open {
        /// Path of the file that failed to open.
        path: PathBuf,
        /// The underlying system error.
        source: io::Error,
    },

    /// The fixed-placement file mapping did not land inside its reservation.
    #[error("file mapping landed outside its reserved address range")]
    MapLayout,

    /// The underlying producer failed while refilling the buffer.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// A producer failed on an earlier refill; the cursor accepts no further
    /// reads.
    #[error("stream producer failed earlier; no further reads are possible")]
    Poisoned,

    /// The stream ended with unparsed bytes while the parser was not cleanly
    /// between records.
    #[error(
        "{count} unparsed bytes at end of input. The input may be missing \
         a final newline, or unbalanced quotes are present."
    )]
    TrailingBytes {
        /// Number of pending bytes left in the cursor.
        count: usize,
    },

    /// A record carried more cells than a row can hold.
    #[error("record exceeded the row capacity of {capacity} cells")]
    RowTooWide {
        /// The fixed per-row cell capacity.
        capacity: usize,
    },
}
