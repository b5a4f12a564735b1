//! Header-name to column-index mapping.

use std::collections::HashMap;

use crate::row::CsvCursor;

/// A map from header names to column indices.
///
/// Built once, either from the first row of a stream or from a caller-chosen
/// name sequence, then used for named cell lookups on every following row.
/// Keys are raw bytes: lookups are byte-exact against the materialized header
/// cells.
///
/// # Example
///
/// ```
/// use csvjet::{CsvReaderBuilder, HeaderIndex};
///
/// let data: &[u8] = b"name,age\nalice,30\n";
/// let mut reader = CsvReaderBuilder::new().from_reader(data);
///
/// assert!(reader.read_row()?);
/// let header = HeaderIndex::from_row(reader.row(), b'"', 0);
/// let age = header.get(b"age").unwrap();
///
/// assert!(reader.read_row()?);
/// assert_eq!(reader.row()[age].as_bytes(), b"30");
/// # Ok::<(), csvjet::Error>(())
/// ```
#[derive(Debug, Default, Clone)]
pub struct HeaderIndex {
    map: HashMap<Vec<u8>, usize>,
}

impl HeaderIndex {
    /// Builds the index from a parsed header row.
    ///
    /// Cells are materialized with the given `quote` and `escape` bytes, so
    /// quoted header names map by their logical value. A name that occurs
    /// twice keeps its last column.
    pub fn from_row(row: &CsvCursor, quote: u8, escape: u8) -> HeaderIndex {
        let map = row
            .cells()
            .iter()
            .enumerate()
            .map(|(index, cell)| (cell.materialize(quote, escape), index))
            .collect();
        HeaderIndex { map }
    }

    /// Builds the index from a caller-supplied name sequence, in order.
    pub fn from_names<I, N>(names: I) -> HeaderIndex
    where
        I: IntoIterator<Item = N>,
        N: Into<Vec<u8>>,
    {
        let map = names
            .into_iter()
            .enumerate()
            .map(|(index, name)| (name.into(), index))
            .collect();
        HeaderIndex { map }
    }

    /// Looks up the column index of `name`.
    pub fn get(&self, name: &[u8]) -> Option<usize> {
        self.map.get(name).copied()
    }

    /// Number of named columns.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` when no columns are named.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns the header names ordered by column index.
    pub fn names(&self) -> Vec<&[u8]> {
        let mut entries: Vec<(&Vec<u8>, usize)> =
            self.map.iter().map(|(name, &index)| (name, index)).collect();
        entries.sort_by_key(|&(_, index)| index);
        entries.into_iter().map(|(name, _)| name.as_slice()).collect()
    }
}
