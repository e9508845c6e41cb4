use model::{
    core::value::Value,
    records::{record::Record, row::RowHandle},
};
use serde::{Serialize, Serializer, ser::SerializeSeq};
use std::{
    fmt,
    iter::Map,
    ops::{Bound, RangeBounds},
    slice,
    sync::Arc,
};

/// A deferred read of one column on one row.
///
/// Every `resolve` goes back to the row handle; nothing is memoized.
#[derive(Clone)]
pub struct FieldThunk {
    row: RowHandle,
    column: String,
}

impl FieldThunk {
    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn resolve(&self) -> Value {
        self.row.get(&self.column)
    }
}

impl fmt::Debug for FieldThunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldThunk")
            .field("column", &self.column)
            .finish_non_exhaustive()
    }
}

/// A row whose fields are read only on demand.
#[derive(Clone)]
pub struct LazyRow {
    handle: RowHandle,
    columns: Arc<[String]>,
}

impl LazyRow {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// `None` when `column` is not part of the table schema.
    pub fn thunk(&self, column: &str) -> Option<FieldThunk> {
        self.columns.iter().any(|c| c == column).then(|| FieldThunk {
            row: self.handle.clone(),
            column: column.to_string(),
        })
    }

    /// One thunk per column, in schema order.
    pub fn thunks(&self) -> impl Iterator<Item = FieldThunk> + '_ {
        self.columns.iter().map(|column| FieldThunk {
            row: self.handle.clone(),
            column: column.clone(),
        })
    }

    /// Reads a single field.
    pub fn resolve(&self, column: &str) -> Option<Value> {
        self.thunk(column).map(|t| t.resolve())
    }

    /// Reads every field into a fresh record.
    pub fn materialize(&self) -> Record {
        let values = self.columns.iter().map(|c| self.handle.get(c)).collect();
        Record::new(self.columns.clone(), values)
    }
}

impl fmt::Debug for LazyRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyRow")
            .field("columns", &self.columns.len())
            .finish_non_exhaustive()
    }
}

pub type Records<'a> = Map<slice::Iter<'a, LazyRow>, fn(&LazyRow) -> Record>;

/// Rows of one query, in fetch order.
///
/// Construction only records which rows exist. Field values are read from
/// the underlying handles each time a record is produced.
#[derive(Clone)]
pub struct Response {
    columns: Arc<[String]>,
    rows: Vec<LazyRow>,
}

impl Response {
    pub fn empty(columns: impl Into<Arc<[String]>>) -> Self {
        Response {
            columns: columns.into(),
            rows: Vec::new(),
        }
    }

    pub fn from_rows(columns: impl Into<Arc<[String]>>, rows: Vec<RowHandle>) -> Self {
        Self::from_windows(columns, vec![rows])
    }

    /// Concatenates per-window rows; `windows` must be in window order.
    pub fn from_windows(columns: impl Into<Arc<[String]>>, windows: Vec<Vec<RowHandle>>) -> Self {
        let columns = columns.into();
        let rows = windows
            .into_iter()
            .flatten()
            .map(|handle| LazyRow {
                handle,
                columns: columns.clone(),
            })
            .collect();
        Response { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[LazyRow] {
        &self.rows
    }

    /// Materializes every row in order; each call reads the fields again.
    pub fn iter(&self) -> Records<'_> {
        self.rows.iter().map(LazyRow::materialize as fn(&LazyRow) -> Record)
    }

    pub fn get(&self, index: usize) -> Option<Record> {
        self.rows.get(index).map(LazyRow::materialize)
    }

    /// Slice semantics; `None` when the range is out of bounds.
    pub fn get_range<R: RangeBounds<usize>>(&self, range: R) -> Option<Vec<Record>> {
        let bounds: (Bound<usize>, Bound<usize>) =
            (range.start_bound().cloned(), range.end_bound().cloned());
        self.rows
            .get(bounds)
            .map(|rows| rows.iter().map(LazyRow::materialize).collect())
    }

    pub fn last(&self) -> Option<Record> {
        self.rows.last().map(LazyRow::materialize)
    }
}

impl<'a> IntoIterator for &'a Response {
    type Item = Record;
    type IntoIter = Records<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("columns", &self.columns)
            .field("len", &self.rows.len())
            .finish()
    }
}

impl Serialize for Response {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.rows.len()))?;
        for record in self.iter() {
            seq.serialize_element(&record)?;
        }
        seq.end()
    }
}
