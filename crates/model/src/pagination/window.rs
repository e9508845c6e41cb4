use serde::{Deserialize, Serialize};
use std::fmt;

/// A contiguous `[offset, offset + limit)` slice of a query's matching rows,
/// sent to the service as `$skip` / `$top`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchWindow {
    pub offset: usize,
    pub limit: usize,
}

impl FetchWindow {
    pub fn new(offset: usize, limit: usize) -> Self {
        FetchWindow { offset, limit }
    }

    /// Exclusive end offset.
    pub fn end(&self) -> usize {
        self.offset + self.limit
    }
}

impl fmt::Display for FetchWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.offset, self.end())
    }
}
