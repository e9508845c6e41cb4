use crate::error::ClientError;
use model::records::row::RowHandle;
use serde::{Serialize, Serializer, ser::SerializeMap};
use std::{
    collections::BTreeMap,
    io,
    path::{Path, PathBuf},
};
use tracing::debug;

/// Writes each window's rows to `batch{index}.json` under one directory.
#[derive(Debug, Clone)]
pub struct SpillSink {
    dir: PathBuf,
}

impl SpillSink {
    /// Creates `dir` if it does not exist yet.
    pub async fn create(dir: impl Into<PathBuf>) -> Result<Self, ClientError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| ClientError::spill(dir.clone(), source))?;
        Ok(SpillSink { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, index: usize) -> PathBuf {
        self.dir.join(format!("batch{index}.json"))
    }

    /// Writes one window as a JSON array of string-valued objects.
    pub async fn write(
        &self,
        index: usize,
        columns: &[String],
        rows: &[RowHandle],
    ) -> Result<SpilledFile, ClientError> {
        let path = self.path_for(index);
        let spill_err = |source: io::Error| ClientError::spill(path.clone(), source);

        let rows_json: Vec<_> = rows.iter().map(|row| StringRow { columns, row }).collect();
        let body = serde_json::to_vec(&rows_json).map_err(|e| spill_err(io::Error::other(e)))?;
        tokio::fs::write(&path, body).await.map_err(spill_err)?;

        debug!("Spilled {} rows to {}", rows.len(), path.display());
        Ok(SpilledFile {
            path,
            rows: rows.len(),
        })
    }
}

/// Serializes a row with every value rendered through `Display`.
struct StringRow<'a> {
    columns: &'a [String],
    row: &'a RowHandle,
}

impl Serialize for StringRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for column in self.columns {
            map.serialize_entry(column, &self.row.get(column).to_string())?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpilledFile {
    pub path: PathBuf,
    pub rows: usize,
}

/// Result of a spilled fetch: the files, in window order.
///
/// Rows are not iterable from here; use `read_batch` to load one file back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpilledBatches {
    files: Vec<SpilledFile>,
}

impl SpilledBatches {
    pub fn new(files: Vec<SpilledFile>) -> Self {
        SpilledBatches { files }
    }

    /// Total rows across all batch files.
    pub fn len(&self) -> usize {
        self.files.iter().map(|f| f.rows).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn batch_count(&self) -> usize {
        self.files.len()
    }

    pub fn files(&self) -> &[SpilledFile] {
        &self.files
    }

    pub fn paths(&self) -> Vec<&Path> {
        self.files.iter().map(|f| f.path.as_path()).collect()
    }

    pub async fn read_batch(
        &self,
        index: usize,
    ) -> Result<Option<Vec<BTreeMap<String, String>>>, ClientError> {
        let Some(file) = self.files.get(index) else {
            return Ok(None);
        };
        let read_err = |source: io::Error| ClientError::spill(file.path.clone(), source);

        let body = tokio::fs::read(&file.path).await.map_err(read_err)?;
        let rows = serde_json::from_slice(&body).map_err(|e| read_err(io::Error::other(e)))?;
        Ok(Some(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{core::value::Value, records::row::RowData};

    fn row(id: i64, name: Option<&str>) -> RowHandle {
        RowData::from_pairs(
            "Party",
            [("ID", Value::Int(id)), ("Name", Value::from(name.map(str::to_string)))],
        )
        .into_handle()
    }

    #[tokio::test]
    async fn writes_string_coerced_batches() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = SpillSink::create(tmp.path().join("nested/out")).await.unwrap();
        let columns = vec!["ID".to_string(), "Name".to_string()];

        let first = sink
            .write(0, &columns, &[row(1, Some("SP")), row(2, None)])
            .await
            .unwrap();
        let second = sink.write(1, &columns, &[row(3, Some("FDP"))]).await.unwrap();
        assert!(first.path.ends_with("batch0.json"));

        let batches = SpilledBatches::new(vec![first, second]);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches.batch_count(), 2);

        let loaded = batches.read_batch(0).await.unwrap().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0]["ID"], "1");
        assert_eq!(loaded[0]["Name"], "SP");
        assert_eq!(loaded[1]["Name"], "null");
        assert!(batches.read_batch(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn write_failure_is_a_spill_error() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = SpillSink::create(tmp.path()).await.unwrap();
        tokio::fs::remove_dir(tmp.path()).await.unwrap();

        let err = sink.write(0, &["ID".to_string()], &[row(1, None)]).await;
        assert!(matches!(err, Err(ClientError::Spill { path, .. }) if path.ends_with("batch0.json")));
    }
}
