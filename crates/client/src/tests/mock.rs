use async_trait::async_trait;
use connectors::{error::ServiceError, odata::service::ODataService, request::EntityQuery};
use model::{
    core::value::Value,
    records::row::{EntityRow, RowHandle},
    schema::table::TableSchema,
};
use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

pub type AccessLog = Arc<Mutex<Vec<(i64, String)>>>;

/// A row that records every field read.
pub struct TrackedRow {
    id: i64,
    log: AccessLog,
}

impl EntityRow for TrackedRow {
    fn get(&self, column: &str) -> Value {
        self.log.lock().unwrap().push((self.id, column.to_string()));
        match column {
            "ID" => Value::Int(self.id),
            "Name" => Value::String(format!("row-{}", self.id)),
            "Status" => Value::from("Active"),
            _ => Value::Null,
        }
    }
}

/// Scripted in-memory service.
///
/// Fetch failures and delays are keyed by the `$skip` of the request (0 for
/// unpaged requests). Every request is recorded.
#[derive(Default)]
pub struct MockService {
    tables: Vec<TableSchema>,
    data: HashMap<String, Vec<RowHandle>>,
    fetch_failures: Mutex<HashMap<usize, VecDeque<ServiceError>>>,
    count_failures: Mutex<VecDeque<ServiceError>>,
    schema_failures: Mutex<VecDeque<ServiceError>>,
    delays: HashMap<usize, Duration>,
    page_cap: Option<usize>,
    schema_calls: AtomicUsize,
    fetches: Mutex<Vec<EntityQuery>>,
    counts: Mutex<Vec<EntityQuery>>,
    access: AccessLog,
}

pub fn columns() -> Vec<String> {
    vec!["ID".into(), "Name".into(), "Status".into()]
}

impl MockService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, name: &str, rows: usize) -> Self {
        let handles = (0..rows as i64)
            .map(|id| {
                Arc::new(TrackedRow {
                    id,
                    log: self.access.clone(),
                }) as RowHandle
            })
            .collect();
        self.tables.push(TableSchema::new(name, columns()));
        self.data.insert(name.to_string(), handles);
        self
    }

    pub fn fail_fetch(self, skip: usize, errors: Vec<ServiceError>) -> Self {
        self.fetch_failures
            .lock()
            .unwrap()
            .entry(skip)
            .or_default()
            .extend(errors);
        self
    }

    pub fn fail_count(self, errors: Vec<ServiceError>) -> Self {
        self.count_failures.lock().unwrap().extend(errors);
        self
    }

    pub fn fail_schema(self, errors: Vec<ServiceError>) -> Self {
        self.schema_failures.lock().unwrap().extend(errors);
        self
    }

    pub fn delay(mut self, skip: usize, millis: u64) -> Self {
        self.delays.insert(skip, Duration::from_millis(millis));
        self
    }

    pub fn page_cap(mut self, cap: usize) -> Self {
        self.page_cap = Some(cap);
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn fetches(&self) -> Vec<EntityQuery> {
        self.fetches.lock().unwrap().clone()
    }

    /// `(skip, top)` of every fetch, sorted.
    pub fn fetched_windows(&self) -> Vec<(Option<usize>, Option<usize>)> {
        let mut windows: Vec<_> = self.fetches().iter().map(|q| (q.skip, q.top)).collect();
        windows.sort();
        windows
    }

    pub fn counts(&self) -> Vec<EntityQuery> {
        self.counts.lock().unwrap().clone()
    }

    pub fn schema_calls(&self) -> usize {
        self.schema_calls.load(Ordering::SeqCst)
    }

    pub fn access_log(&self) -> Vec<(i64, String)> {
        self.access.lock().unwrap().clone()
    }

    fn rows(&self, table: &str) -> Result<&[RowHandle], ServiceError> {
        self.data
            .get(table)
            .map(Vec::as_slice)
            .ok_or_else(|| ServiceError::UnknownEntitySet(table.to_string()))
    }
}

#[async_trait]
impl ODataService for MockService {
    async fn list_tables(&self) -> Result<Vec<String>, ServiceError> {
        self.schema_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.schema_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(self.tables.iter().map(|t| t.name.clone()).collect())
    }

    async fn table_columns(&self, table: &str) -> Result<Vec<String>, ServiceError> {
        self.tables
            .iter()
            .find(|t| t.name == table)
            .map(|t| t.columns.clone())
            .ok_or_else(|| ServiceError::UnknownEntitySet(table.to_string()))
    }

    async fn count(&self, query: &EntityQuery) -> Result<usize, ServiceError> {
        self.counts.lock().unwrap().push(query.clone());
        query.count_pairs()?;
        if let Some(err) = self.count_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(self.rows(&query.table)?.len())
    }

    async fn fetch(&self, query: &EntityQuery) -> Result<Vec<RowHandle>, ServiceError> {
        self.fetches.lock().unwrap().push(query.clone());
        query.query_pairs()?;

        let skip = query.skip.unwrap_or(0);
        let failure = self
            .fetch_failures
            .lock()
            .unwrap()
            .get_mut(&skip)
            .and_then(VecDeque::pop_front);
        if let Some(err) = failure {
            return Err(err);
        }
        if let Some(delay) = self.delays.get(&skip) {
            tokio::time::sleep(*delay).await;
        }

        let rows = self.rows(&query.table)?;
        let mut limit = query.top.unwrap_or(usize::MAX);
        if let Some(cap) = self.page_cap {
            limit = limit.min(cap);
        }
        let start = skip.min(rows.len());
        let end = start.saturating_add(limit).min(rows.len());
        Ok(rows[start..end].to_vec())
    }
}
