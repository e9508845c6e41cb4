use crate::{
    config::{ClientConfig, validate_batch_size},
    error::ClientError,
    query::{Constraints, Filter, QueryContext, build_query},
    response::Response,
    retry::execute_with_retry,
    schema::SchemaCache,
    spill::{SpillSink, SpilledBatches, SpilledFile},
};
use connectors::{
    odata::{http::HttpODataService, service::ODataService},
    request::{EntityQuery, EntityQueryBuilder},
};
use engine_core::{
    metrics::{Metrics, MetricsSnapshot},
    progress::{ProgressReporter, ProgressStage},
    retry::RetryPolicy,
};
use futures::{StreamExt, stream};
use model::{
    pagination::window::FetchWindow, records::row::RowHandle, schema::table::TableSchema,
};
use planner::plan::{FetchPlan, plan_windows};
use std::{fmt, path::PathBuf, sync::Arc};
use tracing::{debug, info, warn};

pub const DEFAULT_GLIMPSE_ROWS: usize = 5;

/// Per-call overrides for `Client::get_data_batched`.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub batch_size: Option<usize>,
    pub retries: Option<usize>,
    /// Write each window to `batch{i}.json` here instead of keeping rows.
    pub spill_dir: Option<PathBuf>,
}

impl BatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn retries(mut self, retries: usize) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn spill_to(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spill_dir = Some(dir.into());
        self
    }
}

#[derive(Debug)]
pub enum BatchOutput {
    InMemory(Response),
    Spilled(SpilledBatches),
}

impl BatchOutput {
    pub fn len(&self) -> usize {
        match self {
            BatchOutput::InMemory(response) => response.len(),
            BatchOutput::Spilled(batches) => batches.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_response(self) -> Option<Response> {
        match self {
            BatchOutput::InMemory(response) => Some(response),
            BatchOutput::Spilled(_) => None,
        }
    }
}

/// What one fetched window turned into.
enum WindowOutput {
    Rows(Vec<RowHandle>),
    Spilled(SpilledFile),
}

impl WindowOutput {
    fn row_count(&self) -> usize {
        match self {
            WindowOutput::Rows(rows) => rows.len(),
            WindowOutput::Spilled(file) => file.rows,
        }
    }

    fn into_rows(self) -> Option<Vec<RowHandle>> {
        match self {
            WindowOutput::Rows(rows) => Some(rows),
            WindowOutput::Spilled(_) => None,
        }
    }

    fn into_file(self) -> Option<SpilledFile> {
        match self {
            WindowOutput::Spilled(file) => Some(file),
            WindowOutput::Rows(_) => None,
        }
    }
}

/// Client for one service: a schema snapshot plus fetch settings.
///
/// Settings change through `&mut self`, so they cannot move under a
/// request that is still running.
pub struct Client {
    service: Arc<dyn ODataService>,
    schema: SchemaCache,
    config: ClientConfig,
    metrics: Metrics,
}

impl Client {
    /// Connects over HTTP to `config.url` and loads the schema.
    pub async fn connect(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let service = HttpODataService::connect(&config.url, config.timeout())
            .map_err(|e| ClientError::InvalidConfig(e.to_string()))?;
        Self::with_service(Arc::new(service), config).await
    }

    pub async fn with_service(
        service: Arc<dyn ODataService>,
        config: ClientConfig,
    ) -> Result<Self, ClientError> {
        config.validate()?;
        let metrics = Metrics::new();
        let schema = SchemaCache::load(service.as_ref(), &config.retry_policy(), &metrics).await?;

        Ok(Client {
            service,
            schema,
            config,
            metrics,
        })
    }

    pub fn get_tables(&self) -> Vec<String> {
        self.schema.tables()
    }

    pub fn get_variables(&self, table: &str) -> Result<&[String], ClientError> {
        self.schema.columns(table)
    }

    pub fn get_overview(&self) -> &[TableSchema] {
        self.schema.overview()
    }

    pub fn schema(&self) -> &SchemaCache {
        &self.schema
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn batch_size(&self) -> usize {
        self.config.batch_size
    }

    pub fn set_batch_size(&mut self, batch_size: usize) -> Result<(), ClientError> {
        validate_batch_size(batch_size)?;
        self.config.batch_size = batch_size;
        Ok(())
    }

    pub fn retries(&self) -> usize {
        self.config.retries
    }

    pub fn set_retries(&mut self, retries: usize) {
        self.config.retries = retries;
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.config.verbose = verbose;
    }

    pub fn set_concurrency(&mut self, concurrency: usize) {
        self.config.concurrency = concurrency;
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// The first `rows` rows of `table` in service order, unfiltered.
    pub async fn get_glimpse(&self, table: &str, rows: usize) -> Result<Response, ClientError> {
        let columns: Arc<[String]> = Arc::from(self.schema.columns(table)?);
        if rows == 0 {
            return Ok(Response::empty(columns));
        }

        let query = EntityQueryBuilder::new(table).top(rows).build();
        let handles = self
            .fetch_rows(&query, &self.config.retry_policy(), None)
            .await?;
        Ok(Response::from_rows(columns, handles))
    }

    pub async fn get_count(
        &self,
        table: &str,
        filter: &Filter,
        constraints: &Constraints,
    ) -> Result<usize, ClientError> {
        let (_, query) = self.prepare(table, filter, constraints)?;
        self.count(&query, &self.config.retry_policy()).await
    }

    /// All rows of `table` matching `filter` and `constraints`.
    ///
    /// Fails as a whole if the count or any window fails; rows from windows
    /// that did finish are dropped along with the call.
    pub async fn get_data(
        &self,
        table: &str,
        filter: &Filter,
        constraints: &Constraints,
    ) -> Result<Response, ClientError> {
        let (columns, query) = self.prepare(table, filter, constraints)?;
        let policy = self.config.retry_policy();
        let progress = ProgressReporter::new(table, self.config.verbose);

        let outcome = self
            .collect(&columns, &query, self.config.batch_size, &policy, &progress, None)
            .await;
        let windows = self.settle(&progress, outcome)?;

        progress.stage(ProgressStage::Assembling);
        let rows = windows.into_iter().filter_map(WindowOutput::into_rows).collect();
        let response = Response::from_windows(columns, rows);
        progress.stage(ProgressStage::Done);
        Ok(response)
    }

    /// Like `get_data`, with per-call batch size and retry budget and an
    /// optional spill directory.
    ///
    /// With a spill directory every window is written to disk as soon as it
    /// arrives, even when one page would do.
    pub async fn get_data_batched(
        &self,
        table: &str,
        filter: &Filter,
        constraints: &Constraints,
        options: &BatchOptions,
    ) -> Result<BatchOutput, ClientError> {
        let batch_size = options.batch_size.unwrap_or(self.config.batch_size);
        validate_batch_size(batch_size)?;
        let policy = self
            .config
            .retry_policy_with(options.retries.unwrap_or(self.config.retries));

        let (columns, query) = self.prepare(table, filter, constraints)?;
        let sink = match &options.spill_dir {
            Some(dir) => Some(SpillSink::create(dir.clone()).await?),
            None => None,
        };
        let progress = ProgressReporter::new(table, self.config.verbose);

        let outcome = self
            .collect(&columns, &query, batch_size, &policy, &progress, sink.as_ref())
            .await;
        let windows = self.settle(&progress, outcome)?;

        progress.stage(ProgressStage::Assembling);
        let output = match sink {
            Some(sink) => {
                let files = windows
                    .into_iter()
                    .filter_map(WindowOutput::into_file)
                    .collect();
                info!("{}: spilled to {}", table, sink.dir().display());
                BatchOutput::Spilled(SpilledBatches::new(files))
            }
            None => {
                let rows = windows.into_iter().filter_map(WindowOutput::into_rows).collect();
                BatchOutput::InMemory(Response::from_windows(columns, rows))
            }
        };
        progress.stage(ProgressStage::Done);
        Ok(output)
    }

    fn prepare(
        &self,
        table: &str,
        filter: &Filter,
        constraints: &Constraints,
    ) -> Result<(Arc<[String]>, EntityQuery), ClientError> {
        let columns = self.schema.columns(table)?;
        let query = build_query(&QueryContext::new(table, columns), filter, constraints)
            .map_err(|source| ClientError::Filter {
                table: table.to_string(),
                source,
            })?;
        Ok((Arc::from(columns), query))
    }

    fn settle<T>(
        &self,
        progress: &ProgressReporter,
        outcome: Result<T, ClientError>,
    ) -> Result<T, ClientError> {
        if let Err(err) = &outcome {
            progress.stage(ProgressStage::Failed);
            self.metrics.increment_failures(1);
            warn!("Request failed: {err}");
        }
        outcome
    }

    async fn collect(
        &self,
        columns: &[String],
        query: &EntityQuery,
        batch_size: usize,
        policy: &RetryPolicy,
        progress: &ProgressReporter,
        sink: Option<&SpillSink>,
    ) -> Result<Vec<WindowOutput>, ClientError> {
        progress.stage(ProgressStage::Counting);
        let total = self.count(query, policy).await?;
        debug!("{} rows match in {}", total, query.table);

        let plan = match sink {
            Some(_) if total > 0 => FetchPlan::Batched {
                total,
                windows: plan_windows(total, batch_size),
            },
            _ => FetchPlan::for_count(total, batch_size),
        };

        match plan {
            FetchPlan::Empty => Ok(Vec::new()),
            FetchPlan::Single { total } => {
                progress.stage(ProgressStage::SingleFetch);
                let rows = self.fetch_rows(query, policy, None).await?;
                if rows.len() != total {
                    warn!(
                        "{} returned {} rows in a single page, count said {}",
                        query.table,
                        rows.len(),
                        total
                    );
                }
                self.metrics.increment_windows(1);
                Ok(vec![WindowOutput::Rows(rows)])
            }
            FetchPlan::Batched { total, windows } => {
                progress.stage(ProgressStage::BatchFetching);
                info!(
                    "{}: fetching {} rows in {} windows of up to {}",
                    query.table,
                    total,
                    windows.len(),
                    batch_size
                );
                self.fetch_windows(columns, query, &windows, policy, progress, sink)
                    .await
            }
        }
    }

    /// Fetches windows with bounded concurrency and returns their output in
    /// window order, whatever order they finish in.
    async fn fetch_windows(
        &self,
        columns: &[String],
        query: &EntityQuery,
        windows: &[FetchWindow],
        policy: &RetryPolicy,
        progress: &ProgressReporter,
        sink: Option<&SpillSink>,
    ) -> Result<Vec<WindowOutput>, ClientError> {
        progress.start(windows.len());
        let mut slots: Vec<Option<WindowOutput>> = windows.iter().map(|_| None).collect();

        let mut pending = stream::iter(windows.iter().copied().enumerate())
            .map(move |(index, window)| async move {
                let output = self
                    .fetch_window(columns, query, index, window, policy, sink)
                    .await;
                (index, output)
            })
            .buffer_unordered(self.config.concurrency());

        while let Some((index, output)) = pending.next().await {
            match output {
                Ok(output) => {
                    progress.window_done(index, output.row_count());
                    self.metrics.increment_windows(1);
                    slots[index] = Some(output);
                }
                Err(err) => {
                    if let Some(sink) = sink {
                        let written: Vec<_> = slots
                            .iter()
                            .flatten()
                            .filter_map(|output| match output {
                                WindowOutput::Spilled(file) => {
                                    Some(file.path.display().to_string())
                                }
                                WindowOutput::Rows(_) => None,
                            })
                            .collect();
                        if !written.is_empty() {
                            warn!(
                                "{} batch files already written to {} are left in place: {}",
                                written.len(),
                                sink.dir().display(),
                                written.join(", ")
                            );
                        }
                    }
                    return Err(err.with_completed_windows(progress.completed()));
                }
            }
        }

        Ok(slots.into_iter().flatten().collect())
    }

    async fn fetch_window(
        &self,
        columns: &[String],
        query: &EntityQuery,
        index: usize,
        window: FetchWindow,
        policy: &RetryPolicy,
        sink: Option<&SpillSink>,
    ) -> Result<WindowOutput, ClientError> {
        let rows = self
            .fetch_rows(&query.windowed(window), policy, Some(window))
            .await?;
        match sink {
            Some(sink) => sink
                .write(index, columns, &rows)
                .await
                .map(WindowOutput::Spilled)
                .map_err(|err| err.in_window(window)),
            None => Ok(WindowOutput::Rows(rows)),
        }
    }

    async fn count(&self, query: &EntityQuery, policy: &RetryPolicy) -> Result<usize, ClientError> {
        execute_with_retry(policy, &self.metrics, || self.service.count(query))
            .await
            .map_err(|e| ClientError::from_retry(e, &query.table, None))
    }

    async fn fetch_rows(
        &self,
        query: &EntityQuery,
        policy: &RetryPolicy,
        window: Option<FetchWindow>,
    ) -> Result<Vec<RowHandle>, ClientError> {
        let rows = execute_with_retry(policy, &self.metrics, || self.service.fetch(query))
            .await
            .map_err(|e| ClientError::from_retry(e, &query.table, window))?;

        if let Some(window) = window {
            debug!("{}: window {} returned {} rows", query.table, window, rows.len());
            if rows.len() < window.limit {
                warn!(
                    "Window {} of {} returned {} rows, expected {}; the page size may exceed the service limit or the data changed",
                    window,
                    query.table,
                    rows.len(),
                    window.limit
                );
            }
        }
        self.metrics.increment_rows(rows.len() as u64);
        Ok(rows)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("tables", &self.schema.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
