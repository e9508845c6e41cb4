use connectors::error::ServiceError;
use engine_core::retry::RetryError;
use model::pagination::window::FetchWindow;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The initial schema fetch failed; no client is built.
    #[error("Service schema unavailable: {0}")]
    SchemaUnavailable(#[source] ServiceError),

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// The query layer rejected the filter or the equality constraints.
    #[error("Invalid filter for table '{table}': {source}")]
    Filter {
        table: String,
        #[source]
        source: ServiceError,
    },

    /// A non-retryable failure (e.g. bad request) during a fetch or count.
    #[error(
        "Request against '{table}'{} failed: {source}",
        describe_progress(.window, .completed_windows)
    )]
    PermanentFetch {
        table: String,
        window: Option<FetchWindow>,
        completed_windows: usize,
        #[source]
        source: ServiceError,
    },

    #[error(
        "Retry budget exhausted for '{table}'{} after {attempts} attempts: {source}",
        describe_progress(.window, .completed_windows)
    )]
    RetryExhausted {
        table: String,
        window: Option<FetchWindow>,
        attempts: usize,
        completed_windows: usize,
        #[source]
        source: ServiceError,
    },

    /// Writing or reading a spilled batch failed.
    #[error(
        "Batch file {}{} failed: {source}",
        .path.display(),
        describe_progress(.window, .completed_windows)
    )]
    Spill {
        path: PathBuf,
        window: Option<FetchWindow>,
        completed_windows: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Empty for calls that are not tied to a window (counts, glimpses).
fn describe_progress(window: &Option<FetchWindow>, completed: &usize) -> String {
    window
        .map(|w| format!(" window {w} ({completed} windows completed)"))
        .unwrap_or_default()
}

impl ClientError {
    pub fn spill(path: PathBuf, source: std::io::Error) -> Self {
        ClientError::Spill {
            path,
            window: None,
            completed_windows: 0,
            source,
        }
    }

    /// Maps the outcome of a retried call onto the client taxonomy.
    pub fn from_retry(
        err: RetryError<ServiceError>,
        table: &str,
        window: Option<FetchWindow>,
    ) -> Self {
        match err {
            RetryError::AttemptsExceeded { attempts, last } => ClientError::RetryExhausted {
                table: table.to_string(),
                window,
                attempts,
                completed_windows: 0,
                source: last,
            },
            RetryError::Fatal(ServiceError::InvalidQuery(msg)) => ClientError::Filter {
                table: table.to_string(),
                source: ServiceError::InvalidQuery(msg),
            },
            RetryError::Fatal(ServiceError::UnknownEntitySet(name)) => {
                ClientError::UnknownTable(name)
            }
            RetryError::Fatal(source) => ClientError::PermanentFetch {
                table: table.to_string(),
                window,
                completed_windows: 0,
                source,
            },
        }
    }

    /// Tags a fetch-time failure with the window it happened in, unless it
    /// already names one.
    pub fn in_window(mut self, at: FetchWindow) -> Self {
        if let ClientError::PermanentFetch { window, .. }
        | ClientError::RetryExhausted { window, .. }
        | ClientError::Spill { window, .. } = &mut self
        {
            if window.is_none() {
                *window = Some(at);
            }
        }
        self
    }

    /// Attaches how many windows had finished when a batched call failed.
    pub fn with_completed_windows(mut self, completed: usize) -> Self {
        if let ClientError::PermanentFetch {
            completed_windows, ..
        }
        | ClientError::RetryExhausted {
            completed_windows, ..
        }
        | ClientError::Spill {
            completed_windows, ..
        } = &mut self
        {
            *completed_windows = completed;
        }
        self
    }
}
