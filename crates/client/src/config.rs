use crate::error::ClientError;
use engine_core::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, str::FromStr, time::Duration};
use tracing::warn;

pub const DEFAULT_SERVICE_URL: &str = "https://ws.parlament.ch/odata.svc/";
pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_RETRIES: usize = 10;
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Hard per-request row limit of the service.
///
/// The service's own client docs warn that a batch size below this limit
/// "will result in lost data". Smaller pages are in fact safe here: windows
/// are planned from the count, so every row is requested. The real hazard
/// is a batch size above the limit, where each page comes back truncated
/// and the missing rows are never requested; `validate_batch_size` warns
/// about that case instead.
pub const SERVICE_PAGE_LIMIT: usize = 1000;

const ENV_PREFIX: &str = "PARLFETCH_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub url: String,
    pub batch_size: usize,
    pub retries: usize,
    pub verbose: bool,
    pub concurrency: usize,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SERVICE_URL.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            retries: DEFAULT_RETRIES,
            verbose: true,
            concurrency: DEFAULT_CONCURRENCY,
            retry_base_delay_ms: 0,
            retry_max_delay_ms: 5000,
            timeout_secs: 60,
        }
    }
}

impl ClientConfig {
    /// Applies `PARLFETCH_*` entries from `vars` on top of `self`.
    pub fn overlay(mut self, vars: &HashMap<String, String>) -> Result<Self, ClientError> {
        let get = |name: &str| vars.get(&format!("{ENV_PREFIX}{name}")).map(|v| v.trim());

        if let Some(url) = get("URL") {
            self.url = url.to_string();
        }
        if let Some(raw) = get("BATCH_SIZE") {
            self.batch_size = parse_var("BATCH_SIZE", raw)?;
        }
        if let Some(raw) = get("RETRIES") {
            // negative budgets mean "no retries"
            self.retries = parse_var::<i64>("RETRIES", raw)?.max(0) as usize;
        }
        if let Some(raw) = get("VERBOSE") {
            self.verbose = parse_flag("VERBOSE", raw)?;
        }
        if let Some(raw) = get("CONCURRENCY") {
            self.concurrency = parse_var("CONCURRENCY", raw)?;
        }
        if let Some(raw) = get("RETRY_BASE_DELAY_MS") {
            self.retry_base_delay_ms = parse_var("RETRY_BASE_DELAY_MS", raw)?;
        }
        if let Some(raw) = get("RETRY_MAX_DELAY_MS") {
            self.retry_max_delay_ms = parse_var("RETRY_MAX_DELAY_MS", raw)?;
        }
        if let Some(raw) = get("TIMEOUT_SECS") {
            self.timeout_secs = parse_var("TIMEOUT_SECS", raw)?;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if self.url.trim().is_empty() {
            return Err(ClientError::InvalidConfig("service url is empty".into()));
        }
        validate_batch_size(self.batch_size)?;
        if self.timeout_secs == 0 {
            return Err(ClientError::InvalidConfig(
                "timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Window fan-out, never below one.
    pub fn concurrency(&self) -> usize {
        self.concurrency.max(1)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy_with(self.retries)
    }

    pub fn retry_policy_with(&self, retries: usize) -> RetryPolicy {
        RetryPolicy::new(
            retries,
            Duration::from_millis(self.retry_base_delay_ms),
            Duration::from_millis(self.retry_max_delay_ms),
        )
    }
}

/// Rejects a zero page size and warns about pages the service will truncate.
pub fn validate_batch_size(batch_size: usize) -> Result<(), ClientError> {
    if batch_size == 0 {
        return Err(ClientError::InvalidConfig(
            "batch_size must be at least 1".into(),
        ));
    }
    if batch_size > SERVICE_PAGE_LIMIT {
        warn!(
            "batch_size {} exceeds the service page limit of {}; windows may come back short and rows will be missing",
            batch_size, SERVICE_PAGE_LIMIT
        );
    }
    Ok(())
}

fn parse_var<T: FromStr>(name: &str, raw: &str) -> Result<T, ClientError>
where
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| ClientError::InvalidConfig(format!("{ENV_PREFIX}{name}={raw}: {e}")))
}

fn parse_flag(name: &str, raw: &str) -> Result<bool, ClientError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ClientError::InvalidConfig(format!(
            "{ENV_PREFIX}{name}={raw}: expected a boolean"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_match_service() {
        let config = ClientConfig::default();
        assert_eq!(config.url, DEFAULT_SERVICE_URL);
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.retries, 10);
        assert!(config.verbose);
        assert_eq!(config.retry_policy().max_attempts(), 11);
    }

    #[test]
    fn overlay_reads_prefixed_vars() {
        let config = ClientConfig::default()
            .overlay(&vars(&[
                ("PARLFETCH_URL", "http://localhost:8080/odata.svc"),
                ("PARLFETCH_BATCH_SIZE", "250"),
                ("PARLFETCH_RETRIES", "-3"),
                ("PARLFETCH_VERBOSE", "off"),
                ("PARLFETCH_CONCURRENCY", "0"),
                ("OTHER_BATCH_SIZE", "7"),
            ]))
            .unwrap();

        assert_eq!(config.url, "http://localhost:8080/odata.svc");
        assert_eq!(config.batch_size, 250);
        assert_eq!(config.retries, 0);
        assert!(!config.verbose);
        assert_eq!(config.concurrency(), 1);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            ClientConfig::default().overlay(&vars(&[("PARLFETCH_BATCH_SIZE", "0")])),
            Err(ClientError::InvalidConfig(_))
        ));
        assert!(matches!(
            ClientConfig::default().overlay(&vars(&[("PARLFETCH_RETRIES", "lots")])),
            Err(ClientError::InvalidConfig(_))
        ));
        assert!(matches!(
            ClientConfig::default().overlay(&vars(&[("PARLFETCH_VERBOSE", "maybe")])),
            Err(ClientError::InvalidConfig(_))
        ));
    }

    #[test]
    fn deserializes_partial_json() {
        let config: ClientConfig = serde_json::from_str(r#"{"batch_size": 500}"#).unwrap();
        assert_eq!(config.batch_size, 500);
        assert_eq!(config.retries, DEFAULT_RETRIES);
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
    }
}
