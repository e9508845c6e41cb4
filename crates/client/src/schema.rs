use crate::{error::ClientError, retry::execute_with_retry};
use connectors::odata::service::ODataService;
use engine_core::{metrics::Metrics, retry::RetryPolicy};
use model::schema::table::TableSchema;
use std::collections::HashMap;
use tracing::{debug, info};

/// Table and column names of one service, read once and never refreshed.
#[derive(Debug, Clone, Default)]
pub struct SchemaCache {
    tables: Vec<TableSchema>,
    index: HashMap<String, usize>,
}

impl SchemaCache {
    /// Enumerates every table, then the columns of each.
    ///
    /// Each round trip runs under `policy`. Any failure aborts the load; a
    /// partially read schema is never returned.
    pub async fn load(
        service: &dyn ODataService,
        policy: &RetryPolicy,
        metrics: &Metrics,
    ) -> Result<Self, ClientError> {
        let names = execute_with_retry(policy, metrics, || service.list_tables())
            .await
            .map_err(|e| ClientError::SchemaUnavailable(e.into_inner()))?;
        debug!("Service exposes {} tables", names.len());

        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            let columns = execute_with_retry(policy, metrics, || service.table_columns(&name))
                .await
                .map_err(|e| ClientError::SchemaUnavailable(e.into_inner()))?;
            tables.push(TableSchema::new(name, columns));
        }

        info!("Schema cached for {} tables", tables.len());
        Ok(Self::from_tables(tables))
    }

    pub fn from_tables(tables: Vec<TableSchema>) -> Self {
        let index = tables
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.clone(), i))
            .collect();
        SchemaCache { tables, index }
    }

    pub fn tables(&self) -> Vec<String> {
        self.tables.iter().map(|t| t.name.clone()).collect()
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.index.get(name).map(|&i| &self.tables[i])
    }

    pub fn columns(&self, table: &str) -> Result<&[String], ClientError> {
        self.table(table)
            .map(|t| t.columns.as_slice())
            .ok_or_else(|| ClientError::UnknownTable(table.to_string()))
    }

    /// Every table with its columns, in service order.
    pub fn overview(&self) -> &[TableSchema] {
        &self.tables
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
