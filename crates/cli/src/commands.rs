use crate::error::CliError;
use clap::{Args, Subcommand};
use client::query::{Constraints, Filter};
use model::core::value::Value;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// List the tables the service exposes
    Tables,
    /// List the columns of a table
    Columns { table: String },
    /// Every table with its columns
    Overview,
    /// First rows of a table, unfiltered
    Glimpse {
        table: String,

        #[arg(long, default_value_t = client::client::DEFAULT_GLIMPSE_ROWS)]
        rows: usize,
    },
    /// Number of rows matching a filter
    Count {
        table: String,

        #[command(flatten)]
        selection: Selection,
    },
    /// Fetch all matching rows, paging through the service limit
    Data {
        table: String,

        #[command(flatten)]
        selection: Selection,

        #[arg(long, help = "Rows per request (overrides PARLFETCH_BATCH_SIZE)")]
        batch_size: Option<usize>,

        #[arg(long, help = "Additional attempts per request (overrides PARLFETCH_RETRIES)")]
        retries: Option<usize>,

        #[arg(
            long,
            help = "Write each window to batch{i}.json in this directory instead of collecting rows"
        )]
        spill_dir: Option<PathBuf>,

        #[arg(
            long,
            help = "If specified, writes the JSON rows to this file instead of stdout"
        )]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Default)]
pub struct Selection {
    /// OData filter expression passed through verbatim, e.g. "ID gt 5000"
    #[arg(long)]
    pub filter: Option<String>,

    /// Equality constraint COLUMN=VALUE; repeatable
    #[arg(long = "eq", value_name = "COLUMN=VALUE")]
    pub constraints: Vec<String>,
}

impl Selection {
    pub fn filter(&self) -> Filter {
        match &self.filter {
            Some(text) => Filter::raw(text.clone()),
            None => Filter::None,
        }
    }

    pub fn constraints(&self) -> Result<Constraints, CliError> {
        self.constraints
            .iter()
            .map(|raw| parse_constraint(raw))
            .collect::<Result<Vec<_>, _>>()
            .map(|pairs| pairs.into_iter().collect())
    }
}

/// Splits `COLUMN=VALUE`; the value becomes an integer, boolean or null
/// when it reads as one, otherwise a string.
pub fn parse_constraint(raw: &str) -> Result<(String, Value), CliError> {
    let (column, value) = raw
        .split_once('=')
        .ok_or_else(|| CliError::InvalidConstraint(raw.to_string()))?;
    let column = column.trim();
    if column.is_empty() {
        return Err(CliError::InvalidConstraint(raw.to_string()));
    }

    let value = value.trim();
    let value = if let Ok(int) = value.parse::<i64>() {
        Value::Int(int)
    } else {
        match value {
            "true" => Value::Boolean(true),
            "false" => Value::Boolean(false),
            "null" => Value::Null,
            text => Value::String(text.to_string()),
        }
    };
    Ok((column.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_values_are_typed() {
        assert_eq!(
            parse_constraint("ID=42").unwrap(),
            ("ID".to_string(), Value::Int(42))
        );
        assert_eq!(
            parse_constraint("Active = true").unwrap(),
            ("Active".to_string(), Value::Boolean(true))
        );
        assert_eq!(
            parse_constraint("Language=DE").unwrap(),
            ("Language".to_string(), Value::from("DE"))
        );
        assert_eq!(
            parse_constraint("Title=a=b").unwrap(),
            ("Title".to_string(), Value::from("a=b"))
        );
    }

    #[test]
    fn malformed_constraints_are_rejected() {
        assert!(matches!(
            parse_constraint("Language"),
            Err(CliError::InvalidConstraint(_))
        ));
        assert!(matches!(
            parse_constraint("=DE"),
            Err(CliError::InvalidConstraint(_))
        ));
    }

    #[test]
    fn selection_keeps_constraint_order() {
        let selection = Selection {
            filter: Some("ID gt 5".into()),
            constraints: vec!["Language=DE".into(), "Status=Active".into()],
        };
        let constraints = selection.constraints().unwrap();
        let columns: Vec<_> = constraints.iter().map(|(c, _)| c).collect();
        assert_eq!(columns, vec!["Language", "Status"]);
        assert!(matches!(selection.filter(), Filter::Expr(_)));
    }
}
