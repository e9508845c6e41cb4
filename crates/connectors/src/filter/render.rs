use super::{
    condition::{Condition, StringMatch},
    expr::FilterExpr,
};
use crate::error::ServiceError;
use model::core::value::Value;

/// Renders an expression as OData v2 `$filter` text.
///
/// Returns `Ok(None)` when the expression constrains nothing, so callers can
/// omit the parameter entirely.
pub fn render_filter(expr: &FilterExpr) -> Result<Option<String>, ServiceError> {
    match expr {
        FilterExpr::Condition(cond) => render_condition(cond).map(Some),
        FilterExpr::Match {
            column,
            kind,
            pattern,
        } => {
            check_column(column)?;
            let pattern = quote(pattern);
            let call = match kind {
                StringMatch::StartsWith => format!("startswith({column},{pattern})"),
                StringMatch::EndsWith => format!("endswith({column},{pattern})"),
                StringMatch::Contains => format!("substringof({pattern},{column})"),
            };
            Ok(Some(format!("{call} eq true")))
        }
        FilterExpr::And(children) => render_group(children, "and"),
        FilterExpr::Or(children) => render_group(children, "or"),
        FilterExpr::Not(inner) => Ok(render_filter(inner)?.map(|text| format!("not ({text})"))),
        FilterExpr::Raw(text) => {
            let text = text.trim();
            Ok((!text.is_empty()).then(|| text.to_string()))
        }
    }
}

fn render_group(children: &[FilterExpr], joiner: &str) -> Result<Option<String>, ServiceError> {
    let mut parts = Vec::with_capacity(children.len());
    for child in children {
        if let Some(text) = render_filter(child)? {
            parts.push(text);
        }
    }

    Ok(match parts.len() {
        0 => None,
        1 => parts.pop(),
        _ => Some(
            parts
                .iter()
                .map(|p| format!("({p})"))
                .collect::<Vec<_>>()
                .join(&format!(" {joiner} ")),
        ),
    })
}

fn render_condition(cond: &Condition) -> Result<String, ServiceError> {
    check_column(&cond.column)?;
    let literal = render_literal(&cond.value)?;
    Ok(format!("{} {} {}", cond.column, cond.comparator, literal))
}

/// Property paths: identifier segments separated by `/`.
fn check_column(column: &str) -> Result<(), ServiceError> {
    let valid = !column.is_empty()
        && column.split('/').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
        });

    if valid {
        Ok(())
    } else {
        Err(ServiceError::InvalidQuery(format!(
            "invalid column name '{column}'"
        )))
    }
}

/// OData v2 literal text. Integers outside the `Edm.Int32` range carry the
/// `L` suffix, floats are `Edm.Double` (`d`), and timestamps keep milliseconds.
pub fn render_literal(value: &Value) -> Result<String, ServiceError> {
    match value {
        Value::Null => Ok("null".to_string()),
        Value::Boolean(b) => Ok(b.to_string()),
        Value::Int(i) if i32::try_from(*i).is_ok() => Ok(i.to_string()),
        Value::Int(i) => Ok(format!("{i}L")),
        Value::Float(f) if f.is_finite() => Ok(double_literal(*f)),
        Value::Float(f) => Err(ServiceError::InvalidQuery(format!(
            "non-finite number {f} cannot be used in a filter"
        ))),
        Value::String(s) => Ok(quote(s)),
        Value::Uuid(u) => Ok(format!("guid'{u}'")),
        Value::Timestamp(ts) => Ok(format!(
            "datetime'{}'",
            ts.format("%Y-%m-%dT%H:%M:%S%.3f")
        )),
        Value::Json(_) => Err(ServiceError::InvalidQuery(
            "structured values cannot be used in a filter".to_string(),
        )),
    }
}

/// `2.0d`, `0.25d`, `1.0E+20d`: the exponent form needs a decimal point
/// in the mantissa and an explicit sign.
fn double_literal(f: f64) -> String {
    let text = format!("{f:?}");
    match text.split_once('e') {
        Some((mantissa, exponent)) => {
            let point = if mantissa.contains('.') { "" } else { ".0" };
            let sign = if exponent.starts_with('-') { "" } else { "+" };
            format!("{mantissa}{point}E{sign}{exponent}d")
        }
        None => format!("{text}d"),
    }
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}
