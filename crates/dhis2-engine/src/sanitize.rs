//! Column identifiers and type inference.

use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime};

use crate::result::{parse_bool, parse_number, ColumnType, Value};

/// Longest identifier handed back to callers (PostgreSQL's limit).
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Leading pivot column holding the period label.
pub const PERIOD_COLUMN: &str = "period";
/// Leading pivot column holding the organisation unit label.
pub const ORG_UNIT_COLUMN: &str = "orgunit";

const FALLBACK_IDENTIFIER: &str = "column";

/// Column names that carry a time or organisation unit dimension.
const DIMENSION_NAMES: [&str; 4] = ["period", "pe", "orgunit", "ou"];

/// Keep alphanumerics, `_` and spaces; collapse separator runs; bound length.
pub fn sanitize_identifier(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut after_separator = true;
    for c in raw.chars() {
        if c.is_alphanumeric() {
            out.push(c);
            after_separator = false;
        } else if c == '_' || c.is_whitespace() {
            if !after_separator {
                out.push(if c == '_' { '_' } else { ' ' });
                after_separator = true;
            }
        }
    }

    let mut out: String = out.chars().take(MAX_IDENTIFIER_LEN).collect();
    while out.ends_with(' ') || out.ends_with('_') {
        out.pop();
    }
    if out.is_empty() {
        FALLBACK_IDENTIFIER.to_string()
    } else {
        out
    }
}

/// Whether `name` is a time or organisation unit dimension column.
pub fn is_dimension_column(name: &str) -> bool {
    let lower = name.to_lowercase();
    DIMENSION_NAMES.contains(&lower.as_str())
}

/// Map a DHIS2 `valueType` (or legacy Java type name) to a column type.
pub fn declared_type(value_type: &str) -> Option<ColumnType> {
    let t = value_type.trim();
    if t.is_empty() {
        return None;
    }
    let ty = match t.to_ascii_uppercase().as_str() {
        "NUMBER" | "INTEGER" | "INTEGER_POSITIVE" | "INTEGER_NEGATIVE"
        | "INTEGER_ZERO_OR_POSITIVE" | "PERCENTAGE" | "UNIT_INTERVAL" => ColumnType::Numeric,
        "JAVA.LANG.DOUBLE" | "JAVA.LANG.INTEGER" | "JAVA.LANG.LONG" => ColumnType::Numeric,
        "BOOLEAN" | "TRUE_ONLY" | "JAVA.LANG.BOOLEAN" => ColumnType::Boolean,
        "DATE" | "DATETIME" | "AGE" | "JAVA.TIME.LOCALDATE" | "JAVA.UTIL.DATE" => ColumnType::Date,
        _ => ColumnType::Text,
    };
    Some(ty)
}

/// ISO dates and datetimes, `YYYY-MM`, and DHIS2 period codes with a
/// non-numeric marker (`2024Q1`, `2024S2`, `2024W05`, `2024BiW3`, `2024April`).
pub fn looks_like_date(s: &str) -> bool {
    let s = s.trim();
    if let Some(head) = s.get(..10) {
        if NaiveDate::parse_from_str(head, "%Y-%m-%d").is_ok() {
            let rest = &s[10..];
            return rest.is_empty()
                || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
                || NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").is_ok()
                || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M").is_ok();
        }
    }
    if s.len() == 7 && NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d").is_ok() {
        return true;
    }
    is_period_code(s)
}

fn is_period_code(s: &str) -> bool {
    let Some(year) = s.get(..4) else {
        return false;
    };
    if !year.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let rest = &s[4..];
    let numbered = |prefix: &str, max: u32| {
        rest.strip_prefix(prefix)
            .and_then(|n| n.parse::<u32>().ok())
            .is_some_and(|n| n >= 1 && n <= max)
    };
    numbered("Q", 4)
        || numbered("S", 2)
        || numbered("W", 53)
        || numbered("BiW", 27)
        || ["April", "July", "Oct", "Nov", "AprilS1", "AprilS2", "NovS1", "NovS2"].contains(&rest)
}

fn conforms(value: &Value, column_type: ColumnType) -> bool {
    match (column_type, value) {
        (_, Value::Null) | (ColumnType::Text, _) => true,
        (ColumnType::Numeric, Value::Number(_)) => true,
        (ColumnType::Numeric, Value::Text(s)) => parse_number(s).is_some(),
        (ColumnType::Boolean, Value::Bool(_)) => true,
        (ColumnType::Boolean, Value::Text(s)) => parse_bool(s).is_some(),
        (ColumnType::Date, Value::Text(s)) => looks_like_date(s),
        _ => false,
    }
}

/// Infer a type from values: boolean, then numeric, then date, else text.
/// A column with no non-null values is text.
pub fn infer_type<'a>(values: impl IntoIterator<Item = &'a Value> + Clone) -> ColumnType {
    let mut non_null = values.clone().into_iter().filter(|v| !v.is_null()).peekable();
    if non_null.peek().is_none() {
        return ColumnType::Text;
    }
    for candidate in [ColumnType::Boolean, ColumnType::Numeric, ColumnType::Date] {
        if values.clone().into_iter().all(|v| conforms(v, candidate)) {
            return candidate;
        }
    }
    ColumnType::Text
}

/// Final type of a column.
///
/// Dimension columns are always text. A declared type wins when every value
/// conforms to it; a declared type the data contradicts degrades to text.
/// Without a declaration the type is inferred from the values.
pub fn resolve_type<'a>(
    name: &str,
    declared: Option<ColumnType>,
    values: impl IntoIterator<Item = &'a Value> + Clone,
) -> ColumnType {
    if is_dimension_column(name) {
        return ColumnType::Text;
    }
    match declared {
        Some(t) if values.clone().into_iter().all(|v| conforms(v, t)) => t,
        Some(_) => ColumnType::Text,
        None => infer_type(values),
    }
}

/// Hands out sanitized, case-insensitively unique column names.
#[derive(Debug, Default)]
pub struct ColumnNamer {
    used: HashSet<String>,
}

impl ColumnNamer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sanitize `raw`; on collision append `_2`, `_3`, ...
    pub fn unique(&mut self, raw: &str) -> String {
        let base = sanitize_identifier(raw);
        if self.used.insert(base.to_lowercase()) {
            return base;
        }
        let mut n = 2;
        loop {
            let suffix = format!("_{}", n);
            let keep = MAX_IDENTIFIER_LEN.saturating_sub(suffix.len());
            let stem: String = base.chars().take(keep).collect();
            let candidate = format!("{}{}", stem, suffix);
            if self.used.insert(candidate.to_lowercase()) {
                return candidate;
            }
            n += 1;
        }
    }
}
