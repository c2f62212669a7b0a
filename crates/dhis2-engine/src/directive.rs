//! Extraction of `key=value` directives from predicate or comment text.
//!
//! Anything that is not an assignment (`WHERE`, `AND`, `SELECT *`, comment
//! markers) is skipped. A bare predicate, an inline `/* ... */` directive and
//! a whole statement all scan the same way.

use crate::params::{
    is_grouping_key, parse_groups, DimensionGroup, ParameterSet, DATA_DIMENSION,
    ORG_UNIT_DIMENSION, PERIOD_DIMENSION,
};

/// Shorthand keys that stand for `dimension=<key>:<items>`.
const DIMENSION_SHORTHANDS: [&str; 3] = [DATA_DIMENSION, PERIOD_DIMENSION, ORG_UNIT_DIMENSION];

/// One raw `key=value` pair in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub key: String,
    pub value: String,
}

/// Scan `text` for assignments.
pub fn scan_assignments(text: &str) -> Vec<Assignment> {
    let cleaned = text.replace("/*", " ").replace("*/", " ").replace("--", " ");
    let chars: Vec<char> = cleaned.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        if is_separator(chars[i]) {
            i += 1;
            continue;
        }

        let start = i;
        while i < chars.len() && !is_separator(chars[i]) && chars[i] != '=' {
            i += 1;
        }
        let word: String = chars[start..i].iter().collect();

        let mut j = i;
        while j < chars.len() && chars[j].is_whitespace() {
            j += 1;
        }
        if j >= chars.len() || chars[j] != '=' || !is_key(&word) {
            if i == start {
                // Stray '=' with no key before it.
                i += 1;
            }
            continue;
        }

        j += 1;
        while j < chars.len() && chars[j].is_whitespace() {
            j += 1;
        }
        let (value, next) = read_value(&chars, j);
        i = next;
        out.push(Assignment { key: word, value });
    }

    out
}

fn read_value(chars: &[char], start: usize) -> (String, usize) {
    match chars.get(start) {
        Some(&quote) if quote == '\'' || quote == '"' => {
            let mut end = start + 1;
            while end < chars.len() && chars[end] != quote {
                end += 1;
            }
            let value = chars[start + 1..end].iter().collect();
            (value, (end + 1).min(chars.len()))
        }
        _ => {
            let mut end = start;
            while end < chars.len() && !is_separator(chars[end]) {
                end += 1;
            }
            (chars[start..end].iter().collect(), end)
        }
    }
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || c == '&'
}

fn is_key(word: &str) -> bool {
    !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Turn directive text into the query-time parameter overlay.
///
/// Repeated assignments to a grouping key accumulate their groups; repeated
/// plain keys keep the last value.
pub fn extract_directives(text: &str) -> ParameterSet {
    let mut params = ParameterSet::new();
    for Assignment { key, value } in scan_assignments(text) {
        if DIMENSION_SHORTHANDS.contains(&key.as_str()) {
            // `pe=` with nothing after it names no period.
            if let Some(group) = DimensionGroup::parse(&format!("{}:{}", key, value))
                .filter(|g| !g.items.is_empty())
            {
                params.add_group("dimension", group);
            }
        } else if is_grouping_key(&key) {
            for group in parse_groups(&value) {
                params.add_group(&key, group);
            }
        } else {
            params.set(key, value);
        }
    }
    params
}
