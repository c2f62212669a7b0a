//! Table catalogue exposed to SQL front ends.

use std::collections::BTreeSet;

use crate::connection::Connection;
use crate::endpoint::{endpoint_key, DEFAULT_ENDPOINTS};

/// The single schema every DHIS2 table lives in.
pub const SCHEMA_NAME: &str = "dhis2";

pub fn list_schemas() -> Vec<String> {
    vec![SCHEMA_NAME.to_string()]
}

/// Configured endpoints first (sorted), then the built-in defaults not
/// already listed.
pub fn list_tables(conn: &Connection) -> Vec<String> {
    let configured: BTreeSet<&str> = conn
        .endpoint_params
        .keys()
        .map(|k| endpoint_key(k))
        .filter(|k| !k.is_empty())
        .collect();
    let mut tables: Vec<String> = configured.into_iter().map(str::to_string).collect();
    for endpoint in DEFAULT_ENDPOINTS {
        if !tables.iter().any(|t| t == endpoint) {
            tables.push(endpoint.to_string());
        }
    }
    tables
}

pub fn has_table(conn: &Connection, table: &str) -> bool {
    let table = endpoint_key(table);
    list_tables(conn).iter().any(|t| t == table)
}
