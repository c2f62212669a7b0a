//! Response Normalizer: turns DHIS2 JSON into [`NormalizedResult`]s.
//!
//! The strategy is chosen from the endpoint's [`Shape`], never by probing the
//! payload:
//!
//! - **Matrix** (`analytics`): one fact per row keyed by `dx`/`pe`/`ou` is
//!   pivoted into one row per (period, org unit) with one column per data
//!   item. Responses without all four of `dx`, `pe`, `ou`, `value` are passed
//!   through as a plain table built from `headers`.
//! - **Flat array** (`dataValueSets`, metadata collections): the union of
//!   object keys becomes the column list.
//! - **Nested record** (`trackedEntityInstances`, `events`): scalar fields
//!   plus one column per nested attribute.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value as Json};
use tracing::debug;

use crate::endpoint::{EndpointProfile, NestedFields, Shape};
use crate::error::{EngineError, EngineResult};
use crate::result::{Column, ColumnType, NormalizedResult, Value};
use crate::sanitize::{declared_type, resolve_type, ColumnNamer, ORG_UNIT_COLUMN, PERIOD_COLUMN};

/// Generic key newer tracker endpoints use for their record array.
const TRACKER_COLLECTION: &str = "instances";

const DATA_HEADER: &str = "dx";
const PERIOD_HEADER: &str = "pe";
const ORG_UNIT_HEADER: &str = "ou";
const VALUE_HEADER: &str = "value";

pub fn normalize(profile: &EndpointProfile, body: &Json) -> EngineResult<NormalizedResult> {
    let result = match &profile.shape {
        Shape::Matrix => normalize_matrix(body),
        Shape::FlatArray { collection } => normalize_flat(body, collection),
        Shape::NestedRecord { collection, nested } => normalize_nested(body, collection, nested),
    }?;
    debug!(
        "normalized '{}': {} columns, {} rows",
        profile.name,
        result.columns.len(),
        result.rows.len()
    );
    Ok(result)
}

// ---------------------------------------------------------------------------
// Column finishing
// ---------------------------------------------------------------------------

struct PendingColumn {
    name: String,
    declared: Option<ColumnType>,
    force_text: bool,
}

impl PendingColumn {
    fn new(name: String, declared: Option<ColumnType>) -> Self {
        Self {
            name,
            declared,
            force_text: false,
        }
    }

    fn text(name: &str) -> Self {
        Self {
            name: name.to_string(),
            declared: Some(ColumnType::Text),
            force_text: true,
        }
    }
}

/// Type every column, coerce its cells, and check the row width invariant.
fn finish(pending: Vec<PendingColumn>, mut rows: Vec<Vec<Value>>) -> EngineResult<NormalizedResult> {
    let mut columns = Vec::with_capacity(pending.len());
    for (i, p) in pending.into_iter().enumerate() {
        let column_type = if p.force_text {
            ColumnType::Text
        } else {
            resolve_type(&p.name, p.declared, rows.iter().map(move |r| &r[i]))
        };
        let mut nullable = false;
        for row in rows.iter_mut() {
            let cell = std::mem::replace(&mut row[i], Value::Null);
            row[i] = cell.coerce(column_type);
            nullable |= row[i].is_null();
        }
        columns.push(Column {
            name: p.name,
            column_type,
            nullable,
        });
    }
    NormalizedResult::new(columns, rows)
}

fn json_text(v: &Json) -> Option<String> {
    match v {
        Json::Null => None,
        Json::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Matrix
// ---------------------------------------------------------------------------

struct Header {
    name: String,
    label: Option<String>,
    declared: Option<ColumnType>,
}

fn parse_headers(body: &Json) -> EngineResult<Vec<Header>> {
    let headers = body
        .get("headers")
        .and_then(Json::as_array)
        .ok_or_else(|| EngineError::normalization("analytics response has no 'headers' array"))?;
    headers
        .iter()
        .map(|h| {
            let name = h
                .get("name")
                .and_then(Json::as_str)
                .ok_or_else(|| EngineError::normalization("analytics header without a name"))?;
            let declared = h
                .get("valueType")
                .and_then(Json::as_str)
                .or_else(|| h.get("type").and_then(Json::as_str))
                .and_then(declared_type);
            Ok(Header {
                name: name.to_string(),
                label: h.get("column").and_then(Json::as_str).map(str::to_string),
                declared,
            })
        })
        .collect()
}

/// Positional rows, each checked against the header count.
fn matrix_rows(body: &Json, width: usize) -> EngineResult<Vec<&Vec<Json>>> {
    let rows = match body.get("rows") {
        None | Some(Json::Null) => return Ok(Vec::new()),
        Some(rows) => rows
            .as_array()
            .ok_or_else(|| EngineError::normalization("analytics 'rows' is not an array"))?,
    };
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let row = row
                .as_array()
                .ok_or_else(|| EngineError::normalization(format!("analytics row {} is not an array", i)))?;
            if row.len() != width {
                return Err(EngineError::normalization(format!(
                    "analytics row {} has {} values but there are {} headers",
                    i,
                    row.len(),
                    width
                )));
            }
            Ok(row)
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
struct MatrixPositions {
    dx: usize,
    pe: usize,
    ou: usize,
    value: usize,
}

/// Display labels from `metaData.items` (DHIS2's spelling) or `metadata.items`,
/// falling back to the raw identifier.
struct Labels<'a> {
    items: Option<&'a Map<String, Json>>,
}

impl<'a> Labels<'a> {
    fn from_body(body: &'a Json) -> Self {
        Self {
            items: body
                .pointer("/metaData/items")
                .or_else(|| body.pointer("/metadata/items"))
                .and_then(Json::as_object),
        }
    }

    fn label(&self, id: &str) -> String {
        self.items
            .and_then(|items| items.get(id))
            .and_then(|item| item.get("name"))
            .and_then(Json::as_str)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(id)
            .to_string()
    }
}

fn normalize_matrix(body: &Json) -> EngineResult<NormalizedResult> {
    let headers = parse_headers(body)?;
    let rows = matrix_rows(body, headers.len())?;
    let position = |name: &str| headers.iter().position(|h| h.name == name);

    match (
        position(DATA_HEADER),
        position(PERIOD_HEADER),
        position(ORG_UNIT_HEADER),
        position(VALUE_HEADER),
    ) {
        (Some(dx), Some(pe), Some(ou), Some(value)) => {
            let positions = MatrixPositions { dx, pe, ou, value };
            pivot(body, &rows, positions, headers[value].declared)
        }
        _ => {
            debug!("analytics response lacks dx/pe/ou/value headers, passing through");
            passthrough(&headers, &rows)
        }
    }
}

/// Long → wide pivot keyed by (period id, org unit id).
///
/// Rows are keyed by identifiers, not labels, so two org units sharing a
/// display name stay separate rows.
fn pivot(
    body: &Json,
    rows: &[&Vec<Json>],
    positions: MatrixPositions,
    value_type: Option<ColumnType>,
) -> EngineResult<NormalizedResult> {
    let labels = Labels::from_body(body);

    let mut items: Vec<String> = Vec::new();
    let mut item_index: HashMap<String, usize> = HashMap::new();
    let mut facts: BTreeMap<(String, String), HashMap<usize, Value>> = BTreeMap::new();

    for (i, row) in rows.iter().enumerate() {
        let field = |idx: usize, what: &str| {
            json_text(&row[idx]).ok_or_else(|| {
                EngineError::normalization(format!("analytics row {} has no {} value", i, what))
            })
        };
        let item = field(positions.dx, DATA_HEADER)?;
        let period = field(positions.pe, PERIOD_HEADER)?;
        let org_unit = field(positions.ou, ORG_UNIT_HEADER)?;
        let value = Value::from_json(&row[positions.value]);

        let slot = match item_index.get(&item) {
            Some(&slot) => slot,
            None => {
                item_index.insert(item.clone(), items.len());
                items.push(item);
                items.len() - 1
            }
        };
        facts.entry((period, org_unit)).or_default().insert(slot, value);
    }

    let mut namer = ColumnNamer::new();
    let mut pending = vec![
        PendingColumn::text(&namer.unique(PERIOD_COLUMN)),
        PendingColumn::text(&namer.unique(ORG_UNIT_COLUMN)),
    ];
    pending.extend(
        items
            .iter()
            .map(|id| PendingColumn::new(namer.unique(&labels.label(id)), value_type)),
    );

    let out_rows = facts
        .into_iter()
        .map(|((period, org_unit), mut values)| {
            let mut row = Vec::with_capacity(items.len() + 2);
            row.push(Value::Text(labels.label(&period)));
            row.push(Value::Text(labels.label(&org_unit)));
            row.extend((0..items.len()).map(|slot| values.remove(&slot).unwrap_or(Value::Null)));
            row
        })
        .collect();

    finish(pending, out_rows)
}

fn passthrough(headers: &[Header], rows: &[&Vec<Json>]) -> EngineResult<NormalizedResult> {
    let mut namer = ColumnNamer::new();
    let pending = headers
        .iter()
        .map(|h| {
            let raw = h.label.as_deref().unwrap_or(&h.name);
            PendingColumn::new(namer.unique(raw), h.declared)
        })
        .collect();
    let rows = rows
        .iter()
        .map(|row| row.iter().map(Value::from_json).collect())
        .collect();
    finish(pending, rows)
}

// ---------------------------------------------------------------------------
// Flat array
// ---------------------------------------------------------------------------

fn collection_array<'a>(body: &'a Json, collection: &str) -> EngineResult<&'a Vec<Json>> {
    if let Some(array) = body.as_array() {
        return Ok(array);
    }
    body.get(collection)
        .or_else(|| body.get(TRACKER_COLLECTION))
        .and_then(Json::as_array)
        .ok_or_else(|| {
            EngineError::normalization(format!("response has no '{}' array", collection))
        })
}

fn as_record<'a>(v: &'a Json, i: usize) -> EngineResult<&'a Map<String, Json>> {
    v.as_object()
        .ok_or_else(|| EngineError::normalization(format!("record {} is not an object", i)))
}

fn normalize_flat(body: &Json, collection: &str) -> EngineResult<NormalizedResult> {
    let records = collection_array(body, collection)?;

    let mut keys: Vec<&str> = Vec::new();
    let mut key_index: HashMap<&str, usize> = HashMap::new();
    for (i, record) in records.iter().enumerate() {
        for key in as_record(record, i)?.keys() {
            if !key_index.contains_key(key.as_str()) {
                key_index.insert(key, keys.len());
                keys.push(key);
            }
        }
    }

    let rows = records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let mut row = vec![Value::Null; keys.len()];
            for (key, v) in as_record(record, i)? {
                row[key_index[key.as_str()]] = Value::from_json(v);
            }
            Ok(row)
        })
        .collect::<EngineResult<Vec<_>>>()?;

    let mut namer = ColumnNamer::new();
    let pending = keys
        .iter()
        .map(|k| PendingColumn::new(namer.unique(k), None))
        .collect();
    finish(pending, rows)
}

// ---------------------------------------------------------------------------
// Nested record
// ---------------------------------------------------------------------------

fn normalize_nested(
    body: &Json,
    collection: &str,
    nested: &NestedFields,
) -> EngineResult<NormalizedResult> {
    let records = collection_array(body, collection)?;

    let mut fields: Vec<&str> = Vec::new();
    let mut field_index: HashMap<&str, usize> = HashMap::new();
    let mut attributes: Vec<(String, String)> = Vec::new();
    let mut attribute_index: HashMap<String, usize> = HashMap::new();

    for (i, record) in records.iter().enumerate() {
        for (key, v) in as_record(record, i)? {
            if key == nested.field {
                for attr in v.as_array().into_iter().flatten() {
                    if let Some((id, label)) = attribute_identity(attr, nested) {
                        if !attribute_index.contains_key(&id) {
                            attribute_index.insert(id.clone(), attributes.len());
                            attributes.push((id, label));
                        }
                    }
                }
            } else if !v.is_array() && !v.is_object() && !field_index.contains_key(key.as_str()) {
                field_index.insert(key, fields.len());
                fields.push(key);
            }
        }
    }

    let width = fields.len() + attributes.len();
    let rows = records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let mut row = vec![Value::Null; width];
            for (key, v) in as_record(record, i)? {
                if key == nested.field {
                    for attr in v.as_array().into_iter().flatten() {
                        if let Some((id, _)) = attribute_identity(attr, nested) {
                            let value = attr.get(nested.value_field).unwrap_or(&Json::Null);
                            row[fields.len() + attribute_index[&id]] = Value::from_json(value);
                        }
                    }
                } else if let Some(&idx) = field_index.get(key.as_str()) {
                    row[idx] = Value::from_json(v);
                }
            }
            Ok(row)
        })
        .collect::<EngineResult<Vec<_>>>()?;

    let mut namer = ColumnNamer::new();
    let mut pending: Vec<PendingColumn> = fields
        .iter()
        .map(|f| PendingColumn::new(namer.unique(f), None))
        .collect();
    pending.extend(
        attributes
            .iter()
            .map(|(_, label)| PendingColumn::new(namer.unique(label), None)),
    );
    finish(pending, rows)
}

/// `(id, column label)` of a nested attribute object.
fn attribute_identity(attr: &Json, nested: &NestedFields) -> Option<(String, String)> {
    let id = attr.get(nested.id_field).and_then(Json::as_str)?.to_string();
    let label = nested
        .label_field
        .and_then(|f| attr.get(f))
        .and_then(Json::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| id.clone());
    Some((id, label))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn analytics(rows: Json, items: Json) -> Json {
        json!({
            "headers": [
                {"name": "dx", "column": "Data", "valueType": "TEXT"},
                {"name": "pe", "column": "Period", "valueType": "TEXT"},
                {"name": "ou", "column": "Organisation unit", "valueType": "TEXT"},
                {"name": "value", "column": "Value", "valueType": "NUMBER"}
            ],
            "metaData": {},
            "metadata": {"items": items},
            "rows": rows
        })
    }

    fn matrix() -> EndpointProfile {
        EndpointProfile::for_endpoint("analytics")
    }

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    #[test]
    fn pivot_long_to_wide() {
        let body = analytics(
            json!([
                ["itemA", "period1", "orgX", "10"],
                ["itemB", "period1", "orgX", "20"],
                ["itemA", "period1", "orgY", "5"]
            ]),
            json!({}),
        );
        let result = normalize(&matrix(), &body).unwrap();
        assert_eq!(result.column_names(), vec!["period", "orgunit", "itemA", "itemB"]);
        assert_eq!(
            result.rows,
            vec![
                vec![text("period1"), text("orgX"), Value::Number(10.0), Value::Number(20.0)],
                vec![text("period1"), text("orgY"), Value::Number(5.0), Value::Null],
            ]
        );
        assert_eq!(result.columns[2].column_type, ColumnType::Numeric);
        assert!(!result.columns[2].nullable);
        assert!(result.columns[3].nullable);
    }

    #[test]
    fn pivot_is_idempotent() {
        let body = analytics(
            json!([
                ["b", "2024", "ou2", "1"],
                ["a", "2023", "ou1", "2"],
                ["c", "2024", "ou1", "3"]
            ]),
            json!({}),
        );
        let first = normalize(&matrix(), &body).unwrap();
        let second = normalize(&matrix(), &body).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.column_names(), vec!["period", "orgunit", "b", "a", "c"]);
        // Rows sorted by (period, org unit).
        let keys: Vec<(String, String)> = first
            .rows
            .iter()
            .map(|r| (r[0].as_text().unwrap(), r[1].as_text().unwrap()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("2023".to_string(), "ou1".to_string()),
                ("2024".to_string(), "ou1".to_string()),
                ("2024".to_string(), "ou2".to_string()),
            ]
        );
    }

    #[test]
    fn leading_columns_are_text_even_when_numeric_looking() {
        let body = analytics(
            json!([["a", "2024", "12345", "1"], ["a", "2025", "67890", "2"]]),
            json!({"2024": {"name": "2024"}, "12345": {"name": "12345"}}),
        );
        let result = normalize(&matrix(), &body).unwrap();
        assert_eq!(result.columns[0].column_type, ColumnType::Text);
        assert_eq!(result.columns[1].column_type, ColumnType::Text);
        assert_eq!(result.rows[0][0], text("2024"));
        assert_eq!(result.rows[0][1], text("12345"));
    }

    #[test]
    fn labels_come_from_metadata_with_id_fallback() {
        let body = analytics(
            json!([["fbfJHSPpUQD", "202401", "ImspTQPwCqd", "7"]]),
            json!({
                "fbfJHSPpUQD": {"name": "ANC 1st visit"},
                "202401": {"name": "January 2024"}
            }),
        );
        let result = normalize(&matrix(), &body).unwrap();
        assert_eq!(result.column_names(), vec!["period", "orgunit", "ANC 1st visit"]);
        assert_eq!(result.rows[0][0], text("January 2024"));
        assert_eq!(result.rows[0][1], text("ImspTQPwCqd"));
    }

    #[test]
    fn labels_accept_server_camel_case_metadata_key() {
        let mut body = analytics(json!([["fbfJHSPpUQD", "2024", "ou1", "1"]]), json!({}));
        body["metaData"] = json!({"items": {"fbfJHSPpUQD": {"name": "ANC 1st visit"}}});
        let result = normalize(&matrix(), &body).unwrap();
        assert_eq!(result.column_names(), vec!["period", "orgunit", "ANC 1st visit"]);
    }

    #[test]
    fn org_units_sharing_a_label_stay_separate() {
        let body = analytics(
            json!([["a", "2024", "ou1", "1"], ["a", "2024", "ou2", "2"]]),
            json!({"ou1": {"name": "Central"}, "ou2": {"name": "Central"}}),
        );
        let result = normalize(&matrix(), &body).unwrap();
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[0][2], Value::Number(1.0));
        assert_eq!(result.rows[1][2], Value::Number(2.0));
    }

    #[test]
    fn item_labels_colliding_with_each_other_get_suffixes() {
        let body = analytics(
            json!([["a", "2024", "ou1", "1"], ["b", "2024", "ou1", "2"]]),
            json!({"a": {"name": "Cases"}, "b": {"name": "cases"}}),
        );
        let result = normalize(&matrix(), &body).unwrap();
        assert_eq!(result.column_names(), vec!["period", "orgunit", "Cases", "cases_2"]);
    }

    #[test]
    fn non_numeric_values_degrade_item_column_to_text() {
        let body = analytics(
            json!([["a", "2024", "ou1", "1"], ["a", "2025", "ou1", "high"]]),
            json!({}),
        );
        let result = normalize(&matrix(), &body).unwrap();
        assert_eq!(result.columns[2].column_type, ColumnType::Text);
        assert_eq!(result.rows[0][2], text("1"));
    }

    #[test]
    fn empty_analytics_has_only_leading_columns() {
        let body = analytics(json!([]), json!({}));
        let result = normalize(&matrix(), &body).unwrap();
        assert_eq!(result.column_names(), vec!["period", "orgunit"]);
        assert!(result.rows.is_empty());
    }

    #[test]
    fn analytics_without_pivot_headers_passes_through() {
        let body = json!({
            "headers": [
                {"name": "dx", "column": "Data", "valueType": "TEXT"},
                {"name": "value", "column": "Value", "valueType": "NUMBER"}
            ],
            "rows": [["a", "3"], ["b", "4.5"]]
        });
        let result = normalize(&matrix(), &body).unwrap();
        assert_eq!(result.column_names(), vec!["Data", "Value"]);
        assert_eq!(result.columns[1].column_type, ColumnType::Numeric);
        assert_eq!(result.rows[1][1], Value::Number(4.5));
    }

    #[test]
    fn analytics_shape_errors() {
        let err = normalize(&matrix(), &json!({"rows": []})).unwrap_err();
        assert!(matches!(err, EngineError::Normalization(_)));

        let body = json!({
            "headers": [{"name": "dx"}, {"name": "value"}],
            "rows": [["a"]]
        });
        let err = normalize(&matrix(), &body).unwrap_err();
        assert!(err.to_string().contains("1 values but there are 2 headers"));
    }

    #[test]
    fn flat_union_of_keys_with_null_fill() {
        let profile = EndpointProfile::for_endpoint("dataValueSets");
        let body = json!({
            "dataSet": "pBOMPrpg1QX",
            "dataValues": [
                {"dataElement": "de1", "period": "202401", "orgUnit": "ou1", "value": "12"},
                {"dataElement": "de2", "period": "202401", "orgUnit": "ou1", "value": "3", "comment": "late"}
            ]
        });
        let result = normalize(&profile, &body).unwrap();
        assert_eq!(
            result.column_names(),
            vec!["dataElement", "period", "orgUnit", "value", "comment"]
        );
        assert_eq!(result.rows[0][4], Value::Null);
        assert_eq!(result.rows[1][4], text("late"));
        assert_eq!(result.columns[1].column_type, ColumnType::Text);
        assert_eq!(result.columns[2].column_type, ColumnType::Text);
        assert_eq!(result.columns[3].column_type, ColumnType::Numeric);
        assert_eq!(result.rows[0][3], Value::Number(12.0));
        assert!(result.columns[4].nullable);
        assert!(!result.columns[0].nullable);
    }

    #[test]
    fn flat_missing_collection_is_normalization_error() {
        let profile = EndpointProfile::for_endpoint("dataValueSets");
        let err = normalize(&profile, &json!({"httpStatus": "OK"})).unwrap_err();
        assert!(matches!(err, EngineError::Normalization(_)));
    }

    #[test]
    fn flat_rejects_non_object_records() {
        let profile = EndpointProfile::for_endpoint("dataValueSets");
        let err = normalize(&profile, &json!({"dataValues": [1, 2]})).unwrap_err();
        assert!(err.to_string().contains("record 0"));
    }

    #[test]
    fn metadata_collection_is_flat() {
        let profile = EndpointProfile::for_endpoint("dataElements");
        let body = json!({
            "pager": {"page": 1},
            "dataElements": [{"id": "a", "displayName": "A"}, {"id": "b"}]
        });
        let result = normalize(&profile, &body).unwrap();
        assert_eq!(result.column_names(), vec!["id", "displayName"]);
        assert_eq!(result.rows[1][1], Value::Null);
    }

    #[test]
    fn nested_attributes_are_flattened() {
        let profile = EndpointProfile::for_endpoint("trackedEntityInstances");
        let body = json!({
            "trackedEntityInstances": [
                {
                    "trackedEntityInstance": "t1",
                    "orgUnit": "ou1",
                    "created": "2024-01-05T10:00:00.000",
                    "enrollments": [],
                    "attributes": [
                        {"attribute": "w75KJ2mc4zz", "displayName": "First name", "value": "Ana"},
                        {"attribute": "cejWyOfXge6", "displayName": "Age", "value": "34"}
                    ]
                },
                {
                    "trackedEntityInstance": "t2",
                    "orgUnit": "ou2",
                    "created": "2024-02-01T08:30:00.000",
                    "attributes": [
                        {"attribute": "cejWyOfXge6", "displayName": "Age", "value": "41"}
                    ]
                }
            ]
        });
        let result = normalize(&profile, &body).unwrap();
        assert_eq!(
            result.column_names(),
            vec!["trackedEntityInstance", "orgUnit", "created", "First name", "Age"]
        );
        assert_eq!(result.columns[2].column_type, ColumnType::Date);
        assert_eq!(result.columns[4].column_type, ColumnType::Numeric);
        assert_eq!(result.rows[1][3], Value::Null);
        assert_eq!(result.rows[1][4], Value::Number(41.0));
    }

    #[test]
    fn nested_attribute_label_colliding_with_field() {
        let profile = EndpointProfile::for_endpoint("trackedEntityInstances");
        let body = json!({
            "trackedEntityInstances": [{
                "orgUnit": "ou1",
                "attributes": [{"attribute": "x", "displayName": "orgUnit", "value": "v"}]
            }]
        });
        let result = normalize(&profile, &body).unwrap();
        assert_eq!(result.column_names(), vec!["orgUnit", "orgUnit_2"]);
    }

    #[test]
    fn event_data_values_use_element_ids() {
        let profile = EndpointProfile::for_endpoint("events");
        let body = json!({
            "events": [{
                "event": "e1",
                "eventDate": "2024-03-01T00:00:00.000",
                "dataValues": [
                    {"dataElement": "qrur9Dvnyt5", "value": "22"},
                    {"dataElement": "oZg33kd9taw", "value": "Female"}
                ]
            }]
        });
        let result = normalize(&profile, &body).unwrap();
        assert_eq!(
            result.column_names(),
            vec!["event", "eventDate", "qrur9Dvnyt5", "oZg33kd9taw"]
        );
        assert_eq!(result.rows[0][2], Value::Number(22.0));
    }

    #[test]
    fn tracker_instances_key_is_accepted() {
        let profile = EndpointProfile::for_endpoint("trackedEntityInstances");
        let body = json!({"instances": [{"trackedEntity": "t1", "attributes": []}]});
        let result = normalize(&profile, &body).unwrap();
        assert_eq!(result.column_names(), vec!["trackedEntity"]);
    }
}
