//! Integration tests for QueryEngine against an in-process DHIS2 double

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dhis2_engine::{
    AuthMethod, ColumnType, Connection, Dhis2Api, EngineError, EngineResult, FetchMode,
    ParameterSet, QueryEngine, RawResponse, Value,
};
use serde_json::{json, Value as Json};

/// Counts requests and records the parameters each one carried.
struct CountingApi {
    calls: AtomicUsize,
    seen: Mutex<Vec<ParameterSet>>,
    delay: Duration,
    body: Json,
    reject_with_conflict: bool,
}

impl CountingApi {
    fn new(body: Json) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
            body,
            reject_with_conflict: false,
        }
    }

    fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn conflicting(mut self) -> Self {
        self.reject_with_conflict = true;
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn seen(&self) -> Vec<ParameterSet> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Dhis2Api for CountingApi {
    async fn execute(
        &self,
        _conn: &Connection,
        _endpoint: &str,
        params: &ParameterSet,
        mode: FetchMode,
    ) -> EngineResult<RawResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(params.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.reject_with_conflict {
            return match mode {
                FetchMode::Introspection => Ok(RawResponse::tolerated_conflict()),
                FetchMode::DataFetch => Err(EngineError::RemoteRejection {
                    status: 409,
                    body: "At least one dimension must be specified".to_string(),
                }),
            };
        }
        Ok(RawResponse::new(200, self.body.clone()))
    }

    async fn verify(&self, _conn: &Connection) -> EngineResult<String> {
        Ok("John Traore".to_string())
    }
}

fn connection() -> Connection {
    Connection::new(
        "play.dhis2.org",
        AuthMethod::Basic {
            username: "admin".to_string(),
            password: "district".to_string(),
        },
    )
    .with_id("play")
}

fn analytics_body() -> Json {
    json!({
        "headers": [
            {"name": "dx", "column": "Data", "valueType": "TEXT"},
            {"name": "pe", "column": "Period", "valueType": "TEXT"},
            {"name": "ou", "column": "Organisation unit", "valueType": "TEXT"},
            {"name": "value", "column": "Value", "valueType": "NUMBER"}
        ],
        "metadata": {
            "items": {
                "fbfJHSPpUQD": {"name": "ANC 1st visit"},
                "cYeuwXTCPkU": {"name": "ANC 2nd visit"},
                "ImspTQPwCqd": {"name": "Sierra Leone"},
                "202401": {"name": "January 2024"}
            }
        },
        "rows": [
            ["fbfJHSPpUQD", "202401", "ImspTQPwCqd", "120"],
            ["cYeuwXTCPkU", "202401", "ImspTQPwCqd", "95"]
        ]
    })
}

#[tokio::test]
async fn test_concurrent_identical_queries_share_one_request() {
    let api = Arc::new(CountingApi::new(analytics_body()).slow(Duration::from_millis(50)));
    let engine = QueryEngine::new(api.clone());
    let conn = connection();

    let predicate = "dx=fbfJHSPpUQD;cYeuwXTCPkU pe=202401 ou=ImspTQPwCqd";
    let queries = (0..8).map(|_| engine.execute_query(&conn, "analytics", predicate, FetchMode::DataFetch));
    let results = futures::future::join_all(queries).await;

    assert_eq!(api.calls(), 1);
    let first = results[0].as_ref().unwrap();
    for result in &results {
        assert_eq!(result.as_ref().unwrap(), first);
    }
    assert_eq!(engine.in_flight(), 0);
}

#[tokio::test]
async fn test_sequential_queries_are_not_deduplicated() {
    let api = Arc::new(CountingApi::new(analytics_body()));
    let engine = QueryEngine::new(api.clone());
    let conn = connection();

    for _ in 0..2 {
        engine
            .execute_query(&conn, "analytics", "dx=a pe=2024", FetchMode::DataFetch)
            .await
            .unwrap();
    }
    assert_eq!(api.calls(), 2);
}

#[tokio::test]
async fn test_different_parameters_issue_separate_requests() {
    let api = Arc::new(CountingApi::new(analytics_body()).slow(Duration::from_millis(20)));
    let engine = QueryEngine::new(api.clone());
    let conn = connection();

    let (a, b) = futures::join!(
        engine.execute_query(&conn, "analytics", "dx=a pe=2024", FetchMode::DataFetch),
        engine.execute_query(&conn, "analytics", "dx=b pe=2024", FetchMode::DataFetch),
    );
    assert!(a.is_ok() && b.is_ok());
    assert_eq!(api.calls(), 2);
}

#[tokio::test]
async fn test_analytics_is_pivoted_with_labels() {
    let api = Arc::new(CountingApi::new(analytics_body()));
    let engine = QueryEngine::new(api);
    let result = engine
        .execute_query(&connection(), "analytics", "pe=202401", FetchMode::DataFetch)
        .await
        .unwrap();

    assert_eq!(
        result.column_names(),
        vec!["period", "orgunit", "ANC 1st visit", "ANC 2nd visit"]
    );
    assert_eq!(result.columns[2].column_type, ColumnType::Numeric);
    assert_eq!(
        result.rows,
        vec![vec![
            Value::Text("January 2024".to_string()),
            Value::Text("Sierra Leone".to_string()),
            Value::Number(120.0),
            Value::Number(95.0),
        ]]
    );
}

#[tokio::test]
async fn test_cache_fallback_reuses_resolved_parameters() {
    let api = Arc::new(CountingApi::new(analytics_body()));
    let engine = QueryEngine::new(api.clone());
    let conn = connection();

    engine
        .execute_query(&conn, "analytics", "dx=fbfJHSPpUQD pe=LAST_12_MONTHS ou=USER_ORGUNIT", FetchMode::DataFetch)
        .await
        .unwrap();
    engine
        .execute_query(&conn, "analytics", "", FetchMode::DataFetch)
        .await
        .unwrap();

    let seen = api.seen();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], seen[1]);
    assert!(seen[1].has_group("dx"));
}

#[tokio::test]
async fn test_query_text_overrides_connection_defaults() {
    let api = Arc::new(CountingApi::new(analytics_body()));
    let engine = QueryEngine::new(api.clone());
    let conn = connection()
        .with_default_param("ouMode", "SELECTED")
        .with_endpoint_param("analytics", "aggregationType", "SUM");

    engine
        .execute_query(&conn, "analytics", "ouMode=DESCENDANTS pe=2024", FetchMode::DataFetch)
        .await
        .unwrap();

    let seen = api.seen();
    assert_eq!(seen[0].get("ouMode"), Some("DESCENDANTS"));
    assert_eq!(seen[0].get("aggregationType"), Some("SUM"));
    assert_eq!(seen[0].get("displayProperty"), Some("NAME"));
}

#[tokio::test]
async fn test_repeated_period_groups_are_unioned() {
    let api = Arc::new(CountingApi::new(analytics_body()));
    let engine = QueryEngine::new(api.clone());

    engine
        .execute_query(
            &connection(),
            "analytics",
            "dimension=pe:202401 AND dimension=pe:202402",
            FetchMode::DataFetch,
        )
        .await
        .unwrap();

    let groups = api.seen()[0].groups("dimension");
    let periods = groups.iter().find(|g| g.subtype == "pe").unwrap();
    assert_eq!(periods.items, vec!["202401", "202402"]);
}

#[tokio::test]
async fn test_introspection_conflict_yields_empty_columns() {
    let api = Arc::new(CountingApi::new(json!({})).conflicting());
    let engine = QueryEngine::new(api);
    let conn = connection();

    let columns = engine.list_columns(&conn, "analytics").await.unwrap();
    assert!(columns.is_empty());

    let err = engine
        .execute_query(&conn, "analytics", "", FetchMode::DataFetch)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::RemoteRejection { status: 409, .. }));
}

#[tokio::test]
async fn test_list_columns_of_tracked_entities() {
    let api = Arc::new(CountingApi::new(json!({
        "trackedEntityInstances": [{
            "trackedEntityInstance": "PQfMcpmXeFE",
            "orgUnit": "DiszpKrYNg8",
            "attributes": [
                {"attribute": "w75KJ2mc4zz", "displayName": "First name", "value": "John"}
            ]
        }]
    })));
    let engine = QueryEngine::new(api);
    let columns = engine
        .list_columns(&connection(), "trackedEntityInstances")
        .await
        .unwrap();
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["trackedEntityInstance", "orgUnit", "First name"]);
}

#[tokio::test]
async fn test_connection_check_uses_api() {
    let engine = QueryEngine::new(Arc::new(CountingApi::new(json!({}))));
    assert_eq!(
        engine.test_connection(&connection()).await.unwrap(),
        "John Traore"
    );
}
