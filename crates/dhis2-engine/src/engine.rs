//! Query facade: resolve parameters, fetch once per identical in-flight
//! request, normalize.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, warn};

use crate::client::{FetchMode, HttpClient, RawResponse};
use crate::connection::Connection;
use crate::endpoint::EndpointProfile;
use crate::error::{EngineError, EngineResult};
use crate::normalize::normalize;
use crate::params::ParameterSet;
use crate::resolver::ParameterResolver;
use crate::result::{Column, NormalizedResult};
use crate::schema;
use crate::settings::EngineSettings;
use crate::store::ParameterStore;
use crate::Dhis2Api;

type SharedFetch = Shared<BoxFuture<'static, EngineResult<Arc<RawResponse>>>>;

/// Identity of a remote request: two callers with equal keys share one fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FlightKey {
    connection: String,
    endpoint: String,
    params: String,
    mode: FetchMode,
}

/// One invocation of [`QueryEngine::execute_query`] after resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub endpoint: String,
    pub predicate: String,
    pub params: ParameterSet,
}

struct InFlight {
    generation: u64,
    fetch: SharedFetch,
}

pub struct QueryEngine {
    api: Arc<dyn Dhis2Api>,
    resolver: ParameterResolver,
    in_flight: Arc<DashMap<FlightKey, InFlight>>,
    next_generation: AtomicU64,
}

impl QueryEngine {
    pub fn new(api: Arc<dyn Dhis2Api>) -> Self {
        Self::with_settings(api, &EngineSettings::default())
    }

    pub fn with_settings(api: Arc<dyn Dhis2Api>, settings: &EngineSettings) -> Self {
        let store = Arc::new(ParameterStore::new(settings.cache_ttl));
        Self {
            api,
            resolver: ParameterResolver::new(store).with_window_days(settings.default_window_days),
            in_flight: Arc::new(DashMap::new()),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Engine talking to DHIS2 over HTTP.
    pub fn http(settings: &EngineSettings) -> Self {
        Self::with_settings(Arc::new(HttpClient::new()), settings)
    }

    pub fn resolver(&self) -> &ParameterResolver {
        &self.resolver
    }

    pub fn store(&self) -> &Arc<ParameterStore> {
        self.resolver.store()
    }

    /// Number of remote requests currently in flight.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Resolve, fetch and normalize one table.
    ///
    /// In [`FetchMode::Introspection`] a tolerated conflict becomes an empty
    /// result; in [`FetchMode::DataFetch`] it is a `RemoteRejection`.
    pub async fn execute_query(
        &self,
        conn: &Connection,
        table: &str,
        predicate: &str,
        mode: FetchMode,
    ) -> EngineResult<NormalizedResult> {
        conn.check()?;
        let profile = EndpointProfile::for_endpoint(table);
        if profile.name.is_empty() {
            return Err(EngineError::configuration("table name is required"));
        }

        let resolution = self.resolver.resolve(conn, &profile.name, predicate);
        debug!(
            "resolved {} parameters for '{}' from {:?}",
            resolution.params.len(),
            profile.name,
            resolution.source
        );
        let request = QueryRequest {
            endpoint: profile.name.clone(),
            predicate: predicate.to_string(),
            params: resolution.params,
        };

        let raw = self.fetch_shared(conn, request, mode).await?;
        if raw.is_tolerated_conflict() {
            return Ok(NormalizedResult::empty());
        }

        let mut result = normalize(&profile, &raw.body)?;
        if result.rows.len() > conn.max_rows {
            warn!(
                "'{}' returned {} rows, truncating to {}",
                profile.name,
                result.rows.len(),
                conn.max_rows
            );
            result.rows.truncate(conn.max_rows);
        }
        Ok(result)
    }

    /// Await the in-flight request for this key, starting one if none exists.
    async fn fetch_shared(
        &self,
        conn: &Connection,
        request: QueryRequest,
        mode: FetchMode,
    ) -> EngineResult<Arc<RawResponse>> {
        let key = FlightKey {
            connection: conn.identity(),
            endpoint: request.endpoint,
            params: request.params.canonical(),
            mode,
        };
        let params = request.params;

        let fetch = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(entry) => {
                debug!("joining in-flight request for '{}'", key.endpoint);
                entry.get().fetch.clone()
            }
            Entry::Vacant(entry) => {
                let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                let fetch = self.start_fetch(key, generation, conn.clone(), params, mode);
                entry.insert(InFlight {
                    generation,
                    fetch: fetch.clone(),
                });
                fetch
            }
        };
        fetch.await
    }

    /// Build the shared future. It removes its own table entry when done, so
    /// the entry goes away even if every waiter is dropped first.
    fn start_fetch(
        &self,
        key: FlightKey,
        generation: u64,
        conn: Connection,
        params: ParameterSet,
        mode: FetchMode,
    ) -> SharedFetch {
        let api = Arc::clone(&self.api);
        let table = Arc::clone(&self.in_flight);
        async move {
            let result = api.execute(&conn, &key.endpoint, &params, mode).await;
            table.remove_if(&key, |_, flight| flight.generation == generation);
            result.map(Arc::new)
        }
        .boxed()
        .shared()
    }

    /// Check credentials against the server; returns the user's display name.
    pub async fn test_connection(&self, conn: &Connection) -> EngineResult<String> {
        conn.check()?;
        let name = self.api.verify(conn).await?;
        info!("connected to {} as {}", conn.identity(), name);
        Ok(name)
    }

    pub fn list_tables(&self, conn: &Connection) -> Vec<String> {
        schema::list_tables(conn)
    }

    /// Columns of `table`, discovered by an introspection fetch.
    pub async fn list_columns(&self, conn: &Connection, table: &str) -> EngineResult<Vec<Column>> {
        let result = self
            .execute_query(conn, table, "", FetchMode::Introspection)
            .await?;
        Ok(result.columns)
    }
}

impl std::fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine")
            .field("resolver", &self.resolver)
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}
