//! DHIS2 Engine - Query DHIS2 Web API endpoints as tables
//!
//! This crate turns a table name plus free-form predicate text into a DHIS2
//! API request and the response into a uniform tabular result:
//! - Parameter resolution (connection defaults, endpoint overrides,
//!   query-time directives, cached context)
//! - An HTTP client with pagination and de-duplication of identical
//!   in-flight requests
//! - Normalization of analytics, data value sets, tracker and event
//!   payloads into typed columns and rows

pub mod client;
pub mod connection;
pub mod directive;
pub mod endpoint;
pub mod engine;
pub mod error;
pub mod normalize;
pub mod params;
pub mod resolver;
pub mod result;
pub mod sanitize;
pub mod schema;
pub mod settings;
pub mod store;

pub use client::{FetchMode, HttpClient, RawResponse};
pub use connection::{AuthMethod, ConfigIssue, Connection};
pub use directive::extract_directives;
pub use endpoint::{EndpointProfile, Shape, DEFAULT_ENDPOINTS};
pub use engine::{QueryEngine, QueryRequest};
pub use error::{EngineError, EngineResult};
pub use normalize::normalize;
pub use params::{DimensionGroup, ParameterSet};
pub use resolver::{ParamSource, ParameterResolver, Resolution};
pub use result::{Column, ColumnType, NormalizedResult, Value};
pub use schema::{has_table, list_schemas, list_tables, SCHEMA_NAME};
pub use settings::EngineSettings;
pub use store::{ParameterStore, StoreKey};

use async_trait::async_trait;

/// Transport to a DHIS2 server.
///
/// [`HttpClient`] is the production implementation; tests substitute
/// in-process doubles.
#[async_trait]
pub trait Dhis2Api: Send + Sync {
    /// GET `endpoint` with `params`, draining pages where the endpoint is
    /// paged. In introspection mode a 409 comes back as
    /// [`RawResponse::tolerated_conflict`] instead of an error.
    async fn execute(
        &self,
        conn: &Connection,
        endpoint: &str,
        params: &ParameterSet,
        mode: FetchMode,
    ) -> EngineResult<RawResponse>;

    /// Authenticate against `/me` and return the user's display name.
    async fn verify(&self, conn: &Connection) -> EngineResult<String>;
}
