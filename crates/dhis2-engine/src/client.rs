//! HTTP client for the DHIS2 Web API.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde_json::Value as Json;
use tracing::{debug, warn};
use url::Url;

use crate::connection::{AuthMethod, Connection};
use crate::endpoint::EndpointProfile;
use crate::error::{EngineError, EngineResult};
use crate::params::ParameterSet;
use crate::Dhis2Api;

/// Generic key newer tracker endpoints use for their record array.
const TRACKER_COLLECTION: &str = "instances";

const UNKNOWN_USER: &str = "unknown user";

/// Why a request is being made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchMode {
    /// Column discovery. A 409 (typically a missing required dimension)
    /// yields an empty response instead of an error, and only the first
    /// page of a paged endpoint is read.
    Introspection,
    /// Row retrieval. Every non-2xx status is an error.
    DataFetch,
}

/// A decoded response body with the status it arrived with.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Json,
}

impl RawResponse {
    pub fn new(status: u16, body: Json) -> Self {
        Self { status, body }
    }

    /// Stand-in for a 409 swallowed in introspection mode.
    pub fn tolerated_conflict() -> Self {
        Self {
            status: StatusCode::CONFLICT.as_u16(),
            body: Json::Null,
        }
    }

    pub fn is_tolerated_conflict(&self) -> bool {
        self.status == StatusCode::CONFLICT.as_u16()
    }
}

/// `reqwest`-backed [`Dhis2Api`].
#[derive(Debug, Clone, Default)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn request(&self, conn: &Connection, url: Url, pairs: &[(String, String)]) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .get(url)
            .query(pairs)
            .timeout(conn.timeout())
            .header(ACCEPT, "application/json");
        match &conn.auth {
            AuthMethod::Basic { username, password } => builder.basic_auth(username, Some(password)),
            AuthMethod::Pat { token } => builder.header(AUTHORIZATION, format!("ApiToken {}", token)),
        }
    }

    /// One GET. Applies the status policy for `mode` and decodes the body.
    async fn fetch(
        &self,
        conn: &Connection,
        url: &Url,
        params: &ParameterSet,
        mode: FetchMode,
    ) -> EngineResult<RawResponse> {
        let pairs = params.query_pairs();
        debug!("GET {} ({} params, {:?})", url, pairs.len(), mode);

        let response = self.request(conn, url.clone(), &pairs).send().await?;
        let status = response.status();

        if status == StatusCode::CONFLICT && mode == FetchMode::Introspection {
            let body = response.text().await.unwrap_or_default();
            warn!("{} answered 409 during introspection, treating as empty: {}", url, body);
            return Ok(RawResponse::tolerated_conflict());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::RemoteRejection {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        let body: Json = serde_json::from_str(&text).map_err(|e| {
            EngineError::normalization(format!("response from {} is not JSON: {}", url, e))
        })?;
        Ok(RawResponse::new(status.as_u16(), body))
    }

    /// Drain a paged collection endpoint into a single response whose
    /// collection array holds every row, bounded by the connection's
    /// `max_rows`.
    async fn fetch_paged(
        &self,
        conn: &Connection,
        url: &Url,
        profile: &EndpointProfile,
        params: &ParameterSet,
        mode: FetchMode,
    ) -> EngineResult<RawResponse> {
        let page_size = conn.page_size.max(1);
        let mut first: Option<RawResponse> = None;
        let mut key: Option<String> = None;
        let mut rows: Vec<Json> = Vec::new();
        let mut page = 1usize;

        loop {
            let mut paged = params.clone();
            paged.set("page", page.to_string());
            paged.set("pageSize", page_size.to_string());
            paged.set("totalPages", "false");

            let mut response = self.fetch(conn, url, &paged, mode).await?;
            if response.is_tolerated_conflict() {
                return Ok(response);
            }

            let found = profile
                .collection()
                .and_then(|c| take_collection(&mut response.body, c))
                .or_else(|| take_collection(&mut response.body, TRACKER_COLLECTION));
            let Some((found_key, batch)) = found else {
                // Not a paged collection after all; let the normalizer judge it.
                if first.is_none() {
                    return Ok(response);
                }
                break;
            };

            let batch_len = batch.len();
            rows.extend(batch);
            debug!("page {} of '{}' returned {} rows", page, profile.name, batch_len);
            if first.is_none() {
                first = Some(response);
                key = Some(found_key);
            }

            if rows.len() >= conn.max_rows {
                if rows.len() > conn.max_rows {
                    warn!(
                        "'{}' exceeds the {} row ceiling, truncating",
                        profile.name, conn.max_rows
                    );
                }
                rows.truncate(conn.max_rows);
                break;
            }
            if batch_len < page_size || mode == FetchMode::Introspection {
                break;
            }
            page += 1;
        }

        let (Some(mut response), Some(key)) = (first, key) else {
            return Err(EngineError::normalization(format!(
                "paged response for '{}' carried no collection",
                profile.name
            )));
        };
        if let Some(body) = response.body.as_object_mut() {
            body.insert(key, Json::Array(rows));
        }
        Ok(response)
    }
}

/// Move the named array out of `body`, leaving `null` in its place.
fn take_collection(body: &mut Json, key: &str) -> Option<(String, Vec<Json>)> {
    let slot = body.get_mut(key)?;
    if !slot.is_array() {
        return None;
    }
    match slot.take() {
        Json::Array(rows) => Some((key.to_string(), rows)),
        _ => None,
    }
}

#[async_trait]
impl Dhis2Api for HttpClient {
    async fn execute(
        &self,
        conn: &Connection,
        endpoint: &str,
        params: &ParameterSet,
        mode: FetchMode,
    ) -> EngineResult<RawResponse> {
        let profile = EndpointProfile::for_endpoint(endpoint);
        let url = conn.endpoint_url(&profile.name)?;
        if profile.paged {
            self.fetch_paged(conn, &url, &profile, params, mode).await
        } else {
            self.fetch(conn, &url, params, mode).await
        }
    }

    async fn verify(&self, conn: &Connection) -> EngineResult<String> {
        let url = conn.endpoint_url("me")?;
        let response = self.request(conn, url.clone(), &[]).send().await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(EngineError::RemoteRejection {
                status: status.as_u16(),
                body: "invalid credentials".to_string(),
            });
        }
        if status == StatusCode::CONFLICT {
            // Credentials were accepted; the server just has nothing to say.
            warn!("{} answered 409 during verification", url);
            return Ok(UNKNOWN_USER.to_string());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::RemoteRejection {
                status: status.as_u16(),
                body,
            });
        }

        let me: Json = response
            .json()
            .await
            .map_err(|e| EngineError::normalization(format!("{} did not return JSON: {}", url, e)))?;
        let name = ["displayName", "name", "username"]
            .iter()
            .find_map(|k| me.get(*k).and_then(Json::as_str))
            .unwrap_or(UNKNOWN_USER)
            .to_string();
        debug!("verified connection to {} as {}", conn.identity(), name);
        Ok(name)
    }
}
