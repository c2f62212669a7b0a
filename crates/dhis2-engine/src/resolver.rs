//! Parameter Resolver: merges connection defaults, endpoint overrides and
//! query-time directives into the parameter set sent to DHIS2.
//!
//! Precedence, lowest first:
//!
//! 1. connection default parameters
//! 2. per-endpoint parameters
//! 3. directives recovered from the query text, or, when the text carries
//!    none, the last set resolved for the same (connection, table)
//!
//! A default trailing period window is then injected where the endpoint
//! needs one, and the engine-controlled presentation parameters are set last.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Local, NaiveDate};
use tracing::{debug, warn};

use crate::connection::Connection;
use crate::directive::extract_directives;
use crate::endpoint::EndpointProfile;
use crate::params::{ParameterSet, PERIOD_DIMENSION};
use crate::store::{ParameterStore, StoreKey};

/// Default trailing window, in days, injected when no period is given.
pub const DEFAULT_WINDOW_DAYS: i64 = 365;

/// Engine-controlled parameters, always appended and never overridable.
pub const PRESENTATION_PARAMS: [(&str, &str); 2] =
    [("displayProperty", "NAME"), ("skipMeta", "false")];

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Where the query-time layer of a resolution came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSource {
    /// Directives present in the query text.
    Directives,
    /// No directives; reused the cached set for this table.
    Cache,
    /// No directives and nothing cached.
    Defaults,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub params: ParameterSet,
    pub source: ParamSource,
}

#[derive(Debug, Clone)]
pub struct ParameterResolver {
    store: Arc<ParameterStore>,
    window_days: i64,
}

impl ParameterResolver {
    pub fn new(store: Arc<ParameterStore>) -> Self {
        Self {
            store,
            window_days: DEFAULT_WINDOW_DAYS,
        }
    }

    pub fn with_window_days(mut self, days: i64) -> Self {
        self.window_days = days;
        self
    }

    pub fn store(&self) -> &Arc<ParameterStore> {
        &self.store
    }

    pub fn resolve(&self, conn: &Connection, endpoint: &str, text: &str) -> Resolution {
        self.resolve_on(conn, endpoint, text, Local::now().date_naive())
    }

    /// Resolve with an explicit "today" for the default period window.
    pub fn resolve_on(
        &self,
        conn: &Connection,
        endpoint: &str,
        text: &str,
        today: NaiveDate,
    ) -> Resolution {
        let profile = EndpointProfile::for_endpoint(endpoint);
        let key = StoreKey::new(conn.identity(), profile.name.clone());

        let directives = extract_directives(text);
        let (query_layer, source) = if !directives.is_empty() {
            (directives, ParamSource::Directives)
        } else if let Some(cached) = self.store.get(&key) {
            debug!("no directives for '{}', reusing cached parameters", profile.name);
            (cached, ParamSource::Cache)
        } else {
            (ParameterSet::new(), ParamSource::Defaults)
        };

        let mut params = merge_layers(
            &conn.default_params,
            conn.endpoint_overrides(&profile.name),
            &query_layer,
        );

        if profile.period_window && !has_time_window(&params) {
            fill_window(&mut params, today, self.window_days);
        }

        if profile.requires_dimension && params.groups("dimension").is_empty() {
            warn!(
                "endpoint '{}' requires a dimension but none was resolved; sending as is",
                profile.name
            );
        }

        for (k, v) in PRESENTATION_PARAMS {
            params.set_last(k, v);
        }

        if source != ParamSource::Cache {
            self.store.put(key, params.clone());
        }

        Resolution { params, source }
    }
}

/// Ordered merge of the three parameter layers; later layers win per key.
pub fn merge_layers(
    defaults: &ParameterSet,
    endpoint: Option<&ParameterSet>,
    query: &ParameterSet,
) -> ParameterSet {
    let mut merged = defaults.clone();
    if let Some(endpoint) = endpoint {
        merged.overlay(endpoint);
    }
    merged.overlay(query);
    merged
}

/// A period group, an explicit `period`, or a start/end date pair.
pub fn has_time_window(params: &ParameterSet) -> bool {
    params.has_group(PERIOD_DIMENSION)
        || params.contains_key("period")
        || (params.contains_key("startDate") && params.contains_key("endDate"))
}

/// Supply whichever of `startDate`/`endDate` is missing. A lone `endDate`
/// anchors the window when it parses; given values are never replaced.
fn fill_window(params: &mut ParameterSet, today: NaiveDate, days: i64) {
    let anchor = params
        .get("endDate")
        .and_then(|end| NaiveDate::parse_from_str(end.trim(), DATE_FORMAT).ok())
        .unwrap_or(today);
    let (start, end) = trailing_window(anchor, days);
    if !params.contains_key("startDate") {
        debug!("injecting default startDate {}", start);
        params.set("startDate", start);
    }
    if !params.contains_key("endDate") {
        debug!("injecting default endDate {}", end);
        params.set("endDate", end);
    }
}

/// `(today - days, today)` formatted as `YYYY-MM-DD`.
pub fn trailing_window(today: NaiveDate, days: i64) -> (String, String) {
    let start = today - ChronoDuration::days(days);
    (
        start.format(DATE_FORMAT).to_string(),
        today.format(DATE_FORMAT).to_string(),
    )
}
