//! Engine-wide settings from environment variables.

use std::time::Duration;

use anyhow::{Context, Result};

use crate::resolver::DEFAULT_WINDOW_DAYS;
use crate::store::DEFAULT_TTL;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// How long a resolved parameter set stays reusable.
    pub cache_ttl: Duration,
    /// Trailing period window injected when a query names no period.
    pub default_window_days: i64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_TTL,
            default_window_days: DEFAULT_WINDOW_DAYS,
        }
    }
}

impl EngineSettings {
    pub fn from_env() -> Result<Self> {
        let cache_ttl_secs: u64 = std::env::var("DHIS2_CACHE_TTL_SECS")
            .unwrap_or_else(|_| DEFAULT_TTL.as_secs().to_string())
            .parse()
            .context("Invalid DHIS2_CACHE_TTL_SECS")?;
        let default_window_days: i64 = std::env::var("DHIS2_DEFAULT_WINDOW_DAYS")
            .unwrap_or_else(|_| DEFAULT_WINDOW_DAYS.to_string())
            .parse()
            .context("Invalid DHIS2_DEFAULT_WINDOW_DAYS")?;
        if default_window_days < 0 {
            anyhow::bail!("DHIS2_DEFAULT_WINDOW_DAYS must not be negative");
        }
        Ok(Self {
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            default_window_days,
        })
    }
}
