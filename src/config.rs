// src/config.rs

use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use std::{path::Path, time::Duration};
use tracing::debug;

use crate::error::{ExtractError, Result};
use crate::fetch::urls::UrlTemplate;

pub const DEFAULT_URL_TEMPLATE: &str = "https://www.caiso.com/outlook/SP/History/{date}";
pub const DEFAULT_LOOKBACK_DAYS: u32 = 28;
/// First day the CAISO outlook history has snapshots for.
pub const DEFAULT_EARLIEST_DATE: &str = "2018-04-10";

/// Raw run configuration, as found in the JSON/YAML config file.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub start_date: Option<String>,
    pub url_template: String,
    pub user_agent: Option<String>,
    pub lookback_days: u32,
    pub earliest_date: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            start_date: None,
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            user_agent: None,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            earliest_date: DEFAULT_EARLIEST_DATE.to_string(),
            timeout_secs: 30,
            max_retries: 0,
            retry_backoff_ms: 500,
        }
    }
}

/// Config after validation: dates parsed, template checked.
#[derive(Debug, Clone)]
pub struct Settings {
    pub start_date: Option<NaiveDate>,
    pub template: UrlTemplate,
    pub user_agent: Option<String>,
    pub lookback_days: u32,
    pub earliest_date: NaiveDate,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl Config {
    /// Read a config file; `.yaml`/`.yml` go through serde_yaml, anything else is JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Settings> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ExtractError::config(format!("reading {}: {e}", path.display()))
        })?;
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        let cfg: Config = if is_yaml {
            serde_yaml::from_str(&text)
                .map_err(|e| ExtractError::config(format!("parsing {}: {e}", path.display())))?
        } else {
            serde_json::from_str(&text)
                .map_err(|e| ExtractError::config(format!("parsing {}: {e}", path.display())))?
        };
        debug!(path = %path.display(), "loaded config");
        cfg.validate()
    }

    pub fn validate(&self) -> Result<Settings> {
        let start_date = self
            .start_date
            .as_deref()
            .map(|s| parse_date_or_datetime(s, "start_date"))
            .transpose()?;
        let earliest_date = parse_date_or_datetime(&self.earliest_date, "earliest_date")?;
        if self.lookback_days == 0 {
            return Err(ExtractError::config("lookback_days must be greater than zero"));
        }
        let template = UrlTemplate::parse(&self.url_template)?;

        Ok(Settings {
            start_date,
            template,
            user_agent: self.user_agent.clone(),
            lookback_days: self.lookback_days,
            earliest_date,
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
        })
    }
}

impl Default for Settings {
    fn default() -> Self {
        // the defaults are known-good
        Config::default()
            .validate()
            .expect("default config must validate")
    }
}

/// Accepts `2024-05-01` as well as `2024-05-01T00:00:00Z`.
fn parse_date_or_datetime(s: &str, field: &str) -> Result<NaiveDate> {
    let s = s.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(d);
    }
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.date_naive())
        .map_err(|_| ExtractError::config(format!("{field}: unparsable date {s:?}")))
}
