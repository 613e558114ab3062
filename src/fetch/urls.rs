// src/fetch/urls.rs

use chrono::NaiveDate;
use url::Url;

use crate::error::{ExtractError, Result};

pub const DATE_TOKEN: &str = "{date}";
const DATE_FORMAT: &str = "%Y%m%d";

/// A base URL with a single `{date}` placeholder somewhere in its path,
/// e.g. `https://www.caiso.com/outlook/SP/History/{date}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    raw: String,
    /// Index of the path segment holding the token.
    segment: usize,
    /// Text around the token inside that segment.
    prefix: String,
    suffix: String,
    /// The path already names a file after the dated segment
    /// (`.../{date}/demand.csv`), so no feed suffix gets appended.
    names_resource: bool,
}

impl UrlTemplate {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        match raw.matches(DATE_TOKEN).count() {
            1 => {}
            0 => {
                return Err(ExtractError::config(format!(
                    "url_template {raw:?} has no {DATE_TOKEN} token"
                )))
            }
            n => {
                return Err(ExtractError::config(format!(
                    "url_template {raw:?} has {n} {DATE_TOKEN} tokens, expected one"
                )))
            }
        }

        let (before, after) = raw
            .split_once(DATE_TOKEN)
            .ok_or_else(|| ExtractError::config("url_template lost its token"))?;
        let filled = Url::parse(&format!("{before}00000000{after}"))
            .map_err(|e| ExtractError::config(format!("url_template {raw:?}: {e}")))?;
        if !matches!(filled.scheme(), "http" | "https") {
            return Err(ExtractError::config(format!(
                "url_template {raw:?} must be http or https"
            )));
        }

        // the token has to sit in the path, not the host or query
        let authority_start = before.find("://").map(|i| i + 3).unwrap_or(0);
        let last_slash = before.rfind('/').unwrap_or(0);
        if last_slash < authority_start || before.contains('?') || before.contains('#') {
            return Err(ExtractError::config(format!(
                "url_template {raw:?}: {DATE_TOKEN} must be inside the URL path"
            )));
        }

        let base = Url::parse(before)
            .map_err(|e| ExtractError::config(format!("url_template {raw:?}: {e}")))?;
        let segment = base
            .path_segments()
            .map(|s| s.count().saturating_sub(1))
            .unwrap_or(0);
        let prefix = before[last_slash + 1..].to_string();
        let after_path = after.split(['?', '#']).next().unwrap_or("");
        let suffix = after_path.split('/').next().unwrap_or("").to_string();
        let names_resource = after_path
            .split('/')
            .skip(1)
            .any(|seg| !seg.is_empty());

        Ok(Self {
            raw: raw.to_string(),
            segment,
            prefix,
            suffix,
            names_resource,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn names_resource(&self) -> bool {
        self.names_resource
    }

    /// Substitute `day` as an 8-digit `YYYYMMDD` token.
    pub fn for_day(&self, day: NaiveDate) -> Result<Url> {
        let token = day.format(DATE_FORMAT).to_string();
        let filled = self.raw.replacen(DATE_TOKEN, &token, 1);
        Url::parse(&filled).map_err(|e| ExtractError::config(format!("{filled:?}: {e}")))
    }

    /// Recover the day encoded in a URL built from this template.
    pub fn date_in(&self, url: &Url) -> Option<NaiveDate> {
        let seg = url.path_segments()?.nth(self.segment)?;
        let token = seg.strip_prefix(&self.prefix)?.strip_suffix(&self.suffix)?;
        if token.len() != 8 || !token.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        NaiveDate::parse_from_str(token, DATE_FORMAT).ok()
    }
}

/// Full request target for one feed on one day: the dated base plus the feed's
/// static resource suffix, unless the template already ends in a resource.
pub fn build_url(day: NaiveDate, template: &UrlTemplate, suffix: &str) -> Result<Url> {
    let mut url = template.for_day(day)?;
    if !suffix.is_empty() && !template.names_resource {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| ExtractError::config(format!("{} cannot take a path", template.raw)))?;
        segments.pop_if_empty();
        for part in suffix.split('/').filter(|p| !p.is_empty()) {
            segments.push(part);
        }
    }
    Ok(url)
}
