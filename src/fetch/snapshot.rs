// src/fetch/snapshot.rs

use chrono::NaiveDate;
use reqwest::{header, Client};
use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

use super::urls::{build_url, UrlTemplate};
use crate::config::Settings;
use crate::error::{ExtractError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Csv,
    NonData,
}

/// One fetched day. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotResponse {
    pub requested_date: NaiveDate,
    /// The day the source actually served, taken from the URL that was sent.
    pub served_date: NaiveDate,
    pub content_kind: ContentKind,
    pub url: Url,
    pub body: Vec<u8>,
}

/// Builds the dated request for a day, sends it, and sorts the reply into
/// snapshot / no-data / transport failure.
#[derive(Debug, Clone)]
pub struct SnapshotFetcher {
    client: Client,
    template: UrlTemplate,
    suffix: String,
}

impl SnapshotFetcher {
    pub fn new(client: Client, template: UrlTemplate, suffix: impl Into<String>) -> Self {
        Self {
            client,
            template,
            suffix: suffix.into(),
        }
    }

    /// HTTP client with the configured user agent and timeout.
    pub fn client_for(settings: &Settings) -> Result<Client> {
        let mut builder = Client::builder().timeout(settings.timeout).gzip(true);
        if let Some(ua) = &settings.user_agent {
            builder = builder.user_agent(ua.clone());
        }
        builder.build().map_err(|source| ExtractError::Transport {
            url: settings.template.as_str().to_string(),
            source,
        })
    }

    pub fn url_for(&self, day: NaiveDate) -> Result<Url> {
        build_url(day, &self.template, &self.suffix)
    }

    pub async fn fetch(&self, day: NaiveDate) -> Result<SnapshotResponse> {
        let url = self.url_for(day)?;
        debug!(date = %day, url = %url, "requesting snapshot");

        let transport = |source: reqwest::Error| ExtractError::Transport {
            url: url.to_string(),
            source,
        };
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(transport)?
            .error_for_status()
            .map_err(transport)?;

        let sent = resp.url().clone();
        let content_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = resp.bytes().await.map_err(transport)?.to_vec();

        classify(&self.template, day, sent, content_type, body)
    }
}

/// The source signals "nothing for this day" with a 200 HTML page, so the
/// content type is the only thing telling the two apart.
pub fn classify(
    template: &UrlTemplate,
    requested: NaiveDate,
    sent: Url,
    content_type: Option<String>,
    body: Vec<u8>,
) -> Result<SnapshotResponse> {
    if !is_snapshot_type(content_type.as_deref()) {
        return Err(ExtractError::NoDataForDate {
            date: requested,
            content_type,
            detail: page_title(&body),
        });
    }

    let served_date = match template.date_in(&sent) {
        Some(d) => d,
        None => {
            warn!(url = %sent, date = %requested, "no date token in sent path; using requested date");
            requested
        }
    };
    if served_date != requested {
        debug!(requested = %requested, served = %served_date, "source served a different day");
    }

    Ok(SnapshotResponse {
        requested_date: requested,
        served_date,
        content_kind: ContentKind::Csv,
        url: sent,
        body,
    })
}

fn is_snapshot_type(content_type: Option<&str>) -> bool {
    let Some(ct) = content_type else {
        return false;
    };
    let essence = ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    matches!(
        essence.as_str(),
        "application/octet-stream" | "binary/octet-stream"
    )
}

/// `<title>` of a no-data page, for the log line.
fn page_title(body: &[u8]) -> Option<String> {
    let html = String::from_utf8_lossy(body);
    let doc = Html::parse_document(&html);
    let sel = Selector::parse("title").ok()?;
    let title = doc
        .select(&sel)
        .next()?
        .text()
        .collect::<String>()
        .trim()
        .to_string();
    (!title.is_empty()).then_some(title)
}

#[cfg(test)]
impl SnapshotResponse {
    pub(crate) fn csv(served_date: NaiveDate, body: impl Into<Vec<u8>>) -> Self {
        Self {
            requested_date: served_date,
            served_date,
            content_kind: ContentKind::Csv,
            url: Url::parse("about:blank").unwrap(),
            body: body.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> UrlTemplate {
        UrlTemplate::parse("https://www.caiso.com/outlook/SP/History/{date}").unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn octet_stream_is_a_snapshot() {
        let t = template();
        let d = day(2024, 5, 1);
        let sent = build_url(d, &t, "demand.csv").unwrap();
        let r = classify(
            &t,
            d,
            sent,
            Some("application/octet-stream".into()),
            b"A,B\n1,2\n".to_vec(),
        )
        .unwrap();
        assert_eq!(r.content_kind, ContentKind::Csv);
        assert_eq!(r.served_date, d);
    }

    #[test]
    fn served_date_follows_sent_path() {
        let t = template();
        let sent = build_url(day(2024, 4, 30), &t, "demand.csv").unwrap();
        let r = classify(
            &t,
            day(2024, 5, 1),
            sent,
            Some("application/octet-stream".into()),
            Vec::new(),
        )
        .unwrap();
        assert_eq!(r.requested_date, day(2024, 5, 1));
        assert_eq!(r.served_date, day(2024, 4, 30));
    }

    #[test]
    fn html_is_no_data() {
        let t = template();
        let d = day(2024, 5, 1);
        let sent = build_url(d, &t, "demand.csv").unwrap();
        let body = b"<html><head><title> Page Not Found </title></head><body></body></html>";
        let err = classify(
            &t,
            d,
            sent,
            Some("text/html; charset=utf-8".into()),
            body.to_vec(),
        )
        .unwrap_err();
        match err {
            ExtractError::NoDataForDate {
                date,
                content_type,
                detail,
            } => {
                assert_eq!(date, d);
                assert_eq!(content_type.as_deref(), Some("text/html; charset=utf-8"));
                assert_eq!(detail.as_deref(), Some("Page Not Found"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_content_type_is_no_data() {
        let t = template();
        let d = day(2024, 5, 1);
        let sent = build_url(d, &t, "demand.csv").unwrap();
        let err = classify(&t, d, sent, None, b"1,2".to_vec()).unwrap_err();
        assert!(!err.is_fatal());
    }

    #[test]
    fn snapshot_types() {
        assert!(is_snapshot_type(Some("application/octet-stream")));
        assert!(is_snapshot_type(Some("Application/Octet-Stream; charset=binary")));
        assert!(!is_snapshot_type(Some("text/csv")));
        assert!(!is_snapshot_type(Some("application/csv")));
        assert!(!is_snapshot_type(Some("text/html")));
        assert!(!is_snapshot_type(Some("application/json")));
        assert!(!is_snapshot_type(None));
    }
}
