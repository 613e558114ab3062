// src/error.rs

use chrono::NaiveDate;
use thiserror::Error;

/// Everything that can stop (or skip) a day of extraction.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The source answered 200 with a page instead of a snapshot.
    #[error("no snapshot for {date} (content-type {content_type:?}{})", detail_suffix(.detail))]
    NoDataForDate {
        date: NaiveDate,
        content_type: Option<String>,
        detail: Option<String>,
    },

    #[error("transport error for {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("malformed snapshot for {date}: {reason}")]
    MalformedPayload { date: NaiveDate, reason: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to emit output: {0}")]
    Emit(#[from] std::io::Error),

    #[error("bookmark state error: {0}")]
    State(String),
}

impl ExtractError {
    /// Only the "no data yet" signal lets the run carry on.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ExtractError::NoDataForDate { .. })
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        ExtractError::Configuration(msg.into())
    }

    pub(crate) fn malformed(date: NaiveDate, err: csv::Error) -> Self {
        let reason = match err.kind() {
            csv::ErrorKind::UnequalLengths {
                pos,
                expected_len,
                len,
            } => {
                let line = pos.as_ref().map(|p| p.line()).unwrap_or_default();
                format!("line {line}: expected {expected_len} fields, found {len}")
            }
            csv::ErrorKind::Utf8 { pos, err } => {
                let line = pos.as_ref().map(|p| p.line()).unwrap_or_default();
                format!("line {line}: invalid UTF-8 ({err})")
            }
            _ => err.to_string(),
        };
        ExtractError::MalformedPayload { date, reason }
    }
}

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(d) => format!(": {d}"),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, ExtractError>;
