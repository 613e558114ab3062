// src/run.rs

use chrono::NaiveDate;
use std::{sync::Arc, time::Duration};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

use crate::config::Settings;
use crate::cursor::{DateWindowCursor, ExtractionWindow};
use crate::error::{ExtractError, Result};
use crate::feeds::FeedDescriptor;
use crate::fetch::snapshot::{SnapshotFetcher, SnapshotResponse};
use crate::process::extract::extract_all;
use crate::sink::RecordSink;

/// Source of "today". Read once per step.
pub type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

pub fn local_clock() -> Clock {
    Arc::new(|| chrono::Local::now().date_naive())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub days_requested: usize,
    pub days_emitted: usize,
    pub days_without_data: usize,
    pub records_emitted: usize,
    pub last_served: Option<NaiveDate>,
}

/// One feed's walk over its date window.
pub struct Extraction {
    feed: FeedDescriptor,
    fetcher: SnapshotFetcher,
    cursor: DateWindowCursor,
    clock: Clock,
    max_retries: u32,
    retry_backoff: Duration,
}

impl Extraction {
    pub fn new(
        feed: FeedDescriptor,
        client: reqwest::Client,
        settings: &Settings,
        resume: Option<NaiveDate>,
        clock: Clock,
    ) -> Self {
        let today = clock();
        let window = ExtractionWindow::resolve(
            resume,
            settings.start_date,
            today,
            settings.lookback_days,
            settings.earliest_date,
        );
        info!(
            feed = feed.name,
            first = %window.requested_date,
            lower_bound = %window.lower_bound,
            "window resolved"
        );
        Self {
            feed,
            fetcher: SnapshotFetcher::new(client, settings.template.clone(), feed.url_suffix),
            cursor: DateWindowCursor::new(window),
            clock,
            max_retries: settings.max_retries,
            retry_backoff: settings.retry_backoff,
        }
    }

    pub fn cursor(&self) -> &DateWindowCursor {
        &self.cursor
    }

    /// Walk until today. Stops at the first fatal error; a day's records are
    /// only emitted once all of them decoded.
    #[instrument(level = "info", skip_all, fields(feed = self.feed.name))]
    pub async fn run<S: RecordSink>(&mut self, sink: &mut S) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        sink.write_schema(self.feed.name, &self.feed.schema(), self.feed.primary_keys)?;

        loop {
            let today = (self.clock)();
            let Some(day) = self.cursor.next_day(today) else {
                break;
            };
            summary.days_requested += 1;

            match self.fetch_with_retry(day).await {
                Ok(resp) => {
                    let records = extract_all(&resp).inspect_err(|e| {
                        error!(date = %resp.served_date, error = %e, "snapshot rejected");
                    })?;
                    for rec in &records {
                        sink.write_record(self.feed.name, rec)?;
                    }
                    sink.write_state(self.feed.name, resp.served_date)?;
                    info!(
                        requested = %day,
                        served = %resp.served_date,
                        records = records.len(),
                        "day emitted"
                    );
                    summary.days_emitted += 1;
                    summary.records_emitted += records.len();
                    summary.last_served = Some(resp.served_date);
                    self.cursor.advance(resp.served_date, today);
                }
                Err(e @ ExtractError::NoDataForDate { .. }) => {
                    info!(date = %day, "{e}");
                    summary.days_without_data += 1;
                    self.cursor.advance(day, today);
                }
                Err(e) => {
                    error!(date = %day, error = %e, "extraction stopped");
                    return Err(e);
                }
            }
        }

        info!(
            days = summary.days_requested,
            emitted = summary.days_emitted,
            empty = summary.days_without_data,
            records = summary.records_emitted,
            "window exhausted"
        );
        Ok(summary)
    }

    /// Only transport failures are retried, with doubling backoff.
    async fn fetch_with_retry(&self, day: NaiveDate) -> Result<SnapshotResponse> {
        let mut attempts = 0;
        loop {
            match self.fetcher.fetch(day).await {
                Err(e @ ExtractError::Transport { .. }) if attempts < self.max_retries => {
                    attempts += 1;
                    let backoff = backoff_delay(self.retry_backoff, attempts);
                    warn!(date = %day, attempt = attempts, delay_ms = backoff.as_millis() as u64, error = %e, "retrying");
                    sleep(backoff).await;
                }
                other => return other,
            }
        }
    }
}

/// `base * 2^(attempt - 1)`, saturating instead of overflowing.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32
        .checked_pow(attempt.saturating_sub(1))
        .unwrap_or(u32::MAX);
    base.saturating_mul(factor)
}
