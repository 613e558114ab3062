// src/cursor.rs

use chrono::{Days, NaiveDate};

/// Days the engine may request: from `lower_bound` up to, but excluding, today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionWindow {
    pub requested_date: NaiveDate,
    pub lower_bound: NaiveDate,
}

impl ExtractionWindow {
    /// Pick the first day to request. Precedence: resume bookmark, then the
    /// configured start date, then `today - lookback_days`. Never earlier than
    /// `earliest` (the first day the source has data for).
    pub fn resolve(
        resume: Option<NaiveDate>,
        start_date: Option<NaiveDate>,
        today: NaiveDate,
        lookback_days: u32,
        earliest: NaiveDate,
    ) -> Self {
        let fallback = today
            .checked_sub_days(Days::new(u64::from(lookback_days)))
            .unwrap_or(NaiveDate::MIN);
        let lower_bound = start_date.unwrap_or(fallback).max(earliest);
        let requested_date = resume.unwrap_or(lower_bound).max(lower_bound);
        Self {
            requested_date,
            lower_bound,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    Start,
    Advancing(NaiveDate),
    Exhausted,
}

/// Steps through the window one day at a time. Today's file is not final,
/// so the walk stops as soon as the next candidate reaches today.
#[derive(Debug, Clone)]
pub struct DateWindowCursor {
    window: ExtractionWindow,
    state: CursorState,
}

impl DateWindowCursor {
    pub fn new(window: ExtractionWindow) -> Self {
        Self {
            window,
            state: CursorState::Start,
        }
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    pub fn window(&self) -> ExtractionWindow {
        self.window
    }

    /// The day to request now, or `None` once exhausted.
    pub fn next_day(&mut self, today: NaiveDate) -> Option<NaiveDate> {
        if self.state == CursorState::Start {
            let first = self.window.requested_date;
            self.state = if has_more(first, today) {
                CursorState::Advancing(first)
            } else {
                CursorState::Exhausted
            };
        }
        match self.state {
            CursorState::Advancing(d) => Some(d),
            _ => None,
        }
    }

    /// Move past `served`, the day the source actually answered for. A served
    /// day earlier than the one requested never pulls the cursor back.
    pub fn advance(&mut self, served: NaiveDate, today: NaiveDate) {
        let from = match self.state {
            CursorState::Exhausted => return,
            CursorState::Advancing(current) => served.max(current),
            CursorState::Start => served,
        };
        match next_after(from, today) {
            Some(next) => {
                self.window.requested_date = next;
                self.state = CursorState::Advancing(next);
            }
            None => self.state = CursorState::Exhausted,
        }
    }
}

pub fn has_more(next: NaiveDate, today: NaiveDate) -> bool {
    next < today
}

/// `served + 1`, unless that is today or later.
pub fn next_after(served: NaiveDate, today: NaiveDate) -> Option<NaiveDate> {
    served.succ_opt().filter(|next| has_more(*next, today))
}
