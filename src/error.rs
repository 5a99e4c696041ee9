use chrono::NaiveDate;
use std::time::Duration;

/// Errors raised while walking a calendar or parsing the text it shows
#[derive(Debug, thiserror::Error)]
pub enum WalkError {
    #[error("invalid date range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("could not reach {target} after {pages} previous-page steps (first visible date: {reached})")]
    CalendarNavigation {
        target: NaiveDate,
        reached: NaiveDate,
        pages: usize,
    },

    #[error("calendar did not respond within {timeout:?} during {operation}")]
    CalendarTimeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("malformed price text: {0:?}")]
    PriceFormat(String),

    #[error("malformed distance text: {0:?}")]
    DistanceFormat(String),

    #[error("calendar failure during {operation}: {source}")]
    Calendar {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

/// Failures reported by a [`CalendarView`](crate::availability::CalendarView) implementation
#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    #[error("timed out waiting for the calendar to render")]
    Timeout,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}
