//! Calendar pagination and price extraction over a date range.
//!
//! The walker first pages backward until the requested start date is in view,
//! then pages forward collecting one record per date until the end date has
//! been passed or the calendar runs out of pages.

use crate::error::{CalendarError, WalkError};
use crate::models::{AvailabilityRecord, CalendarCell, DateRange, Price};
use crate::parse::parse_price;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A paged date picker. Every call may block until the widget has rendered,
/// but must give up once `timeout` has elapsed.
pub trait CalendarView {
    /// Date of the first cell currently shown
    fn first_visible_date(&mut self, timeout: Duration) -> Result<NaiveDate, CalendarError>;

    /// All cells currently shown, in display order
    fn visible_cells(&mut self, timeout: Duration) -> Result<Vec<CalendarCell>, CalendarError>;

    /// Move one page back in time
    fn previous_page(&mut self, timeout: Duration) -> Result<(), CalendarError>;

    /// Move one page forward; `false` when there is no further page
    fn next_page(&mut self, timeout: Duration) -> Result<bool, CalendarError>;
}

/// What to do with a cell whose price text cannot be parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseFailurePolicy {
    /// Log a warning, leave the date out and keep walking
    #[default]
    Skip,
    /// Fail the whole walk
    Abort,
}

/// Shared flag a caller can set to stop a walk early
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Tuning for a walk
#[derive(Debug, Clone)]
pub struct WalkerOptions {
    /// Upper bound on previous-page steps while seeking the start date
    pub max_seek_pages: usize,
    /// Upper bound on pages read while collecting
    pub max_collect_pages: usize,
    /// Deadline for each individual calendar call
    pub call_timeout: Duration,
    pub on_parse_failure: ParseFailurePolicy,
}

impl Default for WalkerOptions {
    fn default() -> Self {
        Self {
            max_seek_pages: 36,
            max_collect_pages: 36,
            call_timeout: Duration::from_secs(10),
            on_parse_failure: ParseFailurePolicy::Skip,
        }
    }
}

/// Walks a [`CalendarView`] and extracts one record per date in range
#[derive(Debug, Clone, Default)]
pub struct AvailabilityWalker {
    options: WalkerOptions,
    cancel: Option<CancelToken>,
}

impl AvailabilityWalker {
    pub fn new(options: WalkerOptions) -> Self {
        Self {
            options,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Resolve optional bounds (start defaults to `today`, end to start + 180
    /// days) and walk. An inverted range fails before the calendar is touched.
    pub fn walk_between<C: CalendarView + ?Sized>(
        &self,
        calendar: &mut C,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<Vec<AvailabilityRecord>, WalkError> {
        let range = DateRange::resolve(start, end, today)?;
        self.walk(calendar, &range)
    }

    pub fn walk<C: CalendarView + ?Sized>(
        &self,
        calendar: &mut C,
        range: &DateRange,
    ) -> Result<Vec<AvailabilityRecord>, WalkError> {
        info!("Walking calendar for {}", range);

        self.seek(calendar, range)?;
        let collected = self.collect(calendar, range)?;

        info!("Collected {} dates for {}", collected.len(), range);
        Ok(collected)
    }

    fn seek<C: CalendarView + ?Sized>(
        &self,
        calendar: &mut C,
        range: &DateRange,
    ) -> Result<(), WalkError> {
        let mut pages = 0;
        let mut first = self.call(calendar, "first_visible_date", |c, t| {
            c.first_visible_date(t)
        })?;

        while first > range.start() {
            if pages >= self.options.max_seek_pages {
                return Err(WalkError::CalendarNavigation {
                    target: range.start(),
                    reached: first,
                    pages,
                });
            }

            debug!("First visible date {} is after {}, paging back", first, range.start());
            self.call(calendar, "previous_page", |c, t| c.previous_page(t))?;
            pages += 1;
            first = self.call(calendar, "first_visible_date", |c, t| {
                c.first_visible_date(t)
            })?;
        }

        debug!("Seek finished after {} pages at {}", pages, first);
        Ok(())
    }

    fn collect<C: CalendarView + ?Sized>(
        &self,
        calendar: &mut C,
        range: &DateRange,
    ) -> Result<Vec<AvailabilityRecord>, WalkError> {
        let mut visited: HashSet<NaiveDate> = HashSet::new();
        let mut collected = Vec::new();
        let mut pages = 0;

        loop {
            if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                warn!("Walk cancelled, returning {} dates", collected.len());
                return Ok(collected);
            }

            let cells = self.call(calendar, "visible_cells", |c, t| c.visible_cells(t))?;
            pages += 1;

            for cell in &cells {
                if !range.contains(cell.date) || visited.contains(&cell.date) {
                    continue;
                }
                visited.insert(cell.date);

                let price = match cell.price_text.as_deref() {
                    None => Price::Unavailable,
                    Some(text) => match parse_price(text) {
                        Ok(price) => price,
                        Err(e) if self.options.on_parse_failure == ParseFailurePolicy::Skip => {
                            warn!("Skipping {}: {}", cell.date, e);
                            continue;
                        }
                        Err(e) => return Err(e),
                    },
                };

                collected.push(AvailabilityRecord {
                    date: cell.date,
                    price,
                });
            }

            if cells.iter().any(|cell| cell.date > range.end()) {
                debug!("Passed {}, range covered", range.end());
                return Ok(collected);
            }

            if pages >= self.options.max_collect_pages {
                warn!(
                    "Stopped after {} pages before reaching {}",
                    pages,
                    range.end()
                );
                return Ok(collected);
            }

            let before = cells.first().map(|cell| cell.date);
            if !self.call(calendar, "next_page", |c, t| c.next_page(t))? {
                info!("No further calendar page, returning partial result");
                return Ok(collected);
            }

            let after = self.call(calendar, "first_visible_date", |c, t| {
                c.first_visible_date(t)
            })?;
            if after > range.end() {
                debug!("Next page starts at {}, range covered", after);
                return Ok(collected);
            }
            if before.is_some_and(|before| after <= before) {
                warn!("Calendar did not advance past {}, returning partial result", after);
                return Ok(collected);
            }
        }
    }

    /// Run one calendar call, retrying once if it times out
    fn call<C, T, F>(&self, calendar: &mut C, operation: &'static str, mut f: F) -> Result<T, WalkError>
    where
        C: CalendarView + ?Sized,
        F: FnMut(&mut C, Duration) -> Result<T, CalendarError>,
    {
        let timeout = self.options.call_timeout;
        let mut attempts = 0;

        loop {
            attempts += 1;
            match f(&mut *calendar, timeout) {
                Ok(value) => return Ok(value),
                Err(CalendarError::Timeout) if attempts < 2 => {
                    warn!("{} timed out after {:?}, retrying", operation, timeout);
                }
                Err(CalendarError::Timeout) => {
                    return Err(WalkError::CalendarTimeout { operation, timeout });
                }
                Err(CalendarError::Backend(source)) => {
                    return Err(WalkError::Calendar { operation, source });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Calendar showing fixed pages of `days` consecutive dates, with prices
    /// looked up from `price_for`.
    struct MockCalendar {
        pages: Vec<Vec<CalendarCell>>,
        current: usize,
        calls: Vec<&'static str>,
        timeouts: VecDeque<&'static str>,
        frozen: bool,
    }

    impl MockCalendar {
        fn new(pages: Vec<Vec<CalendarCell>>, current: usize) -> Self {
            Self {
                pages,
                current,
                calls: Vec::new(),
                timeouts: VecDeque::new(),
                frozen: false,
            }
        }

        /// Pages of `days` days each starting at `first`, every cell priced 100
        /// unless overridden by `text`.
        fn monthly(first: NaiveDate, count: usize, days: i64, current: usize) -> Self {
            Self::with_text(first, count, days, current, |_| Some("100".to_string()))
        }

        fn with_text(
            first: NaiveDate,
            count: usize,
            days: i64,
            current: usize,
            text: impl Fn(NaiveDate) -> Option<String>,
        ) -> Self {
            let pages = (0..count)
                .map(|p| {
                    (0..days)
                        .map(|d| {
                            let date = first + chrono::Duration::days(p as i64 * days + d);
                            CalendarCell {
                                date,
                                price_text: text(date),
                            }
                        })
                        .collect()
                })
                .collect();
            Self::new(pages, current)
        }

        /// `next_page` reports success but the calendar stays put
        fn frozen(mut self) -> Self {
            self.frozen = true;
            self
        }

        fn time_out_on(mut self, ops: &[&'static str]) -> Self {
            self.timeouts.extend(ops.iter().copied());
            self
        }

        fn maybe_timeout(&mut self, op: &'static str) -> Result<(), CalendarError> {
            self.calls.push(op);
            if self.timeouts.front() == Some(&op) {
                self.timeouts.pop_front();
                return Err(CalendarError::Timeout);
            }
            Ok(())
        }
    }

    impl CalendarView for MockCalendar {
        fn first_visible_date(&mut self, _: Duration) -> Result<NaiveDate, CalendarError> {
            self.maybe_timeout("first_visible_date")?;
            Ok(self.pages[self.current][0].date)
        }

        fn visible_cells(&mut self, _: Duration) -> Result<Vec<CalendarCell>, CalendarError> {
            self.maybe_timeout("visible_cells")?;
            Ok(self.pages[self.current].clone())
        }

        fn previous_page(&mut self, _: Duration) -> Result<(), CalendarError> {
            self.maybe_timeout("previous_page")?;
            self.current = self.current.saturating_sub(1);
            Ok(())
        }

        fn next_page(&mut self, _: Duration) -> Result<bool, CalendarError> {
            self.maybe_timeout("next_page")?;
            if self.frozen {
                Ok(true)
            } else if self.current + 1 < self.pages.len() {
                self.current += 1;
                Ok(true)
            } else {
                Ok(false)
            }
        }
    }

    /// Calendar whose previous-page button never changes anything
    struct StuckCalendar {
        first: NaiveDate,
    }

    impl CalendarView for StuckCalendar {
        fn first_visible_date(&mut self, _: Duration) -> Result<NaiveDate, CalendarError> {
            Ok(self.first)
        }

        fn visible_cells(&mut self, _: Duration) -> Result<Vec<CalendarCell>, CalendarError> {
            Ok(vec![CalendarCell {
                date: self.first,
                price_text: None,
            }])
        }

        fn previous_page(&mut self, _: Duration) -> Result<(), CalendarError> {
            Ok(())
        }

        fn next_page(&mut self, _: Duration) -> Result<bool, CalendarError> {
            Ok(false)
        }
    }

    fn walker() -> AvailabilityWalker {
        AvailabilityWalker::default()
    }

    #[test]
    fn test_walk_collects_range_in_order() {
        let mut calendar = MockCalendar::monthly(date(2024, 5, 1), 4, 30, 0);
        let range = DateRange::new(date(2024, 5, 10), date(2024, 6, 20)).unwrap();

        let records = walker().walk(&mut calendar, &range).unwrap();

        assert_eq!(records.len(), 42);
        assert_eq!(records.first().unwrap().date, date(2024, 5, 10));
        assert_eq!(records.last().unwrap().date, date(2024, 6, 20));
        assert!(records.windows(2).all(|w| w[0].date < w[1].date));
        assert!(records.iter().all(|r| range.contains(r.date)));
    }

    #[test]
    fn test_overlapping_pages_are_deduplicated() {
        // Each page repeats the last week of the previous one
        let pages = (0..3)
            .map(|p| {
                (0..35)
                    .map(|d| CalendarCell {
                        date: date(2024, 5, 1) + chrono::Duration::days(p * 28 + d),
                        price_text: Some("200".to_string()),
                    })
                    .collect()
            })
            .collect();
        let mut calendar = MockCalendar::new(pages, 0);
        let range = DateRange::new(date(2024, 5, 1), date(2024, 7, 15)).unwrap();

        let records = walker().walk(&mut calendar, &range).unwrap();

        let unique: HashSet<_> = records.iter().map(|r| r.date).collect();
        assert_eq!(unique.len(), records.len());
        assert_eq!(records.len(), 76);
    }

    #[test]
    fn test_seek_pages_back_to_start() {
        let mut calendar = MockCalendar::monthly(date(2024, 1, 1), 6, 30, 4);
        let range = DateRange::new(date(2024, 2, 5), date(2024, 2, 10)).unwrap();

        let records = walker().walk(&mut calendar, &range).unwrap();

        assert_eq!(records.len(), 6);
        assert_eq!(records[0].date, date(2024, 2, 5));
        let back = calendar.calls.iter().filter(|c| **c == "previous_page").count();
        assert_eq!(back, 3);
    }

    #[test]
    fn test_seek_gives_up_after_bound() {
        let mut calendar = StuckCalendar {
            first: date(2024, 6, 1),
        };
        let range = DateRange::new(date(2024, 5, 1), date(2024, 5, 31)).unwrap();
        let walker = AvailabilityWalker::new(WalkerOptions {
            max_seek_pages: 5,
            ..WalkerOptions::default()
        });

        let err = walker.walk(&mut calendar, &range).unwrap_err();

        match err {
            WalkError::CalendarNavigation { pages, target, .. } => {
                assert_eq!(pages, 5);
                assert_eq!(target, date(2024, 5, 1));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_page_that_does_not_advance_returns_partial() {
        let mut calendar = MockCalendar::monthly(date(2024, 5, 1), 1, 30, 0).frozen();
        let range = DateRange::new(date(2024, 5, 1), date(2024, 12, 31)).unwrap();

        let records = walker().walk(&mut calendar, &range).unwrap();

        assert_eq!(records.len(), 30);
        assert_eq!(records.last().unwrap().date, date(2024, 5, 30));
        assert_eq!(
            calendar.calls,
            vec![
                "first_visible_date",
                "visible_cells",
                "next_page",
                "first_visible_date"
            ]
        );
    }

    #[test]
    fn test_end_date_inclusive_and_next_day_stops() {
        let mut calendar = MockCalendar::monthly(date(2024, 5, 1), 3, 30, 0);
        let range = DateRange::new(date(2024, 5, 1), date(2024, 5, 15)).unwrap();

        let records = walker().walk(&mut calendar, &range).unwrap();

        assert_eq!(records.last().unwrap().date, date(2024, 5, 15));
        assert!(records.iter().all(|r| r.date != date(2024, 5, 16)));
        assert!(!calendar.calls.contains(&"next_page"));
    }

    #[test]
    fn test_end_on_last_cell_of_page_reads_next_page_start() {
        let mut calendar = MockCalendar::monthly(date(2024, 5, 1), 3, 30, 0);
        // Page 0 covers May 1..=May 30
        let range = DateRange::new(date(2024, 5, 1), date(2024, 5, 30)).unwrap();

        let records = walker().walk(&mut calendar, &range).unwrap();

        assert_eq!(records.len(), 30);
        assert_eq!(calendar.calls.iter().filter(|c| **c == "next_page").count(), 1);
        assert_eq!(calendar.calls.iter().filter(|c| **c == "visible_cells").count(), 1);
    }

    #[test]
    fn test_missing_price_is_unavailable() {
        let mut calendar = MockCalendar::with_text(date(2024, 5, 1), 1, 10, 0, |d| {
            if d == date(2024, 5, 3) {
                None
            } else if d == date(2024, 5, 4) {
                Some("—".to_string())
            } else {
                Some("1.5K".to_string())
            }
        });
        let range = DateRange::new(date(2024, 5, 1), date(2024, 5, 5)).unwrap();

        let records = walker().walk(&mut calendar, &range).unwrap();

        assert_eq!(records[0].price, Price::Amount(1500.0));
        assert_eq!(records[2].price, Price::Unavailable);
        assert_eq!(records[3].price, Price::Unavailable);
    }

    #[test]
    fn test_partial_result_when_pages_run_out() {
        let mut calendar = MockCalendar::monthly(date(2024, 5, 1), 2, 30, 0);
        let range = DateRange::new(date(2024, 5, 1), date(2024, 12, 31)).unwrap();

        let records = walker().walk(&mut calendar, &range).unwrap();

        assert_eq!(records.len(), 60);
        assert_eq!(records.last().unwrap().date, date(2024, 6, 29));
    }

    #[test]
    fn test_invalid_range_touches_nothing() {
        let mut calendar = MockCalendar::monthly(date(2024, 5, 1), 2, 30, 0);

        let err = walker()
            .walk_between(
                &mut calendar,
                Some(date(2024, 5, 20)),
                Some(date(2024, 5, 10)),
                date(2024, 5, 1),
            )
            .unwrap_err();

        assert!(matches!(err, WalkError::InvalidRange { .. }));
        assert!(calendar.calls.is_empty());
    }

    #[test]
    fn test_walk_between_defaults_to_today() {
        let mut calendar = MockCalendar::monthly(date(2024, 4, 1), 3, 30, 2);

        let records = walker()
            .walk_between(&mut calendar, None, Some(date(2024, 5, 3)), date(2024, 5, 1))
            .unwrap();

        let dates: Vec<_> = records.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![date(2024, 5, 1), date(2024, 5, 2), date(2024, 5, 3)]);
    }

    #[test]
    fn test_repeated_walks_are_identical() {
        let range = DateRange::new(date(2024, 5, 10), date(2024, 7, 1)).unwrap();
        let mut calendar = MockCalendar::monthly(date(2024, 5, 1), 4, 30, 0);

        let first = walker().walk(&mut calendar, &range).unwrap();
        let second = walker().walk(&mut calendar, &range).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_malformed_price_skipped_by_default() {
        let mut calendar = MockCalendar::with_text(date(2024, 5, 1), 1, 5, 0, |d| {
            if d == date(2024, 5, 2) {
                Some("R$ ???".to_string())
            } else {
                Some("300".to_string())
            }
        });
        let range = DateRange::new(date(2024, 5, 1), date(2024, 5, 3)).unwrap();

        let records = walker().walk(&mut calendar, &range).unwrap();

        let dates: Vec<_> = records.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![date(2024, 5, 1), date(2024, 5, 3)]);
    }

    #[test]
    fn test_malformed_price_aborts_when_configured() {
        let mut calendar = MockCalendar::with_text(date(2024, 5, 1), 1, 5, 0, |_| {
            Some("abc".to_string())
        });
        let range = DateRange::new(date(2024, 5, 1), date(2024, 5, 3)).unwrap();
        let walker = AvailabilityWalker::new(WalkerOptions {
            on_parse_failure: ParseFailurePolicy::Abort,
            ..WalkerOptions::default()
        });

        let err = walker.walk(&mut calendar, &range).unwrap_err();
        assert!(matches!(err, WalkError::PriceFormat(_)));
    }

    #[test]
    fn test_timeout_retried_once() {
        let mut calendar =
            MockCalendar::monthly(date(2024, 5, 1), 1, 30, 0).time_out_on(&["visible_cells"]);
        let range = DateRange::new(date(2024, 5, 1), date(2024, 5, 3)).unwrap();

        let records = walker().walk(&mut calendar, &range).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(
            calendar.calls.iter().filter(|c| **c == "visible_cells").count(),
            2
        );
    }

    #[test]
    fn test_second_timeout_is_fatal() {
        let mut calendar = MockCalendar::monthly(date(2024, 5, 1), 1, 30, 0)
            .time_out_on(&["first_visible_date", "first_visible_date"]);
        let range = DateRange::new(date(2024, 5, 1), date(2024, 5, 3)).unwrap();

        let err = walker().walk(&mut calendar, &range).unwrap_err();

        assert!(matches!(
            err,
            WalkError::CalendarTimeout {
                operation: "first_visible_date",
                ..
            }
        ));
    }

    #[test]
    fn test_backend_error_is_surfaced() {
        struct Broken;
        impl CalendarView for Broken {
            fn first_visible_date(&mut self, _: Duration) -> Result<NaiveDate, CalendarError> {
                Err(anyhow::anyhow!("tab crashed").into())
            }
            fn visible_cells(&mut self, _: Duration) -> Result<Vec<CalendarCell>, CalendarError> {
                unreachable!()
            }
            fn previous_page(&mut self, _: Duration) -> Result<(), CalendarError> {
                unreachable!()
            }
            fn next_page(&mut self, _: Duration) -> Result<bool, CalendarError> {
                unreachable!()
            }
        }

        let range = DateRange::new(date(2024, 5, 1), date(2024, 5, 3)).unwrap();
        let err = walker().walk(&mut Broken, &range).unwrap_err();
        assert!(matches!(err, WalkError::Calendar { .. }));
    }

    #[test]
    fn test_cancelled_walk_returns_partial() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut calendar = MockCalendar::monthly(date(2024, 5, 1), 3, 30, 0);
        let range = DateRange::new(date(2024, 5, 1), date(2024, 7, 1)).unwrap();

        let records = walker()
            .with_cancel(cancel)
            .walk(&mut calendar, &range)
            .unwrap();

        assert!(records.is_empty());
        assert!(!calendar.calls.contains(&"visible_cells"));
    }

    #[test]
    fn test_collect_page_cap() {
        let mut calendar = MockCalendar::monthly(date(2024, 1, 1), 12, 30, 0);
        let range = DateRange::new(date(2024, 1, 1), date(2024, 12, 31)).unwrap();
        let walker = AvailabilityWalker::new(WalkerOptions {
            max_collect_pages: 2,
            ..WalkerOptions::default()
        });

        let records = walker.walk(&mut calendar, &range).unwrap();
        assert_eq!(records.len(), 60);
    }
}
