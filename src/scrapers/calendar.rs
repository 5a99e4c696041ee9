use crate::availability::CalendarView;
use crate::config::Selectors;
use crate::error::CalendarError;
use crate::models::CalendarCell;
use crate::scrapers::browser::evaluate_json;
use anyhow::anyhow;
use chrono::NaiveDate;
use headless_chrome::browser::tab::NoElementFound;
use headless_chrome::Tab;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::debug;

/// The date picker of a hotel page, driven through a Chrome tab
pub struct TabCalendar {
    tab: Arc<Tab>,
    cell: String,
    cell_price: String,
    previous: String,
    next: String,
    settle_delay: Duration,
}

fn classify(err: anyhow::Error) -> CalendarError {
    if err.downcast_ref::<headless_chrome::util::Timeout>().is_some() {
        CalendarError::Timeout
    } else {
        CalendarError::Backend(err)
    }
}

/// `false` when the arrow lookup found nothing, any other failure is surfaced
fn missing_arrow(err: anyhow::Error) -> Result<bool, CalendarError> {
    if err.downcast_ref::<NoElementFound>().is_some() {
        Ok(false)
    } else {
        Err(classify(err))
    }
}

impl TabCalendar {
    pub fn new(tab: Arc<Tab>, selectors: &Selectors, settle_delay: Duration) -> Self {
        Self {
            tab,
            cell: selectors.calendar_cell.clone(),
            cell_price: selectors.cell_price.clone(),
            previous: selectors.calendar_previous.clone(),
            next: selectors.calendar_next.clone(),
            settle_delay,
        }
    }

    fn read_cells(&self, timeout: Duration) -> Result<Vec<CalendarCell>, CalendarError> {
        self.tab
            .wait_for_element_with_custom_timeout(&self.cell, timeout)
            .map_err(classify)?;

        let script = format!(
            r#"JSON.stringify(Array.from(document.querySelectorAll({cell})).map(el => {{
                const price = el.querySelector({price});
                const text = price ? price.innerText.trim() : "";
                return {{ date: el.getAttribute("data-date"), price: text.length ? text : null }};
            }}))"#,
            cell = serde_json::to_string(&self.cell).map_err(anyhow::Error::from)?,
            price = serde_json::to_string(&self.cell_price).map_err(anyhow::Error::from)?,
        );

        let cells: Vec<CalendarCell> = evaluate_json(&self.tab, &script)?;
        debug!("Calendar shows {} cells", cells.len());
        Ok(cells)
    }
}

impl Drop for TabCalendar {
    fn drop(&mut self) {
        let _ = self.tab.close(true);
    }
}

impl CalendarView for TabCalendar {
    fn first_visible_date(&mut self, timeout: Duration) -> Result<NaiveDate, CalendarError> {
        self.read_cells(timeout)?
            .first()
            .map(|cell| cell.date)
            .ok_or_else(|| anyhow!("Calendar rendered no date cells").into())
    }

    fn visible_cells(&mut self, timeout: Duration) -> Result<Vec<CalendarCell>, CalendarError> {
        self.read_cells(timeout)
    }

    fn previous_page(&mut self, timeout: Duration) -> Result<(), CalendarError> {
        let button = self
            .tab
            .wait_for_element_with_custom_timeout(&self.previous, timeout)
            .map_err(classify)?;
        button.click()?;
        thread::sleep(self.settle_delay);
        Ok(())
    }

    fn next_page(&mut self, timeout: Duration) -> Result<bool, CalendarError> {
        // Only look for the arrow once the current month has rendered
        self.tab
            .wait_for_element_with_custom_timeout(&self.cell, timeout)
            .map_err(classify)?;

        // A missing or disabled arrow means the calendar has no later month
        let button = match self.tab.find_element(&self.next) {
            Ok(button) => button,
            Err(err) => return missing_arrow(err),
        };
        if button.get_attribute_value("disabled")?.is_some() {
            return Ok(false);
        }

        button.click()?;
        thread::sleep(self.settle_delay);
        Ok(true)
    }
}
