use crate::models::AvailabilityRecord;
use anyhow::{Context, Result};
use chrono::{Datelike, Weekday};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::info;

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Availability figures for one day of the week
#[derive(Debug, Clone, PartialEq)]
pub struct WeekdayStats {
    pub weekday: Weekday,
    pub unavailable: usize,
    pub priced: usize,
    pub average_price: Option<f64>,
}

/// Unavailable count and average price per weekday, Monday first
pub fn weekday_summary(records: &[AvailabilityRecord]) -> Vec<WeekdayStats> {
    WEEK.iter()
        .map(|weekday| {
            let day: Vec<_> = records
                .iter()
                .filter(|r| r.date.weekday() == *weekday)
                .collect();
            let prices: Vec<f64> = day.iter().filter_map(|r| r.price.amount()).collect();
            let unavailable = day.iter().filter(|r| r.price.is_unavailable()).count();

            let average_price = if prices.is_empty() {
                None
            } else {
                Some(prices.iter().sum::<f64>() / prices.len() as f64)
            };

            WeekdayStats {
                weekday: *weekday,
                unavailable,
                priced: prices.len(),
                average_price,
            }
        })
        .collect()
}

pub fn write_weekday_summary<W: Write>(writer: W, stats: &[WeekdayStats]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);

    writer.write_record(["day_of_week", "unavailable", "priced", "average_price"])?;
    for day in stats {
        writer.write_record([
            day.weekday.to_string(),
            day.unavailable.to_string(),
            day.priced.to_string(),
            day.average_price
                .map(|p| format!("{:.2}", p))
                .unwrap_or_default(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

pub fn save_weekday_summary(path: &Path, stats: &[WeekdayStats]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    write_weekday_summary(file, stats)?;
    info!("Saved weekday summary to {}", path.display());
    Ok(())
}
