use crate::models::{Amenity, AvailabilityRecord, HotelDetails, HotelLink};
use crate::parse::parse_price;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;
use tracing::{info, warn};

fn create(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    File::create(path).with_context(|| format!("Failed to create output file: {}", path.display()))
}

fn open(path: &Path) -> Result<File> {
    File::open(path).with_context(|| format!("Failed to open input file: {}", path.display()))
}

/// File-name friendly version of a hotel name
pub fn slug(name: &str) -> String {
    let slug = name
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    if slug.is_empty() {
        "hotel".to_string()
    } else {
        slug
    }
}

/// Slug of `name` not yet in `used`; repeats get a numeric suffix
pub fn unique_slug(name: &str, used: &mut HashSet<String>) -> String {
    let base = slug(name);
    let mut candidate = base.clone();
    let mut n = 2;

    while used.contains(&candidate) {
        candidate = format!("{}-{}", base, n);
        n += 1;
    }

    used.insert(candidate.clone());
    candidate
}

/// Write `name,link` rows, keeping only the first hotel of each name
pub fn write_hotel_links<W: Write>(writer: W, hotels: &[HotelLink]) -> Result<usize> {
    let mut writer = csv::Writer::from_writer(writer);
    let mut seen = HashSet::new();
    let mut written = 0;

    writer.write_record(["name", "link"])?;
    for hotel in hotels {
        if !seen.insert(hotel.name.as_str()) {
            continue;
        }
        writer.write_record([&hotel.name, &hotel.link])?;
        written += 1;
    }

    writer.flush()?;
    Ok(written)
}

pub fn read_hotel_links<R: Read>(reader: R) -> Result<Vec<HotelLink>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut hotels = Vec::new();

    for result in reader.deserialize() {
        let hotel: HotelLink = result?;
        hotels.push(hotel);
    }

    Ok(hotels)
}

/// Two-column `date,value` CSV; unavailable dates are written as the dash mark
pub fn write_availability<W: Write>(writer: W, records: &[AvailabilityRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);

    writer.write_record(["date", "value"])?;
    for record in records {
        writer.write_record([
            record.date.format("%Y-%m-%d").to_string(),
            record.price.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

pub fn read_availability<R: Read>(reader: R) -> Result<Vec<AvailabilityRecord>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut records = Vec::new();

    for result in reader.records() {
        let record = result?;

        if record.len() < 2 {
            warn!("Skipping record with insufficient fields: {:?}", record);
            continue;
        }

        let date = NaiveDate::parse_from_str(&record[0], "%Y-%m-%d")
            .with_context(|| format!("Invalid date {:?}", &record[0]))?;
        let price = parse_price(&record[1])?;
        records.push(AvailabilityRecord { date, price });
    }

    Ok(records)
}

/// One row per hotel with a column per tracked amenity
pub fn write_details<W: Write>(writer: W, details: &[HotelDetails]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);

    let mut header = vec!["name", "link", "rating", "pet_friendly"];
    header.extend(Amenity::ALL.iter().map(Amenity::column));
    header.extend(["nearest_beach", "nearest_beach_distance", "subscores"]);
    writer.write_record(&header)?;

    for hotel in details {
        let mut row = vec![
            hotel.name.clone(),
            hotel.link.clone(),
            hotel.rating.map(|r| r.to_string()).unwrap_or_default(),
            hotel.pet_friendly.to_string(),
        ];
        row.extend(Amenity::ALL.iter().map(|amenity| {
            hotel
                .amenities
                .get(amenity)
                .copied()
                .unwrap_or(false)
                .to_string()
        }));
        row.push(
            hotel
                .nearest_beach
                .as_ref()
                .map(|b| b.name.clone())
                .unwrap_or_default(),
        );
        row.push(
            hotel
                .nearest_beach
                .as_ref()
                .map(|b| b.distance.to_string())
                .unwrap_or_default(),
        );
        row.push(
            hotel
                .subscores
                .iter()
                .map(|s| format!("{}={}", s.label, s.score))
                .collect::<Vec<_>>()
                .join(";"),
        );
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}

pub fn save_hotel_links(path: &Path, hotels: &[HotelLink]) -> Result<()> {
    let written = write_hotel_links(create(path)?, hotels)?;
    info!("Saved {} hotels to {}", written, path.display());
    Ok(())
}

pub fn load_hotel_links(path: &Path) -> Result<Vec<HotelLink>> {
    let hotels = read_hotel_links(open(path)?)
        .with_context(|| format!("Failed to read hotels from {}", path.display()))?;
    info!("Loaded {} hotels from {}", hotels.len(), path.display());
    Ok(hotels)
}

pub fn save_availability(path: &Path, records: &[AvailabilityRecord]) -> Result<()> {
    write_availability(create(path)?, records)?;
    info!("Saved {} dates to {}", records.len(), path.display());
    Ok(())
}

pub fn load_availability(path: &Path) -> Result<Vec<AvailabilityRecord>> {
    read_availability(open(path)?)
        .with_context(|| format!("Failed to read availability from {}", path.display()))
}

pub fn save_details(path: &Path, details: &[HotelDetails]) -> Result<()> {
    write_details(create(path)?, details)?;
    info!("Saved details of {} hotels to {}", details.len(), path.display());
    Ok(())
}
