use crate::error::WalkError;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Text the site renders for a date that cannot be booked
pub const UNAVAILABLE_MARK: &str = "—";

/// How far past the start date a walk reaches when no end date is given
pub const DEFAULT_RANGE_DAYS: i64 = 180;

/// Inclusive range of dates to collect availability for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, WalkError> {
        if start > end {
            return Err(WalkError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Fill in missing bounds: start defaults to `today`, end to start + 180 days
    pub fn resolve(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<Self, WalkError> {
        let start = start.unwrap_or(today);
        let end = end.unwrap_or(start + Duration::days(DEFAULT_RANGE_DAYS));
        Self::new(start, end)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Nightly price shown in a calendar cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Price {
    Amount(f64),
    Unavailable,
}

impl Price {
    pub fn amount(&self) -> Option<f64> {
        match self {
            Price::Amount(value) => Some(*value),
            Price::Unavailable => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Price::Unavailable)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Price::Amount(value) => write!(f, "{}", value),
            Price::Unavailable => f.write_str(UNAVAILABLE_MARK),
        }
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Price::Amount(value) => serializer.serialize_f64(*value),
            Price::Unavailable => serializer.serialize_str(UNAVAILABLE_MARK),
        }
    }
}

/// One extracted (date, price-or-unavailable) pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvailabilityRecord {
    pub date: NaiveDate,
    #[serde(rename = "value")]
    pub price: Price,
}

/// A date entry as currently rendered by a calendar widget
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CalendarCell {
    pub date: NaiveDate,
    #[serde(rename = "price")]
    pub price_text: Option<String>,
}

/// A property card from the search results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotelLink {
    pub name: String,
    pub link: String,
}

/// Facilities looked up in a hotel's amenity list
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Amenity {
    Breakfast,
    Gym,
    Beachfront,
    FreeParking,
    Spa,
    Pool,
    Bar,
    Transfer,
    RoomService,
    Wifi,
    Restaurant,
    Accessibility,
}

impl Amenity {
    pub const ALL: [Amenity; 12] = [
        Amenity::Breakfast,
        Amenity::Gym,
        Amenity::Beachfront,
        Amenity::FreeParking,
        Amenity::Spa,
        Amenity::Pool,
        Amenity::Bar,
        Amenity::Transfer,
        Amenity::RoomService,
        Amenity::Wifi,
        Amenity::Restaurant,
        Amenity::Accessibility,
    ];

    /// CSV column name
    pub fn column(&self) -> &'static str {
        match self {
            Amenity::Breakfast => "breakfast",
            Amenity::Gym => "gym",
            Amenity::Beachfront => "beachfront",
            Amenity::FreeParking => "free_parking",
            Amenity::Spa => "spa",
            Amenity::Pool => "pool",
            Amenity::Bar => "bar",
            Amenity::Transfer => "transfer",
            Amenity::RoomService => "room_service",
            Amenity::Wifi => "wifi",
            Amenity::Restaurant => "restaurant",
            Amenity::Accessibility => "accessibility",
        }
    }

    /// Label the pt-BR site uses for this facility
    pub fn default_keyword(&self) -> &'static str {
        match self {
            Amenity::Breakfast => "Café da manhã",
            Amenity::Gym => "Academia",
            Amenity::Beachfront => "Beira-mar",
            Amenity::FreeParking => "Estacionamento gratuito",
            Amenity::Spa => "Spa",
            Amenity::Pool => "Piscina",
            Amenity::Bar => "Bar",
            Amenity::Transfer => "Transfer",
            Amenity::RoomService => "Serviço de quarto",
            Amenity::Wifi => "Wi-Fi",
            Amenity::Restaurant => "Restaurante",
            Amenity::Accessibility => "Instalações para pessoas com deficiência",
        }
    }
}

/// A named review category and its score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subscore {
    pub label: String,
    pub score: f64,
}

/// Closest beach listed in a hotel's surroundings block
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Beach {
    pub name: String,
    /// Meters
    pub distance: f64,
}

/// Everything extracted from a single hotel page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HotelDetails {
    pub name: String,
    pub link: String,
    pub amenities: BTreeMap<Amenity, bool>,
    pub pet_friendly: bool,
    pub rating: Option<f64>,
    pub subscores: Vec<Subscore>,
    pub nearest_beach: Option<Beach>,
}
