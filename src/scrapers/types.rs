use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Property-type filter value for hotels
pub const HOTELS_ONLY: &str = "ht_id=204";

/// Search parameters for the results listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParams {
    /// Destination as typed in the search box
    pub destination: String,
    pub checkin: NaiveDate,
    pub checkout: NaiveDate,
    pub adults: u32,
    pub children: u32,
    pub rooms: u32,
    /// Site language, e.g. "pt-br"
    pub language: String,
    /// Raw `nflt` filter expression
    pub filter: Option<String>,
}

impl SearchParams {
    /// One night for one adult starting at `checkin`, hotels only
    pub fn new(destination: impl Into<String>, checkin: NaiveDate) -> Self {
        Self {
            destination: destination.into(),
            checkin,
            checkout: checkin + Duration::days(1),
            adults: 1,
            children: 0,
            rooms: 1,
            language: "pt-br".to_string(),
            filter: Some(HOTELS_ONLY.to_string()),
        }
    }

    pub fn search_url(&self, base: &str) -> String {
        let mut url = format!(
            "{}/searchresults.{}.html?ss={}&lang={}&checkin={}&checkout={}&group_adults={}&no_rooms={}&group_children={}",
            base.trim_end_matches('/'),
            self.language,
            urlencoding::encode(&self.destination),
            self.language,
            self.checkin.format("%Y-%m-%d"),
            self.checkout.format("%Y-%m-%d"),
            self.adults,
            self.rooms,
            self.children,
        );

        if let Some(filter) = &self.filter {
            url.push_str("&nflt=");
            url.push_str(&urlencoding::encode(filter));
        }

        url
    }
}
