use crate::config::{Keywords, Selectors};
use crate::models::{Amenity, Beach, HotelDetails, HotelLink, Subscore};
use crate::parse::{parse_distance, parse_rating, parse_subscore};
use anyhow::{anyhow, Result};
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("Invalid selector {:?}: {}", css, e))
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Extract everything we track from a hotel page
pub fn extract_details(
    html: &str,
    hotel: &HotelLink,
    selectors: &Selectors,
    keywords: &Keywords,
) -> Result<HotelDetails> {
    let document = Html::parse_document(html);

    let name = page_title(&document, selectors)?.unwrap_or_else(|| hotel.name.clone());
    let texts = amenity_texts(&document, selectors)?;
    if texts.is_empty() {
        warn!("No amenities found for {}", name);
    }

    let details = HotelDetails {
        name,
        link: hotel.link.clone(),
        amenities: amenity_flags(&texts, keywords),
        pet_friendly: is_pet_friendly(&document, selectors, keywords)?,
        rating: overall_rating(&document, selectors)?,
        subscores: review_subscores(&document, selectors)?,
        nearest_beach: nearest_beach(&document, selectors, keywords)?,
    };

    info!(
        "Extracted {}: rating {:?}, {} subscores, nearest beach {:?}",
        details.name,
        details.rating,
        details.subscores.len(),
        details.nearest_beach.as_ref().map(|b| &b.name)
    );

    Ok(details)
}

fn page_title(document: &Html, selectors: &Selectors) -> Result<Option<String>> {
    let sel = selector(&selectors.hotel_name)?;
    Ok(document
        .select(&sel)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .find(|name| !name.is_empty()))
}

/// Inner text of every item in the popular-facilities list
pub fn amenity_texts(document: &Html, selectors: &Selectors) -> Result<Vec<String>> {
    let sel = selector(&selectors.amenity_item)?;
    Ok(document
        .select(&sel)
        .map(|li| li.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
        .collect())
}

/// Substring match of each amenity's keyword against the listed facilities
pub fn amenity_flags(texts: &[String], keywords: &Keywords) -> BTreeMap<Amenity, bool> {
    Amenity::ALL
        .iter()
        .map(|amenity| {
            let keyword = keywords.amenity(*amenity);
            let present = texts.iter().any(|text| text.contains(keyword));
            (*amenity, present)
        })
        .collect()
}

pub fn is_pet_friendly(document: &Html, selectors: &Selectors, keywords: &Keywords) -> Result<bool> {
    let sel = selector(&selectors.house_rules)?;
    Ok(document
        .select(&sel)
        .any(|el| el.text().collect::<String>().contains(&keywords.pets_allowed)))
}

/// Score from the first element whose aria-label carries the review rating
pub fn overall_rating(document: &Html, selectors: &Selectors) -> Result<Option<f64>> {
    let sel = selector(&selectors.rating)?;
    let rating = document
        .select(&sel)
        .next()
        .and_then(|el| el.value().attr("aria-label"))
        .and_then(parse_rating);

    if rating.is_none() {
        debug!("No rating element found");
    }
    Ok(rating)
}

/// Review categories, first occurrence of each label wins
pub fn review_subscores(document: &Html, selectors: &Selectors) -> Result<Vec<Subscore>> {
    let sel = selector(&selectors.review_subscore)?;
    let mut subscores: Vec<Subscore> = Vec::new();

    for element in document.select(&sel) {
        let text = element_text(element);
        match parse_subscore(&text) {
            Some((label, score)) => {
                if !subscores.iter().any(|s| s.label == label) {
                    subscores.push(Subscore { label, score });
                }
            }
            None => debug!("Unreadable subscore {:?}", text),
        }
    }

    Ok(subscores)
}

/// Closest entry of the surroundings list that mentions a beach
pub fn nearest_beach(document: &Html, selectors: &Selectors, keywords: &Keywords) -> Result<Option<Beach>> {
    let list_sel = selector(&selectors.location_block)?;
    let item_sel = selector("li")?;

    let Some(list) = document.select(&list_sel).find(|list| {
        list.select(&item_sel)
            .any(|li| li.text().collect::<String>().contains(&keywords.beach))
    }) else {
        debug!("No surroundings list mentioning {:?}", keywords.beach);
        return Ok(None);
    };

    let mut beaches = Vec::new();
    for item in list.select(&item_sel) {
        let parts: Vec<String> = item
            .text()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        if parts.len() < 2 {
            continue;
        }
        let name = &parts[0];
        let distance_text = &parts[parts.len() - 1];

        match parse_distance(distance_text) {
            Ok(distance) => beaches.push(Beach {
                name: name.clone(),
                distance,
            }),
            Err(e) => warn!("Skipping {}: {}", name, e),
        }
    }

    Ok(beaches
        .into_iter()
        .min_by(|a, b| a.distance.total_cmp(&b.distance)))
}
