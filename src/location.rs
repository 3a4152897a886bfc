//! Manual location entry parsing.
//!
//! Users may type their location as `region, city` with an optional third
//! free-form component (street, district, ...).

use lazy_static::lazy_static;
use regex::Regex;

// `\w` is Unicode-aware, so Cyrillic place names match as well
const LOCATION_PATTERN: &str = r"^([\w\s]+),\s*([\w\s]+)(?:,\s*(.*))?$";

lazy_static! {
    static ref LOCATION_REGEX: Regex =
        Regex::new(LOCATION_PATTERN).expect("Location pattern should be valid");
}

/// A structured location typed by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationQuery {
    pub region: String,
    pub city: String,
    pub detail: Option<String>,
}

impl LocationQuery {
    /// Address string handed to the geocoder
    pub fn address(&self) -> String {
        match &self.detail {
            Some(detail) => format!("{}, {}, {}", self.region, self.city, detail),
            None => format!("{}, {}", self.region, self.city),
        }
    }
}

/// Parse "place, place[, detail]" text; `None` when the text has another shape
pub fn parse_location_text(text: &str) -> Option<LocationQuery> {
    let captures = LOCATION_REGEX.captures(text.trim())?;

    let region = captures.get(1)?.as_str().trim();
    let city = captures.get(2)?.as_str().trim();
    if region.is_empty() || city.is_empty() {
        return None;
    }

    let detail = captures
        .get(3)
        .map(|m| m.as_str().trim())
        .filter(|detail| !detail.is_empty())
        .map(str::to_string);

    Some(LocationQuery {
        region: region.to_string(),
        city: city.to_string(),
        detail,
    })
}
