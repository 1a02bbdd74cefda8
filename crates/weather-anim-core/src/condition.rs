//! Weather conditions and the mapping from Home Assistant state strings.
//!
//! Home Assistant reports a rich set of condition strings (`partlycloudy`,
//! `lightning-rainy`, ...). The display only distinguishes five conditions,
//! so every string is folded onto a [`WeatherCondition`]; the original string
//! is still used to pick a matching online icon via [`find_icon`].

extern crate alloc;

use alloc::string::String;
use serde::{Deserialize, Serialize};

/// Number of distinct [`WeatherCondition`] values.
pub const CONDITION_COUNT: usize = 5;

/// Base URL of the default online icon set.
pub const DEFAULT_ICON_BASE_URL: &str =
    "https://raw.githubusercontent.com/basmilius/weather-icons/master/production/fill/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeatherCondition {
    Clear,
    Cloudy,
    Rain,
    Snow,
    Storm,
}

impl WeatherCondition {
    pub const ALL: [WeatherCondition; CONDITION_COUNT] = [
        Self::Clear,
        Self::Cloudy,
        Self::Rain,
        Self::Snow,
        Self::Storm,
    ];

    /// Stable slot index, used to key per-condition tables.
    pub const fn index(self) -> usize {
        match self {
            Self::Clear => 0,
            Self::Cloudy => 1,
            Self::Rain => 2,
            Self::Snow => 3,
            Self::Storm => 4,
        }
    }

    /// Text shown when no animation is available for this condition.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Clear => "Clear Sky",
            Self::Cloudy => "Cloudy",
            Self::Rain => "Rainy",
            Self::Snow => "Snowy",
            Self::Storm => "Stormy",
        }
    }

    /// Inter-frame delay used when an animation does not specify one.
    pub const fn default_frame_delay_ms(self) -> u32 {
        match self {
            Self::Clear => 600,
            Self::Cloudy => 800,
            Self::Rain => 300,
            Self::Snow => 450,
            Self::Storm => 250,
        }
    }

    /// Map a Home Assistant weather state onto a condition.
    ///
    /// Known state strings are matched exactly; anything else falls back to
    /// keyword families. Returns `None` for states that match nothing, in
    /// which case callers keep whatever condition they had.
    pub fn from_state(state: &str) -> Option<Self> {
        let state = state.trim();
        let exact = match state {
            "sunny" | "clear-night" | "clear" => Some(Self::Clear),
            "cloudy" | "partlycloudy" | "fog" | "windy" | "windy-variant" | "exceptional" => {
                Some(Self::Cloudy)
            }
            "rainy" | "pouring" => Some(Self::Rain),
            "snowy" | "snowy-rainy" | "hail" => Some(Self::Snow),
            "lightning" | "lightning-rainy" => Some(Self::Storm),
            _ => None,
        };
        if exact.is_some() {
            return exact;
        }

        let lower = state.to_ascii_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));

        // Storm first: "thunder rain" should not read as plain rain.
        if has(&["storm", "thunder", "lightning"]) {
            Some(Self::Storm)
        } else if has(&["snow", "sleet", "hail"]) {
            Some(Self::Snow)
        } else if has(&["rain", "drizzle", "pour", "shower"]) {
            Some(Self::Rain)
        } else if has(&["cloud", "overcast", "fog", "mist"]) {
            Some(Self::Cloudy)
        } else if has(&["clear", "sunny", "fair"]) {
            Some(Self::Clear)
        } else {
            None
        }
    }
}

/// Which time of day an icon is drawn for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconVariant {
    Any,
    Day,
    Night,
}

/// One row of the online icon table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IconMapping {
    /// Home Assistant state string.
    pub state: &'static str,
    pub variant: IconVariant,
    /// File name relative to the icon base URL.
    pub file: &'static str,
}

const fn icon(state: &'static str, variant: IconVariant, file: &'static str) -> IconMapping {
    IconMapping {
        state,
        variant,
        file,
    }
}

pub static ICON_TABLE: [IconMapping; 16] = [
    icon("clear-night", IconVariant::Any, "moon.png"),
    icon("cloudy", IconVariant::Any, "cloudy.png"),
    icon("fog", IconVariant::Any, "fog.png"),
    icon("hail", IconVariant::Any, "hail.png"),
    icon("lightning", IconVariant::Any, "thunderstorm.png"),
    icon("lightning-rainy", IconVariant::Any, "thunderstorms-rain.png"),
    icon("partlycloudy", IconVariant::Day, "partly-cloudy-day.png"),
    icon("partlycloudy", IconVariant::Night, "partly-cloudy-night.png"),
    icon("pouring", IconVariant::Any, "extreme-rain.png"),
    icon("rainy", IconVariant::Any, "rain.png"),
    icon("snowy", IconVariant::Any, "snow.png"),
    icon("snowy-rainy", IconVariant::Any, "sleet.png"),
    icon("sunny", IconVariant::Day, "clear-day.png"),
    icon("sunny", IconVariant::Night, "clear-night.png"),
    icon("windy", IconVariant::Any, "wind.png"),
    icon("exceptional", IconVariant::Any, "not-available.png"),
];

/// Find the icon for a Home Assistant state.
///
/// Prefers the entry whose day/night variant matches `is_day`, then any
/// entry for the state, then `cloudy`.
pub fn find_icon(state: &str, is_day: bool) -> &'static IconMapping {
    let wanted = if is_day {
        IconVariant::Day
    } else {
        IconVariant::Night
    };

    let mut any_match = None;
    for entry in ICON_TABLE.iter().filter(|e| e.state == state) {
        if entry.variant == IconVariant::Any || entry.variant == wanted {
            return entry;
        }
        any_match.get_or_insert(entry);
    }

    any_match
        .or_else(|| ICON_TABLE.iter().find(|e| e.state == "cloudy"))
        .unwrap_or(&ICON_TABLE[0])
}

/// Join an icon base URL and the mapping's file name.
pub fn icon_url(base: &str, mapping: &IconMapping) -> String {
    let mut url = String::with_capacity(base.len() + mapping.file.len() + 1);
    url.push_str(base);
    if !base.ends_with('/') {
        url.push('/');
    }
    url.push_str(mapping.file);
    url
}
