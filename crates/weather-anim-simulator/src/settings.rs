//! Simulator settings read from the environment (and `.env`).
//!
//! | Variable                    | Meaning                                   |
//! |-----------------------------|-------------------------------------------|
//! | `HA_HOST`, `HA_PORT`        | Home Assistant server                     |
//! | `HA_TOKEN`                  | Access token; unset runs the offline demo |
//! | `HA_WEATHER_ENTITY`         | Weather entity id                         |
//! | `HA_INDOOR_ENTITY`          | Indoor temperature sensor                 |
//! | `HA_OUTDOOR_ENTITY`         | Outdoor temperature sensor                |
//! | `WEATHER_DISPLAY`           | `mono` (128x64 OLED) or `color` (TFT)     |
//! | `WEATHER_MODE`              | `simple` or `continuous`                  |
//! | `WEATHER_ONLINE_ICONS`      | Download icons for each state             |
//! | `WEATHER_ICON_BASE_URL`     | Where icons are downloaded from           |
//! | `WEATHER_SHOW_TEMPERATURE`  | Draw the temperature row                  |
//! | `SIM_OUTPUT_DIR`            | Headless snapshot directory               |
//! | `SIM_DURATION_MS`           | Headless run length in simulated time     |

use std::collections::HashMap;

use weather_anim_core::config::Config;
use weather_anim_core::display::DisplayKind;
use weather_anim_core::orchestrator::Mode;

/// Poll interval of the offline demo, so the script advances visibly.
const DEMO_FETCH_INTERVAL_MS: u64 = 4_000;

#[derive(Debug, Clone, Default)]
pub struct Settings {
    vars: HashMap<String, String>,
}

impl Settings {
    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            vars: vars.into_iter().collect(),
        }
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn flag(&self, key: &str) -> bool {
        matches!(
            self.get(key).map(|v| v.to_ascii_lowercase()).as_deref(),
            Some("1" | "true" | "yes" | "on")
        )
    }

    /// True when a Home Assistant token is configured.
    pub fn is_live(&self) -> bool {
        self.get("HA_TOKEN").is_some()
    }

    pub fn output_dir(&self) -> &str {
        self.get("SIM_OUTPUT_DIR").unwrap_or("sim-output")
    }

    pub fn duration_ms(&self) -> u64 {
        self.get("SIM_DURATION_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(20_000)
    }

    /// Build the library configuration, borrowing strings from `self`.
    pub fn config(&self) -> Config<'_> {
        let mut config = Config::default();

        if let Some(host) = self.get("HA_HOST") {
            config.server.host = host;
        }
        if let Some(port) = self.get("HA_PORT").and_then(|p| p.parse().ok()) {
            config.server.port = port;
        }
        if let Some(token) = self.get("HA_TOKEN") {
            config.server.token = token;
        }
        if let Some(entity) = self.get("HA_WEATHER_ENTITY") {
            config.entities.weather = entity;
        }
        config.entities.indoor_temperature = self.get("HA_INDOOR_ENTITY");
        config.entities.outdoor_temperature = self.get("HA_OUTDOOR_ENTITY");

        if self.get("WEATHER_DISPLAY") == Some("color") {
            config.display.kind = DisplayKind::Color;
        }
        if self.get("WEATHER_MODE") == Some("simple") {
            config.animation.mode = Mode::SimpleTransition;
        }
        config.animation.online_icons = self.flag("WEATHER_ONLINE_ICONS");
        config.animation.show_temperature = self.flag("WEATHER_SHOW_TEMPERATURE");
        if let Some(url) = self.get("WEATHER_ICON_BASE_URL") {
            config.animation.icon_base_url = url;
        }

        if !self.is_live() {
            config.animation.fetch_interval_ms = DEMO_FETCH_INTERVAL_MS;
        }
        config
    }
}
