//! Runtime configuration.
//!
//! Strings borrow from the buffer the configuration was decoded from, so a
//! `Config` read from flash costs no extra heap.

extern crate alloc;

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

use crate::condition::DEFAULT_ICON_BASE_URL;
use crate::decode::ThresholdOptions;
use crate::display::DisplayKind;
use crate::error::WeatherError;
use crate::orchestrator::Mode;
use crate::transition::TransitionKind;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(bound(deserialize = "'de: 'a"))]
pub struct Config<'a> {
    pub internet: InternetConfig<'a>,
    pub server: ServerConfig<'a>,
    pub entities: EntityConfig<'a>,
    pub display: DisplayConfig,
    pub animation: AnimationConfig<'a>,
}

/// Wi-Fi credentials, for firmware that manages its own connection.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct InternetConfig<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ServerConfig<'a> {
    pub host: &'a str,
    pub port: u16,
    /// Long-lived access token.
    pub token: &'a str,
}

impl Default for ServerConfig<'_> {
    fn default() -> Self {
        Self {
            host: "homeassistant.local",
            port: 8123,
            token: "",
        }
    }
}

impl ServerConfig<'_> {
    /// `GET` URL for an entity's state.
    pub fn state_url(&self, entity_id: &str) -> String {
        format!("http://{}:{}/api/states/{}", self.host, self.port, entity_id)
    }

    /// Value of the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(bound(deserialize = "'de: 'a"))]
pub struct EntityConfig<'a> {
    pub weather: &'a str,
    pub indoor_temperature: Option<&'a str>,
    pub outdoor_temperature: Option<&'a str>,
}

impl Default for EntityConfig<'_> {
    fn default() -> Self {
        Self {
            weather: "weather.forecast",
            indoor_temperature: None,
            outdoor_temperature: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DisplayConfig {
    pub kind: DisplayKind,
    /// I2C address of a monochrome panel.
    pub i2c_address: u8,
    pub width: u32,
    pub height: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            kind: DisplayKind::Monochrome,
            i2c_address: 0x3C,
            width: 128,
            height: 64,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AnimationConfig<'a> {
    pub mode: Mode,
    pub fetch_interval_ms: u64,
    pub retry_interval_ms: u64,
    pub builtin_icons: bool,
    pub online_icons: bool,
    pub show_temperature: bool,
    pub icon_base_url: &'a str,
    pub transition: TransitionKind,
    pub transition_ms: u64,
    pub threshold: u8,
    pub invert_icons: bool,
}

impl Default for AnimationConfig<'_> {
    fn default() -> Self {
        Self {
            mode: Mode::ContinuousWeather,
            fetch_interval_ms: 300_000,
            retry_interval_ms: 30_000,
            builtin_icons: true,
            online_icons: false,
            show_temperature: false,
            icon_base_url: DEFAULT_ICON_BASE_URL,
            transition: TransitionKind::Fade,
            transition_ms: 1_000,
            threshold: 128,
            invert_icons: false,
        }
    }
}

impl AnimationConfig<'_> {
    pub fn threshold_options(&self) -> ThresholdOptions {
        ThresholdOptions {
            threshold: self.threshold,
            invert: self.invert_icons,
            ..Default::default()
        }
    }
}

impl<'a> Config<'a> {
    /// Decode a configuration blob and validate it.
    pub fn from_bytes(bytes: &'a [u8]) -> Result<Self, WeatherError> {
        let config: Self = postcard::from_bytes(bytes).map_err(WeatherError::config)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, WeatherError> {
        postcard::to_allocvec(self).map_err(WeatherError::config)
    }

    pub fn validate(&self) -> Result<(), WeatherError> {
        if self.entities.weather.is_empty() {
            return Err(WeatherError::config("weather entity is empty"));
        }
        if self.display.width == 0 || self.display.height == 0 {
            return Err(WeatherError::config("canvas has zero size"));
        }
        if self.animation.fetch_interval_ms == 0 {
            return Err(WeatherError::config("fetch interval is zero"));
        }
        Ok(())
    }
}
