//! Where weather data and icon bytes come from.
//!
//! The [`WeatherSource`] trait is the only network boundary the core sees.
//! Real implementations talk to Home Assistant over HTTP; [`ScriptedSource`]
//! replays canned states from memory for demos and tests.

extern crate alloc;

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use log::debug;
use serde::Deserialize;

use crate::error::WeatherError;

/// Attributes of a Home Assistant entity the display cares about.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Attributes {
    #[serde(default)]
    pub is_daytime: Option<bool>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default, alias = "temperature_unit")]
    pub unit_of_measurement: Option<String>,
}

/// The parts of `/api/states/<entity>` the display uses.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EntityState {
    pub state: String,
    #[serde(default)]
    pub attributes: Attributes,
}

impl EntityState {
    pub fn new(state: &str) -> Self {
        Self {
            state: state.to_string(),
            attributes: Attributes::default(),
        }
    }

    pub fn with_daytime(mut self, is_day: bool) -> Self {
        self.attributes.is_daytime = Some(is_day);
        self
    }

    /// Daytime flag, assuming day when the entity does not say.
    pub fn is_daytime(&self) -> bool {
        self.attributes.is_daytime.unwrap_or(true)
    }

    /// Numeric reading of this entity.
    ///
    /// Sensors carry the number as their state; weather entities carry it in
    /// the `temperature` attribute.
    pub fn temperature(&self) -> Option<f32> {
        self.state
            .trim()
            .parse::<f32>()
            .ok()
            .filter(|t| t.is_finite())
            .or(self.attributes.temperature.filter(|t| t.is_finite()))
    }
}

/// Parse a Home Assistant state response body.
///
/// Malformed JSON or a missing `state` field is a [`WeatherError::Parse`].
pub fn parse_entity_state(body: &[u8]) -> Result<EntityState, WeatherError> {
    let parsed: EntityState = serde_json::from_slice(body).map_err(WeatherError::parse)?;
    if parsed.state.is_empty() {
        return Err(WeatherError::parse("empty state"));
    }
    Ok(parsed)
}

/// Map an HTTP status code onto success or [`WeatherError::Http`].
pub fn check_status(code: u16) -> Result<(), WeatherError> {
    match code {
        200 => Ok(()),
        other => Err(WeatherError::Http(other)),
    }
}

/// Blocking access to Home Assistant.
pub trait WeatherSource {
    /// Whether the network is up. Polls are skipped while this is false.
    fn is_connected(&mut self) -> bool;

    /// Current state of `entity_id`.
    fn fetch_state(&mut self, entity_id: &str) -> Result<EntityState, WeatherError>;

    /// Raw bytes behind an icon URL.
    fn fetch_image(&mut self, url: &str) -> Result<Vec<u8>, WeatherError>;
}

impl<T: WeatherSource + ?Sized> WeatherSource for Box<T> {
    fn is_connected(&mut self) -> bool {
        (**self).is_connected()
    }

    fn fetch_state(&mut self, entity_id: &str) -> Result<EntityState, WeatherError> {
        (**self).fetch_state(entity_id)
    }

    fn fetch_image(&mut self, url: &str) -> Result<Vec<u8>, WeatherError> {
        (**self).fetch_image(url)
    }
}

/// In-memory source that replays a script of weather states.
///
/// Every `fetch_state` for an entity without a fixed reading returns the
/// next scripted state; the last one repeats forever.
#[derive(Debug, Clone)]
pub struct ScriptedSource {
    connected: bool,
    script: Vec<EntityState>,
    cursor: usize,
    fixed: BTreeMap<String, EntityState>,
    images: BTreeMap<String, Vec<u8>>,
    state_failure: Option<WeatherError>,
    image_failure: Option<WeatherError>,
    state_calls: usize,
    image_calls: usize,
}

impl Default for ScriptedSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self {
            connected: true,
            script: Vec::new(),
            cursor: 0,
            fixed: BTreeMap::new(),
            images: BTreeMap::new(),
            state_failure: None,
            image_failure: None,
            state_calls: 0,
            image_calls: 0,
        }
    }

    /// Append a weather state to the script.
    pub fn push_state(&mut self, state: EntityState) -> &mut Self {
        self.script.push(state);
        self
    }

    pub fn with_states(mut self, states: &[&str]) -> Self {
        for s in states {
            self.script.push(EntityState::new(s));
        }
        self
    }

    /// Serve a fixed reading for `entity_id`, e.g. a temperature sensor.
    pub fn with_reading(mut self, entity_id: &str, state: &str) -> Self {
        self.fixed
            .insert(entity_id.to_string(), EntityState::new(state));
        self
    }

    pub fn with_image(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.images.insert(url.to_string(), bytes);
        self
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    /// Make every `fetch_state` fail with `error` until cleared with `None`.
    pub fn fail_states(&mut self, error: Option<WeatherError>) {
        self.state_failure = error;
    }

    /// Make every `fetch_image` fail with `error` until cleared with `None`.
    pub fn fail_images(&mut self, error: Option<WeatherError>) {
        self.image_failure = error;
    }

    pub fn state_calls(&self) -> usize {
        self.state_calls
    }

    pub fn image_calls(&self) -> usize {
        self.image_calls
    }
}

impl WeatherSource for ScriptedSource {
    fn is_connected(&mut self) -> bool {
        self.connected
    }

    fn fetch_state(&mut self, entity_id: &str) -> Result<EntityState, WeatherError> {
        self.state_calls += 1;
        if !self.connected {
            return Err(WeatherError::Connectivity);
        }
        if let Some(err) = &self.state_failure {
            return Err(err.clone());
        }
        if let Some(fixed) = self.fixed.get(entity_id) {
            return Ok(fixed.clone());
        }

        let Some(last) = self.script.len().checked_sub(1) else {
            return Err(WeatherError::Http(404));
        };
        let state = self.script[self.cursor.min(last)].clone();
        self.cursor = (self.cursor + 1).min(last);
        debug!("Scripted state for {}: {}", entity_id, state.state);
        Ok(state)
    }

    fn fetch_image(&mut self, url: &str) -> Result<Vec<u8>, WeatherError> {
        self.image_calls += 1;
        if !self.connected {
            return Err(WeatherError::Connectivity);
        }
        if let Some(err) = &self.image_failure {
            return Err(err.clone());
        }
        self.images
            .get(url)
            .cloned()
            .ok_or(WeatherError::Http(404))
    }
}
