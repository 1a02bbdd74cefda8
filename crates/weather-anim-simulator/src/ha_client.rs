//! Blocking Home Assistant REST client.

use std::time::Duration;

use log::debug;
use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};

use weather_anim_core::config::ServerConfig;
use weather_anim_core::error::WeatherError;
use weather_anim_core::source::{EntityState, WeatherSource, check_status, parse_entity_state};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HomeAssistantSource<'a> {
    client: Client,
    server: ServerConfig<'a>,
}

impl<'a> HomeAssistantSource<'a> {
    pub fn new(server: ServerConfig<'a>) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(WeatherError::config)?;
        Ok(Self { client, server })
    }

    /// Whether `url` points at the configured server, host and port exact.
    fn is_own_server(&self, url: &str) -> bool {
        let Ok(url) = Url::parse(url) else {
            return false;
        };
        url.host_str()
            .is_some_and(|host| host.eq_ignore_ascii_case(self.server.host))
            && url.port_or_known_default() == Some(self.server.port)
    }

    fn get(&self, url: &str, authorized: bool) -> Result<Vec<u8>, WeatherError> {
        debug!("GET {}", url);
        let mut request = self.client.get(url);
        if authorized {
            request = request
                .header(AUTHORIZATION, self.server.bearer())
                .header(CONTENT_TYPE, "application/json");
        }

        let response = request.send().map_err(classify)?;
        check_status(response.status().as_u16())?;
        let body = response.bytes().map_err(classify)?;
        Ok(body.to_vec())
    }
}

fn classify(err: reqwest::Error) -> WeatherError {
    if err.is_timeout() {
        WeatherError::Timeout
    } else if err.is_connect() {
        WeatherError::Connectivity
    } else if let Some(status) = err.status() {
        WeatherError::Http(status.as_u16())
    } else {
        WeatherError::parse(err)
    }
}

impl WeatherSource for HomeAssistantSource<'_> {
    /// The host OS owns the network; connection failures surface per request.
    fn is_connected(&mut self) -> bool {
        true
    }

    fn fetch_state(&mut self, entity_id: &str) -> Result<EntityState, WeatherError> {
        let url = self.server.state_url(entity_id);
        let body = self.get(&url, true)?;
        parse_entity_state(&body)
    }

    fn fetch_image(&mut self, url: &str) -> Result<Vec<u8>, WeatherError> {
        // Only send the token to our own server.
        let own_server = self.is_own_server(url);
        self.get(url, own_server)
    }
}
