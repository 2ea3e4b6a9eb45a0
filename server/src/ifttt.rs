//! Homebound AC actuation through the IFTTT webhook relay.
//!
//! Copyright (C) 2025  Ardalan Amiri Sani
//!
//! This program is free software: you can redistribute it and/or modify
//! it under the terms of the GNU General Public License as published by
//! the Free Software Foundation, either version 3 of the License, or
//! (at your option) any later version.
//!
//! This program is distributed in the hope that it will be useful,
//! but WITHOUT ANY WARRANTY; without even the implied warranty of
//! MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//! GNU General Public License for more details.
//!
//! You should have received a copy of the GNU General Public License
//! along with this program.  If not, see <https://www.gnu.org/licenses/>.

use std::io;
use std::time::Duration;

use homebound_location_ai::decision::AcAction;
use reqwest::blocking::Client;
use serde_json::json;

const WEBHOOK_BASE_URL: &str = "https://maker.ifttt.com/trigger";
const WEBHOOK_TIMEOUT_SECS: u64 = 10;

/// Executes a decided action against the physical device.
pub trait Actuator: Send + Sync {
    fn fire(&self, action: AcAction) -> io::Result<String>;
}

pub struct IftttClient {
    key: Option<String>,
    ac_on_event: String,
    ac_off_event: String,
}

impl IftttClient {
    pub fn new(key: Option<String>, ac_on_event: String, ac_off_event: String) -> Self {
        Self {
            key,
            ac_on_event,
            ac_off_event,
        }
    }
}

impl Actuator for IftttClient {
    fn fire(&self, action: AcAction) -> io::Result<String> {
        let key = self
            .key
            .as_ref()
            .ok_or_else(|| io::Error::other("IFTTT key not configured"))?;

        let (event, described) = match action {
            AcAction::TurnOn => (&self.ac_on_event, "on"),
            AcAction::TurnOff => (&self.ac_off_event, "off"),
            AcAction::NoAction => {
                return Err(io::Error::other("no webhook event for no_action"));
            }
        };

        let url = format!("{WEBHOOK_BASE_URL}/{event}/with/key/{key}");

        let client = Client::builder()
            .timeout(Duration::from_secs(WEBHOOK_TIMEOUT_SECS))
            .build()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

        let response = client
            .post(&url)
            .json(&json!({ "value1": "llm_triggered" }))
            .send()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

        if !response.status().is_success() {
            return Err(io::Error::other(format!(
                "IFTTT webhook failed: {}",
                response.status()
            )));
        }

        info!("AC turned {described} via IFTTT event {event}");
        Ok(format!("AC turned {described} via IFTTT"))
    }
}
