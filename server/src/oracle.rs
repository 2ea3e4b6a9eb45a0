//! Homebound LLM decision backend.
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

use std::time::Duration;

use anyhow::{anyhow, bail, Error};
use homebound_location_ai::decision::{AcAction, DecisionBackend, Observation};
use reqwest::blocking::Client;
use serde_json::json;

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";
const ORACLE_TIMEOUT_SECS: u64 = 30;

const SYSTEM_PROMPT: &str = "You are a smart AC controller. Follow the rules exactly.";

const INSTRUCTIONS: &str = "\
Decide whether to call ac_on or ac_off based on location and movement trend.
- If distance_to_home < 0.25 mi, do nothing (user's already home).
- If 0.25 mi <= distance_to_home <= 2 mi and movement_trend is \"approaching\", call ac_on exactly once.
- If distance_to_home > 2 mi or movement_trend is \"moving_away\", call ac_off once.
- If movement_trend is \"unknown\" or \"stationary\", be conservative and don't change AC state.
Maintain idempotence: don't call the same action twice in a row.";

/// Asks a chat model for the next action. The rule table in the core crate
/// is the behavior this backend is expected to approximate.
pub struct OpenAiBackend {
    api_key: String,
    model: String,
}

impl OpenAiBackend {
    pub fn new(api_key: String, model: String) -> Self {
        Self { api_key, model }
    }

    fn render_prompt(observation: &Observation) -> String {
        format!(
            "{INSTRUCTIONS}\n\n\
             Current observation:\n\
             - Distance from home: {:.3} miles\n\
             - Movement trend: {}\n\
             - Speed: {} mph\n\n\
             Available tools: [\"ac_on\", \"ac_off\"]\n\n\
             Based on these rules, what action should I take? \
             Respond with ONLY the tool name (ac_on, ac_off) or \"no_action\".",
            observation.distance_miles,
            observation.movement_trend.as_str(),
            observation.speed_mph,
        )
    }
}

impl DecisionBackend for OpenAiBackend {
    fn decide(&self, observation: &Observation) -> Result<AcAction, Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(ORACLE_TIMEOUT_SECS))
            .build()?;

        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": Self::render_prompt(observation) },
            ],
            "max_tokens": 50,
            "temperature": 0.1,
        });

        let response = client
            .post(CHAT_COMPLETIONS_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            bail!(
                "OpenAI API error: {} {}",
                status,
                response.text().unwrap_or_default()
            );
        }

        let reply: serde_json::Value = response.json()?;
        let content = reply["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow!("completion carried no message content"))?;
        let token = content.trim().to_lowercase();

        match AcAction::parse(&token) {
            Some(action) => Ok(action),
            None => {
                info!("unrecognized decision token {token:?}, taking no action");
                Ok(AcAction::NoAction)
            }
        }
    }
}
