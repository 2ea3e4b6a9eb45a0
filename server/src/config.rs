//! Homebound server configuration, read from the environment.
//!
//! SPDX-License-Identifier: GPL-3.0-or-later

use std::env;
use std::path::Path;

use homebound_location_ai::geodesy::Coordinate;

const DEFAULT_HOME_LAT: f64 = 40.7128;
const DEFAULT_HOME_LON: f64 = -74.0060;

pub struct Config {
    pub home: Coordinate,
    pub ifttt_key: Option<String>,
    pub ac_on_event: String,
    pub ac_off_event: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub langsmith_api_key: Option<String>,
    pub langsmith_project: String,
}

impl Config {
    /// Reads the environment after loading a `.env` file (current directory
    /// first, then the user's home directory; first hit wins). An absent
    /// credential disables the dependent feature, it never aborts startup.
    pub fn load() -> Self {
        if dotenvy::dotenv().is_err() {
            if let Ok(home) = env::var("HOME") {
                let _ = dotenvy::from_path(Path::new(&home).join(".env"));
            }
        }

        Self {
            home: Coordinate {
                latitude: env_f64("HOME_LAT", DEFAULT_HOME_LAT),
                longitude: env_f64("HOME_LON", DEFAULT_HOME_LON),
            },
            ifttt_key: env_opt("IFTTT_KEY"),
            ac_on_event: env_or("IFTTT_AC_ON_EVENT", "ac_on"),
            ac_off_event: env_or("IFTTT_AC_OFF_EVENT", "ac_off"),
            openai_api_key: env_opt("OPENAI_API_KEY"),
            openai_model: env_or("OPENAI_MODEL", "gpt-4o-mini"),
            langsmith_api_key: env_opt("LANGSMITH_API_KEY"),
            langsmith_project: env_or("LANGSMITH_PROJECT", "ac-bot"),
        }
    }
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_or(name: &str, default: &str) -> String {
    env_opt(name).unwrap_or_else(|| default.to_string())
}

fn env_f64(name: &str, default: f64) -> f64 {
    match env_opt(name) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("could not parse {name}={raw}, using default {default}");
            default
        }),
        None => default,
    }
}
