//! Homebound call tracing (LangSmith-compatible).
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

use chrono::{SecondsFormat, Utc};
use reqwest::blocking::Client;
use serde_json::{json, Value};
use uuid::Uuid;

const TRACE_API_URL: &str = "https://api.smith.langchain.com";
const TRACE_TIMEOUT_SECS: u64 = 5;

/// Ships run traces for each pipeline stage. Every failure here is logged
/// and swallowed; tracing must never fail a ping.
pub struct Tracer {
    api_key: Option<String>,
    project: String,
}

impl Tracer {
    pub fn new(api_key: Option<String>, project: String) -> Self {
        Self { api_key, project }
    }

    pub fn enabled(&self) -> bool {
        self.api_key.is_some()
    }

    /// Opens a run and returns its id. A disabled tracer still mints ids so
    /// callers can link child runs unconditionally.
    pub fn create_run(
        &self,
        name: &str,
        inputs: Value,
        run_type: &str,
        parent_run_id: Option<&str>,
    ) -> String {
        let run_id = Uuid::new_v4().to_string();
        let Some(api_key) = &self.api_key else {
            return run_id;
        };

        let payload = json!({
            "id": run_id,
            "name": name,
            "run_type": run_type,
            "inputs": inputs,
            "session_name": format!("homebound-{}", Utc::now().format("%Y-%m-%d")),
            "project_name": self.project,
            "start_time": now_iso(),
            "parent_run_id": parent_run_id,
        });

        let outcome = trace_client().and_then(|client| {
            send(client
                .post(format!("{TRACE_API_URL}/runs"))
                .header("x-api-key", api_key)
                .json(&payload))
        });
        match outcome {
            Ok(()) => debug!("trace run created: {name}"),
            Err(e) => warn!("trace run creation failed: {e}"),
        }

        run_id
    }

    /// Closes a run with outputs, an error, extra metadata, or any mix.
    pub fn update_run(
        &self,
        run_id: &str,
        outputs: Option<Value>,
        error: Option<&str>,
        metadata: Option<Value>,
    ) {
        let Some(api_key) = &self.api_key else {
            return;
        };

        let mut payload = json!({ "end_time": now_iso() });
        if let Some(outputs) = outputs {
            payload["outputs"] = outputs;
        }
        if let Some(error) = error {
            payload["error"] = Value::String(error.to_string());
        }
        if let Some(metadata) = metadata {
            payload["extra"] = metadata;
        }

        let outcome = trace_client().and_then(|client| {
            send(client
                .patch(format!("{TRACE_API_URL}/runs/{run_id}"))
                .header("x-api-key", api_key)
                .json(&payload))
        });
        match outcome {
            Ok(()) => debug!("trace run updated: {run_id}"),
            Err(e) => warn!("trace run update failed: {e}"),
        }
    }
}

fn trace_client() -> Result<Client, String> {
    Client::builder()
        .timeout(Duration::from_secs(TRACE_TIMEOUT_SECS))
        .build()
        .map_err(|e| e.to_string())
}

fn send(request: reqwest::blocking::RequestBuilder) -> Result<(), String> {
    let response = request.send().map_err(|e| e.to_string())?;
    if response.status().is_success() {
        Ok(())
    } else {
        Err(format!("status {}", response.status()))
    }
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
