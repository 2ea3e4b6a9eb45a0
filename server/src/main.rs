//! Homebound server: receives location pings from a phone and relays AC
//! on/off decisions to an IFTTT webhook.
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

#[macro_use]
extern crate log;

#[macro_use]
extern crate rocket;

#[macro_use]
extern crate serde_derive;

use std::sync::{Arc, Mutex};

use docopt::Docopt;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::State;

mod config;
mod ifttt;
mod oracle;
mod pipeline;
mod tracer;

use crate::config::Config;
use crate::ifttt::IftttClient;
use crate::oracle::OpenAiBackend;
use crate::pipeline::{AppContext, PingRequest, PingResponse, TrackerState};
use crate::tracer::Tracer;
use homebound_location_ai::decision::DecisionBackend;

const USAGE: &str = "
Runs the Homebound AC relay server on :PORT.

Usage:
  homebound-server (-p PORT | --port PORT)
  homebound-server (--version | -v)
  homebound-server (--help | -h)

Options:
    -p, --port PORT     Listen on PORT.
    --version, -v       Show tool version.
    --help, -h          Show this screen.
";

#[derive(Debug, Deserialize)]
struct Args {
    flag_port: u16,
}

#[post("/ping", format = "json", data = "<payload>")]
async fn ping(
    payload: Json<serde_json::Value>,
    ctx: &State<Arc<AppContext>>,
) -> Result<Json<PingResponse>, Custom<String>> {
    // Structured parsing only: a missing field fails the request before any
    // shared state is touched.
    let request: PingRequest = serde_json::from_value(payload.into_inner())
        .map_err(|e| Custom(Status::InternalServerError, format!("Bad ping payload: {e}")))?;

    let ctx = ctx.inner().clone();
    let response =
        rocket::tokio::task::spawn_blocking(move || pipeline::handle_ping(&ctx, &request))
            .await
            .map_err(|e| Custom(Status::InternalServerError, e.to_string()))?;

    Ok(Json(response))
}

#[post("/test")]
async fn test(ctx: &State<Arc<AppContext>>) -> Result<Json<PingResponse>, Custom<String>> {
    let ctx = ctx.inner().clone();
    let response = rocket::tokio::task::spawn_blocking(move || pipeline::handle_test(&ctx))
        .await
        .map_err(|e| Custom(Status::InternalServerError, e.to_string()))?;

    Ok(Json(response))
}

#[rocket::main]
async fn main() -> Result<(), rocket::Error> {
    let version = env!("CARGO_PKG_NAME").to_string() + ", version: " + env!("CARGO_PKG_VERSION");
    env_logger::init();

    let args: Args = Docopt::new(USAGE)
        .map(|d| d.help(true))
        .map(|d| d.version(Some(version)))
        .and_then(|d| d.deserialize())
        .unwrap_or_else(|e| e.exit());

    let config = Config::load();
    let tracer = Tracer::new(
        config.langsmith_api_key.clone(),
        config.langsmith_project.clone(),
    );

    info!(
        "home location: ({}, {})",
        config.home.latitude, config.home.longitude
    );
    info!(
        "IFTTT key configured: {}",
        if config.ifttt_key.is_some() { "yes" } else { "no" }
    );
    info!(
        "OpenAI API key configured: {}",
        if config.openai_api_key.is_some() { "yes" } else { "no" }
    );
    info!(
        "LangSmith tracing: {}",
        if tracer.enabled() { "enabled" } else { "disabled" }
    );

    let backend = config.openai_api_key.clone().map(|key| {
        Box::new(OpenAiBackend::new(key, config.openai_model.clone()))
            as Box<dyn DecisionBackend + Send + Sync>
    });

    let ctx = Arc::new(AppContext {
        home: config.home,
        tracker: Mutex::new(TrackerState::new()),
        actuator: Box::new(IftttClient::new(
            config.ifttt_key.clone(),
            config.ac_on_event.clone(),
            config.ac_off_event.clone(),
        )),
        backend,
        tracer,
    });

    let figment = rocket::Config::figment()
        .merge(("address", "0.0.0.0"))
        .merge(("port", args.flag_port));

    let _rocket = rocket::custom(figment)
        .manage(ctx)
        .mount("/", routes![ping, test])
        .launch()
        .await?;

    Ok(())
}
