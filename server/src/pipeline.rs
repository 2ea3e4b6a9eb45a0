//! Homebound per-ping pipeline: history update, trend estimation, decision,
//! and idempotent actuation.
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

use std::sync::Mutex;
use std::time::SystemTime;

use homebound_location_ai::decision::{AcAction, ActionLatch, DecisionBackend, Observation};
use homebound_location_ai::geodesy::{self, Coordinate};
use homebound_location_ai::history::{LocationHistory, LocationSample};
use homebound_location_ai::trend::{self, Trend};
use serde_json::json;

use crate::ifttt::Actuator;
use crate::tracer::Tracer;

// Synthetic location for the /test endpoint: a point roughly 1.5 miles out,
// as if the phone were heading home.
const TEST_LAT_OFFSET: f64 = 0.02;
const TEST_LON_OFFSET: f64 = 0.01;
const TEST_SPEED_MPH: f64 = 25.0;

/// The lock-guarded region shared by every in-flight ping. The sample
/// history and the actuation latch move together under one lock so a ping
/// never decides against a half-updated state.
pub struct TrackerState {
    pub history: LocationHistory,
    pub latch: ActionLatch,
}

impl TrackerState {
    pub fn new() -> Self {
        Self {
            history: LocationHistory::new(),
            latch: ActionLatch::new(),
        }
    }
}

pub struct AppContext {
    pub home: Coordinate,
    pub tracker: Mutex<TrackerState>,
    pub actuator: Box<dyn Actuator>,
    pub backend: Option<Box<dyn DecisionBackend + Send + Sync>>,
    pub tracer: Tracer,
}

#[derive(Debug, Deserialize)]
pub struct PingRequest {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub speed_mph: f64,
}

#[derive(Debug, Serialize)]
pub struct SimulatedLocation {
    pub lat: f64,
    pub lon: f64,
}

/// What the agent did for one ping, mirrored into the HTTP response.
#[derive(Debug, Serialize)]
pub struct AgentOutcome {
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_decision: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentOutcome {
    fn error(message: impl Into<String>) -> Self {
        Self {
            action: AcAction::NoAction.as_token().to_string(),
            llm_decision: None,
            result: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PingResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simulated_location: Option<SimulatedLocation>,
    pub distance_miles: f64,
    pub speed_mph: f64,
    pub movement_trend: &'static str,
    pub history_samples: usize,
    pub agent_result: AgentOutcome,
}

pub fn handle_ping(ctx: &AppContext, request: &PingRequest) -> PingResponse {
    let (distance, movement_trend, history_samples, agent_result) =
        process(ctx, request.lat, request.lon, request.speed_mph, "/ping");

    PingResponse {
        status: "ok",
        message: None,
        simulated_location: None,
        distance_miles: distance,
        speed_mph: request.speed_mph,
        movement_trend: movement_trend.as_str(),
        history_samples,
        agent_result,
    }
}

pub fn handle_test(ctx: &AppContext) -> PingResponse {
    let lat = ctx.home.latitude + TEST_LAT_OFFSET;
    let lon = ctx.home.longitude + TEST_LON_OFFSET;
    let (distance, movement_trend, history_samples, agent_result) =
        process(ctx, lat, lon, TEST_SPEED_MPH, "/test");

    PingResponse {
        status: "test_ok",
        message: Some("simulated location processed"),
        simulated_location: Some(SimulatedLocation { lat, lon }),
        distance_miles: distance,
        speed_mph: TEST_SPEED_MPH,
        movement_trend: movement_trend.as_str(),
        history_samples,
        agent_result,
    }
}

/// Runs the full pipeline for one ping under the shared lock: evict,
/// measure, record, estimate, decide, and (maybe) actuate.
fn process(
    ctx: &AppContext,
    lat: f64,
    lon: f64,
    speed_mph: f64,
    endpoint: &str,
) -> (f64, Trend, usize, AgentOutcome) {
    let ping_run = ctx.tracer.create_run(
        "location_ping",
        json!({ "lat": lat, "lon": lon, "speed_mph": speed_mph, "endpoint": endpoint }),
        "chain",
        None,
    );

    let now = SystemTime::now();
    let location = Coordinate {
        latitude: lat,
        longitude: lon,
    };
    let distance = geodesy::distance_miles(location, ctx.home);

    let mut tracker = ctx.tracker.lock().unwrap();
    tracker.history.evict(now);
    tracker.history.record(LocationSample {
        timestamp: now,
        latitude: lat,
        longitude: lon,
        distance_from_home: distance,
        speed_mph,
    });
    let movement_trend = trend::estimate(&tracker.history);
    let history_samples = tracker.history.len();

    info!(
        "location update: {distance:.2} miles, {}, {speed_mph} mph",
        movement_trend.as_str()
    );

    let observation = Observation {
        distance_miles: distance,
        movement_trend,
        speed_mph,
    };
    let agent_result = run_agent(ctx, &mut tracker.latch, &observation, &ping_run);

    ctx.tracer.update_run(
        &ping_run,
        Some(json!({
            "distance_miles": distance,
            "movement_trend": movement_trend.as_str(),
            "action": agent_result.action.as_str(),
        })),
        agent_result.error.as_deref(),
        Some(json!({
            "home": ctx.home,
            "history_samples": history_samples,
        })),
    );

    (distance, movement_trend, history_samples, agent_result)
}

/// Asks the backend for an action and fires the actuator on transitions
/// only. The latch is committed after a successful actuation, so a failed
/// webhook call is retried by the next ping.
fn run_agent(
    ctx: &AppContext,
    latch: &mut ActionLatch,
    observation: &Observation,
    parent_run_id: &str,
) -> AgentOutcome {
    let decision_run = ctx.tracer.create_run(
        "ac_decision",
        json!({ "observation": observation }),
        "llm",
        Some(parent_run_id),
    );

    let Some(backend) = &ctx.backend else {
        ctx.tracer.update_run(
            &decision_run,
            None,
            Some("OpenAI API key not configured"),
            None,
        );
        return AgentOutcome::error("OpenAI API key not configured");
    };

    let decision = match backend.decide(observation) {
        Ok(decision) => decision,
        Err(e) => {
            error!("decision backend failed: {e}");
            let message = e.to_string();
            ctx.tracer
                .update_run(&decision_run, None, Some(&message), None);
            return AgentOutcome::error(message);
        }
    };

    ctx.tracer.update_run(
        &decision_run,
        Some(json!({ "decision": decision.as_token() })),
        None,
        None,
    );

    if !latch.should_fire(decision) {
        info!(
            "no actuation for {} (idempotence or no_action)",
            decision.as_token()
        );
        return AgentOutcome {
            action: AcAction::NoAction.as_token().to_string(),
            llm_decision: Some(decision.as_token().to_string()),
            result: None,
            error: None,
        };
    }

    let action_run = ctx.tracer.create_run(
        match decision {
            AcAction::TurnOn => "ac_turn_on",
            _ => "ac_turn_off",
        },
        json!({ "action": decision.as_token() }),
        "tool",
        Some(&decision_run),
    );

    match ctx.actuator.fire(decision) {
        Ok(message) => {
            latch.record_fired(decision);
            ctx.tracer.update_run(
                &action_run,
                Some(json!({ "status": "success", "message": message.as_str() })),
                None,
                None,
            );
            AgentOutcome {
                action: decision.as_token().to_string(),
                llm_decision: Some(decision.as_token().to_string()),
                result: Some(message),
                error: None,
            }
        }
        Err(e) => {
            error!("actuation failed: {e}");
            let message = e.to_string();
            ctx.tracer.update_run(&action_run, None, Some(&message), None);
            AgentOutcome {
                action: decision.as_token().to_string(),
                llm_decision: Some(decision.as_token().to_string()),
                result: None,
                error: Some(message),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use homebound_location_ai::decision::RuleBackend;
    use homebound_location_ai::geodesy::EARTH_RADIUS_MILES;
    use std::io;
    use std::sync::Arc;

    const HOME: Coordinate = Coordinate {
        latitude: 40.7128,
        longitude: -74.0060,
    };

    struct RecordingActuator {
        calls: Mutex<Vec<AcAction>>,
        fail: bool,
    }

    impl RecordingActuator {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                fail,
            })
        }

        fn calls(&self) -> Vec<AcAction> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Actuator for Arc<RecordingActuator> {
        fn fire(&self, action: AcAction) -> io::Result<String> {
            self.calls.lock().unwrap().push(action);
            if self.fail {
                Err(io::Error::other("simulated transport error"))
            } else {
                Ok(format!("fired {}", action.as_token()))
            }
        }
    }

    struct FailingBackend;

    impl DecisionBackend for FailingBackend {
        fn decide(&self, _observation: &Observation) -> Result<AcAction, anyhow::Error> {
            bail!("oracle down")
        }
    }

    fn context(
        actuator: Arc<RecordingActuator>,
        backend: Option<Box<dyn DecisionBackend + Send + Sync>>,
    ) -> AppContext {
        AppContext {
            home: HOME,
            tracker: Mutex::new(TrackerState::new()),
            actuator: Box::new(actuator),
            backend,
            tracer: Tracer::new(None, "test".to_string()),
        }
    }

    /// A ping due north of home at the given great-circle distance.
    fn ping_at(miles: f64) -> PingRequest {
        PingRequest {
            lat: HOME.latitude + (miles / EARTH_RADIUS_MILES).to_degrees(),
            lon: HOME.longitude,
            speed_mph: 25.0,
        }
    }

    #[test]
    fn first_ping_at_home_does_nothing() {
        let actuator = RecordingActuator::new(false);
        let ctx = context(actuator.clone(), Some(Box::new(RuleBackend)));

        let response = handle_ping(
            &ctx,
            &PingRequest {
                lat: HOME.latitude,
                lon: HOME.longitude,
                speed_mph: 0.0,
            },
        );

        assert_eq!(response.status, "ok");
        assert!(response.distance_miles < 1e-9);
        assert_eq!(response.movement_trend, "unknown");
        assert_eq!(response.history_samples, 1);
        assert_eq!(response.agent_result.action, "no_action");
        assert!(actuator.calls().is_empty());
    }

    #[test]
    fn approach_fires_turn_on_exactly_once() {
        let actuator = RecordingActuator::new(false);
        let ctx = context(actuator.clone(), Some(Box::new(RuleBackend)));

        // Far out with no trend yet: the rule table turns the AC off.
        let first = handle_ping(&ctx, &ping_at(3.0));
        assert_eq!(first.agent_result.action, "ac_off");

        // Closing into the band: turn on.
        let second = handle_ping(&ctx, &ping_at(1.5));
        assert_eq!(second.movement_trend, "approaching");
        assert_eq!(second.agent_result.action, "ac_on");
        assert_eq!(second.agent_result.result.as_deref(), Some("fired ac_on"));

        // Still closing, still in the band: same decision, suppressed.
        let third = handle_ping(&ctx, &ping_at(1.4));
        assert_eq!(third.movement_trend, "approaching");
        assert_eq!(third.agent_result.action, "no_action");
        assert_eq!(third.agent_result.llm_decision.as_deref(), Some("ac_on"));

        assert_eq!(actuator.calls(), vec![AcAction::TurnOff, AcAction::TurnOn]);
        let tracker = ctx.tracker.lock().unwrap();
        assert_eq!(tracker.latch.last_action(), Some(AcAction::TurnOn));
    }

    #[test]
    fn failed_actuation_is_retried_by_the_next_ping() {
        let actuator = RecordingActuator::new(true);
        let ctx = context(actuator.clone(), Some(Box::new(RuleBackend)));

        let first = handle_ping(&ctx, &ping_at(3.0));
        assert_eq!(first.agent_result.action, "ac_off");
        assert!(first.agent_result.error.is_some());
        {
            let tracker = ctx.tracker.lock().unwrap();
            assert_eq!(tracker.latch.last_action(), None);
        }

        // Same decision again; the latch never committed, so it re-fires.
        handle_ping(&ctx, &ping_at(3.0));
        assert_eq!(
            actuator.calls(),
            vec![AcAction::TurnOff, AcAction::TurnOff]
        );
    }

    #[test]
    fn missing_backend_reports_a_config_error() {
        let actuator = RecordingActuator::new(false);
        let ctx = context(actuator.clone(), None);

        let response = handle_ping(&ctx, &ping_at(1.0));
        assert_eq!(response.agent_result.action, "no_action");
        assert_eq!(
            response.agent_result.error.as_deref(),
            Some("OpenAI API key not configured")
        );
        assert!(actuator.calls().is_empty());
    }

    #[test]
    fn backend_failure_surfaces_as_no_action() {
        let actuator = RecordingActuator::new(false);
        let ctx = context(actuator.clone(), Some(Box::new(FailingBackend)));

        let response = handle_ping(&ctx, &ping_at(1.0));
        assert_eq!(response.agent_result.action, "no_action");
        assert!(response
            .agent_result
            .error
            .as_deref()
            .unwrap()
            .contains("oracle down"));
        assert!(actuator.calls().is_empty());
    }

    #[test]
    fn test_endpoint_runs_the_same_pipeline() {
        let actuator = RecordingActuator::new(false);
        let ctx = context(actuator, Some(Box::new(RuleBackend)));

        let response = handle_test(&ctx);
        assert_eq!(response.status, "test_ok");
        assert!(response.simulated_location.is_some());
        assert_eq!(response.history_samples, 1);
        assert_eq!(response.movement_trend, "unknown");
    }
}
