use anyhow::Error;
use serde::Serialize;

use crate::trend::Trend;

/// Distance below which the device is considered home already.
pub const NEAR_HOME_RADIUS_MILES: f64 = 0.25;

/// Outer edge of the band in which an approaching device warrants
/// pre-cooling.
pub const APPROACH_BAND_MILES: f64 = 2.0;

/// The action vocabulary shared by every decision backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AcAction {
    TurnOn,
    TurnOff,
    NoAction,
}

impl AcAction {
    pub fn as_token(&self) -> &'static str {
        match self {
            AcAction::TurnOn => "ac_on",
            AcAction::TurnOff => "ac_off",
            AcAction::NoAction => "no_action",
        }
    }

    /// Parses a backend response token. Unrecognized tokens return `None`;
    /// callers treat that as no action and only log it.
    pub fn parse(token: &str) -> Option<AcAction> {
        match token {
            "ac_on" => Some(AcAction::TurnOn),
            "ac_off" => Some(AcAction::TurnOff),
            "no_action" => Some(AcAction::NoAction),
            _ => None,
        }
    }
}

/// Ephemeral input to a decision backend, built once per ping.
#[derive(Debug, Clone, Serialize)]
pub struct Observation {
    pub distance_miles: f64,
    pub movement_trend: Trend,
    pub speed_mph: f64,
}

/// The reference decision rules. First match wins.
pub fn rule_decision(observation: &Observation) -> AcAction {
    if observation.distance_miles < NEAR_HOME_RADIUS_MILES {
        return AcAction::NoAction;
    }
    if observation.distance_miles <= APPROACH_BAND_MILES
        && observation.movement_trend == Trend::Approaching
    {
        return AcAction::TurnOn;
    }
    if observation.distance_miles > APPROACH_BAND_MILES
        || observation.movement_trend == Trend::MovingAway
    {
        return AcAction::TurnOff;
    }
    // Unknown or stationary inside the band: leave the AC alone.
    AcAction::NoAction
}

/// Chooses an action for an observation. Implemented by the deterministic
/// rule table and by the LLM-backed client, interchangeably.
pub trait DecisionBackend {
    fn decide(&self, observation: &Observation) -> Result<AcAction, Error>;
}

/// Deterministic backend evaluating `rule_decision` directly.
pub struct RuleBackend;

impl DecisionBackend for RuleBackend {
    fn decide(&self, observation: &Observation) -> Result<AcAction, Error> {
        Ok(rule_decision(observation))
    }
}

/// Suppresses repeated actuations: a webhook fires only when the decided
/// action is side-effecting and differs from the last action that went out.
#[derive(Debug, Default)]
pub struct ActionLatch {
    last: Option<AcAction>,
}

impl ActionLatch {
    pub fn new() -> Self {
        Self { last: None }
    }

    pub fn should_fire(&self, action: AcAction) -> bool {
        matches!(action, AcAction::TurnOn | AcAction::TurnOff) && self.last != Some(action)
    }

    /// Records a successful actuation. Not called on failure, so the next
    /// ping retries the same transition.
    pub fn record_fired(&mut self, action: AcAction) {
        self.last = Some(action);
    }

    pub fn last_action(&self) -> Option<AcAction> {
        self.last
    }
}
