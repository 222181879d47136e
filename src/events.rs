//! JSON line events for issued actions, safety warnings and generated programs
//!
//! One event per line on stdout, so external tools can follow a session
//! without parsing the tracing log on stderr.

use crate::action::Action;
use crate::cursor::SafetyWarning;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the UNIX epoch, rounded to microseconds
pub fn current_timestamp() -> f64 {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64();
    (timestamp * 1_000_000.0).round() / 1_000_000.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Issued,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionEvent {
    pub timestamp: f64,
    #[serde(rename = "type")]
    pub event_type: String,
    /// 0 when the action was rejected before it got an id
    pub action_id: u64,
    pub status: ActionStatus,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ActionEvent {
    pub fn issued(action: &Action) -> Self {
        Self {
            timestamp: current_timestamp(),
            event_type: "action_status".to_string(),
            action_id: action.id,
            status: ActionStatus::Issued,
            description: action.kind.to_string(),
            reason: None,
        }
    }

    pub fn rejected(description: &str, reason: &str) -> Self {
        Self {
            timestamp: current_timestamp(),
            event_type: "action_status".to_string(),
            action_id: 0,
            status: ActionStatus::Rejected,
            description: description.to_string(),
            reason: Some(reason.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyEvent {
    pub timestamp: f64,
    #[serde(rename = "type")]
    pub event_type: String,
    pub action_id: u64,
    pub z: f64,
    pub table_height: f64,
    pub message: String,
}

impl From<&SafetyWarning> for SafetyEvent {
    fn from(warning: &SafetyWarning) -> Self {
        Self {
            timestamp: current_timestamp(),
            event_type: "safety_warning".to_string(),
            action_id: warning.action_id,
            z: warning.z,
            table_height: warning.table_height,
            message: warning.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramEvent {
    pub timestamp: f64,
    #[serde(rename = "type")]
    pub event_type: String,
    pub name: String,
    pub platform: String,
    pub lines: usize,
}

impl ProgramEvent {
    pub fn new(name: &str, platform: &str, lines: usize) -> Self {
        Self {
            timestamp: current_timestamp(),
            event_type: "program".to_string(),
            name: name.to_string(),
            platform: platform.to_string(),
            lines,
        }
    }
}

/// Print a JSON event to stdout
pub fn output_event<T: Serialize>(event: &T) {
    if let Ok(json) = serde_json::to_string(event) {
        println!("{}", json);
    }
}

pub mod output {
    use super::*;

    pub fn action_issued(action: &Action) {
        output_event(&ActionEvent::issued(action));
    }

    pub fn action_rejected(description: &str, reason: &str) {
        output_event(&ActionEvent::rejected(description, reason));
    }

    pub fn safety_warning(warning: &SafetyWarning) {
        output_event(&SafetyEvent::from(warning));
    }

    pub fn program(name: &str, platform: &str, lines: usize) {
        output_event(&ProgramEvent::new(name, platform, lines));
    }
}
