//! Configuration loading for cursor chains, safety policy and compilers

use crate::action::{MotionType, ReferenceFrame};
use crate::compiler::Platform;
use crate::cursor::InitialState;
use crate::geometry::{self, Joints, Point};
use crate::{Result, RobokitError};
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub safety: SafetyConfig,
    #[serde(default)]
    pub cursor: CursorConfig,
    #[serde(default)]
    pub compiler: CompilerConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
}

/// What happens when a target dips below the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Reject the action
    #[default]
    Stop,
    /// Apply the action and record a warning
    Warn,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SafetyConfig {
    #[serde(default = "default_true")]
    pub check_table_collision: bool,
    /// Lowest allowed TCP Z in millimetres
    #[serde(default)]
    pub table_height: f64,
    #[serde(default)]
    pub policy: CollisionPolicy,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CursorConfig {
    #[serde(default = "default_speed")]
    pub speed: u32,
    #[serde(default = "default_zone")]
    pub zone: u32,
    #[serde(default)]
    pub motion_type: MotionType,
    #[serde(default)]
    pub reference_frame: ReferenceFrame,
    /// Home position in millimetres
    pub position: Option<[f64; 3]>,
    /// Home orientation as `[w, x, y, z]`
    pub rotation: Option<[f64; 4]>,
    /// Home axis values in degrees
    pub joints: Option<[f64; 6]>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct CompilerConfig {
    #[serde(default)]
    pub platform: Platform,
    #[serde(default)]
    pub inline_targets: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Export programs only
    #[default]
    Offline,
    /// Upload and run whole programs
    Execute,
    /// Push one instruction at a time
    Stream,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub mode: ExecutionMode,
    #[serde(default = "default_program_name")]
    pub program_name: String,
    /// Upper bound on each device query made by the service (milliseconds)
    #[serde(default = "default_device_timeout_ms")]
    pub device_timeout_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_speed() -> u32 {
    20
}

fn default_zone() -> u32 {
    5
}

fn default_program_name() -> String {
    "Program".to_string()
}

fn default_device_timeout_ms() -> u64 {
    2000
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            check_table_collision: true,
            table_height: 0.0,
            policy: CollisionPolicy::Stop,
        }
    }
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            speed: default_speed(),
            zone: default_zone(),
            motion_type: MotionType::Linear,
            reference_frame: ReferenceFrame::World,
            position: None,
            rotation: None,
            joints: None,
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Offline,
            program_name: default_program_name(),
            device_timeout_ms: default_device_timeout_ms(),
        }
    }
}

impl SafetyConfig {
    /// Safety settings with the table check turned off
    pub fn disabled() -> Self {
        Self {
            check_table_collision: false,
            ..Self::default()
        }
    }
}

impl CursorConfig {
    /// Initial cursor state described by this config
    pub fn initial_state(&self) -> InitialState {
        InitialState {
            position: self.position.map(|p| Point::new(p[0], p[1], p[2])),
            rotation: self.rotation.map(geometry::rotation_from_wxyz),
            joints: self.joints.map(Joints),
            speed: self.speed,
            zone: self.zone,
            motion_type: self.motion_type,
            reference_frame: self.reference_frame,
        }
    }
}

impl Config {
    pub fn load_from_path(config_path: &str) -> Result<Self> {
        let contents = fs::read_to_string(config_path)
            .map_err(|e| RobokitError::Config(format!("Failed to read {}: {}", config_path, e)))?;
        Self::load_from_str(&contents)
    }

    pub fn load_from_str(contents: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(contents)?;
        if !config.safety.table_height.is_finite() {
            return Err(RobokitError::Config("safety.table_height must be finite".to_string()));
        }
        if let Some(rotation) = config.cursor.rotation {
            if geometry::checked_rotation_from_wxyz(rotation).is_none() {
                return Err(RobokitError::Config(format!(
                    "cursor.rotation {:?} is not a valid quaternion",
                    rotation
                )));
            }
        }
        if config.execution.device_timeout_ms == 0 {
            return Err(RobokitError::Config("execution.device_timeout_ms must be positive".to_string()));
        }
        Ok(config)
    }
}
