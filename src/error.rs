//! Error types for cursor simulation, compilation and the chain service

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RobokitError>;

/// Reasons a cursor refuses an action. The cursor state is untouched
/// whenever one of these is returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CursorError {
    #[error("Cursor has not been initialized")]
    NotInitialized,

    #[error("Cursor was already initialized")]
    AlreadyInitialized,

    #[error("No absolute position known, issue an absolute translation first")]
    MissingPosition,

    #[error("No absolute rotation known, issue an absolute rotation first")]
    MissingRotation,

    #[error("No absolute joint values known, issue an absolute joints action first")]
    MissingJoints,

    #[error("Settings stack is empty, nothing to pop")]
    SettingsStackEmpty,

    #[error("Target Z {z:.3} mm is below the table height {table_height:.3} mm")]
    TableCollision { z: f64, table_height: f64 },

    #[error("No pending actions")]
    NothingPending,

    #[error("Unknown cursor stage {0}")]
    UnknownStage(usize),
}

/// Failures while generating a device program
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("Replaying action #{action} failed: {source}")]
    Replay {
        action: u64,
        #[source]
        source: CursorError,
    },

    #[error("Block compilation requested but no block is marked")]
    NoBlockMarked,

    #[error("Action #{0} needs a target but the cursor has no matching pose")]
    MissingTarget(u64),
}

#[derive(Error, Debug)]
pub enum RobokitError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cursor error: {0}")]
    Cursor(#[from] CursorError),

    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("Device error: {0}")]
    Device(String),

    #[error("Chain service is no longer running")]
    ServiceClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
