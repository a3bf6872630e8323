//! Notification types shared by the bus and its listeners

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a notification
///
/// Closed set so listeners can match exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// An owned copy of one emission.
///
/// Handlers receive borrowed `(level, message, title)`; this is what a
/// listener keeps when it needs to hold on to what it saw (toasts, logs, tests).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: Level,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Notification {
    pub fn new(level: Level, message: impl Into<String>, title: Option<&str>) -> Self {
        Self {
            level,
            message: message.into(),
            title: title.map(str::to_string),
        }
    }
}
