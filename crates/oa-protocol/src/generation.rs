use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Field separator in generator replies: `COMMAND|||EXPLANATION|||SAFETY_LEVEL`.
pub const REPLY_DELIMITER: &str = "|||";

/// Safety levels at or above this value need explicit confirmation.
pub const CONFIRMATION_THRESHOLD: u8 = 3;

/// Errors from parsing a generator reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplyError {
    #[error("invalid response format: expected 3 fields, got {0}")]
    TooFewFields(usize),

    #[error("invalid safety level {0:?}: must be an integer between 1 and 5")]
    InvalidSafetyLevel(String),
}

/// Risk rating attached to a generated command, 1 (safe) to 5 (dangerous).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SafetyLevel(u8);

impl SafetyLevel {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    /// Out-of-range values are rejected, never clamped.
    pub fn new(level: u8) -> Result<Self, ReplyError> {
        if (Self::MIN..=Self::MAX).contains(&level) {
            Ok(Self(level))
        } else {
            Err(ReplyError::InvalidSafetyLevel(level.to_string()))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn requires_confirmation(self) -> bool {
        self.0 >= CONFIRMATION_THRESHOLD
    }
}

impl FromStr for SafetyLevel {
    type Err = ReplyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let level: u8 = trimmed
            .parse()
            .map_err(|_| ReplyError::InvalidSafetyLevel(trimmed.to_string()))?;
        Self::new(level)
    }
}

impl TryFrom<u8> for SafetyLevel {
    type Error = ReplyError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SafetyLevel> for u8 {
    fn from(level: SafetyLevel) -> Self {
        level.0
    }
}

impl fmt::Display for SafetyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.0, Self::MAX)
    }
}

/// A command produced from a natural-language prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Command arguments for the cluster CLI, without the tool name.
    pub command: String,
    /// Human-readable description of what the command does.
    pub explanation: String,
    /// Risk rating driving the confirmation policy.
    pub safety_level: SafetyLevel,
}

impl GenerationResult {
    /// Parse a raw `COMMAND|||EXPLANATION|||SAFETY_LEVEL` reply.
    ///
    /// Fields are trimmed. Anything after the third field is ignored.
    pub fn parse_reply(reply: &str) -> Result<Self, ReplyError> {
        let parts: Vec<&str> = reply.split(REPLY_DELIMITER).collect();
        if parts.len() < 3 {
            return Err(ReplyError::TooFewFields(parts.len()));
        }

        Ok(Self {
            command: parts[0].trim().to_string(),
            explanation: parts[1].trim().to_string(),
            safety_level: parts[2].parse()?,
        })
    }
}

/// Remove one leading `"<tool> "` from a command, if present.
///
/// Generators sometimes echo the invocation prefix (`oc get pods`).
pub fn strip_tool_prefix<'a>(command: &'a str, tool: &str) -> &'a str {
    command
        .strip_prefix(tool)
        .and_then(|rest| rest.strip_prefix(' '))
        .unwrap_or(command)
}
