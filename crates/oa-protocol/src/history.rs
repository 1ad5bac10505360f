use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::generation::strip_tool_prefix;

/// One executed command, as appended to the history file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// When the command was executed.
    pub timestamp: DateTime<Utc>,
    /// Command arguments, without the tool name.
    pub command: String,
    /// Cluster CLI that ran it (`oc` or `kubectl`).
    pub tool: String,
}

impl HistoryEntry {
    /// Stamp a new entry with the current time.
    pub fn new(tool: impl Into<String>, command: &str) -> Self {
        let tool = tool.into();
        let command = strip_tool_prefix(command, &tool).to_string();
        Self {
            timestamp: Utc::now(),
            command,
            tool,
        }
    }
}
