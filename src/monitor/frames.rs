//! Monitor Frames
//!
//! JSON messages pushed to monitor clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Every outbound frame carries a `type` discriminator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Periodic system statistics
    Stats(TelemetrySample),

    /// Simulated request log line
    Log(LogEvent),

    /// Reply to a `ping` command
    Pong,

    /// Reply to any other command
    TerminalResponse { content: String },
}

/// Simulated system statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub timestamp: DateTime<Utc>,

    /// CPU percentage, one decimal
    pub cpu: f64,

    /// Memory percentage, one decimal
    pub memory: f64,

    pub requests_per_sec: u32,

    /// Monitor connections open when the sample was taken
    pub active_connections: usize,

    pub status: String,
}

/// Simulated HTTP request log line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub id: String,
    pub method: String,
    pub path: String,
    pub status: u16,

    /// Latency such as "120ms"
    pub latency: String,
}

impl ServerFrame {
    pub fn terminal(content: impl Into<String>) -> Self {
        ServerFrame::TerminalResponse {
            content: content.into(),
        }
    }

    /// Encode as a text frame payload
    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
