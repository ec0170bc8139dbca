//! Relay Settings
//!
//! Defines the configuration schema for the relay.

use crate::error::{FolioError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Deployment environment ("development" enables the cleanup task)
    pub environment: String,

    /// Bind address
    pub host: String,

    /// Bind port
    pub port: u16,

    /// Chat completion settings
    pub ai: AiSettings,

    /// Contact relay settings
    pub contact: ContactSettings,

    /// Live monitor settings
    pub monitor: MonitorSettings,

    /// Data retention settings
    pub retention: RetentionSettings,
}

/// Configuration for the remote completion API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiSettings {
    /// Interchangeable API keys, tried in order and rotated on failure
    pub api_keys: Vec<String>,

    /// Full URL of the chat completions endpoint
    pub completion_url: String,

    /// Model identifier sent with every request
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Per-attempt timeout in seconds
    pub timeout_secs: u64,

    /// Number of stored messages replayed as context
    pub history_limit: usize,

    /// System prompt prepended to every conversation
    pub system_prompt: String,
}

/// Contact form and email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactSettings {
    /// Resend API key; email relay is disabled when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resend_api_key: Option<String>,

    /// Base URL of the email provider API
    pub email_api_url: String,

    /// Sender address
    pub email_from: String,

    /// Recipient of contact submissions
    pub contact_email: String,

    /// Whether submissions are rate limited per client
    pub rate_limit_enabled: bool,

    /// Limit expression such as "3/hour"
    pub rate_limit: String,
}

/// Live monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Seconds between telemetry samples
    pub interval_secs: u64,

    /// Chance per tick of also emitting a simulated request log
    pub log_probability: f64,

    /// Outbound frame queue depth per connection
    pub send_queue: usize,
}

/// Data retention configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionSettings {
    /// Seconds between automatic cleanups
    pub cleanup_interval_secs: u64,

    /// Age after which chat messages are deleted
    pub message_ttl_secs: u64,

    /// Age after which active sessions are dropped
    pub session_ttl_secs: u64,
}

const DEFAULT_SYSTEM_PROMPT: &str = "You are a portfolio assistant. Only answer questions about \
the site owner's skills, projects, experience, and professional background. Keep answers under \
150 words. For unrelated questions, politely redirect the visitor to portfolio topics or the \
contact form.";

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8000,
            ai: AiSettings::default(),
            contact: ContactSettings::default(),
            monitor: MonitorSettings::default(),
            retention: RetentionSettings::default(),
        }
    }
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            completion_url: "https://api.mistral.ai/v1/chat/completions".to_string(),
            model: "mistral-small-latest".to_string(),
            temperature: 0.7,
            max_tokens: 500,
            timeout_secs: 30,
            history_limit: 10,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl Default for ContactSettings {
    fn default() -> Self {
        Self {
            resend_api_key: None,
            email_api_url: "https://api.resend.com".to_string(),
            email_from: "onboarding@resend.dev".to_string(),
            contact_email: "owner@example.com".to_string(),
            rate_limit_enabled: true,
            rate_limit: "3/hour".to_string(),
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval_secs: 2,
            log_probability: 0.3,
            send_queue: 64,
        }
    }
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            cleanup_interval_secs: 7200,
            message_ttl_secs: 3600,
            session_ttl_secs: 600,
        }
    }
}

impl Settings {
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Reject settings the relay cannot start with
    pub fn validate(&self) -> Result<()> {
        if self.ai.api_keys.iter().all(|k| k.trim().is_empty()) {
            return Err(FolioError::Config(
                "no API keys configured. Set OPENAI_API_KEYS to a comma-separated list".to_string(),
            ));
        }
        if self.ai.timeout_secs == 0 {
            return Err(FolioError::Config("AI_TIMEOUT_SECS must be positive".to_string()));
        }
        if self.monitor.interval_secs == 0 {
            return Err(FolioError::Config(
                "monitor interval must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.monitor.log_probability) {
            return Err(FolioError::Config(format!(
                "log probability {} is outside [0, 1]",
                self.monitor.log_probability
            )));
        }
        RateLimitRule::parse(&self.contact.rate_limit)?;
        Ok(())
    }
}

impl AiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// A parsed "<count>/<period>" limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimitRule {
    /// Parse a limit such as "3/hour" or "1000/day"
    pub fn parse(expr: &str) -> Result<Self> {
        let (count, period) = expr.split_once('/').ok_or_else(|| {
            FolioError::Config(format!("Invalid rate limit '{}'. Expected '<n>/<period>'", expr))
        })?;

        let max_requests = count.trim().parse::<u32>().map_err(|e| {
            FolioError::Config(format!("Invalid rate limit count in '{}': {}", expr, e))
        })?;

        let window = match period.trim().to_ascii_lowercase().as_str() {
            "second" | "s" => Duration::from_secs(1),
            "minute" | "m" => Duration::from_secs(60),
            "hour" | "h" => Duration::from_secs(3600),
            "day" | "d" => Duration::from_secs(86_400),
            other => {
                return Err(FolioError::Config(format!(
                    "Invalid rate limit period '{}' in '{}'",
                    other, expr
                )))
            }
        };

        Ok(Self {
            max_requests,
            window,
        })
    }
}
