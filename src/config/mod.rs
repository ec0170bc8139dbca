//! Configuration Module
//!
//! Handles settings loading and validation.

pub mod loader;
pub mod settings;

pub use loader::{normalize_keys, parse_key_list, ConfigLoader};
pub use settings::{
    AiSettings, ContactSettings, MonitorSettings, RateLimitRule, RetentionSettings, Settings,
};
