//! Rotation Module
//!
//! API key pool and the dispatcher that rotates through it.

pub mod dispatcher;
pub mod key_pool;

pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use key_pool::{ApiKey, KeyPool, KeyPoolStats};
