//! Rate Limit Tracking
//!
//! Sliding-window limits keyed by client address, used for contact submissions.

use crate::config::RateLimitRule;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

/// Tracks recent hits per client
#[derive(Debug)]
pub struct RateLimitTracker {
    rule: RateLimitRule,

    /// Per-client hit timestamps, oldest first
    clients: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimitTracker {
    /// Create a new rate limit tracker
    pub fn new(rule: RateLimitRule) -> Self {
        Self {
            rule,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn rule(&self) -> RateLimitRule {
        self.rule
    }

    /// Record a hit for `client` if it is under the limit.
    ///
    /// Returns `Err` with the wait until the oldest hit leaves the window.
    pub fn check(&self, client: &str) -> Result<(), Duration> {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: &str, now: Instant) -> Result<(), Duration> {
        let mut clients = self.clients.lock();
        let mut hits = clients.remove(client).unwrap_or_default();

        while let Some(&oldest) = hits.front() {
            if now.duration_since(oldest) >= self.rule.window {
                hits.pop_front();
            } else {
                break;
            }
        }

        let verdict = if hits.len() >= self.rule.max_requests as usize {
            Err(hits
                .front()
                .map(|&oldest| self.rule.window - now.duration_since(oldest))
                .unwrap_or(self.rule.window))
        } else {
            hits.push_back(now);
            Ok(())
        };

        // Rejected callers with no live hits leave no entry behind
        if !hits.is_empty() {
            clients.insert(client.to_string(), hits);
        }
        verdict
    }

    /// Drop clients with no hits inside the window
    pub fn prune(&self) -> usize {
        self.prune_at(Instant::now())
    }

    fn prune_at(&self, now: Instant) -> usize {
        let mut clients = self.clients.lock();
        let before = clients.len();
        clients.retain(|_, hits| {
            hits.back()
                .map(|&last| now.duration_since(last) < self.rule.window)
                .unwrap_or(false)
        });
        before - clients.len()
    }

    /// Number of clients currently tracked
    pub fn tracked_clients(&self) -> usize {
        self.clients.lock().len()
    }
}
