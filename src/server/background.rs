//! Process-lifetime background tasks.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::client::RateLimitTracker;
use crate::monitor::{spawn_telemetry_ticker, TelemetryGenerator};
use crate::server::cleanup::run_cleanup;
use crate::server::AppState;

/// Handles for the telemetry ticker, the limiter sweep and, in development,
/// the cleanup loop
pub struct BackgroundTasks {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    /// Start every background task for `state`
    pub fn start(state: &AppState) -> Self {
        let cancel = CancellationToken::new();
        let monitor = &state.settings.monitor;

        let mut handles = vec![spawn_telemetry_ticker(
            state.registry.clone(),
            TelemetryGenerator::new(monitor.log_probability),
            Duration::from_secs(monitor.interval_secs),
            cancel.child_token(),
        )];

        if state.settings.is_development() {
            handles.push(spawn_cleanup(state.clone(), cancel.child_token()));
        }

        if let Some(limiter) = &state.contact_limiter {
            handles.push(spawn_limiter_sweep(limiter.clone(), cancel.child_token()));
        }

        tracing::info!(tasks = handles.len(), "background tasks started");
        Self { cancel, handles }
    }

    /// Cancel every task and wait for them to finish
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "background task ended abnormally");
            }
        }
        tracing::info!("background tasks stopped");
    }
}

/// Forget clients whose hits have all left the window, once per window
fn spawn_limiter_sweep(limiter: Arc<RateLimitTracker>, cancel: CancellationToken) -> JoinHandle<()> {
    let period = limiter.rule().window.max(Duration::from_secs(1));

    tokio::spawn(async move {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let dropped = limiter.prune();
                    if dropped > 0 {
                        tracing::debug!(
                            dropped,
                            tracked = limiter.tracked_clients(),
                            "rate limiter swept"
                        );
                    }
                }
            }
        }
    })
}

fn spawn_cleanup(state: AppState, cancel: CancellationToken) -> JoinHandle<()> {
    let period = Duration::from_secs(state.settings.retention.cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(period_secs = period.as_secs(), "cleanup task started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(e) = run_cleanup(state.store.as_ref(), &state.settings.retention).await {
                        tracing::error!(error = %e, "scheduled cleanup failed");
                    }
                }
            }
        }
        tracing::info!("cleanup task stopped");
    })
}
