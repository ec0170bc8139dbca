//! Retention pruning, shared by the HTTP endpoint and the background task.

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::config::RetentionSettings;
use crate::error::Result;
use crate::server::AppState;
use crate::store::{CleanupReport, Store};

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub success: bool,
    #[serde(flatten)]
    pub report: CleanupReport,
    pub note: &'static str,
}

/// `now - ttl_secs`, clamped to the earliest representable instant
fn cutoff(now: DateTime<Utc>, ttl_secs: u64) -> DateTime<Utc> {
    i64::try_from(ttl_secs)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|ttl| now.checked_sub_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Prune messages and sessions older than their TTLs, then empty conversations
pub async fn run_cleanup(store: &dyn Store, retention: &RetentionSettings) -> Result<CleanupReport> {
    let now = Utc::now();
    let report = store
        .prune(
            cutoff(now, retention.message_ttl_secs),
            cutoff(now, retention.session_ttl_secs),
        )
        .await?;

    tracing::info!(
        messages = report.messages_deleted,
        sessions = report.sessions_cleaned,
        conversations = report.conversations_deleted,
        "cleanup complete"
    );
    Ok(report)
}

pub async fn cleanup(State(state): State<AppState>) -> Result<Json<CleanupResponse>> {
    let report = run_cleanup(state.store.as_ref(), &state.settings.retention).await?;
    Ok(Json(CleanupResponse {
        success: true,
        report,
        note: "Analytics counters kept permanently",
    }))
}
