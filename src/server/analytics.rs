//! Visitor analytics: event tracking and aggregate counters.

use std::collections::{HashMap, HashSet};

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FolioError, Result};
use crate::server::AppState;
use crate::store::{TrackedEvent, PAGE_VIEWS_COUNTER};

const LIVE_WINDOW_MINUTES: i64 = 5;
const VISITOR_WINDOW_DAYS: i64 = 30;
const SECTION_WINDOW_DAYS: i64 = 7;
const POPULAR_SECTIONS: usize = 5;
const RECENT_EVENTS: usize = 10;

#[derive(Debug, Deserialize)]
pub struct TrackRequest {
    pub session_id: String,
    pub event_type: String,
    #[serde(default)]
    pub page_path: Option<String>,
    #[serde(default)]
    pub section_name: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub referrer: Option<String>,
    #[serde(default)]
    pub device_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SectionViews {
    pub name: String,
    pub views: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyticsStats {
    pub total_visitors: usize,
    pub live_visitors: usize,
    pub total_page_views: usize,
    pub popular_sections: Vec<SectionViews>,
    pub recent_events: Vec<TrackedEvent>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LiveVisitors {
    pub active_visitors: usize,
    pub total_views: i64,
    pub timestamp: DateTime<Utc>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/track", post(track))
        .route("/stats", get(stats))
        .route("/visitors/live", get(live_visitors))
}

impl TrackRequest {
    fn into_event(self, at: DateTime<Utc>) -> TrackedEvent {
        TrackedEvent {
            session_id: self.session_id,
            event_type: self.event_type,
            page_path: self.page_path,
            section_name: self.section_name,
            user_agent: self.user_agent,
            referrer: self.referrer,
            device_type: self.device_type,
            created_at: at,
        }
    }
}

async fn track(
    State(state): State<AppState>,
    Json(body): Json<TrackRequest>,
) -> Result<Json<serde_json::Value>> {
    if body.session_id.trim().is_empty() || body.event_type.trim().is_empty() {
        return Err(FolioError::Validation(
            "session_id and event_type are required".to_string(),
        ));
    }

    let now = Utc::now();
    state.store.touch_session(&body.session_id, now).await?;

    if body.event_type == "page_view" {
        let total = state.store.increment_counter(PAGE_VIEWS_COUNTER).await?;
        tracing::debug!(total, "page view counted");
    }

    state.store.record_event(body.into_event(now)).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Counter updated",
    })))
}

fn unique_sessions(events: &[TrackedEvent]) -> usize {
    events
        .iter()
        .map(|e| e.session_id.as_str())
        .collect::<HashSet<_>>()
        .len()
}

/// Section-view counts, most viewed first, ties broken by name
fn popular_sections(events: &[TrackedEvent], limit: usize) -> Vec<SectionViews> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for event in events.iter().filter(|e| e.event_type == "section_view") {
        if let Some(section) = event.section_name.as_deref() {
            *counts.entry(section).or_default() += 1;
        }
    }

    let mut ranked: Vec<SectionViews> = counts
        .into_iter()
        .map(|(name, views)| SectionViews {
            name: name.to_string(),
            views,
        })
        .collect();
    ranked.sort_by(|a, b| b.views.cmp(&a.views).then_with(|| a.name.cmp(&b.name)));
    ranked.truncate(limit);
    ranked
}

async fn stats(State(state): State<AppState>) -> Result<Json<AnalyticsStats>> {
    let now = Utc::now();
    let store = &state.store;

    let month = store
        .events_since(now - Duration::days(VISITOR_WINDOW_DAYS))
        .await?;
    let live_cutoff = now - Duration::minutes(LIVE_WINDOW_MINUTES);
    let live: Vec<TrackedEvent> = month
        .iter()
        .filter(|e| e.created_at >= live_cutoff)
        .cloned()
        .collect();
    let week_cutoff = now - Duration::days(SECTION_WINDOW_DAYS);
    let week: Vec<TrackedEvent> = month
        .iter()
        .filter(|e| e.created_at >= week_cutoff)
        .cloned()
        .collect();

    Ok(Json(AnalyticsStats {
        total_visitors: unique_sessions(&month),
        live_visitors: unique_sessions(&live),
        total_page_views: store.count_events("page_view").await?,
        popular_sections: popular_sections(&week, POPULAR_SECTIONS),
        recent_events: store.recent_events(RECENT_EVENTS).await?,
    }))
}

async fn live_visitors(State(state): State<AppState>) -> Result<Json<LiveVisitors>> {
    let now = Utc::now();
    let active_visitors = state
        .store
        .active_sessions_since(now - Duration::minutes(LIVE_WINDOW_MINUTES))
        .await?;
    let total_views = state.store.counter(PAGE_VIEWS_COUNTER).await?;

    Ok(Json(LiveVisitors {
        active_visitors,
        total_views,
        timestamp: now,
    }))
}
