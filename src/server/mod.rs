//! HTTP Server Module
//!
//! Axum router wiring for the relay:
//!
//! | Prefix            | Module        |
//! |-------------------|---------------|
//! | `/api/chat`       | [`chat`]      |
//! | `/api/analytics`  | [`analytics`] |
//! | `/api/contact`    | [`contact`]   |
//! | `/api/cleanup`    | [`cleanup`]   |
//! | `/ws/system`      | [`monitor`]   |

pub mod analytics;
pub mod background;
pub mod chat;
pub mod cleanup;
pub mod contact;
pub mod monitor;
pub mod state;

use axum::extract::State;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use background::BackgroundTasks;
pub use state::AppState;

/// Build the full application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/api/health", get(health))
        .nest("/api/chat", chat::router())
        .nest("/api/analytics", analytics::router())
        .route("/api/contact/submit", post(contact::submit))
        .route("/api/cleanup", delete(cleanup::cleanup))
        .route("/ws/system", get(monitor::upgrade))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": "Folio relay online",
        "version": env!("CARGO_PKG_VERSION"),
        "docs": "/api/health",
    }))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "environment": state.settings.environment,
        "keys": state.dispatcher.pool().stats(),
    }))
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Method, Request, Response};
    use serde_json::Value;

    use crate::config::Settings;
    use crate::email::Mailer;
    use crate::server::AppState;
    use crate::store::MemoryStore;

    pub fn settings(completion_base: &str, keys: &[&str]) -> Settings {
        let mut settings = Settings::default();
        settings.ai.api_keys = keys.iter().map(|k| k.to_string()).collect();
        settings.ai.completion_url = format!("{}/v1/chat/completions", completion_base);
        settings.ai.timeout_secs = 5;
        settings
    }

    /// State over a fresh memory store with no mailer
    pub fn test_state(completion_base: &str, keys: &[&str]) -> (AppState, Arc<MemoryStore>) {
        state_with(settings(completion_base, keys), None)
    }

    pub fn state_with(
        settings: Settings,
        mailer: Option<Arc<dyn Mailer>>,
    ) -> (AppState, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(settings, store.clone(), mailer).unwrap();
        (state, store)
    }

    /// Build a request; `Value::Null` sends no body
    pub fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
        let builder = Request::builder().method(method).uri(uri);
        if body.is_null() {
            builder.body(Body::empty()).unwrap()
        } else {
            builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap()
        }
    }

    pub async fn body_json(resp: Response<Body>) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }
}
