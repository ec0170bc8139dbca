//! Folio Relay - portfolio backend
//!
//! Chat completions relayed through a rotating API key pool, visitor
//! analytics counters, a contact form relay and a live telemetry WebSocket.

use std::future::Future;

use tokio::net::TcpListener;

pub mod api;
pub mod client;
pub mod config;
pub mod email;
pub mod error;
pub mod monitor;
pub mod rotation;
pub mod server;
pub mod store;

use config::{ConfigLoader, Settings};
use error::Result;
use server::{AppState, BackgroundTasks};

pub use error::FolioError;
pub use rotation::{DispatchOutcome, Dispatcher, KeyPool};

/// The relay: shared state plus the router built over it
pub struct Relay {
    state: AppState,
}

impl Relay {
    /// Create a relay from the default config locations and the environment
    pub fn new() -> Result<Self> {
        let loader = ConfigLoader::new()?;
        Self::from_settings(loader.into_settings()?)
    }

    /// Create a relay with a custom config path
    pub fn with_config_path(path: &str) -> Result<Self> {
        let loader = ConfigLoader::from_path(path)?;
        Self::from_settings(loader.into_settings()?)
    }

    pub fn from_settings(settings: Settings) -> Result<Self> {
        Ok(Self {
            state: AppState::from_settings(settings)?,
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn settings(&self) -> &Settings {
        &self.state.settings
    }

    /// Serve on `listener` until `shutdown` resolves, then stop background tasks
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let tasks = BackgroundTasks::start(&self.state);
        let app = server::build_router(self.state);

        if let Ok(addr) = listener.local_addr() {
            tracing::info!(%addr, "folio relay listening");
        }

        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await;

        tasks.shutdown().await;
        served.map_err(|e| FolioError::Internal(format!("server error: {}", e)))
    }
}
