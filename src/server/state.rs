//! Shared application state handed to every handler.

use std::sync::Arc;

use crate::client::{HttpClient, RateLimitTracker};
use crate::config::{RateLimitRule, Settings};
use crate::email::{Mailer, ResendMailer};
use crate::error::Result;
use crate::monitor::ConnectionRegistry;
use crate::rotation::{Dispatcher, KeyPool};
use crate::store::{MemoryStore, Store};

/// Process-scoped singletons, cloned cheaply into handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub dispatcher: Arc<Dispatcher>,
    pub store: Arc<dyn Store>,
    pub registry: Arc<ConnectionRegistry>,
    /// `None` when no email key is configured
    pub mailer: Option<Arc<dyn Mailer>>,
    /// `None` when contact rate limiting is disabled
    pub contact_limiter: Option<Arc<RateLimitTracker>>,
}

impl AppState {
    /// Build state with the in-memory store and, if configured, Resend email
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let mailer: Option<Arc<dyn Mailer>> = match &settings.contact.resend_api_key {
            Some(key) => {
                let http = HttpClient::new(settings.ai.timeout())?;
                Some(Arc::new(ResendMailer::new(
                    http,
                    key.clone(),
                    settings.contact.email_api_url.clone(),
                )))
            }
            None => {
                tracing::warn!("RESEND_API_KEY not set; contact submissions will not be emailed");
                None
            }
        };

        Self::new(settings, Arc::new(MemoryStore::new()), mailer)
    }

    /// Build state around explicit collaborators; fails on an empty key pool
    pub fn new(
        settings: Settings,
        store: Arc<dyn Store>,
        mailer: Option<Arc<dyn Mailer>>,
    ) -> Result<Self> {
        let pool = Arc::new(KeyPool::new(settings.ai.api_keys.clone())?);
        let http = HttpClient::new(settings.ai.timeout())?;
        let dispatcher = Dispatcher::new(pool, http, settings.ai.completion_url.clone());

        let contact_limiter = if settings.contact.rate_limit_enabled {
            let rule = RateLimitRule::parse(&settings.contact.rate_limit)?;
            Some(Arc::new(RateLimitTracker::new(rule)))
        } else {
            None
        };

        tracing::info!(
            keys = dispatcher.pool().len(),
            model = %settings.ai.model,
            email = mailer.is_some(),
            rate_limited = contact_limiter.is_some(),
            "application state initialized"
        );

        Ok(Self {
            settings: Arc::new(settings),
            dispatcher: Arc::new(dispatcher),
            store,
            registry: Arc::new(ConnectionRegistry::new()),
            mailer,
            contact_limiter,
        })
    }
}
