//! Store Module
//!
//! Table-like persistence seams used by the HTTP handlers. The relay ships an
//! in-process implementation; a managed datastore can be plugged in by
//! implementing the same traits.

pub mod memory;

use crate::api::Role;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use memory::MemoryStore;

/// A persisted chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A visitor analytics event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedEvent {
    pub session_id: String,
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A persisted contact form submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub subject: Option<String>,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Rows removed by one cleanup pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub messages_deleted: usize,
    pub sessions_cleaned: usize,
    pub conversations_deleted: usize,
}

/// Name of the page-view counter
pub const PAGE_VIEWS_COUNTER: &str = "total_page_views";

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn find_conversation(&self, session_id: &str) -> Result<Option<Uuid>>;

    async fn create_conversation(&self, session_id: &str) -> Result<Uuid>;

    async fn get_or_create_conversation(&self, session_id: &str) -> Result<Uuid> {
        match self.find_conversation(session_id).await? {
            Some(id) => Ok(id),
            None => self.create_conversation(session_id).await,
        }
    }

    async fn append_message(
        &self,
        conversation_id: Uuid,
        role: Role,
        content: &str,
    ) -> Result<StoredMessage>;

    /// The last `limit` messages, oldest first
    async fn recent_messages(&self, conversation_id: Uuid, limit: usize)
        -> Result<Vec<StoredMessage>>;

    /// Every message, oldest first
    async fn messages(&self, conversation_id: Uuid) -> Result<Vec<StoredMessage>>;
}

#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    /// Upsert the session's last-seen time
    async fn touch_session(&self, session_id: &str, at: DateTime<Utc>) -> Result<()>;

    async fn active_sessions_since(&self, since: DateTime<Utc>) -> Result<usize>;

    /// Add one to a named counter and return the new value
    async fn increment_counter(&self, name: &str) -> Result<i64>;

    async fn counter(&self, name: &str) -> Result<i64>;

    async fn record_event(&self, event: TrackedEvent) -> Result<()>;

    async fn events_since(&self, since: DateTime<Utc>) -> Result<Vec<TrackedEvent>>;

    /// Newest first
    async fn recent_events(&self, limit: usize) -> Result<Vec<TrackedEvent>>;

    async fn count_events(&self, event_type: &str) -> Result<usize>;
}

#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn save_contact(&self, record: ContactRecord) -> Result<()>;
}

#[async_trait]
pub trait MaintenanceStore: Send + Sync {
    async fn delete_messages_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;

    async fn delete_sessions_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;

    async fn delete_empty_conversations(&self) -> Result<usize>;

    async fn prune(
        &self,
        message_cutoff: DateTime<Utc>,
        session_cutoff: DateTime<Utc>,
    ) -> Result<CleanupReport> {
        Ok(CleanupReport {
            messages_deleted: self.delete_messages_before(message_cutoff).await?,
            sessions_cleaned: self.delete_sessions_before(session_cutoff).await?,
            conversations_deleted: self.delete_empty_conversations().await?,
        })
    }
}

/// Everything the HTTP layer needs from a backing store
pub trait Store: ConversationStore + AnalyticsStore + ContactStore + MaintenanceStore {}

impl<T> Store for T where T: ConversationStore + AnalyticsStore + ContactStore + MaintenanceStore {}
