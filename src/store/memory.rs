//! In-process store backed by `parking_lot` locks.

use std::collections::{HashMap, HashSet};

use crate::api::Role;
use crate::error::Result;
use crate::store::{
    AnalyticsStore, ContactRecord, ContactStore, ConversationStore, MaintenanceStore,
    StoredMessage, TrackedEvent,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Tables {
    /// session id -> conversation id
    conversations: HashMap<String, Uuid>,
    /// Insertion order is chronological
    messages: Vec<StoredMessage>,
    /// session id -> last seen
    active_sessions: HashMap<String, DateTime<Utc>>,
    counters: HashMap<String, i64>,
    events: Vec<TrackedEvent>,
    contacts: Vec<ContactRecord>,
}

/// Store that keeps every table in memory; contents die with the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Contact submissions saved so far
    pub fn contacts(&self) -> Vec<ContactRecord> {
        self.tables.read().contacts.clone()
    }

    pub fn conversation_count(&self) -> usize {
        self.tables.read().conversations.len()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn find_conversation(&self, session_id: &str) -> Result<Option<Uuid>> {
        Ok(self.tables.read().conversations.get(session_id).copied())
    }

    async fn create_conversation(&self, session_id: &str) -> Result<Uuid> {
        let mut tables = self.tables.write();
        let id = *tables
            .conversations
            .entry(session_id.to_string())
            .or_insert_with(Uuid::new_v4);
        Ok(id)
    }

    async fn append_message(
        &self,
        conversation_id: Uuid,
        role: Role,
        content: &str,
    ) -> Result<StoredMessage> {
        let message = StoredMessage {
            id: Uuid::new_v4(),
            conversation_id,
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        self.tables.write().messages.push(message.clone());
        Ok(message)
    }

    async fn recent_messages(
        &self,
        conversation_id: Uuid,
        limit: usize,
    ) -> Result<Vec<StoredMessage>> {
        let tables = self.tables.read();
        let mut recent: Vec<StoredMessage> = tables
            .messages
            .iter()
            .rev()
            .filter(|m| m.conversation_id == conversation_id)
            .take(limit)
            .cloned()
            .collect();
        recent.reverse();
        Ok(recent)
    }

    async fn messages(&self, conversation_id: Uuid) -> Result<Vec<StoredMessage>> {
        Ok(self
            .tables
            .read()
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AnalyticsStore for MemoryStore {
    async fn touch_session(&self, session_id: &str, at: DateTime<Utc>) -> Result<()> {
        self.tables
            .write()
            .active_sessions
            .insert(session_id.to_string(), at);
        Ok(())
    }

    async fn active_sessions_since(&self, since: DateTime<Utc>) -> Result<usize> {
        Ok(self
            .tables
            .read()
            .active_sessions
            .values()
            .filter(|&&seen| seen >= since)
            .count())
    }

    async fn increment_counter(&self, name: &str) -> Result<i64> {
        let mut tables = self.tables.write();
        let value = tables.counters.entry(name.to_string()).or_insert(0);
        *value += 1;
        Ok(*value)
    }

    async fn counter(&self, name: &str) -> Result<i64> {
        Ok(self.tables.read().counters.get(name).copied().unwrap_or(0))
    }

    async fn record_event(&self, event: TrackedEvent) -> Result<()> {
        self.tables.write().events.push(event);
        Ok(())
    }

    async fn events_since(&self, since: DateTime<Utc>) -> Result<Vec<TrackedEvent>> {
        Ok(self
            .tables
            .read()
            .events
            .iter()
            .filter(|e| e.created_at >= since)
            .cloned()
            .collect())
    }

    async fn recent_events(&self, limit: usize) -> Result<Vec<TrackedEvent>> {
        Ok(self
            .tables
            .read()
            .events
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count_events(&self, event_type: &str) -> Result<usize> {
        Ok(self
            .tables
            .read()
            .events
            .iter()
            .filter(|e| e.event_type == event_type)
            .count())
    }
}

#[async_trait]
impl ContactStore for MemoryStore {
    async fn save_contact(&self, record: ContactRecord) -> Result<()> {
        self.tables.write().contacts.push(record);
        Ok(())
    }
}

#[async_trait]
impl MaintenanceStore for MemoryStore {
    async fn delete_messages_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut tables = self.tables.write();
        let before = tables.messages.len();
        tables.messages.retain(|m| m.created_at >= cutoff);
        Ok(before - tables.messages.len())
    }

    async fn delete_sessions_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut tables = self.tables.write();
        let before = tables.active_sessions.len();
        tables.active_sessions.retain(|_, seen| *seen >= cutoff);
        Ok(before - tables.active_sessions.len())
    }

    async fn delete_empty_conversations(&self) -> Result<usize> {
        let mut tables = self.tables.write();
        let in_use: HashSet<Uuid> = tables.messages.iter().map(|m| m.conversation_id).collect();
        let before = tables.conversations.len();
        tables.conversations.retain(|_, id| in_use.contains(id));
        Ok(before - tables.conversations.len())
    }
}
