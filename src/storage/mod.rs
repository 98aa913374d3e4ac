pub mod memory;
pub mod pg;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::data::models::{Conversation, Embedding, NewConversation, Session};
use crate::errors::DefaultError;

/// Row counts across the three tables, the script-level smoke check.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct StorageReport {
    pub embeddings: i64,
    pub conversations: i64,
    pub sessions: i64,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct StorageStats {
    pub total_conversations: i64,
    pub active_sessions: i64,
    pub recent_conversations: i64,
    pub message_type_counts: Vec<(String, i64)>,
}

pub trait Storage: Send + Sync {
    fn save_conversation(
        &self,
        new_conversation: NewConversation,
    ) -> Result<Conversation, DefaultError>;

    fn get_conversations(
        &self,
        session_id: &str,
        limit: i64,
    ) -> Result<Vec<Conversation>, DefaultError>;

    fn search_conversations(
        &self,
        search: &str,
        limit: i64,
    ) -> Result<Vec<Conversation>, DefaultError>;

    fn save_session(
        &self,
        session_id: &str,
        session_data: serde_json::Value,
    ) -> Result<Session, DefaultError>;

    fn get_session(&self, session_id: &str) -> Result<Option<Session>, DefaultError>;

    /// Manual sweep for advisory expiry. Also prunes conversations past the
    /// retention window. Callers decide when, nothing schedules this.
    fn cleanup_expired_sessions(&self, expire_before: DateTime<Utc>)
        -> Result<usize, DefaultError>;

    fn save_embeddings(&self, payloads: Vec<serde_json::Value>) -> Result<usize, DefaultError>;

    fn upsert_embedding(
        &self,
        document_id: &str,
        payload: serde_json::Value,
    ) -> Result<(), DefaultError>;

    fn get_embeddings(&self) -> Result<Vec<Embedding>, DefaultError>;

    fn clear_embeddings(&self) -> Result<usize, DefaultError>;

    /// Returns true when the smoke test row was inserted, false when it was
    /// already present.
    fn seed_smoke_test(&self) -> Result<bool, DefaultError>;

    fn verification_report(&self) -> Result<StorageReport, DefaultError>;

    fn get_stats(&self) -> Result<StorageStats, DefaultError>;
}
