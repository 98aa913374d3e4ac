use chrono::{DateTime, Duration, Utc};

use crate::config::Settings;
use crate::data::models::{Conversation, Embedding, NewConversation, NewSession, Pool, Session};
use crate::errors::DefaultError;
use crate::operators::{conversation_operator, embedding_operator, session_operator};
use crate::storage::{Storage, StorageReport, StorageStats};

pub struct PgStorage {
    pool: Pool,
    settings: Settings,
}

impl PgStorage {
    pub fn new(pool: Pool, settings: Settings) -> Self {
        PgStorage { pool, settings }
    }
}

impl Storage for PgStorage {
    fn save_conversation(
        &self,
        new_conversation: NewConversation,
    ) -> Result<Conversation, DefaultError> {
        conversation_operator::create_conversation_query(new_conversation, &self.pool)
    }

    fn get_conversations(
        &self,
        session_id: &str,
        limit: i64,
    ) -> Result<Vec<Conversation>, DefaultError> {
        conversation_operator::get_conversations_for_session_query(session_id, limit, &self.pool)
    }

    fn search_conversations(
        &self,
        search: &str,
        limit: i64,
    ) -> Result<Vec<Conversation>, DefaultError> {
        conversation_operator::search_conversations_query(search, limit, &self.pool)
    }

    fn save_session(
        &self,
        session_id: &str,
        session_data: serde_json::Value,
    ) -> Result<Session, DefaultError> {
        let expires_at = Utc::now() + Duration::minutes(self.settings.session_timeout_minutes);
        let new_session =
            NewSession::from_details(session_id, session_data, Some(expires_at));
        session_operator::upsert_session_query(new_session, &self.pool)
    }

    fn get_session(&self, session_id: &str) -> Result<Option<Session>, DefaultError> {
        session_operator::get_session_query(session_id, &self.pool)
    }

    fn cleanup_expired_sessions(
        &self,
        expire_before: DateTime<Utc>,
    ) -> Result<usize, DefaultError> {
        let removed = session_operator::cleanup_expired_sessions_query(expire_before, &self.pool)?;

        let retention_cutoff =
            Utc::now() - Duration::days(self.settings.conversation_retention_days);
        conversation_operator::delete_conversations_before_query(retention_cutoff, &self.pool)?;

        Ok(removed)
    }

    fn save_embeddings(&self, payloads: Vec<serde_json::Value>) -> Result<usize, DefaultError> {
        embedding_operator::replace_all_embeddings_query(payloads, &self.pool)
    }

    fn upsert_embedding(
        &self,
        document_id: &str,
        payload: serde_json::Value,
    ) -> Result<(), DefaultError> {
        embedding_operator::upsert_embedding_query(document_id, payload, &self.pool)
    }

    fn get_embeddings(&self) -> Result<Vec<Embedding>, DefaultError> {
        embedding_operator::get_all_embeddings_query(&self.pool)
    }

    fn clear_embeddings(&self) -> Result<usize, DefaultError> {
        embedding_operator::clear_embeddings_query(&self.pool)
    }

    fn seed_smoke_test(&self) -> Result<bool, DefaultError> {
        conversation_operator::seed_conversation_query(&self.pool)
    }

    fn verification_report(&self) -> Result<StorageReport, DefaultError> {
        Ok(StorageReport {
            embeddings: embedding_operator::get_embedding_count_query(&self.pool)?,
            conversations: conversation_operator::get_conversation_count_query(&self.pool)?,
            sessions: session_operator::get_session_count_query(&self.pool)?,
        })
    }

    fn get_stats(&self) -> Result<StorageStats, DefaultError> {
        let week_ago = Utc::now() - Duration::days(7);

        Ok(StorageStats {
            total_conversations: conversation_operator::get_conversation_count_query(&self.pool)?,
            active_sessions: session_operator::get_active_session_count_query(&self.pool)?,
            recent_conversations: conversation_operator::get_recent_conversation_count_query(
                week_ago, &self.pool,
            )?,
            message_type_counts: conversation_operator::get_message_type_counts_query(&self.pool)?,
        })
    }
}
