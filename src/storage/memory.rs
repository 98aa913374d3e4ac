use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::config::Settings;
use crate::data::models::{
    Conversation, Embedding, MessageType, NewConversation, NewEmbedding, Session,
};
use crate::errors::DefaultError;
use crate::operators::conversation_operator::SMOKE_TEST_SESSION_ID;
use crate::storage::{Storage, StorageReport, StorageStats};

#[derive(Default)]
struct MemoryState {
    next_conversation_id: i64,
    next_session_id: i64,
    next_embedding_id: i64,
    conversations: HashMap<String, Vec<Conversation>>,
    sessions: HashMap<String, Session>,
    embeddings: Vec<Embedding>,
}

/// Fallback used when no DATABASE_URL is configured. Mirrors the postgres
/// semantics: unique session ids, the 'general' message type default, lazy
/// session expiry, and doc_{i} ids for bulk-saved embeddings.
pub struct MemoryStorage {
    settings: Settings,
    state: Mutex<MemoryState>,
}

impl MemoryStorage {
    pub fn new(settings: Settings) -> Self {
        MemoryStorage {
            settings,
            state: Mutex::new(MemoryState::default()),
        }
    }
}

fn clamp_limit(limit: i64) -> usize {
    limit.max(0) as usize
}

impl Storage for MemoryStorage {
    fn save_conversation(
        &self,
        new_conversation: NewConversation,
    ) -> Result<Conversation, DefaultError> {
        new_conversation.validate()?;

        let mut state = self.state.lock();
        state.next_conversation_id += 1;

        let conversation = Conversation {
            id: state.next_conversation_id,
            session_id: new_conversation.session_id.clone(),
            question: new_conversation.question,
            response: new_conversation.response,
            // the column default the database would apply
            message_type: Some(
                new_conversation
                    .message_type
                    .unwrap_or_else(|| MessageType::General.as_str().to_string()),
            ),
            confidence_score: new_conversation.confidence_score,
            metadata: new_conversation.metadata,
            created_at: Some(Utc::now()),
        };

        let history_limit = clamp_limit(self.settings.conversation_history_limit);
        let history = state
            .conversations
            .entry(new_conversation.session_id)
            .or_default();
        history.push(conversation.clone());
        if history.len() > history_limit {
            let excess = history.len() - history_limit;
            history.drain(..excess);
        }

        Ok(conversation)
    }

    fn get_conversations(
        &self,
        session_id: &str,
        limit: i64,
    ) -> Result<Vec<Conversation>, DefaultError> {
        let state = self.state.lock();
        let history = state
            .conversations
            .get(session_id)
            .cloned()
            .unwrap_or_default();
        Ok(history.into_iter().take(clamp_limit(limit)).collect())
    }

    fn search_conversations(
        &self,
        search: &str,
        limit: i64,
    ) -> Result<Vec<Conversation>, DefaultError> {
        let needle = search.to_lowercase();
        let state = self.state.lock();

        let mut matches: Vec<Conversation> = state
            .conversations
            .values()
            .flatten()
            .filter(|conversation| {
                conversation.question.to_lowercase().contains(&needle)
                    || conversation.response.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        matches.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        matches.truncate(clamp_limit(limit));

        Ok(matches)
    }

    fn save_session(
        &self,
        session_id: &str,
        session_data: serde_json::Value,
    ) -> Result<Session, DefaultError> {
        let now = Utc::now();
        let expires_at = now + chrono::Duration::minutes(self.settings.session_timeout_minutes);

        let mut state = self.state.lock();
        match state.sessions.get_mut(session_id) {
            Some(session) => {
                session.session_data = session_data;
                session.updated_at = Some(now);
                session.expires_at = Some(expires_at);
                Ok(session.clone())
            }
            None => {
                state.next_session_id += 1;
                let session = Session {
                    id: state.next_session_id,
                    session_id: session_id.to_string(),
                    session_data,
                    created_at: Some(now),
                    updated_at: Some(now),
                    expires_at: Some(expires_at),
                };
                state
                    .sessions
                    .insert(session_id.to_string(), session.clone());
                Ok(session)
            }
        }
    }

    fn get_session(&self, session_id: &str) -> Result<Option<Session>, DefaultError> {
        let mut state = self.state.lock();

        let expired = match state.sessions.get(session_id) {
            Some(session) => session.is_expired_at(Utc::now()),
            None => return Ok(None),
        };

        if expired {
            state.sessions.remove(session_id);
            return Ok(None);
        }

        Ok(state.sessions.get(session_id).cloned())
    }

    fn cleanup_expired_sessions(
        &self,
        expire_before: DateTime<Utc>,
    ) -> Result<usize, DefaultError> {
        let retention_cutoff =
            Utc::now() - chrono::Duration::days(self.settings.conversation_retention_days);

        let mut state = self.state.lock();

        let before = state.sessions.len();
        state.sessions.retain(|_, session| {
            session
                .expires_at
                .map(|expires_at| expires_at > expire_before)
                .unwrap_or(true)
        });
        let removed = before - state.sessions.len();

        for history in state.conversations.values_mut() {
            history.retain(|conversation| {
                conversation
                    .created_at
                    .map(|created_at| created_at >= retention_cutoff)
                    .unwrap_or(true)
            });
        }

        Ok(removed)
    }

    fn save_embeddings(&self, payloads: Vec<serde_json::Value>) -> Result<usize, DefaultError> {
        let mut state = self.state.lock();
        state.embeddings.clear();

        let now = Utc::now();
        for (index, payload) in payloads.into_iter().enumerate() {
            let new_embedding = NewEmbedding::from_details(format!("doc_{}", index), payload);
            state.next_embedding_id += 1;
            let embedding = Embedding {
                id: state.next_embedding_id,
                document_id: new_embedding.document_id,
                embedding: new_embedding.embedding,
                created_at: Some(now),
                updated_at: Some(now),
            };
            state.embeddings.push(embedding);
        }

        Ok(state.embeddings.len())
    }

    fn upsert_embedding(
        &self,
        document_id: &str,
        payload: serde_json::Value,
    ) -> Result<(), DefaultError> {
        let now = Utc::now();
        let mut state = self.state.lock();

        if let Some(embedding) = state
            .embeddings
            .iter_mut()
            .find(|embedding| embedding.document_id == document_id)
        {
            embedding.embedding = payload;
            embedding.updated_at = Some(now);
            return Ok(());
        }

        state.next_embedding_id += 1;
        let embedding = Embedding {
            id: state.next_embedding_id,
            document_id: document_id.to_string(),
            embedding: payload,
            created_at: Some(now),
            updated_at: Some(now),
        };
        state.embeddings.push(embedding);

        Ok(())
    }

    fn get_embeddings(&self) -> Result<Vec<Embedding>, DefaultError> {
        Ok(self.state.lock().embeddings.clone())
    }

    fn clear_embeddings(&self) -> Result<usize, DefaultError> {
        let mut state = self.state.lock();
        let removed = state.embeddings.len();
        state.embeddings.clear();
        Ok(removed)
    }

    fn seed_smoke_test(&self) -> Result<bool, DefaultError> {
        let already_seeded = {
            let state = self.state.lock();
            state
                .conversations
                .get(SMOKE_TEST_SESSION_ID)
                .map(|history| !history.is_empty())
                .unwrap_or(false)
        };

        if already_seeded {
            return Ok(false);
        }

        let seed = NewConversation::from_details(
            SMOKE_TEST_SESSION_ID,
            "test question",
            "test response",
            Some(MessageType::General),
            None,
            None,
        );
        self.save_conversation(seed)?;

        Ok(true)
    }

    fn verification_report(&self) -> Result<StorageReport, DefaultError> {
        let state = self.state.lock();
        Ok(StorageReport {
            embeddings: state.embeddings.len() as i64,
            conversations: state.conversations.values().map(Vec::len).sum::<usize>() as i64,
            sessions: state.sessions.len() as i64,
        })
    }

    fn get_stats(&self) -> Result<StorageStats, DefaultError> {
        let now = Utc::now();
        let week_ago = now - chrono::Duration::days(7);
        let state = self.state.lock();

        let total_conversations =
            state.conversations.values().map(Vec::len).sum::<usize>() as i64;

        let active_sessions = state
            .sessions
            .values()
            .filter(|session| !session.is_expired_at(now))
            .count() as i64;

        let recent_conversations = state
            .conversations
            .values()
            .flatten()
            .filter(|conversation| {
                conversation
                    .created_at
                    .map(|created_at| created_at > week_ago)
                    .unwrap_or(false)
            })
            .count() as i64;

        let mut type_counts: HashMap<String, i64> = HashMap::new();
        for conversation in state.conversations.values().flatten() {
            *type_counts
                .entry(conversation.kind().as_str().to_string())
                .or_insert(0) += 1;
        }
        let mut message_type_counts: Vec<(String, i64)> = type_counts.into_iter().collect();
        message_type_counts.sort_by(|left, right| left.0.cmp(&right.0));

        Ok(StorageStats {
            total_conversations,
            active_sessions,
            recent_conversations,
            message_type_counts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn storage() -> MemoryStorage {
        MemoryStorage::new(Settings::default())
    }

    #[test]
    fn seed_inserts_exactly_once() {
        let storage = storage();

        assert!(storage.seed_smoke_test().unwrap());
        assert!(!storage.seed_smoke_test().unwrap());
        assert!(!storage.seed_smoke_test().unwrap());

        let seeded = storage.get_conversations(SMOKE_TEST_SESSION_ID, 50).unwrap();
        assert_eq!(seeded.len(), 1);
        assert_eq!(seeded[0].session_id, SMOKE_TEST_SESSION_ID);
    }

    #[test]
    fn omitted_message_type_reads_back_general() {
        let storage = storage();
        let saved = storage
            .save_conversation(NewConversation::from_details(
                "s1", "hi", "hello", None, None, None,
            ))
            .unwrap();

        assert_eq!(saved.message_type.as_deref(), Some("general"));
        assert_eq!(saved.kind(), MessageType::General);
    }

    #[test]
    fn history_is_trimmed_to_the_configured_limit() {
        let mut settings = Settings::default();
        settings.conversation_history_limit = 3;
        let storage = MemoryStorage::new(settings);

        for i in 0..5 {
            storage
                .save_conversation(NewConversation::from_details(
                    "s1",
                    format!("question {}", i),
                    format!("response {}", i),
                    None,
                    None,
                    None,
                ))
                .unwrap();
        }

        let history = storage.get_conversations("s1", 50).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].question, "question 2");
        assert_eq!(history[2].question, "question 4");
    }

    #[test]
    fn saving_a_session_twice_updates_in_place() {
        let storage = storage();

        let first = storage
            .save_session("s1", json!({"step": 1}))
            .unwrap();
        let second = storage
            .save_session("s1", json!({"step": 2}))
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.session_data, json!({"step": 2}));
        assert_eq!(storage.verification_report().unwrap().sessions, 1);
    }

    #[test]
    fn expired_sessions_are_dropped_on_read() {
        let mut settings = Settings::default();
        settings.session_timeout_minutes = 0;
        let storage = MemoryStorage::new(settings);

        storage.save_session("s1", json!({})).unwrap();
        assert!(storage.get_session("s1").unwrap().is_none());
        assert_eq!(storage.verification_report().unwrap().sessions, 0);
    }

    #[test]
    fn live_sessions_survive_reads_and_sweeps() {
        let storage = storage();

        storage.save_session("s1", json!({"active": true})).unwrap();
        assert!(storage.get_session("s1").unwrap().is_some());

        let removed = storage.cleanup_expired_sessions(Utc::now()).unwrap();
        assert_eq!(removed, 0);
        assert!(storage.get_session("s1").unwrap().is_some());
    }

    #[test]
    fn cleanup_removes_sessions_expiring_before_the_cutoff() {
        let mut settings = Settings::default();
        settings.session_timeout_minutes = 0;
        let storage = MemoryStorage::new(settings);

        storage.save_session("s1", json!({})).unwrap();
        storage.save_session("s2", json!({})).unwrap();

        let removed = storage
            .cleanup_expired_sessions(Utc::now() + chrono::Duration::minutes(1))
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(storage.verification_report().unwrap().sessions, 0);
    }

    #[test]
    fn bulk_saved_embeddings_get_document_ids_by_position() {
        let storage = storage();

        let saved = storage
            .save_embeddings(vec![json!([0.1, 0.2]), json!([0.3, 0.4])])
            .unwrap();
        assert_eq!(saved, 2);

        let embeddings = storage.get_embeddings().unwrap();
        assert_eq!(embeddings[0].document_id, "doc_0");
        assert_eq!(embeddings[1].document_id, "doc_1");

        // a second bulk save replaces everything
        storage.save_embeddings(vec![json!([0.5])]).unwrap();
        assert_eq!(storage.get_embeddings().unwrap().len(), 1);
    }

    #[test]
    fn upserting_an_embedding_updates_in_place() {
        let storage = storage();

        storage.upsert_embedding("doc_a", json!([0.1])).unwrap();
        storage.upsert_embedding("doc_a", json!([0.9])).unwrap();

        let embeddings = storage.get_embeddings().unwrap();
        assert_eq!(embeddings.len(), 1);
        assert_eq!(embeddings[0].embedding, json!([0.9]));
    }

    #[test]
    fn search_matches_question_and_response_case_insensitively() {
        let storage = storage();
        storage
            .save_conversation(NewConversation::from_details(
                "s1",
                "What is Rust?",
                "A systems language",
                None,
                None,
                None,
            ))
            .unwrap();
        storage
            .save_conversation(NewConversation::from_details(
                "s2",
                "Favourite food?",
                "I like rustic bread",
                None,
                None,
                None,
            ))
            .unwrap();

        let matches = storage.search_conversations("RUST", 10).unwrap();
        assert_eq!(matches.len(), 2);

        let matches = storage.search_conversations("systems", 10).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].session_id, "s1");
    }

    #[test]
    fn stats_count_types_and_recency() {
        let storage = storage();
        storage
            .save_conversation(NewConversation::from_details(
                "s1",
                "hi",
                "hello",
                Some(MessageType::Greeting),
                None,
                None,
            ))
            .unwrap();
        storage
            .save_conversation(NewConversation::from_details(
                "s1", "more", "words", None, None, None,
            ))
            .unwrap();
        storage.save_session("s1", json!({})).unwrap();

        let stats = storage.get_stats().unwrap();
        assert_eq!(stats.total_conversations, 2);
        assert_eq!(stats.active_sessions, 1);
        assert_eq!(stats.recent_conversations, 2);
        assert_eq!(
            stats.message_type_counts,
            vec![("general".to_string(), 1), ("greeting".to_string(), 1)]
        );
    }

    #[test]
    fn verification_report_counts_all_three_families() {
        let storage = storage();
        storage.seed_smoke_test().unwrap();
        storage.save_session("s1", json!({})).unwrap();
        storage.save_embeddings(vec![json!([1.0])]).unwrap();

        let report = storage.verification_report().unwrap();
        assert_eq!(
            report,
            StorageReport {
                embeddings: 1,
                conversations: 1,
                sessions: 1,
            }
        );
    }
}
