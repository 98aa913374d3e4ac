use diesel::{r2d2::ConnectionManager, Insertable, PgConnection, Queryable};
use serde::{Deserialize, Serialize};

use super::schema::*;
use crate::errors::DefaultError;

// type alias to use in multiple places
pub type Pool = diesel::r2d2::Pool<ConnectionManager<PgConnection>>;

pub const MAX_QUESTION_LENGTH: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Greeting,
    Professional,
    Personal,
    Feedback,
    #[default]
    General,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Greeting => "greeting",
            MessageType::Professional => "professional",
            MessageType::Personal => "personal",
            MessageType::Feedback => "feedback",
            MessageType::General => "general",
        }
    }

    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "greeting" => MessageType::Greeting,
            "professional" => MessageType::Professional,
            "personal" => MessageType::Personal,
            "feedback" => MessageType::Feedback,
            _ => MessageType::General,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Queryable, Clone)]
pub struct Conversation {
    pub id: i64,
    pub session_id: String,
    pub question: String,
    pub response: String,
    pub message_type: Option<String>,
    pub confidence_score: Option<f32>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Conversation {
    pub fn kind(&self) -> MessageType {
        self.message_type
            .as_deref()
            .map(MessageType::from_tag)
            .unwrap_or_default()
    }
}

#[derive(Debug, Serialize, Deserialize, Insertable, Clone)]
#[diesel(table_name = conversations)]
pub struct NewConversation {
    pub session_id: String,
    pub question: String,
    pub response: String,
    // None falls through to the column default 'general'
    pub message_type: Option<String>,
    pub confidence_score: Option<f32>,
    pub metadata: Option<serde_json::Value>,
}

impl NewConversation {
    pub fn from_details<S: Into<String>, T: Into<String>, U: Into<String>>(
        session_id: S,
        question: T,
        response: U,
        message_type: Option<MessageType>,
        confidence_score: Option<f32>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        NewConversation {
            session_id: session_id.into(),
            question: question.into(),
            response: response.into(),
            message_type: message_type.map(|message_type| message_type.as_str().to_string()),
            confidence_score,
            metadata,
        }
    }

    pub fn validate(&self) -> Result<(), DefaultError> {
        if self.question.trim().is_empty() {
            return Err(DefaultError {
                message: "Question must not be empty",
            });
        }
        if self.question.chars().count() > MAX_QUESTION_LENGTH {
            return Err(DefaultError {
                message: "Question must be at most 1000 characters",
            });
        }
        if let Some(score) = self.confidence_score {
            if !(0.0..=1.0).contains(&score) {
                return Err(DefaultError {
                    message: "Confidence score must be between 0.0 and 1.0",
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Queryable, Clone)]
pub struct Session {
    pub id: i64,
    pub session_id: String,
    pub session_data: serde_json::Value,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Session {
    // a session with no expiry never expires
    pub fn is_expired_at(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        self.expires_at
            .map(|expires_at| expires_at <= now)
            .unwrap_or(false)
    }
}

#[derive(Debug, Serialize, Deserialize, Insertable, Clone)]
#[diesel(table_name = sessions)]
pub struct NewSession {
    pub session_id: String,
    pub session_data: serde_json::Value,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl NewSession {
    pub fn from_details<S: Into<String>>(
        session_id: S,
        session_data: serde_json::Value,
        expires_at: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Self {
        NewSession {
            session_id: session_id.into(),
            session_data,
            expires_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Queryable, Clone)]
pub struct Embedding {
    pub id: i64,
    pub document_id: String,
    pub embedding: serde_json::Value,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Serialize, Deserialize, Insertable, Clone)]
#[diesel(table_name = embeddings)]
pub struct NewEmbedding {
    pub document_id: String,
    pub embedding: serde_json::Value,
}

impl NewEmbedding {
    pub fn from_details<S: Into<String>>(document_id: S, embedding: serde_json::Value) -> Self {
        NewEmbedding {
            document_id: document_id.into(),
            embedding,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unknown_message_type_tags_fall_back_to_general() {
        assert_eq!(MessageType::from_tag("greeting"), MessageType::Greeting);
        assert_eq!(MessageType::from_tag("feedback"), MessageType::Feedback);
        assert_eq!(MessageType::from_tag("banana"), MessageType::General);
        assert_eq!(MessageType::default(), MessageType::General);
    }

    #[test]
    fn message_type_tags_round_trip() {
        for message_type in [
            MessageType::Greeting,
            MessageType::Professional,
            MessageType::Personal,
            MessageType::Feedback,
            MessageType::General,
        ] {
            assert_eq!(MessageType::from_tag(message_type.as_str()), message_type);
        }
    }

    #[test]
    fn empty_questions_are_rejected() {
        let new_conversation =
            NewConversation::from_details("s1", "   ", "a response", None, None, None);
        assert!(new_conversation.validate().is_err());
    }

    #[test]
    fn oversized_questions_are_rejected() {
        let question = "q".repeat(MAX_QUESTION_LENGTH + 1);
        let new_conversation =
            NewConversation::from_details("s1", question, "a response", None, None, None);
        assert!(new_conversation.validate().is_err());
    }

    #[test]
    fn out_of_range_confidence_is_rejected() {
        let new_conversation = NewConversation::from_details(
            "s1",
            "a question",
            "a response",
            Some(MessageType::General),
            Some(1.5),
            None,
        );
        assert!(new_conversation.validate().is_err());

        let new_conversation = NewConversation::from_details(
            "s1",
            "a question",
            "a response",
            Some(MessageType::General),
            Some(0.5),
            None,
        );
        assert!(new_conversation.validate().is_ok());
    }

    #[test]
    fn sessions_without_expiry_never_expire() {
        let session = Session {
            id: 1,
            session_id: "s1".to_string(),
            session_data: serde_json::json!({}),
            created_at: None,
            updated_at: None,
            expires_at: None,
        };
        assert!(!session.is_expired_at(chrono::Utc::now()));
    }
}
