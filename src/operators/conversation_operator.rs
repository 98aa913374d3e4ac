use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::PgTextExpressionMethods;

use crate::data::models::{Conversation, MessageType, NewConversation, Pool};
use crate::errors::DefaultError;

pub const SMOKE_TEST_SESSION_ID: &str = "test-session";

pub fn create_conversation_query(
    new_conversation: NewConversation,
    pool: &Pool,
) -> Result<Conversation, DefaultError> {
    use crate::data::schema::conversations::dsl::*;

    new_conversation.validate()?;

    let mut conn = pool.get().map_err(|_pool_error| DefaultError {
        message: "Could not get database connection",
    })?;

    diesel::insert_into(conversations)
        .values(&new_conversation)
        .get_result::<Conversation>(&mut conn)
        .map_err(|_db_error| DefaultError {
            message: "Error inserting new conversation, try again",
        })
}

pub fn get_conversations_for_session_query(
    conversation_session_id: &str,
    limit: i64,
    pool: &Pool,
) -> Result<Vec<Conversation>, DefaultError> {
    use crate::data::schema::conversations::dsl::*;

    let mut conn = pool.get().map_err(|_pool_error| DefaultError {
        message: "Could not get database connection",
    })?;

    conversations
        .filter(session_id.eq(conversation_session_id))
        .order(created_at.asc())
        .limit(limit)
        .load::<Conversation>(&mut conn)
        .map_err(|_db_error| DefaultError {
            message: "Error getting conversations for session",
        })
}

pub fn get_conversations_by_type_query(
    conversation_type: MessageType,
    limit: i64,
    pool: &Pool,
) -> Result<Vec<Conversation>, DefaultError> {
    use crate::data::schema::conversations::dsl::*;

    let mut conn = pool.get().map_err(|_pool_error| DefaultError {
        message: "Could not get database connection",
    })?;

    conversations
        .filter(message_type.eq(conversation_type.as_str()))
        .order(created_at.desc())
        .limit(limit)
        .load::<Conversation>(&mut conn)
        .map_err(|_db_error| DefaultError {
            message: "Error getting conversations by type",
        })
}

pub fn search_conversations_query(
    search: &str,
    limit: i64,
    pool: &Pool,
) -> Result<Vec<Conversation>, DefaultError> {
    use crate::data::schema::conversations::dsl::*;

    let mut conn = pool.get().map_err(|_pool_error| DefaultError {
        message: "Could not get database connection",
    })?;

    let pattern = format!("%{}%", search);

    conversations
        .filter(
            question
                .ilike(pattern.clone())
                .or(response.ilike(pattern)),
        )
        .order(created_at.desc())
        .limit(limit)
        .load::<Conversation>(&mut conn)
        .map_err(|_db_error| DefaultError {
            message: "Error searching conversations",
        })
}

pub fn delete_conversations_before_query(
    cutoff: DateTime<Utc>,
    pool: &Pool,
) -> Result<usize, DefaultError> {
    use crate::data::schema::conversations::dsl::*;

    let mut conn = pool.get().map_err(|_pool_error| DefaultError {
        message: "Could not get database connection",
    })?;

    diesel::delete(conversations.filter(created_at.lt(cutoff)))
        .execute(&mut conn)
        .map_err(|_db_error| DefaultError {
            message: "Error deleting old conversations",
        })
}

pub fn get_conversation_count_query(pool: &Pool) -> Result<i64, DefaultError> {
    use crate::data::schema::conversations::dsl::*;

    let mut conn = pool.get().map_err(|_pool_error| DefaultError {
        message: "Could not get database connection",
    })?;

    conversations
        .count()
        .get_result::<i64>(&mut conn)
        .map_err(|_db_error| DefaultError {
            message: "Error counting conversations",
        })
}

pub fn get_recent_conversation_count_query(
    since: DateTime<Utc>,
    pool: &Pool,
) -> Result<i64, DefaultError> {
    use crate::data::schema::conversations::dsl::*;

    let mut conn = pool.get().map_err(|_pool_error| DefaultError {
        message: "Could not get database connection",
    })?;

    conversations
        .filter(created_at.gt(since))
        .count()
        .get_result::<i64>(&mut conn)
        .map_err(|_db_error| DefaultError {
            message: "Error counting recent conversations",
        })
}

pub fn get_message_type_counts_query(pool: &Pool) -> Result<Vec<(String, i64)>, DefaultError> {
    use crate::data::schema::conversations::dsl::*;

    let mut conn = pool.get().map_err(|_pool_error| DefaultError {
        message: "Could not get database connection",
    })?;

    let counts = conversations
        .group_by(message_type)
        .select((message_type, diesel::dsl::count_star()))
        .load::<(Option<String>, i64)>(&mut conn)
        .map_err(|_db_error| DefaultError {
            message: "Error counting conversations by type",
        })?;

    let mut counts: Vec<(String, i64)> = counts
        .into_iter()
        .map(|(tag, total)| {
            (
                tag.unwrap_or_else(|| MessageType::General.as_str().to_string()),
                total,
            )
        })
        .collect();
    counts.sort_by(|left, right| left.0.cmp(&right.0));

    Ok(counts)
}

// the smoke test row is seeded at most once, re-running provisioning is a no-op
pub fn seed_conversation_query(pool: &Pool) -> Result<bool, DefaultError> {
    use crate::data::schema::conversations::dsl::*;

    let mut conn = pool.get().map_err(|_pool_error| DefaultError {
        message: "Could not get database connection",
    })?;

    let existing: i64 = conversations
        .filter(session_id.eq(SMOKE_TEST_SESSION_ID))
        .count()
        .get_result(&mut conn)
        .map_err(|_db_error| DefaultError {
            message: "Error checking for smoke test conversation",
        })?;

    if existing > 0 {
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

    diesel::insert_into(conversations)
        .values(&seed)
        .execute(&mut conn)
        .map_err(|_db_error| DefaultError {
            message: "Error inserting smoke test conversation",
        })?;

    Ok(true)
}
