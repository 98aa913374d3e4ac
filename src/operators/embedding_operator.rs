use chrono::Utc;
use diesel::prelude::*;

use crate::data::models::{Embedding, NewEmbedding, Pool};
use crate::errors::DefaultError;

// document_id is indexed but not unique, so re-embedding a document updates
// the existing row in place instead of relying on ON CONFLICT
pub fn upsert_embedding_query(
    embedding_document_id: &str,
    payload: serde_json::Value,
    pool: &Pool,
) -> Result<(), DefaultError> {
    use crate::data::schema::embeddings::dsl::*;

    let mut conn = pool.get().map_err(|_pool_error| DefaultError {
        message: "Could not get database connection",
    })?;

    let updated = diesel::update(embeddings.filter(document_id.eq(embedding_document_id)))
        .set((embedding.eq(&payload), updated_at.eq(Utc::now())))
        .execute(&mut conn)
        .map_err(|_db_error| DefaultError {
            message: "Error updating embedding",
        })?;

    if updated == 0 {
        let new_embedding = NewEmbedding::from_details(embedding_document_id, payload);

        diesel::insert_into(embeddings)
            .values(&new_embedding)
            .execute(&mut conn)
            .map_err(|_db_error| DefaultError {
                message: "Error inserting new embedding, try again",
            })?;
    }

    Ok(())
}

pub fn replace_all_embeddings_query(
    payloads: Vec<serde_json::Value>,
    pool: &Pool,
) -> Result<usize, DefaultError> {
    use crate::data::schema::embeddings::dsl::*;

    let mut conn = pool.get().map_err(|_pool_error| DefaultError {
        message: "Could not get database connection",
    })?;

    let new_embeddings: Vec<NewEmbedding> = payloads
        .into_iter()
        .enumerate()
        .map(|(index, payload)| NewEmbedding::from_details(format!("doc_{}", index), payload))
        .collect();

    conn.transaction::<usize, diesel::result::Error, _>(|conn| {
        diesel::delete(embeddings).execute(conn)?;
        diesel::insert_into(embeddings)
            .values(&new_embeddings)
            .execute(conn)
    })
    .map_err(|_db_error| DefaultError {
        message: "Error replacing embeddings",
    })
}

pub fn get_all_embeddings_query(pool: &Pool) -> Result<Vec<Embedding>, DefaultError> {
    use crate::data::schema::embeddings::dsl::*;

    let mut conn = pool.get().map_err(|_pool_error| DefaultError {
        message: "Could not get database connection",
    })?;

    embeddings
        .order(id.asc())
        .load::<Embedding>(&mut conn)
        .map_err(|_db_error| DefaultError {
            message: "Error getting embeddings",
        })
}

pub fn get_embedding_by_document_query(
    embedding_document_id: &str,
    pool: &Pool,
) -> Result<Option<Embedding>, DefaultError> {
    use crate::data::schema::embeddings::dsl::*;

    let mut conn = pool.get().map_err(|_pool_error| DefaultError {
        message: "Could not get database connection",
    })?;

    embeddings
        .filter(document_id.eq(embedding_document_id))
        .order(updated_at.desc())
        .first::<Embedding>(&mut conn)
        .optional()
        .map_err(|_db_error| DefaultError {
            message: "Error getting embedding for document",
        })
}

pub fn clear_embeddings_query(pool: &Pool) -> Result<usize, DefaultError> {
    use crate::data::schema::embeddings::dsl::*;

    let mut conn = pool.get().map_err(|_pool_error| DefaultError {
        message: "Could not get database connection",
    })?;

    diesel::delete(embeddings)
        .execute(&mut conn)
        .map_err(|_db_error| DefaultError {
            message: "Error clearing embeddings",
        })
}

pub fn get_embedding_count_query(pool: &Pool) -> Result<i64, DefaultError> {
    use crate::data::schema::embeddings::dsl::*;

    let mut conn = pool.get().map_err(|_pool_error| DefaultError {
        message: "Could not get database connection",
    })?;

    embeddings
        .count()
        .get_result::<i64>(&mut conn)
        .map_err(|_db_error| DefaultError {
            message: "Error counting embeddings",
        })
}
