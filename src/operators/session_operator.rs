use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::data::models::{NewSession, Pool, Session};
use crate::errors::DefaultError;

pub fn upsert_session_query(
    new_session: NewSession,
    pool: &Pool,
) -> Result<Session, DefaultError> {
    use crate::data::schema::sessions::dsl::*;

    let mut conn = pool.get().map_err(|_pool_error| DefaultError {
        message: "Could not get database connection",
    })?;

    diesel::insert_into(sessions)
        .values(&new_session)
        .on_conflict(session_id)
        .do_update()
        .set((
            session_data.eq(&new_session.session_data),
            updated_at.eq(Utc::now()),
            expires_at.eq(new_session.expires_at),
        ))
        .get_result::<Session>(&mut conn)
        .map_err(|_db_error| DefaultError {
            message: "Error upserting session, try again",
        })
}

// expiry is advisory: an expired row is dropped when it is read, nothing
// sweeps in the background
pub fn get_session_query(
    lookup_session_id: &str,
    pool: &Pool,
) -> Result<Option<Session>, DefaultError> {
    use crate::data::schema::sessions::dsl::*;

    let mut conn = pool.get().map_err(|_pool_error| DefaultError {
        message: "Could not get database connection",
    })?;

    let session_result = sessions
        .filter(session_id.eq(lookup_session_id))
        .first::<Session>(&mut conn)
        .optional()
        .map_err(|_db_error| DefaultError {
            message: "Error getting session",
        })?;

    let session = match session_result {
        Some(session) => session,
        None => return Ok(None),
    };

    if session.is_expired_at(Utc::now()) {
        diesel::delete(sessions.filter(session_id.eq(lookup_session_id)))
            .execute(&mut conn)
            .map_err(|_db_error| DefaultError {
                message: "Error deleting expired session",
            })?;
        return Ok(None);
    }

    Ok(Some(session))
}

pub fn delete_session_query(lookup_session_id: &str, pool: &Pool) -> Result<(), DefaultError> {
    use crate::data::schema::sessions::dsl::*;

    let mut conn = pool.get().map_err(|_pool_error| DefaultError {
        message: "Could not get database connection",
    })?;

    diesel::delete(sessions.filter(session_id.eq(lookup_session_id)))
        .execute(&mut conn)
        .map_err(|_db_error| DefaultError {
            message: "Error deleting session",
        })?;

    Ok(())
}

pub fn cleanup_expired_sessions_query(
    expire_before: DateTime<Utc>,
    pool: &Pool,
) -> Result<usize, DefaultError> {
    use crate::data::schema::sessions::dsl::*;

    let mut conn = pool.get().map_err(|_pool_error| DefaultError {
        message: "Could not get database connection",
    })?;

    diesel::delete(sessions.filter(expires_at.le(expire_before)))
        .execute(&mut conn)
        .map_err(|_db_error| DefaultError {
            message: "Error cleaning up expired sessions",
        })
}

pub fn get_active_session_count_query(pool: &Pool) -> Result<i64, DefaultError> {
    use crate::data::schema::sessions::dsl::*;

    let mut conn = pool.get().map_err(|_pool_error| DefaultError {
        message: "Could not get database connection",
    })?;

    sessions
        .filter(expires_at.is_null().or(expires_at.gt(Utc::now())))
        .count()
        .get_result::<i64>(&mut conn)
        .map_err(|_db_error| DefaultError {
            message: "Error counting active sessions",
        })
}

pub fn get_session_count_query(pool: &Pool) -> Result<i64, DefaultError> {
    use crate::data::schema::sessions::dsl::*;

    let mut conn = pool.get().map_err(|_pool_error| DefaultError {
        message: "Could not get database connection",
    })?;

    sessions
        .count()
        .get_result::<i64>(&mut conn)
        .map_err(|_db_error| DefaultError {
            message: "Error counting sessions",
        })
}
