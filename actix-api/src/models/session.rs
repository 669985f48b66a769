/*
 * Copyright 2025 Security Union LLC
 *
 * Licensed under either of
 *
 * * Apache License, Version 2.0
 *   (http://www.apache.org/licenses/LICENSE-2.0)
 * * MIT license
 *   (http://opensource.org/licenses/MIT)
 *
 * at your option.
 *
 * Unless you explicitly state otherwise, any contribution intentionally
 * submitted for inclusion in the work by you, as defined in the Apache-2.0
 * license, shall be dual licensed as above, without any additional terms or
 * conditions.
 */

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::error::Error;
use std::fmt;
use uuid::Uuid;

/// How long a login session is remembered. Sliding: every successful lookup
/// pushes the expiry forward by the full duration again.
pub const REMEMBER_DAYS: i64 = 1;

/// A server-side login session. The row id travels in the `session` cookie;
/// everything else stays in the database.
#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug)]
pub enum SessionError {
    DatabaseError(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::DatabaseError(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl Error for SessionError {}

impl Session {
    /// Mark the given identity as logged in: insert a fresh session row with
    /// a random id and a `REMEMBER_DAYS` expiry.
    pub async fn create(pool: &PgPool, user_id: &str) -> Result<Self, SessionError> {
        let id = Uuid::new_v4().to_string();
        let expires_at = Utc::now() + Duration::days(REMEMBER_DAYS);

        sqlx::query_as::<_, Session>(
            "INSERT INTO sessions (id, user_id, expires_at)
             VALUES ($1, $2, $3)
             RETURNING id, user_id, expires_at",
        )
        .bind(&id)
        .bind(user_id)
        .bind(expires_at)
        .fetch_one(pool)
        .await
        .map_err(|e| SessionError::DatabaseError(e.to_string()))
    }

    /// Look up a live session by cookie value, sliding its expiry forward.
    ///
    /// Expired rows are treated as absent; they are left for external cleanup
    /// since the system itself never deletes identity data.
    pub async fn find_valid(pool: &PgPool, id: &str) -> Result<Option<Self>, SessionError> {
        sqlx::query_as::<_, Session>(
            "UPDATE sessions SET expires_at = $2
             WHERE id = $1 AND expires_at > NOW()
             RETURNING id, user_id, expires_at",
        )
        .bind(id)
        .bind(Utc::now() + Duration::days(REMEMBER_DAYS))
        .fetch_optional(pool)
        .await
        .map_err(|e| SessionError::DatabaseError(e.to_string()))
    }

    /// Clear the authenticated marker for a session id.
    pub async fn delete(pool: &PgPool, id: &str) -> Result<(), SessionError> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .map_err(|e| SessionError::DatabaseError(e.to_string()))?;
        Ok(())
    }
}
