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

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::error::Error;
use std::fmt;
use tracing::info;

/// A user identity record, keyed by the provider's stable subject identifier.
#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub fullname: String,
    pub email: String,
    pub profile_pic: String,
}

#[derive(Debug)]
pub enum UserStoreError {
    DatabaseError(String),
}

impl fmt::Display for UserStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserStoreError::DatabaseError(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl Error for UserStoreError {}

impl User {
    /// Create or refresh the identity record for a subject identifier.
    ///
    /// Repeated logins for the same `id` update the profile fields in place,
    /// leaving exactly one row per subject.
    pub async fn upsert(
        pool: &PgPool,
        id: &str,
        fullname: &str,
        email: &str,
        profile_pic: &str,
    ) -> Result<Self, UserStoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, fullname, email, profile_pic)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET fullname = EXCLUDED.fullname,
                email = EXCLUDED.email,
                profile_pic = EXCLUDED.profile_pic
            RETURNING id, fullname, email, profile_pic
            "#,
        )
        .bind(id)
        .bind(fullname)
        .bind(email)
        .bind(profile_pic)
        .fetch_one(pool)
        .await
        .map_err(|e| UserStoreError::DatabaseError(e.to_string()))?;

        info!("Upserted identity record for subject {}", user.id);
        Ok(user)
    }

    pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Self>, UserStoreError> {
        sqlx::query_as::<_, User>(
            "SELECT id, fullname, email, profile_pic FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| UserStoreError::DatabaseError(e.to_string()))
    }
}
