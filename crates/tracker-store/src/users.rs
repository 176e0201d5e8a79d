use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use tracker_core::ids::UserId;
use tracker_core::time;

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

/// An owner identity as the store knows it. Authentication happens
/// upstream; this table only maps an opaque bearer token to a stable id.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserRow {
    pub id: UserId,
    pub email: String,
    pub token: String,
    pub created_at: String,
}

pub struct UserRepo {
    db: Database,
}

impl UserRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Register a new owner and issue a bearer token.
    /// Fails with Conflict if the email is already registered.
    #[instrument(skip(self), fields(email))]
    pub fn create(&self, email: &str) -> Result<UserRow, StoreError> {
        self.db.with_conn(|conn| {
            let existing: Option<String> = conn
                .query_row("SELECT id FROM users WHERE email = ?1", [email], |row| row.get(0))
                .ok();
            if existing.is_some() {
                return Err(StoreError::Conflict(format!("email already registered: {email}")));
            }

            let id = UserId::new();
            let token = format!("tkn_{}", Uuid::new_v4().simple());
            let now = time::now_ts();
            conn.execute(
                "INSERT INTO users (id, email, token, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id.as_str(), email, token, now],
            )?;

            Ok(UserRow {
                id,
                email: email.to_string(),
                token,
                created_at: now,
            })
        })
    }

    /// Get a user by id.
    #[instrument(skip(self), fields(user_id = %id))]
    pub fn get(&self, id: &UserId) -> Result<UserRow, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, email, token, created_at FROM users WHERE id = ?1")?;
            let mut rows = stmt.query([id.as_str()])?;
            match rows.next()? {
                Some(row) => row_to_user(row),
                None => Err(StoreError::NotFound(format!("user {id}"))),
            }
        })
    }

    /// Resolve a bearer token to its owner, if any.
    #[instrument(skip(self, token))]
    pub fn find_by_token(&self, token: &str) -> Result<Option<UserRow>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, email, token, created_at FROM users WHERE token = ?1")?;
            let mut rows = stmt.query([token])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_user(row)?)),
                None => Ok(None),
            }
        })
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> Result<UserRow, StoreError> {
    Ok(UserRow {
        id: UserId::from_raw(row_helpers::get::<String>(row, 0, "users", "id")?),
        email: row_helpers::get(row, 1, "users", "email")?,
        token: row_helpers::get(row, 2, "users", "token")?,
        created_at: row_helpers::get(row, 3, "users", "created_at")?,
    })
}
