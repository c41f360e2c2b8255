//! Admin accounts and bearer tokens.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use shared_types::{AdminToken, AdminUser};
use uuid::Uuid;

use super::{now_ms, ts_from_ms, uuid_from, Store};
use crate::error::StorageError;

impl Store {
    /// Create an admin account. Usernames are stored lowercased.
    pub fn create_admin(
        &self,
        username: &str,
        password_hash: &str,
        scope: shared_types::AdminScope,
        owner_username: Option<&str>,
    ) -> Result<AdminUser, StorageError> {
        let username = username.trim().to_lowercase();
        if username.is_empty() {
            return Err(StorageError::InvalidInput("empty username".into()));
        }
        self.with_tx(|tx| {
            let id = Uuid::new_v4();
            let created_at = now_ms();
            tx.execute(
                "INSERT INTO admin_users (id, username, password_hash, scope, owner_username, \
                 created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id.to_string(),
                    username,
                    password_hash,
                    scope.to_string(),
                    owner_username,
                    created_at,
                ],
            )
            .map_err(|e| match e.sqlite_error_code() {
                Some(ErrorCode::ConstraintViolation) => {
                    StorageError::InvalidInput("username already in use".into())
                }
                _ => StorageError::Sql(e),
            })?;
            load_admin(tx, "id = ?1", &id.to_string())?.ok_or(StorageError::NotFound("admin"))
        })
    }

    pub fn find_admin_by_username(
        &self,
        username: &str,
    ) -> Result<Option<AdminUser>, StorageError> {
        let username = username.trim().to_lowercase();
        self.with_conn(|conn| load_admin(conn, "username = ?1", &username))
    }

    pub fn count_admins(&self) -> Result<i64, StorageError> {
        self.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM admin_users", [], |r| r.get(0))?)
        })
    }

    /// Store a freshly minted bearer token for an admin.
    pub fn insert_token(
        &self,
        admin_id: Uuid,
        token: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<AdminToken, StorageError> {
        self.with_tx(|tx| {
            let id = Uuid::new_v4();
            let created_at = now_ms();
            tx.execute(
                "INSERT INTO admin_tokens (id, admin_id, token, created_at, expires_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    id.to_string(),
                    admin_id.to_string(),
                    token,
                    created_at,
                    expires_at.map(|t| t.timestamp_millis()),
                ],
            )?;
            Ok(AdminToken {
                id,
                admin_id,
                token: token.to_string(),
                created_at: ts_from_ms(created_at)?,
                expires_at,
            })
        })
    }

    /// Resolve a bearer token to its admin, rejecting expired tokens.
    pub fn find_valid_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<(AdminToken, AdminUser)>, StorageError> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, admin_id, token, created_at, expires_at FROM admin_tokens \
                     WHERE token = ?1",
                    params![token],
                    |r| {
                        Ok((
                            r.get::<_, String>(0)?,
                            r.get::<_, String>(1)?,
                            r.get::<_, String>(2)?,
                            r.get::<_, i64>(3)?,
                            r.get::<_, Option<i64>>(4)?,
                        ))
                    },
                )
                .optional()?;
            let Some((id, admin_id, token, created_at, expires_at)) = row else {
                return Ok(None);
            };
            let token = AdminToken {
                id: uuid_from(&id)?,
                admin_id: uuid_from(&admin_id)?,
                token,
                created_at: ts_from_ms(created_at)?,
                expires_at: expires_at.map(ts_from_ms).transpose()?,
            };
            if !token.is_valid_at(now) {
                return Ok(None);
            }
            let admin = load_admin(conn, "id = ?1", &token.admin_id.to_string())?
                .ok_or(StorageError::NotFound("admin"))?;
            Ok(Some((token, admin)))
        })
    }

    /// Drop tokens past their expiry.
    pub fn purge_expired_tokens(&self, now: DateTime<Utc>) -> Result<usize, StorageError> {
        self.with_tx(|tx| {
            Ok(tx.execute(
                "DELETE FROM admin_tokens WHERE expires_at IS NOT NULL AND expires_at <= ?1",
                params![now.timestamp_millis()],
            )?)
        })
    }
}

fn load_admin(
    conn: &Connection,
    where_clause: &str,
    param: &str,
) -> Result<Option<AdminUser>, StorageError> {
    let row = conn
        .query_row(
            &format!(
                "SELECT id, username, password_hash, scope, owner_username, created_at \
                 FROM admin_users WHERE {where_clause}"
            ),
            params![param],
            |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, String>(3)?,
                    r.get::<_, Option<String>>(4)?,
                    r.get::<_, i64>(5)?,
                ))
            },
        )
        .optional()?;
    let Some((id, username, password_hash, scope, owner_username, created_at)) = row else {
        return Ok(None);
    };
    Ok(Some(AdminUser {
        id: uuid_from(&id)?,
        username,
        password_hash,
        scope: scope
            .parse()
            .map_err(|_| StorageError::corrupt(format!("admin scope: {scope}")))?,
        owner_username,
        created_at: ts_from_ms(created_at)?,
    }))
}
