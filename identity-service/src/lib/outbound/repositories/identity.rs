use std::str::FromStr;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::PgPool;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::identity::models::EmailAddress;
use crate::domain::identity::models::Identity;
use crate::domain::identity::models::IdentityId;
use crate::domain::identity::models::Role;
use crate::identity::errors::IdentityError;
use crate::identity::ports::IdentityRepository;

/// Postgres-backed credential store.
///
/// Email uniqueness rides the `identities_email_key` unique index on
/// `lower(email)`; a violated insert or update surfaces as
/// `EmailAlreadyExists` regardless of which request lost the race.
pub struct PostgresIdentityRepository {
    pool: PgPool,
}

impl PostgresIdentityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_identity(row: &PgRow) -> Result<Identity, IdentityError> {
        let id: Uuid = row.try_get("id").map_err(db_err)?;
        let email: String = row.try_get("email").map_err(db_err)?;
        let password_hash: String = row.try_get("password_hash").map_err(db_err)?;
        let role: String = row.try_get("role").map_err(db_err)?;
        let created_at: DateTime<Utc> = row.try_get("created_at").map_err(db_err)?;

        Ok(Identity {
            id: IdentityId(id),
            email: EmailAddress::new(email)?,
            password_hash,
            role: Role::from_str(&role)
                .map_err(|e| IdentityError::DatabaseError(e.to_string()))?,
            created_at,
        })
    }

    fn map_unique_violation(e: sqlx::Error) -> IdentityError {
        if let Some(db_error) = e.as_database_error() {
            if db_error.is_unique_violation() {
                return IdentityError::EmailAlreadyExists;
            }
        }
        IdentityError::DatabaseError(e.to_string())
    }
}

fn db_err(e: sqlx::Error) -> IdentityError {
    IdentityError::DatabaseError(e.to_string())
}

#[async_trait]
impl IdentityRepository for PostgresIdentityRepository {
    async fn insert(&self, identity: Identity) -> Result<Identity, IdentityError> {
        sqlx::query(
            r#"
            INSERT INTO identities (id, email, password_hash, role, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(identity.id.0)
        .bind(identity.email.as_str())
        .bind(identity.password_hash.as_str())
        .bind(identity.role.as_str())
        .bind(identity.created_at)
        .execute(&self.pool)
        .await
        .map_err(Self::map_unique_violation)?;

        Ok(identity)
    }

    async fn find_by_id(&self, id: &IdentityId) -> Result<Option<Identity>, IdentityError> {
        let row = sqlx::query(
            r#"
            SELECT id, email, password_hash, role, created_at
            FROM identities
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(Self::row_to_identity).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, IdentityError> {
        let row = sqlx::query(
            r#"
            SELECT id, email, password_hash, role, created_at
            FROM identities
            WHERE lower(email) = lower($1)
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(Self::row_to_identity).transpose()
    }

    async fn list(&self, search: Option<&str>) -> Result<Vec<Identity>, IdentityError> {
        let rows = sqlx::query(
            r#"
            SELECT id, email, password_hash, role, created_at
            FROM identities
            WHERE $1::text IS NULL OR email ILIKE '%' || $1 || '%'
            ORDER BY created_at DESC
            "#,
        )
        .bind(search)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(Self::row_to_identity).collect()
    }

    async fn count(&self) -> Result<u64, IdentityError> {
        let row = sqlx::query(r#"SELECT COUNT(*) AS count FROM identities"#)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;

        let count: i64 = row.try_get("count").map_err(db_err)?;

        Ok(count as u64)
    }

    async fn update(&self, identity: Identity) -> Result<Identity, IdentityError> {
        let result = sqlx::query(
            r#"
            UPDATE identities
            SET email = $2, password_hash = $3, role = $4
            WHERE id = $1
            "#,
        )
        .bind(identity.id.0)
        .bind(identity.email.as_str())
        .bind(identity.password_hash.as_str())
        .bind(identity.role.as_str())
        .execute(&self.pool)
        .await
        .map_err(Self::map_unique_violation)?;

        if result.rows_affected() == 0 {
            return Err(IdentityError::NotFound(identity.id.to_string()));
        }

        Ok(identity)
    }

    async fn delete(&self, id: &IdentityId) -> Result<(), IdentityError> {
        let result = sqlx::query(
            r#"
            DELETE FROM identities
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(IdentityError::NotFound(id.to_string()));
        }

        Ok(())
    }
}
