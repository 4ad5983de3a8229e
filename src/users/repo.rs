use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{
    NewUser, ProfileChanges, ProfileUpdate, ProfileUpdateRow, User, UserRow, UserWithSecret,
    UserWithSecretRow,
};
use crate::error::{is_unique_violation, AppError};

/// Persistence for user records. Implementations enforce email uniqueness and
/// report a duplicate as [`AppError::Conflict`].
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn find_with_secret_by_id(&self, id: Uuid) -> Result<Option<UserWithSecret>, AppError>;
    async fn find_with_secret_by_email(&self, email: &str)
        -> Result<Option<UserWithSecret>, AppError>;

    async fn create(&self, new_user: NewUser) -> Result<User, AppError>;
    /// `None` when no user has this id. The returned `previous_avatar` is read
    /// under the same row lock as the write, so concurrent updates each see
    /// the avatar they actually replaced.
    async fn update_profile(
        &self,
        id: Uuid,
        changes: ProfileChanges,
    ) -> Result<Option<ProfileUpdate>, AppError>;
    async fn set_password(&self, id: Uuid, password_hash: &str) -> Result<(), AppError>;
    async fn touch_last_active(&self, id: Uuid, at: OffsetDateTime) -> Result<(), AppError>;

    /// Writes only the reset columns; nothing else on the record is checked.
    async fn set_reset_token(
        &self,
        id: Uuid,
        digest: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), AppError>;

    /// Single conditional write: if a user holds `digest` with an expiry after
    /// `now`, store `password_hash`, clear both reset columns and return the
    /// user id. A token can therefore be consumed at most once.
    async fn consume_reset_token(
        &self,
        digest: &str,
        password_hash: &str,
        now: OffsetDateTime,
    ) -> Result<Option<Uuid>, AppError>;

    async fn delete(&self, id: Uuid) -> Result<(), AppError>;
}

const USER_COLUMNS: &str =
    "id, name, email, role, avatar, bio, last_active_at, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn map_unique(e: sqlx::Error) -> AppError {
    if is_unique_violation(&e) {
        AppError::Conflict("Email is already registered".into())
    } else {
        AppError::Database(e)
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(User::from))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(User::from))
    }

    async fn find_with_secret_by_id(&self, id: Uuid) -> Result<Option<UserWithSecret>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserWithSecretRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(UserWithSecret::from))
    }

    async fn find_with_secret_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserWithSecret>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = $1");
        let row = sqlx::query_as::<_, UserWithSecretRow>(&sql)
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(UserWithSecret::from))
    }

    async fn create(&self, new_user: NewUser) -> Result<User, AppError> {
        let sql = format!(
            r#"
            INSERT INTO users (name, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&new_user.name)
            .bind(&new_user.email)
            .bind(&new_user.password_hash)
            .bind(new_user.role.as_str())
            .fetch_one(&self.db)
            .await
            .map_err(map_unique)?;
        Ok(row.into())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        changes: ProfileChanges,
    ) -> Result<Option<ProfileUpdate>, AppError> {
        let (bio_present, bio) = match changes.bio {
            Some(bio) => (true, bio),
            None => (false, None),
        };
        let row = sqlx::query_as::<_, ProfileUpdateRow>(
            r#"
            UPDATE users u
               SET name = COALESCE($2, u.name),
                   email = COALESCE($3, u.email),
                   avatar = COALESCE($4, u.avatar),
                   bio = CASE WHEN $5 THEN $6 ELSE u.bio END,
                   updated_at = now()
              FROM (SELECT id, avatar FROM users WHERE id = $1 FOR UPDATE) old
             WHERE u.id = old.id
            RETURNING u.id, u.name, u.email, u.role, u.avatar, u.bio,
                      u.last_active_at, u.created_at, u.updated_at,
                      old.avatar AS previous_avatar
            "#,
        )
            .bind(id)
            .bind(changes.name)
            .bind(changes.email)
            .bind(changes.avatar)
            .bind(bio_present)
            .bind(bio)
            .fetch_optional(&self.db)
            .await
            .map_err(map_unique)?;
        Ok(row.map(ProfileUpdate::from))
    }

    async fn set_password(&self, id: Uuid, password_hash: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn touch_last_active(&self, id: Uuid, at: OffsetDateTime) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET last_active_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn set_reset_token(
        &self,
        id: Uuid,
        digest: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE users
               SET reset_token_hash = $2,
                   reset_token_expires_at = $3
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(digest)
        .bind(expires_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn consume_reset_token(
        &self,
        digest: &str,
        password_hash: &str,
        now: OffsetDateTime,
    ) -> Result<Option<Uuid>, AppError> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE users
               SET password_hash = $2,
                   reset_token_hash = NULL,
                   reset_token_expires_at = NULL,
                   updated_at = now()
             WHERE reset_token_hash = $1
               AND reset_token_expires_at > $3
            RETURNING id
            "#,
        )
        .bind(digest)
        .bind(password_hash)
        .bind(now)
        .fetch_optional(&self.db)
        .await?;
        Ok(id)
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}
