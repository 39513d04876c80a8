use async_trait::async_trait;
use uuid::Uuid;

use super::{classify, offset, DBClient, DbError};
use crate::models::usermodel::{NewUser, User, UserChanges};

#[async_trait]
pub trait UserExt {
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, DbError>;

    async fn get_users(&self, page: u32, limit: u32) -> Result<Vec<User>, DbError>;

    async fn get_user_count(&self) -> Result<i64, DbError>;

    /// All usernames starting with `prefix`, fetched in one query.
    async fn get_usernames_with_prefix(&self, prefix: &str) -> Result<Vec<String>, DbError>;

    async fn save_user(&self, user: NewUser) -> Result<User, DbError>;

    async fn update_user(&self, user_id: Uuid, changes: UserChanges) -> Result<User, DbError>;
}

#[async_trait]
impl UserExt for DBClient {
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, DbError> {
        let mut user: Option<User> = None;

        if let Some(user_id) = user_id {
            user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        } else if let Some(username) = username {
            user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;
        } else if let Some(email) = email {
            user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        }

        Ok(user)
    }

    async fn get_users(&self, page: u32, limit: u32) -> Result<Vec<User>, DbError> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users
            ORDER BY date_joined DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit as i64)
        .bind(offset(page, limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn get_user_count(&self) -> Result<i64, DbError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn get_usernames_with_prefix(&self, prefix: &str) -> Result<Vec<String>, DbError> {
        // left() instead of LIKE so `_` and `%` in the local-part stay literal
        let usernames: Vec<String> = sqlx::query_scalar(
            "SELECT username FROM users WHERE left(username, char_length($1)) = $1",
        )
        .bind(prefix)
        .fetch_all(&self.pool)
        .await?;

        Ok(usernames)
    }

    async fn save_user(&self, user: NewUser) -> Result<User, DbError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, username, first_name, last_name, password, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(user.email)
        .bind(user.username)
        .bind(user.first_name)
        .bind(user.last_name)
        .bind(user.password)
        .bind(user.role)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)
    }

    async fn update_user(&self, user_id: Uuid, changes: UserChanges) -> Result<User, DbError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                role = COALESCE($4, role),
                is_active = COALESCE($5, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(changes.first_name)
        .bind(changes.last_name)
        .bind(changes.role)
        .bind(changes.is_active)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }
}
