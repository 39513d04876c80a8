use async_trait::async_trait;
use uuid::Uuid;

use super::{offset, DBClient, DbError};
use crate::models::messagemodel::{MessageWithSender, NewMessage};

const MESSAGE_COLUMNS: &str = r#"
    m.*,
    u.email AS sender_email,
    u.first_name AS sender_first_name,
    u.last_name AS sender_last_name,
    u.role AS sender_role
"#;

#[async_trait]
pub trait MessageExt {
    async fn add_ticket_message(&self, message: NewMessage) -> Result<MessageWithSender, DbError>;

    /// Newest first.
    async fn get_ticket_messages(
        &self,
        ticket_id: Uuid,
        page: u32,
        limit: u32,
    ) -> Result<Vec<MessageWithSender>, DbError>;

    async fn get_ticket_message_count(&self, ticket_id: Uuid) -> Result<i64, DbError>;
}

#[async_trait]
impl MessageExt for DBClient {
    async fn add_ticket_message(&self, message: NewMessage) -> Result<MessageWithSender, DbError> {
        let message = sqlx::query_as::<_, MessageWithSender>(&format!(
            r#"
            WITH m AS (
                INSERT INTO messages (ticket_id, sender_id, content, is_admin_response)
                VALUES ($1, $2, $3, $4)
                RETURNING *
            )
            SELECT {MESSAGE_COLUMNS}
            FROM m JOIN users u ON u.id = m.sender_id
            "#
        ))
        .bind(message.ticket_id)
        .bind(message.sender_id)
        .bind(message.content)
        .bind(message.is_admin_response)
        .fetch_one(&self.pool)
        .await?;

        Ok(message)
    }

    async fn get_ticket_messages(
        &self,
        ticket_id: Uuid,
        page: u32,
        limit: u32,
    ) -> Result<Vec<MessageWithSender>, DbError> {
        let messages = sqlx::query_as::<_, MessageWithSender>(&format!(
            r#"
            SELECT {MESSAGE_COLUMNS}
            FROM messages m JOIN users u ON u.id = m.sender_id
            WHERE m.ticket_id = $1
            ORDER BY m.created_at DESC, m.id DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(ticket_id)
        .bind(limit as i64)
        .bind(offset(page, limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    async fn get_ticket_message_count(&self, ticket_id: Uuid) -> Result<i64, DbError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE ticket_id = $1")
            .bind(ticket_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
