use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::usermodel::UserRole;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub is_admin_response: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MessageWithSender {
    #[sqlx(flatten)]
    pub message: Message,
    pub sender_email: String,
    pub sender_first_name: String,
    pub sender_last_name: String,
    pub sender_role: UserRole,
}

/// A message ready to be stored. Sender and flag are always filled in by the server.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub ticket_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub is_admin_response: bool,
}
