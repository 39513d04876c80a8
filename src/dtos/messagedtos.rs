use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::userdtos::FilterUserDto;
use crate::models::messagemodel::MessageWithSender;

/// Sender and `is_admin_response` are assigned by the server; extra input keys are ignored.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateMessageDto {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageDto {
    pub id: Uuid,
    pub ticket: Uuid,
    pub sender: FilterUserDto,
    pub content: String,
    pub is_admin_response: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MessageDto {
    pub fn filter_message(row: &MessageWithSender) -> Self {
        let message = &row.message;

        MessageDto {
            id: message.id,
            ticket: message.ticket_id,
            sender: FilterUserDto::from_parts(
                message.sender_id,
                &row.sender_email,
                &row.sender_first_name,
                &row.sender_last_name,
                row.sender_role,
            ),
            content: message.content.clone(),
            is_admin_response: message.is_admin_response,
            created_at: message.created_at,
            updated_at: message.updated_at,
        }
    }

    pub fn filter_messages(rows: &[MessageWithSender]) -> Vec<MessageDto> {
        rows.iter().map(MessageDto::filter_message).collect()
    }
}
