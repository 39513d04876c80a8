use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::userdtos::{validate_not_blank, FilterUserDto, DEFAULT_PAGE, DEFAULT_PAGE_SIZE};
use crate::{
    error::HttpError,
    models::ticketmodel::{
        TicketChanges, TicketFilter, TicketOrdering, TicketPriority, TicketStatus, TicketWithOwner,
    },
};

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateTicketDto {
    #[validate(
        length(min = 1, max = 255, message = "Title must be between 1 and 255 characters"),
        custom = "validate_not_blank"
    )]
    pub title: String,

    #[validate(
        length(min = 1, message = "Description is required"),
        custom = "validate_not_blank"
    )]
    pub description: String,

    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
}

/// Body of `PUT /tickets/{id}/`: title and description must be resent.
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateTicketDto {
    #[validate(
        length(min = 1, max = 255, message = "Title must be between 1 and 255 characters"),
        custom = "validate_not_blank"
    )]
    pub title: String,

    #[validate(
        length(min = 1, message = "Description is required"),
        custom = "validate_not_blank"
    )]
    pub description: String,

    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
}

/// Body of `PATCH /tickets/{id}/`.
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct PatchTicketDto {
    #[validate(
        length(min = 1, max = 255, message = "Title must be between 1 and 255 characters"),
        custom = "validate_not_blank"
    )]
    pub title: Option<String>,

    #[validate(custom = "validate_not_blank")]
    pub description: Option<String>,

    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
}

impl From<UpdateTicketDto> for TicketChanges {
    fn from(body: UpdateTicketDto) -> Self {
        TicketChanges {
            title: Some(body.title.trim().to_string()),
            description: Some(body.description.trim().to_string()),
            status: body.status,
            priority: body.priority,
        }
    }
}

impl From<PatchTicketDto> for TicketChanges {
    fn from(body: PatchTicketDto) -> Self {
        TicketChanges {
            title: body.title.map(|title| title.trim().to_string()),
            description: body.description.map(|description| description.trim().to_string()),
            status: body.status,
            priority: body.priority,
        }
    }
}

#[derive(Serialize, Deserialize, Validate, Debug, Default)]
pub struct TicketQueryDto {
    #[validate(range(min = 1, message = "Page must be at least 1"))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<u32>,
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

impl TicketQueryDto {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(DEFAULT_PAGE)
    }

    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    pub fn filter(&self) -> Result<TicketFilter, HttpError> {
        let ordering = match self.ordering.as_deref().map(str::trim) {
            None | Some("") => TicketOrdering::default(),
            Some(value) => TicketOrdering::parse(value).ok_or_else(|| {
                HttpError::validation(
                    "ordering",
                    format!("Unsupported ordering '{}'", value),
                )
            })?,
        };

        let search = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(TicketFilter {
            status: self.status,
            priority: self.priority,
            search,
            ordering,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TicketDto {
    pub id: Uuid,
    pub user: FilterUserDto,
    pub title: String,
    pub description: String,
    pub status: TicketStatus,
    pub status_display: String,
    pub priority: TicketPriority,
    pub priority_display: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TicketDto {
    pub fn filter_ticket(row: &TicketWithOwner) -> Self {
        let ticket = &row.ticket;

        TicketDto {
            id: ticket.id,
            user: FilterUserDto::from_parts(
                ticket.user_id,
                &row.owner_email,
                &row.owner_first_name,
                &row.owner_last_name,
                row.owner_role,
            ),
            title: ticket.title.clone(),
            description: ticket.description.clone(),
            status: ticket.status,
            status_display: ticket.status.label().to_string(),
            priority: ticket.priority,
            priority_display: ticket.priority.label().to_string(),
            created_at: ticket.created_at,
            updated_at: ticket.updated_at,
        }
    }

    pub fn filter_tickets(rows: &[TicketWithOwner]) -> Vec<TicketDto> {
        rows.iter().map(TicketDto::filter_ticket).collect()
    }
}
