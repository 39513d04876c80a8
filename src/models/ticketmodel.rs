use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use uuid::Uuid;

use super::usermodel::UserRole;

#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "ticket_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    #[default]
    Open,
    Pending,
    Closed,
}

impl TicketStatus {
    pub fn to_str(&self) -> &str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::Pending => "pending",
            TicketStatus::Closed => "closed",
        }
    }

    pub fn label(&self) -> &str {
        match self {
            TicketStatus::Open => "Open",
            TicketStatus::Pending => "Pending",
            TicketStatus::Closed => "Closed",
        }
    }
}

// Declaration order is the sort order, matching the postgres enum.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, PartialOrd, Ord)]
#[sqlx(type_name = "ticket_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TicketPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TicketPriority {
    pub fn to_str(&self) -> &str {
        match self {
            TicketPriority::Low => "low",
            TicketPriority::Medium => "medium",
            TicketPriority::High => "high",
        }
    }

    pub fn label(&self) -> &str {
        match self {
            TicketPriority::Low => "Low",
            TicketPriority::Medium => "Medium",
            TicketPriority::High => "High",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Ticket {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A ticket row joined with the columns needed to serialize its owner.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TicketWithOwner {
    #[sqlx(flatten)]
    pub ticket: Ticket,
    pub owner_email: String,
    pub owner_first_name: String,
    pub owner_last_name: String,
    pub owner_role: UserRole,
}

/// Fields a caller may change on an existing ticket. `None` leaves the column as is.
#[derive(Debug, Default, Clone)]
pub struct TicketChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketOrderField {
    CreatedAt,
    UpdatedAt,
    Priority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TicketOrdering {
    pub field: TicketOrderField,
    pub descending: bool,
}

impl Default for TicketOrdering {
    fn default() -> Self {
        TicketOrdering {
            field: TicketOrderField::CreatedAt,
            descending: true,
        }
    }
}

impl TicketOrdering {
    /// Parses `created_at`, `-updated_at`, `priority` and so on.
    pub fn parse(value: &str) -> Option<Self> {
        let (descending, name) = match value.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, value),
        };

        let field = match name {
            "created_at" => TicketOrderField::CreatedAt,
            "updated_at" => TicketOrderField::UpdatedAt,
            "priority" => TicketOrderField::Priority,
            _ => return None,
        };

        Some(TicketOrdering { field, descending })
    }
}

/// Which tickets a listing may return, decided by the access policy before the query runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketScope {
    All,
    OwnedBy(Uuid),
}

impl TicketScope {
    pub fn includes(&self, ticket: &Ticket) -> bool {
        match self {
            TicketScope::All => true,
            TicketScope::OwnedBy(owner_id) => ticket.user_id == *owner_id,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    pub search: Option<String>,
    pub ordering: TicketOrdering,
}

impl TicketFilter {
    /// Search words split on whitespace and commas. A ticket matches when every
    /// term appears in its title or its description.
    pub fn search_terms(&self) -> Vec<&str> {
        self.search
            .as_deref()
            .map(|search| {
                search
                    .split(|c: char| c.is_whitespace() || c == ',')
                    .filter(|term| !term.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}
