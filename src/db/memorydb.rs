//! In-process store used by the router tests. Mirrors the constraints and
//! orderings of the postgres schema closely enough for handler-level tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::{
    DbError, MessageExt, TicketExt, UserExt, USERS_EMAIL_KEY, USERS_USERNAME_KEY,
};
use crate::models::{
    messagemodel::{Message, MessageWithSender, NewMessage},
    ticketmodel::{
        Ticket, TicketChanges, TicketFilter, TicketOrderField, TicketPriority, TicketScope,
        TicketStatus, TicketWithOwner,
    },
    usermodel::{NewUser, User, UserChanges},
};

#[derive(Debug, Default)]
struct Tables {
    users: Vec<User>,
    tickets: Vec<Ticket>,
    messages: Vec<Message>,
    last_timestamp: Option<DateTime<Utc>>,
    stale_prefix_lookups: usize,
}

impl Tables {
    /// Strictly increasing timestamps keep newest-first orderings deterministic.
    fn tick(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_timestamp {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_timestamp = Some(now);
        now
    }

    fn owner_view(&self, ticket: &Ticket) -> Result<TicketWithOwner, DbError> {
        let owner = self
            .users
            .iter()
            .find(|u| u.id == ticket.user_id)
            .ok_or(DbError::Sqlx(sqlx::Error::RowNotFound))?;

        Ok(TicketWithOwner {
            ticket: ticket.clone(),
            owner_email: owner.email.clone(),
            owner_first_name: owner.first_name.clone(),
            owner_last_name: owner.last_name.clone(),
            owner_role: owner.role,
        })
    }

    fn sender_view(&self, message: &Message) -> Result<MessageWithSender, DbError> {
        let sender = self
            .users
            .iter()
            .find(|u| u.id == message.sender_id)
            .ok_or(DbError::Sqlx(sqlx::Error::RowNotFound))?;

        Ok(MessageWithSender {
            message: message.clone(),
            sender_email: sender.email.clone(),
            sender_first_name: sender.first_name.clone(),
            sender_last_name: sender.last_name.clone(),
            sender_role: sender.role,
        })
    }

    fn matching_tickets(&self, scope: TicketScope, filter: &TicketFilter) -> Vec<&Ticket> {
        let terms: Vec<String> = filter
            .search_terms()
            .into_iter()
            .map(str::to_lowercase)
            .collect();

        self.tickets
            .iter()
            .filter(|t| scope.includes(t))
            .filter(|t| filter.status.map_or(true, |s| t.status == s))
            .filter(|t| filter.priority.map_or(true, |p| t.priority == p))
            .filter(|t| {
                let title = t.title.to_lowercase();
                let description = t.description.to_lowercase();
                terms
                    .iter()
                    .all(|term| title.contains(term.as_str()) || description.contains(term.as_str()))
            })
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct MemoryDB {
    tables: Mutex<Tables>,
}

impl MemoryDB {
    pub fn new() -> Self {
        MemoryDB::default()
    }

    /// The next `count` prefix lookups report no usernames, as if a concurrent
    /// registration committed right after the lookup ran.
    pub fn with_stale_prefix_lookups(self, count: usize) -> Self {
        self.tables
            .lock()
            .expect("memory store poisoned")
            .stale_prefix_lookups = count;
        self
    }

    fn tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().expect("memory store poisoned")
    }
}

fn page_slice<T: Clone>(items: &[T], page: u32, limit: u32) -> Vec<T> {
    let start = (page.max(1) as usize - 1) * limit as usize;
    items.iter().skip(start).take(limit as usize).cloned().collect()
}

#[async_trait]
impl UserExt for MemoryDB {
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, DbError> {
        let tables = self.tables();
        let user = if let Some(user_id) = user_id {
            tables.users.iter().find(|u| u.id == user_id)
        } else if let Some(username) = username {
            tables.users.iter().find(|u| u.username == username)
        } else if let Some(email) = email {
            tables.users.iter().find(|u| u.email == email)
        } else {
            None
        };

        Ok(user.cloned())
    }

    async fn get_users(&self, page: u32, limit: u32) -> Result<Vec<User>, DbError> {
        let tables = self.tables();
        let mut users = tables.users.clone();
        users.sort_by(|a, b| b.date_joined.cmp(&a.date_joined));

        Ok(page_slice(&users, page, limit))
    }

    async fn get_user_count(&self) -> Result<i64, DbError> {
        Ok(self.tables().users.len() as i64)
    }

    async fn get_usernames_with_prefix(&self, prefix: &str) -> Result<Vec<String>, DbError> {
        let mut tables = self.tables();
        if tables.stale_prefix_lookups > 0 {
            tables.stale_prefix_lookups -= 1;
            return Ok(Vec::new());
        }

        Ok(tables
            .users
            .iter()
            .filter(|u| u.username.starts_with(prefix))
            .map(|u| u.username.clone())
            .collect())
    }

    async fn save_user(&self, user: NewUser) -> Result<User, DbError> {
        let mut tables = self.tables();

        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(DbError::UniqueViolation {
                constraint: USERS_EMAIL_KEY.to_string(),
            });
        }
        if tables.users.iter().any(|u| u.username == user.username) {
            return Err(DbError::UniqueViolation {
                constraint: USERS_USERNAME_KEY.to_string(),
            });
        }

        let now = tables.tick();
        let user = User {
            id: Uuid::new_v4(),
            email: user.email,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            password: user.password,
            role: user.role,
            is_active: true,
            date_joined: now,
            updated_at: now,
        };
        tables.users.push(user.clone());

        Ok(user)
    }

    async fn update_user(&self, user_id: Uuid, changes: UserChanges) -> Result<User, DbError> {
        let mut tables = self.tables();
        let now = tables.tick();
        let user = tables
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or(DbError::Sqlx(sqlx::Error::RowNotFound))?;

        if let Some(first_name) = changes.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = changes.last_name {
            user.last_name = last_name;
        }
        if let Some(role) = changes.role {
            user.role = role;
        }
        if let Some(is_active) = changes.is_active {
            user.is_active = is_active;
        }
        user.updated_at = now;

        Ok(user.clone())
    }
}

#[async_trait]
impl TicketExt for MemoryDB {
    async fn create_ticket(
        &self,
        user_id: Uuid,
        title: String,
        description: String,
        status: TicketStatus,
        priority: TicketPriority,
    ) -> Result<TicketWithOwner, DbError> {
        let mut tables = self.tables();
        let now = tables.tick();
        let ticket = Ticket {
            id: Uuid::new_v4(),
            user_id,
            title,
            description,
            status,
            priority,
            created_at: now,
            updated_at: now,
        };
        let view = tables.owner_view(&ticket)?;
        tables.tickets.push(ticket);

        Ok(view)
    }

    async fn get_ticket(&self, ticket_id: Uuid) -> Result<Option<TicketWithOwner>, DbError> {
        let tables = self.tables();
        match tables.tickets.iter().find(|t| t.id == ticket_id) {
            Some(ticket) => Ok(Some(tables.owner_view(ticket)?)),
            None => Ok(None),
        }
    }

    async fn get_tickets(
        &self,
        scope: TicketScope,
        filter: &TicketFilter,
        page: u32,
        limit: u32,
    ) -> Result<Vec<TicketWithOwner>, DbError> {
        let tables = self.tables();
        let mut tickets: Vec<Ticket> = tables
            .matching_tickets(scope, filter)
            .into_iter()
            .cloned()
            .collect();

        tickets.sort_by(|a, b| {
            let ordering = match filter.ordering.field {
                TicketOrderField::CreatedAt => a.created_at.cmp(&b.created_at),
                TicketOrderField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
                TicketOrderField::Priority => a
                    .priority
                    .cmp(&b.priority)
                    .then(a.created_at.cmp(&b.created_at)),
            };
            if filter.ordering.descending {
                ordering.reverse()
            } else {
                ordering
            }
        });

        page_slice(&tickets, page, limit)
            .iter()
            .map(|t| tables.owner_view(t))
            .collect()
    }

    async fn get_ticket_count(
        &self,
        scope: TicketScope,
        filter: &TicketFilter,
    ) -> Result<i64, DbError> {
        Ok(self.tables().matching_tickets(scope, filter).len() as i64)
    }

    async fn update_ticket(
        &self,
        ticket_id: Uuid,
        changes: TicketChanges,
    ) -> Result<TicketWithOwner, DbError> {
        let mut tables = self.tables();
        let now = tables.tick();
        let ticket = tables
            .tickets
            .iter_mut()
            .find(|t| t.id == ticket_id)
            .ok_or(DbError::Sqlx(sqlx::Error::RowNotFound))?;

        if let Some(title) = changes.title {
            ticket.title = title;
        }
        if let Some(description) = changes.description {
            ticket.description = description;
        }
        if let Some(status) = changes.status {
            ticket.status = status;
        }
        if let Some(priority) = changes.priority {
            ticket.priority = priority;
        }
        ticket.updated_at = now;

        let ticket = ticket.clone();
        tables.owner_view(&ticket)
    }
}

#[async_trait]
impl MessageExt for MemoryDB {
    async fn add_ticket_message(&self, message: NewMessage) -> Result<MessageWithSender, DbError> {
        let mut tables = self.tables();
        let now = tables.tick();
        let message = Message {
            id: Uuid::new_v4(),
            ticket_id: message.ticket_id,
            sender_id: message.sender_id,
            content: message.content,
            is_admin_response: message.is_admin_response,
            created_at: now,
            updated_at: now,
        };
        let view = tables.sender_view(&message)?;
        tables.messages.push(message);

        Ok(view)
    }

    async fn get_ticket_messages(
        &self,
        ticket_id: Uuid,
        page: u32,
        limit: u32,
    ) -> Result<Vec<MessageWithSender>, DbError> {
        let tables = self.tables();
        let mut messages: Vec<Message> = tables
            .messages
            .iter()
            .filter(|m| m.ticket_id == ticket_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        page_slice(&messages, page, limit)
            .iter()
            .map(|m| tables.sender_view(m))
            .collect()
    }

    async fn get_ticket_message_count(&self, ticket_id: Uuid) -> Result<i64, DbError> {
        Ok(self
            .tables()
            .messages
            .iter()
            .filter(|m| m.ticket_id == ticket_id)
            .count() as i64)
    }
}
