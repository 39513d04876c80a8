use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use super::{offset, DBClient, DbError};
use crate::models::ticketmodel::{
    TicketChanges, TicketFilter, TicketOrderField, TicketPriority, TicketScope, TicketStatus,
    TicketWithOwner,
};

const TICKET_COLUMNS: &str = r#"
    t.*,
    u.email AS owner_email,
    u.first_name AS owner_first_name,
    u.last_name AS owner_last_name,
    u.role AS owner_role
"#;

#[async_trait]
pub trait TicketExt {
    async fn create_ticket(
        &self,
        user_id: Uuid,
        title: String,
        description: String,
        status: TicketStatus,
        priority: TicketPriority,
    ) -> Result<TicketWithOwner, DbError>;

    async fn get_ticket(&self, ticket_id: Uuid) -> Result<Option<TicketWithOwner>, DbError>;

    async fn get_tickets(
        &self,
        scope: TicketScope,
        filter: &TicketFilter,
        page: u32,
        limit: u32,
    ) -> Result<Vec<TicketWithOwner>, DbError>;

    async fn get_ticket_count(
        &self,
        scope: TicketScope,
        filter: &TicketFilter,
    ) -> Result<i64, DbError>;

    async fn update_ticket(
        &self,
        ticket_id: Uuid,
        changes: TicketChanges,
    ) -> Result<TicketWithOwner, DbError>;
}

/// Escapes LIKE wildcards so a search term matches literally.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn push_conditions(builder: &mut QueryBuilder<'_, Postgres>, scope: TicketScope, filter: &TicketFilter) {
    builder.push(" WHERE TRUE");

    if let TicketScope::OwnedBy(owner_id) = scope {
        builder.push(" AND t.user_id = ").push_bind(owner_id);
    }
    if let Some(status) = filter.status {
        builder.push(" AND t.status = ").push_bind(status);
    }
    if let Some(priority) = filter.priority {
        builder.push(" AND t.priority = ").push_bind(priority);
    }
    for term in filter.search_terms() {
        let pattern = like_pattern(term);
        builder
            .push(" AND (t.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR t.description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

#[async_trait]
impl TicketExt for DBClient {
    async fn create_ticket(
        &self,
        user_id: Uuid,
        title: String,
        description: String,
        status: TicketStatus,
        priority: TicketPriority,
    ) -> Result<TicketWithOwner, DbError> {
        let ticket = sqlx::query_as::<_, TicketWithOwner>(&format!(
            r#"
            WITH t AS (
                INSERT INTO tickets (user_id, title, description, status, priority)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
            )
            SELECT {TICKET_COLUMNS}
            FROM t JOIN users u ON u.id = t.user_id
            "#
        ))
        .bind(user_id)
        .bind(title)
        .bind(description)
        .bind(status)
        .bind(priority)
        .fetch_one(&self.pool)
        .await?;

        Ok(ticket)
    }

    async fn get_ticket(&self, ticket_id: Uuid) -> Result<Option<TicketWithOwner>, DbError> {
        let ticket = sqlx::query_as::<_, TicketWithOwner>(&format!(
            r#"
            SELECT {TICKET_COLUMNS}
            FROM tickets t JOIN users u ON u.id = t.user_id
            WHERE t.id = $1
            "#
        ))
        .bind(ticket_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(ticket)
    }

    async fn get_tickets(
        &self,
        scope: TicketScope,
        filter: &TicketFilter,
        page: u32,
        limit: u32,
    ) -> Result<Vec<TicketWithOwner>, DbError> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {TICKET_COLUMNS} FROM tickets t JOIN users u ON u.id = t.user_id"
        ));
        push_conditions(&mut builder, scope, filter);

        let column = match filter.ordering.field {
            TicketOrderField::CreatedAt => "t.created_at",
            TicketOrderField::UpdatedAt => "t.updated_at",
            TicketOrderField::Priority => "t.priority",
        };
        let direction = if filter.ordering.descending { "DESC" } else { "ASC" };

        builder
            .push(format!(" ORDER BY {column} {direction}, t.id {direction}"))
            .push(" LIMIT ")
            .push_bind(limit as i64)
            .push(" OFFSET ")
            .push_bind(offset(page, limit));

        let tickets = builder
            .build_query_as::<TicketWithOwner>()
            .fetch_all(&self.pool)
            .await?;

        Ok(tickets)
    }

    async fn get_ticket_count(
        &self,
        scope: TicketScope,
        filter: &TicketFilter,
    ) -> Result<i64, DbError> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM tickets t");
        push_conditions(&mut builder, scope, filter);

        let count = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn update_ticket(
        &self,
        ticket_id: Uuid,
        changes: TicketChanges,
    ) -> Result<TicketWithOwner, DbError> {
        let ticket = sqlx::query_as::<_, TicketWithOwner>(&format!(
            r#"
            WITH t AS (
                UPDATE tickets
                SET title = COALESCE($2, title),
                    description = COALESCE($3, description),
                    status = COALESCE($4, status),
                    priority = COALESCE($5, priority),
                    updated_at = NOW()
                WHERE id = $1
                RETURNING *
            )
            SELECT {TICKET_COLUMNS}
            FROM t JOIN users u ON u.id = t.user_id
            "#
        ))
        .bind(ticket_id)
        .bind(changes.title)
        .bind(changes.description)
        .bind(changes.status)
        .bind(changes.priority)
        .fetch_one(&self.pool)
        .await?;

        Ok(ticket)
    }
}
