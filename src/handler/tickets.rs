use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use super::messages::{create_message, get_messages};
use crate::{
    dtos::{
        CreateTicketDto, PaginatedResponse, PatchTicketDto, TicketDto, TicketQueryDto,
        UpdateTicketDto,
    },
    error::{ErrorMessage, HttpError},
    middleware::JWTAuthMiddleware,
    models::ticketmodel::{TicketChanges, TicketStatus},
    service::access::{AccessPolicy, Action, Actor, TicketContext, TicketPolicy},
    AppState,
};

pub fn tickets_handler() -> Router {
    Router::new()
        .route("/tickets/", get(get_tickets).post(create_ticket))
        .route(
            "/tickets/:ticket_id/",
            get(get_ticket).put(replace_ticket).patch(update_ticket),
        )
        .route(
            "/tickets/:ticket_id/messages/",
            get(get_messages).post(create_message),
        )
}

pub async fn get_tickets(
    Query(query_params): Query<TicketQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    query_params.validate()?;

    let policy = TicketPolicy;
    if !policy.can_act(Some(&auth.actor), Action::List) {
        return Err(HttpError::forbidden(ErrorMessage::PermissionDenied.to_string()));
    }

    let scope = policy.scope(&auth.actor);
    let filter = query_params.filter()?;
    let page = query_params.page();
    let limit = query_params.limit();

    let tickets = app_state
        .db_client
        .get_tickets(scope, &filter, page, limit)
        .await?;
    let ticket_count = app_state.db_client.get_ticket_count(scope, &filter).await?;

    Ok(Json(PaginatedResponse {
        count: ticket_count,
        page,
        limit,
        results: TicketDto::filter_tickets(&tickets),
    }))
}

pub async fn create_ticket(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddleware>,
    Json(body): Json<CreateTicketDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    let policy = TicketPolicy;
    if !policy.can_act(Some(&auth.actor), Action::Create) {
        return Err(HttpError::unauthorized(ErrorMessage::UserNotAuthenticated.to_string()));
    }

    let status = body.status.unwrap_or_default();
    policy.check_status(&auth.actor, status)?;

    let ticket = app_state
        .db_client
        .create_ticket(
            auth.actor.id,
            body.title.trim().to_string(),
            body.description.trim().to_string(),
            status,
            body.priority.unwrap_or_default(),
        )
        .await?;

    tracing::info!(actor = %auth.actor.id, ticket = %ticket.ticket.id, "ticket created");

    Ok((StatusCode::CREATED, Json(TicketDto::filter_ticket(&ticket))))
}

pub async fn get_ticket(
    Path(ticket_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let context = TicketContext::resolve(
        app_state.db_client.as_ref(),
        &TicketPolicy,
        &auth.actor,
        Action::Retrieve,
        ticket_id,
    )
    .await?;

    Ok(Json(TicketDto::filter_ticket(&context.ticket)))
}

pub async fn replace_ticket(
    Path(ticket_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddleware>,
    Json(body): Json<UpdateTicketDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    apply_changes(&app_state, &auth.actor, ticket_id, body.into()).await
}

pub async fn update_ticket(
    Path(ticket_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddleware>,
    Json(body): Json<PatchTicketDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    apply_changes(&app_state, &auth.actor, ticket_id, body.into()).await
}

async fn apply_changes(
    app_state: &AppState,
    actor: &Actor,
    ticket_id: Uuid,
    changes: TicketChanges,
) -> Result<Json<TicketDto>, HttpError> {
    let policy = TicketPolicy;
    let context = TicketContext::resolve(
        app_state.db_client.as_ref(),
        &policy,
        actor,
        Action::Update,
        ticket_id,
    )
    .await?;

    if let Some(status) = changes.status {
        policy.check_status(actor, status)?;
    }
    let closing = changes.status == Some(TicketStatus::Closed);

    let ticket = app_state
        .db_client
        .update_ticket(context.id(), changes)
        .await?;

    if closing {
        tracing::info!(actor = %actor.id, ticket = %ticket.ticket.id, "ticket closed");
    }

    Ok(Json(TicketDto::filter_ticket(&ticket)))
}
