use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{CreateMessageDto, MessageDto, PaginatedResponse, RequestQueryDto},
    error::HttpError,
    middleware::JWTAuthMiddleware,
    models::messagemodel::NewMessage,
    service::access::{Action, MessagePolicy, TicketContext},
    AppState,
};

pub async fn get_messages(
    Path(ticket_id): Path<Uuid>,
    Query(query_params): Query<RequestQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    query_params.validate()?;

    let context = TicketContext::resolve(
        app_state.db_client.as_ref(),
        &MessagePolicy,
        &auth.actor,
        Action::List,
        ticket_id,
    )
    .await?;

    let page = query_params.page();
    let limit = query_params.limit();

    let messages = app_state
        .db_client
        .get_ticket_messages(context.id(), page, limit)
        .await?;
    let message_count = app_state
        .db_client
        .get_ticket_message_count(context.id())
        .await?;

    Ok(Json(PaginatedResponse {
        count: message_count,
        page,
        limit,
        results: MessageDto::filter_messages(&messages),
    }))
}

pub async fn create_message(
    Path(ticket_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddleware>,
    Json(body): Json<CreateMessageDto>,
) -> Result<impl IntoResponse, HttpError> {
    let policy = MessagePolicy;
    let context = TicketContext::resolve(
        app_state.db_client.as_ref(),
        &policy,
        &auth.actor,
        Action::Create,
        ticket_id,
    )
    .await?;

    policy.check_content(&body.content)?;

    let message = app_state
        .db_client
        .add_ticket_message(NewMessage {
            ticket_id: context.id(),
            sender_id: auth.actor.id,
            content: body.content.trim().to_string(),
            is_admin_response: policy.admin_response_flag(&auth.actor),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(MessageDto::filter_message(&message))))
}
