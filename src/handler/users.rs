//13
use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    middleware,
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{
        FilterUserDto, NameUpdateDto, PaginatedResponse, ProfilePatchDto, RequestQueryDto,
        UserUpdateDto,
    },
    error::{ErrorMessage, HttpError},
    middleware::{role_check, JWTAuthMiddleware},
    models::usermodel::{User, UserChanges, UserRole},
    service::access::{can_access, Action, UserPolicy},
    AppState,
};

pub fn users_handler() -> Router {
    Router::new()
        .route("/me/", get(get_me).put(replace_me).patch(update_me))
        .route(
            "/users/",
            get(get_users)
                .layer(middleware::from_fn(|state, req, next| {
                    role_check(state, req, next, vec![UserRole::Admin])
                })),
        )
        .route("/users/:user_id/", get(get_user).patch(update_user))
}

async fn load_user(app_state: &AppState, user_id: Uuid) -> Result<User, HttpError> {
    app_state
        .db_client
        .get_user(Some(user_id), None, None)
        .await?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::UserNotFound.to_string()))
}

async fn save_changes(
    app_state: &AppState,
    user_id: Uuid,
    changes: UserChanges,
) -> Result<Json<FilterUserDto>, HttpError> {
    let user = app_state.db_client.update_user(user_id, changes).await?;

    Ok(Json(FilterUserDto::filter_user(&user)))
}

pub async fn get_me(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let user = app_state
        .db_client
        .get_user(Some(auth.actor.id), None, None)
        .await?
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::UserNoLongerExist.to_string()))?;

    Ok(Json(FilterUserDto::filter_user(&user)))
}

pub async fn replace_me(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddleware>,
    Json(body): Json<NameUpdateDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    load_user(&app_state, auth.actor.id).await?;
    save_changes(&app_state, auth.actor.id, body.into_changes()).await
}

pub async fn update_me(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddleware>,
    Json(body): Json<ProfilePatchDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    load_user(&app_state, auth.actor.id).await?;
    save_changes(&app_state, auth.actor.id, body.into_changes()).await
}

pub async fn get_users(
    Query(query_params): Query<RequestQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    query_params.validate()?;

    let page = query_params.page();
    let limit = query_params.limit();

    let users = app_state.db_client.get_users(page, limit).await?;
    let user_count = app_state.db_client.get_user_count().await?;

    Ok(Json(PaginatedResponse {
        count: user_count,
        page,
        limit,
        results: FilterUserDto::filter_users(&users),
    }))
}

pub async fn get_user(
    Path(user_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let user = load_user(&app_state, user_id).await?;

    if !can_access(&UserPolicy, Some(&auth.actor), Action::Retrieve, Some(&user)) {
        return Err(HttpError::forbidden(ErrorMessage::PermissionDenied.to_string()));
    }

    Ok(Json(FilterUserDto::filter_user(&user)))
}

pub async fn update_user(
    Path(user_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddleware>,
    Json(body): Json<UserUpdateDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    let policy = UserPolicy;
    let user = load_user(&app_state, user_id).await?;

    if !can_access(&policy, Some(&auth.actor), Action::Update, Some(&user)) {
        return Err(HttpError::forbidden(ErrorMessage::PermissionDenied.to_string()));
    }

    let changes = body.into_changes();
    policy.check_fields(&auth.actor, &changes)?;

    if changes.role.is_some() || changes.is_active.is_some() {
        tracing::info!(
            actor = %auth.actor.id,
            target = %user.id,
            role = ?changes.role,
            is_active = ?changes.is_active,
            "account privileges changed"
        );
    }

    save_changes(&app_state, user.id, changes).await
}
