//12
use std::sync::Arc;

use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::post,
    Extension, Json, Router,
};
use axum_extra::extract::cookie::Cookie;
use validator::Validate;

use crate::{
    dtos::{
        FilterUserDto, LoginResponseDto, LoginUserDto, RefreshResponseDto, RefreshTokenDto,
        RegisterUserDto,
    },
    error::{ErrorMessage, HttpError},
    models::usermodel::UserRole,
    service::accounts,
    utils::token::{self, TokenType},
    AppState,
};

pub fn auth_handler() -> Router {
    Router::new()
        .route("/register/", post(register))
        .route("/login/", post(login))
        .route("/token/refresh/", post(refresh_token))
}

pub async fn register(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<RegisterUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    let user = accounts::create_user(
        app_state.db_client.as_ref(),
        &body.email,
        &body.password,
        &body.name,
        UserRole::Customer,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(FilterUserDto::filter_user(&user))))
}

pub async fn login(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<LoginUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    let user = accounts::authenticate(app_state.db_client.as_ref(), &body.email, &body.password)
        .await?;

    let tokens = token::create_token_pair(
        &user,
        app_state.env.jwt_secret.as_bytes(),
        app_state.env.jwt_maxage,
        app_state.env.jwt_refresh_maxage,
    )
    .map_err(|e| HttpError::server_error(e.to_string()))?;

    let cookie_duration = time::Duration::minutes(app_state.env.jwt_maxage);
    let cookie = Cookie::build(("token", tokens.access.clone()))
        .path("/")
        .max_age(cookie_duration)
        .http_only(true)
        .build();

    let mut headers = HeaderMap::new();
    headers.append(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie.to_string())
            .map_err(|e| HttpError::server_error(e.to_string()))?,
    );

    tracing::info!(user = %user.id, "login succeeded");

    let response = Json(LoginResponseDto {
        access: tokens.access,
        refresh: tokens.refresh,
        user: FilterUserDto::filter_user(&user),
    });

    Ok((headers, response))
}

/// Exchanges a refresh token for a new access token. The account is re-read so
/// the new token carries the current role and disabled accounts are refused.
pub async fn refresh_token(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<RefreshTokenDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    let claims = token::decode_token(
        body.refresh,
        app_state.env.jwt_secret.as_bytes(),
        TokenType::Refresh,
    )?;

    let user_id = uuid::Uuid::parse_str(&claims.sub)
        .map_err(|_| HttpError::unauthorized(ErrorMessage::InvalidToken.to_string()))?;

    let user = app_state
        .db_client
        .get_user(Some(user_id), None, None)
        .await?
        .filter(|user| user.is_active)
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::UserNoLongerExist.to_string()))?;

    let access = token::create_token(
        &user,
        TokenType::Access,
        app_state.env.jwt_secret.as_bytes(),
        app_state.env.jwt_maxage,
    )
    .map_err(|e| HttpError::server_error(e.to_string()))?;

    Ok(Json(RefreshResponseDto { access }))
}
