//! Router-level test harness backed by the in-memory store.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use crate::{
    config::Config,
    db::{memorydb::MemoryDB, TicketExt},
    models::{
        ticketmodel::{TicketPriority, TicketStatus},
        usermodel::{User, UserRole},
    },
    routes::create_router,
    service::accounts,
    utils::token::{self, TokenType},
    AppState,
};

pub fn test_config() -> Config {
    Config {
        database_url: String::new(),
        jwt_secret: "test-secret".to_string(),
        jwt_maxage: 60,
        jwt_refresh_maxage: 24 * 60,
        port: 8000,
        cors_origins: vec!["http://localhost:5173".to_string()],
        bootstrap_admin: None,
    }
}

pub struct TestApp {
    pub db: Arc<MemoryDB>,
    pub config: Config,
    router: Router,
}

impl TestApp {
    pub const PASSWORD: &'static str = "Str0ng!pw";

    pub fn new() -> Self {
        let db = Arc::new(MemoryDB::new());
        let config = test_config();
        let app_state = AppState {
            env: config.clone(),
            db_client: db.clone(),
        };

        TestApp {
            db,
            config,
            router: create_router(Arc::new(app_state)),
        }
    }

    pub async fn seed_user(&self, email: &str, role: UserRole) -> User {
        accounts::create_user(self.db.as_ref(), email, Self::PASSWORD, "Test User", role)
            .await
            .expect("seed user")
    }

    pub async fn seed_ticket(&self, owner: &User, title: &str) -> Uuid {
        self.db
            .create_ticket(
                owner.id,
                title.to_string(),
                format!("{} (details)", title),
                TicketStatus::Open,
                TicketPriority::Medium,
            )
            .await
            .expect("seed ticket")
            .ticket
            .id
    }

    pub fn access_token(&self, user: &User) -> String {
        token::create_token(
            user,
            TokenType::Access,
            self.config.jwt_secret.as_bytes(),
            self.config.jwt_maxage,
        )
        .expect("access token")
    }

    pub fn refresh_token(&self, user: &User) -> String {
        token::create_token(
            user,
            TokenType::Refresh,
            self.config.jwt_secret.as_bytes(),
            self.config.jwt_refresh_maxage,
        )
        .expect("refresh token")
    }

    pub async fn raw_request(
        &self,
        method: Method,
        uri: &str,
        bearer: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(bearer) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", bearer));
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        self.router.clone().oneshot(request).await.expect("response")
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        bearer: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = self.raw_request(method, uri, bearer, body).await;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");

        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }
}
