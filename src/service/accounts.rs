use std::collections::HashSet;

use crate::{
    db::{DataStore, USERS_EMAIL_KEY, USERS_USERNAME_KEY},
    error::{ErrorMessage, HttpError},
    models::usermodel::{split_name, NewUser, User, UserRole},
    utils::password,
};

/// Attempts before a username race is reported as a conflict.
const USERNAME_ATTEMPTS: usize = 5;

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Smallest free candidate: the base itself, then base1, base2, ...
pub fn next_username(base: &str, existing: &HashSet<String>) -> String {
    if !existing.contains(base) {
        return base.to_string();
    }

    let mut counter = 1usize;
    loop {
        let candidate = format!("{}{}", base, counter);
        if !existing.contains(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

fn username_base(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

/// Creates an account with a unique username derived from the email local-part.
///
/// The unique constraint on `username` is authoritative: when a concurrent
/// registration takes the computed candidate first, the lookup is repeated and
/// the next free candidate is tried.
pub async fn create_user(
    db: &dyn DataStore,
    email: &str,
    raw_password: &str,
    name: &str,
    role: UserRole,
) -> Result<User, HttpError> {
    let email = normalize_email(email);
    let (first_name, last_name) = split_name(name.trim());

    if let Err(problems) = password::validate_strength(raw_password, &[email.as_str(), name]) {
        let mut error = HttpError::validation("password", problems[0].clone());
        if let Some(fields) = error.fields.as_mut() {
            fields.insert("password".to_string(), problems);
        }
        return Err(error);
    }

    if db.get_user(None, None, Some(&email)).await?.is_some() {
        return Err(HttpError::validation("email", ErrorMessage::EmailExist.to_string()));
    }

    let hashed_password = password::hash(raw_password)
        .map_err(|e| HttpError::validation("password", e.to_string()))?;
    let base = username_base(&email).to_string();

    for attempt in 1..=USERNAME_ATTEMPTS {
        let existing: HashSet<String> = db
            .get_usernames_with_prefix(&base)
            .await?
            .into_iter()
            .collect();
        let username = next_username(&base, &existing);

        let new_user = NewUser {
            email: email.clone(),
            username: username.clone(),
            first_name: first_name.clone(),
            last_name: last_name.clone(),
            password: hashed_password.clone(),
            role,
        };

        match db.save_user(new_user).await {
            Ok(user) => {
                tracing::info!(user = %user.id, username = %user.username, role = user.role.to_str(), "account created");
                return Ok(user);
            }
            Err(e) if e.violates(USERS_USERNAME_KEY) => {
                tracing::warn!(username = %username, attempt, "username taken concurrently, retrying");
                continue;
            }
            Err(e) if e.violates(USERS_EMAIL_KEY) => {
                return Err(HttpError::validation("email", ErrorMessage::EmailExist.to_string()));
            }
            Err(e) => return Err(e.into()),
        }
    }

    tracing::error!(base = %base, "gave up allocating a username");
    Err(HttpError::conflict(ErrorMessage::UsernameUnavailable.to_string()))
}

/// Verifies credentials; unknown email, wrong password and disabled accounts are all 401.
pub async fn authenticate(
    db: &dyn DataStore,
    email: &str,
    raw_password: &str,
) -> Result<User, HttpError> {
    let email = normalize_email(email);

    let user = db
        .get_user(None, None, Some(&email))
        .await?
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::WrongCredentials.to_string()))?;

    let password_matched = password::compare(raw_password, &user.password)
        .map_err(|_| HttpError::unauthorized(ErrorMessage::WrongCredentials.to_string()))?;

    if !password_matched {
        tracing::info!(user = %user.id, "login rejected: wrong password");
        return Err(HttpError::unauthorized(ErrorMessage::WrongCredentials.to_string()));
    }

    if !user.is_active {
        tracing::info!(user = %user.id, "login rejected: account disabled");
        return Err(HttpError::unauthorized(ErrorMessage::AccountDisabled.to_string()));
    }

    Ok(user)
}

/// Creates the bootstrap administrator unless that email is already registered.
pub async fn ensure_superuser(
    db: &dyn DataStore,
    email: &str,
    raw_password: &str,
) -> Result<Option<User>, HttpError> {
    let email = normalize_email(email);
    if db.get_user(None, None, Some(&email)).await?.is_some() {
        return Ok(None);
    }

    create_user(db, &email, raw_password, "", UserRole::Admin)
        .await
        .map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{memorydb::MemoryDB, UserExt};
    use axum::http::StatusCode;

    fn set(names: &[&str]) -> HashSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_next_username() {
        assert_eq!(next_username("jo", &set(&[])), "jo");
        assert_eq!(next_username("jo", &set(&["jo"])), "jo1");
        assert_eq!(next_username("jo", &set(&["jo", "jo1", "jo2"])), "jo3");
        assert_eq!(next_username("jo", &set(&["jo", "jo2"])), "jo1");
        assert_eq!(next_username("jo", &set(&["jo1", "joanna"])), "jo");
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Jo.Doe@Example.COM "), "jo.doe@example.com");
    }

    #[tokio::test]
    async fn test_usernames_are_unique_per_prefix() {
        let db = MemoryDB::new();

        let first = create_user(&db, "jo@x.com", "Str0ng!pw", "Jo Doe", UserRole::Customer)
            .await
            .unwrap();
        let second = create_user(&db, "jo@y.com", "Str0ng!pw", "Jo Roe", UserRole::Customer)
            .await
            .unwrap();
        let third = create_user(&db, "JO@z.com", "Str0ng!pw", "Jo Poe", UserRole::Customer)
            .await
            .unwrap();

        assert_eq!(first.username, "jo");
        assert_eq!(second.username, "jo1");
        assert_eq!(third.username, "jo2");
        assert_eq!(third.email, "jo@z.com");
        assert_eq!(first.role, UserRole::Customer);
        assert_eq!(first.first_name, "Jo");
        assert_eq!(first.last_name, "Doe");
        assert_ne!(first.password, "Str0ng!pw");
    }

    #[tokio::test]
    async fn test_username_race_retries_with_next_candidate() {
        let db = MemoryDB::new();
        create_user(&db, "sam@x.com", "Str0ng!pw", "Sam One", UserRole::Customer)
            .await
            .unwrap();

        let db = db.with_stale_prefix_lookups(1);
        let user = create_user(&db, "sam@y.com", "Str0ng!pw", "Sam Two", UserRole::Customer)
            .await
            .unwrap();

        assert_eq!(user.username, "sam1");
    }

    #[tokio::test]
    async fn test_username_race_gives_up_with_conflict() {
        let db = MemoryDB::new();
        create_user(&db, "kim@x.com", "Str0ng!pw", "Kim One", UserRole::Customer)
            .await
            .unwrap();

        let db = db.with_stale_prefix_lookups(USERNAME_ATTEMPTS);
        let error = create_user(&db, "kim@y.com", "Str0ng!pw", "Kim Two", UserRole::Customer)
            .await
            .unwrap_err();

        assert_eq!(error.status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_duplicate_email_is_a_field_error() {
        let db = MemoryDB::new();
        create_user(&db, "a@x.com", "Str0ng!pw", "Jo Doe", UserRole::Customer)
            .await
            .unwrap();

        let error = create_user(&db, "A@X.com", "Str0ng!pw", "Jo Doe", UserRole::Customer)
            .await
            .unwrap_err();

        assert_eq!(error.status, StatusCode::BAD_REQUEST);
        assert!(error.fields.unwrap().contains_key("email"));
    }

    #[tokio::test]
    async fn test_weak_password_reports_every_problem() {
        let db = MemoryDB::new();

        let error = create_user(&db, "a@x.com", "1234", "Jo Doe", UserRole::Customer)
            .await
            .unwrap_err();
        let fields = error.fields.unwrap();

        assert_eq!(fields["password"].len(), 2);
    }

    #[tokio::test]
    async fn test_authenticate() {
        let db = MemoryDB::new();
        let user = create_user(&db, "a@x.com", "Str0ng!pw", "Jo Doe", UserRole::Customer)
            .await
            .unwrap();

        let found = authenticate(&db, "A@x.com", "Str0ng!pw").await.unwrap();
        assert_eq!(found.id, user.id);

        let wrong = authenticate(&db, "a@x.com", "Wr0ng!pw").await.unwrap_err();
        assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

        let unknown = authenticate(&db, "b@x.com", "Str0ng!pw").await.unwrap_err();
        assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_inactive_account_cannot_authenticate() {
        use crate::models::usermodel::UserChanges;

        let db = MemoryDB::new();
        let user = create_user(&db, "a@x.com", "Str0ng!pw", "Jo Doe", UserRole::Customer)
            .await
            .unwrap();
        db.update_user(
            user.id,
            UserChanges {
                is_active: Some(false),
                ..UserChanges::default()
            },
        )
        .await
        .unwrap();

        let error = authenticate(&db, "a@x.com", "Str0ng!pw").await.unwrap_err();
        assert_eq!(error.status, StatusCode::UNAUTHORIZED);
        assert_eq!(error.message, ErrorMessage::AccountDisabled.to_string());
    }

    #[tokio::test]
    async fn test_ensure_superuser_is_idempotent() {
        let db = MemoryDB::new();

        let admin = ensure_superuser(&db, "root@x.com", "Str0ng!pw").await.unwrap().unwrap();
        assert_eq!(admin.role, UserRole::Admin);
        assert_eq!(admin.full_name(), "root@x.com");

        assert!(ensure_superuser(&db, "root@x.com", "Str0ng!pw").await.unwrap().is_none());
    }
}
