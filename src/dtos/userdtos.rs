//3
use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::usermodel::{display_name, split_name, User, UserChanges, UserRole};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 20;

pub(crate) fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("blank");
        error.message = Some(Cow::from("This field may not be blank."));
        return Err(error);
    }

    Ok(())
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisterUserDto {
    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Enter a valid email address.")
    )]
    pub email: String,

    #[validate(
        length(min = 1, message = "Password is required"),
        must_match(other = "password2", message = "Password fields didn't match.")
    )]
    pub password: String,

    #[validate(length(min = 1, message = "Password confirmation is required"))]
    pub password2: String,

    #[validate(
        length(min = 1, message = "Name is required"),
        custom = "validate_not_blank"
    )]
    pub name: String,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginUserDto {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshTokenDto {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh: String,
}

#[derive(Serialize, Deserialize, Validate, Debug, Default)]
pub struct RequestQueryDto {
    #[validate(range(min = 1, message = "Page must be at least 1"))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<u32>,
}

impl RequestQueryDto {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(DEFAULT_PAGE)
    }

    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE)
    }
}

/// Public shape of a user. Credential material never leaves the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterUserDto {
    pub id: String,
    pub email: String,
    pub name: String,
    pub is_staff: bool,
    pub is_agent: bool,
    pub role: UserRole,
}

impl FilterUserDto {
    pub fn filter_user(user: &User) -> Self {
        FilterUserDto::from_parts(
            user.id,
            &user.email,
            &user.first_name,
            &user.last_name,
            user.role,
        )
    }

    /// Builds the same shape from joined owner or sender columns.
    pub fn from_parts(
        id: Uuid,
        email: &str,
        first_name: &str,
        last_name: &str,
        role: UserRole,
    ) -> Self {
        FilterUserDto {
            id: id.to_string(),
            email: email.to_owned(),
            name: display_name(first_name, last_name, email),
            is_staff: role.is_staff(),
            is_agent: role.is_agent(),
            role,
        }
    }

    pub fn filter_users(users: &[User]) -> Vec<FilterUserDto> {
        users.iter().map(FilterUserDto::filter_user).collect()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponseDto {
    pub access: String,
    pub refresh: String,
    pub user: FilterUserDto,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponseDto {
    pub access: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub count: i64,
    pub page: u32,
    pub limit: u32,
    pub results: Vec<T>,
}

/// Body of `PUT /accounts/me/`.
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NameUpdateDto {
    #[validate(
        length(min = 1, message = "Name is required"),
        custom = "validate_not_blank"
    )]
    pub name: String,
}

/// Body of `PATCH /accounts/me/`. Only the name is writable on the own profile.
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct ProfilePatchDto {
    #[validate(custom = "validate_not_blank")]
    pub name: Option<String>,
}

/// Body of `PATCH /accounts/users/{id}/`.
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct UserUpdateDto {
    #[validate(custom = "validate_not_blank")]
    pub name: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

fn name_changes(name: Option<&str>) -> UserChanges {
    match name {
        Some(name) => {
            let (first_name, last_name) = split_name(name.trim());
            UserChanges {
                first_name: Some(first_name),
                last_name: Some(last_name),
                ..UserChanges::default()
            }
        }
        None => UserChanges::default(),
    }
}

impl NameUpdateDto {
    pub fn into_changes(self) -> UserChanges {
        name_changes(Some(&self.name))
    }
}

impl ProfilePatchDto {
    pub fn into_changes(self) -> UserChanges {
        name_changes(self.name.as_deref())
    }
}

impl UserUpdateDto {
    pub fn into_changes(self) -> UserChanges {
        UserChanges {
            role: self.role,
            is_active: self.is_active,
            ..name_changes(self.name.as_deref())
        }
    }
}
