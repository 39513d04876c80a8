//1
use chrono::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "user_role", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    #[default]
    Customer,
    Agent,
    Admin,
}

impl UserRole {
    pub fn to_str(&self) -> &str {
        match self {
            UserRole::Customer => "CUSTOMER",
            UserRole::Agent => "AGENT",
            UserRole::Admin => "ADMIN",
        }
    }

    /// Staff-equivalent: unrestricted access to every user record.
    pub fn is_staff(&self) -> bool {
        matches!(self, UserRole::Admin)
    }

    pub fn is_agent(&self) -> bool {
        matches!(self, UserRole::Agent)
    }

    /// Agents and admins see and act on every ticket and message.
    pub fn has_staff_access(&self) -> bool {
        matches!(self, UserRole::Agent | UserRole::Admin)
    }
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct User {
    pub id: uuid::Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub role: UserRole,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// First and last name joined, or the email when both are blank.
    pub fn full_name(&self) -> String {
        display_name(&self.first_name, &self.last_name, &self.email)
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub role: UserRole,
}

#[derive(Debug, Default, Clone)]
pub struct UserChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

pub fn display_name(first_name: &str, last_name: &str, email: &str) -> String {
    let full_name = format!("{} {}", first_name, last_name);
    let full_name = full_name.trim();

    if full_name.is_empty() {
        email.to_string()
    } else {
        full_name.to_string()
    }
}

/// Splits a submitted full name on its first space.
pub fn split_name(name: &str) -> (String, String) {
    match name.split_once(' ') {
        Some((first, last)) => (first.to_string(), last.to_string()),
        None => (name.to_string(), String::new()),
    }
}
