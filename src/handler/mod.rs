pub mod auth;
pub mod messages;
pub mod tickets;
pub mod users;
