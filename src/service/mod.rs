pub mod access;
pub mod accounts;
