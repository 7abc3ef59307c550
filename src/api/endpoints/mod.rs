//! API endpoint handlers, one module per resource.

pub mod attachments;
pub mod auth;
pub mod health;
pub mod patients;
pub mod users;
