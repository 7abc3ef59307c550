//! API middleware: bearer token validation and the admin role guard.

pub mod auth;
