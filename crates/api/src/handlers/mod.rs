//! HTTP handler functions, one module per resource.

pub mod auth;
pub mod share;
pub mod usage;
pub mod users;
