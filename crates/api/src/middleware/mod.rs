//! Request extractors: client identity, rate limiting, CSRF, sessions and
//! permissions.

pub mod auth;
pub mod client_ip;
pub mod csrf;
pub mod json;
pub mod rate_limit;
pub mod rbac;
pub mod request;
