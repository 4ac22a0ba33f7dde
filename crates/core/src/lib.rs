//! Pure domain logic for the meterdeck dashboard backend.
//!
//! Nothing in this crate performs I/O: signing, rate limiting, CSRF checks
//! and the role model are all deterministic given a secret and a clock, so
//! the HTTP and persistence layers can inject both.

pub mod clock;
pub mod csrf;
pub mod error;
pub mod hashing;
pub mod rate_limit;
pub mod request;
pub mod roles;
pub mod token;
pub mod types;
pub mod validation;
