//! Authentication: login backends, password hashing, cookies and the
//! session/share authority.

pub mod authority;
pub mod backend;
pub mod bootstrap;
pub mod cookies;
pub mod password;
