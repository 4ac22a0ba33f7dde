//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod session_repo;
pub mod share_link_repo;
pub mod user_repo;

pub use session_repo::SessionRepo;
pub use share_link_repo::ShareLinkRepo;
pub use user_repo::UserRepo;
