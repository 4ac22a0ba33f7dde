//! First-run admin seeding for accounts mode.

use meterdeck_core::roles::Role;
use meterdeck_core::validation::{normalize_email, validate_password_strength};
use meterdeck_db::models::user::{CreateUser, User};
use meterdeck_db::CredentialStore;

use super::password::hash_password;
use crate::config::BootstrapAdmin;
use crate::error::{AppError, AppResult};

/// Create the configured admin account if, and only if, no users exist yet.
///
/// Returns the created user, or `None` when the store already had accounts.
pub async fn ensure_bootstrap_admin(
    store: &dyn CredentialStore,
    admin: &BootstrapAdmin,
) -> AppResult<Option<User>> {
    if store.count_users().await? > 0 {
        tracing::debug!("Users already exist, skipping admin bootstrap");
        return Ok(None);
    }

    validate_password_strength(&admin.password)?;
    let password_hash = hash_password(&admin.password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;

    let user = store
        .create_user(&CreateUser {
            email: normalize_email(&admin.email),
            password_hash: Some(password_hash),
            name: "Administrator".to_string(),
            role: Role::Admin,
        })
        .await?;

    tracing::info!(user_id = user.id, email = %user.email, "Bootstrap admin created");
    Ok(Some(user))
}
