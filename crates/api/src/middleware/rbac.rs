//! Permission-gated extractors.
//!
//! Each gate wraps [`SessionAuth`] and rejects sessions whose role lacks the
//! gate's permission with 403 `forbidden`. Missing sessions stay 401.

use std::marker::PhantomData;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use meterdeck_core::error::CoreError;
use meterdeck_core::roles::Permission;

use super::auth::SessionAuth;
use crate::auth::backend::Identity;
use crate::error::AppError;
use crate::state::AppState;

pub trait PermissionGate: Send + Sync + 'static {
    const PERMISSION: Permission;
}

pub struct ViewUsers;

impl PermissionGate for ViewUsers {
    const PERMISSION: Permission = Permission::UsersView;
}

pub struct ManageUsers;

impl PermissionGate for ManageUsers {
    const PERMISSION: Permission = Permission::UsersManage;
}

pub struct CreateShare;

impl PermissionGate for CreateShare {
    const PERMISSION: Permission = Permission::ShareCreate;
}

pub struct ManageShares;

impl PermissionGate for ManageShares {
    const PERMISSION: Permission = Permission::ShareManage;
}

/// A session whose identity holds `G::PERMISSION`.
///
/// ```ignore
/// async fn list(auth: RequirePermission<ViewUsers>) -> AppResult<Json<()>> {
///     // auth.identity is guaranteed to hold users:view here
///     Ok(Json(()))
/// }
/// ```
pub struct RequirePermission<G: PermissionGate> {
    pub identity: Identity,
    gate: PhantomData<G>,
}

impl<G: PermissionGate> FromRequestParts<AppState> for RequirePermission<G> {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let SessionAuth(identity) = SessionAuth::from_request_parts(parts, state).await?;

        if !identity.can(G::PERMISSION) {
            tracing::warn!(
                event = "permission_denied",
                who = %identity.label(),
                permission = %G::PERMISSION,
                "Permission denied"
            );
            return Err(AppError::Core(CoreError::Forbidden(format!(
                "Missing permission: {}",
                G::PERMISSION
            ))));
        }

        Ok(RequirePermission {
            identity,
            gate: PhantomData,
        })
    }
}
