//! Handlers for the `/users` resource (accounts mode only).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use meterdeck_core::error::CoreError;
use meterdeck_core::roles::{Permission, Role};
use meterdeck_core::types::DbId;
use meterdeck_core::validation::{normalize_email, validate_password_strength};
use meterdeck_db::models::user::{CreateUser, UpdateUser, UserResponse};
use serde::Deserialize;
use validator::Validate;

use crate::auth::password::hash_password;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::{AccountsOnly, SessionAuth};
use crate::middleware::csrf::CsrfProtected;
use crate::middleware::json::AppJson;
use crate::middleware::rbac::{ManageUsers, RequirePermission, ViewUsers};
use crate::response::{DataResponse, OkResponse};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Request body for `POST /users`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub role: Role,
    pub password: String,
}

/// Request body for `PUT /users/{id}`. Absent fields are left unchanged.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

/// Request body for `PUT /users/{id}/password`.
#[derive(Debug, Deserialize)]
pub struct SetPasswordRequest {
    pub password: String,
}

fn user_not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound { entity: "User", id })
}

fn hash(password: &str) -> AppResult<String> {
    hash_password(password)
        .map_err(|e| AppError::InternalError(format!("Password hashing failed: {e}")))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/users
pub async fn list_users(
    _accounts: AccountsOnly,
    State(state): State<AppState>,
    _auth: RequirePermission<ViewUsers>,
) -> AppResult<Json<DataResponse<Vec<UserResponse>>>> {
    let users = state.store.list_users().await?;
    Ok(Json(DataResponse {
        data: users.iter().map(UserResponse::from).collect(),
    }))
}

/// GET /api/v1/users/{id}
pub async fn get_user(
    _accounts: AccountsOnly,
    State(state): State<AppState>,
    _auth: RequirePermission<ViewUsers>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    let user = state
        .store
        .find_user_by_id(id)
        .await?
        .ok_or_else(|| user_not_found(id))?;
    Ok(Json(DataResponse {
        data: UserResponse::from(&user),
    }))
}

/// POST /api/v1/users
pub async fn create_user(
    _accounts: AccountsOnly,
    State(state): State<AppState>,
    _csrf: CsrfProtected,
    auth: RequirePermission<ManageUsers>,
    AppJson(input): AppJson<CreateUserRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    validate_password_strength(&input.password)?;

    let user = state
        .store
        .create_user(&CreateUser {
            email: normalize_email(&input.email),
            password_hash: Some(hash(&input.password)?),
            name: input.name.trim().to_string(),
            role: input.role,
        })
        .await?;

    tracing::info!(
        user_id = user.id,
        role = %user.role,
        created_by = %auth.identity.label(),
        "User created"
    );

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: UserResponse::from(&user),
        }),
    ))
}

/// PUT /api/v1/users/{id}
///
/// Deactivating a user also ends all of their sessions.
pub async fn update_user(
    _accounts: AccountsOnly,
    State(state): State<AppState>,
    _csrf: CsrfProtected,
    auth: RequirePermission<ManageUsers>,
    Path(id): Path<DbId>,
    AppJson(input): AppJson<UpdateUserRequest>,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    input.validate()?;

    let is_self = auth.identity.user().is_some_and(|u| u.id == id);
    if is_self && input.is_active == Some(false) {
        return Err(AppError::BadRequest(
            "You cannot deactivate your own account".to_string(),
        ));
    }

    let update = UpdateUser {
        email: input.email.as_deref().map(normalize_email),
        name: input.name.map(|n| n.trim().to_string()),
        role: input.role,
        is_active: input.is_active,
    };
    let user = state
        .store
        .update_user(id, &update)
        .await?
        .ok_or_else(|| user_not_found(id))?;

    if !user.is_active {
        let ended = state.store.delete_sessions_for_user(id).await?;
        tracing::info!(user_id = id, sessions_ended = ended, "User deactivated");
    }

    tracing::info!(user_id = id, updated_by = %auth.identity.label(), "User updated");

    Ok(Json(DataResponse {
        data: UserResponse::from(&user),
    }))
}

/// DELETE /api/v1/users/{id}
pub async fn delete_user(
    _accounts: AccountsOnly,
    State(state): State<AppState>,
    _csrf: CsrfProtected,
    auth: RequirePermission<ManageUsers>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    if auth.identity.user().is_some_and(|u| u.id == id) {
        return Err(AppError::BadRequest(
            "You cannot delete your own account".to_string(),
        ));
    }

    if !state.store.delete_user(id).await? {
        return Err(user_not_found(id));
    }

    tracing::info!(user_id = id, deleted_by = %auth.identity.label(), "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/users/{id}/password
///
/// Users may change their own password; anyone else needs `users:manage`.
/// Every session of the target user ends, including the caller's own.
pub async fn set_password(
    _accounts: AccountsOnly,
    State(state): State<AppState>,
    _csrf: CsrfProtected,
    SessionAuth(identity): SessionAuth,
    Path(id): Path<DbId>,
    AppJson(input): AppJson<SetPasswordRequest>,
) -> AppResult<Json<OkResponse>> {
    let is_self = identity.user().is_some_and(|u| u.id == id);
    if !is_self && !identity.can(Permission::UsersManage) {
        tracing::warn!(
            event = "permission_denied",
            who = %identity.label(),
            target_user_id = id,
            "Password change denied"
        );
        return Err(AppError::Core(CoreError::Forbidden(
            "Cannot change another user's password".to_string(),
        )));
    }

    validate_password_strength(&input.password)?;

    if !state.store.update_password(id, &hash(&input.password)?).await? {
        return Err(user_not_found(id));
    }
    let ended = state.store.delete_sessions_for_user(id).await?;

    tracing::info!(
        user_id = id,
        changed_by = %identity.label(),
        sessions_ended = ended,
        "Password changed"
    );

    Ok(Json(OkResponse::ok()))
}
