//! JSON body extractor with the application error shape.

use axum::extract::FromRequest;

use crate::error::AppError;

/// `axum::Json` whose rejections (bad syntax, wrong types, missing
/// content type) surface as `400 bad_request` instead of axum's plain-text
/// 4xx responses.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);
