//! Request extractors whose rejections render as `ApiError`.
//!
//! Axum's own `Json`, `Path` and `Query` answer malformed input with a plain-text body;
//! these wrappers route the same rejections through `ApiError` so every failure keeps
//! the `{"error": ...}` shape.

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::ApiError;

/// JSON request body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Typed path segments, e.g. `{id}`.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// Deserialized query string.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);
