//! Role name validation.

use crate::auth::Role;
use crate::errors::WebError;
use crate::web::{handler_fn, respond, Handler};
use axum::extract::{FromRequestParts, Path};
use axum::http::StatusCode;
use serde::Serialize;
use std::collections::BTreeMap;

/// Client message for a request that fails field validation.
pub const VALIDATION_MESSAGE: &str = "data validation error";

#[derive(Debug, Serialize)]
pub struct RoleResponse {
    pub role: Role,
}

/// `GET /v1/roles/:role`: echo the canonical role, or a 400 naming the field.
pub fn validate_role() -> Handler {
    handler_fn(|scope, req| async move {
        let (mut parts, _body) = req.into_parts();
        let Path(raw) = Path::<String>::from_request_parts(&mut parts, &())
            .await
            .map_err(|e| WebError::untrusted(format!("extracting role path parameter: {e}")))?;

        let role = Role::parse(&raw).map_err(|e| {
            WebError::trusted_fields(
                StatusCode::BAD_REQUEST,
                VALIDATION_MESSAGE,
                BTreeMap::from([("role".to_string(), e.to_string())]),
            )
        })?;

        respond(&scope, &RoleResponse { role }, StatusCode::OK)
    })
}
