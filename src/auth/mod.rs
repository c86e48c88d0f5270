//! Caller extraction.
//!
//! Token issuance and verification belong to the upstream gateway; by the
//! time a request reaches this service the bearer token carries the
//! authenticated principal's id. The extractor parses it, loads the user,
//! and hands handlers a `Caller` with a typed role. Anything missing or
//! malformed is a 401.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::models::Role;
use crate::state::AppState;
use crate::utils::error::AppError;

/// The authenticated principal behind the current request.
#[derive(Debug, Clone, Copy)]
pub struct Caller {
    pub id: Uuid,
    pub role: Role,
}

fn unauthorized() -> AppError {
    AppError::Auth("Not authorized to access this route".to_string())
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(unauthorized)?;

        let token = header.strip_prefix("Bearer ").ok_or_else(unauthorized)?;
        let principal_id = Uuid::parse_str(token.trim()).map_err(|_| unauthorized())?;

        let user = state
            .store
            .find_user(principal_id)
            .await?
            .ok_or_else(unauthorized)?;

        Ok(Caller {
            id: user.id,
            role: user.role,
        })
    }
}
