//! Middleware for JWT token validation and authentication

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use tracing::warn;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// The caller, as identified by a valid bearer token
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
    pub is_admin: bool,
}

impl AuthUser {
    /// Only the account owner, or an administrator, may act on `user_id`
    pub fn ensure_owner(&self, user_id: Uuid) -> Result<(), ApiError> {
        if self.id != user_id && !self.is_admin {
            return Err(ApiError::Forbidden(
                "You can only manage your own account".to_string(),
            ));
        }
        Ok(())
    }
}

/// Validate the bearer token and expose the caller as an `AuthUser` extension
pub async fn auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(Authorization(bearer)) =
        bearer.ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;

    let claims = state
        .jwt_service
        .validate_token(bearer.token())
        .map_err(|e| {
            warn!("Rejected token: {}", e);
            ApiError::Unauthorized("Invalid or expired token".to_string())
        })?;

    req.extensions_mut().insert(AuthUser {
        id: claims.sub,
        is_admin: claims.is_admin,
    });

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_owner() {
        let id = Uuid::new_v4();
        let user = AuthUser { id, is_admin: false };

        assert!(user.ensure_owner(id).is_ok());
        assert!(matches!(
            user.ensure_owner(Uuid::new_v4()),
            Err(ApiError::Forbidden(_))
        ));

        let admin = AuthUser {
            id: Uuid::new_v4(),
            is_admin: true,
        };
        assert!(admin.ensure_owner(id).is_ok());
    }
}
