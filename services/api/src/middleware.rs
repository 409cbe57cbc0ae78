//! Authentication middleware for JWT token validation

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

use crate::{error::ApiError, state::AppState};

/// Authenticated user information
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
    pub is_admin: bool,
}

impl AuthUser {
    /// Resolve the acting user from an optional `userId` in the body
    ///
    /// A body id must name the caller.
    pub fn actor(&self, claimed: Option<Uuid>) -> Result<Uuid, ApiError> {
        match claimed {
            Some(id) if id != self.id => Err(ApiError::Unauthorized(
                "userId does not match the authenticated user".to_string(),
            )),
            _ => Ok(self.id),
        }
    }

    /// Reads scoped to a user are open to that user and administrators
    pub fn ensure_self(&self, user_id: Uuid) -> Result<(), ApiError> {
        if self.id == user_id || self.is_admin {
            Ok(())
        } else {
            Err(ApiError::Forbidden(
                "You can only access your own data".to_string(),
            ))
        }
    }
}

/// Authentication middleware
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
    fn test_actor_defaults_to_token_subject() {
        let user = AuthUser {
            id: Uuid::new_v4(),
            is_admin: false,
        };

        assert_eq!(user.actor(None).unwrap(), user.id);
        assert_eq!(user.actor(Some(user.id)).unwrap(), user.id);
        assert!(matches!(
            user.actor(Some(Uuid::new_v4())),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_ensure_self() {
        let user = AuthUser {
            id: Uuid::new_v4(),
            is_admin: false,
        };
        let admin = AuthUser {
            id: Uuid::new_v4(),
            is_admin: true,
        };

        assert!(user.ensure_self(user.id).is_ok());
        assert!(user.ensure_self(admin.id).is_err());
        assert!(admin.ensure_self(user.id).is_ok());
    }
}
