//! Role checks in front of protected routes.
//!
//! There is no role hierarchy: a route either accepts any signed-in identity
//! or exactly one role, and an admin token does not satisfy a route that
//! names another role.

use crate::credentials::{Claims, CredentialStore};
use crate::error::{AppError, AppResult};
use crate::models::Role;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

/// Validates an `Authorization` header value against an optional role.
pub fn authorize(
    credentials: &CredentialStore,
    header: Option<&str>,
    required: Option<Role>,
) -> AppResult<Claims> {
    let header = header.ok_or(AppError::MissingToken)?;
    // "Bearer <token>": the token is the second space-separated part
    let token = header
        .split(' ')
        .nth(1)
        .filter(|token| !token.is_empty())
        .ok_or(AppError::InvalidToken)?;
    let claims = credentials.validate_session(token)?;
    if let Some(role) = required {
        if claims.role != role {
            log::warn!(
                "[gate] user {} with role {} denied, {} required",
                claims.id,
                claims.role.as_str(),
                role.as_str()
            );
            return Err(AppError::Forbidden);
        }
    }
    Ok(claims)
}

fn authorize_parts<S>(parts: &Parts, state: &S, required: Option<Role>) -> AppResult<Claims>
where
    CredentialStore: FromRef<S>,
{
    let credentials = CredentialStore::from_ref(state);
    let header = match parts.headers.get(AUTHORIZATION) {
        None => None,
        Some(value) => Some(value.to_str().map_err(|_| AppError::InvalidToken)?),
    };
    authorize(&credentials, header, required)
}

/// Any signed-in user.
#[derive(Debug, Clone)]
pub struct Identity(pub Claims);

/// A signed-in user whose role is exactly `admin`.
#[derive(Debug, Clone)]
pub struct AdminIdentity(pub Claims);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
    CredentialStore: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        authorize_parts(parts, state, None).map(Identity)
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AdminIdentity
where
    S: Send + Sync,
    CredentialStore: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        authorize_parts(parts, state, Some(Role::Admin)).map(AdminIdentity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;
    use chrono::{Duration, Utc};

    fn setup() -> (CredentialStore, String, String) {
        let creds = CredentialStore::new(Store::in_memory().expect("store"), "gate", Duration::days(1), 4);
        creds.register("Ann", "ann@x.com", "pw123").expect("register");
        creds.seed_admin("Admin", "admin@admin.com", "admin123").expect("admin");
        let user = creds.verify("ann@x.com", "pw123").expect("user");
        let admin = creds.verify("admin@admin.com", "admin123").expect("admin");
        let user_token = creds.issue_session(&user).expect("token");
        let admin_token = creds.issue_session(&admin).expect("token");
        (creds, user_token, admin_token)
    }

    #[test]
    fn missing_header_is_unauthorized() {
        let (creds, _, _) = setup();
        assert!(matches!(authorize(&creds, None, None), Err(AppError::MissingToken)));
    }

    #[test]
    fn header_without_token_part_is_invalid() {
        let (creds, _, _) = setup();
        assert!(matches!(
            authorize(&creds, Some("Bearer"), None),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn expired_token_is_unauthorized() {
        let (creds, _, _) = setup();
        let user = creds.verify("ann@x.com", "pw123").expect("user");
        let stale = creds
            .issue_session_at(&user, Utc::now() - Duration::days(3))
            .expect("token");
        let header = format!("Bearer {stale}");
        assert!(matches!(
            authorize(&creds, Some(&header), None),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn wrong_role_is_forbidden() {
        let (creds, user_token, _) = setup();
        let header = format!("Bearer {user_token}");
        assert!(matches!(
            authorize(&creds, Some(&header), Some(Role::Admin)),
            Err(AppError::Forbidden)
        ));
    }

    #[test]
    fn roles_are_compared_exactly() {
        let (creds, user_token, admin_token) = setup();
        let admin_header = format!("Bearer {admin_token}");
        let claims = authorize(&creds, Some(&admin_header), Some(Role::Admin)).expect("admin");
        assert_eq!(claims.role, Role::Admin);
        assert!(matches!(
            authorize(&creds, Some(&admin_header), Some(Role::User)),
            Err(AppError::Forbidden)
        ));

        let user_header = format!("Bearer {user_token}");
        let claims = authorize(&creds, Some(&user_header), None).expect("any identity");
        assert_eq!(claims.email, "ann@x.com");
    }
}
