//! Authentication Extractors
//!
//! Axum extractors that read the [`Authentication`] attached by
//! [`crate::authenticator::authenticate_request`]. These are where
//! anonymous requests get turned away.

use crate::authenticator::{Authentication, Identity};
use crate::models::Role;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

/// Rejection for routes that need an identity or a role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    Unauthenticated,
    Forbidden,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            AuthRejection::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Authentication required",
            ),
            AuthRejection::Forbidden => (
                StatusCode::FORBIDDEN,
                "forbidden",
                "Insufficient permissions",
            ),
        };

        (
            status,
            Json(serde_json::json!({
                "error": error,
                "message": message
            })),
        )
            .into_response()
    }
}

fn authentication(parts: &Parts) -> Authentication {
    // Without the authenticator layer nothing has been verified
    parts
        .extensions
        .get::<Authentication>()
        .cloned()
        .unwrap_or(Authentication::Anonymous)
}

/// Authenticated caller; anonymous requests are rejected with 401
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

impl CurrentUser {
    /// Reject with 403 unless the caller holds `role`
    pub fn require_role(&self, role: Role) -> Result<&Identity, AuthRejection> {
        if self.0.has_role(role) {
            Ok(&self.0)
        } else {
            tracing::info!(username = %self.0.username, role = %role, "Missing role");
            Err(AuthRejection::Forbidden)
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match authentication(parts) {
            Authentication::Authenticated(identity) => Ok(CurrentUser(identity)),
            Authentication::Anonymous => Err(AuthRejection::Unauthenticated),
        }
    }
}

/// Caller identity if there is one; never rejects
///
/// ```
/// use axum::{routing::get, Router};
/// use lms_auth::MaybeUser;
///
/// async fn greeting(MaybeUser(user): MaybeUser) -> String {
///     match user {
///         Some(identity) => format!("Hello, {}", identity.username),
///         None => "Hello, guest".to_string(),
///     }
/// }
///
/// let routes: Router = Router::new().route("/greeting", get(greeting));
/// # let _ = routes;
/// ```
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<Identity>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(authentication(parts).identity().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn identity(roles: &[Role]) -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            username: "alice".into(),
            email: "a@b.com".into(),
            roles: roles.iter().copied().collect::<BTreeSet<_>>(),
        }
    }

    fn parts_with(auth: Option<Authentication>) -> Parts {
        let mut req = Request::builder().uri("/").body(()).unwrap();
        if let Some(auth) = auth {
            req.extensions_mut().insert(auth);
        }
        req.into_parts().0
    }

    #[tokio::test]
    async fn test_current_user_requires_identity() {
        let mut parts = parts_with(Some(Authentication::Anonymous));
        let result = CurrentUser::from_request_parts(&mut parts, &()).await;
        assert_eq!(result.unwrap_err(), AuthRejection::Unauthenticated);

        let mut parts = parts_with(None);
        let result = CurrentUser::from_request_parts(&mut parts, &()).await;
        assert_eq!(result.unwrap_err(), AuthRejection::Unauthenticated);
    }

    #[tokio::test]
    async fn test_current_user_from_authenticated() {
        let mut parts = parts_with(Some(Authentication::Authenticated(identity(&[
            Role::Student,
        ]))));
        let user = CurrentUser::from_request_parts(&mut parts, &())
            .await
            .unwrap();

        assert_eq!(user.0.username, "alice");
        assert!(user.require_role(Role::Student).is_ok());
        assert_eq!(
            user.require_role(Role::Admin).unwrap_err(),
            AuthRejection::Forbidden
        );
    }

    #[tokio::test]
    async fn test_maybe_user() {
        let mut parts = parts_with(Some(Authentication::Anonymous));
        let MaybeUser(none) = MaybeUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(none.is_none());

        let mut parts = parts_with(Some(Authentication::Authenticated(identity(&[]))));
        let MaybeUser(some) = MaybeUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(some.unwrap().username, "alice");
    }

    #[test]
    fn test_rejection_status() {
        assert_eq!(
            AuthRejection::Unauthenticated.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthRejection::Forbidden.into_response().status(),
            StatusCode::FORBIDDEN
        );
    }
}
