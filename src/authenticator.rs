//! Request Authenticator
//!
//! Resolves the bearer access token of every request into an
//! [`Authentication`] stored in the request extensions. This layer never
//! rejects a request: missing, malformed, expired or forged tokens all
//! leave the request [`Authentication::Anonymous`]. Routes that need an
//! identity must ask for one through the extractors.

use crate::models::{AccessTokenClaims, Role};
use crate::signer::TokenSigner;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

const BEARER_PREFIX: &str = "Bearer ";

/// Authenticated principal derived from a verified access token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    /// Principal name
    pub username: String,
    pub email: String,
    pub roles: BTreeSet<Role>,
}

impl Identity {
    pub fn from_claims(claims: AccessTokenClaims) -> Self {
        Self {
            user_id: claims.user_id,
            username: claims.username,
            email: claims.email,
            roles: claims.roles,
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Authorization attributes, e.g. `ROLE_STUDENT`
    pub fn authorities(&self) -> Vec<String> {
        self.roles.iter().map(Role::authority).collect()
    }
}

/// Outcome of request authentication
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authentication {
    Authenticated(Identity),
    Anonymous,
}

impl Authentication {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Authentication::Authenticated(identity) => Some(identity),
            Authentication::Anonymous => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Authentication::Authenticated(_))
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix(BEARER_PREFIX))
}

/// Resolve request headers into an [`Authentication`]
pub fn authenticate(signer: &TokenSigner, headers: &HeaderMap) -> Authentication {
    let Some(token) = bearer_token(headers) else {
        return Authentication::Anonymous;
    };

    match signer.verify_access_token(token) {
        Ok(claims) => Authentication::Authenticated(Identity::from_claims(claims)),
        Err(e) => {
            tracing::debug!(kind = e.kind(), "Bearer token rejected, continuing anonymously");
            Authentication::Anonymous
        }
    }
}

/// Middleware attaching an [`Authentication`] to every request
///
/// Any value already present in the extensions is replaced, so a request
/// whose token fails verification is always anonymous.
pub async fn authenticate_request(
    State(signer): State<Arc<TokenSigner>>,
    mut req: Request,
    next: Next,
) -> Response {
    let authentication = authenticate(&signer, req.headers());
    tracing::trace!(
        authenticated = authentication.is_authenticated(),
        path = %req.uri().path(),
        "Request authentication resolved"
    );
    req.extensions_mut().insert(authentication);

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::models::User;
    use axum::http::HeaderValue;

    fn signer() -> TokenSigner {
        TokenSigner::new(&test_config()).unwrap()
    }

    fn token_for(signer: &TokenSigner) -> String {
        signer
            .issue_access_token(&User {
                id: Uuid::new_v4(),
                username: "alice".into(),
                email: "a@b.com".into(),
                password_hash: String::new(),
                enabled: true,
                roles: BTreeSet::from([Role::Student]),
            })
            .unwrap()
    }

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_valid_bearer_authenticates() {
        let signer = signer();
        let token = token_for(&signer);

        let auth = authenticate(&signer, &headers(&format!("Bearer {}", token)));
        assert!(auth.is_authenticated());
        let identity = auth.identity().expect("should be authenticated");

        assert_eq!(identity.username, "alice");
        assert_eq!(identity.authorities(), vec!["ROLE_STUDENT".to_string()]);
    }

    #[test]
    fn test_missing_header_is_anonymous() {
        assert_eq!(
            authenticate(&signer(), &HeaderMap::new()),
            Authentication::Anonymous
        );
    }

    #[test]
    fn test_other_scheme_is_anonymous() {
        assert_eq!(
            authenticate(&signer(), &headers("Basic YWxpY2U6c2VjcmV0")),
            Authentication::Anonymous
        );
    }

    #[test]
    fn test_bad_token_is_anonymous() {
        let signer = signer();
        let mut token = token_for(&signer);
        token.push('x');

        assert_eq!(
            authenticate(&signer, &headers(&format!("Bearer {}", token))),
            Authentication::Anonymous
        );
        assert_eq!(
            authenticate(&signer, &headers("Bearer not-a-jwt")),
            Authentication::Anonymous
        );
    }
}
