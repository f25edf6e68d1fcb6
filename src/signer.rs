//! Access token signing
//!
//! HS256 access tokens plus generation and hashing of opaque refresh
//! secrets. A `TokenSigner` is immutable after construction and can be
//! shared freely between requests.

use crate::config::{AuthConfig, MIN_SECRET_BYTES};
use crate::error::AuthError;
use crate::models::{AccessTokenClaims, JwtClaims, User};

use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine as _,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    access_token_ttl: Duration,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("issuer", &self.issuer)
            .field("access_token_ttl", &self.access_token_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenSigner {
    /// Build a signer from configuration.
    ///
    /// A secret shorter than 32 bytes is rejected; it is never padded or truncated.
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        let secret = config.jwt_secret.as_bytes();
        if secret.len() < MIN_SECRET_BYTES {
            return Err(AuthError::Config(format!(
                "JWT secret must be at least {} bytes for HS256",
                MIN_SECRET_BYTES
            )));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: config.jwt_issuer.clone(),
            access_token_ttl: config.access_token_ttl(),
        })
    }

    /// Sign an access token for `user`
    pub fn issue_access_token(&self, user: &User) -> Result<String, AuthError> {
        let now = Utc::now();
        let exp = now
            .checked_add_signed(self.access_token_ttl)
            .ok_or(AuthError::Internal)?;

        let claims = JwtClaims {
            sub: user.id,
            iss: self.issuer.clone(),
            email: user.email.clone(),
            username: user.username.clone(),
            roles: user.roles.iter().map(|r| r.as_str().to_string()).collect(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok(token)
    }

    /// Verify signature, issuer and expiry of an access token
    pub fn verify_access_token(&self, token: &str) -> Result<AccessTokenClaims, AuthError> {
        let token_data = decode::<JwtClaims>(token, &self.decoding_key, &self.validation())?;

        Ok(token_data.claims.into())
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.validate_aud = false;
        validation.leeway = 0;
        validation
    }

    /// 256 random bits, URL-safe base64 without padding
    pub fn generate_refresh_secret(&self) -> String {
        let token_bytes: [u8; 32] = rand::thread_rng().gen();
        URL_SAFE_NO_PAD.encode(token_bytes)
    }

    /// SHA-256 digest of a token, standard base64
    pub fn hash_token(&self, token: &str) -> String {
        hash_token(token)
    }

    pub fn access_token_ttl_seconds(&self) -> i64 {
        self.access_token_ttl.num_seconds()
    }
}

/// SHA-256 digest of a token, standard base64.
///
/// Used both when storing a refresh token and when looking one up.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    STANDARD.encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::models::Role;
    use std::collections::BTreeSet;

    fn test_user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "alice".into(),
            email: "a@b.com".into(),
            password_hash: "unused".into(),
            enabled: true,
            roles: BTreeSet::from([Role::Student, Role::Instructor]),
        }
    }

    #[test]
    fn test_short_secret_is_rejected() {
        let config = AuthConfig {
            jwt_secret: "x".repeat(31),
            ..test_config()
        };
        assert!(matches!(TokenSigner::new(&config), Err(AuthError::Config(_))));
    }

    #[test]
    fn test_issue_then_verify() {
        let signer = TokenSigner::new(&test_config()).unwrap();
        let user = test_user();

        let token = signer.issue_access_token(&user).unwrap();
        let claims = signer.verify_access_token(&token).unwrap();

        assert_eq!(claims.user_id, user.id);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.email, "a@b.com");
        assert_eq!(claims.roles, user.roles);
    }

    #[test]
    fn test_tampered_token_is_rejected() {
        let signer = TokenSigner::new(&test_config()).unwrap();
        let token = signer.issue_access_token(&test_user()).unwrap();

        let positions = [token.len() / 3, token.len() / 2, token.len() - 5];
        for pos in positions {
            let mut bytes = token.clone().into_bytes();
            bytes[pos] = if bytes[pos] == b'A' { b'B' } else { b'A' };
            let tampered = String::from_utf8(bytes).unwrap();

            assert!(matches!(
                signer.verify_access_token(&tampered),
                Err(AuthError::InvalidToken)
            ));
        }
    }

    #[test]
    fn test_wrong_issuer_is_rejected() {
        let signer = TokenSigner::new(&test_config()).unwrap();
        let other = TokenSigner::new(&AuthConfig {
            jwt_issuer: "someone-else".into(),
            ..test_config()
        })
        .unwrap();

        let token = other.issue_access_token(&test_user()).unwrap();
        assert!(matches!(
            signer.verify_access_token(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_wrong_key_is_rejected() {
        let signer = TokenSigner::new(&test_config()).unwrap();
        let other = TokenSigner::new(&AuthConfig {
            jwt_secret: "another-secret-that-is-long-enough!!".into(),
            ..test_config()
        })
        .unwrap();

        let token = other.issue_access_token(&test_user()).unwrap();
        assert!(signer.verify_access_token(&token).is_err());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let config = test_config();
        let signer = TokenSigner::new(&config).unwrap();
        let user = test_user();

        let past = Utc::now() - Duration::minutes(5);
        let claims = JwtClaims {
            sub: user.id,
            iss: config.jwt_issuer.clone(),
            email: user.email.clone(),
            username: user.username.clone(),
            roles: vec!["STUDENT".into()],
            iat: (past - Duration::minutes(30)).timestamp(),
            exp: past.timestamp(),
            jti: Uuid::new_v4(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        )
        .unwrap();

        assert!(matches!(
            signer.verify_access_token(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_malformed_token_is_rejected() {
        let signer = TokenSigner::new(&test_config()).unwrap();
        for garbage in ["", "abc", "a.b.c", "Bearer x.y.z"] {
            assert!(signer.verify_access_token(garbage).is_err());
        }
    }

    #[test]
    fn test_refresh_secret_shape() {
        let signer = TokenSigner::new(&test_config()).unwrap();
        let a = signer.generate_refresh_secret();
        let b = signer.generate_refresh_secret();

        // 32 bytes -> 43 unpadded base64 characters
        assert_eq!(a.len(), 43);
        assert!(!a.contains('='));
        assert!(!a.contains('+') && !a.contains('/'));
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_token_is_deterministic() {
        assert_eq!(hash_token("secret"), hash_token("secret"));
        assert_ne!(hash_token("secret"), hash_token("secret2"));
        // SHA-256 of the empty string
        assert_eq!(hash_token(""), "47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU=");
    }

    #[test]
    fn test_ttl_seconds() {
        let signer = TokenSigner::new(&test_config()).unwrap();
        assert_eq!(signer.access_token_ttl_seconds(), 1800);
    }
}
