/*!
 * Authentication and authorization.
 *
 * Accounts authenticate with username and password and receive a JWT bearer
 * token. Every protected handler takes an [`AuthUser`] extractor; permission
 * checks are exact membership in a per-operation allow set of [`Role`]s.
 */

use axum::{extract::FromRequestParts, http::header, http::request::Parts};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{entities::user, errors::ServiceError, AppState};

/// JWT claim set carried by access tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: i32,
    pub username: String,
    pub role: user::Role,
    /// Issued at (unix seconds).
    pub iat: i64,
    /// Expiration (unix seconds).
    pub exp: i64,
}

/// Response body for a successful authentication.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Issues and validates tokens, hashes and verifies passwords.
#[derive(Clone)]
pub struct AuthService {
    jwt_secret: String,
    jwt_expiration: i64,
}

impl AuthService {
    pub fn new(jwt_secret: impl Into<String>, jwt_expiration: i64) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            jwt_expiration,
        }
    }

    /// Issue a bearer token for an authenticated account.
    pub fn issue_token(&self, account: &user::Model) -> Result<TokenResponse, ServiceError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: account.id,
            username: account.username.clone(),
            role: account.role,
            iat: now,
            exp: now + self.jwt_expiration,
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| ServiceError::InternalError(format!("Token creation failed: {}", e)))?;

        Ok(TokenResponse {
            access_token: token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt_expiration,
        })
    }

    /// Decode and validate a bearer token.
    pub fn verify_token(&self, token: &str) -> Result<Claims, ServiceError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                ServiceError::AuthError("Token has expired".to_string())
            }
            _ => ServiceError::AuthError("Invalid authentication token".to_string()),
        })
    }
}

/// Hash a password with a fresh random salt. Stored as `salt$digest`.
pub fn hash_password(password: &str) -> String {
    let salt: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect();
    let digest = salted_digest(&salt, password);
    format!("{}${}", salt, digest)
}

/// Constant-shape comparison against a stored `salt$digest` hash.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, digest)) => salted_digest(salt, password) == digest,
        None => false,
    }
}

fn salted_digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Actor identity injected into handlers from the bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: i32,
    pub username: String,
    pub role: user::Role,
}

impl AuthUser {
    /// Exact allow-set membership check. Admin is listed explicitly in every
    /// allow set rather than implied.
    pub fn require_role(&self, allowed: &[user::Role]) -> Result<(), ServiceError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(
                "You do not have permission to perform this action".to_string(),
            ))
        }
    }
}

#[async_trait::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ServiceError::AuthError("Missing authorization header".to_string()))?;

        let token = header_value
            .strip_prefix("Bearer ")
            .ok_or_else(|| ServiceError::AuthError("Expected a bearer token".to_string()))?
            .trim();

        let claims = state.auth.verify_token(token)?;

        Ok(AuthUser {
            id: claims.sub,
            username: claims.username,
            role: claims.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::user::Role;

    fn account(role: Role) -> user::Model {
        user::Model {
            id: 7,
            username: "mabel".to_string(),
            hashed_password: hash_password("evergreen"),
            role,
            disabled: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn password_hash_round_trip() {
        let stored = hash_password("firs-and-pines");
        assert!(verify_password("firs-and-pines", &stored));
        assert!(!verify_password("spruce", &stored));
    }

    #[test]
    fn password_hashes_are_salted() {
        assert_ne!(hash_password("same"), hash_password("same"));
    }

    #[test]
    fn malformed_stored_hash_never_verifies() {
        assert!(!verify_password("anything", "no-salt-separator"));
    }

    #[test]
    fn token_round_trip_preserves_identity() {
        let auth = AuthService::new("test-secret-test-secret-test-secret", 3600);
        let token = auth.issue_token(&account(Role::SalesManager)).unwrap();
        assert_eq!(token.token_type, "Bearer");

        let claims = auth.verify_token(&token.access_token).unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.username, "mabel");
        assert_eq!(claims.role, Role::SalesManager);
    }

    #[test]
    fn token_from_wrong_secret_is_rejected() {
        let issuer = AuthService::new("secret-a-secret-a-secret-a-secret-a", 3600);
        let verifier = AuthService::new("secret-b-secret-b-secret-b-secret-b", 3600);
        let token = issuer.issue_token(&account(Role::Admin)).unwrap();
        assert!(verifier.verify_token(&token.access_token).is_err());
    }

    #[test]
    fn role_gate_is_exact_membership() {
        let user = AuthUser {
            id: 1,
            username: "ops".to_string(),
            role: Role::InventoryManager,
        };
        assert!(user
            .require_role(&[Role::Admin, Role::InventoryManager])
            .is_ok());
        assert!(user.require_role(&[Role::Admin, Role::SalesManager]).is_err());
    }

    #[test]
    fn admin_is_not_implied() {
        let admin = AuthUser {
            id: 2,
            username: "root".to_string(),
            role: Role::Admin,
        };
        assert!(admin.require_role(&[Role::SalesManager]).is_err());
    }
}
