/// JWT issuing and verification
///
/// Tokens are signed identity assertions carrying the subject, tenant, and
/// role claims, HS256-signed and time-limited. A verified token is NOT
/// sufficient for authorization on its own: claims must be re-checked
/// against the live user record (see [`crate::auth::middleware`]) so that a
/// user demoted or moved after issuance is rejected with a stale-token
/// error instead of being honored.
///
/// # Token Types
///
/// - **Access Token**: short-lived (24h), sent on every API request
/// - **Refresh Token**: long-lived (30d), exchanged for new access tokens
///
/// # Example
///
/// ```
/// use crewtask_shared::auth::jwt::{create_token, validate_token, Claims, TokenType};
/// use crewtask_shared::models::user::UserRole;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let claims = Claims::new(Uuid::new_v4(), Uuid::new_v4(), UserRole::Admin, TokenType::Access);
/// let token = create_token(&claims, "secret-key-at-least-32-bytes-long!!")?;
///
/// let verified = validate_token(&token, "secret-key-at-least-32-bytes-long!!")?;
/// assert_eq!(verified.role, UserRole::Admin);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::UserRole;

/// Error type for token operations
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Failed to encode a token
    #[error("failed to create token: {0}")]
    Create(String),

    /// Signature, issuer, or structural validation failed
    #[error("invalid token: {0}")]
    Invalid(String),

    /// Token has expired
    #[error("token has expired")]
    Expired,
}

/// Token type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Access token (24 hours)
    Access,

    /// Refresh token (30 days)
    Refresh,
}

impl TokenType {
    /// Default expiration for this token type
    pub fn default_expiration(&self) -> Duration {
        match self {
            TokenType::Access => Duration::hours(24),
            TokenType::Refresh => Duration::days(30),
        }
    }
}

/// JWT claims
///
/// Standard claims (`sub`, `iss`, `iat`, `exp`, `nbf`) plus the CrewTask
/// identity assertion: tenant and role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - user ID
    pub sub: Uuid,

    /// Issuer - always "crewtask"
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,

    /// Tenant the subject belonged to at issuance
    pub tenant_id: Uuid,

    /// Role the subject held at issuance
    pub role: UserRole,

    /// Access or refresh
    pub token_type: TokenType,
}

impl Claims {
    /// Creates claims with the default expiration for the token type
    pub fn new(user_id: Uuid, tenant_id: Uuid, role: UserRole, token_type: TokenType) -> Self {
        Self::with_expiration(user_id, tenant_id, role, token_type, token_type.default_expiration())
    }

    /// Creates claims with a custom expiration
    pub fn with_expiration(
        user_id: Uuid,
        tenant_id: Uuid,
        role: UserRole,
        token_type: TokenType,
        expires_in: Duration,
    ) -> Self {
        let now = Utc::now();
        let expiration = now + expires_in;

        Self {
            sub: user_id,
            iss: "crewtask".to_string(),
            iat: now.timestamp(),
            exp: expiration.timestamp(),
            nbf: now.timestamp(),
            tenant_id,
            role,
            token_type,
        }
    }

    /// Checks if the token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

/// Signs claims into a token string
///
/// # Errors
///
/// Returns `TokenError::Create` if encoding fails.
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, TokenError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key).map_err(|e| TokenError::Create(format!("token encoding failed: {e}")))
}

/// Validates a token and extracts its claims
///
/// Verifies the signature, expiration, not-before, and issuer.
///
/// # Errors
///
/// Returns `TokenError::Expired` for expired tokens and
/// `TokenError::Invalid` for every other failure.
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, TokenError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&["crewtask"]);
    validation.validate_exp = true;
    validation.validate_nbf = true;

    let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Invalid(format!("token validation failed: {e}")),
    })?;

    Ok(token_data.claims)
}

/// Validates a token and requires it to be an access token
pub fn validate_access_token(token: &str, secret: &str) -> Result<Claims, TokenError> {
    let claims = validate_token(token, secret)?;

    if claims.token_type != TokenType::Access {
        return Err(TokenError::Invalid(
            "expected access token, got refresh token".to_string(),
        ));
    }

    Ok(claims)
}

/// Validates a token and requires it to be a refresh token
pub fn validate_refresh_token(token: &str, secret: &str) -> Result<Claims, TokenError> {
    let claims = validate_token(token, secret)?;

    if claims.token_type != TokenType::Refresh {
        return Err(TokenError::Invalid(
            "expected refresh token, got access token".to_string(),
        ));
    }

    Ok(claims)
}

/// Exchanges a valid refresh token for a new access token
///
/// The new access token carries the same subject, tenant, and role claims.
/// The live-record re-check at request time is what catches a role that
/// changed between refreshes.
pub fn refresh_access_token(refresh_token: &str, secret: &str) -> Result<String, TokenError> {
    let refresh_claims = validate_refresh_token(refresh_token, secret)?;

    let access_claims = Claims::new(
        refresh_claims.sub,
        refresh_claims.tenant_id,
        refresh_claims.role,
        TokenType::Access,
    );

    create_token(&access_claims, secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    #[test]
    fn test_claims_creation() {
        let user_id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();

        let claims = Claims::new(user_id, tenant_id, UserRole::Member, TokenType::Access);

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.tenant_id, tenant_id);
        assert_eq!(claims.role, UserRole::Member);
        assert_eq!(claims.iss, "crewtask");
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_create_and_validate_roundtrip() {
        let user_id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();

        let claims = Claims::new(user_id, tenant_id, UserRole::Admin, TokenType::Access);
        let token = create_token(&claims, SECRET).expect("create");

        let verified = validate_token(&token, SECRET).expect("validate");
        assert_eq!(verified.sub, user_id);
        assert_eq!(verified.tenant_id, tenant_id);
        assert_eq!(verified.role, UserRole::Admin);
        assert_eq!(verified.token_type, TokenType::Access);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let claims = Claims::new(Uuid::new_v4(), Uuid::new_v4(), UserRole::Member, TokenType::Access);
        let token = create_token(&claims, SECRET).expect("create");

        assert!(validate_token(&token, "some-other-secret-32-bytes-long!!").is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let claims = Claims::with_expiration(
            Uuid::new_v4(),
            Uuid::new_v4(),
            UserRole::Member,
            TokenType::Access,
            Duration::seconds(-3600),
        );

        assert!(claims.is_expired());

        let token = create_token(&claims, SECRET).expect("create");
        let result = validate_token(&token, SECRET);

        assert!(matches!(result, Err(TokenError::Expired)));
    }

    #[test]
    fn test_access_refresh_type_checks() {
        let access = Claims::new(Uuid::new_v4(), Uuid::new_v4(), UserRole::Member, TokenType::Access);
        let access_token = create_token(&access, SECRET).unwrap();

        let refresh = Claims::new(Uuid::new_v4(), Uuid::new_v4(), UserRole::Member, TokenType::Refresh);
        let refresh_token = create_token(&refresh, SECRET).unwrap();

        assert!(validate_access_token(&access_token, SECRET).is_ok());
        assert!(validate_access_token(&refresh_token, SECRET).is_err());
        assert!(validate_refresh_token(&refresh_token, SECRET).is_ok());
        assert!(validate_refresh_token(&access_token, SECRET).is_err());
    }

    #[test]
    fn test_refresh_preserves_identity_claims() {
        let user_id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();

        let refresh_claims = Claims::new(user_id, tenant_id, UserRole::Admin, TokenType::Refresh);
        let refresh_token = create_token(&refresh_claims, SECRET).unwrap();

        let new_access = refresh_access_token(&refresh_token, SECRET).unwrap();
        let verified = validate_access_token(&new_access, SECRET).unwrap();

        assert_eq!(verified.sub, user_id);
        assert_eq!(verified.tenant_id, tenant_id);
        assert_eq!(verified.role, UserRole::Admin);
    }

    #[test]
    fn test_refresh_with_access_token_fails() {
        let claims = Claims::new(Uuid::new_v4(), Uuid::new_v4(), UserRole::Member, TokenType::Access);
        let token = create_token(&claims, SECRET).unwrap();

        assert!(refresh_access_token(&token, SECRET).is_err());
    }
}
