use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config;
use crate::database::models::identity::Identity;

/// Closed set of roles. Route allow-lists reference these variants directly,
/// so a misspelled role is a compile error rather than a silently-failing
/// string comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "member" => Ok(Role::Member),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Which of the two session credentials a token is. The two kinds are signed
/// with distinct secrets, so an access token can never pass verification as
/// a refresh token or vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    fn secret(&self) -> &'static str {
        let security = &config::config().security;
        match self {
            TokenKind::Access => &security.access_token_secret,
            TokenKind::Refresh => &security.refresh_token_secret,
        }
    }

    fn ttl(&self) -> Duration {
        let security = &config::config().security;
        match self {
            TokenKind::Access => Duration::hours(security.access_token_ttl_hours),
            TokenKind::Refresh => Duration::days(security.refresh_token_ttl_days),
        }
    }
}

/// Identity snapshot carried inside a signed token. Stateless by design:
/// there is no revocation list, and the claims are trusted without a
/// per-request database fetch, so role or status changes take effect at the
/// next token issuance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub name: String,
    pub nickname: String,
    pub phone: String,
    pub avatar: Option<String>,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    fn new(identity: &Identity, role: Role, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: identity.id,
            username: identity.username.clone(),
            name: identity.name.clone(),
            nickname: identity.nickname.clone(),
            phone: identity.phone.clone(),
            avatar: identity.avatar.clone(),
            role,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid token: {0}")]
    Invalid(String),
    #[error("token secret not configured")]
    MissingSecret,
    #[error("token encoding failed: {0}")]
    Encoding(String),
}

/// Serialize the identity's claim set and sign it with the secret matching
/// `kind`. Access tokens live 3 hours, refresh tokens 7 days (configurable).
pub fn issue(identity: &Identity, kind: TokenKind) -> Result<String, TokenError> {
    let role = identity
        .role()
        .map_err(|e| TokenError::Encoding(format!("identity has {e}")))?;
    let claims = Claims::new(identity, role, kind.ttl());
    sign(&claims, kind)
}

/// Verify signature and expiry against the secret for `kind` and return the
/// embedded identity snapshot.
pub fn verify(token: &str, kind: TokenKind) -> Result<Claims, TokenError> {
    let secret = kind.secret();
    if secret.is_empty() {
        return Err(TokenError::MissingSecret);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::default();

    let token_data = decode::<Claims>(token, &decoding_key, &validation)
        .map_err(|e| TokenError::Invalid(e.to_string()))?;

    Ok(token_data.claims)
}

fn sign(claims: &Claims, kind: TokenKind) -> Result<String, TokenError> {
    let secret = kind.secret();
    if secret.is_empty() {
        return Err(TokenError::MissingSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), claims, &encoding_key)
        .map_err(|e| TokenError::Encoding(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_identity() -> Identity {
        Identity {
            id: Uuid::new_v4(),
            username: "alice".into(),
            password_hash: String::new(),
            name: "Alice".into(),
            nickname: "al".into(),
            phone: "555-0100".into(),
            avatar: None,
            role: "admin".into(),
            status: "active".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn issue_and_verify_round_trip() {
        let identity = test_identity();
        let token = issue(&identity, TokenKind::Access).unwrap();
        let claims = verify(&token, TokenKind::Access).unwrap();
        assert_eq!(claims.sub, identity.id);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.role, Role::Admin);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn kinds_do_not_cross_verify() {
        let identity = test_identity();
        let access = issue(&identity, TokenKind::Access).unwrap();
        let refresh = issue(&identity, TokenKind::Refresh).unwrap();
        assert!(verify(&access, TokenKind::Refresh).is_err());
        assert!(verify(&refresh, TokenKind::Access).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let identity = test_identity();
        let role = identity.role().unwrap();
        // Well past the default validation leeway
        let mut claims = Claims::new(&identity, role, Duration::hours(1));
        claims.exp = (Utc::now() - Duration::hours(4)).timestamp();
        let token = sign(&claims, TokenKind::Access).unwrap();
        assert!(verify(&token, TokenKind::Access).is_err());
    }

    #[test]
    fn tampered_token_is_rejected() {
        let identity = test_identity();
        let token = issue(&identity, TokenKind::Access).unwrap();
        let mut tampered = token.clone();
        tampered.pop();
        tampered.push(if token.ends_with('A') { 'B' } else { 'A' });
        assert!(verify(&tampered, TokenKind::Access).is_err());
    }

    #[test]
    fn role_parsing_is_closed() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("member".parse::<Role>().unwrap(), Role::Member);
        assert!("root".parse::<Role>().is_err());
    }
}
