//! Service token minting and decoding.
//!
//! Service tokens are short-lived HS256 JWTs asserting the session's identity
//! to the downstream API. The API is the only authority on their validity;
//! decoding here exists for cookie reconciliation.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Issuer identifier written into every service token.
pub const TOKEN_ISSUER: &str = "sessionbridge-dashboard";

/// Audience identifier the downstream API expects.
pub const TOKEN_AUDIENCE: &str = "sessionbridge-api";

/// Default service token lifetime: 1 hour
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

/// User role carried into the service token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }

    /// Parse a stored role, falling back to the least privileged one.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "ADMIN" => Role::Admin,
            _ => Role::User,
        }
    }
}

/// Identity assertion taken from the live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub subject: String,
    pub email: String,
    pub role: Role,
}

impl Claims {
    pub fn new(subject: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self {
            subject: subject.into(),
            email: email.into(),
            role,
        }
    }
}

/// Wire payload of a service token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceTokenClaims {
    /// Subject (user id)
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub iss: String,
    pub aud: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

impl From<ServiceTokenClaims> for Claims {
    fn from(payload: ServiceTokenClaims) -> Self {
        Claims {
            subject: payload.sub,
            email: payload.email,
            role: payload.role,
        }
    }
}

/// Process-wide signing secret with its derived keys.
///
/// Construction rejects an empty secret, so holding a `SigningSecret`
/// means minting can never silently run unkeyed.
#[derive(Clone)]
pub struct SigningSecret {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl SigningSecret {
    pub fn new(secret: &[u8]) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::MissingSecret);
        }
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        })
    }
}

impl std::fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SigningSecret(<redacted>)")
    }
}

/// A freshly minted service token.
#[derive(Debug, Clone)]
pub struct MintedToken {
    pub token: String,
    /// Issued at (Unix seconds)
    pub issued_at: u64,
    /// Expiration (Unix seconds), always `issued_at + ttl`
    pub expires_at: u64,
}

/// Latest expiry a token may carry; timestamps are stored as SQLite integers.
pub const MAX_EXPIRES_AT: u64 = i64::MAX as u64;

/// Current Unix time in seconds.
pub fn unix_now() -> Result<u64, TokenError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| TokenError::TimeError)
}

/// Mint a service token for `claims` expiring `ttl` from now.
pub fn mint(
    claims: &Claims,
    secret: &SigningSecret,
    ttl: Duration,
) -> Result<MintedToken, TokenError> {
    mint_at(claims, secret, ttl, unix_now()?)
}

/// Mint a service token as if the current time were `now`.
pub fn mint_at(
    claims: &Claims,
    secret: &SigningSecret,
    ttl: Duration,
    now: u64,
) -> Result<MintedToken, TokenError> {
    if claims.subject.is_empty() {
        return Err(TokenError::EmptySubject);
    }
    let ttl = ttl.as_secs();
    if ttl == 0 {
        return Err(TokenError::InvalidTtl);
    }

    let expires_at = now
        .checked_add(ttl)
        .filter(|exp| *exp <= MAX_EXPIRES_AT)
        .ok_or(TokenError::InvalidTtl)?;
    let payload = ServiceTokenClaims {
        sub: claims.subject.clone(),
        email: claims.email.clone(),
        role: claims.role,
        iss: TOKEN_ISSUER.to_string(),
        aud: TOKEN_AUDIENCE.to_string(),
        iat: now,
        exp: expires_at,
    };

    let token = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &payload,
        &secret.encoding_key,
    )
    .map_err(TokenError::Encoding)?;

    Ok(MintedToken {
        token,
        issued_at: now,
        expires_at,
    })
}

/// Decode a service token back into claims.
///
/// Only used to compare a stored cookie against the live session; it never
/// grants access by itself.
pub fn decode(token: &str, secret: &SigningSecret) -> Result<Claims, TokenError> {
    decode_payload(token, secret).map(Claims::from)
}

/// Decode and validate the full token payload.
pub fn decode_payload(
    token: &str,
    secret: &SigningSecret,
) -> Result<ServiceTokenClaims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_issuer(&[TOKEN_ISSUER]);
    validation.set_audience(&[TOKEN_AUDIENCE]);

    let token_data =
        jsonwebtoken::decode::<ServiceTokenClaims>(token, &secret.decoding_key, &validation)
            .map_err(TokenError::Decoding)?;

    Ok(token_data.claims)
}

/// Errors that can occur while minting or decoding service tokens.
#[derive(Debug)]
pub enum TokenError {
    /// No signing secret configured
    MissingSecret,
    /// Claims without a subject cannot be minted
    EmptySubject,
    /// Token lifetime must be at least one second and keep the expiry in range
    InvalidTtl,
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Error decoding the token (malformed, expired, or wrong signature)
    Decoding(jsonwebtoken::errors::Error),
    /// System time error
    TimeError,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::MissingSecret => write!(f, "Signing secret is not configured"),
            TokenError::EmptySubject => write!(f, "Claims have an empty subject"),
            TokenError::InvalidTtl => write!(f, "Token TTL is zero or out of range"),
            TokenError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            TokenError::Decoding(e) => write!(f, "Failed to decode token: {}", e),
            TokenError::TimeError => write!(f, "System time error"),
        }
    }
}

impl std::error::Error for TokenError {}
