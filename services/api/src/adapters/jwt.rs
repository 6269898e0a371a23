//! services/api/src/adapters/jwt.rs
//!
//! HS256 bearer tokens. Implements the `TokenService` port from the `core` crate
//! using `jsonwebtoken`.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, TimeZone, Utc};
use interview_core::domain::UserClaims;
use interview_core::ports::{AuthError, TokenService};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

pub const TOKEN_ISSUER: &str = "interview-system";

/// How long an issued token stays valid.
pub fn token_lifetime() -> Duration {
    Duration::hours(24)
}

/// The wire form of the token payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct JwtClaims {
    user_id: String,
    email: String,
    name: String,
    role: String,
    iss: String,
    iat: i64,
    nbf: i64,
    exp: i64,
}

impl JwtClaims {
    fn to_domain(self) -> Result<UserClaims, AuthError> {
        Ok(UserClaims {
            user_id: self.user_id,
            email: self.email,
            name: self.name,
            role: self.role,
            issuer: self.iss,
            issued_at: timestamp(self.iat, "iat")?,
            not_before: timestamp(self.nbf, "nbf")?,
            expires_at: timestamp(self.exp, "exp")?,
        })
    }
}

fn timestamp(secs: i64, claim: &str) -> Result<DateTime<Utc>, AuthError> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| AuthError::Malformed(format!("{} claim is out of range", claim)))
}

/// Just enough of the header to read the algorithm. `jsonwebtoken` rejects
/// names it does not know (such as `none`) as a parse error, so the check runs
/// before decoding.
#[derive(Deserialize)]
struct RawHeader {
    alg: String,
}

fn require_hs256(token: &str) -> Result<(), AuthError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(AuthError::Malformed(
            "token must have 3 parts separated by dots".to_string(),
        ));
    }

    let header_bytes = URL_SAFE_NO_PAD
        .decode(parts[0])
        .map_err(|e| AuthError::Malformed(format!("failed to decode token header: {}", e)))?;
    let header: RawHeader = serde_json::from_slice(&header_bytes)
        .map_err(|e| AuthError::Malformed(format!("failed to parse token header: {}", e)))?;

    if header.alg != "HS256" {
        return Err(AuthError::BadAlgorithm);
    }
    Ok(())
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> AuthError {
    match err.kind() {
        ErrorKind::InvalidSignature => AuthError::BadSignature,
        ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => AuthError::BadAlgorithm,
        ErrorKind::ExpiredSignature => AuthError::Expired,
        ErrorKind::ImmatureSignature => AuthError::NotYetValid,
        _ => AuthError::Malformed(err.to_string()),
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// Issues and validates HS256 tokens with a shared secret.
#[derive(Clone)]
pub struct JwtTokenAdapter {
    secret: String,
}

impl JwtTokenAdapter {
    /// Creates a new `JwtTokenAdapter`. An empty secret makes every operation
    /// fail with [`AuthError::Config`].
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn secret(&self) -> Result<&[u8], AuthError> {
        if self.secret.is_empty() {
            return Err(AuthError::Config);
        }
        Ok(self.secret.as_bytes())
    }

    fn validation() -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        // Temporal bounds are checked explicitly in `validate`.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.leeway = 0;
        validation.required_spec_claims.clear();
        validation
    }
}

//=========================================================================================
// `TokenService` Trait Implementation
//=========================================================================================

impl TokenService for JwtTokenAdapter {
    fn issue(&self, user_id: &str, email: &str, name: &str, role: &str) -> Result<String, AuthError> {
        self.issue_at(user_id, email, name, role, Utc::now())
    }

    fn issue_at(
        &self,
        user_id: &str,
        email: &str,
        name: &str,
        role: &str,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let secret = self.secret()?;
        let claims = JwtClaims {
            user_id: user_id.to_string(),
            email: email.to_string(),
            name: name.to_string(),
            role: role.to_string(),
            iss: TOKEN_ISSUER.to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + token_lifetime()).timestamp(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret),
        )
        .map_err(map_jwt_error)
    }

    fn validate(&self, token: &str) -> Result<UserClaims, AuthError> {
        let secret = self.secret()?;
        require_hs256(token)?;
        let data = decode::<JwtClaims>(token, &DecodingKey::from_secret(secret), &Self::validation())
            .map_err(map_jwt_error)?;
        let claims = data.claims;

        let now = Utc::now().timestamp();
        if now < claims.nbf {
            return Err(AuthError::NotYetValid);
        }
        if now >= claims.exp {
            return Err(AuthError::Expired);
        }

        claims.to_domain()
    }
}
