//! Identity Verifier
//!
//! HS256 JWTs carrying `{sub, username, jti, iat, exp, iss}`. `sub` is the
//! caller identity used for rate limiting and for the `x-user-id` header.

use anyhow::{Context, Result};
use axum::http::{HeaderMap, header::AUTHORIZATION};
use chrono::{Duration, Utc};
use gatekeeper_config::Config;
use gatekeeper_error::AppError;
use gatekeeper_types::Identity;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // identity id
    pub username: String,
    pub jti: String, // JWT ID (unique per token)
    pub iat: i64,    // Issued at
    pub exp: i64,    // Expiration time
    pub iss: String, // Issuer
}

impl Claims {
    pub fn identity(&self) -> Identity {
        Identity::new(self.sub.clone())
    }
}

pub struct AuthManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_ttl_secs: i64,
    issuer: String,
}

impl AuthManager {
    pub fn new(config: &Config) -> Result<Self> {
        if config.jwt_secret.trim().is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            access_token_ttl_secs: config.access_token_ttl_secs,
            issuer: config.jwt_issuer.clone(),
        })
    }

    /// Issue a signed token for `username`; returns the token and its expiry timestamp
    pub fn create_token(&self, username: &str) -> Result<(String, i64)> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.access_token_ttl_secs);

        let claims = Claims {
            sub: username.to_string(),
            username: username.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: self.issuer.clone(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .context("Failed to encode JWT token")?;

        Ok((token, exp.timestamp()))
    }

    /// Check signature, expiry and issuer
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[&self.issuer]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation)
            .context("Failed to verify JWT token")?;
        Ok(data.claims)
    }

    /// Verify the bearer credential of a request
    pub fn verify_request(&self, headers: &HeaderMap) -> Result<Claims, AppError> {
        let token = extract_bearer_token(headers)?;
        self.verify_token(token)
            .map_err(|e| AppError::auth_invalid(format!("{:#}", e)))
    }
}

/// Extract `<token>` from `Authorization: Bearer <token>`
///
/// Absent header → `AuthMissing`. Anything other than exactly two
/// space-separated parts with a `Bearer` scheme (any case) → `AuthMalformed`.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let value = headers.get(AUTHORIZATION).ok_or(AppError::AuthMissing)?;
    let value = value.to_str().map_err(|_| AppError::AuthMalformed)?;

    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None)
            if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() =>
        {
            Ok(token)
        }
        _ => Err(AppError::AuthMalformed),
    }
}
