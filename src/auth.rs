// ABOUTME: JWT-based caller identification for the HTTP API
// ABOUTME: Issues HS256 tokens and resolves bearer headers to a user and their space
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Larder Contributors

//! # Authentication
//!
//! Larder has no login flow of its own. Tokens are minted by the admin CLI
//! (`larder token <user-id>`) and presented as `Authorization: Bearer <jwt>`.
//! A token names the user and their space. Both are re-checked against the
//! database on every request, so deleting a user revokes their tokens.

use crate::config::AuthConfig;
use crate::database::{User, UsersManager};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use larder_core::constants::service_names;
use larder_core::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// `JWT` validation error with detailed information
#[derive(Debug, Clone, Error)]
pub enum JwtValidationError {
    /// Token has expired
    #[error("JWT token expired at {}", expired_at.format("%Y-%m-%d %H:%M:%S UTC"))]
    TokenExpired {
        /// When the token expired
        expired_at: DateTime<Utc>,
    },
    /// Token signature or audience is invalid
    #[error("JWT token is invalid: {reason}")]
    TokenInvalid {
        /// Reason for invalidity
        reason: String,
    },
    /// Token is malformed (not proper `JWT` format)
    #[error("JWT token is malformed: {details}")]
    TokenMalformed {
        /// Details about malformation
        details: String,
    },
}

impl From<JwtValidationError> for AppError {
    fn from(error: JwtValidationError) -> Self {
        match error {
            JwtValidationError::TokenExpired { .. } => Self::auth_expired(),
            other => Self::auth_invalid(other.to_string()),
        }
    }
}

/// `JWT` claims for a Larder user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// User `ID`
    pub sub: String,
    /// Space `ID` the user belongs to
    pub space: String,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
    /// Audience (who the token is intended for)
    pub aud: String,
}

/// The identified caller of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthResult {
    /// Authenticated user `ID`
    pub user_id: Uuid,
    /// Space the user belongs to
    pub space_id: Uuid,
}

/// Authentication manager for `JWT` tokens
#[derive(Clone)]
pub struct AuthManager {
    secret: Vec<u8>,
    token_expiry_hours: i64,
}

impl AuthManager {
    /// Create a new authentication manager
    #[must_use]
    pub fn new(secret: &[u8], token_expiry_hours: i64) -> Self {
        Self {
            secret: secret.to_vec(),
            token_expiry_hours,
        }
    }

    /// Create an authentication manager from configuration
    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.jwt_secret.as_bytes(), config.jwt_expiry_hours)
    }

    /// Generate an HS256 `JWT` token for a user
    ///
    /// # Errors
    ///
    /// Returns an error if `JWT` encoding fails
    pub fn generate_token(&self, user: &User) -> AppResult<String> {
        let now = Utc::now();
        let expiry = now + Duration::hours(self.token_expiry_hours);

        let claims = Claims {
            sub: user.id.to_string(),
            space: user.space_id.to_string(),
            iat: now.timestamp(),
            exp: expiry.timestamp(),
            aud: service_names::LARDER.to_owned(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&self.secret),
        )
        .map_err(|e| AppError::internal(format!("Failed to sign token: {e}")))
    }

    /// Validate a token and return its claims
    ///
    /// # Errors
    ///
    /// Returns a [`JwtValidationError`] describing why the token was rejected
    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtValidationError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_audience(&[service_names::LARDER]);

        decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => JwtValidationError::TokenExpired {
                    expired_at: Self::expiry_of(token).unwrap_or_else(Utc::now),
                },
                ErrorKind::InvalidToken
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_) => JwtValidationError::TokenMalformed {
                    details: e.to_string(),
                },
                _ => JwtValidationError::TokenInvalid {
                    reason: e.to_string(),
                },
            })
    }

    /// Resolve an `Authorization` header to the calling user
    ///
    /// # Errors
    ///
    /// Returns 401-class errors when the header is missing, malformed, the
    /// token does not validate, or the user no longer exists in the space
    pub async fn authenticate_request(
        &self,
        users: &UsersManager,
        auth_header: Option<&str>,
    ) -> AppResult<AuthResult> {
        let header = auth_header.ok_or_else(AppError::auth_required)?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::auth_invalid("Authorization header must use Bearer scheme"))?;

        let claims = self.validate_token(token).map_err(|e| {
            warn!(error = %e, "Rejected bearer token");
            AppError::from(e)
        })?;

        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::auth_invalid("Token subject is not a user id"))?;
        let space_id = Uuid::parse_str(&claims.space)
            .map_err(|_| AppError::auth_invalid("Token space is not a space id"))?;

        if users.get_user_in_space(user_id, space_id).await?.is_none() {
            return Err(AppError::auth_invalid("Token user no longer exists"));
        }

        debug!(user.id = %user_id, space.id = %space_id, "Authenticated request");
        Ok(AuthResult { user_id, space_id })
    }

    /// Read `exp` from an already-rejected token without verifying it
    fn expiry_of(token: &str) -> Option<DateTime<Utc>> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        let data = decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation).ok()?;
        Utc.timestamp_opt(data.claims.exp, 0).single()
    }
}
