// src/auth.rs
//! Authorization gate in front of every `/api` route.
//!
//! Tokens are issued by the external account service (HS256 JWT carrying the
//! user's `id` and `username`). This module only verifies them; the secret is
//! injected from configuration. Handlers behind the gate see a [`Caller`] in the
//! request extensions and never the token itself.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::error::AggregatorError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingHeader,

    #[error("Invalid authorization format")]
    InvalidFormat,

    #[error("Invalid token")]
    InvalidToken,
}

/// Verified identity of the requester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub id: String,
    pub username: String,
}

pub trait Authorizer: Send + Sync {
    fn authorize(&self, bearer: &str) -> Result<Caller, AuthError>;
}

pub type SharedAuthorizer = Arc<dyn Authorizer>;

#[derive(Debug, Deserialize)]
struct Claims {
    id: String,
    username: String,
}

/// HS256 verifier; rejects expired tokens.
pub struct JwtAuthorizer {
    key: DecodingKey,
    validation: Validation,
}

impl JwtAuthorizer {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            key: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

impl Authorizer for JwtAuthorizer {
    fn authorize(&self, bearer: &str) -> Result<Caller, AuthError> {
        let data = decode::<Claims>(bearer, &self.key, &self.validation).map_err(|e| {
            tracing::debug!(target: "auth", error = %e, "token rejected");
            AuthError::InvalidToken
        })?;
        Ok(Caller {
            id: data.claims.id,
            username: data.claims.username,
        })
    }
}

/// Gate used when `auth.required = false`: everyone is an anonymous caller.
pub struct OpenGate;

impl Authorizer for OpenGate {
    fn authorize(&self, _bearer: &str) -> Result<Caller, AuthError> {
        Ok(Caller {
            id: "anonymous".into(),
            username: "anonymous".into(),
        })
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header.ok_or(AuthError::MissingHeader)?;
    let mut parts = header.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Ok(token),
        _ => Err(AuthError::InvalidFormat),
    }
}

/// axum middleware: verify the caller, or answer 401.
pub async fn require_caller(
    State(gate): State<SharedAuthorizer>,
    mut req: Request,
    next: Next,
) -> Result<Response, AggregatorError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let caller = match bearer_token(header) {
        Ok(token) => gate.authorize(token)?,
        // The open gate lets header-less requests through too.
        Err(AuthError::MissingHeader) => gate
            .authorize("")
            .map_err(|_| AuthError::MissingHeader)?,
        Err(e) => return Err(e.into()),
    };
    req.extensions_mut().insert(caller);
    Ok(next.run(req).await)
}
