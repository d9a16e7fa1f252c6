//! Request authentication.
//!
//! Tokens are issued by the storefront's auth service and arrive in the
//! `token` cookie (or as a bearer token). This module only verifies them.

use std::future::{ready, Ready};

use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{web, FromRequest, HttpRequest};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

pub const TOKEN_COOKIE: &str = "token";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub id: i64,
    #[serde(rename = "isAdmin", default)]
    pub is_admin: bool,
    pub exp: usize,
}

#[derive(Clone)]
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                log::warn!("Rejected token: {e}");
                AppError::Unauthorized("Token is not valid".to_string())
            })
    }
}

/// The authenticated caller.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: i64,
    pub is_admin: bool,
}

/// An authenticated caller holding the admin claim.
#[derive(Debug, Clone, Copy)]
pub struct AdminUser(pub AuthUser);

fn token_from(req: &HttpRequest) -> Option<String> {
    if let Some(cookie) = req.cookie(TOKEN_COOKIE) {
        return Some(cookie.value().to_string());
    }
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

fn authenticate(req: &HttpRequest) -> Result<AuthUser, AppError> {
    let verifier = req
        .app_data::<web::Data<JwtVerifier>>()
        .ok_or_else(|| AppError::Internal("JwtVerifier is not registered".to_string()))?;
    let token = token_from(req)
        .ok_or_else(|| AppError::Unauthorized("No token, authorization denied".to_string()))?;
    let claims = verifier.verify(&token)?;
    Ok(AuthUser {
        id: claims.id,
        is_admin: claims.is_admin,
    })
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

impl FromRequest for AdminUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(authenticate(req).and_then(|user| {
            if user.is_admin {
                Ok(AdminUser(user))
            } else {
                Err(AppError::Forbidden)
            }
        }))
    }
}

#[cfg(test)]
pub(crate) fn issue_token(secret: &str, id: i64, is_admin: bool) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let claims = Claims {
        id,
        is_admin,
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("token encodes")
}
