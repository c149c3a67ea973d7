// sopify-service/src/utils/mod.rs
use crate::config::AppConfig;
use crate::models::{AuthenticatedToken, Claims, ServiceError, TokenType, User};
use actix_web::http::header;
use actix_web::{dev::ServiceRequest, HttpMessage, HttpRequest};
use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::{debug, error};
use uuid::Uuid;

pub mod credential_storage;
pub mod db;
pub mod document_storage;
pub mod permissions;
pub mod task_storage;
pub mod team_storage;
pub mod token_storage;
pub mod user_storage;

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";

// JWT utility functions
pub mod jwt {
    use super::*;
    use sha2::{Digest, Sha256};

    pub struct TokenPair {
        pub access_token: String,
        pub refresh_token: String,
    }

    // Generate a signed token of the given type for a user
    pub fn generate_token(config: &AppConfig, user: &User, token_type: TokenType) -> Result<String, ServiceError> {
        let now = Utc::now();
        let lifetime = match token_type {
            TokenType::Access => Duration::minutes(config.access_token_ttl_minutes),
            TokenType::Refresh => Duration::days(config.refresh_token_ttl_days),
        };

        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            exp: (now + lifetime).timestamp() as usize,
            iat: now.timestamp() as usize,
            jti: Uuid::new_v4().to_string(),
            token_type,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret.as_ref()),
        )
        .map_err(|e| {
            error!("❌ Failed to sign token: {:?}", e);
            ServiceError::InternalServerError
        })
    }

    pub fn issue_pair(config: &AppConfig, user: &User) -> Result<TokenPair, ServiceError> {
        Ok(TokenPair {
            access_token: generate_token(config, user, TokenType::Access)?,
            refresh_token: generate_token(config, user, TokenType::Refresh)?,
        })
    }

    // Validate and decode a JWT token
    pub fn decode_token(config: &AppConfig, token: &str) -> Result<Claims, ServiceError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(config.jwt_secret.as_ref()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| {
            debug!("🔍 Token rejected: {:?}", e);
            ServiceError::Unauthorized("Invalid or expired token".to_string())
        })
    }

    // Extract JWT from Authorization header
    pub fn extract_token_from_header(auth_header: &str) -> Result<String, ServiceError> {
        match auth_header.strip_prefix("Bearer ") {
            Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
            _ => Err(ServiceError::Unauthorized("Invalid authorization header".to_string())),
        }
    }

    // Revoked tokens are stored by digest, never verbatim
    pub fn fingerprint(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

// Password utility functions
pub mod password {
    use super::*;

    // Hash a password using bcrypt
    pub fn hash_password(password: &str, cost: u32) -> Result<String, ServiceError> {
        hash(password, cost).map_err(|e| {
            error!("❌ Failed to hash password: {:?}", e);
            ServiceError::InternalServerError
        })
    }

    // Verify a password against a hash
    pub fn verify_password(password: &str, hash: &str) -> Result<bool, ServiceError> {
        verify(password, hash).map_err(|e| {
            error!("❌ Failed to verify password: {:?}", e);
            ServiceError::InternalServerError
        })
    }
}

pub mod validation {
    use lazy_static::lazy_static;
    use regex::Regex;

    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }

    pub fn is_valid_email(email: &str) -> bool {
        EMAIL_RE.is_match(email.trim())
    }
}

// Middleware for JWT authentication
pub mod auth_middleware {
    use super::*;
    use crate::state::AppState;
    use actix_web::dev::{forward_ready, Service, ServiceResponse, Transform};
    use actix_web::http::Method;
    use actix_web::{web, Error};
    use futures::future::{ok, Ready};
    use std::future::Future;
    use std::pin::Pin;

    const PUBLIC_PATHS: [&str; 4] = ["/", "/auth/register", "/auth/login", "/auth/refresh"];

    pub struct Authentication;

    impl<S, B> Transform<S, ServiceRequest> for Authentication
    where
        S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
        S::Future: 'static,
        B: 'static,
    {
        type Response = ServiceResponse<B>;
        type Error = Error;
        type Transform = AuthenticationMiddleware<S>;
        type InitError = ();
        type Future = Ready<Result<Self::Transform, Self::InitError>>;

        fn new_transform(&self, service: S) -> Self::Future {
            ok(AuthenticationMiddleware { service })
        }
    }

    pub struct AuthenticationMiddleware<S> {
        service: S,
    }

    // Bearer header first, then the access cookie
    fn presented_token(req: &ServiceRequest) -> Result<String, ServiceError> {
        if let Some(auth_header) = req.headers().get(header::AUTHORIZATION) {
            let auth_str = auth_header
                .to_str()
                .map_err(|_| ServiceError::Unauthorized("Invalid authorization header".to_string()))?;
            return jwt::extract_token_from_header(auth_str);
        }

        req.cookie(ACCESS_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .ok_or_else(|| ServiceError::Unauthorized("Authentication credentials were not provided".to_string()))
    }

    fn authenticate(req: &ServiceRequest) -> Result<(Claims, String), ServiceError> {
        let state = req.app_data::<web::Data<AppState>>().ok_or_else(|| {
            error!("❌ Application state missing from request");
            ServiceError::InternalServerError
        })?;

        let token = presented_token(req)?;
        let claims = jwt::decode_token(&state.config, &token)?;
        if claims.token_type != TokenType::Access {
            return Err(ServiceError::Unauthorized("Access token required".to_string()));
        }

        let fingerprint = jwt::fingerprint(&token);
        if state.db.with_conn(|conn| token_storage::is_revoked(conn, &fingerprint))? {
            return Err(ServiceError::Unauthorized("Token has been revoked".to_string()));
        }

        Ok((claims, token))
    }

    impl<S, B> Service<ServiceRequest> for AuthenticationMiddleware<S>
    where
        S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
        S::Future: 'static,
        B: 'static,
    {
        type Response = ServiceResponse<B>;
        type Error = Error;
        type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

        forward_ready!(service);

        fn call(&self, req: ServiceRequest) -> Self::Future {
            if req.method() == Method::OPTIONS || PUBLIC_PATHS.contains(&req.path()) {
                let fut = self.service.call(req);
                return Box::pin(fut);
            }

            match authenticate(&req) {
                Ok((claims, token)) => {
                    // Add the claims to the request extensions
                    req.extensions_mut().insert(claims);
                    req.extensions_mut().insert(AuthenticatedToken(token));
                    let fut = self.service.call(req);
                    Box::pin(fut)
                }
                Err(err) => {
                    debug!("🔒 Rejected request to {}: {}", req.path(), err);
                    Box::pin(async move { Err(err.into()) })
                }
            }
        }
    }
}

// Resolve the authenticated user id attached by the middleware
pub fn get_user_id_from_request(req: &HttpRequest) -> Result<String, ServiceError> {
    req.extensions()
        .get::<Claims>()
        .map(|claims| claims.sub.clone())
        .ok_or_else(|| ServiceError::Unauthorized("Authentication credentials were not provided".to_string()))
}

pub fn get_token_from_request(req: &HttpRequest) -> Option<String> {
    req.extensions().get::<AuthenticatedToken>().map(|token| token.0.clone())
}
