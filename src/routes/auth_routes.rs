use crate::config::AppConfig;
use crate::models::{
    Claims, LoginResponse, RefreshRequest, RegisterRequest, ServiceError, TokenType, User, UserCredentials,
    UserProfile,
};
use crate::state::AppState;
use crate::utils::{
    get_token_from_request, get_user_id_from_request, jwt, password, team_storage, token_storage, user_storage,
    validation, ACCESS_COOKIE, REFRESH_COOKIE,
};
use actix_web::cookie::{time, Cookie, SameSite};
use actix_web::{get, post, web, HttpMessage, HttpRequest, HttpResponse};
use chrono::Utc;
use log::{debug, error, info, warn};
use serde_json::json;
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 8;

fn session_cookie<'c>(config: &AppConfig, name: &'c str, value: String, max_age: time::Duration) -> Cookie<'c> {
    Cookie::build(name, value)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.cookie_secure)
        .max_age(max_age)
        .finish()
}

fn removal_cookie(name: &str) -> Cookie<'_> {
    let mut cookie = Cookie::build(name, "").path("/").finish();
    cookie.make_removal();
    cookie
}

// Issue a fresh token pair in the body and as cookies
fn session_response(config: &AppConfig, user: &User) -> Result<HttpResponse, ServiceError> {
    let tokens = jwt::issue_pair(config, user)?;
    let access_cookie = session_cookie(
        config,
        ACCESS_COOKIE,
        tokens.access_token.clone(),
        time::Duration::minutes(config.access_token_ttl_minutes),
    );
    let refresh_cookie = session_cookie(
        config,
        REFRESH_COOKIE,
        tokens.refresh_token.clone(),
        time::Duration::days(config.refresh_token_ttl_days),
    );

    Ok(HttpResponse::Ok()
        .cookie(access_cookie)
        .cookie(refresh_cookie)
        .json(LoginResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            user_id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
        }))
}

fn revoke_token(state: &AppState, token: &str, claims: &Claims) -> Result<(), ServiceError> {
    let fingerprint = jwt::fingerprint(token);
    state
        .db
        .with_conn(|conn| token_storage::revoke(conn, &fingerprint, claims.exp))
}

fn presented_refresh_token(req: &HttpRequest, body: &Option<web::Json<RefreshRequest>>) -> Option<String> {
    body.as_ref()
        .and_then(|b| b.refresh.clone())
        .filter(|t| !t.trim().is_empty())
        .or_else(|| req.cookie(REFRESH_COOKIE).map(|c| c.value().to_string()))
}

// Register a new user
#[post("/auth/register")]
async fn register(
    state: web::Data<AppState>,
    data: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ServiceError> {
    let email = user_storage::normalize_email(&data.email);
    info!("📝 Register request for email: {}", email);

    if !validation::is_valid_email(&email) {
        return Err(ServiceError::BadRequest("Enter a valid email address.".to_string()));
    }
    if data.name.trim().is_empty() {
        return Err(ServiceError::BadRequest("Name is required.".to_string()));
    }
    if data.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ServiceError::BadRequest(format!(
            "Password must be at least {} characters.",
            MIN_PASSWORD_LEN
        )));
    }
    if let Some(re_password) = &data.re_password {
        if re_password != &data.password {
            return Err(ServiceError::BadRequest("Passwords do not match.".to_string()));
        }
    }

    let user = User {
        id: Uuid::new_v4().to_string(),
        email: email.clone(),
        name: data.name.trim().to_string(),
        password_hash: password::hash_password(&data.password, state.config.bcrypt_cost)?,
        is_active: true,
        is_staff: false,
        created_at: Utc::now(),
    };

    state.db.transaction(|tx| {
        if user_storage::find_user_by_email(tx, &email)?.is_some() {
            error!("❌ Email already registered: {}", email);
            return Err(ServiceError::BadRequest("This email is already in use.".to_string()));
        }
        user_storage::save_user(tx, &user)
    })?;

    info!("✅ User registered successfully: {}", user.id);

    Ok(HttpResponse::Created().json(json!({
        "id": user.id,
        "email": user.email,
        "name": user.name
    })))
}

// Login and receive an access/refresh token pair
#[post("/auth/login")]
async fn login(
    state: web::Data<AppState>,
    credentials: web::Json<UserCredentials>,
) -> Result<HttpResponse, ServiceError> {
    info!("🔑 Login request for email: {}", credentials.email);

    let invalid = || ServiceError::Unauthorized("No active account found with the given credentials".to_string());

    let user = match state
        .db
        .with_conn(|conn| user_storage::find_user_by_email(conn, &credentials.email))?
    {
        Some(user) => user,
        None => {
            error!("❌ User not found: {}", credentials.email);
            return Err(invalid());
        }
    };

    if !password::verify_password(&credentials.password, &user.password_hash)? {
        error!("❌ Invalid password for user: {}", credentials.email);
        return Err(invalid());
    }
    if !user.is_active {
        error!("❌ Inactive account: {}", user.id);
        return Err(invalid());
    }

    info!("✅ User logged in successfully: {}", user.id);

    session_response(&state.config, &user)
}

// Exchange a refresh token for a new pair; the old refresh token is revoked
#[post("/auth/refresh")]
async fn refresh(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: Option<web::Json<RefreshRequest>>,
) -> Result<HttpResponse, ServiceError> {
    let token = presented_refresh_token(&req, &body)
        .ok_or_else(|| ServiceError::Unauthorized("Refresh token is required".to_string()))?;

    let claims = jwt::decode_token(&state.config, &token)?;
    if claims.token_type != TokenType::Refresh {
        return Err(ServiceError::Unauthorized("Refresh token required".to_string()));
    }

    let fingerprint = jwt::fingerprint(&token);
    let user = state.db.transaction(|tx| {
        if token_storage::is_revoked(tx, &fingerprint)? {
            error!("❌ Reuse of revoked refresh token for user: {}", claims.sub);
            return Err(ServiceError::Unauthorized("Token has been revoked".to_string()));
        }
        let user = user_storage::find_user_by_id(tx, &claims.sub)?
            .filter(|u| u.is_active)
            .ok_or_else(|| ServiceError::Unauthorized("User not found".to_string()))?;
        token_storage::revoke(tx, &fingerprint, claims.exp)?;
        Ok(user)
    })?;

    info!("🔄 Rotated tokens for user: {}", user.id);

    session_response(&state.config, &user)
}

// Revoke the presented tokens and clear the session cookies
#[post("/auth/logout")]
async fn logout(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: Option<web::Json<RefreshRequest>>,
) -> Result<HttpResponse, ServiceError> {
    let user_id = get_user_id_from_request(&req)?;

    if let Some(access_token) = get_token_from_request(&req) {
        let claims = jwt::decode_token(&state.config, &access_token)?;
        revoke_token(&state, &access_token, &claims)?;
    }

    if let Some(refresh_token) = presented_refresh_token(&req, &body) {
        match jwt::decode_token(&state.config, &refresh_token) {
            Ok(claims) if claims.sub == user_id => revoke_token(&state, &refresh_token, &claims)?,
            Ok(_) => warn!("⚠️ Ignoring refresh token of another user during logout: {}", user_id),
            Err(_) => debug!("🔍 Ignoring unusable refresh token during logout"),
        }
    }

    info!("👋 User logged out: {}", user_id);

    Ok(HttpResponse::Ok()
        .cookie(removal_cookie(ACCESS_COOKIE))
        .cookie(removal_cookie(REFRESH_COOKIE))
        .json(json!({
            "message": "Logged out successfully"
        })))
}

// Get current user info (requires authentication)
#[get("/auth/me")]
async fn me(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, ServiceError> {
    let user_id = get_user_id_from_request(&req)?;
    debug!("👤 Get user info request for: {}", user_id);

    let profile = state.db.with_conn(|conn| {
        let user = user_storage::find_user_by_id(conn, &user_id)?
            .ok_or_else(|| ServiceError::Unauthorized("User not found".to_string()))?;
        Ok(UserProfile {
            id: user.id,
            email: user.email,
            name: user.name,
            teams: team_storage::get_team_ids_for_user(conn, &user_id)?,
        })
    })?;

    Ok(HttpResponse::Ok().json(profile))
}

// Register all auth routes
pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(register)
        .service(login)
        .service(refresh)
        .service(logout)
        .service(me);
}
