use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    Extension, Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::AppError;
use crate::saving::Store;
use crate::utils::now_millis;

pub const SESSION_COOKIE: &str = "session";

/// User data structure representing a registered learner
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Username (unique identifier for the user)
    pub username: String,

    /// Email address
    pub email: String,

    /// Argon2 hash of the user's password
    pub password_hash: String,

    /// Registration time, Unix milliseconds
    #[serde(default)]
    pub created_at: i64,

    /// Linked Discord identity, used for completion notifications
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discord: Option<DiscordLink>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DiscordLink {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub linked_at: i64,
}

/// Public view of a user, without the password hash.
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub username: String,
    pub email: String,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discord: Option<DiscordLink>,
}

impl From<&User> for Profile {
    fn from(user: &User) -> Self {
        Profile {
            username: user.username.clone(),
            email: user.email.clone(),
            created_at: user.created_at,
            discord: user.discord.clone(),
        }
    }
}

/// Credential data for login and registration
#[derive(Debug, Serialize, Deserialize)]
pub struct UserCredentials {
    pub username: String,

    /// Required for registration, ignored on login
    #[serde(default)]
    pub email: String,

    pub password: String,
}

/// Password change request from a signed-in user
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChangeRequest {
    pub old_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscordLinkRequest {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub avatar_url: String,
}

/// Authenticated session
#[derive(Debug, Clone)]
pub struct Session {
    /// Username of the authenticated user
    pub user_id: String,

    /// Time when the session expires
    pub expires_at: SystemTime,
}

/// Username attached to a request by [`require_auth`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub String);

lazy_static! {
    static ref SESSIONS: RwLock<HashMap<String, Session>> = RwLock::new(HashMap::new());
    static ref USERNAME: Regex = Regex::new(r"^[A-Za-z0-9_-]{3,32}$").expect("valid regex");
}

/// Register a new user
///
/// Usernames double as directory names in the store, so only letters,
/// digits, `_` and `-` are accepted.
///
/// # Errors
/// * `BadRequest` if a field is empty or the username is malformed
/// * `Conflict` if the username or email is already registered
pub fn register_user(
    store: &Store,
    username: &str,
    email: &str,
    password: &str,
) -> Result<User, AppError> {
    let username = username.trim();
    let email = email.trim();
    if username.is_empty() || password.is_empty() || email.is_empty() {
        return Err(AppError::BadRequest(
            "Username, email and password cannot be empty".to_string(),
        ));
    }
    if !USERNAME.is_match(username) {
        return Err(AppError::BadRequest(
            "Username must be 3-32 letters, digits, '_' or '-'".to_string(),
        ));
    }

    let mut users = store.load_users()?;
    if users.contains_key(username) {
        return Err(AppError::Conflict("Username already exists".to_string()));
    }
    if users.values().any(|user| user.email.eq_ignore_ascii_case(email)) {
        return Err(AppError::Conflict(
            "Email address is already registered".to_string(),
        ));
    }

    let user = User {
        username: username.to_string(),
        email: email.to_string(),
        password_hash: hash_password(password)?,
        created_at: now_millis(),
        discord: None,
    };

    store.create_user_dir(username)?;
    users.insert(username.to_string(), user.clone());
    store.save_users(&users)?;

    log::info!("Registered user {username}");
    Ok(user)
}

/// Checks whether the username and password match a registered user.
pub fn verify_user(store: &Store, username: &str, password: &str) -> Result<bool, AppError> {
    let users = store.load_users()?;

    match users.get(username) {
        Some(user) => verify_password(password, &user.password_hash),
        None => Ok(false),
    }
}

pub fn find_user(store: &Store, username: &str) -> Result<User, AppError> {
    store
        .load_users()?
        .remove(username)
        .ok_or_else(|| AppError::NotFound(format!("User {username}")))
}

/// Hash a password using Argon2id
fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AppError::Internal("Password hashing failed".to_string()))
}

/// Verify a password against a stored hash
fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal("Invalid password hash format".to_string()))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Create a new user session and return its id
pub fn create_session(username: &str, ttl: Duration) -> String {
    let session_id = Uuid::new_v4().to_string();
    let session = Session {
        user_id: username.to_string(),
        expires_at: SystemTime::now() + ttl,
    };

    let mut sessions = SESSIONS.write().unwrap_or_else(|e| e.into_inner());
    sessions.retain(|_, s| s.expires_at > SystemTime::now());
    sessions.insert(session_id.clone(), session);

    session_id
}

/// The username for a live session, if any.
pub fn validate_session(session_id: &str) -> Option<String> {
    let sessions = SESSIONS.read().unwrap_or_else(|e| e.into_inner());

    sessions
        .get(session_id)
        .filter(|session| session.expires_at > SystemTime::now())
        .map(|session| session.user_id.clone())
}

pub fn end_session(session_id: &str) {
    let mut sessions = SESSIONS.write().unwrap_or_else(|e| e.into_inner());
    sessions.remove(session_id);
}

/// The signed-in username from the request cookies, if any.
pub fn session_user(jar: &CookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE)
        .and_then(|cookie| validate_session(cookie.value()))
}

fn session_cookie(value: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

// Web handlers below

/// Handle user registration
///
/// Creates the account and signs the new user in.
pub async fn handle_signup(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(credentials): Json<UserCredentials>,
) -> Result<Response, AppError> {
    let user = register_user(
        &state.store,
        &credentials.username,
        &credentials.email,
        &credentials.password,
    )?;

    state.touch_progress(&user.username)?;
    let session_id = create_session(&user.username, state.config.session_ttl());

    Ok((
        StatusCode::CREATED,
        jar.add(session_cookie(session_id)),
        Json(Profile::from(&user)),
    )
        .into_response())
}

/// Handle user login
///
/// Validates credentials, creates a session and counts the visit towards
/// the daily streak.
pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(credentials): Json<UserCredentials>,
) -> Result<Response, AppError> {
    if !verify_user(&state.store, &credentials.username, &credentials.password)? {
        log::info!("Failed login for {}", credentials.username);
        return Err(AppError::InvalidCredentials);
    }

    let user = find_user(&state.store, &credentials.username)?;
    state.touch_progress(&user.username)?;
    let session_id = create_session(&user.username, state.config.session_ttl());

    Ok((jar.add(session_cookie(session_id)), Json(Profile::from(&user))).into_response())
}

/// Handle user logout
///
/// Drops the server-side session and clears the cookie.
pub async fn handle_logout(jar: CookieJar) -> (CookieJar, StatusCode) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        end_session(cookie.value());
    }

    (jar.remove(Cookie::from(SESSION_COOKIE)), StatusCode::NO_CONTENT)
}

pub async fn handle_me(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
) -> Result<Json<Profile>, AppError> {
    let user = find_user(&state.store, &username)?;
    Ok(Json(Profile::from(&user)))
}

/// Handle password change for authenticated users
pub async fn handle_change_password(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
    Json(change_req): Json<PasswordChangeRequest>,
) -> Result<StatusCode, AppError> {
    if change_req.new_password.is_empty() {
        return Err(AppError::BadRequest("New password cannot be empty".to_string()));
    }
    if change_req.new_password != change_req.confirm_password {
        return Err(AppError::BadRequest("New passwords don't match".to_string()));
    }

    let mut users = state.store.load_users()?;
    let user = users
        .get_mut(&username)
        .ok_or_else(|| AppError::NotFound(format!("User {username}")))?;

    if !verify_password(&change_req.old_password, &user.password_hash)? {
        return Err(AppError::BadRequest("Invalid old password".to_string()));
    }

    user.password_hash = hash_password(&change_req.new_password)?;
    state.store.save_users(&users)?;

    Ok(StatusCode::NO_CONTENT)
}

/// Link a Discord identity so completions can be announced by the bot.
pub async fn handle_link_discord(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
    Json(link): Json<DiscordLinkRequest>,
) -> Result<Json<Profile>, AppError> {
    if link.id.trim().is_empty() || link.username.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Discord id and username are required".to_string(),
        ));
    }

    let mut users = state.store.load_users()?;
    let user = users
        .get_mut(&username)
        .ok_or_else(|| AppError::NotFound(format!("User {username}")))?;

    user.discord = Some(DiscordLink {
        id: link.id.trim().to_string(),
        username: link.username.trim().to_string(),
        avatar_url: link.avatar_url,
        linked_at: now_millis(),
    });
    let profile = Profile::from(&*user);
    state.store.save_users(&users)?;

    Ok(Json(profile))
}

/// Authentication middleware
///
/// Passes the request on with a [`CurrentUser`] extension when the session
/// cookie is valid, otherwise answers 401.
pub async fn require_auth(jar: CookieJar, mut request: Request, next: Next) -> Response {
    match session_user(&jar) {
        Some(username) => {
            request.extensions_mut().insert(CurrentUser(username));
            next.run(request).await
        }
        None => AppError::Unauthorized.into_response(),
    }
}
