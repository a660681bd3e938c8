use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use crate::{
    auth::{
        dto::PublicUser,
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        repo::User,
    },
    error::ApiError,
    state::AppState,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Registration does not start a session; the caller logs in separately.
pub async fn register(
    state: &AppState,
    username: &str,
    email: &str,
    password: &str,
) -> Result<(), ApiError> {
    let username = username.trim();
    let email = email.trim().to_lowercase();
    if username.is_empty() || email.is_empty() || password.is_empty() {
        return Err(ApiError::validation(
            "username, email and password are required",
        ));
    }
    if !is_valid_email(&email) {
        return Err(ApiError::validation("invalid email address"));
    }

    // Email first, then username; the first collision wins.
    if User::find_by_email(&state.db, &email).await?.is_some() {
        warn!(%email, "email already registered");
        return Err(ApiError::conflict("email already in use"));
    }
    if User::find_by_username(&state.db, username).await?.is_some() {
        warn!(%username, "username already taken");
        return Err(ApiError::conflict("username already in use"));
    }

    let hash = hash_password(password)?;
    let user = User::create(&state.db, username, &email, &hash)
        .await
        // A concurrent registration can still lose the race at the store.
        .map_err(|e| ApiError::conflict_on_unique(e, "username or email already in use"))?;

    info!(user_id = user.id, "user registered");
    Ok(())
}

/// Unknown email and wrong password are indistinguishable to the caller.
pub async fn login(
    state: &AppState,
    email: &str,
    password: &str,
) -> Result<(String, PublicUser), ApiError> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || password.is_empty() {
        return Err(ApiError::validation("email and password are required"));
    }

    let Some(user) = User::find_by_email(&state.db, &email).await? else {
        warn!(%email, "login for unknown email");
        return Err(ApiError::Auth);
    };

    if !verify_password(password, &user.password_hash)? {
        warn!(user_id = user.id, "login with wrong password");
        return Err(ApiError::Auth);
    }

    let token = JwtKeys::from_ref(state).sign(&user)?;
    info!(user_id = user.id, "user logged in");
    Ok((token, PublicUser::from(&user)))
}

/// A token can outlive its user; a stale id answers 404, not a crash.
pub async fn current_user(state: &AppState, id: i64) -> Result<PublicUser, ApiError> {
    match User::find_by_id(&state.db, id).await? {
        Some(user) => Ok(PublicUser::from(&user)),
        None => Err(ApiError::not_found("user not found")),
    }
}
