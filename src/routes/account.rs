/// Account routes.
///
/// Registration, login, token refresh, password change, user listing
/// and the admin self-check. Token and role gating happens in the
/// `AccessGate` middleware before these handlers run; the route table
/// in `startup.rs` says which routes are gated.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{hash_password, verify_password, Claims, TokenCodec};
use crate::error::{AccountError, AppError, AuthError, ErrorContext};
use crate::store::{NewUser, Role, SessionStore, User, UserStore};
use crate::validators::{is_valid_email, is_valid_username};

/// User registration request. Role defaults to customer.
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

/// User login request
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Token refresh request
#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Password change request; the old password acts as the proof of
/// identity, no token needed.
#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub email: String,
    pub old_password: String,
    pub new_password: String,
}

/// Login response with both tokens
#[derive(Serialize)]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

/// Refresh response with the new access token only
#[derive(Serialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    pub token_type: String,
}

/// Plain acknowledgement
#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// User listing entry (sanitized)
#[derive(Serialize)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
}

impl UserRecord {
    fn from_user(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// POST /user/create-user
///
/// Register a new user. The route wiring gates this behind a valid
/// admin token.
///
/// # Errors
/// - 400: Validation errors (invalid email or username)
/// - 409: Email or username already registered
pub async fn create_user(
    form: web::Json<RegisterRequest>,
    users: web::Data<dyn UserStore>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("create_user");

    // Validate inputs
    let email = is_valid_email(&form.email)?;
    let username = is_valid_username(&form.username)?;

    // Email is checked up front; username uniqueness is enforced by
    // the store's constraint.
    if users.find_by_email(&email).await?.is_some() {
        return Err(AccountError::DuplicateEmail.into());
    }

    let password_hash = hash_password(&form.password)?;

    let user = users
        .insert(NewUser {
            username,
            email,
            password_hash,
            role: form.role,
        })
        .await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = user.id,
        role = user.role.as_str(),
        "User registered successfully"
    );

    Ok(HttpResponse::Created().json(MessageResponse {
        message: "user created successfully".to_string(),
    }))
}

/// POST /user/login
///
/// Verify credentials, mint an access/refresh pair, and persist it as
/// an active session. Nothing is persisted on a failed login.
///
/// # Errors
/// - 401: Invalid credentials (email not found or wrong password)
///
/// # Security Notes
/// - Uses the same error for "not found" and "wrong password" so
///   callers cannot probe which emails exist
pub async fn login(
    form: web::Json<LoginRequest>,
    users: web::Data<dyn UserStore>,
    sessions: web::Data<dyn SessionStore>,
    codec: web::Data<TokenCodec>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("login");

    let user = users
        .find_by_email(&form.email)
        .await?
        .ok_or(AccountError::InvalidCredentials)?;

    if !verify_password(&form.password, &user.password_hash)? {
        return Err(AccountError::InvalidCredentials.into());
    }

    // Mint the pair and persist it; the access gate later requires
    // the session row, not just a valid signature.
    let access_token = codec.issue_access(user.id, None)?;
    let refresh_token = codec.issue_refresh(user.id, None)?;
    sessions
        .record(user.id, &access_token, &refresh_token)
        .await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = user.id,
        "User logged in successfully"
    );

    Ok(HttpResponse::Ok().json(TokenPairResponse {
        access_token,
        refresh_token,
        token_type: "bearer".to_string(),
    }))
}

/// POST /user/token/refresh
///
/// Mint a new access token from a refresh token. The new access token
/// is recorded as an active session alongside the presented refresh
/// token. The refresh token itself is not rotated and not checked
/// against the session store: a revoked session can keep refreshing
/// until its refresh token expires.
///
/// # Errors
/// - 401: Invalid or expired refresh token, or its subject no longer
///   resolves to a user
pub async fn refresh_token(
    form: web::Json<RefreshRequest>,
    users: web::Data<dyn UserStore>,
    sessions: web::Data<dyn SessionStore>,
    codec: web::Data<TokenCodec>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("refresh_token");

    let claims = codec
        .decode_refresh(&form.refresh_token)
        .ok_or(AuthError::InvalidToken)?;

    let subject = claims.subject_id().ok_or(AuthError::InvalidToken)?;

    let user = users
        .find_by_id(subject)
        .await?
        .ok_or(AuthError::InvalidToken)?;

    let access_token = codec.issue_access(user.id, None)?;
    sessions
        .record(user.id, &access_token, &form.refresh_token)
        .await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = user.id,
        "Access token refreshed"
    );

    Ok(HttpResponse::Ok().json(AccessTokenResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}

/// POST /user/change-password
///
/// Replace a user's password hash after verifying the old password.
///
/// # Errors
/// - 404: No user with that email
/// - 401: Old password does not verify
pub async fn change_password(
    form: web::Json<ChangePasswordRequest>,
    users: web::Data<dyn UserStore>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("change_password");

    let user = users
        .find_by_email(&form.email)
        .await?
        .ok_or(AccountError::UserNotFound)?;

    if !verify_password(&form.old_password, &user.password_hash)? {
        return Err(AccountError::InvalidCredentials.into());
    }

    let new_hash = hash_password(&form.new_password)?;
    users.update_password(user.id, &new_hash).await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = user.id,
        "Password changed"
    );

    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "password updated successfully".to_string(),
    }))
}

/// GET /user/getusers
///
/// List all users, sanitized. Requires a valid bearer token; no role
/// requirement.
pub async fn get_users(users: web::Data<dyn UserStore>) -> Result<HttpResponse, AppError> {
    let records: Vec<UserRecord> = users.list().await?.iter().map(UserRecord::from_user).collect();

    Ok(HttpResponse::Ok().json(records))
}

/// GET /user/am-i-admin
///
/// Admin-gated self check. Reaching the handler means every gate step
/// passed, so the answer is always `true`.
pub async fn am_i_admin(claims: web::ReqData<Claims>) -> Result<HttpResponse, AppError> {
    tracing::debug!(sub = %claims.sub, "Admin check passed");
    Ok(HttpResponse::Ok().json(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_role_defaults_to_customer() {
        let request: RegisterRequest = serde_json::from_str(
            r#"{"username":"alice","email":"alice@x.com","password":"pw1"}"#,
        )
        .unwrap();

        assert_eq!(request.role, Role::Customer);
    }

    #[test]
    fn test_register_accepts_known_roles() {
        let request: RegisterRequest = serde_json::from_str(
            r#"{"username":"v","email":"v@x.com","password":"pw","role":"vendor"}"#,
        )
        .unwrap();

        assert_eq!(request.role, Role::Vendor);
    }

    #[test]
    fn test_register_rejects_unknown_role() {
        let result = serde_json::from_str::<RegisterRequest>(
            r#"{"username":"alice","email":"a@x.com","password":"pw","role":"superuser"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_register_rejects_integer_role() {
        let result = serde_json::from_str::<RegisterRequest>(
            r#"{"username":"alice","email":"a@x.com","password":"pw","role":1}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_user_record_carries_no_secrets() {
        let user = User {
            id: 3,
            username: "alice".to_string(),
            password_hash: "$2b$12$secret".to_string(),
            email: "alice@x.com".to_string(),
            role: Role::Admin,
        };

        let json = serde_json::to_string(&UserRecord::from_user(&user)).unwrap();
        assert!(json.contains(r#""username":"alice""#));
        assert!(json.contains(r#""role":"admin""#));
        assert!(!json.contains("secret"));
        assert!(!json.contains("password"));
    }
}
