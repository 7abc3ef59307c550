//! Identity collaborator: the user store, password hashing, and bearer
//! token issue/verification.
//!
//! Passwords are hashed with PBKDF2 in PHC string format. Tokens are
//! compact HS256 JWTs signed with the configured secret; verification is
//! stateless, so there is nothing to rotate or revoke server-side before
//! expiry.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use pbkdf2::password_hash::rand_core::OsRng;
use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::Pbkdf2;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

use crate::config::JwtSettings;
use crate::db::repository::user as repo;
use crate::db::DatabaseError;
use crate::models::{Role, User};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("{0}")]
    Validation(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Token signing failed")]
    Signing,

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Claims carried in the signed token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub username: String,
    pub full_name: String,
    pub role: Role,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Serialize)]
struct JwtHeader {
    alg: &'static str,
    typ: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub first_name: String,
    #[serde(default)]
    pub middle_name: Option<String>,
    pub last_name: String,
    #[serde(default)]
    pub second_last_name: Option<String>,
}

/// Issues credentials and tokens against the user table.
#[derive(Clone)]
pub struct AuthService {
    settings: JwtSettings,
}

impl AuthService {
    pub fn new(settings: JwtSettings) -> Self {
        Self { settings }
    }

    /// Check credentials and return a signed, time-limited token with the
    /// user's profile. Which part of the credentials was wrong is never
    /// disclosed.
    pub fn login(
        &self,
        conn: &Connection,
        request: &LoginRequest,
    ) -> Result<LoginResponse, AuthError> {
        validate_login(request)?;

        let user = repo::get_user_by_username(conn, &request.username)?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(&request.password, &user.password_hash) {
            tracing::warn!(username = %request.username, "Failed login attempt");
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.issue_token(&user)?;
        let expires_at = Utc::now() + Duration::hours(self.settings.expiration_hours);

        tracing::info!(username = %user.username, "User logged in");

        Ok(LoginResponse {
            token,
            username: user.username.clone(),
            email: user.email.clone(),
            full_name: user.full_name(),
            role: user.role,
            expires_at,
        })
    }

    /// Create the initial administrator account. Open by design for first
    /// setup; duplicate usernames or emails are rejected.
    pub fn create_admin(
        &self,
        conn: &Connection,
        request: &RegisterRequest,
    ) -> Result<User, AuthError> {
        self.create_with_role(conn, request, Role::Admin)
    }

    /// Create a regular account (callers enforce that an admin is asking).
    pub fn create_user(
        &self,
        conn: &Connection,
        request: &RegisterRequest,
    ) -> Result<User, AuthError> {
        self.create_with_role(conn, request, Role::User)
    }

    fn create_with_role(
        &self,
        conn: &Connection,
        request: &RegisterRequest,
        role: Role,
    ) -> Result<User, AuthError> {
        validate_registration(request)?;

        if repo::get_user_by_email(conn, &request.email)?.is_some() {
            return Err(AuthError::Validation(
                "A user with this email already exists".into(),
            ));
        }
        if repo::get_user_by_username(conn, &request.username)?.is_some() {
            return Err(AuthError::Validation(
                "A user with this username already exists".into(),
            ));
        }

        let user = User {
            id: Uuid::new_v4(),
            username: request.username.clone(),
            email: request.email.clone(),
            password_hash: hash_password(&request.password)?,
            first_name: request.first_name.clone(),
            middle_name: request.middle_name.clone(),
            last_name: request.last_name.clone(),
            second_last_name: request.second_last_name.clone(),
            role,
            created_at: Utc::now(),
        };

        repo::insert_user(conn, &user)?;

        tracing::info!(username = %user.username, role = %user.role, "User created");

        Ok(user)
    }

    pub fn get_user(&self, conn: &Connection, id: &Uuid) -> Result<User, AuthError> {
        repo::get_user_by_id(conn, id)?.ok_or(AuthError::UserNotFound)
    }

    pub fn list_users(&self, conn: &Connection) -> Result<Vec<User>, AuthError> {
        Ok(repo::list_users(conn)?)
    }

    /// Update profile fields; a non-empty password in the request also
    /// resets the password.
    pub fn update_user(
        &self,
        conn: &Connection,
        id: &Uuid,
        request: &RegisterRequest,
    ) -> Result<User, AuthError> {
        let mut user = repo::get_user_by_id(conn, id)?.ok_or(AuthError::UserNotFound)?;

        user.email = request.email.clone();
        user.first_name = request.first_name.clone();
        user.middle_name = request.middle_name.clone();
        user.last_name = request.last_name.clone();
        user.second_last_name = request.second_last_name.clone();

        if !repo::update_user(conn, &user)? {
            return Err(AuthError::UserNotFound);
        }

        if !request.password.is_empty() {
            validate_password(&request.password)?;
            repo::update_password(conn, id, &hash_password(&request.password)?)?;
        }

        Ok(user)
    }

    pub fn delete_user(&self, conn: &Connection, id: &Uuid) -> Result<(), AuthError> {
        if !repo::delete_user(conn, id)? {
            return Err(AuthError::UserNotFound);
        }
        tracing::info!(user_id = %id, "User deleted");
        Ok(())
    }

    /// Sign a compact HS256 token for the user.
    pub fn issue_token(&self, user: &User) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            full_name: user.full_name(),
            role: user.role,
            iss: self.settings.issuer.clone(),
            aud: self.settings.audience.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(self.settings.expiration_hours)).timestamp(),
        };

        let header = JwtHeader {
            alg: "HS256",
            typ: "JWT",
        };

        let header_json = serde_json::to_vec(&header).map_err(|_| AuthError::Signing)?;
        let claims_json = serde_json::to_vec(&claims).map_err(|_| AuthError::Signing)?;

        let message = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header_json),
            URL_SAFE_NO_PAD.encode(claims_json)
        );

        let mut mac = HmacSha256::new_from_slice(self.settings.secret.as_bytes())
            .map_err(|_| AuthError::Signing)?;
        mac.update(message.as_bytes());
        let signature = mac.finalize().into_bytes();

        Ok(format!("{message}.{}", URL_SAFE_NO_PAD.encode(signature)))
    }

    /// Verify signature, expiry, issuer, and audience; return the claims.
    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            return Err(AuthError::InvalidToken);
        }

        let message = format!("{}.{}", parts[0], parts[1]);
        let signature = URL_SAFE_NO_PAD
            .decode(parts[2])
            .map_err(|_| AuthError::InvalidToken)?;

        let mut mac = HmacSha256::new_from_slice(self.settings.secret.as_bytes())
            .map_err(|_| AuthError::InvalidToken)?;
        mac.update(message.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| AuthError::InvalidToken)?;

        let claims_json = URL_SAFE_NO_PAD
            .decode(parts[1])
            .map_err(|_| AuthError::InvalidToken)?;
        let claims: Claims =
            serde_json::from_slice(&claims_json).map_err(|_| AuthError::InvalidToken)?;

        if claims.exp < Utc::now().timestamp() {
            return Err(AuthError::InvalidToken);
        }
        if claims.iss != self.settings.issuer || claims.aud != self.settings.audience {
            return Err(AuthError::InvalidToken);
        }

        Ok(claims)
    }
}

/// PBKDF2 hash in PHC string format with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Pbkdf2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::Validation("Could not hash password".into()))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Pbkdf2.verify_password(password.as_bytes(), &parsed).is_ok()
}

fn validate_login(request: &LoginRequest) -> Result<(), AuthError> {
    if request.username.len() < 3 || request.username.len() > 50 {
        return Err(AuthError::Validation(
            "Username must be between 3 and 50 characters".into(),
        ));
    }
    if !request
        .username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '@' | '-'))
    {
        return Err(AuthError::Validation(
            "Username contains invalid characters".into(),
        ));
    }
    validate_password(&request.password)
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < 6 || password.len() > 100 {
        return Err(AuthError::Validation(
            "Password must be between 6 and 100 characters".into(),
        ));
    }
    Ok(())
}

fn validate_registration(request: &RegisterRequest) -> Result<(), AuthError> {
    if request.username.len() < 3 || request.username.len() > 50 {
        return Err(AuthError::Validation(
            "Username must be between 3 and 50 characters".into(),
        ));
    }
    if !request.email.contains('@') {
        return Err(AuthError::Validation("A valid email is required".into()));
    }
    validate_password(&request.password)?;
    if request.password != request.confirm_password {
        return Err(AuthError::Validation("Passwords do not match".into()));
    }
    if request.first_name.is_empty() || request.last_name.is_empty() {
        return Err(AuthError::Validation(
            "First and last name are required".into(),
        ));
    }
    Ok(())
}
