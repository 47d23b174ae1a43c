use crate::db::Store;
use crate::error::{AppError, AppResult, AuthFailure};
use crate::models::{Role, User};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rusqlite::{params, ErrorCode, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity carried inside a session token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub id: i64,
    pub role: Role,
    pub email: String,
    pub name: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

#[derive(Clone)]
pub struct CredentialStore {
    store: Store,
    encoding: EncodingKey,
    decoding: DecodingKey,
    session_ttl: Duration,
    bcrypt_cost: u32,
}

impl CredentialStore {
    pub fn new(store: Store, secret: &str, session_ttl: Duration, bcrypt_cost: u32) -> Self {
        Self {
            store,
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            session_ttl,
            bcrypt_cost,
        }
    }

    pub fn register(&self, name: &str, email: &str, password: &str) -> AppResult<i64> {
        if name.trim().is_empty() || email.trim().is_empty() || password.is_empty() {
            return Err(AppError::Validation("Заполните все поля".to_string()));
        }
        self.insert_user(name, email, password, Role::User)
    }

    /// Creates the admin account unless that email is already taken.
    /// Returns whether a new account was written.
    pub fn seed_admin(&self, name: &str, email: &str, password: &str) -> AppResult<bool> {
        if self.find_by_email(email)?.is_some() {
            return Ok(false);
        }
        self.insert_user(name, email, password, Role::Admin)?;
        log::info!("[auth] created admin account {}", email);
        Ok(true)
    }

    fn insert_user(&self, name: &str, email: &str, password: &str, role: Role) -> AppResult<i64> {
        let hash = bcrypt::hash(password, self.bcrypt_cost)?;
        let conn = self.store.lock()?;
        let inserted = conn.execute(
            "INSERT INTO users (name, email, password, role) VALUES (?1, ?2, ?3, ?4)",
            params![name, email, hash, role],
        );
        match inserted {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(failure, message))
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                Err(AppError::Conflict(
                    message.unwrap_or_else(|| "UNIQUE constraint failed: users.email".to_string()),
                ))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let conn = self.store.lock()?;
        let user = conn
            .query_row(
                "SELECT id, name, email, password, role FROM users WHERE email = ?1",
                params![email],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        email: row.get(2)?,
                        password_hash: row.get(3)?,
                        role: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    pub fn verify(&self, email: &str, password: &str) -> AppResult<User> {
        let user = self
            .find_by_email(email)?
            .ok_or(AppError::Auth(AuthFailure::NotFound))?;
        if !bcrypt::verify(password, &user.password_hash)? {
            return Err(AppError::Auth(AuthFailure::BadCredentials));
        }
        Ok(user)
    }

    pub fn issue_session(&self, user: &User) -> AppResult<String> {
        self.issue_session_at(user, Utc::now())
    }

    pub fn issue_session_at(&self, user: &User, issued_at: DateTime<Utc>) -> AppResult<String> {
        let claims = Claims {
            id: user.id,
            role: user.role,
            email: user.email.clone(),
            name: user.name.clone(),
            iat: issued_at.timestamp(),
            exp: (issued_at + self.session_ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding,
        )?)
    }

    /// Checks signature and expiry. Sessions are not tracked server-side, so
    /// a token stays valid until `exp` even after logout.
    pub fn validate_session(&self, token: &str) -> AppResult<Claims> {
        let validation = Validation::new(Algorithm::HS256);
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|err| {
                log::debug!("[auth] rejected session token: {}", err);
                AppError::InvalidToken
            })
    }
}
