/// In-process auth provider backed by Argon2id password hashes.
///
/// Used for local runs and tests; a deployment points `SessionContext` at the
/// real account service instead.
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AuthAccount, AuthError, AuthProvider, Session};

struct Credential {
    account: AuthAccount,
    password_hash: String,
}

pub struct InMemoryAuthProvider {
    credentials: RwLock<HashMap<String, Credential>>,
    sessions: RwLock<HashMap<String, Session>>,
    /// Session that `current_session` reports, set by the last sign-in
    current: RwLock<Option<Session>>,
    session_ttl: Duration,
}

impl InMemoryAuthProvider {
    pub fn new(session_ttl: Duration) -> Self {
        Self {
            credentials: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
            current: RwLock::new(None),
            session_ttl,
        }
    }

    /// Whether `access_token` belongs to a live session
    pub async fn session_for_token(&self, access_token: &str) -> Option<Session> {
        self.sessions
            .read()
            .await
            .get(access_token)
            .filter(|s| !s.is_expired())
            .cloned()
    }
}

impl Default for InMemoryAuthProvider {
    fn default() -> Self {
        Self::new(Duration::hours(1))
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Provider(format!("Password hashing failed: {}", e)))
}

fn verify_password(password: &str, password_hash: &str) -> Result<bool, AuthError> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| AuthError::Provider(format!("Invalid password hash format: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::Provider(format!(
            "Password verification failed: {}",
            e
        ))),
    }
}

#[async_trait]
impl AuthProvider for InMemoryAuthProvider {
    async fn current_session(&self) -> Result<Option<Session>, AuthError> {
        Ok(self.current.read().await.clone())
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthAccount, AuthError> {
        let email = normalize_email(email);
        let password_hash = hash_password(password)?;

        let mut credentials = self.credentials.write().await;
        if credentials.contains_key(&email) {
            return Err(AuthError::EmailTaken(email));
        }

        let account = AuthAccount {
            id: Uuid::new_v4(),
            email: email.clone(),
        };
        credentials.insert(
            email,
            Credential {
                account: account.clone(),
                password_hash,
            },
        );
        Ok(account)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = normalize_email(email);
        let (user_id, password_hash) = {
            let credentials = self.credentials.read().await;
            let credential = credentials
                .get(&email)
                .ok_or(AuthError::InvalidCredentials)?;
            (credential.account.id, credential.password_hash.clone())
        };

        if !verify_password(password, &password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        let session = Session {
            user_id,
            access_token: Uuid::new_v4().simple().to_string(),
            expires_at: Utc::now() + self.session_ttl,
        };
        self.sessions
            .write()
            .await
            .insert(session.access_token.clone(), session.clone());
        *self.current.write().await = Some(session.clone());

        Ok(session)
    }

    async fn delete_account(&self, account_id: Uuid) -> Result<(), AuthError> {
        self.credentials
            .write()
            .await
            .retain(|_, credential| credential.account.id != account_id);
        self.sessions
            .write()
            .await
            .retain(|_, session| session.user_id != account_id);
        Ok(())
    }

    async fn sign_out(&self, session: &Session) -> Result<(), AuthError> {
        self.sessions.write().await.remove(&session.access_token);

        let mut current = self.current.write().await;
        if current.as_ref().map(|s| &s.access_token) == Some(&session.access_token) {
            *current = None;
        }
        Ok(())
    }
}
