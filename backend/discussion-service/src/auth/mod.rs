/// Authentication collaborator and session state
///
/// `AuthProvider` is the external account service (credentials, sessions).
/// `SessionContext` holds the signed-in user for an in-process caller and
/// broadcasts every transition over a `watch` channel:
///
/// - created with `loading = true`
/// - `initialize` restores any existing session and clears `loading`
/// - `sign_in` / `sign_out` replace the state
///
/// Sign-up registers the account and creates the `users` profile row with
/// the same id; it does not sign the new account in.
pub mod memory;
pub mod validation;

pub use memory::InMemoryAuthProvider;
pub use validation::{validate_password, validate_username, SignUpRequest};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::models::{NewUser, User};
use crate::store::{bounded, UserStore};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email already registered: {0}")]
    EmailTaken(String),

    #[error("Session expired")]
    SessionExpired,

    #[error("Auth provider error: {0}")]
    Provider(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: Uuid,
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Account registered with the auth provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthAccount {
    pub id: Uuid,
    pub email: String,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Session persisted from an earlier sign-in, if still valid
    async fn current_session(&self) -> std::result::Result<Option<Session>, AuthError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> std::result::Result<AuthAccount, AuthError>;

    async fn sign_in(&self, email: &str, password: &str)
        -> std::result::Result<Session, AuthError>;

    async fn sign_out(&self, session: &Session) -> std::result::Result<(), AuthError>;

    /// Removes an account whose profile row could not be created
    async fn delete_account(&self, account_id: Uuid) -> std::result::Result<(), AuthError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    pub user: Option<User>,
    pub session: Option<Session>,
    pub loading: bool,
}

impl AuthState {
    pub fn initial() -> Self {
        Self {
            user: None,
            session: None,
            loading: true,
        }
    }

    fn signed_out() -> Self {
        Self {
            user: None,
            session: None,
            loading: false,
        }
    }
}

pub struct SessionContext {
    provider: Arc<dyn AuthProvider>,
    users: Arc<dyn UserStore>,
    state: watch::Sender<AuthState>,
    timeout: Duration,
}

impl SessionContext {
    pub fn new(provider: Arc<dyn AuthProvider>, users: Arc<dyn UserStore>, timeout: Duration) -> Self {
        let (state, _) = watch::channel(AuthState::initial());
        Self {
            provider,
            users,
            state,
            timeout,
        }
    }

    /// Restores the provider's current session, if any.
    ///
    /// `loading` is cleared even when the provider fails.
    pub async fn initialize(&self) -> Result<()> {
        let session = match self.provider.current_session().await {
            Ok(session) => session.filter(|s| !s.is_expired()),
            Err(e) => {
                warn!("Failed to restore session: {}", e);
                self.state.send_replace(AuthState::signed_out());
                return Err(e.into());
            }
        };

        match session {
            Some(session) => self.establish(session).await,
            None => {
                self.state.send_replace(AuthState::signed_out());
                Ok(())
            }
        }
    }

    /// Registers an account and creates its profile row.
    pub async fn sign_up(&self, request: SignUpRequest) -> Result<User> {
        request.validate()?;
        validate_username(&request.username)?;
        validate_password(&request.password)?;

        let taken = bounded(
            self.timeout,
            self.users.find_user_by_username(&request.username),
        )
        .await?;
        if taken.is_some() {
            return Err(AppError::Conflict(format!(
                "username {} is taken",
                request.username
            )));
        }

        let account = self
            .provider
            .sign_up(&request.email, &request.password)
            .await?;

        let inserted = bounded(
            self.timeout,
            self.users.insert_user(NewUser {
                id: account.id,
                username: request.username,
                avatar_url: None,
            }),
        )
        .await;

        let user = match inserted {
            Ok(user) => user,
            Err(e) => {
                // Drop the account so the email can register again
                warn!(account_id = %account.id, error = %e, "Profile insert failed after sign-up");
                if let Err(rollback) = self.provider.delete_account(account.id).await {
                    warn!(
                        account_id = %account.id,
                        error = %rollback,
                        "Account left without a profile row"
                    );
                }
                return Err(e.into());
            }
        };

        info!(user_id = %user.id, username = %user.username, "Account registered");
        Ok(user)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let session = self.provider.sign_in(email, password).await?;
        self.establish(session.clone()).await?;
        Ok(session)
    }

    pub async fn sign_out(&self) -> Result<()> {
        let session = self.state.borrow().session.clone();
        let result = match session {
            Some(session) => self.provider.sign_out(&session).await,
            None => Ok(()),
        };

        // Local state is cleared even if the provider call failed
        self.state.send_replace(AuthState::signed_out());
        result.map_err(AppError::from)
    }

    /// Profile of the signed-in user
    pub fn current_user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    /// Id of the signed-in user, or `Unauthorized`
    pub fn require_user(&self) -> Result<Uuid> {
        let state = self.state.borrow();
        match &state.session {
            Some(session) if !session.is_expired() => Ok(session.user_id),
            Some(_) => Err(AppError::Unauthorized("session expired".to_string())),
            None => Err(AppError::Unauthorized("sign in required".to_string())),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> AuthState {
        self.state.borrow().clone()
    }

    async fn establish(&self, session: Session) -> Result<()> {
        let user = bounded(self.timeout, self.users.find_user(session.user_id)).await?;
        if user.is_none() {
            warn!(user_id = %session.user_id, "Signed in without a profile row");
        }

        self.state.send_replace(AuthState {
            user,
            session: Some(session),
            loading: false,
        });
        Ok(())
    }
}
