//! Integration Tests: Session Context
//!
//! Coverage:
//! - loading flag lifecycle
//! - sign-up creates the profile row with the account id
//! - sign-in / sign-out transitions are observable through `subscribe`
//! - duplicate usernames and weak passwords are rejected
//! - a failed profile insert does not strand the account

mod common;

use common::{Fixture, TIMEOUT};
use async_trait::async_trait;
use discussion_service::auth::{InMemoryAuthProvider, SessionContext, SignUpRequest};
use discussion_service::models::{NewUser, User};
use discussion_service::store::{StoreResult, UserStore};
use discussion_service::AppError;
use std::sync::Arc;
use uuid::Uuid;

fn request(email: &str, password: &str, username: &str) -> SignUpRequest {
    SignUpRequest {
        email: email.to_string(),
        password: password.to_string(),
        username: username.to_string(),
    }
}

fn context(fixture: &Fixture) -> SessionContext {
    SessionContext::new(
        Arc::new(InMemoryAuthProvider::default()),
        fixture.stores.users.clone(),
        TIMEOUT,
    )
}

#[tokio::test]
async fn starts_loading_until_initialized() {
    let fixture = Fixture::new();
    let session = context(&fixture);
    assert!(session.snapshot().loading);

    session.initialize().await.unwrap();
    let state = session.snapshot();
    assert!(!state.loading);
    assert!(state.user.is_none());
    assert!(state.session.is_none());
}

#[tokio::test]
async fn sign_up_then_sign_in_round_trip() {
    let fixture = Fixture::new();
    let session = context(&fixture);
    session.initialize().await.unwrap();
    let mut changes = session.subscribe();

    let user = session
        .sign_up(request("carol@example.com", "Secret123", "carol"))
        .await
        .unwrap();
    assert!(session.current_user().is_none());

    let stored = fixture.store.find_user(user.id).await.unwrap().unwrap();
    assert_eq!(stored.username, "carol");

    let signed_in = session.sign_in("carol@example.com", "Secret123").await.unwrap();
    assert_eq!(signed_in.user_id, user.id);
    assert!(changes.has_changed().unwrap());
    assert_eq!(
        changes.borrow_and_update().user.as_ref().map(|u| u.id),
        Some(user.id)
    );
    assert_eq!(session.require_user().unwrap(), user.id);

    session.sign_out().await.unwrap();
    assert!(session.current_user().is_none());
    assert!(matches!(
        session.require_user(),
        Err(AppError::Unauthorized(_))
    ));
}

#[tokio::test]
async fn wrong_password_leaves_state_signed_out() {
    let fixture = Fixture::new();
    let session = context(&fixture);
    session.initialize().await.unwrap();
    session
        .sign_up(request("dave@example.com", "Secret123", "dave"))
        .await
        .unwrap();

    let err = session
        .sign_in("dave@example.com", "Secret124")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Auth(_)));
    assert!(session.snapshot().session.is_none());
}

#[tokio::test]
async fn username_must_be_unique() {
    let fixture = Fixture::new();
    fixture.user("erin").await;
    let session = context(&fixture);

    let err = session
        .sign_up(request("erin@example.com", "Secret123", "erin"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn sign_up_validates_input() {
    let fixture = Fixture::new();
    let session = context(&fixture);

    let cases = [
        request("not-an-email", "Secret123", "frank"),
        request("frank@example.com", "secret123", "frank"),
        request("frank@example.com", "Secretive", "frank"),
        request("frank@example.com", "Secret123", "fr"),
        request("frank@example.com", "Secret123", "frank!"),
    ];
    for case in cases {
        let err = session.sign_up(case).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)), "got {:?}", err);
    }
}

/// Username lookups miss, as when another sign-up claims the name between
/// the check and the insert.
struct RacingUsers(Arc<dyn UserStore>);

#[async_trait]
impl UserStore for RacingUsers {
    async fn find_user(&self, user_id: Uuid) -> StoreResult<Option<User>> {
        self.0.find_user(user_id).await
    }

    async fn find_user_by_username(&self, _username: &str) -> StoreResult<Option<User>> {
        Ok(None)
    }

    async fn find_users(&self, user_ids: &[Uuid]) -> StoreResult<Vec<User>> {
        self.0.find_users(user_ids).await
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        self.0.insert_user(user).await
    }

    async fn update_avatar(&self, user_id: Uuid, avatar_url: Option<String>) -> StoreResult<bool> {
        self.0.update_avatar(user_id, avatar_url).await
    }
}

#[tokio::test]
async fn lost_username_race_releases_the_email() {
    let fixture = Fixture::new();
    fixture.user("grace").await;
    let provider = Arc::new(InMemoryAuthProvider::default());

    let racing = SessionContext::new(
        provider.clone(),
        Arc::new(RacingUsers(fixture.stores.users.clone())),
        TIMEOUT,
    );
    let err = racing
        .sign_up(request("grace@example.com", "Secret123", "grace"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert!(matches!(
        racing.sign_in("grace@example.com", "Secret123").await,
        Err(AppError::Auth(_))
    ));

    let session = SessionContext::new(provider, fixture.stores.users.clone(), TIMEOUT);
    let user = session
        .sign_up(request("grace@example.com", "Secret123", "grace_h"))
        .await
        .unwrap();
    assert_eq!(user.username, "grace_h");
}
