/// User service - profile rows for authenticated accounts.
///
/// The profile id is always the account id from the caller's token, so an
/// account owns at most one profile. The avatar is the only field that can
/// change afterwards.
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::auth::validate_username;
use crate::error::{AppError, Result};
use crate::models::{AvatarUpdate, NewProfile, NewUser, User};
use crate::store::{bounded, Stores, UserStore};

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserStore>,
    timeout: Duration,
}

impl UserService {
    pub fn new(users: Arc<dyn UserStore>, timeout: Duration) -> Self {
        Self { users, timeout }
    }

    pub fn from_stores(stores: &Stores, timeout: Duration) -> Self {
        Self::new(stores.users.clone(), timeout)
    }

    /// Creates the profile for `user_id`; `Conflict` when the account already
    /// has one or the username is taken.
    pub async fn create_profile(&self, user_id: Uuid, profile: NewProfile) -> Result<User> {
        let username = profile.username.trim().to_string();
        validate_username(&username)?;
        profile.validate()?;

        if bounded(self.timeout, self.users.find_user(user_id))
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!(
                "profile already exists for {}",
                user_id
            )));
        }

        let user = bounded(
            self.timeout,
            self.users.insert_user(NewUser {
                id: user_id,
                username,
                avatar_url: profile.avatar_url,
            }),
        )
        .await?;

        info!(user_id = %user.id, username = %user.username, "Profile created");
        Ok(user)
    }

    pub async fn update_avatar(&self, user_id: Uuid, update: AvatarUpdate) -> Result<User> {
        update.validate()?;

        let updated = bounded(
            self.timeout,
            self.users.update_avatar(user_id, update.avatar_url),
        )
        .await?;
        if !updated {
            return Err(AppError::UserNotFound(user_id.to_string()));
        }

        bounded(self.timeout, self.users.find_user(user_id))
            .await?
            .ok_or_else(|| AppError::UserNotFound(user_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MockUserStore, StoreError};
    use chrono::Utc;

    fn service(users: MockUserStore) -> UserService {
        UserService::new(Arc::new(users), Duration::from_secs(1))
    }

    fn profile(username: &str) -> NewProfile {
        NewProfile {
            username: username.to_string(),
            avatar_url: None,
        }
    }

    #[tokio::test]
    async fn invalid_username_touches_nothing() {
        let mut users = MockUserStore::new();
        users.expect_find_user().never();
        users.expect_insert_user().never();

        let err = service(users)
            .create_profile(Uuid::new_v4(), profile("a b"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn second_profile_for_an_account_is_a_conflict() {
        let user_id = Uuid::new_v4();
        let mut users = MockUserStore::new();
        users.expect_find_user().returning(move |id| {
            Ok(Some(User {
                id,
                username: "alice".into(),
                avatar_url: None,
                created_at: Utc::now(),
            }))
        });
        users.expect_insert_user().never();

        let err = service(users)
            .create_profile(user_id, profile("alice2"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn taken_username_surfaces_as_conflict() {
        let mut users = MockUserStore::new();
        users.expect_find_user().returning(|_| Ok(None));
        users
            .expect_insert_user()
            .returning(|_| Err(StoreError::Conflict("username bob is taken".into())));

        let err = service(users)
            .create_profile(Uuid::new_v4(), profile("bob"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn avatar_update_for_unknown_user_is_not_found() {
        let mut users = MockUserStore::new();
        users.expect_update_avatar().returning(|_, _| Ok(false));
        users.expect_find_user().never();

        let err = service(users)
            .update_avatar(
                Uuid::new_v4(),
                AvatarUpdate {
                    avatar_url: Some("https://cdn.example.com/a.png".into()),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UserNotFound(_)));
    }
}
