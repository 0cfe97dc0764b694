/// Record storage collaborator
///
/// One trait per collection (`users`, `posts`, `votes`, `comments`). The
/// services only ever talk to these traits; `PgStore` backs them with
/// PostgreSQL and `MemoryStore` with in-process tables for tests and local
/// runs. Change notification lives in `crate::realtime`.
pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Comment, NewPost, NewUser, Post, User, Vote, VoteValue};
use crate::realtime::ChangeFeed;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Unique constraint violated: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user(&self, user_id: Uuid) -> StoreResult<Option<User>>;

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    /// Batch lookup; missing ids are skipped
    async fn find_users(&self, user_ids: &[Uuid]) -> StoreResult<Vec<User>>;

    /// Fails with `StoreError::Conflict` when the username is taken
    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;

    async fn update_avatar(&self, user_id: Uuid, avatar_url: Option<String>) -> StoreResult<bool>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PostStore: Send + Sync {
    async fn find_post(&self, post_id: Uuid) -> StoreResult<Option<Post>>;

    /// All posts, newest first
    async fn list_posts(&self) -> StoreResult<Vec<Post>>;

    /// Posts owned by a user, newest first
    async fn list_posts_by_user(&self, user_id: Uuid) -> StoreResult<Vec<Post>>;

    /// Inserts with `votes = 0` and `comment_count = 0`
    async fn insert_post(&self, user_id: Uuid, post: NewPost) -> StoreResult<Post>;

    /// Returns false when no post matched
    async fn set_post_votes(&self, post_id: Uuid, votes: i64) -> StoreResult<bool>;

    /// Returns false when no post matched
    async fn set_comment_count(&self, post_id: Uuid, count: i64) -> StoreResult<bool>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VoteStore: Send + Sync {
    async fn find_vote(&self, post_id: Uuid, user_id: Uuid) -> StoreResult<Option<Vote>>;

    /// Last write wins if a vote for the pair already exists
    async fn insert_vote(&self, post_id: Uuid, user_id: Uuid, value: VoteValue)
        -> StoreResult<Vote>;

    async fn update_vote_value(&self, vote_id: Uuid, value: VoteValue) -> StoreResult<()>;

    async fn delete_vote(&self, vote_id: Uuid) -> StoreResult<()>;

    /// Sum of vote values for a post (0 when it has none)
    async fn sum_votes(&self, post_id: Uuid) -> StoreResult<i64>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn insert_comment(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        content: String,
    ) -> StoreResult<Comment>;

    /// Comments on a post, oldest first
    async fn list_comments(&self, post_id: Uuid) -> StoreResult<Vec<Comment>>;

    async fn count_comments(&self, post_id: Uuid) -> StoreResult<i64>;
}

/// Handles to every collection of one backend.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub posts: Arc<dyn PostStore>,
    pub votes: Arc<dyn VoteStore>,
    pub comments: Arc<dyn CommentStore>,
    pub changes: Arc<dyn ChangeFeed>,
}

impl Stores {
    pub fn from_backend<S>(backend: Arc<S>) -> Self
    where
        S: UserStore + PostStore + VoteStore + CommentStore + ChangeFeed + 'static,
    {
        Self {
            users: backend.clone(),
            posts: backend.clone(),
            votes: backend.clone(),
            comments: backend.clone(),
            changes: backend,
        }
    }
}

/// Bounds a store call so a hung backend surfaces as `StoreError::Timeout`
/// instead of leaving the caller pending forever.
pub async fn bounded<T, F>(limit: Duration, call: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bounded_passes_through_fast_calls() {
        let result = bounded(Duration::from_secs(1), async { Ok::<_, StoreError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn bounded_times_out_slow_calls() {
        let result = bounded(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok::<_, StoreError>(7)
        })
        .await;

        assert!(matches!(result, Err(StoreError::Timeout(_))));
    }
}
