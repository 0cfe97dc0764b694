/// Post service - handles post submission, lookup, the ranked feed and
/// user profiles.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::metrics::FEED_RANK_DURATION_SECONDS;
use crate::models::{NewPost, Post, PostWithAuthor, UserProfile, UserSummary};
use crate::services::ranking::{rank, SortStrategy};
use crate::store::{bounded, PostStore, Stores, UserStore};

#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostStore>,
    users: Arc<dyn UserStore>,
    timeout: Duration,
    max_items: usize,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostStore>,
        users: Arc<dyn UserStore>,
        timeout: Duration,
        max_items: usize,
    ) -> Self {
        Self {
            posts,
            users,
            timeout,
            max_items,
        }
    }

    pub fn from_stores(stores: &Stores, timeout: Duration, max_items: usize) -> Self {
        Self::new(stores.posts.clone(), stores.users.clone(), timeout, max_items)
    }

    /// Create a new post owned by `user_id`
    pub async fn create_post(&self, user_id: Uuid, post: NewPost) -> Result<Post> {
        let post = post.normalized();
        post.validate()?;

        if bounded(self.timeout, self.users.find_user(user_id))
            .await?
            .is_none()
        {
            return Err(AppError::UserNotFound(user_id.to_string()));
        }

        let created = bounded(self.timeout, self.posts.insert_post(user_id, post)).await?;
        info!(post_id = %created.id, user_id = %user_id, "Post created");
        Ok(created)
    }

    /// Get a post by ID with its author
    pub async fn get_post(&self, post_id: Uuid) -> Result<PostWithAuthor> {
        let post = bounded(self.timeout, self.posts.find_post(post_id))
            .await?
            .ok_or(AppError::PostNotFound(post_id))?;

        let user = bounded(self.timeout, self.users.find_user(post.user_id))
            .await?
            .map(|u| u.summary());

        Ok(PostWithAuthor { post, user })
    }

    /// All posts with authors, ordered by `strategy` and capped at the
    /// configured feed size.
    pub async fn feed(&self, strategy: SortStrategy) -> Result<Vec<PostWithAuthor>> {
        let start = Instant::now();

        let posts = bounded(self.timeout, self.posts.list_posts()).await?;
        let items = self.attach_authors(posts).await?;

        let mut ranked = rank(items, strategy);
        ranked.truncate(self.max_items);

        FEED_RANK_DURATION_SECONDS
            .with_label_values(&[strategy.as_str()])
            .observe(start.elapsed().as_secs_f64());
        debug!(strategy = %strategy, count = ranked.len(), "Feed built");

        Ok(ranked)
    }

    /// A user and their posts, newest first
    pub async fn user_profile(&self, username: &str) -> Result<UserProfile> {
        let user = bounded(self.timeout, self.users.find_user_by_username(username))
            .await?
            .ok_or_else(|| AppError::UserNotFound(username.to_string()))?;

        let posts = bounded(self.timeout, self.posts.list_posts_by_user(user.id)).await?;

        Ok(UserProfile { user, posts })
    }

    async fn attach_authors(&self, posts: Vec<Post>) -> Result<Vec<PostWithAuthor>> {
        let mut author_ids: Vec<Uuid> = posts.iter().map(|p| p.user_id).collect();
        author_ids.sort_unstable();
        author_ids.dedup();

        let authors: HashMap<Uuid, UserSummary> =
            bounded(self.timeout, self.users.find_users(&author_ids))
                .await?
                .into_iter()
                .map(|u| (u.id, u.summary()))
                .collect();

        Ok(posts
            .into_iter()
            .map(|post| {
                let user = authors.get(&post.user_id).cloned();
                PostWithAuthor { post, user }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;
    use crate::store::{MockPostStore, MockUserStore};
    use chrono::Utc;

    fn service(posts: MockPostStore, users: MockUserStore) -> PostService {
        PostService::new(
            Arc::new(posts),
            Arc::new(users),
            Duration::from_secs(1),
            50,
        )
    }

    #[tokio::test]
    async fn blank_title_is_rejected_before_any_store_call() {
        let mut posts = MockPostStore::new();
        posts.expect_insert_post().never();
        let mut users = MockUserStore::new();
        users.expect_find_user().never();

        let err = service(posts, users)
            .create_post(
                Uuid::new_v4(),
                NewPost {
                    title: "  \t ".into(),
                    content: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn unknown_author_cannot_post() {
        let mut posts = MockPostStore::new();
        posts.expect_insert_post().never();
        let mut users = MockUserStore::new();
        users.expect_find_user().returning(|_| Ok(None));

        let err = service(posts, users)
            .create_post(
                Uuid::new_v4(),
                NewPost {
                    title: "hello".into(),
                    content: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UserNotFound(_)));
    }

    #[tokio::test]
    async fn feed_is_capped_and_keeps_missing_authors() {
        let author = User {
            id: Uuid::new_v4(),
            username: "alice".into(),
            avatar_url: None,
            created_at: Utc::now(),
        };
        let author_id = author.id;
        let now = Utc::now();

        let mut posts = MockPostStore::new();
        posts.expect_list_posts().returning(move || {
            Ok((0..3)
                .map(|i| Post {
                    id: Uuid::new_v4(),
                    title: format!("post {}", i),
                    content: None,
                    user_id: if i == 0 { Uuid::new_v4() } else { author_id },
                    created_at: now - chrono::Duration::minutes(i),
                    votes: i,
                    comment_count: 0,
                })
                .collect())
        });
        let mut users = MockUserStore::new();
        users
            .expect_find_users()
            .returning(move |_| Ok(vec![author.clone()]));

        let service = PostService::new(Arc::new(posts), Arc::new(users), Duration::from_secs(1), 2);
        let feed = service.feed(SortStrategy::Top).await.unwrap();

        assert_eq!(feed.len(), 2);
        assert_eq!(feed[0].post.title, "post 2");
        assert_eq!(feed[0].user.as_ref().unwrap().username, "alice");
    }
}
