//! Shared fixtures for integration tests: an in-memory backend with seeded
//! users and posts.
#![allow(dead_code)]

use chrono::{DateTime, Utc};
use discussion_service::models::{Post, User};
use discussion_service::store::{MemoryStore, Stores};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub const TIMEOUT: Duration = Duration::from_secs(2);

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub stores: Stores,
}

impl Fixture {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let stores = Stores::from_backend(store.clone());
        Self { store, stores }
    }

    pub async fn user(&self, username: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            avatar_url: None,
            created_at: Utc::now(),
        };
        self.store.seed_user(user.clone()).await;
        user
    }

    pub async fn post(&self, author: &User, title: &str) -> Post {
        self.post_at(author, title, 0, Utc::now()).await
    }

    pub async fn post_at(
        &self,
        author: &User,
        title: &str,
        votes: i64,
        created_at: DateTime<Utc>,
    ) -> Post {
        let post = Post {
            id: Uuid::new_v4(),
            title: title.to_string(),
            content: None,
            user_id: author.id,
            created_at,
            votes,
            comment_count: 0,
        };
        self.store.seed_post(post.clone()).await;
        post
    }
}
