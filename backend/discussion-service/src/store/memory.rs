use async_trait::async_trait;
use chrono::Utc;
use futures::future::ready;
use futures::StreamExt;
use std::collections::HashMap;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use super::{CommentStore, PostStore, StoreError, StoreResult, UserStore, VoteStore};
use crate::models::{Comment, NewPost, NewUser, Post, User, Vote, VoteValue};
use crate::realtime::{ChangeEvent, ChangeFeed, ChangeFilter, ChangeOp, ChangeStream, Collection};

const CHANGE_BUFFER: usize = 256;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    posts: HashMap<Uuid, Post>,
    votes: HashMap<Uuid, Vote>,
    comments: Vec<Comment>,
}

/// In-process backend with the same semantics as `PgStore`: unique
/// usernames, one vote per (post, user) with last write winning, and a
/// change event for every mutation.
pub struct MemoryStore {
    tables: RwLock<Tables>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            tables: RwLock::new(Tables::default()),
            changes,
        }
    }

    /// Inserts a user row as-is (fixed ids and timestamps).
    pub async fn seed_user(&self, user: User) {
        let id = user.id;
        self.tables.write().await.users.insert(id, user);
        self.publish(Collection::Users, ChangeOp::Insert, id, None);
    }

    /// Inserts a post row as-is (fixed timestamps and counters).
    pub async fn seed_post(&self, post: Post) {
        let id = post.id;
        self.tables.write().await.posts.insert(id, post);
        self.publish(Collection::Posts, ChangeOp::Insert, id, Some(id));
    }

    /// Number of vote rows for a (post, user) pair.
    pub async fn vote_rows(&self, post_id: Uuid, user_id: Uuid) -> usize {
        self.tables
            .read()
            .await
            .votes
            .values()
            .filter(|v| v.post_id == post_id && v.user_id == user_id)
            .count()
    }

    fn publish(&self, collection: Collection, op: ChangeOp, record_id: Uuid, post_id: Option<Uuid>) {
        // No subscribers is fine
        let _ = self.changes.send(ChangeEvent {
            collection,
            op,
            record_id,
            post_id,
        });
    }
}

fn newest_first(mut posts: Vec<Post>) -> Vec<Post> {
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    posts
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user(&self, user_id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&user_id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_users(&self, user_ids: &[Uuid]) -> StoreResult<Vec<User>> {
        let tables = self.tables.read().await;
        Ok(user_ids
            .iter()
            .filter_map(|id| tables.users.get(id).cloned())
            .collect())
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        if tables.users.contains_key(&user.id) {
            return Err(StoreError::Conflict(format!("user {} already exists", user.id)));
        }
        if tables.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict(format!(
                "username {} is taken",
                user.username
            )));
        }

        let row = User {
            id: user.id,
            username: user.username,
            avatar_url: user.avatar_url,
            created_at: Utc::now(),
        };
        tables.users.insert(row.id, row.clone());
        drop(tables);

        self.publish(Collection::Users, ChangeOp::Insert, row.id, None);
        Ok(row)
    }

    async fn update_avatar(&self, user_id: Uuid, avatar_url: Option<String>) -> StoreResult<bool> {
        let updated = match self.tables.write().await.users.get_mut(&user_id) {
            Some(user) => {
                user.avatar_url = avatar_url;
                true
            }
            None => false,
        };
        if updated {
            self.publish(Collection::Users, ChangeOp::Update, user_id, None);
        }
        Ok(updated)
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn find_post(&self, post_id: Uuid) -> StoreResult<Option<Post>> {
        Ok(self.tables.read().await.posts.get(&post_id).cloned())
    }

    async fn list_posts(&self) -> StoreResult<Vec<Post>> {
        let posts = self.tables.read().await.posts.values().cloned().collect();
        Ok(newest_first(posts))
    }

    async fn list_posts_by_user(&self, user_id: Uuid) -> StoreResult<Vec<Post>> {
        let posts = self
            .tables
            .read()
            .await
            .posts
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        Ok(newest_first(posts))
    }

    async fn insert_post(&self, user_id: Uuid, post: NewPost) -> StoreResult<Post> {
        let row = Post {
            id: Uuid::new_v4(),
            title: post.title,
            content: post.content,
            user_id,
            created_at: Utc::now(),
            votes: 0,
            comment_count: 0,
        };
        self.tables.write().await.posts.insert(row.id, row.clone());

        self.publish(Collection::Posts, ChangeOp::Insert, row.id, Some(row.id));
        Ok(row)
    }

    async fn set_post_votes(&self, post_id: Uuid, votes: i64) -> StoreResult<bool> {
        let changed = match self.tables.write().await.posts.get_mut(&post_id) {
            Some(post) => {
                let changed = post.votes != votes;
                post.votes = votes;
                Some(changed)
            }
            None => None,
        };

        // Unchanged counters publish nothing so recompute stays unobservable
        if changed == Some(true) {
            self.publish(Collection::Posts, ChangeOp::Update, post_id, Some(post_id));
        }
        Ok(changed.is_some())
    }

    async fn set_comment_count(&self, post_id: Uuid, count: i64) -> StoreResult<bool> {
        let changed = match self.tables.write().await.posts.get_mut(&post_id) {
            Some(post) => {
                let changed = post.comment_count != count;
                post.comment_count = count;
                Some(changed)
            }
            None => None,
        };

        if changed == Some(true) {
            self.publish(Collection::Posts, ChangeOp::Update, post_id, Some(post_id));
        }
        Ok(changed.is_some())
    }
}

#[async_trait]
impl VoteStore for MemoryStore {
    async fn find_vote(&self, post_id: Uuid, user_id: Uuid) -> StoreResult<Option<Vote>> {
        Ok(self
            .tables
            .read()
            .await
            .votes
            .values()
            .find(|v| v.post_id == post_id && v.user_id == user_id)
            .cloned())
    }

    async fn insert_vote(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        value: VoteValue,
    ) -> StoreResult<Vote> {
        let mut tables = self.tables.write().await;
        if !tables.posts.contains_key(&post_id) {
            return Err(StoreError::Unavailable(format!(
                "vote references missing post {}",
                post_id
            )));
        }

        let existing_id = tables
            .votes
            .values()
            .find(|v| v.post_id == post_id && v.user_id == user_id)
            .map(|v| v.id);

        let (id, op) = match existing_id {
            Some(id) => (id, ChangeOp::Update),
            None => (Uuid::new_v4(), ChangeOp::Insert),
        };
        let vote = Vote {
            id,
            post_id,
            user_id,
            value,
        };
        tables.votes.insert(id, vote.clone());
        drop(tables);

        self.publish(Collection::Votes, op, vote.id, Some(post_id));
        Ok(vote)
    }

    async fn update_vote_value(&self, vote_id: Uuid, value: VoteValue) -> StoreResult<()> {
        let post_id = match self.tables.write().await.votes.get_mut(&vote_id) {
            Some(vote) => {
                vote.value = value;
                Some(vote.post_id)
            }
            None => None,
        };

        if let Some(post_id) = post_id {
            self.publish(Collection::Votes, ChangeOp::Update, vote_id, Some(post_id));
        }
        Ok(())
    }

    async fn delete_vote(&self, vote_id: Uuid) -> StoreResult<()> {
        let removed = self.tables.write().await.votes.remove(&vote_id);

        if let Some(vote) = removed {
            self.publish(Collection::Votes, ChangeOp::Delete, vote_id, Some(vote.post_id));
        }
        Ok(())
    }

    async fn sum_votes(&self, post_id: Uuid) -> StoreResult<i64> {
        Ok(self
            .tables
            .read()
            .await
            .votes
            .values()
            .filter(|v| v.post_id == post_id)
            .map(|v| v.value.as_i64())
            .sum())
    }
}

#[async_trait]
impl CommentStore for MemoryStore {
    async fn insert_comment(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        content: String,
    ) -> StoreResult<Comment> {
        let comment = Comment {
            id: Uuid::new_v4(),
            content,
            post_id,
            user_id,
            created_at: Utc::now(),
        };
        self.tables.write().await.comments.push(comment.clone());

        self.publish(Collection::Comments, ChangeOp::Insert, comment.id, Some(post_id));
        Ok(comment)
    }

    async fn list_comments(&self, post_id: Uuid) -> StoreResult<Vec<Comment>> {
        // Insertion order is creation order
        Ok(self
            .tables
            .read()
            .await
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect())
    }

    async fn count_comments(&self, post_id: Uuid) -> StoreResult<i64> {
        Ok(self
            .tables
            .read()
            .await
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .count() as i64)
    }
}

#[async_trait]
impl ChangeFeed for MemoryStore {
    async fn subscribe(&self, filter: ChangeFilter) -> StoreResult<ChangeStream> {
        let rx = self.changes.subscribe();

        let events = futures::stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(event) => return Some((event, rx)),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Change subscriber lagged, events dropped");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        });

        Ok(events
            .filter(move |event| ready(filter.matches(event)))
            .boxed())
    }
}
