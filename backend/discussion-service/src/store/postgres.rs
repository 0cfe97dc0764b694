use async_trait::async_trait;
use futures::future::ready;
use futures::StreamExt;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use super::{CommentStore, PostStore, StoreError, StoreResult, UserStore, VoteStore};
use crate::models::{Comment, NewPost, NewUser, Post, User, Vote, VoteValue};
use crate::realtime::{ChangeEvent, ChangeFeed, ChangeFilter, ChangeStream, CHANGE_CHANNEL};

/// PostgreSQL backend. Row-change events come from the `notify_row_change`
/// triggers installed by the migrations.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_unique_violation(err: sqlx::Error, what: impl FnOnce() -> String) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict(what()),
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_user(&self, user_id: Uuid) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, avatar_url, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, avatar_url, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_users(&self, user_ids: &[Uuid]) -> StoreResult<Vec<User>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, avatar_url, created_at
            FROM users
            WHERE id = ANY($1)
            "#,
        )
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let username = user.username.clone();
        let row = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, avatar_url)
            VALUES ($1, $2, $3)
            RETURNING id, username, avatar_url, created_at
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.avatar_url)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, || format!("username {} is taken", username)))?;

        Ok(row)
    }

    async fn update_avatar(&self, user_id: Uuid, avatar_url: Option<String>) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET avatar_url = $1
            WHERE id = $2
            "#,
        )
        .bind(avatar_url)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl PostStore for PgStore {
    async fn find_post(&self, post_id: Uuid) -> StoreResult<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, title, content, user_id, created_at, votes, comment_count
            FROM posts
            WHERE id = $1
            "#,
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(post)
    }

    async fn list_posts(&self) -> StoreResult<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, title, content, user_id, created_at, votes, comment_count
            FROM posts
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(posts)
    }

    async fn list_posts_by_user(&self, user_id: Uuid) -> StoreResult<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, title, content, user_id, created_at, votes, comment_count
            FROM posts
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(posts)
    }

    async fn insert_post(&self, user_id: Uuid, post: NewPost) -> StoreResult<Post> {
        let row = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (title, content, user_id, votes, comment_count)
            VALUES ($1, $2, $3, 0, 0)
            RETURNING id, title, content, user_id, created_at, votes, comment_count
            "#,
        )
        .bind(&post.title)
        .bind(&post.content)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn set_post_votes(&self, post_id: Uuid, votes: i64) -> StoreResult<bool> {
        // Rows whose counter already matches are skipped so no change event fires
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET votes = $1
            WHERE id = $2 AND votes IS DISTINCT FROM $1
            "#,
        )
        .bind(votes)
        .bind(post_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }
        self.post_exists(post_id).await
    }

    async fn set_comment_count(&self, post_id: Uuid, count: i64) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET comment_count = $1
            WHERE id = $2 AND comment_count IS DISTINCT FROM $1
            "#,
        )
        .bind(count)
        .bind(post_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }
        self.post_exists(post_id).await
    }
}

impl PgStore {
    async fn post_exists(&self, post_id: Uuid) -> StoreResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM posts WHERE id = $1)")
                .bind(post_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }
}

#[async_trait]
impl VoteStore for PgStore {
    async fn find_vote(&self, post_id: Uuid, user_id: Uuid) -> StoreResult<Option<Vote>> {
        let vote = sqlx::query_as::<_, Vote>(
            r#"
            SELECT id, post_id, user_id, value
            FROM votes
            WHERE post_id = $1 AND user_id = $2
            "#,
        )
        .bind(post_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(vote)
    }

    async fn insert_vote(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        value: VoteValue,
    ) -> StoreResult<Vote> {
        // A concurrent insert for the same pair turns into an update: last write wins
        let vote = sqlx::query_as::<_, Vote>(
            r#"
            INSERT INTO votes (post_id, user_id, value)
            VALUES ($1, $2, $3)
            ON CONFLICT (post_id, user_id) DO UPDATE
            SET value = EXCLUDED.value
            RETURNING id, post_id, user_id, value
            "#,
        )
        .bind(post_id)
        .bind(user_id)
        .bind(value)
        .fetch_one(&self.pool)
        .await?;

        Ok(vote)
    }

    async fn update_vote_value(&self, vote_id: Uuid, value: VoteValue) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE votes
            SET value = $1
            WHERE id = $2
            "#,
        )
        .bind(value)
        .bind(vote_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_vote(&self, vote_id: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM votes WHERE id = $1")
            .bind(vote_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn sum_votes(&self, post_id: Uuid) -> StoreResult<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(value), 0)::BIGINT FROM votes WHERE post_id = $1",
        )
        .bind(post_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }
}

#[async_trait]
impl CommentStore for PgStore {
    async fn insert_comment(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        content: String,
    ) -> StoreResult<Comment> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO comments (content, post_id, user_id)
            VALUES ($1, $2, $3)
            RETURNING id, content, post_id, user_id, created_at
            "#,
        )
        .bind(content)
        .bind(post_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(comment)
    }

    async fn list_comments(&self, post_id: Uuid) -> StoreResult<Vec<Comment>> {
        let comments = sqlx::query_as::<_, Comment>(
            r#"
            SELECT id, content, post_id, user_id, created_at
            FROM comments
            WHERE post_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(comments)
    }

    async fn count_comments(&self, post_id: Uuid) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[async_trait]
impl ChangeFeed for PgStore {
    async fn subscribe(&self, filter: ChangeFilter) -> StoreResult<ChangeStream> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(CHANGE_CHANNEL).await?;

        let events = listener.into_stream().filter_map(|notification| {
            let event = match notification {
                Ok(notification) => {
                    match serde_json::from_str::<ChangeEvent>(notification.payload()) {
                        Ok(event) => Some(event),
                        Err(e) => {
                            warn!("Dropping malformed change payload: {}", e);
                            None
                        }
                    }
                }
                Err(e) => {
                    warn!("Change listener error: {}", e);
                    None
                }
            };
            ready(event)
        });

        Ok(events
            .filter(move |event| ready(filter.matches(event)))
            .boxed())
    }
}
