/// Comment service - append-only replies on posts.
///
/// Appending a comment also refreshes `Post.comment_count`; like votes, a
/// failed refresh leaves the comment in place and reports `AggregationFailed`.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::models::{Comment, CommentWithAuthor, NewComment, UserSummary};
use crate::services::aggregator::ScoreAggregator;
use crate::store::{bounded, CommentStore, PostStore, Stores, UserStore};

#[derive(Clone)]
pub struct CommentService {
    comments: Arc<dyn CommentStore>,
    posts: Arc<dyn PostStore>,
    users: Arc<dyn UserStore>,
    aggregator: ScoreAggregator,
    timeout: Duration,
}

impl CommentService {
    pub fn new(
        comments: Arc<dyn CommentStore>,
        posts: Arc<dyn PostStore>,
        users: Arc<dyn UserStore>,
        aggregator: ScoreAggregator,
        timeout: Duration,
    ) -> Self {
        Self {
            comments,
            posts,
            users,
            aggregator,
            timeout,
        }
    }

    pub fn from_stores(stores: &Stores, timeout: Duration) -> Self {
        Self::new(
            stores.comments.clone(),
            stores.posts.clone(),
            stores.users.clone(),
            ScoreAggregator::from_stores(stores, timeout),
            timeout,
        )
    }

    pub async fn add_comment(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        comment: NewComment,
    ) -> Result<Comment> {
        let comment = comment.normalized();
        comment.validate()?;

        if bounded(self.timeout, self.posts.find_post(post_id))
            .await?
            .is_none()
        {
            return Err(AppError::PostNotFound(post_id));
        }

        let created = bounded(
            self.timeout,
            self.comments.insert_comment(post_id, user_id, comment.content),
        )
        .await?;
        info!(post_id = %post_id, comment_id = %created.id, "Comment added");

        if let Err(e) = self.aggregator.recompute_comment_count(post_id).await {
            warn!(post_id = %post_id, "Comment stored but count is stale: {}", e);
            return Err(AppError::AggregationFailed {
                post_id,
                reason: e.to_string(),
            });
        }

        Ok(created)
    }

    /// Comments on a post with their authors, oldest first
    pub async fn list_comments(&self, post_id: Uuid) -> Result<Vec<CommentWithAuthor>> {
        let comments = bounded(self.timeout, self.comments.list_comments(post_id)).await?;

        let mut author_ids: Vec<Uuid> = comments.iter().map(|c| c.user_id).collect();
        author_ids.sort_unstable();
        author_ids.dedup();

        let authors: HashMap<Uuid, UserSummary> =
            bounded(self.timeout, self.users.find_users(&author_ids))
                .await?
                .into_iter()
                .map(|u| (u.id, u.summary()))
                .collect();

        Ok(comments
            .into_iter()
            .map(|comment| {
                let user = authors.get(&comment.user_id).cloned();
                CommentWithAuthor { comment, user }
            })
            .collect())
    }
}
