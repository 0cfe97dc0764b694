/// Score aggregator - keeps the denormalized counters on `posts` in step
/// with the vote ledger and the comment list.
///
/// Each recompute reads the full source of truth and overwrites the counter,
/// so concurrent recomputes for one post converge on the same value.
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::metrics::SCORE_RECOMPUTE_TOTAL;
use crate::store::{bounded, CommentStore, PostStore, Stores, VoteStore};

#[derive(Clone)]
pub struct ScoreAggregator {
    posts: Arc<dyn PostStore>,
    votes: Arc<dyn VoteStore>,
    comments: Arc<dyn CommentStore>,
    timeout: Duration,
}

impl ScoreAggregator {
    pub fn new(
        posts: Arc<dyn PostStore>,
        votes: Arc<dyn VoteStore>,
        comments: Arc<dyn CommentStore>,
        timeout: Duration,
    ) -> Self {
        Self {
            posts,
            votes,
            comments,
            timeout,
        }
    }

    pub fn from_stores(stores: &Stores, timeout: Duration) -> Self {
        Self::new(
            stores.posts.clone(),
            stores.votes.clone(),
            stores.comments.clone(),
            timeout,
        )
    }

    /// Sets `Post.votes` to the sum of the post's current vote values and
    /// returns that sum.
    pub async fn recompute_score(&self, post_id: Uuid) -> Result<i64> {
        let result = self.write_score(post_id).await;

        record("votes", &result);
        match &result {
            Ok(total) => debug!(post_id = %post_id, votes = total, "Recomputed post score"),
            Err(e) => warn!(post_id = %post_id, "Score recompute failed: {}", e),
        }
        result
    }

    /// Sets `Post.comment_count` to the number of comments on the post.
    pub async fn recompute_comment_count(&self, post_id: Uuid) -> Result<i64> {
        let result = self.write_comment_count(post_id).await;

        record("comment_count", &result);
        if let Err(e) = &result {
            warn!(post_id = %post_id, "Comment count recompute failed: {}", e);
        }
        result
    }

    async fn write_score(&self, post_id: Uuid) -> Result<i64> {
        let total = bounded(self.timeout, self.votes.sum_votes(post_id)).await?;
        let matched = bounded(self.timeout, self.posts.set_post_votes(post_id, total)).await?;
        if !matched {
            return Err(AppError::PostNotFound(post_id));
        }
        Ok(total)
    }

    async fn write_comment_count(&self, post_id: Uuid) -> Result<i64> {
        let count = bounded(self.timeout, self.comments.count_comments(post_id)).await?;
        let matched = bounded(self.timeout, self.posts.set_comment_count(post_id, count)).await?;
        if !matched {
            return Err(AppError::PostNotFound(post_id));
        }
        Ok(count)
    }
}

fn record(counter: &str, result: &Result<i64>) {
    let label = match result {
        Ok(_) => "ok",
        Err(AppError::PostNotFound(_)) => "not_found",
        Err(_) => "error",
    };
    SCORE_RECOMPUTE_TOTAL
        .with_label_values(&[counter, label])
        .inc();
}
