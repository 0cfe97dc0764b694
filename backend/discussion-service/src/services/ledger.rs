/// Vote ledger - the authoritative record of who voted what on which post.
///
/// Casting a vote runs a small state machine over the caller's existing
/// vote for the post:
///
/// | existing     | cast   | result                 |
/// |--------------|--------|------------------------|
/// | none         | v      | insert v (`Created`)   |
/// | v            | v      | delete (`Removed`)     |
/// | -v           | v      | update to v (`Changed`)|
///
/// Every successful mutation is followed by a score recompute. The two steps
/// are not transactional: when the recompute fails the ledger change stands
/// and the caller gets `AggregationFailed`. The next successful recompute for
/// the post repairs the counter.
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::SessionContext;
use crate::error::{AppError, Result};
use crate::metrics::VOTE_CAST_TOTAL;
use crate::models::{VoteOutcome, VoteValue};
use crate::services::aggregator::ScoreAggregator;
use crate::store::{bounded, PostStore, Stores, VoteStore};

#[derive(Clone)]
pub struct VoteLedger {
    posts: Arc<dyn PostStore>,
    votes: Arc<dyn VoteStore>,
    aggregator: ScoreAggregator,
    timeout: Duration,
}

impl VoteLedger {
    pub fn new(
        posts: Arc<dyn PostStore>,
        votes: Arc<dyn VoteStore>,
        aggregator: ScoreAggregator,
        timeout: Duration,
    ) -> Self {
        Self {
            posts,
            votes,
            aggregator,
            timeout,
        }
    }

    pub fn from_stores(stores: &Stores, timeout: Duration) -> Self {
        Self::new(
            stores.posts.clone(),
            stores.votes.clone(),
            ScoreAggregator::from_stores(stores, timeout),
            timeout,
        )
    }

    pub fn aggregator(&self) -> &ScoreAggregator {
        &self.aggregator
    }

    /// Casts `value` (+1 or -1) for `user_id` on `post_id`.
    pub async fn cast_vote(&self, post_id: Uuid, user_id: Uuid, value: i32) -> Result<VoteOutcome> {
        self.cast_vote_with_score(post_id, user_id, value)
            .await
            .map(|(outcome, _)| outcome)
    }

    /// Same as `cast_vote`, also returning the recomputed `Post.votes`.
    pub async fn cast_vote_with_score(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        value: i32,
    ) -> Result<(VoteOutcome, i64)> {
        let value = match VoteValue::try_from(value) {
            Ok(value) => value,
            Err(e) => {
                VOTE_CAST_TOTAL.with_label_values(&["rejected"]).inc();
                return Err(e);
            }
        };

        let outcome = match self.apply(post_id, user_id, value).await {
            Ok(outcome) => outcome,
            Err(e) => {
                VOTE_CAST_TOTAL.with_label_values(&["failed"]).inc();
                return Err(e);
            }
        };

        VOTE_CAST_TOTAL.with_label_values(&[outcome.as_str()]).inc();
        info!(
            post_id = %post_id,
            user_id = %user_id,
            outcome = outcome.as_str(),
            "Vote recorded"
        );

        match self.aggregator.recompute_score(post_id).await {
            Ok(votes) => Ok((outcome, votes)),
            Err(e) => {
                warn!(
                    post_id = %post_id,
                    outcome = outcome.as_str(),
                    "Vote recorded but score is stale: {}",
                    e
                );
                Err(AppError::AggregationFailed {
                    post_id,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Casts a vote as the signed-in user of `session`.
    pub async fn cast_vote_as(
        &self,
        session: &SessionContext,
        post_id: Uuid,
        value: i32,
    ) -> Result<VoteOutcome> {
        let user_id = session.require_user()?;
        self.cast_vote(post_id, user_id, value).await
    }

    /// The caller's current vote on a post, if any.
    pub async fn current_vote(&self, post_id: Uuid, user_id: Uuid) -> Result<Option<VoteValue>> {
        let vote = bounded(self.timeout, self.votes.find_vote(post_id, user_id)).await?;
        Ok(vote.map(|v| v.value))
    }

    async fn apply(&self, post_id: Uuid, user_id: Uuid, value: VoteValue) -> Result<VoteOutcome> {
        if bounded(self.timeout, self.posts.find_post(post_id))
            .await?
            .is_none()
        {
            return Err(AppError::PostNotFound(post_id));
        }

        let existing = bounded(self.timeout, self.votes.find_vote(post_id, user_id)).await?;

        match existing {
            None => {
                bounded(self.timeout, self.votes.insert_vote(post_id, user_id, value)).await?;
                Ok(VoteOutcome::Created)
            }
            Some(vote) if vote.value == value => {
                bounded(self.timeout, self.votes.delete_vote(vote.id)).await?;
                Ok(VoteOutcome::Removed)
            }
            Some(vote) => {
                bounded(self.timeout, self.votes.update_vote_value(vote.id, value)).await?;
                Ok(VoteOutcome::Changed)
            }
        }
    }
}
