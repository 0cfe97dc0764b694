/// Vote handlers
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::middleware::UserId;
use crate::models::{VoteOutcome, VoteValue};
use crate::state::AppState;

/// Raw integer so out-of-range values reach the ledger and get a typed error
#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub value: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoteResponse {
    pub post_id: Uuid,
    pub outcome: VoteOutcome,
    /// Recomputed `Post.votes`
    pub votes: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CurrentVoteResponse {
    pub post_id: Uuid,
    pub value: Option<VoteValue>,
}

/// POST /api/v1/posts/{post_id}/vote
pub async fn cast_vote(
    state: web::Data<AppState>,
    user_id: UserId,
    path: web::Path<Uuid>,
    req: web::Json<VoteRequest>,
) -> Result<HttpResponse> {
    let post_id = path.into_inner();
    let (outcome, votes) = state
        .ledger
        .cast_vote_with_score(post_id, user_id.0, req.value)
        .await?;

    Ok(HttpResponse::Ok().json(VoteResponse {
        post_id,
        outcome,
        votes,
    }))
}

/// GET /api/v1/posts/{post_id}/vote
pub async fn get_vote(
    state: web::Data<AppState>,
    user_id: UserId,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let post_id = path.into_inner();
    let value = state.ledger.current_vote(post_id, user_id.0).await?;
    Ok(HttpResponse::Ok().json(CurrentVoteResponse { post_id, value }))
}
