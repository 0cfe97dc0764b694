/// Comment handlers
use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::error::Result;
use crate::middleware::UserId;
use crate::models::NewComment;
use crate::state::AppState;

/// GET /api/v1/posts/{post_id}/comments
pub async fn list_comments(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let comments = state.comments.list_comments(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(comments))
}

/// POST /api/v1/posts/{post_id}/comments
pub async fn add_comment(
    state: web::Data<AppState>,
    user_id: UserId,
    path: web::Path<Uuid>,
    req: web::Json<NewComment>,
) -> Result<HttpResponse> {
    let comment = state
        .comments
        .add_comment(path.into_inner(), user_id.0, req.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(comment))
}
