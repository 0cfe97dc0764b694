/// Feed handler - ranked post listing
use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::error::Result;
use crate::services::SortStrategy;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    pub sort: Option<String>,
}

/// GET /api/v1/posts?sort=hot|new|top
pub async fn get_feed(
    state: web::Data<AppState>,
    query: web::Query<FeedQuery>,
) -> Result<HttpResponse> {
    let strategy = match query.sort.as_deref() {
        Some(raw) => raw.parse::<SortStrategy>()?,
        None => state.default_sort,
    };

    let posts = state.posts.feed(strategy).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "sort": strategy,
        "posts": posts,
    })))
}
