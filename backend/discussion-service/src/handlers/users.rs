use actix_web::{web, HttpResponse};

use crate::error::Result;
use crate::middleware::UserId;
use crate::models::{AvatarUpdate, NewProfile};
use crate::state::AppState;

/// POST /api/v1/users
///
/// Creates the caller's profile; the id comes from the token subject.
pub async fn create_profile(
    state: web::Data<AppState>,
    user_id: UserId,
    req: web::Json<NewProfile>,
) -> Result<HttpResponse> {
    let user = state.users.create_profile(user_id.0, req.into_inner()).await?;
    Ok(HttpResponse::Created().json(user))
}

/// PATCH /api/v1/users/me
pub async fn update_avatar(
    state: web::Data<AppState>,
    user_id: UserId,
    req: web::Json<AvatarUpdate>,
) -> Result<HttpResponse> {
    let user = state.users.update_avatar(user_id.0, req.into_inner()).await?;
    Ok(HttpResponse::Ok().json(user))
}

/// GET /api/v1/users/{username}
pub async fn get_user_profile(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let profile = state.posts.user_profile(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(profile))
}
