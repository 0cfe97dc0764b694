/// HTTP handlers for discussion endpoints
///
/// - Feed: ranked post listing
/// - Posts: submission and lookup
/// - Votes: cast and read the caller's vote
/// - Comments: list and append
/// - Users: profile creation, avatar updates and public profiles
pub mod comments;
pub mod feed;
pub mod posts;
pub mod users;
pub mod votes;

pub use comments::{add_comment, list_comments};
pub use feed::get_feed;
pub use posts::{create_post, get_post};
pub use users::{create_profile, get_user_profile, update_avatar};
pub use votes::{cast_vote, get_vote};

use actix_web::web;

/// Registers every `/api/v1` resource on `cfg`
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/posts")
            .service(
                web::resource("")
                    .route(web::get().to(get_feed))
                    .route(web::post().to(create_post)),
            )
            .service(web::resource("/{post_id}").route(web::get().to(get_post)))
            .service(
                web::resource("/{post_id}/vote")
                    .route(web::get().to(get_vote))
                    .route(web::post().to(cast_vote)),
            )
            .service(
                web::resource("/{post_id}/comments")
                    .route(web::get().to(list_comments))
                    .route(web::post().to(add_comment)),
            ),
    )
    .service(
        web::scope("/users")
            .service(web::resource("").route(web::post().to(create_profile)))
            // "me" is shorter than any valid username
            .service(web::resource("/me").route(web::patch().to(update_avatar)))
            .service(web::resource("/{username}").route(web::get().to(get_user_profile))),
    );
}
