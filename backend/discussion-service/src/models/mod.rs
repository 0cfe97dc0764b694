/// Data models for discussion-service
///
/// This module defines structures for:
/// - User: account profile (username, avatar)
/// - Post: text submission carrying denormalized `votes` / `comment_count`
/// - Vote: a single +1 / -1 from one user on one post
/// - Comment: append-only reply on a post
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            username: self.username.clone(),
            avatar_url: self.avatar_url.clone(),
        }
    }
}

/// Author fields embedded in post and comment listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub content: Option<String>,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Sum of current vote values; written only by the score aggregator
    pub votes: i64,
    /// Number of comments; written only by the score aggregator
    pub comment_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostWithAuthor {
    #[serde(flatten)]
    pub post: Post,
    pub user: Option<UserSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(try_from = "i32", into = "i32")]
#[repr(i16)]
pub enum VoteValue {
    Up = 1,
    Down = -1,
}

impl VoteValue {
    pub fn as_i64(self) -> i64 {
        self as i16 as i64
    }
}

impl TryFrom<i32> for VoteValue {
    type Error = AppError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(VoteValue::Up),
            -1 => Ok(VoteValue::Down),
            other => Err(AppError::InvalidVoteValue(other)),
        }
    }
}

impl From<VoteValue> for i32 {
    fn from(value: VoteValue) -> Self {
        value as i16 as i32
    }
}

/// Vote row. At most one exists per (post_id, user_id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Vote {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub value: VoteValue,
}

/// What a cast vote did to the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteOutcome {
    /// No previous vote; one was inserted
    Created,
    /// Same value cast again; the vote was deleted
    Removed,
    /// Opposite value cast; the vote was flipped in place
    Changed,
}

impl VoteOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteOutcome::Created => "created",
            VoteOutcome::Removed => "removed",
            VoteOutcome::Changed => "changed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub content: String,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentWithAuthor {
    #[serde(flatten)]
    pub comment: Comment,
    pub user: Option<UserSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user: User,
    /// Newest first
    pub posts: Vec<Post>,
}

/// Post submission
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewPost {
    #[validate(length(min = 1, max = 300, message = "title must be 1-300 characters"))]
    pub title: String,
    pub content: Option<String>,
}

impl NewPost {
    /// Trims the title and drops blank content.
    pub fn normalized(self) -> Self {
        let content = self
            .content
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        Self {
            title: self.title.trim().to_string(),
            content,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewComment {
    #[validate(length(min = 1, max = 10000, message = "comment must be 1-10000 characters"))]
    pub content: String,
}

impl NewComment {
    pub fn normalized(self) -> Self {
        Self {
            content: self.content.trim().to_string(),
        }
    }
}

/// Profile row created after the auth collaborator registers an account
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: Uuid,
    pub username: String,
    pub avatar_url: Option<String>,
}

/// Profile submitted by an account that already holds a token
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewProfile {
    pub username: String,
    #[validate(url(message = "avatar_url must be a URL"))]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AvatarUpdate {
    #[validate(url(message = "avatar_url must be a URL"))]
    pub avatar_url: Option<String>,
}
