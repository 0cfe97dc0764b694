/// Discussion Service Library
///
/// Voting and ranking backend for a link-aggregation / discussion site:
/// users submit text posts, vote them up or down, and comment.
///
/// # Modules
///
/// - `services`: vote ledger, score aggregator, feed ranking, post and comment services
/// - `store`: storage collaborator traits with PostgreSQL and in-memory backends
/// - `realtime`: row-change subscriptions and refreshed views
/// - `auth`: auth collaborator and explicit session state
/// - `handlers`: HTTP request handlers
/// - `middleware`: Bearer token verification
/// - `models`: data structures for users, posts, votes, comments
/// - `error`: error types and handling
/// - `config`: configuration management
/// - `metrics`: Prometheus collectors
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod realtime;
pub mod services;
pub mod state;
pub mod store;

pub use config::Config;
pub use error::{AppError, Result};
pub use state::AppState;
