/// Business logic layer for discussion-service
///
/// - Vote ledger: one vote per (user, post) with toggle and flip semantics
/// - Score aggregator: recomputes the denormalized counters on posts
/// - Ranking: Hot / New / Top feed ordering
/// - Post and comment services: validated submission and listing
/// - User service: profile creation and avatar updates
pub mod aggregator;
pub mod comments;
pub mod ledger;
pub mod posts;
pub mod ranking;
pub mod users;

pub use aggregator::ScoreAggregator;
pub use comments::CommentService;
pub use ledger::VoteLedger;
pub use posts::PostService;
pub use ranking::{hot_score, rank, Rankable, SortStrategy};
pub use users::UserService;
