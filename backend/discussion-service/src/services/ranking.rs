/// Feed ranking - pure ordering of posts under Hot, New and Top.
///
/// Sorting is stable, so posts that compare equal keep their input order.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;
use crate::models::{Post, PostWithAuthor};

/// Weight of the vote count in the hot score
pub const HOT_VOTE_WEIGHT: f64 = 0.7;
/// Weight of the creation time (epoch seconds) in the hot score
pub const HOT_RECENCY_WEIGHT: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortStrategy {
    #[default]
    Hot,
    New,
    Top,
}

impl SortStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortStrategy::Hot => "hot",
            SortStrategy::New => "new",
            SortStrategy::Top => "top",
        }
    }
}

impl fmt::Display for SortStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortStrategy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hot" => Ok(SortStrategy::Hot),
            "new" => Ok(SortStrategy::New),
            "top" => Ok(SortStrategy::Top),
            other => Err(AppError::Validation(format!(
                "unknown sort '{}' (expected hot, new or top)",
                other
            ))),
        }
    }
}

/// Anything carrying the two fields the ranker reads.
pub trait Rankable {
    fn votes(&self) -> i64;
    fn created_at(&self) -> DateTime<Utc>;
}

impl Rankable for Post {
    fn votes(&self) -> i64 {
        self.votes
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Rankable for PostWithAuthor {
    fn votes(&self) -> i64 {
        self.post.votes
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.post.created_at
    }
}

/// `votes * 0.7 + epoch_seconds * 0.3`, with millisecond precision and no
/// decay. The recency term dominates for any realistic vote count.
pub fn hot_score<T: Rankable>(item: &T) -> f64 {
    let epoch_seconds = item.created_at().timestamp_millis() as f64 / 1000.0;
    item.votes() as f64 * HOT_VOTE_WEIGHT + epoch_seconds * HOT_RECENCY_WEIGHT
}

/// Orders `items` by `strategy`, highest first.
pub fn rank<T: Rankable>(mut items: Vec<T>, strategy: SortStrategy) -> Vec<T> {
    match strategy {
        SortStrategy::New => items.sort_by(|a, b| b.created_at().cmp(&a.created_at())),
        SortStrategy::Top => items.sort_by(|a, b| b.votes().cmp(&a.votes())),
        SortStrategy::Hot => items.sort_by(|a, b| {
            // NaN never compares; treat it as a tie
            hot_score(b)
                .partial_cmp(&hot_score(a))
                .unwrap_or(Ordering::Equal)
        }),
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn post(title: &str, votes: i64, created_at: DateTime<Utc>) -> Post {
        Post {
            id: Uuid::new_v4(),
            title: title.to_string(),
            content: None,
            user_id: Uuid::new_v4(),
            created_at,
            votes,
            comment_count: 0,
        }
    }

    fn titles(posts: &[Post]) -> Vec<&str> {
        posts.iter().map(|p| p.title.as_str()).collect()
    }

    #[test]
    fn sort_strategy_parses_case_insensitively() {
        assert_eq!("HOT".parse::<SortStrategy>().unwrap(), SortStrategy::Hot);
        assert_eq!(" new ".parse::<SortStrategy>().unwrap(), SortStrategy::New);
        assert_eq!("top".parse::<SortStrategy>().unwrap(), SortStrategy::Top);
        assert!(matches!(
            "best".parse::<SortStrategy>(),
            Err(AppError::Validation(_))
        ));
        assert_eq!(SortStrategy::default(), SortStrategy::Hot);
    }

    #[test]
    fn hot_score_uses_fixed_weights() {
        let created_at = DateTime::from_timestamp(1_000, 500_000_000).unwrap();
        let p = post("p", 10, created_at);
        let expected = 10.0 * 0.7 + 1_000.5 * 0.3;
        assert!((hot_score(&p) - expected).abs() < 1e-9);
    }

    #[test]
    fn equal_keys_keep_input_order() {
        let at = Utc::now();
        let input = vec![post("first", 3, at), post("second", 3, at), post("third", 3, at)];

        for strategy in [SortStrategy::Hot, SortStrategy::New, SortStrategy::Top] {
            let ranked = rank(input.clone(), strategy);
            assert_eq!(titles(&ranked), vec!["first", "second", "third"]);
        }
    }

    #[test]
    fn empty_input_ranks_to_empty() {
        assert!(rank(Vec::<Post>::new(), SortStrategy::Hot).is_empty());
    }

    #[test]
    fn negative_scores_sort_below_zero() {
        let at = Utc::now();
        let ranked = rank(
            vec![post("down", -4, at), post("flat", 0, at), post("up", 2, at)],
            SortStrategy::Top,
        );
        assert_eq!(titles(&ranked), vec!["up", "flat", "down"]);
    }

    #[test]
    fn ranks_posts_with_authors() {
        let now = Utc::now();
        let items = vec![
            PostWithAuthor {
                post: post("old", 1, now - Duration::hours(2)),
                user: None,
            },
            PostWithAuthor {
                post: post("fresh", 0, now),
                user: None,
            },
        ];

        let ranked = rank(items, SortStrategy::New);
        assert_eq!(ranked[0].post.title, "fresh");
    }
}
