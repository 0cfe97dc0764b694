/// Change-event subscriptions
///
/// Stores publish an event for every row they insert, update or delete.
/// Callers subscribe with a `ChangeFilter` and use the stream to invalidate
/// and refetch cached views; the ledger, aggregator and ranker never look at
/// these events.
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::store::StoreResult;

/// Postgres NOTIFY channel the change triggers publish on
pub const CHANGE_CHANNEL: &str = "discussion_changes";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Users,
    Posts,
    Comments,
    Votes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub collection: Collection,
    pub op: ChangeOp,
    pub record_id: Uuid,
    /// Post the row belongs to (the post itself for `posts`, none for `users`)
    pub post_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeFilter {
    pub collection: Collection,
    pub post_id: Option<Uuid>,
}

impl ChangeFilter {
    /// Every change in a collection
    pub fn collection(collection: Collection) -> Self {
        Self {
            collection,
            post_id: None,
        }
    }

    /// Changes in a collection that belong to one post
    pub fn for_post(collection: Collection, post_id: Uuid) -> Self {
        Self {
            collection,
            post_id: Some(post_id),
        }
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if event.collection != self.collection {
            return false;
        }
        match self.post_id {
            Some(post_id) => event.post_id == Some(post_id),
            None => true,
        }
    }
}

pub type ChangeStream = BoxStream<'static, ChangeEvent>;

#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe(&self, filter: ChangeFilter) -> StoreResult<ChangeStream>;
}

/// Keeps a refetched snapshot current.
///
/// Loads once immediately, then refetches after every event on `changes`.
/// A failed refetch keeps the previous snapshot. The task ends when the
/// stream ends or every receiver is dropped.
pub fn spawn_refresher<T, F, Fut>(
    mut changes: ChangeStream,
    fetch: F,
) -> (watch::Receiver<Option<T>>, JoinHandle<()>)
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send,
{
    let (tx, rx) = watch::channel(None);

    let handle = tokio::spawn(async move {
        refresh(&tx, &fetch).await;

        while let Some(event) = changes.next().await {
            if tx.is_closed() {
                break;
            }
            debug!(
                collection = ?event.collection,
                op = ?event.op,
                record_id = %event.record_id,
                "Change received, refreshing view"
            );
            refresh(&tx, &fetch).await;
        }
    });

    (rx, handle)
}

async fn refresh<T, F, Fut>(tx: &watch::Sender<Option<T>>, fetch: &F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match fetch().await {
        Ok(snapshot) => {
            tx.send_replace(Some(snapshot));
        }
        Err(e) => warn!("View refresh failed, keeping previous snapshot: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(collection: Collection, post_id: Option<Uuid>) -> ChangeEvent {
        ChangeEvent {
            collection,
            op: ChangeOp::Insert,
            record_id: Uuid::new_v4(),
            post_id,
        }
    }

    #[test]
    fn collection_filter_ignores_other_collections() {
        let filter = ChangeFilter::collection(Collection::Posts);
        assert!(filter.matches(&event(Collection::Posts, None)));
        assert!(!filter.matches(&event(Collection::Votes, None)));
    }

    #[test]
    fn post_filter_requires_matching_post() {
        let post_id = Uuid::new_v4();
        let filter = ChangeFilter::for_post(Collection::Comments, post_id);

        assert!(filter.matches(&event(Collection::Comments, Some(post_id))));
        assert!(!filter.matches(&event(Collection::Comments, Some(Uuid::new_v4()))));
        assert!(!filter.matches(&event(Collection::Comments, None)));
    }

    #[test]
    fn change_event_matches_trigger_payload() {
        let payload = r#"{"collection":"votes","op":"delete","record_id":"00000000-0000-0000-0000-000000000001","post_id":null}"#;
        let parsed: ChangeEvent = serde_json::from_str(payload).unwrap();
        assert_eq!(parsed.collection, Collection::Votes);
        assert_eq!(parsed.op, ChangeOp::Delete);
        assert_eq!(parsed.post_id, None);
    }
}
