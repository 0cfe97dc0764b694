/// Shared application state handed to every handler
use std::time::Duration;

use crate::config::Config;
use crate::services::{CommentService, PostService, SortStrategy, UserService, VoteLedger};
use crate::store::Stores;

#[derive(Clone)]
pub struct AppState {
    pub posts: PostService,
    pub comments: CommentService,
    pub ledger: VoteLedger,
    pub users: UserService,
    pub default_sort: SortStrategy,
}

impl AppState {
    pub fn new(
        stores: &Stores,
        timeout: Duration,
        max_feed_items: usize,
        default_sort: SortStrategy,
    ) -> Self {
        Self {
            posts: PostService::from_stores(stores, timeout, max_feed_items),
            comments: CommentService::from_stores(stores, timeout),
            ledger: VoteLedger::from_stores(stores, timeout),
            users: UserService::from_stores(stores, timeout),
            default_sort,
        }
    }

    pub fn from_config(stores: &Stores, config: &Config) -> Self {
        Self::new(
            stores,
            config.store.timeout(),
            config.feed.max_items,
            config.feed.default_sort,
        )
    }
}
