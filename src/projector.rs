use crate::store::Store;
use crate::types::{FeedItem, Result};

/// The unified feed: stories and topics multiplexed into one type-tagged
/// sequence so a single endpoint can serve heterogeneous entries. Ordered by
/// stored weight ascending; callers wanting best-first reverse.
pub async fn list(store: &Store) -> Result<Vec<FeedItem>> {
    store.feed_items().await
}
