pub mod entry;
pub mod feed;
pub mod fetcher;
pub mod interactions;
pub mod projector;
pub mod ranking;
pub mod scrape;
pub mod sources;
pub mod store;
pub mod sync;
pub mod types;

pub use feed::{FeedOpener, FeedReader, PublicationFeed, SourceRegistry};
pub use fetcher::{Fetcher, ImageFetcher, PageFetcher};
pub use interactions::{CommentNotifier, Interactions, LogNotifier};
pub use ranking::RankingConfig;
pub use store::Store;
pub use sync::{SyncOptions, SyncReport, Synchronizer};
pub use types::*;
