use crate::entry::EntryAdapter;
use crate::fetcher::Fetcher;
use crate::sources::{self, SourceProfile};
use crate::types::{Error, NormalizedEntry, Publication, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::info;

/// The synchronizer's view of one publication's feed. Implemented by
/// `FeedReader` for real feeds and by fixtures in tests.
#[async_trait]
pub trait PublicationFeed: Send {
    /// The feed's self-reported update time, converted to UTC. `None` if the
    /// feed provides none.
    async fn last_update(&mut self) -> Result<Option<DateTime<Utc>>>;

    /// Normalized entries of one page, in the feed's native order. Per-entry
    /// fatal errors surface as `Err` elements so earlier entries in the page
    /// still reach the caller.
    async fn page_entries(&mut self, page: u32) -> Result<Vec<Result<NormalizedEntry>>>;
}

/// Opens a feed for a publication, or `None` when no source profile is
/// registered for it.
pub trait FeedOpener: Send + Sync {
    fn open<'a>(&'a self, publication: &Publication) -> Option<Box<dyn PublicationFeed + 'a>>;
}

/// Paginates one publication's feed (`feed_url?paged=<n>`) and flat-maps its
/// items through the entry adapter. One-shot: traversing again re-fetches.
pub struct FeedReader<'a> {
    name: String,
    feed_url: String,
    profile: SourceProfile,
    /// Compiled once here; every entry adapter of this reader borrows it.
    id_regex: Regex,
    fetcher: &'a Fetcher,
    base: Option<feed_rs::model::Feed>,
}

impl<'a> FeedReader<'a> {
    pub fn new(name: String, feed_url: String, profile: SourceProfile, fetcher: &'a Fetcher) -> Self {
        let id_regex = Regex::new(profile.id_pattern).expect("profile patterns are static");
        Self {
            name,
            feed_url,
            profile,
            id_regex,
            fetcher,
            base: None,
        }
    }

    fn page_url(&self, page: u32) -> String {
        format!("{}{}paged={}", self.feed_url, self.profile.page_joiner, page)
    }

    async fn fetch_feed(&self, url: &str) -> Result<feed_rs::model::Feed> {
        let body = self.fetcher.fetch_text(url).await?;
        feed_rs::parser::parse(body.as_bytes())
            .map_err(|e| Error::FeedParse(format!("{}: {}", url, e)))
    }
}

#[async_trait]
impl PublicationFeed for FeedReader<'_> {
    async fn last_update(&mut self) -> Result<Option<DateTime<Utc>>> {
        if self.base.is_none() {
            let feed = self.fetch_feed(&self.feed_url.clone()).await?;
            self.base = Some(feed);
        }
        let feed = self.base.as_ref().expect("just populated");
        Ok(feed.updated.map(|dt| dt.with_timezone(&Utc)))
    }

    async fn page_entries(&mut self, page: u32) -> Result<Vec<Result<NormalizedEntry>>> {
        info!("- Syncing {}, Page {}", self.name, page);
        let feed = self.fetch_feed(&self.page_url(page)).await?;

        let mut entries = Vec::with_capacity(feed.entries.len());
        for raw in feed.entries {
            let mut adapter = EntryAdapter::new(raw, &self.profile, &self.id_regex, self.fetcher);
            entries.push(adapter.normalize().await);
        }
        Ok(entries)
    }
}

/// Publication-to-profile registry backed by `sources::profile_for`.
pub struct SourceRegistry {
    fetcher: Fetcher,
}

impl SourceRegistry {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }
}

impl FeedOpener for SourceRegistry {
    fn open<'a>(&'a self, publication: &Publication) -> Option<Box<dyn PublicationFeed + 'a>> {
        let profile = sources::profile_for(&publication.name)?;
        Some(Box::new(FeedReader::new(
            publication.name.clone(),
            publication.feed_url.clone(),
            profile,
            &self.fetcher,
        )))
    }
}
