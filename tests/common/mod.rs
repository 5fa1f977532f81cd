use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use storyfeed::feed::{FeedOpener, PublicationFeed};
use storyfeed::{Error, ImageFetcher, NormalizedEntry, Publication, Result};

/// What a fixture publication feed should serve. All entries appear on page 1.
#[derive(Clone, Default)]
pub struct FixtureSpec {
    pub last_update: Option<DateTime<Utc>>,
    pub entries: Vec<NormalizedEntry>,
    /// Inject a per-entry fatal error after this many entries.
    pub fatal_after: Option<usize>,
}

/// Feed opener serving canned feeds, counting page fetches so tests can
/// assert the freshness short-circuit.
pub struct FixtureOpener {
    specs: HashMap<String, FixtureSpec>,
    pub page_fetches: Arc<AtomicUsize>,
}

impl FixtureOpener {
    pub fn new(specs: HashMap<String, FixtureSpec>) -> Self {
        Self {
            specs,
            page_fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn single(publication: &str, spec: FixtureSpec) -> Self {
        Self::new(HashMap::from([(publication.to_string(), spec)]))
    }

    pub fn fetch_count(&self) -> usize {
        self.page_fetches.load(Ordering::SeqCst)
    }
}

impl FeedOpener for FixtureOpener {
    fn open<'a>(&'a self, publication: &Publication) -> Option<Box<dyn PublicationFeed + 'a>> {
        let spec = self.specs.get(&publication.name)?.clone();
        Some(Box::new(FixtureFeed {
            spec,
            page_fetches: self.page_fetches.clone(),
        }))
    }
}

struct FixtureFeed {
    spec: FixtureSpec,
    page_fetches: Arc<AtomicUsize>,
}

#[async_trait]
impl PublicationFeed for FixtureFeed {
    async fn last_update(&mut self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.spec.last_update)
    }

    async fn page_entries(&mut self, page: u32) -> Result<Vec<Result<NormalizedEntry>>> {
        self.page_fetches.fetch_add(1, Ordering::SeqCst);
        if page != 1 {
            return Ok(Vec::new());
        }
        let mut out: Vec<Result<NormalizedEntry>> =
            self.spec.entries.iter().cloned().map(Ok).collect();
        if let Some(at) = self.spec.fatal_after {
            out.truncate(at);
            out.push(Err(Error::EntryParse("no external id in guid".into())));
        }
        Ok(out)
    }
}

/// Image fetcher returning fixed bytes without touching the network.
pub struct StubImages;

#[async_trait]
impl ImageFetcher for StubImages {
    async fn fetch_image(&self, _url: &str) -> Result<Vec<u8>> {
        Ok(vec![0xFF, 0xD8, 0xFF])
    }
}

/// Image fetcher that always fails with a transient error.
pub struct FailingImages;

#[async_trait]
impl ImageFetcher for FailingImages {
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>> {
        Err(Error::Status {
            url: url.to_string(),
            status: 502,
        })
    }
}

pub fn entry(pub_id: i64, title: &str, hours_ago: i64) -> NormalizedEntry {
    NormalizedEntry {
        pub_id,
        title: title.to_string(),
        pub_date: Utc::now() - Duration::hours(hours_ago),
        authors: "Jane Doe".to_string(),
        tags: Vec::new(),
        content: format!("<p>{title}</p>"),
        text: title.to_string(),
        url: format!("http://fixture.example/?p={pub_id}"),
        image_urls: Vec::new(),
    }
}
