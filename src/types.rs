use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Watermark assigned to publications that have never been synced.
pub fn distant_past() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("1900-01-01T00:00:00Z")
        .expect("static timestamp")
        .with_timezone(&Utc)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Publication {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub feed_url: String,
    pub logo_url: Option<String>,
    /// Watermark of the most recently ingested feed state. Advanced only by
    /// the synchronizer after a publication's entries have all been processed.
    pub last_update: DateTime<Utc>,
    pub active: bool,
}

/// Discriminant of the feed-entry tagged union.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Story,
    Topic,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Story => "story",
            EntryKind::Topic => "topic",
        }
    }

    pub fn parse(s: &str) -> Option<EntryKind> {
        match s {
            "story" => Some(EntryKind::Story),
            "topic" => Some(EntryKind::Topic),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    pub entry_id: i64,
    pub publisher_id: i64,
    /// The publication's own identifier for this entry; `(publisher_id,
    /// pub_id)` is the natural key for upsert.
    pub pub_id: i64,
    pub title: String,
    pub weight: f64,
    pub pub_date: DateTime<Utc>,
    pub active: bool,
    pub authors: String,
    /// Raw HTML content.
    pub content: String,
    /// Plain text derived from `content`.
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub entry_id: i64,
    pub title: String,
    pub weight: f64,
    pub pub_date: DateTime<Utc>,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub story_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryImage {
    pub id: i64,
    pub story_id: i64,
    pub source_url: String,
    pub sequence: i64,
}

/// Which feed entry a comment belongs to. Exactly one by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentTarget {
    Story(i64),
    Topic(i64),
}

impl CommentTarget {
    pub fn entry_id(&self) -> i64 {
        match *self {
            CommentTarget::Story(id) | CommentTarget::Topic(id) => id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Comment {
    pub id: i64,
    pub author: String,
    pub target: CommentTarget,
    pub text: String,
    pub pub_date: DateTime<Utc>,
}

/// One element of the unified feed projection: an entry id tagged with its
/// concrete type, ordered by stored weight ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: i64,
    pub kind: EntryKind,
}

/// A feed item normalized by a source adapter, ready for the synchronizer.
#[derive(Debug, Clone)]
pub struct NormalizedEntry {
    pub pub_id: i64,
    pub title: String,
    pub pub_date: DateTime<Utc>,
    pub authors: String,
    pub tags: Vec<String>,
    pub content: String,
    pub text: String,
    pub url: String,
    pub image_urls: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "storyfeed/0.1".to_string(),
            timeout_seconds: 30,
            max_retries: 2,
            retry_delay_seconds: 5,
            max_redirects: 5,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transient: network-level failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Transient: non-2xx response.
    #[error("HTTP {status} fetching {url}")]
    Status { url: String, status: u16 },

    /// The feed document itself could not be parsed.
    #[error("feed parse error: {0}")]
    FeedParse(String),

    /// Per-entry fatal: a malformed item that cannot be normalized. Aborts the
    /// publication's current run, never the whole sync.
    #[error("entry parse error: {0}")]
    EntryParse(String),

    /// Structured rejection of a caller-supplied write.
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    /// Transient failures are logged and degraded at the point of origin;
    /// everything else follows the abort policy of its taxonomy class.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Http(_) | Error::Status { .. })
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(vec![msg.into()])
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound { what: what.into() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
