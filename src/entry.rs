use crate::fetcher::PageFetcher;
use crate::scrape;
use crate::sources::{ContentRule, SourceProfile};
use crate::types::{Error, NormalizedEntry, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::warn;

/// Wraps one raw parsed feed item and exposes normalized accessors, driven by
/// the publication's `SourceProfile`. The article page is scraped at most once
/// per adapter; both image discovery and scraped-content profiles share the
/// cached HTML.
pub struct EntryAdapter<'a> {
    entry: feed_rs::model::Entry,
    profile: &'a SourceProfile,
    fetcher: &'a dyn PageFetcher,
    /// Compiled once by the feed reader and shared across its entries.
    id_regex: &'a Regex,
    scraped: Option<String>,
}

impl<'a> EntryAdapter<'a> {
    pub fn new(
        entry: feed_rs::model::Entry,
        profile: &'a SourceProfile,
        id_regex: &'a Regex,
        fetcher: &'a dyn PageFetcher,
    ) -> Self {
        Self {
            entry,
            profile,
            fetcher,
            id_regex,
            scraped: None,
        }
    }

    /// The publication's own numeric id for this entry, extracted from the
    /// opaque feed identifier. Failure to match is a per-entry fatal error.
    pub fn external_id(&self) -> Result<i64> {
        let captures = self.id_regex.captures(&self.entry.id).ok_or_else(|| {
            Error::EntryParse(format!("no external id in guid {:?}", self.entry.id))
        })?;
        captures[1]
            .parse()
            .map_err(|_| Error::EntryParse(format!("non-numeric external id in {:?}", self.entry.id)))
    }

    pub fn published_at(&self) -> Result<DateTime<Utc>> {
        self.entry
            .published
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| Error::EntryParse(format!("entry {:?} has no publish date", self.entry.id)))
    }

    pub fn title(&self) -> String {
        self.entry
            .title
            .as_ref()
            .map(|t| t.content.clone())
            .unwrap_or_else(|| "Untitled".to_string())
    }

    pub fn authors(&self) -> String {
        self.entry
            .authors
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn tags(&self) -> Vec<String> {
        self.entry
            .categories
            .iter()
            .map(|c| c.term.clone())
            .collect()
    }

    /// First content block of the feed item, or empty string if absent.
    fn feed_block(&self) -> String {
        self.entry
            .content
            .as_ref()
            .and_then(|c| c.body.clone())
            .unwrap_or_default()
    }

    /// Body HTML per the profile's content rule. A scrape failure for a
    /// scraped-content profile degrades to the feed block with a warning; it
    /// must not become a per-entry fatal.
    pub async fn body_html(&mut self) -> Result<String> {
        match self.profile.content {
            ContentRule::FeedBlock => Ok(self.feed_block()),
            ContentRule::ScrapedElement(tag) => {
                let scraped = match self.scrape().await {
                    Ok(html) => scrape::extract_element_html(html, tag),
                    Err(e) if e.is_transient() => {
                        warn!("content scrape failed, using feed block: {}", e);
                        None
                    }
                    Err(e) => return Err(e),
                };
                Ok(scraped.unwrap_or_else(|| self.feed_block()))
            }
        }
    }

    /// Scheme-normalized link to the canonical article page.
    pub fn canonical_url(&self) -> Result<String> {
        let link = self
            .entry
            .links
            .first()
            .ok_or_else(|| Error::EntryParse(format!("entry {:?} has no link", self.entry.id)))?;
        Ok(scrape::fix_url_scheme(&link.href))
    }

    /// Image URLs discovered on the article page via the profile's container
    /// matchers, deduplicated preserving order. Transient scrape failures
    /// propagate so the caller can degrade to an empty set.
    pub async fn image_urls(&mut self) -> Result<Vec<String>> {
        let containers = self.profile.containers;
        let html = self.scrape().await?;
        let urls = scrape::extract_image_urls(html, containers);
        if urls.is_empty() {
            warn!("no images found");
        }
        Ok(urls)
    }

    async fn scrape(&mut self) -> Result<&str> {
        if self.scraped.is_none() {
            let url = self.canonical_url()?;
            let html = self.fetcher.fetch_page(&url).await?;
            self.scraped = Some(html);
        }
        Ok(self.scraped.as_deref().expect("just populated"))
    }

    /// Normalize the entry for the synchronizer. External id and publish date
    /// are fatal when missing; image scraping degrades to an empty set on
    /// transient failure.
    pub async fn normalize(&mut self) -> Result<NormalizedEntry> {
        let pub_id = self.external_id()?;
        let pub_date = self.published_at()?;
        let url = self.canonical_url()?;
        let content = self.body_html().await?;
        let text = scrape::html_to_text(&content);

        let image_urls = match self.image_urls().await {
            Ok(urls) => urls,
            Err(e) if e.is_transient() => {
                warn!("image scrape failed for {}: {}", url, e);
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        Ok(NormalizedEntry {
            pub_id,
            title: self.title(),
            pub_date,
            authors: self.authors(),
            tags: self.tags(),
            content,
            text,
            url,
            image_urls,
        })
    }
}
