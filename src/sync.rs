use crate::feed::FeedOpener;
use crate::fetcher::ImageFetcher;
use crate::ranking::{self, RankingConfig};
use crate::store::Store;
use crate::types::{NormalizedEntry, Publication, Result};
use tracing::{info, warn};

/// Default feed pages scanned per publication.
const DEFAULT_PAGES: std::ops::RangeInclusive<u32> = 1..=3;

#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Bypass the freshness check and overwrite stories regardless of dates.
    pub force: bool,
    /// Single page override; `None` scans pages 1-3.
    pub page: Option<u32>,
    /// Single-publication filter; `None` syncs all active publications.
    pub publication: Option<String>,
}

impl SyncOptions {
    fn pages(&self) -> Vec<u32> {
        match self.page {
            Some(page) => vec![page],
            None => DEFAULT_PAGES.collect(),
        }
    }
}

/// Outcome summary of one sync run. Per-entry failures are logged, counted,
/// and never escalate to a process failure: a partial sync beats no sync.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub publications_synced: usize,
    pub publications_skipped: usize,
    /// Runs cut short by a per-entry fatal; committed entries are kept but
    /// the watermark did not advance.
    pub publications_aborted: usize,
    pub publications_failed: usize,
    pub stories_created: usize,
    pub stories_updated: usize,
    pub images_added: usize,
}

enum SyncOutcome {
    Synced,
    Skipped,
    Aborted,
}

/// Orchestrates one scheduled ingestion run: fetch each selected publication's
/// feed, diff entries against the store, create or update stories, attach
/// categories and images, then advance the publication watermark.
pub struct Synchronizer<'a> {
    store: &'a Store,
    opener: &'a dyn FeedOpener,
    images: &'a dyn ImageFetcher,
    ranking: RankingConfig,
}

impl<'a> Synchronizer<'a> {
    pub fn new(
        store: &'a Store,
        opener: &'a dyn FeedOpener,
        images: &'a dyn ImageFetcher,
        ranking: RankingConfig,
    ) -> Self {
        Self {
            store,
            opener,
            images,
            ranking,
        }
    }

    pub async fn run(&self, options: &SyncOptions) -> Result<SyncReport> {
        let pages = options.pages();
        let publications = self
            .store
            .active_publications(options.publication.as_deref())
            .await?;
        if publications.is_empty() {
            warn!("No publications selected");
        }

        let mut report = SyncReport::default();
        for publication in &publications {
            // Publications are independent; one failing must not stop the rest.
            match self
                .sync_publication(publication, &pages, options, &mut report)
                .await
            {
                Ok(SyncOutcome::Synced) => report.publications_synced += 1,
                Ok(SyncOutcome::Skipped) => report.publications_skipped += 1,
                Ok(SyncOutcome::Aborted) => report.publications_aborted += 1,
                Err(e) => {
                    warn!("  - Sync of {} failed: {}", publication.name, e);
                    report.publications_failed += 1;
                }
            }
        }

        info!(
            "sync finished: {} synced, {} skipped, {} aborted, {} failed; {} stories created, {} updated, {} images",
            report.publications_synced,
            report.publications_skipped,
            report.publications_aborted,
            report.publications_failed,
            report.stories_created,
            report.stories_updated,
            report.images_added,
        );
        Ok(report)
    }

    async fn sync_publication(
        &self,
        publication: &Publication,
        pages: &[u32],
        options: &SyncOptions,
        report: &mut SyncReport,
    ) -> Result<SyncOutcome> {
        let Some(mut feed) = self.opener.open(publication) else {
            warn!(
                "  - Skipping {} because no source profile is registered.",
                publication.name
            );
            return Ok(SyncOutcome::Skipped);
        };

        let feed_last_update = feed.last_update().await?;
        let fresh = match feed_last_update {
            None => true,
            Some(updated) => updated > publication.last_update,
        };
        if !(options.force || fresh) {
            info!(
                "  - Skipping {} because there are no new changes.",
                publication.name
            );
            return Ok(SyncOutcome::Skipped);
        }

        let mut aborted = false;
        'pages: for &page in pages {
            let entries = match feed.page_entries(page).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(
                        "  - Aborting {} page {}: {}",
                        publication.name, page, e
                    );
                    aborted = true;
                    break;
                }
            };
            for result in entries {
                match result {
                    Ok(entry) => {
                        self.process_entry(publication, &entry, options, report)
                            .await?
                    }
                    Err(e) => {
                        // Per-entry fatal: stop this publication's run, keep
                        // what has already been committed.
                        warn!("  - Aborting {}: {}", publication.name, e);
                        aborted = true;
                        break 'pages;
                    }
                }
            }
        }

        // The watermark only advances after a complete pass, so an interrupted
        // run re-syncs this publication next time.
        if aborted {
            return Ok(SyncOutcome::Aborted);
        }
        if let Some(updated) = feed_last_update {
            self.store
                .set_publication_last_update(publication.id, updated)
                .await?;
        }
        Ok(SyncOutcome::Synced)
    }

    async fn process_entry(
        &self,
        publication: &Publication,
        entry: &NormalizedEntry,
        options: &SyncOptions,
        report: &mut SyncReport,
    ) -> Result<()> {
        let entry_id = match self.store.find_story(publication.id, entry.pub_id).await? {
            Some(existing) => {
                if options.force || entry.pub_date > existing.pub_date {
                    info!("  - Updating {}", entry.title);
                    self.store.update_story(existing.entry_id, entry).await?;
                    ranking::recompute_entry(self.store, &self.ranking, existing.entry_id).await?;
                    report.stories_updated += 1;
                } else {
                    info!("  - No change to {}", entry.title);
                }
                existing.entry_id
            }
            None => {
                info!("  - Creating {}", entry.title);
                let weight = ranking::compute_weight(
                    &self.ranking,
                    0,
                    0,
                    entry.pub_date,
                    chrono::Utc::now(),
                );
                let entry_id = self.store.create_story(publication.id, entry, weight).await?;
                report.stories_created += 1;
                entry_id
            }
        };

        for tag in &entry.tags {
            let category = self.store.get_or_create_category(tag).await?;
            self.store.attach_category(entry_id, category.id).await?;
        }

        for url in &entry.image_urls {
            if self.store.story_has_image(entry_id, url).await? {
                warn!("    = Image already exists: {}", url);
                continue;
            }
            let bytes = match self.images.fetch_image(url).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    // Image fetch failures degrade; they never abort the entry.
                    warn!("    = Image fetch failed for {}: {}", url, e);
                    continue;
                }
            };
            let sequence = self.store.image_count(entry_id).await?;
            self.store
                .insert_image(entry_id, url, sequence, &bytes)
                .await?;
            report.images_added += 1;
            info!("    = Image: {}", url);
        }

        Ok(())
    }
}
