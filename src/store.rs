use crate::types::{
    distant_past, Category, Comment, CommentTarget, EntryKind, FeedItem, NormalizedEntry,
    Publication, Result, Story, StoryImage, Topic,
};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, info};

/// Like/comment tallies the ranking engine recomputes weights from.
#[derive(Debug, Clone)]
pub struct EntryEngagement {
    pub entry_id: i64,
    pub pub_date: DateTime<Utc>,
    pub likes: i64,
    pub comments: i64,
}

/// SQLite-backed persistence. Natural-key uniqueness lives in the schema;
/// idempotent writes use conflict-tolerant inserts rather than pre-checks.
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        sqlx::migrate!().run(&pool).await?;
        Ok(Self { pool })
    }

    /// A private in-memory database on a single pooled connection.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        sqlx::migrate!().run(&pool).await?;
        Ok(Self { pool })
    }

    // ---- publications ----

    pub async fn insert_publication(
        &self,
        name: &str,
        url: &str,
        feed_url: &str,
        logo_url: Option<&str>,
    ) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO publications (name, url, feed_url, logo_url, last_update)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(name)
        .bind(url)
        .bind(feed_url)
        .bind(logo_url)
        .bind(distant_past())
        .execute(&self.pool)
        .await?;
        info!("added publication {}", name);
        Ok(result.last_insert_rowid())
    }

    /// Active publications, optionally filtered to a single name.
    pub async fn active_publications(&self, name: Option<&str>) -> Result<Vec<Publication>> {
        let rows = match name {
            Some(name) => {
                sqlx::query(
                    "SELECT * FROM publications WHERE active = 1 AND name = ?1 ORDER BY id",
                )
                .bind(name)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT * FROM publications WHERE active = 1 ORDER BY id")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.iter().map(publication_from_row).collect()
    }

    pub async fn publication_by_name(&self, name: &str) -> Result<Option<Publication>> {
        let row = sqlx::query("SELECT * FROM publications WHERE name = ?1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(publication_from_row).transpose()
    }

    pub async fn set_publication_last_update(
        &self,
        publication_id: i64,
        last_update: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query("UPDATE publications SET last_update = ?1 WHERE id = ?2")
            .bind(last_update)
            .bind(publication_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ---- stories ----

    pub async fn find_story(&self, publisher_id: i64, pub_id: i64) -> Result<Option<Story>> {
        let row = sqlx::query(
            "SELECT s.entry_id, s.publisher_id, s.pub_id, s.authors, s.content, s.text,
                    fe.title, fe.weight, fe.pub_date, fe.active
             FROM stories s JOIN feed_entries fe ON fe.id = s.entry_id
             WHERE s.publisher_id = ?1 AND s.pub_id = ?2",
        )
        .bind(publisher_id)
        .bind(pub_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(story_from_row).transpose()
    }

    /// Create a story with its base feed-entry record. `weight` must be the
    /// already-computed initial weight; entries never appear unranked.
    pub async fn create_story(
        &self,
        publisher_id: i64,
        entry: &NormalizedEntry,
        weight: f64,
    ) -> Result<i64> {
        let mut tx = self.pool.begin().await?;
        let entry_id = sqlx::query(
            "INSERT INTO feed_entries (kind, title, weight, pub_date) VALUES ('story', ?1, ?2, ?3)",
        )
        .bind(&entry.title)
        .bind(weight)
        .bind(entry.pub_date)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        sqlx::query(
            "INSERT INTO stories (entry_id, publisher_id, pub_id, authors, content, text)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(entry_id)
        .bind(publisher_id)
        .bind(entry.pub_id)
        .bind(&entry.authors)
        .bind(&entry.content)
        .bind(&entry.text)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(entry_id)
    }

    /// Update the mutable fields of an existing story in place.
    pub async fn update_story(&self, entry_id: i64, entry: &NormalizedEntry) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE feed_entries SET title = ?1, pub_date = ?2 WHERE id = ?3")
            .bind(&entry.title)
            .bind(entry.pub_date)
            .bind(entry_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "UPDATE stories SET authors = ?1, content = ?2, text = ?3 WHERE entry_id = ?4",
        )
        .bind(&entry.authors)
        .bind(&entry.content)
        .bind(&entry.text)
        .bind(entry_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    // ---- topics ----

    pub async fn create_topic(
        &self,
        title: &str,
        pub_date: DateTime<Utc>,
        weight: f64,
    ) -> Result<i64> {
        let mut tx = self.pool.begin().await?;
        let entry_id = sqlx::query(
            "INSERT INTO feed_entries (kind, title, weight, pub_date) VALUES ('topic', ?1, ?2, ?3)",
        )
        .bind(title)
        .bind(weight)
        .bind(pub_date)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();
        sqlx::query("INSERT INTO topics (entry_id) VALUES (?1)")
            .bind(entry_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(entry_id)
    }

    pub async fn get_topic(&self, entry_id: i64) -> Result<Option<Topic>> {
        let row = sqlx::query(
            "SELECT t.entry_id, fe.title, fe.weight, fe.pub_date, fe.active
             FROM topics t JOIN feed_entries fe ON fe.id = t.entry_id
             WHERE t.entry_id = ?1",
        )
        .bind(entry_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|row| {
            Ok(Topic {
                entry_id: row.try_get("entry_id")?,
                title: row.try_get("title")?,
                weight: row.try_get("weight")?,
                pub_date: row.try_get("pub_date")?,
                active: row.try_get("active")?,
            })
        })
        .transpose()
    }

    /// Cross-link a topic with a story. Idempotent.
    pub async fn link_topic_story(&self, topic_id: i64, story_id: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO topic_stories (topic_id, story_id) VALUES (?1, ?2)
             ON CONFLICT (topic_id, story_id) DO NOTHING",
        )
        .bind(topic_id)
        .bind(story_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ---- categories ----

    /// Get-or-create by name, race-safe: a conflict-tolerant insert against the
    /// unique constraint, then a read. Two concurrent creations resolve to one
    /// row.
    pub async fn get_or_create_category(&self, name: &str) -> Result<Category> {
        sqlx::query("INSERT INTO categories (name) VALUES (?1) ON CONFLICT (name) DO NOTHING")
            .bind(name)
            .execute(&self.pool)
            .await?;
        let row = sqlx::query("SELECT id, name, story_count FROM categories WHERE name = ?1")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(Category {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            story_count: row.try_get("story_count")?,
        })
    }

    /// Associate a category with a story. Re-associating is a no-op.
    pub async fn attach_category(&self, story_id: i64, category_id: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO story_categories (story_id, category_id) VALUES (?1, ?2)
             ON CONFLICT (story_id, category_id) DO NOTHING",
        )
        .bind(story_id)
        .bind(category_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn story_category_names(&self, story_id: i64) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT c.name FROM categories c
             JOIN story_categories sc ON sc.category_id = c.id
             WHERE sc.story_id = ?1 ORDER BY c.name",
        )
        .bind(story_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(|r| Ok(r.try_get("name")?)).collect()
    }

    /// Refresh every category's denormalized story count in one pass.
    pub async fn recount_categories(&self) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE categories SET story_count =
               (SELECT COUNT(*) FROM story_categories sc WHERE sc.category_id = categories.id)",
        )
        .execute(&self.pool)
        .await?;
        debug!("recounted {} categories", result.rows_affected());
        Ok(result.rows_affected())
    }

    pub async fn category_by_name(&self, name: &str) -> Result<Option<Category>> {
        let row = sqlx::query("SELECT id, name, story_count FROM categories WHERE name = ?1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| {
            Ok(Category {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                story_count: row.try_get("story_count")?,
            })
        })
        .transpose()
    }

    // ---- images ----

    pub async fn story_has_image(&self, story_id: i64, source_url: &str) -> Result<bool> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM story_images WHERE story_id = ?1 AND source_url = ?2",
        )
        .bind(story_id)
        .bind(source_url)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get::<i64, _>("n")? > 0)
    }

    pub async fn image_count(&self, story_id: i64) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM story_images WHERE story_id = ?1")
            .bind(story_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }

    pub async fn insert_image(
        &self,
        story_id: i64,
        source_url: &str,
        sequence: i64,
        content: &[u8],
    ) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO story_images (story_id, source_url, sequence, content)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(story_id)
        .bind(source_url)
        .bind(sequence)
        .bind(content)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn story_images(&self, story_id: i64) -> Result<Vec<StoryImage>> {
        let rows = sqlx::query(
            "SELECT id, story_id, source_url, sequence FROM story_images
             WHERE story_id = ?1 ORDER BY sequence",
        )
        .bind(story_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                Ok(StoryImage {
                    id: row.try_get("id")?,
                    story_id: row.try_get("story_id")?,
                    source_url: row.try_get("source_url")?,
                    sequence: row.try_get("sequence")?,
                })
            })
            .collect()
    }

    // ---- feed entries, ranking, projection ----

    pub async fn entry_kind(&self, entry_id: i64) -> Result<Option<EntryKind>> {
        let row = sqlx::query("SELECT kind FROM feed_entries WHERE id = ?1")
            .bind(entry_id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let kind: String = row.try_get("kind")?;
                Ok(EntryKind::parse(&kind))
            }
            None => Ok(None),
        }
    }

    pub async fn entry_weight(&self, entry_id: i64) -> Result<f64> {
        let row = sqlx::query("SELECT weight FROM feed_entries WHERE id = ?1")
            .bind(entry_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("weight")?)
    }

    pub async fn set_entry_active(&self, entry_id: i64, active: bool) -> Result<()> {
        sqlx::query("UPDATE feed_entries SET active = ?1 WHERE id = ?2")
            .bind(active)
            .bind(entry_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_entry_weight(&self, entry_id: i64, weight: f64) -> Result<()> {
        sqlx::query("UPDATE feed_entries SET weight = ?1 WHERE id = ?2")
            .bind(weight)
            .bind(entry_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn entry_engagement(&self, entry_id: i64) -> Result<Option<EntryEngagement>> {
        let row = sqlx::query(&format!("{} WHERE fe.id = ?1", ENGAGEMENT_QUERY))
            .bind(entry_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(engagement_from_row).transpose()
    }

    pub async fn all_entry_engagements(&self) -> Result<Vec<EntryEngagement>> {
        let rows = sqlx::query(ENGAGEMENT_QUERY).fetch_all(&self.pool).await?;
        rows.iter().map(engagement_from_row).collect()
    }

    /// The unified feed: all active entries tagged with their concrete type,
    /// ordered by weight ascending (the stored ordering; callers wanting best
    /// first reverse).
    pub async fn feed_items(&self) -> Result<Vec<FeedItem>> {
        let rows =
            sqlx::query("SELECT id, kind FROM feed_entries WHERE active = 1 ORDER BY weight ASC")
                .fetch_all(&self.pool)
                .await?;
        rows.iter()
            .map(|row| {
                let kind: String = row.try_get("kind")?;
                Ok(FeedItem {
                    id: row.try_get("id")?,
                    kind: EntryKind::parse(&kind)
                        .expect("kind column is constrained to story/topic"),
                })
            })
            .collect()
    }

    // ---- social interactions ----

    pub async fn insert_like(&self, actor: &str, entry_id: i64) -> Result<i64> {
        let result = sqlx::query("INSERT INTO likes (actor, entry_id) VALUES (?1, ?2)")
            .bind(actor)
            .bind(entry_id)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn insert_comment(
        &self,
        author: &str,
        target: CommentTarget,
        text: &str,
        pub_date: DateTime<Utc>,
    ) -> Result<i64> {
        let (story_id, topic_id) = match target {
            CommentTarget::Story(id) => (Some(id), None),
            CommentTarget::Topic(id) => (None, Some(id)),
        };
        let result = sqlx::query(
            "INSERT INTO comments (author, story_id, topic_id, text, pub_date)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(author)
        .bind(story_id)
        .bind(topic_id)
        .bind(text)
        .bind(pub_date)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get_comment(&self, comment_id: i64) -> Result<Option<Comment>> {
        let row = sqlx::query(
            "SELECT id, author, story_id, topic_id, text, pub_date FROM comments WHERE id = ?1",
        )
        .bind(comment_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|row| {
            let story_id: Option<i64> = row.try_get("story_id")?;
            let topic_id: Option<i64> = row.try_get("topic_id")?;
            let target = match (story_id, topic_id) {
                (Some(id), None) => CommentTarget::Story(id),
                (None, Some(id)) => CommentTarget::Topic(id),
                _ => unreachable!("comment target is constrained to exactly one"),
            };
            Ok(Comment {
                id: row.try_get("id")?,
                author: row.try_get("author")?,
                target,
                text: row.try_get("text")?,
                pub_date: row.try_get("pub_date")?,
            })
        })
        .transpose()
    }

    /// Distinct authors who commented on the same target, excluding one.
    pub async fn comment_participants(
        &self,
        target: CommentTarget,
        excluding: &str,
    ) -> Result<Vec<String>> {
        let (column, id) = match target {
            CommentTarget::Story(id) => ("story_id", id),
            CommentTarget::Topic(id) => ("topic_id", id),
        };
        let rows = sqlx::query(&format!(
            "SELECT DISTINCT author FROM comments WHERE {column} = ?1 AND author <> ?2 ORDER BY author"
        ))
        .bind(id)
        .bind(excluding)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(|r| Ok(r.try_get("author")?)).collect()
    }

    pub async fn insert_upvote(&self, comment_id: i64, author: &str) -> Result<i64> {
        let result = sqlx::query("INSERT INTO comment_upvotes (comment_id, author) VALUES (?1, ?2)")
            .bind(comment_id)
            .bind(author)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn insert_flag(&self, comment_id: i64, author: &str) -> Result<i64> {
        let result = sqlx::query("INSERT INTO comment_flags (comment_id, author) VALUES (?1, ?2)")
            .bind(comment_id)
            .bind(author)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn upvote_count(&self, comment_id: i64) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM comment_upvotes WHERE comment_id = ?1")
            .bind(comment_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }

    // ---- stats ----

    pub async fn stats(&self) -> Result<HashMap<String, i64>> {
        let mut stats = HashMap::new();
        for (key, table) in [
            ("publications", "publications"),
            ("stories", "stories"),
            ("topics", "topics"),
            ("categories", "categories"),
            ("images", "story_images"),
            ("comments", "comments"),
            ("likes", "likes"),
        ] {
            let row = sqlx::query(&format!("SELECT COUNT(*) AS n FROM {table}"))
                .fetch_one(&self.pool)
                .await?;
            stats.insert(key.to_string(), row.try_get("n")?);
        }
        Ok(stats)
    }
}

const ENGAGEMENT_QUERY: &str = "SELECT fe.id AS entry_id, fe.pub_date,
   (SELECT COUNT(*) FROM likes l WHERE l.entry_id = fe.id) AS likes,
   (SELECT COUNT(*) FROM comments c WHERE c.story_id = fe.id OR c.topic_id = fe.id) AS comments
 FROM feed_entries fe";

fn publication_from_row(row: &SqliteRow) -> Result<Publication> {
    Ok(Publication {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        url: row.try_get("url")?,
        feed_url: row.try_get("feed_url")?,
        logo_url: row.try_get("logo_url")?,
        last_update: row.try_get("last_update")?,
        active: row.try_get("active")?,
    })
}

fn story_from_row(row: &SqliteRow) -> Result<Story> {
    Ok(Story {
        entry_id: row.try_get("entry_id")?,
        publisher_id: row.try_get("publisher_id")?,
        pub_id: row.try_get("pub_id")?,
        title: row.try_get("title")?,
        weight: row.try_get("weight")?,
        pub_date: row.try_get("pub_date")?,
        active: row.try_get("active")?,
        authors: row.try_get("authors")?,
        content: row.try_get("content")?,
        text: row.try_get("text")?,
    })
}

fn engagement_from_row(row: &SqliteRow) -> Result<EntryEngagement> {
    Ok(EntryEngagement {
        entry_id: row.try_get("entry_id")?,
        pub_date: row.try_get("pub_date")?,
        likes: row.try_get("likes")?,
        comments: row.try_get("comments")?,
    })
}

/// True when a database error is a unique-constraint violation; the write
/// paths map these to structured validation rejections.
pub fn is_unique_violation(err: &crate::types::Error) -> bool {
    match err {
        crate::types::Error::Database(sqlx::Error::Database(db)) => db.is_unique_violation(),
        _ => false,
    }
}
