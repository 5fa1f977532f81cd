use crate::store::{is_unique_violation, Store};
use crate::types::{Comment, CommentTarget, EntryKind, Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

/// Post-commit hook invoked after a comment is persisted, with the distinct
/// other participants in the same discussion. Delivery (push, email, nothing)
/// is the implementor's concern; the write path only makes the side effect
/// explicit and testable.
#[async_trait]
pub trait CommentNotifier: Send + Sync {
    async fn comment_posted(&self, comment: &Comment, participants: &[String]);
}

/// Default notifier: logs who would be notified.
pub struct LogNotifier;

#[async_trait]
impl CommentNotifier for LogNotifier {
    async fn comment_posted(&self, comment: &Comment, participants: &[String]) {
        info!(
            "comment {} by {}: notifying {} participant(s)",
            comment.id,
            comment.author,
            participants.len()
        );
    }
}

/// User-interaction write paths: comments, likes, upvotes, flags. Uniqueness
/// is enforced by the schema's constraints and mapped to structured
/// validation rejections rather than pre-checked.
pub struct Interactions<'a> {
    store: &'a Store,
    notifier: &'a dyn CommentNotifier,
}

impl<'a> Interactions<'a> {
    pub fn new(store: &'a Store, notifier: &'a dyn CommentNotifier) -> Self {
        Self { store, notifier }
    }

    pub async fn post_comment(
        &self,
        author: &str,
        target: CommentTarget,
        text: &str,
    ) -> Result<Comment> {
        if text.trim().is_empty() {
            return Err(Error::validation("comment text must not be empty"));
        }

        let expected = match target {
            CommentTarget::Story(_) => EntryKind::Story,
            CommentTarget::Topic(_) => EntryKind::Topic,
        };
        match self.store.entry_kind(target.entry_id()).await? {
            Some(kind) if kind == expected => {}
            _ => {
                return Err(Error::not_found(format!(
                    "{} {}",
                    expected.as_str(),
                    target.entry_id()
                )))
            }
        }

        let pub_date = Utc::now();
        let id = self
            .store
            .insert_comment(author, target, text, pub_date)
            .await?;
        let comment = Comment {
            id,
            author: author.to_string(),
            target,
            text: text.to_string(),
            pub_date,
        };

        // Post-commit: the comment row is already durable.
        let participants = self.store.comment_participants(target, author).await?;
        self.notifier.comment_posted(&comment, &participants).await;

        Ok(comment)
    }

    /// Record that an actor likes a feed entry. One like per actor per entry.
    pub async fn like(&self, actor: &str, entry_id: i64) -> Result<()> {
        if self.store.entry_kind(entry_id).await?.is_none() {
            return Err(Error::not_found(format!("feed entry {entry_id}")));
        }
        match self.store.insert_like(actor, entry_id).await {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => {
                Err(Error::validation("entry already liked by this user"))
            }
            Err(e) => Err(e),
        }
    }

    pub async fn upvote_comment(&self, author: &str, comment_id: i64) -> Result<()> {
        let comment = self
            .store
            .get_comment(comment_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("comment {comment_id}")))?;
        if comment.author == author {
            return Err(Error::validation(
                "users may not upvote their own comments",
            ));
        }
        match self.store.insert_upvote(comment_id, author).await {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => {
                Err(Error::validation("comment already upvoted by this user"))
            }
            Err(e) => Err(e),
        }
    }

    pub async fn flag_comment(&self, author: &str, comment_id: i64) -> Result<()> {
        if self.store.get_comment(comment_id).await?.is_none() {
            return Err(Error::not_found(format!("comment {comment_id}")));
        }
        match self.store.insert_flag(comment_id, author).await {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => {
                Err(Error::validation("comment already flagged by this user"))
            }
            Err(e) => Err(e),
        }
    }
}
