mod common;

use async_trait::async_trait;
use chrono::Utc;
use common::entry;
use std::sync::Mutex;
use storyfeed::{Comment, CommentNotifier, CommentTarget, Error, Interactions, Store};

/// Notifier capturing every post-commit call for assertions.
#[derive(Default)]
struct RecordingNotifier {
    calls: Mutex<Vec<(i64, Vec<String>)>>,
}

#[async_trait]
impl CommentNotifier for RecordingNotifier {
    async fn comment_posted(&self, comment: &Comment, participants: &[String]) {
        self.calls
            .lock()
            .unwrap()
            .push((comment.id, participants.to_vec()));
    }
}

async fn store_with_story() -> (Store, i64) {
    let store = Store::in_memory().await.unwrap();
    let publisher_id = store
        .insert_publication(
            "Chronicle",
            "http://fixture.example",
            "http://fixture.example/feed",
            None,
        )
        .await
        .unwrap();
    let entry_id = store
        .create_story(publisher_id, &entry(1, "Season opener", 2), 0.25)
        .await
        .unwrap();
    (store, entry_id)
}

fn assert_validation(err: Error, needle: &str) {
    match err {
        Error::Validation(messages) => {
            assert!(
                messages.iter().any(|m| m.contains(needle)),
                "expected {needle:?} in {messages:?}"
            );
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn comment_on_story_notifies_other_participants() {
    let (store, story_id) = store_with_story().await;
    let notifier = RecordingNotifier::default();
    let interactions = Interactions::new(&store, &notifier);

    interactions
        .post_comment("alice", CommentTarget::Story(story_id), "First!")
        .await
        .unwrap();
    interactions
        .post_comment("bob", CommentTarget::Story(story_id), "Agreed.")
        .await
        .unwrap();
    let third = interactions
        .post_comment("alice", CommentTarget::Story(story_id), "Replying to bob")
        .await
        .unwrap();

    let calls = notifier.calls.lock().unwrap();
    assert_eq!(calls.len(), 3);
    // Alice started the thread alone, so nobody is notified.
    assert!(calls[0].1.is_empty());
    assert_eq!(calls[1].1, vec!["alice"]);
    // Alice's own earlier comment never counts her as a participant.
    assert_eq!(calls[2].0, third.id);
    assert_eq!(calls[2].1, vec!["bob"]);
}

#[tokio::test]
async fn empty_comment_text_is_rejected() {
    let (store, story_id) = store_with_story().await;
    let notifier = RecordingNotifier::default();
    let interactions = Interactions::new(&store, &notifier);

    let err = interactions
        .post_comment("alice", CommentTarget::Story(story_id), "   \n\t")
        .await
        .unwrap_err();
    assert_validation(err, "must not be empty");
    assert!(notifier.calls.lock().unwrap().is_empty());
    assert_eq!(store.stats().await.unwrap()["comments"], 0);
}

#[tokio::test]
async fn comment_targets_are_kind_checked() {
    let (store, story_id) = store_with_story().await;
    let topic_id = store
        .create_topic("Playoff picture", Utc::now(), 0.1)
        .await
        .unwrap();
    let notifier = RecordingNotifier::default();
    let interactions = Interactions::new(&store, &notifier);

    // A story entry addressed as a topic (and vice versa) is not found.
    let err = interactions
        .post_comment("alice", CommentTarget::Topic(story_id), "hi")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
    let err = interactions
        .post_comment("alice", CommentTarget::Story(topic_id), "hi")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));

    let err = interactions
        .post_comment("alice", CommentTarget::Story(9999), "hi")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));

    interactions
        .post_comment("alice", CommentTarget::Topic(topic_id), "On topic")
        .await
        .unwrap();
}

#[tokio::test]
async fn likes_are_unique_per_actor_and_entry() {
    let (store, story_id) = store_with_story().await;
    let notifier = RecordingNotifier::default();
    let interactions = Interactions::new(&store, &notifier);

    interactions.like("alice", story_id).await.unwrap();
    interactions.like("bob", story_id).await.unwrap();

    let err = interactions.like("alice", story_id).await.unwrap_err();
    assert_validation(err, "already liked");

    let err = interactions.like("alice", 9999).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));

    assert_eq!(store.stats().await.unwrap()["likes"], 2);
}

#[tokio::test]
async fn upvotes_reject_self_and_duplicates() {
    let (store, story_id) = store_with_story().await;
    let notifier = RecordingNotifier::default();
    let interactions = Interactions::new(&store, &notifier);
    let comment = interactions
        .post_comment("alice", CommentTarget::Story(story_id), "Hot take")
        .await
        .unwrap();

    let err = interactions
        .upvote_comment("alice", comment.id)
        .await
        .unwrap_err();
    assert_validation(err, "their own comments");

    interactions.upvote_comment("bob", comment.id).await.unwrap();
    let err = interactions
        .upvote_comment("bob", comment.id)
        .await
        .unwrap_err();
    assert_validation(err, "already upvoted");

    let err = interactions.upvote_comment("bob", 9999).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));

    assert_eq!(store.upvote_count(comment.id).await.unwrap(), 1);
}

#[tokio::test]
async fn flags_are_unique_per_author() {
    let (store, story_id) = store_with_story().await;
    let notifier = RecordingNotifier::default();
    let interactions = Interactions::new(&store, &notifier);
    let comment = interactions
        .post_comment("alice", CommentTarget::Story(story_id), "Spam spam spam")
        .await
        .unwrap();

    interactions.flag_comment("bob", comment.id).await.unwrap();
    let err = interactions
        .flag_comment("bob", comment.id)
        .await
        .unwrap_err();
    assert_validation(err, "already flagged");

    let err = interactions.flag_comment("bob", 9999).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}
