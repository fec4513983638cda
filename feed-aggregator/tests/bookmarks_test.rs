use feed_aggregator::{types::*, BookmarkStore, FeedClient};
use std::sync::Once;
use uuid::Uuid;

static INIT: Once = Once::new();

fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .try_init();
    });
}

#[test]
fn test_bookmark_is_idempotent() {
    init_tracing();
    let store = BookmarkStore::new();
    let user = UserId::new("alice");
    let item = Uuid::new_v4();

    assert!(store.bookmark(&user, item));
    assert!(!store.bookmark(&user, item));
    assert_eq!(store.count(&user), 1);
    assert!(store.is_bookmarked(&user, item));

    assert!(store.unbookmark(&user, item));
    assert!(!store.unbookmark(&user, item));
    assert_eq!(store.count(&user), 0);
    assert!(!store.is_bookmarked(&user, item));
}

#[test]
fn test_bookmarks_are_per_user() {
    init_tracing();
    let store = BookmarkStore::new();
    let alice = UserId::new("alice");
    let bob = UserId::from("bob");
    let item = Uuid::new_v4();

    store.bookmark(&alice, item);
    assert!(store.is_bookmarked(&alice, item));
    assert!(!store.is_bookmarked(&bob, item));
    assert!(store.list_bookmarked(&bob).is_empty());

    // Unbookmarking for another user touches nothing
    assert!(!store.unbookmark(&bob, item));
    assert_eq!(store.count(&alice), 1);
}

#[test]
fn test_unknown_item_ids_are_accepted() {
    init_tracing();
    let store = BookmarkStore::new();
    let user = UserId::new("alice");
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();

    store.bookmark(&user, first);
    store.bookmark(&user, second);

    let listed = store.list_bookmarked(&user);
    assert_eq!(listed.len(), 2);
    assert!(listed.contains(&first) && listed.contains(&second));
    assert_eq!(store.all_bookmarks().len(), 2);
}

#[tokio::test]
async fn test_bookmark_dangles_after_cascade() -> Result<()> {
    init_tracing();
    let client = FeedClient::default();
    let user = UserId::new("alice");

    let react = client.add_source("https://react.dev/blog", None)?;
    client.ingest(react.id, &[RawItem::new("/blog/hooks", "Understanding React Hooks")])?;
    let item_id = client.current_view()[0].id;

    assert!(client.bookmark(&user, item_id));
    assert!(client.unbookmark(&user, item_id));
    assert!(client.saved_items(&user).is_empty());
    client.bookmark(&user, item_id);
    assert_eq!(client.saved_items(&user).len(), 1);

    client.remove_source(react.id, true)?;

    // The bookmark survives but resolves to nothing
    assert!(client.is_bookmarked(&user, item_id));
    assert!(client.list_bookmarked(&user).contains(&item_id));
    assert!(client.aggregator().get_item(item_id).is_none());
    assert!(client.saved_items(&user).is_empty());

    Ok(())
}

#[tokio::test]
async fn test_saved_items_hide_inactive_sources() -> Result<()> {
    init_tracing();
    let client = FeedClient::default();
    let user = UserId::new("alice");

    let tech = client.add_source("https://technewsdaily.co/feed", None)?;
    client.ingest(tech.id, &[RawItem::new("/feed/ai", "The Future of AI in Development")])?;
    let item_id = client.current_view()[0].id;
    client.bookmark(&user, item_id);

    client.set_active(tech.id, false)?;
    assert!(client.saved_items(&user).is_empty());
    assert_eq!(client.bookmarks(&user).len(), 1);

    client.set_active(tech.id, true)?;
    let saved = client.saved_items(&user);
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].id, item_id);

    Ok(())
}
