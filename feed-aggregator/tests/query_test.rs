use chrono::{DateTime, TimeZone, Utc};
use feed_aggregator::{query, types::*, FeedClient, Query};
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

fn day(d: u32) -> Option<DateTime<Utc>> {
    Some(Utc.with_ymd_and_hms(2024, 5, d, 0, 0, 0).unwrap())
}

fn content(title: &str, snippet: &str, published_at: Option<DateTime<Utc>>) -> ContentItem {
    ContentItem {
        id: Uuid::new_v4(),
        source_id: Uuid::nil(),
        title: title.to_string(),
        snippet: snippet.to_string(),
        url: format!("https://example.com/{}", title.to_lowercase().replace(' ', "-")),
        published_at,
        image_url: None,
    }
}

fn sample() -> Vec<ContentItem> {
    vec![
        content("Tailwind CSS Best Practices", "Utility classes at scale", day(14)),
        content("The Future of AI in Development", "Assistants everywhere", day(16)),
        content("Undated Post", "No timestamp here", None),
        content("Understanding React Hooks", "useState and friends", day(15)),
    ]
}

fn dates(items: &[ContentItem]) -> Vec<Option<DateTime<Utc>>> {
    items.iter().map(|item| item.published_at).collect()
}

#[test]
fn test_newest_puts_missing_last() {
    init_tracing();
    let items = sample();

    let sorted = query(&items, "", SortOrder::Newest);
    assert_eq!(dates(&sorted), vec![day(16), day(15), day(14), None]);
}

#[test]
fn test_oldest_puts_missing_first() {
    init_tracing();
    let items = sample();

    let sorted = query(&items, "", SortOrder::Oldest);
    assert_eq!(dates(&sorted), vec![None, day(14), day(15), day(16)]);
}

#[test]
fn test_search_matches_title_and_snippet_case_insensitively() {
    init_tracing();
    let items = sample();

    let react = query(&items, "react", SortOrder::Newest);
    assert_eq!(react.len(), 1);
    assert_eq!(react[0].title, "Understanding React Hooks");

    let by_snippet = query(&items, "  USESTATE ", SortOrder::Newest);
    assert_eq!(by_snippet.len(), 1);
    assert_eq!(by_snippet[0].title, "Understanding React Hooks");

    assert!(query(&items, "kubernetes", SortOrder::Newest).is_empty());
    assert_eq!(query(&items, "   ", SortOrder::Newest).len(), items.len());
}

#[test]
fn test_ties_keep_input_order() {
    init_tracing();
    let items = vec![
        content("First", "", day(15)),
        content("Second", "", day(15)),
        content("Third", "", None),
        content("Fourth", "", None),
    ];

    let newest: Vec<String> = query(&items, "", SortOrder::Newest)
        .into_iter()
        .map(|item| item.title)
        .collect();
    assert_eq!(newest, ["First", "Second", "Third", "Fourth"]);

    let oldest: Vec<String> = query(&items, "", SortOrder::Oldest)
        .into_iter()
        .map(|item| item.title)
        .collect();
    assert_eq!(oldest, ["Third", "Fourth", "First", "Second"]);
}

#[test]
fn test_query_does_not_mutate_input() {
    init_tracing();
    let items = sample();
    let copy = items.clone();

    let _ = query(&items, "a", SortOrder::Newest);
    let _ = Query::new("", SortOrder::Oldest).apply(&items);

    assert_eq!(items, copy);
}

#[test]
fn test_sort_order_parsing() {
    assert_eq!("newest".parse::<SortOrder>().unwrap(), SortOrder::Newest);
    assert_eq!(" Oldest ".parse::<SortOrder>().unwrap(), SortOrder::Oldest);
    assert!("random".parse::<SortOrder>().is_err());
    assert_eq!(SortOrder::default(), SortOrder::Newest);
    assert_eq!(SortOrder::Oldest.to_string(), "oldest");
}

#[tokio::test]
async fn test_feed_decorates_entries() -> Result<()> {
    init_tracing();
    let client = FeedClient::default();
    let user = UserId::new("alice");

    let react = client.add_source("https://react.dev/blog", Some("React Blog Official"))?;
    let tailwind = client.add_source("https://tailwindcss.com/blog", Some("Tailwind CSS News"))?;
    client.ingest(
        react.id,
        &[RawItem::new("/blog/hooks", "Understanding React Hooks").with_published_at("2024-05-15")],
    )?;
    client.ingest(
        tailwind.id,
        &[RawItem::new("/blog/tips", "Tailwind CSS Best Practices").with_published_at("2024-05-14")],
    )?;

    let hooks = client.query(&Query::new("react", SortOrder::Newest));
    assert_eq!(hooks.len(), 1);
    client.bookmark(&user, hooks[0].id);

    let entries = client.feed(&user, &client.default_query(""));
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].item.title, "Understanding React Hooks");
    assert_eq!(entries[0].source_name, "React Blog Official");
    assert!(entries[0].bookmarked);
    assert_eq!(entries[1].source_name, "Tailwind CSS News");
    assert!(!entries[1].bookmarked);

    Ok(())
}
