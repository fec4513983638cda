use feed_aggregator::{
    types::*, FeedAggregator, FeedClient, SourceEvent, SourceObserver, SourceRegistry,
};
use std::sync::{Arc, Mutex, Once};
use tracing::info;

static INIT: Once = Once::new();

fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .try_init();
    });
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<SourceEvent>>,
}

impl SourceObserver for Recorder {
    fn on_source_event(&self, event: &SourceEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Records what a view would see at the moment a removal is announced.
struct RemovalWitness {
    registry: Arc<SourceRegistry>,
    aggregator: Arc<FeedAggregator>,
    seen: Mutex<Vec<(bool, usize, usize)>>,
}

impl SourceObserver for RemovalWitness {
    fn on_source_event(&self, event: &SourceEvent) {
        if let SourceEvent::Removed(id) = event {
            let still_registered = self.registry.get_source(*id).is_ok();
            let view = self.aggregator.current_view();
            let from_removed = view.iter().filter(|item| item.source_id == *id).count();
            let unresolved = view
                .iter()
                .filter(|item| self.registry.get_source(item.source_id).is_err())
                .count();
            self.seen
                .lock()
                .unwrap()
                .push((still_registered, from_removed, unresolved));
        }
    }
}

#[tokio::test]
async fn test_add_source_normalizes_and_names() -> Result<()> {
    init_tracing();
    let client = FeedClient::default();

    let source = client.add_source("  https://React.dev/blog/#latest ", Some("  React Blog Official "))?;
    info!("Added {:?}", source);

    assert_eq!(source.url, "https://react.dev/blog");
    assert_eq!(source.name, "React Blog Official");
    assert!(source.is_active);
    assert_eq!(source.last_fetched_at, None);
    assert_eq!(source.item_count, 0);

    let unnamed = client.add_source("https://tailwindcss.com/blog", None)?;
    assert_eq!(unnamed.name, "tailwindcss.com");

    let blank = client.add_source("https://technewsdaily.co/feed", Some("   "))?;
    assert_eq!(blank.name, "technewsdaily.co");

    Ok(())
}

#[tokio::test]
async fn test_invalid_urls_are_rejected() {
    init_tracing();
    let client = FeedClient::default();

    for raw in ["", "   ", "not a url", "/feed.xml", "ftp://example.com/feed", "mailto:a@b.c"] {
        match client.add_source(raw, None) {
            Err(FeedError::InvalidUrl { .. }) => {}
            other => panic!("expected InvalidUrl for {:?}, got {:?}", raw, other),
        }
    }

    assert!(client.list_sources().is_empty());
}

#[tokio::test]
async fn test_duplicate_active_url_is_rejected() -> Result<()> {
    init_tracing();
    let client = FeedClient::default();

    let first = client.add_source("https://react.dev/blog", None)?;
    let duplicate = client.add_source("https://REACT.dev/blog/", Some("Again"));
    assert!(matches!(duplicate, Err(FeedError::DuplicateSource { .. })));

    // An inactive subscription frees the URL
    client.set_active(first.id, false)?;
    let second = client.add_source("https://react.dev/blog", Some("Again"))?;
    assert_ne!(first.id, second.id);

    // ...but the old one cannot come back while the new one is active
    let reactivate = client.set_active(first.id, true);
    assert!(matches!(reactivate, Err(FeedError::DuplicateSource { .. })));
    assert!(!client.get_source(first.id)?.is_active);

    Ok(())
}

#[tokio::test]
async fn test_update_source() -> Result<()> {
    init_tracing();
    let client = FeedClient::default();

    let react = client.add_source("https://react.dev/blog", None)?;
    let tailwind = client.add_source("https://tailwindcss.com/blog", None)?;

    let renamed = client.update_source(react.id, SourcePatch::rename("React"))?;
    assert_eq!(renamed.name, "React");
    assert_eq!(renamed.url, react.url);
    assert!(renamed.updated_at >= react.updated_at);

    let moved = client.update_source(
        react.id,
        SourcePatch::default().with_url("https://react.dev/blog/rss.xml"),
    )?;
    assert_eq!(moved.url, "https://react.dev/blog/rss.xml");
    assert_eq!(moved.name, "React");

    let clash = client.update_source(
        react.id,
        SourcePatch::default().with_url("https://tailwindcss.com/blog"),
    );
    assert!(matches!(clash, Err(FeedError::DuplicateSource { .. })));

    let invalid = client.update_source(tailwind.id, SourcePatch::default().with_url("nope"));
    assert!(matches!(invalid, Err(FeedError::InvalidUrl { .. })));
    assert_eq!(client.get_source(tailwind.id)?.url, "https://tailwindcss.com/blog");

    let missing = client.update_source(uuid::Uuid::new_v4(), SourcePatch::rename("x"));
    assert!(matches!(missing, Err(FeedError::SourceNotFound { .. })));

    Ok(())
}

#[tokio::test]
async fn test_set_active_round_trip() -> Result<()> {
    init_tracing();
    let client = FeedClient::default();
    let source = client.add_source("https://react.dev/blog", None)?;

    client.set_active(source.id, false)?;
    assert!(!client.get_source(source.id)?.is_active);

    // Same state again is fine
    client.set_active(source.id, false)?;

    client.set_active(source.id, true)?;
    assert!(client.get_source(source.id)?.is_active);

    let missing = client.set_active(uuid::Uuid::new_v4(), true);
    assert!(matches!(missing, Err(FeedError::SourceNotFound { .. })));

    Ok(())
}

#[tokio::test]
async fn test_remove_requires_cascade() -> Result<()> {
    init_tracing();
    let client = FeedClient::default();
    let source = client.add_source("https://react.dev/blog", None)?;

    let refused = client.remove_source(source.id, false);
    assert!(matches!(refused, Err(FeedError::CascadeRequired { .. })));
    assert!(client.get_source(source.id).is_ok());

    let removed = client.remove_source(source.id, true)?;
    assert_eq!(removed.id, source.id);
    assert!(matches!(
        client.get_source(source.id),
        Err(FeedError::SourceNotFound { .. })
    ));

    let again = client.remove_source(source.id, true);
    assert!(matches!(again, Err(FeedError::SourceNotFound { .. })));

    Ok(())
}

#[tokio::test]
async fn test_remove_all_sources() -> Result<()> {
    init_tracing();
    let client = FeedClient::default();

    client.add_source("https://react.dev/blog", None)?;
    client.add_source("https://tailwindcss.com/blog", None)?;
    let tech = client.add_source("https://technewsdaily.co/feed", None)?;
    client.set_active(tech.id, false)?;

    assert_eq!(client.remove_all_sources(), 3);
    assert!(client.list_sources().is_empty());
    assert_eq!(client.remove_all_sources(), 0);

    Ok(())
}

#[tokio::test]
async fn test_list_keeps_registration_order() -> Result<()> {
    init_tracing();
    let registry = SourceRegistry::new(&ClientConfig::default());

    let urls = [
        "https://a.example.com/feed",
        "https://b.example.com/feed",
        "https://c.example.com/feed",
    ];
    for url in urls {
        registry.add_source(url, None)?;
    }

    let listed: Vec<String> = registry.list_sources().into_iter().map(|s| s.url).collect();
    assert_eq!(listed, urls);
    assert_eq!(registry.len(), 3);

    Ok(())
}

#[tokio::test]
async fn test_events_are_published() -> Result<()> {
    init_tracing();
    let registry = SourceRegistry::new(&ClientConfig::default());
    let recorder = Arc::new(Recorder::default());
    let observer: Arc<dyn SourceObserver> = recorder.clone();
    registry.subscribe(Arc::downgrade(&observer));

    let source = registry.add_source("https://react.dev/blog", None)?;
    registry.set_active(source.id, false)?;
    registry.set_active(source.id, false)?;
    registry.set_active(source.id, true)?;
    registry.update_source(source.id, SourcePatch::rename("React"))?;
    let _ = registry.remove_source(source.id, false);
    registry.remove_source(source.id, true)?;

    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(events.len(), 5);
    assert!(matches!(events[0], SourceEvent::Added(_)));
    assert_eq!(events[1], SourceEvent::Deactivated(source.id));
    assert_eq!(events[2], SourceEvent::Activated(source.id));
    assert!(matches!(&events[3], SourceEvent::Updated(s) if s.name == "React"));
    assert_eq!(events[4], SourceEvent::Removed(source.id));
    assert!(events.iter().all(|event| event.source_id() == source.id));

    Ok(())
}

#[tokio::test]
async fn test_dropped_observer_is_skipped() -> Result<()> {
    init_tracing();
    let registry = SourceRegistry::new(&ClientConfig::default());

    {
        let observer: Arc<dyn SourceObserver> = Arc::new(Recorder::default());
        registry.subscribe(Arc::downgrade(&observer));
    }

    // No observer is alive anymore; mutations still succeed
    let source = registry.add_source("https://react.dev/blog", None)?;
    registry.remove_source(source.id, true)?;
    assert!(registry.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_allowed_schemes_come_from_config() -> Result<()> {
    init_tracing();
    let config = ClientConfig {
        allowed_schemes: vec!["https".to_string()],
        ..ClientConfig::default()
    };
    let client = FeedClient::new(config);

    assert!(matches!(
        client.add_source("http://react.dev/blog", None),
        Err(FeedError::InvalidUrl { .. })
    ));
    client.add_source("https://react.dev/blog", None)?;

    Ok(())
}

#[tokio::test]
async fn test_items_never_outlive_their_source() -> Result<()> {
    init_tracing();
    let client = FeedClient::default();
    let react = client.add_source("https://react.dev/blog", None)?;
    let tailwind = client.add_source("https://tailwindcss.com/blog", None)?;
    client.ingest(
        react.id,
        &[
            RawItem::new("/blog/hooks", "Hooks"),
            RawItem::new("/blog/shadcn", "Shadcn"),
            RawItem::new("/blog/compiler", "Compiler"),
        ],
    )?;
    client.ingest(tailwind.id, &[RawItem::new("/blog/tips", "Tips")])?;

    let witness = Arc::new(RemovalWitness {
        registry: client.registry(),
        aggregator: client.aggregator(),
        seen: Mutex::new(Vec::new()),
    });
    let observer: Arc<dyn SourceObserver> = witness.clone();
    client.registry().subscribe(Arc::downgrade(&observer));

    client.remove_source(react.id, true)?;

    // Items are purged while the source still resolves
    let seen = witness.seen.lock().unwrap().clone();
    assert_eq!(seen, vec![(true, 0, 0)]);

    let user = UserId::new("alice");
    let query = client.default_query("");
    let entries = client.feed(&user, &query);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].source_name, "tailwindcss.com");

    Ok(())
}
