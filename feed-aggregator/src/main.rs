use clap::Parser;
use feed_aggregator::{
    forward_batches, run_ingest_loop, ClientConfig, FeedClient, JsonFileStore, Query, RawItem,
    SortOrder, StaticFetchSource, UserId,
};
use interfaces::defs::SessionProvider;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "feed-aggregator", about = "Personal content feed")]
struct Args {
    /// JSON file holding sources, items and bookmarks
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Case-insensitive term matched against title and snippet
    #[arg(long, default_value = "")]
    search: String,

    /// newest or oldest
    #[arg(long)]
    sort: Option<SortOrder>,

    #[arg(long, default_value = "demo-user")]
    user: String,

    /// Bookmark the top result for the user before printing
    #[arg(long)]
    bookmark_top: bool,
}

struct FixedSession(UserId);

impl SessionProvider for FixedSession {
    fn current_user(&self) -> Option<UserId> {
        Some(self.0.clone())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let mut config = ClientConfig::from_env();
    if args.snapshot.is_some() {
        config.snapshot_path = args.snapshot.clone();
    }
    let sort = args.sort.unwrap_or(config.default_sort);

    info!("Starting feed aggregator");

    let store = config.snapshot_path.clone().map(JsonFileStore::new);
    let client = match &store {
        Some(store) => {
            info!("Loading state from {}", store.path().display());
            FeedClient::load(config, store)?
        }
        None => FeedClient::new(config),
    };
    let client = Arc::new(client);

    if client.registry().is_empty() {
        seed_sample_feed(&client).await?;
    }

    let session = FixedSession(UserId::new(args.user.as_str()));
    let query = Query::new(args.search.as_str(), sort);

    if let Some(user) = session.current_user() {
        if args.bookmark_top {
            bookmark_top_result(&client, &user, &query);
        }

        for entry in client.feed(&user, &query) {
            let published = entry
                .item
                .published_at
                .map(|at| at.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "undated".to_string());
            let marker = if entry.bookmarked { "*" } else { " " };
            println!(
                "{} [{}] {} ({})",
                marker, published, entry.item.title, entry.source_name
            );
        }

        info!("{} saved items for {}", client.saved_items(&user).len(), user);
    } else {
        warn!("No signed-in user, skipping feed output");
    }

    let stats = client.stats();
    info!("Feed statistics:");
    info!("  total_sources: {}", stats.total_sources);
    info!("  active_sources: {}", stats.active_sources);
    info!("  inactive_sources: {}", stats.inactive_sources);
    info!("  never_fetched: {}", stats.never_fetched);
    info!("  total_items: {}", stats.total_items);
    info!("  visible_items: {}", stats.visible_items);

    if let Some(store) = &store {
        match client.save(store) {
            Ok(()) => info!("Saved state to {}", store.path().display()),
            Err(e) => error!("Failed to save state: {}", e),
        }
    }

    info!("Feed aggregator finished");
    Ok(())
}

/// Bookmark the first result of `query`. Returns `true` if a bookmark was added.
fn bookmark_top_result(client: &FeedClient, user: &UserId, query: &Query) -> bool {
    let Some(first) = client.query(query).into_iter().next() else {
        return false;
    };

    let added = client.bookmark(user, first.id);
    if added {
        info!("Bookmarked \"{}\" for {}", first.title, user);
    }
    added
}

async fn seed_sample_feed(client: &Arc<FeedClient>) -> Result<(), Box<dyn std::error::Error>> {
    info!("No sources registered, seeding sample feed");

    let react = client.add_source("https://react.dev/blog", Some("React Blog Official"))?;
    let tailwind = client.add_source("https://tailwindcss.com/blog", Some("Tailwind CSS News"))?;
    let tech = client.add_source("https://technewsdaily.co/feed", Some("Tech News Daily"))?;
    client.set_active(tech.id, false)?;

    let fetcher = StaticFetchSource::new("sample")
        .with_batch(react.id, react_items())
        .with_batch(tailwind.id, tailwind_items())
        .with_batch(tech.id, tech_items());

    let (sender, receiver) = mpsc::channel(16);
    let ingest = tokio::spawn(run_ingest_loop(Arc::clone(client), receiver));

    if let Err(e) = forward_batches(fetcher, sender, Duration::from_millis(10)).await {
        error!("Sample fetch failed: {:#}", e);
    }

    let summary = ingest.await?;
    info!(
        "Seeded {} items from {} batches",
        summary.created, summary.batches
    );
    Ok(())
}

fn react_items() -> Vec<RawItem> {
    vec![
        RawItem::new("/blog/understanding-react-hooks", "Understanding React Hooks")
            .with_snippet("A deep dive into useState, useEffect and writing custom hooks.")
            .with_published_at("2024-05-15"),
        RawItem::new("/blog/getting-started-shadcn-ui", "Getting Started with Shadcn/UI")
            .with_snippet("Building accessible components on top of Radix primitives.")
            .with_published_at("2024-05-12"),
    ]
}

fn tailwind_items() -> Vec<RawItem> {
    vec![RawItem::new("/blog/best-practices", "Tailwind CSS Best Practices")
        .with_snippet("Keeping utility-first stylesheets maintainable as projects grow.")
        .with_published_at("2024-05-14")]
}

fn tech_items() -> Vec<RawItem> {
    vec![RawItem::new("/feed/future-of-ai", "The Future of AI in Development")
        .with_snippet("How assistants are changing the way software gets written.")
        .with_published_at("2024-05-16")]
}
