use crate::client::FeedClient;
use crate::types::FetchBatch;
use interfaces::defs::FetchSource;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info, warn};

/// Totals reported by [`run_ingest_loop`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub batches: usize,
    pub failed: usize,
    pub created: usize,
    pub updated: usize,
}

/// Poll `source` and forward its batches into `sender`.
///
/// Stops when a pull yields nothing or the receiving side is gone. Returns
/// the number of batches forwarded.
pub async fn forward_batches<F>(
    mut source: F,
    sender: mpsc::Sender<FetchBatch>,
    poll_every: Duration,
) -> anyhow::Result<usize>
where
    F: FetchSource + Send,
{
    let mut ticker = interval(poll_every);
    let mut forwarded = 0;

    loop {
        ticker.tick().await;

        let batches = source.pull()?;
        if batches.is_empty() {
            debug!("{} has nothing more to deliver", source.name());
            break;
        }

        for batch in batches {
            if sender.send(batch).await.is_err() {
                warn!("Ingest loop closed, stopping {}", source.name());
                return Ok(forwarded);
            }
            forwarded += 1;
        }
    }

    info!("{} forwarded {} batches", source.name(), forwarded);
    Ok(forwarded)
}

/// Apply every received batch to `client` until all senders are dropped.
///
/// A failing batch is logged and skipped; it leaves no partial state.
pub async fn run_ingest_loop(
    client: Arc<FeedClient>,
    mut receiver: mpsc::Receiver<FetchBatch>,
) -> IngestSummary {
    let mut summary = IngestSummary::default();

    while let Some(batch) = receiver.recv().await {
        summary.batches += 1;
        match client.ingest_batch(&batch) {
            Ok(result) => {
                summary.created += result.created;
                summary.updated += result.updated;
            }
            Err(e) => {
                error!("Failed to ingest batch for source {}: {}", batch.source_id, e);
                summary.failed += 1;
            }
        }
    }

    info!(
        "Ingest loop finished: {} batches, {} failed, {} created, {} updated",
        summary.batches, summary.failed, summary.created, summary.updated
    );
    summary
}
