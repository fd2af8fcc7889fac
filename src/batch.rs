#![forbid(unsafe_code)]

//! Batch driver: strictly sequential iteration over the validated URL list,
//! proxy rotation per item, and one dataset append per produced record. A bad
//! URL degrades to an error record; only storage failures abort the batch.

use crate::processor::{ProcessorContext, process_url};
use crate::proxy::ProxySelection;
use crate::storage::Dataset;
use anyhow::Result;
use std::time::Duration;
use tokio::time::sleep;
use tracing::info;

/// Politeness pause between URLs, not a rate-limit guarantee.
const INTER_ITEM_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub total_processed: usize,
    pub total_success: usize,
}

/// Processes every URL in input order, appending each resulting record to the
/// dataset as it is produced.
pub async fn run_batch(
    urls: &[String],
    ctx: &ProcessorContext<'_>,
    dataset: &Dataset,
    proxy: &ProxySelection,
) -> Result<BatchSummary> {
    let mut summary = BatchSummary::default();

    for url in urls {
        let proxy_url = proxy.url_for_next_item();

        let records = process_url(ctx, url, proxy_url.as_deref()).await;
        for record in &records {
            dataset.append(record).await?;
            if !record.is_error() {
                summary.total_success += 1;
            }
        }
        info!("processed {} items from {url}", records.len());

        summary.total_processed += 1;
        if summary.total_processed < urls.len() {
            sleep(INTER_ITEM_DELAY).await;
        }
    }

    info!(
        "processing complete: {} of {} URLs processed, {} items successful",
        summary.total_processed,
        urls.len(),
        summary.total_success
    );
    Ok(summary)
}
