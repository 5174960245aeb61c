//! Concurrent raw-lot collection: fan out to every configured source, fan
//! back in, isolating per-source failures.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};

use pavescout_common::error::DiscoveryError;
use pavescout_common::types::{GeoPoint, RawCandidateLot};

use crate::traits::RawLotSource;

/// Fetch raw candidate lots from all configured sources concurrently.
///
/// A failing source contributes zero results and does not cancel its
/// siblings. Only total failure — every configured source erroring — is
/// fatal and surfaces as `AllSourcesFailed`.
pub async fn collect_raw_lots(
    sources: &[Arc<dyn RawLotSource>],
    area: &[GeoPoint],
) -> Result<Vec<RawCandidateLot>, DiscoveryError> {
    if sources.is_empty() {
        return Err(DiscoveryError::AllSourcesFailed(
            "no parking lot sources configured".to_string(),
        ));
    }

    let results = join_all(sources.iter().map(|source| {
        let tag = source.tag();
        async move { (tag, source.fetch(area).await) }
    }))
    .await;

    let mut lots = Vec::new();
    let mut successes = 0usize;
    let mut failures: Vec<DiscoveryError> = Vec::new();

    for (tag, result) in results {
        match result {
            Ok(batch) => {
                info!(source = %tag, lots = batch.len(), "Source returned candidate lots");
                successes += 1;
                lots.extend(batch);
            }
            Err(e) => {
                let failure = DiscoveryError::SourceUnavailable {
                    source_name: tag.as_str().to_string(),
                    message: e.to_string(),
                };
                warn!(source = %tag, error = %failure, "Parking lot source failed");
                failures.push(failure);
            }
        }
    }

    if successes == 0 {
        let detail = failures
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(DiscoveryError::AllSourcesFailed(detail));
    }

    Ok(lots)
}
