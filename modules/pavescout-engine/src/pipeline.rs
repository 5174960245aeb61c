//! The discovery pipeline orchestrator.
//!
//! `DiscoveryService` owns the job table, the lead store, and the
//! collaborator set. `start` validates synchronously, records a `Queued` job,
//! and spawns one task per job; `run` walks the fixed stage sequence,
//! updating the job record as work completes. Status reads are snapshots and
//! never block on a running pipeline.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use pavescout_common::error::DiscoveryError;
use pavescout_common::geo::{area_polygon, geodesic_area_m2, validate_ring};
use pavescout_common::types::{
    CanonicalParkingLot, DiscoveryFilters, DiscoveryJob, DiscoveryResults, GeoPoint, JobStage,
};

use crate::associate::associate;
use crate::collect::collect_raw_lots;
use crate::jobs::JobTable;
use crate::normalize::normalize;
use crate::traits::{BusinessSource, ConditionEvaluator, LeadStore, RawLotSource};

/// Cap on businesses loaded per area.
pub const MAX_BUSINESSES_PER_AREA: usize = 500;

/// Delay between per-lot imagery/evaluation calls. The loop is sequential on
/// purpose: external imagery providers rate-limit aggressively.
const DEFAULT_EVALUATION_PACING: Duration = Duration::from_millis(250);

/// Cheap to clone: every field is a shared handle.
#[derive(Clone)]
pub struct DiscoveryService {
    jobs: JobTable,
    store: Arc<dyn LeadStore>,
    lot_sources: Vec<Arc<dyn RawLotSource>>,
    business_source: Arc<dyn BusinessSource>,
    evaluator: Arc<dyn ConditionEvaluator>,
    evaluation_pacing: Duration,
}

impl DiscoveryService {
    pub fn new(
        store: Arc<dyn LeadStore>,
        lot_sources: Vec<Arc<dyn RawLotSource>>,
        business_source: Arc<dyn BusinessSource>,
        evaluator: Arc<dyn ConditionEvaluator>,
    ) -> Self {
        Self {
            jobs: JobTable::new(),
            store,
            lot_sources,
            business_source,
            evaluator,
            evaluation_pacing: DEFAULT_EVALUATION_PACING,
        }
    }

    /// Override the per-lot evaluation delay (tests use zero).
    pub fn with_evaluation_pacing(mut self, pacing: Duration) -> Self {
        self.evaluation_pacing = pacing;
        self
    }

    /// Validate the submission, record a `Queued` job, and spawn the
    /// pipeline task. The job is queryable before this function returns, so
    /// an immediate status poll never sees "not found".
    pub async fn start(
        &self,
        owner_id: &str,
        area: Vec<GeoPoint>,
        filters: DiscoveryFilters,
    ) -> Result<Uuid, DiscoveryError> {
        validate_ring(&area)?;
        filters.validate()?;

        let job_id = Uuid::new_v4();
        self.jobs.initialize(job_id, owner_id).await;
        info!(job_id = %job_id, owner = owner_id, "Discovery job queued");

        let service = self.clone();
        let owner = owner_id.to_string();
        tokio::spawn(async move {
            if let Err(e) = service.run(job_id, &owner, &area, &filters).await {
                error!(job_id = %job_id, error = %e, "Discovery job failed");
                service.jobs.fail(job_id, e.to_string()).await;
            }
        });

        Ok(job_id)
    }

    /// Read-only job snapshot.
    pub async fn get_status(&self, job_id: Uuid) -> Result<DiscoveryJob, DiscoveryError> {
        self.jobs
            .snapshot(job_id)
            .await
            .ok_or(DiscoveryError::JobNotFound(job_id))
    }

    /// Results of a completed job: its lots and their associations.
    pub async fn get_results(&self, job_id: Uuid) -> Result<DiscoveryResults, DiscoveryError> {
        let job = self.get_status(job_id).await?;
        if job.status != JobStage::Completed {
            return Err(DiscoveryError::NotReady {
                status: job.status.to_string(),
            });
        }

        let lots = self.store.lots_for_job(job_id).await?;
        let mut associations = Vec::new();
        for lot in &lots {
            associations.extend(self.store.associations_for_lot(lot.id).await?);
        }

        Ok(DiscoveryResults {
            job,
            lots,
            associations,
        })
    }

    /// Housekeeping: drop job records completed longer ago than `retention`.
    pub async fn purge_expired(&self, retention: chrono::Duration) -> usize {
        self.jobs.purge_completed_before(Utc::now() - retention).await
    }

    /// Execute the stage sequence for one job. Any error escaping this
    /// function marks the job `Failed`; results persisted before the failure
    /// stay durable.
    async fn run(
        &self,
        job_id: Uuid,
        owner_id: &str,
        area: &[GeoPoint],
        filters: &DiscoveryFilters,
    ) -> Result<(), DiscoveryError> {
        // Area resolution
        self.jobs.advance(job_id, JobStage::ConvertingArea).await;
        let area_poly = area_polygon(area)?;
        info!(
            job_id = %job_id,
            area_km2 = geodesic_area_m2(&area_poly) / 1_000_000.0,
            "Search area resolved"
        );

        // Raw lot collection: concurrent fan-out, partial failure tolerated
        self.jobs
            .advance(job_id, JobStage::CollectingParkingLots)
            .await;
        let raw = collect_raw_lots(&self.lot_sources, area).await?;
        info!(job_id = %job_id, raw_lots = raw.len(), "Raw lot collection complete");

        // Normalization
        self.jobs.advance(job_id, JobStage::Normalizing).await;
        let lots = normalize(&raw, owner_id);
        self.store.insert_lots(job_id, &lots).await?;
        self.jobs
            .update_progress(job_id, |p| p.lots_found = lots.len() as u32)
            .await;
        info!(job_id = %job_id, canonical_lots = lots.len(), "Normalization complete");

        // Imagery + evaluation. One collaborator call covers both stages;
        // the loop is sequential with pacing, and each failure stays on its
        // own lot.
        self.jobs.advance(job_id, JobStage::FetchingImagery).await;
        self.jobs
            .advance(job_id, JobStage::EvaluatingCondition)
            .await;
        for lot in &lots {
            match self
                .evaluator
                .evaluate(lot.id, &lot.centroid, lot.geometry.as_ref())
                .await
            {
                Ok(metrics) => self.store.record_condition(lot.id, metrics).await?,
                Err(e) => {
                    let failure = DiscoveryError::Evaluation(e.to_string());
                    warn!(job_id = %job_id, lot_id = %lot.id, error = %failure, "Lot evaluation failed");
                    self.store
                        .record_evaluation_error(lot.id, &failure.to_string())
                        .await?;
                }
            }
            self.jobs
                .update_progress(job_id, |p| p.lots_evaluated += 1)
                .await;
            tokio::time::sleep(self.evaluation_pacing).await;
        }

        // Business loading
        self.jobs.advance(job_id, JobStage::LoadingBusinesses).await;
        let businesses = self
            .business_source
            .fetch(area, MAX_BUSINESSES_PER_AREA)
            .await
            .map_err(|e| DiscoveryError::AllSourcesFailed(format!("business lookup: {e}")))?;
        self.store.insert_businesses(&businesses).await?;
        self.jobs
            .update_progress(job_id, |p| p.businesses_loaded = businesses.len() as u32)
            .await;
        info!(job_id = %job_id, businesses = businesses.len(), "Businesses loaded");

        // Association
        self.jobs.advance(job_id, JobStage::Associating).await;
        let lot_ids: Vec<Uuid> = lots.iter().map(|l| l.id).collect();
        let stats = associate(self.store.as_ref(), &lot_ids).await?;
        self.jobs
            .update_progress(job_id, |p| p.associations_made = stats.associations_created)
            .await;
        info!(job_id = %job_id, "{stats}");

        // Lead filtering
        self.jobs.advance(job_id, JobStage::Filtering).await;
        let evaluated = self.store.lots_for_job(job_id).await?;
        let high_value = evaluated
            .iter()
            .filter(|lot| is_high_value(lot, filters))
            .count();
        self.jobs
            .update_progress(job_id, |p| p.high_value_leads = high_value as u32)
            .await;

        self.jobs.complete(job_id).await;
        info!(
            job_id = %job_id,
            lots = lots.len(),
            high_value_leads = high_value,
            "Discovery job complete"
        );
        Ok(())
    }
}

/// A lead is high-value when the lot is big enough to be worth a sales
/// visit and its pavement scored at or below the condition threshold. Lots
/// without a successful evaluation never qualify.
pub fn is_high_value(lot: &CanonicalParkingLot, filters: &DiscoveryFilters) -> bool {
    if lot.area_sqft < filters.min_area_sqft {
        return false;
    }
    match &lot.condition {
        Some(c) => c.condition_score <= filters.max_condition_score,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{canonical_lot, UPTOWN};
    use pavescout_common::types::ConditionMetrics;

    fn lot_with(area_sqft: f64, score: Option<f64>) -> CanonicalParkingLot {
        let (lat, lng) = UPTOWN;
        let mut lot = canonical_lot(lat, lng);
        lot.area_sqft = area_sqft;
        lot.condition = score.map(|condition_score| ConditionMetrics {
            condition_score,
            crack_density_pct: 20.0,
            pothole_count: 2,
            faded_markings: false,
        });
        lot
    }

    #[test]
    fn big_and_cracked_is_high_value() {
        let filters = DiscoveryFilters::default();
        assert!(is_high_value(&lot_with(20_000.0, Some(45.0)), &filters));
    }

    #[test]
    fn small_lot_is_not_high_value() {
        let filters = DiscoveryFilters::default();
        assert!(!is_high_value(&lot_with(1_000.0, Some(45.0)), &filters));
    }

    #[test]
    fn pristine_lot_is_not_high_value() {
        let filters = DiscoveryFilters::default();
        assert!(!is_high_value(&lot_with(20_000.0, Some(95.0)), &filters));
    }

    #[test]
    fn unevaluated_lot_is_not_high_value() {
        let filters = DiscoveryFilters::default();
        assert!(!is_high_value(&lot_with(20_000.0, None), &filters));
    }

    #[test]
    fn threshold_is_inclusive() {
        let filters = DiscoveryFilters::default();
        assert!(is_high_value(&lot_with(5_000.0, Some(70.0)), &filters));
    }
}
