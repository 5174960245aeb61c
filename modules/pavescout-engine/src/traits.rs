// Trait abstractions for the discovery pipeline's collaborators.
//
// RawLotSource / BusinessSource — geodata lookups against third-party
//   services. A source returns an empty list when it is unconfigured or has
//   no coverage for the area; it errors only on genuine failure.
// ConditionEvaluator — satellite imagery + CV condition scoring. Failures
//   are always per-item, never pipeline-fatal.
// LeadStore — persistence for canonical lots, businesses, and associations.
//
// These enable deterministic testing with the mocks in `testing`: no
// network, no database. `cargo test` in seconds.

use anyhow::Result;
use async_trait::async_trait;
use geo::Polygon;
use uuid::Uuid;

use pavescout_common::types::{
    Association, BusinessRecord, CanonicalParkingLot, ConditionMetrics, GeoPoint, RawCandidateLot,
    SourceTag,
};

// ---------------------------------------------------------------------------
// Geodata sources
// ---------------------------------------------------------------------------

#[async_trait]
pub trait RawLotSource: Send + Sync {
    /// Which provider this source represents.
    fn tag(&self) -> SourceTag;

    /// Fetch raw candidate lots inside the area ring.
    async fn fetch(&self, area: &[GeoPoint]) -> Result<Vec<RawCandidateLot>>;
}

#[async_trait]
pub trait BusinessSource: Send + Sync {
    /// Fetch up to `max` businesses inside the area ring.
    async fn fetch(&self, area: &[GeoPoint], max: usize) -> Result<Vec<BusinessRecord>>;
}

// ---------------------------------------------------------------------------
// Condition evaluation
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ConditionEvaluator: Send + Sync {
    /// Fetch imagery for one lot and score its pavement condition.
    async fn evaluate(
        &self,
        lot_id: Uuid,
        centroid: &GeoPoint,
        geometry: Option<&Polygon<f64>>,
    ) -> Result<ConditionMetrics>;
}

// ---------------------------------------------------------------------------
// LeadStore — persistence boundary
// ---------------------------------------------------------------------------

#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Persist the canonical lots produced by one job.
    async fn insert_lots(&self, job_id: Uuid, lots: &[CanonicalParkingLot]) -> Result<()>;

    async fn get_lot(&self, lot_id: Uuid) -> Result<Option<CanonicalParkingLot>>;

    /// All lots created by a job, in insertion order.
    async fn lots_for_job(&self, job_id: Uuid) -> Result<Vec<CanonicalParkingLot>>;

    /// Stamp a successful evaluation on a lot.
    async fn record_condition(&self, lot_id: Uuid, metrics: ConditionMetrics) -> Result<()>;

    /// Record a per-item evaluation failure on a lot.
    async fn record_evaluation_error(&self, lot_id: Uuid, message: &str) -> Result<()>;

    async fn insert_businesses(&self, businesses: &[BusinessRecord]) -> Result<()>;

    /// Businesses within `radius_meters` of `center`, ordered by ascending
    /// distance, capped at `limit`. Returns (business, distance_meters).
    async fn businesses_near(
        &self,
        center: &GeoPoint,
        radius_meters: f64,
        limit: usize,
    ) -> Result<Vec<(BusinessRecord, f64)>>;

    async fn insert_associations(&self, associations: &[Association]) -> Result<()>;

    /// Associations for one lot, ranked (primary first).
    async fn associations_for_lot(&self, lot_id: Uuid) -> Result<Vec<Association>>;
}
