use ::geo::{Point, Polygon};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Geo Types ---

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl From<Point<f64>> for GeoPoint {
    fn from(p: Point<f64>) -> Self {
        Self { lat: p.y(), lng: p.x() }
    }
}

impl From<GeoPoint> for Point<f64> {
    fn from(p: GeoPoint) -> Self {
        Point::new(p.lng, p.lat)
    }
}

// --- Source Types ---

/// Geodata providers that can contribute raw parking lot candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    Inrix,
    Here,
    Osm,
}

impl SourceTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTag::Inrix => "inrix",
            SourceTag::Here => "here",
            SourceTag::Osm => "osm",
        }
    }

    /// Preference rank when multiple sources contribute a polygon to the
    /// same cluster: here > osm > inrix.
    pub fn geometry_priority(&self) -> u8 {
        match self {
            SourceTag::Here => 3,
            SourceTag::Osm => 2,
            SourceTag::Inrix => 1,
        }
    }
}

impl std::fmt::Display for SourceTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A candidate lot as returned by one geodata source, before deduplication.
/// Ephemeral: lives only inside a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCandidateLot {
    pub source_tag: SourceTag,
    pub source_id: String,
    pub geometry: Option<Polygon<f64>>,
    pub centroid: GeoPoint,
    pub operator_name: Option<String>,
    pub address: Option<String>,
    pub surface_type: Option<String>,
    pub capacity: Option<u32>,
    pub raw_metadata: Option<serde_json::Value>,
}

/// Per-source record ids that contributed to a canonical lot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceRefs {
    pub inrix: Option<String>,
    pub here: Option<String>,
    pub osm: Option<String>,
}

impl SourceRefs {
    /// Record the first id seen for a source; later ids for the same source
    /// are ignored.
    pub fn set_first(&mut self, tag: SourceTag, source_id: &str) {
        let slot = match tag {
            SourceTag::Inrix => &mut self.inrix,
            SourceTag::Here => &mut self.here,
            SourceTag::Osm => &mut self.osm,
        };
        if slot.is_none() {
            *slot = Some(source_id.to_string());
        }
    }

    pub fn get(&self, tag: SourceTag) -> Option<&str> {
        match tag {
            SourceTag::Inrix => self.inrix.as_deref(),
            SourceTag::Here => self.here.as_deref(),
            SourceTag::Osm => self.osm.as_deref(),
        }
    }
}

// --- Evaluation Types ---

/// Pavement condition as reported by the imagery evaluator.
/// `condition_score` is PCI-like: 100 = pristine, 0 = failed surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConditionMetrics {
    pub condition_score: f64,
    pub crack_density_pct: f64,
    pub pothole_count: u32,
    pub faded_markings: bool,
}

// --- Lead Types ---

/// The single merged record representing one real-world parking lot after
/// deduplication. Persists as a lead record; the evaluation fields are filled
/// in later by the condition-evaluation stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalParkingLot {
    pub id: Uuid,
    pub owner_id: String,
    pub geometry: Option<Polygon<f64>>,
    pub centroid: GeoPoint,
    pub area_m2: f64,
    pub area_sqft: f64,
    pub source_refs: SourceRefs,
    /// Union of contributing raw lots' source tags, in order of first
    /// appearance.
    pub data_sources: Vec<String>,
    pub operator_name: Option<String>,
    pub address: Option<String>,
    pub surface_type: Option<String>,
    pub condition: Option<ConditionMetrics>,
    pub evaluation_error: Option<String>,
    pub evaluated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A business near a candidate lot, persisted as supplied by the source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessRecord {
    pub id: Uuid,
    pub name: String,
    pub category: Option<String>,
    pub location: GeoPoint,
}

// --- Association Types ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationMethod {
    SpatialProximity,
    OperatorMatch,
}

impl AssociationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssociationMethod::SpatialProximity => "spatial_proximity",
            AssociationMethod::OperatorMatch => "operator_match",
        }
    }
}

impl std::fmt::Display for AssociationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A scored lot-to-business match. At most 3 per lot; exactly one of them
/// carries `is_primary` when a lot has any match at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Association {
    pub id: Uuid,
    pub lot_id: Uuid,
    pub business_id: Uuid,
    pub match_score: f64,
    pub distance_meters: f64,
    pub method: AssociationMethod,
    pub category_weight: f64,
    pub name_similarity: Option<f64>,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
}

// --- Job Types ---

/// Pipeline stages in execution order. `Failed` is reachable from any
/// non-terminal stage; everything else advances strictly left to right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStage {
    Queued,
    ConvertingArea,
    CollectingParkingLots,
    Normalizing,
    FetchingImagery,
    EvaluatingCondition,
    LoadingBusinesses,
    Associating,
    Filtering,
    Completed,
    Failed,
}

impl JobStage {
    /// The happy-path stage sequence, in order.
    pub const ORDER: [JobStage; 10] = [
        JobStage::Queued,
        JobStage::ConvertingArea,
        JobStage::CollectingParkingLots,
        JobStage::Normalizing,
        JobStage::FetchingImagery,
        JobStage::EvaluatingCondition,
        JobStage::LoadingBusinesses,
        JobStage::Associating,
        JobStage::Filtering,
        JobStage::Completed,
    ];

    /// Position of this stage in the fixed order. `Failed` keeps whatever
    /// count the job had accumulated, so it has no position of its own.
    pub fn step_index(&self) -> Option<u32> {
        Self::ORDER.iter().position(|s| s == self).map(|i| i as u32)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStage::Completed | JobStage::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStage::Queued => "QUEUED",
            JobStage::ConvertingArea => "CONVERTING_AREA",
            JobStage::CollectingParkingLots => "COLLECTING_PARKING_LOTS",
            JobStage::Normalizing => "NORMALIZING",
            JobStage::FetchingImagery => "FETCHING_IMAGERY",
            JobStage::EvaluatingCondition => "EVALUATING_CONDITION",
            JobStage::LoadingBusinesses => "LOADING_BUSINESSES",
            JobStage::Associating => "ASSOCIATING",
            JobStage::Filtering => "FILTERING",
            JobStage::Completed => "COMPLETED",
            JobStage::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for JobStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Progress counters updated as work completes. Counters only increase.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct JobProgress {
    pub lots_found: u32,
    pub lots_evaluated: u32,
    pub businesses_loaded: u32,
    pub associations_made: u32,
    pub high_value_leads: u32,
}

/// One end-to-end run of the discovery pipeline for a submitted area.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryJob {
    pub id: Uuid,
    pub owner_id: String,
    pub status: JobStage,
    pub steps_completed: u32,
    pub progress: JobProgress,
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Lead-quality thresholds applied after association. A high-value lead is a
/// lot with at least `min_area_sqft` of surface and an evaluated condition
/// score at or below `max_condition_score` (worse pavement = better lead).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryFilters {
    pub min_area_sqft: f64,
    pub max_condition_score: f64,
}

impl Default for DiscoveryFilters {
    fn default() -> Self {
        Self {
            min_area_sqft: 5_000.0,
            max_condition_score: 70.0,
        }
    }
}

impl DiscoveryFilters {
    pub fn validate(&self) -> Result<(), crate::error::DiscoveryError> {
        if !self.min_area_sqft.is_finite() || self.min_area_sqft < 0.0 {
            return Err(crate::error::DiscoveryError::Validation(format!(
                "min_area_sqft must be a non-negative number, got {}",
                self.min_area_sqft
            )));
        }
        if !self.max_condition_score.is_finite()
            || !(0.0..=100.0).contains(&self.max_condition_score)
        {
            return Err(crate::error::DiscoveryError::Validation(format!(
                "max_condition_score must be within 0..=100, got {}",
                self.max_condition_score
            )));
        }
        Ok(())
    }
}

/// Everything a completed job produced: the job record plus its canonical
/// lots and their associations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryResults {
    pub job: DiscoveryJob,
    pub lots: Vec<CanonicalParkingLot>,
    pub associations: Vec<Association>,
}
