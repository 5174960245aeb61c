// Test mocks for the discovery pipeline.
//
// Three mocks matching the collaborator trait boundaries:
// - MockLotSource (RawLotSource) — canned lot batches or forced failure
// - MockBusinessSource (BusinessSource) — canned business lists
// - MockEvaluator (ConditionEvaluator) — fixed scores, optional per-call
//   failures
//
// Plus builders for raw lots, canonical lots, businesses, and area rings.
// Everything is deterministic: no network, no database.

use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use geo::{LineString, Polygon};
use uuid::Uuid;

use pavescout_common::geo::{DEFAULT_UNMEASURED_AREA_M2, SQFT_PER_M2};
use pavescout_common::types::{
    BusinessRecord, CanonicalParkingLot, ConditionMetrics, GeoPoint, RawCandidateLot, SourceRefs,
    SourceTag,
};

use crate::traits::{BusinessSource, ConditionEvaluator, RawLotSource};

// ---------------------------------------------------------------------------
// Test locations
// ---------------------------------------------------------------------------

/// Uptown Minneapolis.
pub const UPTOWN: (f64, f64) = (44.9489, -93.2983);
/// St. Paul, MN.
pub const ST_PAUL: (f64, f64) = (44.9537, -93.0900);

/// Meters per degree of latitude, for offset math in tests.
const METERS_PER_DEG_LAT: f64 = 111_320.0;

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// A square exterior ring of roughly `side_m` meters centered on (lat, lng).
pub fn square_ring(lat: f64, lng: f64, side_m: f64) -> Polygon<f64> {
    let d_lat = side_m / 2.0 / METERS_PER_DEG_LAT;
    let d_lng = side_m / 2.0 / (METERS_PER_DEG_LAT * lat.to_radians().cos());
    Polygon::new(
        LineString::from(vec![
            (lng - d_lng, lat - d_lat),
            (lng + d_lng, lat - d_lat),
            (lng + d_lng, lat + d_lat),
            (lng - d_lng, lat + d_lat),
        ]),
        vec![],
    )
}

/// An area ring (~1km square) around (lat, lng), for job submissions.
pub fn area_around(lat: f64, lng: f64) -> Vec<GeoPoint> {
    vec![
        GeoPoint::new(lat - 0.005, lng - 0.005),
        GeoPoint::new(lat - 0.005, lng + 0.005),
        GeoPoint::new(lat + 0.005, lng + 0.005),
        GeoPoint::new(lat + 0.005, lng - 0.005),
    ]
}

/// A point-only raw candidate lot.
pub fn point_lot(tag: SourceTag, source_id: &str, lat: f64, lng: f64) -> RawCandidateLot {
    RawCandidateLot {
        source_tag: tag,
        source_id: source_id.to_string(),
        geometry: None,
        centroid: GeoPoint::new(lat, lng),
        operator_name: None,
        address: None,
        surface_type: None,
        capacity: None,
        raw_metadata: None,
    }
}

/// A raw candidate lot with a square polygon of `side_m` meters.
pub fn polygon_lot(
    tag: SourceTag,
    source_id: &str,
    lat: f64,
    lng: f64,
    side_m: f64,
) -> RawCandidateLot {
    RawCandidateLot {
        geometry: Some(square_ring(lat, lng, side_m)),
        ..point_lot(tag, source_id, lat, lng)
    }
}

/// A canonical lot with defaults matching an unmeasured merge result.
pub fn canonical_lot(lat: f64, lng: f64) -> CanonicalParkingLot {
    CanonicalParkingLot {
        id: Uuid::new_v4(),
        owner_id: "owner-1".to_string(),
        geometry: None,
        centroid: GeoPoint::new(lat, lng),
        area_m2: DEFAULT_UNMEASURED_AREA_M2,
        area_sqft: DEFAULT_UNMEASURED_AREA_M2 * SQFT_PER_M2,
        source_refs: SourceRefs::default(),
        data_sources: vec!["osm".to_string()],
        operator_name: None,
        address: None,
        surface_type: None,
        condition: None,
        evaluation_error: None,
        evaluated_at: None,
        created_at: Utc::now(),
    }
}

pub fn business(name: &str, category: Option<&str>, lat: f64, lng: f64) -> BusinessRecord {
    BusinessRecord {
        id: Uuid::new_v4(),
        name: name.to_string(),
        category: category.map(str::to_string),
        location: GeoPoint::new(lat, lng),
    }
}

// ---------------------------------------------------------------------------
// MockLotSource
// ---------------------------------------------------------------------------

pub struct MockLotSource {
    tag: SourceTag,
    lots: Vec<RawCandidateLot>,
    fail: bool,
}

impl MockLotSource {
    /// A source returning `count` well-separated point lots near Uptown.
    pub fn with_lots(tag: SourceTag, count: usize) -> Self {
        let (lat, lng) = UPTOWN;
        let lots = (0..count)
            .map(|i| {
                point_lot(
                    tag,
                    &format!("{}-{i}", tag.as_str()),
                    lat + i as f64 * 0.01,
                    lng,
                )
            })
            .collect();
        Self {
            tag,
            lots,
            fail: false,
        }
    }

    /// A source returning exactly these lots.
    pub fn returning(tag: SourceTag, lots: Vec<RawCandidateLot>) -> Self {
        Self {
            tag,
            lots,
            fail: false,
        }
    }

    /// A source that always errors.
    pub fn failing(tag: SourceTag) -> Self {
        Self {
            tag,
            lots: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl RawLotSource for MockLotSource {
    fn tag(&self) -> SourceTag {
        self.tag
    }

    async fn fetch(&self, _area: &[GeoPoint]) -> Result<Vec<RawCandidateLot>> {
        if self.fail {
            bail!("{} service unavailable", self.tag);
        }
        Ok(self.lots.clone())
    }
}

// ---------------------------------------------------------------------------
// MockBusinessSource
// ---------------------------------------------------------------------------

pub struct MockBusinessSource {
    businesses: Vec<BusinessRecord>,
    fail: bool,
}

impl MockBusinessSource {
    pub fn returning(businesses: Vec<BusinessRecord>) -> Self {
        Self {
            businesses,
            fail: false,
        }
    }

    pub fn empty() -> Self {
        Self::returning(Vec::new())
    }

    pub fn failing() -> Self {
        Self {
            businesses: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl BusinessSource for MockBusinessSource {
    async fn fetch(&self, _area: &[GeoPoint], max: usize) -> Result<Vec<BusinessRecord>> {
        if self.fail {
            bail!("business service unavailable");
        }
        Ok(self.businesses.iter().take(max).cloned().collect())
    }
}

// ---------------------------------------------------------------------------
// MockEvaluator
// ---------------------------------------------------------------------------

enum EvalMode {
    AllOk,
    AllFail,
    /// Fail only the n-th call (0-based); everything else succeeds.
    FailNth(usize),
}

pub struct MockEvaluator {
    score: f64,
    mode: EvalMode,
    calls: AtomicUsize,
}

impl MockEvaluator {
    /// Every lot evaluates successfully with this condition score.
    pub fn scoring(score: f64) -> Self {
        Self {
            score,
            mode: EvalMode::AllOk,
            calls: AtomicUsize::new(0),
        }
    }

    /// Every evaluation fails (per-item).
    pub fn failing() -> Self {
        Self {
            score: 0.0,
            mode: EvalMode::AllFail,
            calls: AtomicUsize::new(0),
        }
    }

    /// The n-th evaluation (0-based) fails; the rest score normally.
    pub fn failing_nth(score: f64, n: usize) -> Self {
        Self {
            score,
            mode: EvalMode::FailNth(n),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConditionEvaluator for MockEvaluator {
    async fn evaluate(
        &self,
        _lot_id: Uuid,
        _centroid: &GeoPoint,
        _geometry: Option<&Polygon<f64>>,
    ) -> Result<ConditionMetrics> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            EvalMode::AllFail => bail!("imagery provider timed out"),
            EvalMode::FailNth(n) if call == n => bail!("imagery provider timed out"),
            _ => Ok(ConditionMetrics {
                condition_score: self.score,
                crack_density_pct: (100.0 - self.score).max(0.0) / 2.0,
                pothole_count: if self.score < 50.0 { 4 } else { 0 },
                faded_markings: self.score < 60.0,
            }),
        }
    }
}
