//! In-memory `LeadStore` implementation.
//!
//! Businesses are bucketed into geohash cells so the nearest-neighbor query
//! scans one cell plus its eight neighbors instead of the whole table. At
//! precision 7 a cell is ~150m wide, which always covers the 80m association
//! radius from any point in the center cell.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use pavescout_common::geo::distance_meters;
use pavescout_common::types::{
    Association, BusinessRecord, CanonicalParkingLot, ConditionMetrics, GeoPoint,
};

use crate::traits::LeadStore;

const BUSINESS_CELL_PRECISION: usize = 7;

#[derive(Default)]
struct Inner {
    lots: HashMap<Uuid, CanonicalParkingLot>,
    job_lots: HashMap<Uuid, Vec<Uuid>>,
    businesses: HashMap<Uuid, BusinessRecord>,
    business_cells: HashMap<String, Vec<Uuid>>,
    associations: HashMap<Uuid, Vec<Association>>,
}

#[derive(Default)]
pub struct InMemoryLeadStore {
    inner: RwLock<Inner>,
}

impl InMemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn cell_for(point: &GeoPoint) -> Result<String> {
    geohash::encode(
        geohash::Coord {
            x: point.lng,
            y: point.lat,
        },
        BUSINESS_CELL_PRECISION,
    )
    .map_err(|e| anyhow!("geohash encode failed for {point:?}: {e}"))
}

#[async_trait]
impl LeadStore for InMemoryLeadStore {
    async fn insert_lots(&self, job_id: Uuid, lots: &[CanonicalParkingLot]) -> Result<()> {
        let mut inner = self.inner.write().await;
        for lot in lots {
            inner.lots.insert(lot.id, lot.clone());
        }
        inner
            .job_lots
            .entry(job_id)
            .or_default()
            .extend(lots.iter().map(|l| l.id));
        Ok(())
    }

    async fn get_lot(&self, lot_id: Uuid) -> Result<Option<CanonicalParkingLot>> {
        Ok(self.inner.read().await.lots.get(&lot_id).cloned())
    }

    async fn lots_for_job(&self, job_id: Uuid) -> Result<Vec<CanonicalParkingLot>> {
        let inner = self.inner.read().await;
        let ids = inner.job_lots.get(&job_id).cloned().unwrap_or_default();
        Ok(ids
            .iter()
            .filter_map(|id| inner.lots.get(id).cloned())
            .collect())
    }

    async fn record_condition(&self, lot_id: Uuid, metrics: ConditionMetrics) -> Result<()> {
        let mut inner = self.inner.write().await;
        let lot = inner
            .lots
            .get_mut(&lot_id)
            .ok_or_else(|| anyhow!("lot {lot_id} not found"))?;
        lot.condition = Some(metrics);
        lot.evaluation_error = None;
        lot.evaluated_at = Some(Utc::now());
        Ok(())
    }

    async fn record_evaluation_error(&self, lot_id: Uuid, message: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let lot = inner
            .lots
            .get_mut(&lot_id)
            .ok_or_else(|| anyhow!("lot {lot_id} not found"))?;
        lot.evaluation_error = Some(message.to_string());
        lot.evaluated_at = Some(Utc::now());
        Ok(())
    }

    async fn insert_businesses(&self, businesses: &[BusinessRecord]) -> Result<()> {
        let mut inner = self.inner.write().await;
        for business in businesses {
            let cell = cell_for(&business.location)?;
            let bucket = inner.business_cells.entry(cell).or_default();
            if !bucket.contains(&business.id) {
                bucket.push(business.id);
            }
            inner.businesses.insert(business.id, business.clone());
        }
        Ok(())
    }

    async fn businesses_near(
        &self,
        center: &GeoPoint,
        radius_meters: f64,
        limit: usize,
    ) -> Result<Vec<(BusinessRecord, f64)>> {
        let cell = cell_for(center)?;
        let neighbors = geohash::neighbors(&cell)
            .map_err(|e| anyhow!("geohash neighbors failed for {cell}: {e}"))?;
        let cells = [
            cell.clone(),
            neighbors.n,
            neighbors.ne,
            neighbors.e,
            neighbors.se,
            neighbors.s,
            neighbors.sw,
            neighbors.w,
            neighbors.nw,
        ];

        let inner = self.inner.read().await;
        let mut hits: Vec<(BusinessRecord, f64)> = Vec::new();
        for cell in &cells {
            let Some(ids) = inner.business_cells.get(cell) else {
                continue;
            };
            for id in ids {
                let Some(business) = inner.businesses.get(id) else {
                    continue;
                };
                let d = distance_meters(center, &business.location);
                if d <= radius_meters {
                    hits.push((business.clone(), d));
                }
            }
        }

        hits.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn insert_associations(&self, associations: &[Association]) -> Result<()> {
        let mut inner = self.inner.write().await;
        for a in associations {
            inner.associations.entry(a.lot_id).or_default().push(a.clone());
        }
        Ok(())
    }

    async fn associations_for_lot(&self, lot_id: Uuid) -> Result<Vec<Association>> {
        Ok(self
            .inner
            .read()
            .await
            .associations
            .get(&lot_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{business, canonical_lot, UPTOWN};

    // Offsets near Uptown: ~1.1cm per 1e-7 degree of latitude.
    const LAT_70M: f64 = 0.00063;
    const LNG_70M: f64 = 0.00089; // at ~45°N

    #[tokio::test]
    async fn businesses_near_orders_by_distance() {
        let store = InMemoryLeadStore::new();
        let (lat, lng) = UPTOWN;
        store
            .insert_businesses(&[
                business("Far Cafe", Some("cafe"), lat + LAT_70M, lng),
                business("Near Cafe", Some("cafe"), lat + LAT_70M / 7.0, lng),
                business("Mid Cafe", Some("cafe"), lat + LAT_70M / 2.0, lng),
            ])
            .await
            .unwrap();

        let center = GeoPoint::new(lat, lng);
        let hits = store.businesses_near(&center, 80.0, 20).await.unwrap();
        let names: Vec<_> = hits.iter().map(|(b, _)| b.name.as_str()).collect();
        assert_eq!(names, vec!["Near Cafe", "Mid Cafe", "Far Cafe"]);
        for (_, d) in &hits {
            assert!(*d <= 80.0);
        }
    }

    #[tokio::test]
    async fn businesses_outside_radius_are_excluded() {
        let store = InMemoryLeadStore::new();
        let (lat, lng) = UPTOWN;
        store
            .insert_businesses(&[
                business("Inside", Some("cafe"), lat + LAT_70M, lng),
                // ~90m north — strong name match would not save it either
                business("Outside", Some("cafe"), lat + LAT_70M * 9.0 / 7.0, lng),
            ])
            .await
            .unwrap();

        let center = GeoPoint::new(lat, lng);
        let hits = store.businesses_near(&center, 80.0, 20).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.name, "Inside");
    }

    #[tokio::test]
    async fn limit_caps_the_result_set() {
        let store = InMemoryLeadStore::new();
        let (lat, lng) = UPTOWN;
        let businesses: Vec<_> = (0..30)
            .map(|i| {
                business(
                    &format!("Shop {i}"),
                    Some("retail"),
                    lat + i as f64 * 1e-5,
                    lng,
                )
            })
            .collect();
        store.insert_businesses(&businesses).await.unwrap();

        let center = GeoPoint::new(lat, lng);
        let hits = store.businesses_near(&center, 5_000.0, 20).await.unwrap();
        assert_eq!(hits.len(), 20);
    }

    #[tokio::test]
    async fn geohash_index_matches_linear_scan_near_cell_borders() {
        // Points scattered around the query radius in all directions, so
        // some land in neighboring geohash cells.
        let store = InMemoryLeadStore::new();
        let (lat, lng) = UPTOWN;
        let mut all = Vec::new();
        for (i, (dlat, dlng)) in [
            (LAT_70M, 0.0),
            (-LAT_70M, 0.0),
            (0.0, LNG_70M),
            (0.0, -LNG_70M),
            (LAT_70M, LNG_70M),
            (-LAT_70M, -LNG_70M),
            (LAT_70M * 2.0, 0.0), // outside
            (0.0, LNG_70M * 2.0), // outside
        ]
        .iter()
        .enumerate()
        {
            all.push(business(
                &format!("B{i}"),
                Some("retail"),
                lat + dlat,
                lng + dlng,
            ));
        }
        store.insert_businesses(&all).await.unwrap();

        let center = GeoPoint::new(lat, lng);
        let hits = store.businesses_near(&center, 80.0, 50).await.unwrap();

        let mut expected: Vec<&BusinessRecord> = all
            .iter()
            .filter(|b| distance_meters(&center, &b.location) <= 80.0)
            .collect();
        expected.sort_by(|a, b| {
            distance_meters(&center, &a.location)
                .partial_cmp(&distance_meters(&center, &b.location))
                .unwrap()
        });

        assert_eq!(hits.len(), expected.len());
        for ((hit, _), want) in hits.iter().zip(expected.iter()) {
            assert_eq!(hit.id, want.id);
        }
    }

    #[tokio::test]
    async fn reinserting_a_business_does_not_duplicate_it() {
        let store = InMemoryLeadStore::new();
        let (lat, lng) = UPTOWN;
        let b = business("Quang Restaurant", Some("restaurant"), lat, lng);
        store.insert_businesses(&[b.clone()]).await.unwrap();
        store.insert_businesses(&[b]).await.unwrap();

        let center = GeoPoint::new(lat, lng);
        let hits = store.businesses_near(&center, 80.0, 20).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn evaluation_outcomes_are_recorded_on_the_lot() {
        let store = InMemoryLeadStore::new();
        let (lat, lng) = UPTOWN;
        let job_id = Uuid::new_v4();
        let good = canonical_lot(lat, lng);
        let bad = canonical_lot(lat + 0.01, lng);
        store
            .insert_lots(job_id, &[good.clone(), bad.clone()])
            .await
            .unwrap();

        let metrics = ConditionMetrics {
            condition_score: 42.0,
            crack_density_pct: 18.0,
            pothole_count: 7,
            faded_markings: true,
        };
        store.record_condition(good.id, metrics).await.unwrap();
        store
            .record_evaluation_error(bad.id, "imagery timeout")
            .await
            .unwrap();

        let good = store.get_lot(good.id).await.unwrap().unwrap();
        assert_eq!(good.condition.unwrap().condition_score, 42.0);
        assert!(good.evaluation_error.is_none());
        assert!(good.evaluated_at.is_some());

        let bad = store.get_lot(bad.id).await.unwrap().unwrap();
        assert!(bad.condition.is_none());
        assert_eq!(bad.evaluation_error.as_deref(), Some("imagery timeout"));
    }

    #[tokio::test]
    async fn lots_for_job_preserves_insertion_order() {
        let store = InMemoryLeadStore::new();
        let (lat, lng) = UPTOWN;
        let job_id = Uuid::new_v4();
        let lots: Vec<_> = (0..4)
            .map(|i| canonical_lot(lat + i as f64 * 0.01, lng))
            .collect();
        store.insert_lots(job_id, &lots).await.unwrap();

        let stored = store.lots_for_job(job_id).await.unwrap();
        let ids: Vec<_> = stored.iter().map(|l| l.id).collect();
        let expected: Vec<_> = lots.iter().map(|l| l.id).collect();
        assert_eq!(ids, expected);
    }
}
