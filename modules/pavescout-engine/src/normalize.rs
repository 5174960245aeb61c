//! Deduplication / normalization: cluster raw candidate lots by spatial
//! proximity and merge each cluster into one canonical lot.
//!
//! Pure and deterministic for a fixed input order; no I/O.

use chrono::Utc;
use uuid::Uuid;

use pavescout_common::geo::{
    distance_meters, geodesic_area_m2, mean_centroid, polygon_centroid,
    DEFAULT_UNMEASURED_AREA_M2, SQFT_PER_M2,
};
use pavescout_common::types::{CanonicalParkingLot, GeoPoint, RawCandidateLot, SourceRefs};

/// Two candidates whose centroids fall within this distance of a cluster's
/// seed are treated as the same physical lot.
pub const DUPLICATE_DISTANCE_METERS: f64 = 20.0;

/// Cluster raw lots and merge each cluster into a canonical lot.
pub fn normalize(raw_lots: &[RawCandidateLot], owner_id: &str) -> Vec<CanonicalParkingLot> {
    cluster_by_proximity(raw_lots)
        .iter()
        .map(|members| merge_cluster(raw_lots, members, owner_id))
        .collect()
}

/// Seed-based single-link clustering, O(n²).
///
/// Each unassigned lot opens a new cluster and becomes its seed; every
/// remaining unassigned lot within [`DUPLICATE_DISTANCE_METERS`] *of the
/// seed* joins that cluster. Membership is never tested against other
/// members, so every member is guaranteed to be within the threshold of the
/// seed — and a chain of pairwise-close lots that are not all close to one
/// common seed lands in separate clusters. That is the intended contract,
/// not an accident; keep it when touching this function.
fn cluster_by_proximity(lots: &[RawCandidateLot]) -> Vec<Vec<usize>> {
    let mut assigned = vec![false; lots.len()];
    let mut clusters = Vec::new();

    for seed in 0..lots.len() {
        if assigned[seed] {
            continue;
        }
        assigned[seed] = true;
        let mut members = vec![seed];

        for other in seed + 1..lots.len() {
            if assigned[other] {
                continue;
            }
            let d = distance_meters(&lots[seed].centroid, &lots[other].centroid);
            if d <= DUPLICATE_DISTANCE_METERS {
                assigned[other] = true;
                members.push(other);
            }
        }

        clusters.push(members);
    }

    clusters
}

/// Merge one cluster into a canonical lot.
///
/// Geometry: any polygon beats point-only; among polygons, source priority
/// here > osm > inrix, first occurrence winning ties. Centroid comes from
/// the chosen polygon, else the mean of member centroids. Scalar metadata is
/// the first non-null value in input order. `data_sources` is the union of
/// member tags in order of first appearance.
fn merge_cluster(
    lots: &[RawCandidateLot],
    members: &[usize],
    owner_id: &str,
) -> CanonicalParkingLot {
    let mut geometry = None;
    let mut best_priority = 0u8;
    for &i in members {
        if let Some(poly) = &lots[i].geometry {
            let priority = lots[i].source_tag.geometry_priority();
            if priority > best_priority {
                best_priority = priority;
                geometry = Some(poly.clone());
            }
        }
    }

    let member_centroids: Vec<GeoPoint> = members.iter().map(|&i| lots[i].centroid).collect();
    let centroid = geometry
        .as_ref()
        .and_then(polygon_centroid)
        .or_else(|| mean_centroid(&member_centroids))
        .expect("cluster always has at least one member");

    let area_m2 = match &geometry {
        Some(poly) => geodesic_area_m2(poly),
        None => DEFAULT_UNMEASURED_AREA_M2,
    };

    let mut data_sources: Vec<String> = Vec::new();
    let mut source_refs = SourceRefs::default();
    for &i in members {
        let tag = lots[i].source_tag;
        if !data_sources.iter().any(|s| s == tag.as_str()) {
            data_sources.push(tag.as_str().to_string());
        }
        source_refs.set_first(tag, &lots[i].source_id);
    }

    CanonicalParkingLot {
        id: Uuid::new_v4(),
        owner_id: owner_id.to_string(),
        geometry,
        centroid,
        area_m2,
        area_sqft: area_m2 * SQFT_PER_M2,
        source_refs,
        data_sources,
        operator_name: members
            .iter()
            .find_map(|&i| lots[i].operator_name.clone()),
        address: members.iter().find_map(|&i| lots[i].address.clone()),
        surface_type: members.iter().find_map(|&i| lots[i].surface_type.clone()),
        condition: None,
        evaluation_error: None,
        evaluated_at: None,
        created_at: Utc::now(),
    }
}
