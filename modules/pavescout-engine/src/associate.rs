//! Spatial association: find nearby businesses for each canonical lot and
//! score lot-to-business matches.
//!
//! A candidate's score is the sum of four independently weighted,
//! independently clamped components: distance, category relevance, operator
//! name similarity, and a reserved adjacency slot. The scale tops out at 100.

use std::cmp::Ordering;

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use pavescout_common::types::{Association, AssociationMethod, BusinessRecord, CanonicalParkingLot};

use crate::lexicon::{category_tier, CategoryTier};
use crate::traits::LeadStore;

/// Candidate search radius around a lot centroid.
pub const MAX_DISTANCE_METERS: f64 = 80.0;

/// Nearest-neighbor candidates considered per lot.
pub const MAX_CANDIDATES: usize = 20;

/// Ranked associations persisted per lot.
pub const MAX_ASSOCIATIONS_PER_LOT: usize = 3;

const DISTANCE_WEIGHT: f64 = 40.0;
const CATEGORY_WEIGHT: f64 = 30.0;
const NAME_WEIGHT: f64 = 20.0;
/// Reserved for a building-polygon adjacency signal. No such signal is
/// available, so the component always contributes 0.
#[allow(dead_code)]
const ADJACENCY_WEIGHT: f64 = 10.0;

/// Name similarity above this marks the business as the lot operator.
const OPERATOR_MATCH_THRESHOLD: f64 = 0.8;
/// Name similarity above this (but below the operator threshold) earns half
/// the name weight.
const PARTIAL_NAME_THRESHOLD: f64 = 0.5;

/// One scored candidate, before persistence.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub business: BusinessRecord,
    pub distance_meters: f64,
    pub score: f64,
    pub category_weight: f64,
    pub name_similarity: Option<f64>,
    pub method: AssociationMethod,
}

/// Aggregate counts from one association run.
#[derive(Debug, Default)]
pub struct AssociationStats {
    pub lots_processed: u32,
    pub associations_created: u32,
    pub lots_matched: u32,
    pub lots_unmatched: u32,
    pub mean_match_score: f64,
}

impl std::fmt::Display for AssociationStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Association Run Complete ===")?;
        writeln!(f, "Lots processed:       {}", self.lots_processed)?;
        writeln!(f, "Associations created: {}", self.associations_created)?;
        writeln!(f, "Lots with a match:    {}", self.lots_matched)?;
        writeln!(f, "Lots with none:       {}", self.lots_unmatched)?;
        writeln!(f, "Mean match score:     {:.1}", self.mean_match_score)?;
        Ok(())
    }
}

/// Associate each lot with its best nearby businesses and persist the
/// ranked matches.
pub async fn associate(store: &dyn LeadStore, lot_ids: &[Uuid]) -> Result<AssociationStats> {
    let mut stats = AssociationStats::default();
    let mut score_sum = 0.0;

    for &lot_id in lot_ids {
        let Some(lot) = store.get_lot(lot_id).await? else {
            warn!(lot_id = %lot_id, "Lot disappeared before association, skipping");
            continue;
        };
        stats.lots_processed += 1;

        let candidates = store
            .businesses_near(&lot.centroid, MAX_DISTANCE_METERS, MAX_CANDIDATES)
            .await?;
        let ranked = rank_candidates(&lot, candidates);

        if ranked.is_empty() {
            stats.lots_unmatched += 1;
            continue;
        }
        stats.lots_matched += 1;

        let associations = build_associations(lot_id, &ranked);
        for a in &associations {
            score_sum += a.match_score;
        }
        stats.associations_created += associations.len() as u32;
        store.insert_associations(&associations).await?;

        debug!(
            lot_id = %lot_id,
            matches = associations.len(),
            top_score = associations[0].match_score,
            "Lot associated"
        );
    }

    if stats.associations_created > 0 {
        stats.mean_match_score = score_sum / stats.associations_created as f64;
    }

    Ok(stats)
}

/// Score and rank candidates for one lot. Candidates arrive ordered by
/// ascending distance; zero-score candidates are dropped, the rest are
/// stable-sorted by descending score so ties keep the distance order.
pub fn rank_candidates(
    lot: &CanonicalParkingLot,
    candidates: Vec<(BusinessRecord, f64)>,
) -> Vec<ScoredCandidate> {
    let mut scored: Vec<ScoredCandidate> = candidates
        .into_iter()
        .filter_map(|(business, distance)| score_candidate(lot, business, distance))
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored.truncate(MAX_ASSOCIATIONS_PER_LOT);
    scored
}

/// Score one candidate. `None` when the total is zero or below.
fn score_candidate(
    lot: &CanonicalParkingLot,
    business: BusinessRecord,
    distance_meters: f64,
) -> Option<ScoredCandidate> {
    let distance_score = distance_component(distance_meters);
    let category_score = category_component(business.category.as_deref());

    let name_similarity = match (lot.operator_name.as_deref(), business.name.as_str()) {
        (Some(operator), name) if !operator.is_empty() => {
            Some(token_sort_similarity(operator, name))
        }
        _ => None,
    };
    let (name_score, is_operator_match) = name_component(name_similarity);

    // Adjacency component: reserved, always 0 (see ADJACENCY_WEIGHT).
    let score = distance_score + category_score + name_score;
    if score <= 0.0 {
        return None;
    }

    Some(ScoredCandidate {
        business,
        distance_meters,
        score,
        category_weight: category_score,
        name_similarity,
        method: if is_operator_match {
            AssociationMethod::OperatorMatch
        } else {
            AssociationMethod::SpatialProximity
        },
    })
}

/// Step function of distance: full weight within 20m, then 75% / 50% / 25%
/// bands out to the 80m search radius.
fn distance_component(distance_meters: f64) -> f64 {
    let fraction = if distance_meters <= 20.0 {
        1.0
    } else if distance_meters <= 40.0 {
        0.75
    } else if distance_meters <= 60.0 {
        0.5
    } else if distance_meters <= MAX_DISTANCE_METERS {
        0.25
    } else {
        0.0
    };
    DISTANCE_WEIGHT * fraction
}

/// Category relevance. A business with no category at all scores 0 — that
/// is a weaker signal than matching even the low-priority tier.
fn category_component(category: Option<&str>) -> f64 {
    let Some(category) = category else {
        return 0.0;
    };
    let fraction = match category_tier(category) {
        Some(CategoryTier::High) => 1.0,
        Some(CategoryTier::Medium) => 0.66,
        Some(CategoryTier::Low) => 0.33,
        None => 0.0,
    };
    CATEGORY_WEIGHT * fraction
}

/// Name similarity contribution and whether it is strong enough to call the
/// business the lot's operator.
fn name_component(similarity: Option<f64>) -> (f64, bool) {
    match similarity {
        Some(s) if s > OPERATOR_MATCH_THRESHOLD => (NAME_WEIGHT, true),
        Some(s) if s >= PARTIAL_NAME_THRESHOLD => (NAME_WEIGHT * 0.5, false),
        _ => (0.0, false),
    }
}

/// Token-order-insensitive fuzzy similarity: both names are lowercased,
/// whitespace-tokenized, sorted, and rejoined before Jaro-Winkler, so
/// "Westfield Mall" and "Mall Westfield" compare as identical.
pub fn token_sort_similarity(a: &str, b: &str) -> f64 {
    strsim::jaro_winkler(&sorted_tokens(a), &sorted_tokens(b))
}

fn sorted_tokens(s: &str) -> String {
    let lowered = s.to_lowercase();
    let mut tokens: Vec<&str> = lowered.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Turn ranked candidates into persistable associations; rank 0 is the
/// primary.
pub fn build_associations(lot_id: Uuid, ranked: &[ScoredCandidate]) -> Vec<Association> {
    let now = Utc::now();
    ranked
        .iter()
        .enumerate()
        .map(|(rank, c)| Association {
            id: Uuid::new_v4(),
            lot_id,
            business_id: c.business.id,
            match_score: c.score,
            distance_meters: c.distance_meters,
            method: c.method,
            category_weight: c.category_weight,
            name_similarity: c.name_similarity,
            is_primary: rank == 0,
            created_at: now,
        })
        .collect()
}
