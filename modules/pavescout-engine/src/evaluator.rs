//! Condition-evaluator stand-in for deployments without a CV backend.

use anyhow::{bail, Result};
use async_trait::async_trait;
use geo::Polygon;
use uuid::Uuid;

use pavescout_common::types::{ConditionMetrics, GeoPoint};

use crate::traits::ConditionEvaluator;

/// Evaluator used when no imagery/CV backend is configured. Every call
/// fails per-item, so lots flow through the pipeline with
/// `evaluation_error` set instead of aborting the job.
pub struct UnconfiguredEvaluator;

#[async_trait]
impl ConditionEvaluator for UnconfiguredEvaluator {
    async fn evaluate(
        &self,
        _lot_id: Uuid,
        _centroid: &GeoPoint,
        _geometry: Option<&Polygon<f64>>,
    ) -> Result<ConditionMetrics> {
        bail!("condition evaluator not configured")
    }
}
