//! End-to-end orchestration tests over the mock collaborators: stage
//! progression, failure semantics, and result availability.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use pavescout_common::error::DiscoveryError;
use pavescout_common::types::{DiscoveryFilters, DiscoveryJob, GeoPoint, JobStage, SourceTag};
use pavescout_engine::associate::associate;
use pavescout_engine::store::InMemoryLeadStore;
use pavescout_engine::testing::{
    area_around, business, canonical_lot, point_lot, polygon_lot, MockBusinessSource,
    MockEvaluator, MockLotSource, UPTOWN,
};
use pavescout_engine::traits::{BusinessSource, ConditionEvaluator, LeadStore, RawLotSource};
use pavescout_engine::DiscoveryService;

const LAT_5M: f64 = 0.000045;
const LAT_10M: f64 = 0.00009;

fn service(
    lot_sources: Vec<Arc<dyn RawLotSource>>,
    business_source: Arc<dyn BusinessSource>,
    evaluator: Arc<dyn ConditionEvaluator>,
) -> (DiscoveryService, Arc<InMemoryLeadStore>) {
    let store = Arc::new(InMemoryLeadStore::new());
    let service = DiscoveryService::new(
        store.clone(),
        lot_sources,
        business_source,
        evaluator,
    )
    .with_evaluation_pacing(Duration::ZERO);
    (service, store)
}

async fn wait_until_terminal(service: &DiscoveryService, job_id: Uuid) -> DiscoveryJob {
    for _ in 0..500 {
        let job = service.get_status(job_id).await.unwrap();
        if job.status.is_terminal() {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("job {job_id} did not reach a terminal state");
}

#[tokio::test]
async fn happy_path_merges_evaluates_and_associates() {
    let (lat, lng) = UPTOWN;
    // here and osm both see the same physical lot ~5m apart; osm also sees a
    // second lot ~1.1km away.
    let here = MockLotSource::returning(
        SourceTag::Here,
        vec![polygon_lot(SourceTag::Here, "h-1", lat, lng, 60.0)],
    );
    let osm = MockLotSource::returning(
        SourceTag::Osm,
        vec![
            polygon_lot(SourceTag::Osm, "way/1", lat + LAT_5M, lng, 40.0),
            point_lot(SourceTag::Osm, "way/2", lat + 0.01, lng),
        ],
    );
    let businesses = MockBusinessSource::returning(vec![
        business("Quang Restaurant", Some("restaurant"), lat + LAT_10M, lng),
        business("Cub Foods", Some("supermarket"), lat, lng + LAT_10M * 2.0),
    ]);

    let (service, store) = service(
        vec![Arc::new(here), Arc::new(osm)],
        Arc::new(businesses),
        Arc::new(MockEvaluator::scoring(40.0)),
    );

    let job_id = service
        .start("owner-1", area_around(lat, lng), DiscoveryFilters::default())
        .await
        .unwrap();
    let job = wait_until_terminal(&service, job_id).await;

    assert_eq!(job.status, JobStage::Completed);
    assert!(job.errors.is_empty());
    assert_eq!(job.progress.lots_found, 2);
    assert_eq!(job.progress.lots_evaluated, 2);
    assert_eq!(job.progress.businesses_loaded, 2);
    assert!(job.progress.associations_made >= 1);
    // Both lots are large enough and scored 40 ≤ 70.
    assert_eq!(job.progress.high_value_leads, 2);

    let results = service.get_results(job_id).await.unwrap();
    assert_eq!(results.lots.len(), 2);

    // The merged lot keeps both source tags and the here polygon.
    let merged = results
        .lots
        .iter()
        .find(|l| l.data_sources.len() == 2)
        .expect("one lot merged from two sources");
    assert_eq!(merged.data_sources, vec!["here", "osm"]);
    assert_eq!(merged.source_refs.get(SourceTag::Here), Some("h-1"));
    assert_eq!(merged.source_refs.get(SourceTag::Osm), Some("way/1"));
    assert!(merged.condition.is_some());

    // Primary uniqueness for the merged lot's associations.
    let merged_associations = store.associations_for_lot(merged.id).await.unwrap();
    assert!(!merged_associations.is_empty());
    let primaries: Vec<_> = merged_associations.iter().filter(|a| a.is_primary).collect();
    assert_eq!(primaries.len(), 1);
    let max = merged_associations
        .iter()
        .map(|a| a.match_score)
        .fold(f64::MIN, f64::max);
    assert_eq!(primaries[0].match_score, max);
    for a in &merged_associations {
        assert!(a.match_score > 0.0 && a.match_score <= 100.0);
        assert!(a.distance_meters >= 0.0);
    }
}

#[tokio::test]
async fn submitted_job_is_immediately_queryable_and_stages_advance_in_order() {
    let (lat, lng) = UPTOWN;
    let (service, _) = service(
        vec![Arc::new(MockLotSource::with_lots(SourceTag::Osm, 3))],
        Arc::new(MockBusinessSource::empty()),
        Arc::new(MockEvaluator::scoring(55.0)),
    );

    let job_id = service
        .start("owner-1", area_around(lat, lng), DiscoveryFilters::default())
        .await
        .unwrap();

    // The test runtime is single-threaded and the pipeline task has not been
    // polled yet, so the very first status read observes the queued record.
    let first = service.get_status(job_id).await.unwrap();
    assert_eq!(first.status, JobStage::Queued);
    assert_eq!(first.steps_completed, 0);

    // Poll to completion; steps_completed must never move backwards and the
    // observed stages must appear in declared order.
    let mut last_steps = 0;
    let mut observed = vec![first.status];
    for _ in 0..500 {
        let job = service.get_status(job_id).await.unwrap();
        assert!(
            job.steps_completed >= last_steps,
            "steps_completed went backwards: {} -> {}",
            last_steps,
            job.steps_completed
        );
        last_steps = job.steps_completed;
        if *observed.last().unwrap() != job.status {
            observed.push(job.status);
        }
        if job.status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    assert_eq!(*observed.last().unwrap(), JobStage::Completed);
    let positions: Vec<u32> = observed
        .iter()
        .map(|s| s.step_index().unwrap())
        .collect();
    for pair in positions.windows(2) {
        assert!(pair[0] < pair[1], "stage order violated: {observed:?}");
    }
}

#[tokio::test]
async fn all_lot_sources_failing_fails_the_job() {
    let (lat, lng) = UPTOWN;
    let (service, _) = service(
        vec![
            Arc::new(MockLotSource::failing(SourceTag::Here)),
            Arc::new(MockLotSource::failing(SourceTag::Osm)),
        ],
        Arc::new(MockBusinessSource::empty()),
        Arc::new(MockEvaluator::scoring(50.0)),
    );

    let job_id = service
        .start("owner-1", area_around(lat, lng), DiscoveryFilters::default())
        .await
        .unwrap();
    let job = wait_until_terminal(&service, job_id).await;

    assert_eq!(job.status, JobStage::Failed);
    assert_eq!(job.errors.len(), 1);
    assert!(job.errors[0].contains("sources failed"), "{:?}", job.errors);
}

#[tokio::test]
async fn one_failing_lot_source_still_completes() {
    let (lat, lng) = UPTOWN;
    let (service, _) = service(
        vec![
            Arc::new(MockLotSource::failing(SourceTag::Here)),
            Arc::new(MockLotSource::with_lots(SourceTag::Osm, 2)),
        ],
        Arc::new(MockBusinessSource::empty()),
        Arc::new(MockEvaluator::scoring(50.0)),
    );

    let job_id = service
        .start("owner-1", area_around(lat, lng), DiscoveryFilters::default())
        .await
        .unwrap();
    let job = wait_until_terminal(&service, job_id).await;

    assert_eq!(job.status, JobStage::Completed);
    assert_eq!(job.progress.lots_found, 2);
}

#[tokio::test]
async fn business_source_failure_fails_the_job_but_keeps_lots() {
    let (lat, lng) = UPTOWN;
    let (service, store) = service(
        vec![Arc::new(MockLotSource::with_lots(SourceTag::Osm, 2))],
        Arc::new(MockBusinessSource::failing()),
        Arc::new(MockEvaluator::scoring(50.0)),
    );

    let job_id = service
        .start("owner-1", area_around(lat, lng), DiscoveryFilters::default())
        .await
        .unwrap();
    let job = wait_until_terminal(&service, job_id).await;

    assert_eq!(job.status, JobStage::Failed);
    // Counters accumulated before the failure survive, and the persisted
    // lots are still in the store — no rollback.
    assert_eq!(job.progress.lots_found, 2);
    assert_eq!(job.progress.lots_evaluated, 2);
    assert_eq!(store.lots_for_job(job_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn per_lot_evaluation_failure_does_not_abort_the_job() {
    let (lat, lng) = UPTOWN;
    let (service, store) = service(
        vec![Arc::new(MockLotSource::with_lots(SourceTag::Osm, 3))],
        Arc::new(MockBusinessSource::empty()),
        Arc::new(MockEvaluator::failing_nth(45.0, 1)),
    );

    let job_id = service
        .start("owner-1", area_around(lat, lng), DiscoveryFilters::default())
        .await
        .unwrap();
    let job = wait_until_terminal(&service, job_id).await;

    assert_eq!(job.status, JobStage::Completed);
    assert_eq!(job.progress.lots_evaluated, 3);

    let lots = store.lots_for_job(job_id).await.unwrap();
    let failed: Vec<_> = lots.iter().filter(|l| l.evaluation_error.is_some()).collect();
    let scored: Vec<_> = lots.iter().filter(|l| l.condition.is_some()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(scored.len(), 2);
    assert!(failed[0].evaluation_error.as_deref().unwrap().contains("timed out"));
}

#[tokio::test]
async fn results_before_completion_are_not_ready() {
    let (lat, lng) = UPTOWN;
    let (service, _) = service(
        vec![Arc::new(MockLotSource::with_lots(SourceTag::Osm, 1))],
        Arc::new(MockBusinessSource::empty()),
        Arc::new(MockEvaluator::scoring(50.0)),
    );

    let job_id = service
        .start("owner-1", area_around(lat, lng), DiscoveryFilters::default())
        .await
        .unwrap();

    // Pipeline task has not been polled yet on the single-threaded runtime.
    let err = service.get_results(job_id).await.unwrap_err();
    match err {
        DiscoveryError::NotReady { status } => assert_eq!(status, "QUEUED"),
        other => panic!("expected NotReady, got {other}"),
    }

    wait_until_terminal(&service, job_id).await;
    assert!(service.get_results(job_id).await.is_ok());
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let (service, _) = service(
        vec![Arc::new(MockLotSource::with_lots(SourceTag::Osm, 1))],
        Arc::new(MockBusinessSource::empty()),
        Arc::new(MockEvaluator::scoring(50.0)),
    );

    let missing = Uuid::new_v4();
    assert!(matches!(
        service.get_status(missing).await.unwrap_err(),
        DiscoveryError::JobNotFound(_)
    ));
    assert!(matches!(
        service.get_results(missing).await.unwrap_err(),
        DiscoveryError::JobNotFound(_)
    ));
}

#[tokio::test]
async fn invalid_area_is_rejected_before_a_job_exists() {
    let (service, _) = service(
        vec![Arc::new(MockLotSource::with_lots(SourceTag::Osm, 1))],
        Arc::new(MockBusinessSource::empty()),
        Arc::new(MockEvaluator::scoring(50.0)),
    );

    let err = service
        .start(
            "owner-1",
            vec![GeoPoint::new(44.9, -93.2), GeoPoint::new(44.9, -93.1)],
            DiscoveryFilters::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DiscoveryError::Validation(_)));
}

#[tokio::test]
async fn strong_name_match_outside_radius_is_still_excluded() {
    // Lot operated by "Westfield Mall"; "Westfield Mall LLC" sits ~90m away,
    // outside the 80m search radius, so no association is created at all.
    let (lat, lng) = UPTOWN;
    let store = InMemoryLeadStore::new();

    let mut lot = canonical_lot(lat, lng);
    lot.operator_name = Some("Westfield Mall".to_string());
    store
        .insert_lots(Uuid::new_v4(), &[lot.clone()])
        .await
        .unwrap();
    store
        .insert_businesses(&[business(
            "Westfield Mall LLC",
            Some("mall"),
            lat + 0.00081, // ~90m north
            lng,
        )])
        .await
        .unwrap();

    let stats = associate(&store, &[lot.id]).await.unwrap();
    assert_eq!(stats.lots_processed, 1);
    assert_eq!(stats.lots_unmatched, 1);
    assert_eq!(stats.associations_created, 0);
    assert!(store.associations_for_lot(lot.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn purge_expired_removes_finished_jobs() {
    let (lat, lng) = UPTOWN;
    let (service, _) = service(
        vec![Arc::new(MockLotSource::with_lots(SourceTag::Osm, 1))],
        Arc::new(MockBusinessSource::empty()),
        Arc::new(MockEvaluator::scoring(50.0)),
    );

    let job_id = service
        .start("owner-1", area_around(lat, lng), DiscoveryFilters::default())
        .await
        .unwrap();
    wait_until_terminal(&service, job_id).await;

    // A zero-length retention window treats every completed job as expired.
    let removed = service.purge_expired(chrono::Duration::zero()).await;
    assert_eq!(removed, 1);
    assert!(matches!(
        service.get_status(job_id).await.unwrap_err(),
        DiscoveryError::JobNotFound(_)
    ));
}
