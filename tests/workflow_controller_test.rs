//! Batch-level milestones driven by sub-task progress

mod common;

use common::*;
use screening_core::orchestration::{ControllerPassSummary, CreateBatchRequest};
use screening_core::repository::BatchRepository;
use screening_core::state_machine::{BatchStatus, SubTaskStatus};
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;

use SubTaskStatus::*;

async fn processing_batch(harness: &Harness, files: &[&str]) -> Uuid {
    let dir = materials_dir(files);
    let result = harness
        .orchestrator
        .create_batch(CreateBatchRequest::new("void fraction above 0.5", dir.path()))
        .await
        .unwrap();
    assert_eq!(result.batch_status, BatchStatus::Processing);
    result.batch_uuid
}

async fn batch_status(harness: &Harness, batch_uuid: Uuid) -> BatchStatus {
    harness.repository.get_batch(batch_uuid).await.unwrap().status
}

#[tokio::test]
async fn test_all_completed_closes_batch() {
    let harness = Harness::new();
    let batch_uuid = processing_batch(&harness, &["a.cif", "b.cif"]).await;
    harness
        .set_sub_task_statuses(batch_uuid, &[Completed, Completed])
        .await;

    let summary = harness.controller().run_once().await.unwrap();

    assert_eq!(summary.examined, 1);
    assert_eq!(summary.completed, 1);
    assert_eq!(batch_status(&harness, batch_uuid).await, BatchStatus::Completed);
}

#[tokio::test]
async fn test_filtered_out_counts_as_success() {
    let harness = Harness::new();
    let batch_uuid = processing_batch(&harness, &["a.cif", "b.cif", "c.cif"]).await;
    harness
        .set_sub_task_statuses(batch_uuid, &[Completed, FilteredOut, FilteredOut])
        .await;

    let summary = harness.controller().run_once().await.unwrap();

    assert_eq!(summary.completed, 1);
    assert_eq!(batch_status(&harness, batch_uuid).await, BatchStatus::Completed);
}

#[tokio::test]
async fn test_some_failures_partially_complete_batch() {
    let harness = Harness::new();
    let batch_uuid = processing_batch(&harness, &["a.cif", "b.cif", "c.cif"]).await;
    harness
        .set_sub_task_statuses(batch_uuid, &[Completed, Failed, FilteredOut])
        .await;

    let summary = harness.controller().run_once().await.unwrap();

    assert_eq!(summary.partially_completed, 1);
    assert_eq!(
        batch_status(&harness, batch_uuid).await,
        BatchStatus::PartiallyCompleted
    );
}

#[tokio::test]
async fn test_all_failed_fails_batch() {
    let harness = Harness::new();
    let batch_uuid = processing_batch(&harness, &["a.cif", "b.cif"]).await;
    harness.set_sub_task_statuses(batch_uuid, &[Failed, Failed]).await;

    let summary = harness.controller().run_once().await.unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(batch_status(&harness, batch_uuid).await, BatchStatus::Failed);
}

#[tokio::test]
async fn test_open_sub_tasks_keep_batch_processing() {
    let harness = Harness::new();
    let batch_uuid = processing_batch(&harness, &["a.cif", "b.cif", "c.cif"]).await;
    harness
        .set_sub_task_statuses(batch_uuid, &[Completed, MaceOptimization, SecondFiltering])
        .await;

    let summary = harness.controller().run_once().await.unwrap();

    assert_eq!(
        summary,
        ControllerPassSummary {
            examined: 1,
            ..Default::default()
        }
    );
    assert_eq!(batch_status(&harness, batch_uuid).await, BatchStatus::Processing);
    assert!(harness.dispatcher.second_filters().is_empty());
}

#[tokio::test]
async fn test_second_filter_submitted_once_survivors_wait() {
    let harness = Harness::new();
    let batch_uuid = processing_batch(&harness, &["a.cif", "b.cif", "c.cif"]).await;
    harness
        .set_sub_task_statuses(batch_uuid, &[SecondFiltering, FilteredOut, SecondFiltering])
        .await;

    let summary = harness.controller().run_once().await.unwrap();

    assert_eq!(summary.second_filter_submitted, 1);
    assert_eq!(harness.dispatcher.second_filters(), vec![batch_uuid]);
    assert_eq!(
        batch_status(&harness, batch_uuid).await,
        BatchStatus::AwaitingSecondFilter
    );

    // still waiting on the second filter worker: nothing is resubmitted
    let next = harness.controller().run_once().await.unwrap();
    assert_eq!(next.examined, 1);
    assert_eq!(next.second_filter_submitted, 0);
    assert_eq!(harness.dispatcher.second_filters().len(), 1);
    assert_eq!(
        batch_status(&harness, batch_uuid).await,
        BatchStatus::AwaitingSecondFilter
    );
}

#[tokio::test]
async fn test_batch_awaiting_second_filter_closes_when_sub_tasks_finish() {
    let harness = Harness::new();
    let batch_uuid = processing_batch(&harness, &["a.cif", "b.cif"]).await;
    harness
        .set_sub_task_statuses(batch_uuid, &[SecondFiltering, SecondFiltering])
        .await;
    harness.controller().run_once().await.unwrap();
    assert_eq!(
        batch_status(&harness, batch_uuid).await,
        BatchStatus::AwaitingSecondFilter
    );

    harness
        .set_sub_task_statuses(batch_uuid, &[Completed, FilteredOut])
        .await;
    let summary = harness.controller().run_once().await.unwrap();

    assert_eq!(
        summary,
        ControllerPassSummary {
            examined: 1,
            completed: 1,
            ..ControllerPassSummary::default()
        }
    );
    assert_eq!(batch_status(&harness, batch_uuid).await, BatchStatus::Completed);

    // closed batches drop out of later passes
    let after = harness.controller().run_once().await.unwrap();
    assert_eq!(after.examined, 0);
}

#[tokio::test]
async fn test_batch_awaiting_second_filter_can_partially_complete() {
    let harness = Harness::new();
    let batch_uuid = processing_batch(&harness, &["a.cif", "b.cif"]).await;
    harness
        .set_sub_task_statuses(batch_uuid, &[SecondFiltering, FilteredOut])
        .await;
    harness.controller().run_once().await.unwrap();

    harness
        .set_sub_task_statuses(batch_uuid, &[Failed, FilteredOut])
        .await;
    let summary = harness.controller().run_once().await.unwrap();

    assert_eq!(summary.partially_completed, 1);
    assert_eq!(
        batch_status(&harness, batch_uuid).await,
        BatchStatus::PartiallyCompleted
    );
}

#[tokio::test]
async fn test_failed_second_filter_submission_returns_to_processing() {
    let harness = Harness::new();
    let batch_uuid = processing_batch(&harness, &["a.cif", "b.cif"]).await;
    harness
        .set_sub_task_statuses(batch_uuid, &[SecondFiltering, SecondFiltering])
        .await;
    harness.dispatcher.set_reject_second_filter(true);

    let summary = harness.controller().run_once().await.unwrap();

    assert_eq!(summary.errors, 1);
    assert_eq!(summary.second_filter_submitted, 0);
    assert_eq!(batch_status(&harness, batch_uuid).await, BatchStatus::Processing);

    harness.dispatcher.set_reject_second_filter(false);
    let retry = harness.controller().run_once().await.unwrap();
    assert_eq!(retry.second_filter_submitted, 1);
    assert_eq!(
        batch_status(&harness, batch_uuid).await,
        BatchStatus::AwaitingSecondFilter
    );
}

#[tokio::test]
async fn test_pending_batches_are_left_to_the_reconciler() {
    let harness = Harness::with_dispatcher(RecordingDispatcher::rejecting_files(&["b.cif"]));
    let dir = materials_dir(&["a.cif", "b.cif"]);
    let err = harness
        .orchestrator
        .create_batch(CreateBatchRequest::new("any", dir.path()))
        .await
        .unwrap_err();
    let batch_uuid = err.batch_uuid().unwrap();

    let summary = harness.controller().run_once().await.unwrap();

    assert_eq!(summary.examined, 0);
    assert_eq!(batch_status(&harness, batch_uuid).await, BatchStatus::Pending);
}

#[tokio::test]
async fn test_run_loop_advances_batches_until_shutdown() {
    let harness = Harness::new();
    let batch_uuid = processing_batch(&harness, &["a.cif"]).await;
    harness.set_sub_task_statuses(batch_uuid, &[Completed]).await;

    let controller = harness.controller();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move {
        controller.run(Duration::from_millis(10), shutdown_rx).await;
    });

    let mut status = BatchStatus::Processing;
    for _ in 0..100 {
        status = batch_status(&harness, batch_uuid).await;
        if status == BatchStatus::Completed {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(status, BatchStatus::Completed);

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("controller stops on shutdown")
        .unwrap();
}
