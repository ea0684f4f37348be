//! PostgreSQL repository tests
//!
//! Run with `DATABASE_URL` pointing at a disposable server and `--ignored`.

mod common;

use common::sample_rules;
use screening_core::models::{NewBatchTask, NewSubTask};
use screening_core::orchestration::{BatchOrchestrator, CreateBatchRequest};
use screening_core::repository::{BatchRepository, PostgresBatchRepository, RepositoryError};
use screening_core::services::FsDirectoryScanner;
use screening_core::state_machine::{BatchStatus, SubTaskStatus};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

fn new_batch() -> NewBatchTask {
    NewBatchTask::new(
        Some("pg".to_string()),
        "pore limiting diameter above 4".to_string(),
        sample_rules(),
        "/data/mofs".to_string(),
    )
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_save_and_read_back_batch(pool: PgPool) -> sqlx::Result<()> {
    let repository = PostgresBatchRepository::new(pool);

    let saved = repository
        .save_batch_with_sub_tasks(
            new_batch(),
            vec![NewSubTask::new("/data/mofs/b.cif"), NewSubTask::new("/data/mofs/a.cif")],
        )
        .await
        .unwrap();

    assert_eq!(saved.batch.status, BatchStatus::Pending);
    assert_eq!(saved.sub_task_count(), 2);
    assert_eq!(saved.sub_tasks[0].original_file_path, "/data/mofs/a.cif");
    assert!(saved.sub_tasks.iter().all(|s| s.status == SubTaskStatus::Pending));

    let loaded = repository
        .get_batch_with_sub_tasks(saved.batch_uuid())
        .await
        .unwrap();
    assert_eq!(loaded.batch.generated_rules, sample_rules());
    assert_eq!(loaded.batch.task_name.as_deref(), Some("pg"));
    assert_eq!(loaded.sub_tasks, saved.sub_tasks);
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_failed_save_rolls_back_batch_row(pool: PgPool) -> sqlx::Result<()> {
    let repository = PostgresBatchRepository::new(pool.clone());

    let err = repository
        .save_batch_with_sub_tasks(
            new_batch(),
            vec![NewSubTask::new("/data/mofs/a.cif"), NewSubTask::new("/data/mofs/a.cif")],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Constraint(_)));

    let batches: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM screening_batch_tasks")
        .fetch_one(&pool)
        .await?;
    assert_eq!(batches, 0);
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_sub_task_transition_is_compare_and_set(pool: PgPool) -> sqlx::Result<()> {
    let repository = PostgresBatchRepository::new(pool);
    let saved = repository
        .save_batch_with_sub_tasks(new_batch(), vec![NewSubTask::new("/data/mofs/a.cif")])
        .await
        .unwrap();
    let sub_task_uuid = saved.sub_tasks[0].sub_task_uuid;

    let moved = repository
        .transition_sub_task_status(
            sub_task_uuid,
            &SubTaskStatus::DISPATCHABLE,
            SubTaskStatus::Dispatched,
            None,
        )
        .await
        .unwrap();
    assert!(moved);

    // a worker picks it up
    repository
        .transition_sub_task_status(
            sub_task_uuid,
            &[SubTaskStatus::Dispatched],
            SubTaskStatus::InitialAnalysis,
            None,
        )
        .await
        .unwrap();

    let stale_write = repository
        .transition_sub_task_status(
            sub_task_uuid,
            &SubTaskStatus::DISPATCHABLE,
            SubTaskStatus::DispatchFailed,
            Some("late failure".to_string()),
        )
        .await
        .unwrap();
    assert!(!stale_write);

    let sub_tasks = repository
        .get_sub_tasks_for_batch(saved.batch_uuid())
        .await
        .unwrap();
    assert_eq!(sub_tasks[0].status, SubTaskStatus::InitialAnalysis);
    assert_eq!(sub_tasks[0].dispatch_attempts, 1);
    assert!(sub_tasks[0].last_dispatched_at.is_some());
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_batch_transition_is_compare_and_set(pool: PgPool) -> sqlx::Result<()> {
    let repository = PostgresBatchRepository::new(pool);
    let saved = repository
        .save_batch_with_sub_tasks(new_batch(), vec![NewSubTask::new("/data/mofs/a.cif")])
        .await
        .unwrap();
    let batch_uuid = saved.batch_uuid();

    for (from, to) in [
        (BatchStatus::Pending, BatchStatus::Processing),
        (BatchStatus::Processing, BatchStatus::Completed),
    ] {
        assert!(repository
            .transition_batch_status(batch_uuid, from, to)
            .await
            .unwrap());
    }

    // a reconciler still acting on its Pending read loses
    let stale_write = repository
        .transition_batch_status(batch_uuid, BatchStatus::Pending, BatchStatus::Processing)
        .await
        .unwrap();
    assert!(!stale_write);
    assert_eq!(
        repository.get_batch(batch_uuid).await.unwrap().status,
        BatchStatus::Completed
    );
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_unknown_ids_are_not_found(pool: PgPool) -> sqlx::Result<()> {
    let repository = PostgresBatchRepository::new(pool);
    let missing = Uuid::new_v4();

    assert!(repository.get_batch(missing).await.unwrap_err().is_not_found());
    assert!(repository
        .get_sub_tasks_for_batch(missing)
        .await
        .unwrap_err()
        .is_not_found());
    assert!(repository
        .transition_batch_status(missing, BatchStatus::Pending, BatchStatus::Processing)
        .await
        .unwrap_err()
        .is_not_found());
    assert!(repository
        .transition_sub_task_status(missing, &[SubTaskStatus::Pending], SubTaskStatus::Dispatched, None)
        .await
        .unwrap_err()
        .is_not_found());
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_orchestrator_against_postgres(pool: PgPool) -> sqlx::Result<()> {
    let repository = Arc::new(PostgresBatchRepository::new(pool));
    let dispatcher = Arc::new(common::RecordingDispatcher::new());
    let orchestrator = BatchOrchestrator::with_config(
        repository.clone(),
        Arc::new(common::StaticRuleGenerator::default()),
        Arc::new(FsDirectoryScanner::new()),
        dispatcher.clone(),
        common::test_orchestrator_config(),
    );
    let dir = common::materials_dir(&["a.cif", "b.cif", "notes.txt"]);

    let result = orchestrator
        .create_batch(CreateBatchRequest::new("any", dir.path()))
        .await
        .unwrap();
    assert_eq!(result.sub_task_count, 2);

    let stored = repository.get_batch_with_sub_tasks(result.batch_uuid).await.unwrap();
    assert_eq!(stored.batch.status, BatchStatus::Processing);
    assert_eq!(stored.count_in_status(SubTaskStatus::Dispatched), 2);
    assert_eq!(dispatcher.submitted().len(), 2);

    let pending = repository
        .list_batches_by_status(&[BatchStatus::Processing])
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    Ok(())
}
