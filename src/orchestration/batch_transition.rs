//! Persisting batch state machine transitions.

use super::errors::{OrchestrationError, OrchestrationResult};
use crate::repository::BatchRepository;
use crate::state_machine::{BatchEvent, BatchStateMachine, BatchStatus};
use tracing::warn;
use uuid::Uuid;

/// Apply `event` to a batch last read as `from` and store the target status
///
/// The write is a compare-and-set on `from`. If another writer moved the batch
/// first nothing is written, and the stored status is reported through
/// `InvalidBatchState`.
pub(crate) async fn apply_batch_event(
    repository: &dyn BatchRepository,
    batch_uuid: Uuid,
    from: BatchStatus,
    event: &BatchEvent,
) -> OrchestrationResult<BatchStatus> {
    let target = BatchStateMachine::determine_target_state(from, event)?;
    if repository
        .transition_batch_status(batch_uuid, from, target)
        .await?
    {
        return Ok(target);
    }

    let actual = repository.get_batch(batch_uuid).await?.status;
    warn!(
        batch_uuid = %batch_uuid,
        expected = %from,
        actual = %actual,
        event = event.event_type(),
        "Batch status changed concurrently; transition not applied"
    );
    Err(OrchestrationError::InvalidBatchState {
        batch_uuid,
        expected: from,
        actual,
    })
}
