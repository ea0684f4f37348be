//! # Channel Dispatcher
//!
//! Bounded in-process queue for embedding the orchestrator next to its
//! workers. A full channel refuses new jobs instead of waiting, which gives
//! callers the same back-pressure signal a remote queue would.

use super::dispatcher::{DispatchReceipt, Dispatcher};
use super::errors::{DispatchError, DispatchResult};
use super::message::JobMessage;
use async_trait::async_trait;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

const QUEUE_NAME: &str = "in_process";

#[derive(Debug)]
pub struct ChannelDispatcher {
    sender: mpsc::Sender<JobMessage>,
    next_message_id: AtomicI64,
}

impl ChannelDispatcher {
    /// Create the dispatcher together with the receiving end for workers
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<JobMessage>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (
            Self {
                sender,
                next_message_id: AtomicI64::new(1),
            },
            receiver,
        )
    }

    fn enqueue(&self, message: JobMessage) -> DispatchResult<DispatchReceipt> {
        match self.sender.try_send(message) {
            Ok(()) => {
                let message_id = self.next_message_id.fetch_add(1, Ordering::Relaxed);
                Ok(DispatchReceipt::new(message_id, QUEUE_NAME))
            }
            Err(TrySendError::Full(_)) => Err(DispatchError::rejected("in-process queue is full")),
            Err(TrySendError::Closed(_)) => {
                Err(DispatchError::transport("in-process queue receiver dropped"))
            }
        }
    }
}

#[async_trait]
impl Dispatcher for ChannelDispatcher {
    async fn submit(&self, sub_task_uuid: Uuid, file_path: &str) -> DispatchResult<DispatchReceipt> {
        self.enqueue(JobMessage::analyze(sub_task_uuid, file_path))
    }

    async fn submit_second_filter(&self, batch_uuid: Uuid) -> DispatchResult<DispatchReceipt> {
        self.enqueue(JobMessage::second_filter(batch_uuid))
    }

    fn provider_name(&self) -> &'static str {
        "channel"
    }
}
