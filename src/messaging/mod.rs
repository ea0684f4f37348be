//! # Messaging Module
//!
//! Queue boundary between the orchestrator and the compute layer. The core only
//! sees the [`Dispatcher`] trait; adapters decide where jobs go.
//!
//! - [`PgmqDispatcher`] - PostgreSQL message queue (pgmq) on the shared pool
//! - [`ChannelDispatcher`] - bounded in-process tokio channel

pub mod channel_dispatcher;
pub mod dispatcher;
pub mod errors;
pub mod message;
pub mod pgmq_dispatcher;

pub use channel_dispatcher::ChannelDispatcher;
pub use dispatcher::{DispatchReceipt, Dispatcher};
pub use errors::{DispatchError, DispatchResult};
pub use message::JobMessage;
pub use pgmq_dispatcher::{PgmqDispatcher, ANALYSIS_QUEUE, SECOND_FILTER_QUEUE};
