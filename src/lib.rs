//! Bounded producer/consumer transfer of items between two collections.
//!
//! A [`TransferCoordinator`] owns a [`BoundedChannel`] and runs one
//! [`ProducerTask`] and one [`ConsumerTask`] on a two-thread [`WorkerPool`].
//! Drivers start the transfer, poll [`QueueStatus`], and wait for both tasks.

pub mod cancel;
pub mod channel;
pub mod config;
pub mod consumer;
pub mod coordinator;
pub mod destination;
pub mod error;
pub mod logging;
pub mod pool;
pub mod producer;
pub mod sim;
pub mod types;

pub use cancel::CancelToken;
pub use channel::{BoundedChannel, ChannelStatus};
pub use config::{DemoConfig, TransferOptions};
pub use consumer::{ConsumerExit, ConsumerState, ConsumerTask};
pub use coordinator::{QueueStatus, TransferCoordinator};
pub use destination::Destination;
pub use error::{Result, TransferError};
pub use logging::{LogSink, MemorySink, TracingSink};
pub use pool::WorkerPool;
pub use producer::{ProducerOutcome, ProducerTask};
pub use types::{Item, ItemId, source_items};
