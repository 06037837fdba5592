//! Error type shared by the channel, the tasks and the coordinator.

use std::io;

/// Failures raised by transfer components.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// A constructor argument was out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An operation was called in a lifecycle state that forbids it.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// A blocking channel operation observed a cancellation request.
    #[error("interrupted while blocked on the channel")]
    Interrupted,

    /// A worker thread could not be created.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, TransferError>;
