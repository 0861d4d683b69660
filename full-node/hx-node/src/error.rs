//! Errors surfaced synchronously by the node API.
//!
//! Per-item outcomes travel as [`Status`](hx_interface::Status) bytes on
//! result entries instead; nothing here aborts a batch.

/// An error returned from an enqueue call, a flush, or the result stream.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// The arguments were rejected before any queue state changed.
    #[error("bad argument: {0}")]
    BadArg(String),
    /// The result stream was consumed past its end.
    #[error("result stream already consumed")]
    ResultExhausted,
    /// The transport rejected a send outright.
    #[error("transport failure")]
    Transport(#[source] anyhow::Error),
    /// The node is shutting down and no longer accepts work.
    #[error("node is shutting down")]
    Shutdown,
    /// Anything else, typically engine setup failures.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
