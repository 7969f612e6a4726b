//! Node trait for streaming processing
//!
//! Defines the ProcessNode trait that capture sources, decoders and sinks
//! implement. Each node owns its channel endpoints; the scheduler only
//! drives `work()`.

pub use super::errors::{WorkError, WorkResult};
pub use super::receiver::Receiver;
pub use super::sender::Sender;

/// A processing node that moves data between channels
/// - Sources read from the outside world and feed a channel
/// - Processors drain a channel and publish results
/// - Sinks consume results
pub trait ProcessNode: Send {
    /// Get a debug name for this node
    fn name(&self) -> &str;

    /// Check if this node should stop processing
    fn should_stop(&self) -> bool {
        false
    }

    /// Do one unit of work.
    ///
    /// Returns Ok(n) where n is the number of items produced,
    /// `Err(WorkError::Shutdown)` once the node's input has ended,
    /// or another error on failure.
    fn work(&mut self) -> WorkResult<usize>;
}
