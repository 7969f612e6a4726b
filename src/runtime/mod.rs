//! Runtime support for thread-per-node processing

pub mod errors;
pub mod node;
pub mod receiver;
pub mod scheduler;
pub mod sender;
pub mod watchdog;

pub use errors::{WorkError, WorkResult};
pub use node::ProcessNode;
pub use receiver::{Drained, Receiver};
pub use scheduler::Scheduler;
pub use sender::{ChannelMessage, Sender};
pub use watchdog::{Watchdog, WatchdogHandle};

/// Create a connected sender/receiver pair.
///
/// `None` gives an unbounded queue (the capture byte queue must never
/// block the producer); `Some(n)` bounds it to `n` items.
pub fn channel<T>(capacity: Option<usize>) -> (Sender<T>, Receiver<T>) {
    let (tx, rx) = match capacity {
        Some(n) => crossbeam_channel::bounded(n),
        None => crossbeam_channel::unbounded(),
    };
    (Sender::new(tx), Receiver::new(rx))
}
