//! Channel sender with watchdog monitoring

use crossbeam_channel::{SendError, Sender as CrossbeamSender};

use super::watchdog::{OperationGuard, WatchdogHandle};

/// Channel message wrapper for end-of-stream signaling
///
/// Producers close their output explicitly so the consumer can tell
/// "nothing queued right now" apart from "no more data will come", even
/// while other clones of the sender are still alive.
///
/// Nodes never see this enum directly: `Sender::send()` wraps values in
/// `Item(T)` and `Receiver` unwraps them.
#[derive(Clone, Debug)]
pub enum ChannelMessage<T> {
    /// A data item
    Item(T),
    /// End-of-stream marker
    EndOfStream,
}

/// Sending half of a node channel
pub struct Sender<T> {
    destination: CrossbeamSender<ChannelMessage<T>>,
    watchdog_handle: Option<WatchdogHandle>,
}

impl<T> Sender<T> {
    pub fn new(destination: CrossbeamSender<ChannelMessage<T>>) -> Self {
        Self {
            destination,
            watchdog_handle: None,
        }
    }

    /// Attach a watchdog handle to monitor send operations
    pub fn with_watchdog(mut self, watchdog_handle: WatchdogHandle) -> Self {
        self.watchdog_handle = Some(watchdog_handle);
        self
    }

    /// Send a value; fails once the receiving side is gone.
    pub fn send(&self, value: T) -> Result<(), SendError<T>> {
        let _guard = self.watchdog_handle.as_ref().map(OperationGuard::new);

        match self.destination.send(ChannelMessage::Item(value)) {
            Ok(()) => Ok(()),
            Err(SendError(ChannelMessage::Item(v))) => Err(SendError(v)),
            Err(SendError(ChannelMessage::EndOfStream)) => {
                unreachable!("only items are sent here")
            }
        }
    }

    /// Signal end-of-stream
    pub fn close(&self) {
        let _guard = self.watchdog_handle.as_ref().map(OperationGuard::new);
        let _ = self.destination.send(ChannelMessage::EndOfStream);
    }
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        Self {
            destination: self.destination.clone(),
            watchdog_handle: self.watchdog_handle.clone(),
        }
    }
}
