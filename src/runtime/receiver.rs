//! Channel receiver with end-of-stream tracking and watchdog monitoring
//!
//! [`Receiver`] wraps a `crossbeam_channel::Receiver<ChannelMessage<T>>`,
//! unwraps items transparently and caches end-of-stream state so every
//! call after the marker returns `Shutdown`. [`Receiver::drain`] is the
//! full-drain used by the periodic decoder poll.

use crossbeam_channel::{Receiver as CrossbeamReceiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;

use super::errors::{WorkError, WorkResult};
use super::sender::ChannelMessage;
use super::watchdog::{OperationGuard, WatchdogHandle};

/// Result of draining a receiver
#[derive(Debug)]
pub struct Drained<T> {
    /// Items that were queued at the time of the drain, in order
    pub items: Vec<T>,
    /// Whether end-of-stream was reached (now or earlier)
    pub finished: bool,
}

pub struct Receiver<T> {
    receiver: CrossbeamReceiver<ChannelMessage<T>>,
    watchdog_handle: Option<WatchdogHandle>,
    eos: bool,
}

impl<T> Receiver<T> {
    pub fn new(receiver: CrossbeamReceiver<ChannelMessage<T>>) -> Self {
        Self {
            receiver,
            watchdog_handle: None,
            eos: false,
        }
    }

    /// Attach a watchdog handle to monitor blocking receives
    pub fn with_watchdog(mut self, watchdog_handle: WatchdogHandle) -> Self {
        self.watchdog_handle = Some(watchdog_handle);
        self
    }

    /// Whether end-of-stream has been observed
    pub fn is_finished(&self) -> bool {
        self.eos
    }

    /// Blocking receive.
    ///
    /// Returns `Err(WorkError::Shutdown)` once end-of-stream has been seen
    /// or every sender has been dropped.
    pub fn recv(&mut self) -> WorkResult<T> {
        if self.eos {
            return Err(WorkError::Shutdown);
        }

        let _guard = self.watchdog_handle.as_ref().map(OperationGuard::new);
        match self.receiver.recv() {
            Ok(ChannelMessage::Item(item)) => Ok(item),
            Ok(ChannelMessage::EndOfStream) | Err(_) => {
                self.eos = true;
                tracing::debug!("Receiver::recv() - end of stream");
                Err(WorkError::Shutdown)
            }
        }
    }

    /// Receive with a timeout. `Ok(None)` means nothing arrived in time.
    pub fn recv_timeout(&mut self, timeout: Duration) -> WorkResult<Option<T>> {
        if self.eos {
            return Err(WorkError::Shutdown);
        }

        let _guard = self.watchdog_handle.as_ref().map(OperationGuard::new);
        match self.receiver.recv_timeout(timeout) {
            Ok(ChannelMessage::Item(item)) => Ok(Some(item)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Ok(ChannelMessage::EndOfStream) | Err(RecvTimeoutError::Disconnected) => {
                self.eos = true;
                Err(WorkError::Shutdown)
            }
        }
    }

    /// Take everything currently queued without blocking.
    ///
    /// Stops at the end-of-stream marker; items queued before it are
    /// still returned so no data is lost on shutdown.
    pub fn drain(&mut self) -> Drained<T> {
        let mut items = Vec::new();
        while !self.eos {
            match self.receiver.try_recv() {
                Ok(ChannelMessage::Item(item)) => items.push(item),
                Ok(ChannelMessage::EndOfStream) | Err(TryRecvError::Disconnected) => {
                    self.eos = true;
                }
                Err(TryRecvError::Empty) => break,
            }
        }
        Drained {
            items,
            finished: self.eos,
        }
    }
}
