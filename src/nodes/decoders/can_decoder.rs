//! CAN decoder node
//!
//! Runs the decode pipeline on a fixed poll interval. Each poll drains
//! every byte chunk queued by the capture side, ingests them as one chunk
//! and publishes a [`DecodeSnapshot`] of the whole session.

use super::session::{DecodeSession, DecodeSnapshot};
use super::types::DecoderConfig;
use crate::runtime::node::{ProcessNode, Receiver, Sender, WorkError, WorkResult};
use std::thread;
use std::time::Instant;
use tracing::{debug, info};

/// Requests a downstream collaborator may send to the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderCommand {
    /// Discard the session, e.g. between two capture sessions
    Reset,
}

/// CAN decoder node
///
/// Input: raw capture byte chunks
/// Output: one snapshot per poll that received bytes
pub struct CanDecoder {
    name: String,
    session: DecodeSession,
    input: Receiver<Vec<u8>>,
    output: Sender<DecodeSnapshot>,
    commands: Option<Receiver<DecoderCommand>>,
    next_poll: Option<Instant>,
}

impl CanDecoder {
    pub fn new(
        config: DecoderConfig,
        input: Receiver<Vec<u8>>,
        output: Sender<DecodeSnapshot>,
    ) -> Self {
        Self {
            name: "can_decoder".to_string(),
            session: DecodeSession::new(config),
            input,
            output,
            commands: None,
            next_poll: None,
        }
    }

    /// With custom name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Accept commands (session reset) from a collaborator
    pub fn with_commands(mut self, commands: Receiver<DecoderCommand>) -> Self {
        self.commands = Some(commands);
        self
    }

    pub fn session(&self) -> &DecodeSession {
        &self.session
    }

    fn handle_commands(&mut self) {
        let Some(commands) = self.commands.as_mut() else {
            return;
        };
        for command in commands.drain().items {
            match command {
                DecoderCommand::Reset => {
                    info!("[{}] Session reset requested", self.name);
                    self.session.reset();
                }
            }
        }
    }

    /// One poll without waiting: drain, decode, publish.
    pub fn poll(&mut self) -> WorkResult<usize> {
        self.handle_commands();

        let drained = self.input.drain();
        let chunk = drained.items.concat();

        if chunk.is_empty() {
            if drained.finished {
                debug!("[{}] Input finished after {} cycles", self.name, self.session.cycles());
                self.output.close();
                return Err(WorkError::Shutdown);
            }
            return Ok(0);
        }

        let snapshot = self.session.decode_cycle(&chunk);
        debug!(
            "[{}] cycle {}: {} bytes, {} raw bits, {} frames",
            self.name,
            snapshot.cycle,
            chunk.len(),
            snapshot.raw_bits.len(),
            snapshot.outcomes.len()
        );
        self.output.send(snapshot)?;
        Ok(1)
    }
}

impl ProcessNode for CanDecoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn work(&mut self) -> WorkResult<usize> {
        if let Some(next_poll) = self.next_poll {
            let now = Instant::now();
            if next_poll > now {
                thread::sleep(next_poll - now);
            }
        }
        self.next_poll = Some(Instant::now() + self.session.config().poll_interval);

        self.poll()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::decoders::test_support::record_bytes;
    use crate::runtime::channel;
    use std::time::Duration;

    fn config() -> DecoderConfig {
        DecoderConfig::new().with_poll_interval(Duration::from_millis(1))
    }

    #[test]
    fn test_poll_merges_queued_chunks() {
        let (bytes_tx, bytes_rx) = channel::<Vec<u8>>(None);
        let (snap_tx, mut snap_rx) = channel::<DecodeSnapshot>(None);
        let mut decoder = CanDecoder::new(config(), bytes_rx, snap_tx);

        let second = record_bytes(1, 60);
        bytes_tx.send(record_bytes(0, 0)).unwrap();
        bytes_tx.send(second[..4].to_vec()).unwrap();
        bytes_tx.send(second[4..].to_vec()).unwrap();

        assert_eq!(decoder.work().unwrap(), 1);
        let snapshot = snap_rx.recv().unwrap();
        assert_eq!(snapshot.cycle, 1);
        assert_eq!(snapshot.levels, vec![0, 0, 1]);
        assert_eq!(snapshot.raw_bits, vec![0, 0, 0]);
    }

    #[test]
    fn test_idle_poll_publishes_nothing() {
        let (_bytes_tx, bytes_rx) = channel::<Vec<u8>>(None);
        let (snap_tx, mut snap_rx) = channel::<DecodeSnapshot>(None);
        let mut decoder = CanDecoder::new(config(), bytes_rx, snap_tx);

        assert_eq!(decoder.work().unwrap(), 0);
        assert_eq!(snap_rx.recv_timeout(Duration::from_millis(5)).unwrap(), None);
    }

    #[test]
    fn test_end_of_input_closes_output() {
        let (bytes_tx, bytes_rx) = channel::<Vec<u8>>(None);
        let (snap_tx, mut snap_rx) = channel::<DecodeSnapshot>(None);
        let mut decoder = CanDecoder::new(config(), bytes_rx, snap_tx).with_name("bus0");
        assert_eq!(decoder.name(), "bus0");

        bytes_tx.send(record_bytes(0, 0)).unwrap();
        bytes_tx.close();

        assert_eq!(decoder.work().unwrap(), 1);
        assert!(matches!(decoder.work(), Err(WorkError::Shutdown)));
        assert!(snap_rx.recv().is_ok());
        assert!(matches!(snap_rx.recv(), Err(WorkError::Shutdown)));
    }

    #[test]
    fn test_reset_command_clears_session() {
        let (bytes_tx, bytes_rx) = channel::<Vec<u8>>(None);
        let (snap_tx, _snap_rx) = channel::<DecodeSnapshot>(None);
        let (cmd_tx, cmd_rx) = channel::<DecoderCommand>(None);
        let mut decoder = CanDecoder::new(config(), bytes_rx, snap_tx).with_commands(cmd_rx);

        bytes_tx.send(record_bytes(0, 0)).unwrap();
        decoder.poll().unwrap();
        assert!(!decoder.session().state().is_empty());

        cmd_tx.send(DecoderCommand::Reset).unwrap();
        decoder.poll().unwrap();
        assert!(decoder.session().state().is_empty());
        assert!(decoder.session().raw_log().is_empty());
    }
}
