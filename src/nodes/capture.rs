//! Capture source
//!
//! Provides `CaptureSource`, the producer side of the decoder: it reads raw
//! capture bytes from the capture device's serial port, a pipe or a
//! recorded file and forwards them as chunks. It never interprets the bytes.

use crate::Result;
use crate::runtime::node::{ProcessNode, Sender, WorkError, WorkResult};
use crate::runtime::watchdog::{OperationGuard, WatchdogHandle};
use serialport::{DataBits, FlowControl, Parity, StopBits};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, trace};

/// Default read size, matching the capture device's transfer size
pub const DEFAULT_CHUNK_SIZE: usize = 1024;
/// Default pause when the device has nothing to deliver
pub const DEFAULT_IDLE_SLEEP: Duration = Duration::from_millis(10);
/// Line rate of the capture device's serial link
pub const DEFAULT_BAUD_RATE: u32 = 1_152_000;
/// Default serial read timeout; bounds how long a stop request waits on a read
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Source node that reads capture bytes and outputs `Vec<u8>` chunks
///
/// A read that returns no data (end of file, or a timed-out read on a
/// device opened with a read timeout) makes the node sleep briefly. End of
/// input closes the output unless the source follows the input.
pub struct CaptureSource {
    name: String,
    reader: Box<dyn Read + Send>,
    output: Sender<Vec<u8>>,
    chunk_size: usize,
    idle_sleep: Duration,
    follow: bool,
    watchdog_handle: Option<WatchdogHandle>,
    bytes_read: u64,
    finished: bool,
}

impl CaptureSource {
    /// Create a source over any reader
    pub fn new(reader: impl Read + Send + 'static, output: Sender<Vec<u8>>) -> Self {
        Self {
            name: "capture".to_string(),
            reader: Box::new(reader),
            output,
            chunk_size: DEFAULT_CHUNK_SIZE,
            idle_sleep: DEFAULT_IDLE_SLEEP,
            follow: false,
            watchdog_handle: None,
            bytes_read: 0,
            finished: false,
        }
    }

    /// Open a recorded capture file or a pipe
    pub fn open<P: AsRef<Path>>(path: P, output: Sender<Vec<u8>>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        debug!("Opened capture input {}", path.display());
        Ok(Self::new(file, output))
    }

    /// Open the capture device's serial port.
    ///
    /// The port is put in raw mode (8N1, no flow control) so marker bytes
    /// such as 0x11 reach the decoder untouched. A read that times out is
    /// treated like an idle read and the node keeps polling; the source
    /// follows the port since a serial link has no end of input.
    pub fn open_serial(
        path: &str,
        baud_rate: u32,
        read_timeout: Duration,
        output: Sender<Vec<u8>>,
    ) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(read_timeout)
            .open()?;
        debug!(
            "Opened serial port {} at {} baud, timeout {:?}",
            path, baud_rate, read_timeout
        );
        Ok(Self::new(port, output).with_name("serial").follow(true))
    }

    /// With custom name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_idle_sleep(mut self, idle_sleep: Duration) -> Self {
        self.idle_sleep = idle_sleep;
        self
    }

    /// Keep reading after end of input, like `tail -f`
    pub fn follow(mut self, follow: bool) -> Self {
        self.follow = follow;
        self
    }

    /// Attach a watchdog handle to monitor blocking reads
    pub fn with_watchdog(mut self, watchdog_handle: WatchdogHandle) -> Self {
        self.watchdog_handle = Some(watchdog_handle);
        self
    }

    /// Total bytes forwarded so far
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    fn finish(&mut self) {
        if !self.finished {
            self.output.close();
            self.finished = true;
        }
    }
}

impl ProcessNode for CaptureSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn should_stop(&self) -> bool {
        self.finished
    }

    fn work(&mut self) -> WorkResult<usize> {
        let mut buffer = vec![0u8; self.chunk_size];

        let read = {
            let _guard = self.watchdog_handle.as_ref().map(OperationGuard::new);
            self.reader.read(&mut buffer)
        };

        match read {
            Ok(0) if self.follow => {
                thread::sleep(self.idle_sleep);
                Ok(0)
            }
            Ok(0) => {
                info!("[{}] End of input after {} bytes", self.name, self.bytes_read);
                self.finish();
                Err(WorkError::Shutdown)
            }
            Ok(n) => {
                buffer.truncate(n);
                self.bytes_read += n as u64;
                trace!("[{}] read {} bytes", self.name, n);
                if let Err(e) = self.output.send(buffer) {
                    self.finished = true;
                    return Err(e.into());
                }
                Ok(1)
            }
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) =>
            {
                thread::sleep(self.idle_sleep);
                Ok(0)
            }
            Err(e) => {
                self.finish();
                Err(e.into())
            }
        }
    }
}
