//! Processing nodes
//!
//! - **Capture**: reads raw capture bytes from a device, pipe or file
//! - **Decoders**: CAN frame reconstruction from the capture records
//!
//! # Architecture
//!
//! Nodes run one per thread under the [`Scheduler`](crate::runtime::Scheduler)
//! and talk over crossbeam channels:
//!
//! ```text
//! CaptureSource --Vec<u8>--> CanDecoder --DecodeSnapshot--> sink
//! ```
//!
//! # Examples
//!
//! ```no_run
//! use canlogic::nodes::{CanDecoder, CaptureSource};
//! use canlogic::runtime::{Scheduler, channel};
//! use canlogic::DecoderConfig;
//!
//! let (bytes_tx, bytes_rx) = channel(None);
//! let (snapshot_tx, _snapshot_rx) = channel(Some(16));
//!
//! let mut scheduler = Scheduler::new();
//! scheduler.start_process(CaptureSource::open("capture.bin", bytes_tx)?);
//! scheduler.start_process(CanDecoder::new(DecoderConfig::default(), bytes_rx, snapshot_tx));
//! // ... start a sink reading snapshots, then
//! scheduler.wait();
//! # Ok::<(), canlogic::CanLogicError>(())
//! ```

pub mod capture;
pub mod decoders;

pub use capture::CaptureSource;
pub use decoders::CanDecoder;
