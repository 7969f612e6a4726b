//! CAN capture decoder
//!
//! Reads logic-analyzer transition records from the capture device's
//! serial port, a pipe or a recorded capture file and prints the decoded
//! CAN frames.
//!
//! Usage:
//!   canlogic --input /dev/ttyACM0 --serial
//!
//! Capture for ten seconds, then stop:
//!   canlogic --input /dev/ttyACM0 --serial --duration 10
//!
//! Replay a recorded capture as JSON lines, one snapshot per poll:
//!   canlogic --input capture.bin --json

use canlogic::nodes::capture::{DEFAULT_BAUD_RATE, DEFAULT_CHUNK_SIZE};
use canlogic::nodes::decoders::types::{BIT_PERIOD_TICKS, EDGE_GUARD_TICKS, SESSION_HORIZON_TICKS};
use canlogic::runtime::{Receiver, Scheduler, channel};
use canlogic::{
    BitTiming, CanDecoder, CaptureSource, DecodeSnapshot, DecoderConfig, FrameOutcome,
    ProcessNode, WorkError, WorkResult,
};
use clap::Parser;
use std::io::{self, BufWriter, Stdout, Write};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Capture input: serial device, pipe or recorded file
    #[arg(short, long)]
    input: PathBuf,

    /// Open the input as a serial port (raw mode, read timeout)
    #[arg(short, long)]
    serial: bool,

    /// Serial line rate
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    baud: u32,

    /// Serial read timeout in milliseconds
    #[arg(long, default_value_t = 100)]
    read_timeout_ms: u64,

    /// Keep reading after end of input
    #[arg(short, long)]
    follow: bool,

    /// Stop all nodes after this many seconds
    #[arg(short, long)]
    duration: Option<u64>,

    /// Print every snapshot as a JSON line instead of frame summaries
    #[arg(long)]
    json: bool,

    /// Bytes per capture read
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Decoder poll interval in milliseconds
    #[arg(long, default_value_t = 100)]
    poll_interval_ms: u64,

    /// Nominal bit period in ticks (0.1 µs)
    #[arg(long, default_value_t = BIT_PERIOD_TICKS)]
    bit_period: u32,

    /// Interval remainder in ticks that still counts as a bit
    #[arg(long, default_value_t = EDGE_GUARD_TICKS)]
    edge_guard: u32,

    /// Session horizon in ticks
    #[arg(long, default_value_t = SESSION_HORIZON_TICKS)]
    horizon: u32,
}

/// Sink that reports decoded frames
///
/// Every snapshot covers the whole session, so only frames past the ones
/// already reported are printed.
struct SnapshotPrinter {
    input: Receiver<DecodeSnapshot>,
    json: Option<BufWriter<Stdout>>,
    reported: usize,
}

impl SnapshotPrinter {
    fn new(input: Receiver<DecodeSnapshot>, json: bool) -> Self {
        Self {
            input,
            json: json.then(|| BufWriter::new(io::stdout())),
            reported: 0,
        }
    }

    fn write_json(writer: &mut BufWriter<Stdout>, snapshot: &DecodeSnapshot) -> WorkResult {
        serde_json::to_writer(&mut *writer, snapshot)
            .map_err(|e| WorkError::NodeError(format!("JSON write error: {}", e)))?;
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }

    fn report_frames(&mut self, snapshot: &DecodeSnapshot) {
        if snapshot.report.resets > 0 || snapshot.outcomes.len() < self.reported {
            debug!("Session restarted at cycle {}", snapshot.cycle);
            self.reported = 0;
        }

        for outcome in &snapshot.outcomes[self.reported..] {
            match outcome {
                FrameOutcome::Complete(frame) => {
                    info!("Frame @{}: {}", frame.start_bit, frame);
                    self.reported += 1;
                }
                // May complete on a later cycle
                FrameOutcome::Partial { frame, reached } => {
                    debug!("Frame @{} incomplete, waiting for {}", frame.start_bit, reached);
                }
                FrameOutcome::Error {
                    at_bit_index,
                    field,
                } => {
                    debug!("No frame: {} missing at bit {}", field, at_bit_index);
                }
            }
        }
    }
}

impl ProcessNode for SnapshotPrinter {
    fn name(&self) -> &str {
        "snapshot_printer"
    }

    fn work(&mut self) -> WorkResult<usize> {
        let snapshot = self.input.recv()?;

        match self.json.as_mut() {
            Some(writer) => Self::write_json(writer, &snapshot)?,
            None => self.report_frames(&snapshot),
        }

        Ok(1)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let config = DecoderConfig::new()
        .with_timing(BitTiming::new(args.bit_period, args.edge_guard))
        .with_horizon(args.horizon)
        .with_poll_interval(Duration::from_millis(args.poll_interval_ms));
    config.validate()?;

    info!("=== CAN Capture Decoder ===");
    info!("Input: {}", args.input.display());
    info!(
        "Timing: period={} guard={} horizon={} poll={:?}",
        config.timing.bit_period, config.timing.edge_guard, config.horizon, config.poll_interval
    );

    let mut scheduler = Scheduler::new();
    let read_watch = scheduler.watchdog().register("capture", "read", "input");

    // Byte queue must never block the capture side
    let (bytes_tx, bytes_rx) = channel::<Vec<u8>>(None);
    let (snapshot_tx, snapshot_rx) = channel::<DecodeSnapshot>(Some(16));

    let source = if args.serial {
        CaptureSource::open_serial(
            &args.input.to_string_lossy(),
            args.baud,
            Duration::from_millis(args.read_timeout_ms),
            bytes_tx,
        )?
    } else {
        CaptureSource::open(&args.input, bytes_tx)?.follow(args.follow)
    };
    let source = source
        .with_chunk_size(args.chunk_size)
        .with_watchdog(read_watch);

    scheduler.start_process(source);
    scheduler.start_process(CanDecoder::new(config, bytes_rx, snapshot_tx));
    scheduler.start_process(SnapshotPrinter::new(snapshot_rx, args.json));

    if let Some(seconds) = args.duration {
        let stop = scheduler.stop_handle();
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(seconds));
            info!("Capture time of {}s elapsed, stopping", seconds);
            stop.store(true, Ordering::Relaxed);
        });
    }

    info!("Running...");
    scheduler.wait();

    info!("Done!");

    Ok(())
}
