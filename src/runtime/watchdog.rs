//! Blocking-operation watchdog
//!
//! Each monitored endpoint stores the start of its current blocking
//! operation in an atomic (milliseconds since the watchdog was created,
//! 0 = idle). A monitor thread scans those timestamps once per second and
//! warns once per operation that stays blocked past the threshold. A
//! capture read that hangs on a silent device, or a snapshot send into a
//! consumer that stopped draining, shows up here.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const DEFAULT_THRESHOLD: Duration = Duration::from_secs(5);
const SCAN_INTERVAL: Duration = Duration::from_secs(1);

/// Tracking state for one monitored operation site
struct OperationState {
    /// Start of the running operation (ms since `origin` + 1), or 0 if idle
    started_at: AtomicU64,
    has_warned: AtomicBool,
    node_name: String,
    operation: String,
    endpoint: String,
}

/// Handle held by a sender, receiver or capture source
#[derive(Clone)]
pub struct WatchdogHandle {
    state: Arc<OperationState>,
    origin: Instant,
}

impl WatchdogHandle {
    /// Mark the start of a blocking operation
    #[inline]
    pub fn start_operation(&self) {
        let elapsed = self.origin.elapsed().as_millis() as u64 + 1;
        self.state.started_at.store(elapsed, Ordering::Relaxed);
        self.state.has_warned.store(false, Ordering::Relaxed);
    }

    /// Mark the end of a blocking operation
    #[inline]
    pub fn finish_operation(&self) {
        if self.state.has_warned.swap(false, Ordering::Relaxed) {
            info!(
                "UNBLOCKED: [{}] {} on '{}'",
                self.state.node_name, self.state.operation, self.state.endpoint
            );
        }
        self.state.started_at.store(0, Ordering::Relaxed);
    }

    /// Whether an operation is currently in flight
    pub fn is_busy(&self) -> bool {
        self.state.started_at.load(Ordering::Relaxed) != 0
    }
}

/// Shared watchdog state
#[derive(Clone)]
pub struct Watchdog {
    operations: Arc<Mutex<Vec<Weak<OperationState>>>>,
    running: Arc<AtomicBool>,
    origin: Instant,
    threshold: Duration,
}

impl Watchdog {
    /// Create a watchdog with the default 5 second threshold
    pub fn new() -> Self {
        Self {
            operations: Arc::new(Mutex::new(Vec::new())),
            running: Arc::new(AtomicBool::new(true)),
            origin: Instant::now(),
            threshold: DEFAULT_THRESHOLD,
        }
    }

    /// Override how long an operation may block before a warning
    pub fn with_threshold(mut self, threshold: Duration) -> Self {
        self.threshold = threshold;
        self
    }

    /// Register an operation site for monitoring
    pub fn register(&self, node_name: &str, operation: &str, endpoint: &str) -> WatchdogHandle {
        let state = Arc::new(OperationState {
            started_at: AtomicU64::new(0),
            has_warned: AtomicBool::new(false),
            node_name: node_name.to_string(),
            operation: operation.to_string(),
            endpoint: endpoint.to_string(),
        });

        if let Ok(mut operations) = self.operations.lock() {
            operations.push(Arc::downgrade(&state));
        }

        WatchdogHandle {
            state,
            origin: self.origin,
        }
    }

    /// Scan all live operations and warn about the ones blocked too long.
    ///
    /// Returns the number of operations newly reported as blocked.
    pub fn check_for_blocked(&self) -> usize {
        let now = self.origin.elapsed().as_millis() as u64 + 1;
        let threshold_ms = self.threshold.as_millis() as u64;
        let mut reported = 0;

        let Ok(mut operations) = self.operations.lock() else {
            return 0;
        };

        operations.retain(|weak| {
            let Some(state) = weak.upgrade() else {
                return false;
            };
            let start = state.started_at.load(Ordering::Relaxed);
            if start > 0 {
                let blocked_ms = now.saturating_sub(start);
                if blocked_ms > threshold_ms && !state.has_warned.swap(true, Ordering::Relaxed) {
                    warn!(
                        "BLOCKED: [{}] {} on '{}' for {:.1}s",
                        state.node_name,
                        state.operation,
                        state.endpoint,
                        blocked_ms as f64 / 1000.0
                    );
                    reported += 1;
                }
            }
            true
        });

        reported
    }

    /// Start the monitoring thread; it exits after `stop()`
    pub fn start_monitoring_thread(&self) -> JoinHandle<()> {
        let watchdog = self.clone();
        std::thread::spawn(move || {
            while watchdog.running.load(Ordering::Relaxed) {
                std::thread::sleep(SCAN_INTERVAL);
                watchdog.check_for_blocked();
            }
        })
    }

    /// Stop the monitoring thread
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard marking one operation as in flight
pub struct OperationGuard<'a> {
    handle: &'a WatchdogHandle,
}

impl<'a> OperationGuard<'a> {
    #[inline]
    pub fn new(handle: &'a WatchdogHandle) -> Self {
        handle.start_operation();
        Self { handle }
    }
}

impl Drop for OperationGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        self.handle.finish_operation();
    }
}
