//! Thread-per-node scheduler
//!
//! Spawns a dedicated thread for each node and calls `work()` in a loop
//! until the shared stop signal is raised, the node reports
//! `should_stop()`, or `work()` returns an error. The stop signal is only
//! checked between `work()` calls, so an in-flight capture read finishes
//! (bounded by the reader's own timeout) instead of being torn apart.

use super::errors::WorkError;
use super::node::ProcessNode;
use super::watchdog::Watchdog;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver as StdReceiver, Sender as StdSender, channel};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

/// Runtime scheduler that executes a set of nodes
pub struct Scheduler {
    threads: Vec<(String, JoinHandle<()>)>,
    stop_signal: Arc<AtomicBool>,
    completion_tx: StdSender<String>,
    completion_rx: StdReceiver<String>,
    watchdog: Watchdog,
    watchdog_handle: JoinHandle<()>,
}

impl Scheduler {
    /// Create a new scheduler with watchdog monitoring
    pub fn new() -> Self {
        Self::with_watchdog(Watchdog::new())
    }

    /// Create a scheduler around an existing watchdog
    pub fn with_watchdog(watchdog: Watchdog) -> Self {
        let (completion_tx, completion_rx) = channel();
        let watchdog_handle = watchdog.start_monitoring_thread();
        Self {
            threads: Vec::new(),
            stop_signal: Arc::new(AtomicBool::new(false)),
            completion_tx,
            completion_rx,
            watchdog,
            watchdog_handle,
        }
    }

    /// Get a reference to the watchdog
    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }

    /// Handle to the stop signal, e.g. for a Ctrl-C handler
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop_signal)
    }

    /// Start a node in its own thread
    pub fn start_process<N: ProcessNode + 'static>(&mut self, mut node: N) {
        let stop_signal = Arc::clone(&self.stop_signal);
        let completion_tx = self.completion_tx.clone();
        let name = node.name().to_string();
        let thread_name = name.clone();

        debug!("Starting node: {}", name);

        let handle = thread::spawn(move || {
            let mut items_produced = 0usize;

            loop {
                if stop_signal.load(Ordering::Relaxed) || node.should_stop() {
                    break;
                }

                match node.work() {
                    Ok(n) => items_produced += n,
                    Err(WorkError::Shutdown) => {
                        debug!("[{}] Input finished", thread_name);
                        break;
                    }
                    Err(e) => {
                        error!("[{}] Work error: {}", thread_name, e);
                        break;
                    }
                }
            }

            info!("[{}] Shutdown. Produced {} items.", thread_name, items_produced);

            // Dropping the node closes its channel endpoints
            drop(node);
            let _ = completion_tx.send(thread_name);
        });

        self.threads.push((name, handle));
    }

    /// Signal all nodes to stop
    pub fn stop(&self) {
        self.stop_signal.store(true, Ordering::Relaxed);
    }

    /// Wait for all node threads to complete, joining them as they finish
    pub fn wait(self) {
        let Scheduler {
            threads,
            completion_tx,
            completion_rx,
            watchdog,
            watchdog_handle,
            ..
        } = self;

        // Channel closes once every node thread has dropped its clone
        drop(completion_tx);

        let total_threads = threads.len();
        let mut threads_by_name: HashMap<String, JoinHandle<()>> = threads.into_iter().collect();
        let mut completed = 0;

        info!("Waiting for {} threads to complete...", total_threads);

        while completed < total_threads {
            let Ok(thread_name) = completion_rx.recv() else {
                break;
            };
            completed += 1;
            if let Some(handle) = threads_by_name.remove(&thread_name) {
                match handle.join() {
                    Ok(()) => info!(
                        "[{}] Thread completed ({}/{})",
                        thread_name, completed, total_threads
                    ),
                    Err(e) => error!(
                        "[{}] Thread panicked ({}/{}): {:?}",
                        thread_name, completed, total_threads, e
                    ),
                }
            }
        }

        // Threads that panicked never reported; join what is left
        for (thread_name, handle) in threads_by_name {
            if handle.join().is_err() {
                error!("[{}] Thread panicked", thread_name);
            }
        }

        info!("All {} threads completed", total_threads);

        watchdog.stop();
        let _ = watchdog_handle.join();
    }

    /// Get the number of started threads
    pub fn num_threads(&self) -> usize {
        self.threads.len()
    }

    /// Get the names of all started threads
    pub fn thread_names(&self) -> Vec<String> {
        self.threads.iter().map(|(name, _)| name.clone()).collect()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
