//! Cycle runner
//!
//! Drives a fixed, ordered list of collectors at a fixed interval. A cycle always
//! invokes every collector before anything else happens; the only suspension point
//! is the sleep between two cycles. Collector failures are reported and counted,
//! never propagated.

use crate::collectors::Collector;
use crate::monitoring::RunStatistics;
use log::{debug, info, warn};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Suspends the runner between cycles
#[cfg_attr(test, mockall::automock)]
pub trait Sleeper {
    /// Sleep for `duration`; returns `false` if the sleep was cut short by a stop request
    fn sleep(&mut self, duration: Duration) -> bool;
}

/// Sleeper that wakes up early when the shared stop flag is raised
pub struct InterruptibleSleeper {
    stop: Arc<AtomicBool>,
    /// How often the stop flag is checked while sleeping
    slice: Duration,
}

impl InterruptibleSleeper {
    pub fn new(stop: Arc<AtomicBool>) -> Self {
        Self {
            stop,
            slice: Duration::from_millis(250),
        }
    }
}

impl Sleeper for InterruptibleSleeper {
    fn sleep(&mut self, duration: Duration) -> bool {
        // A deadline past what Instant can represent is never reached
        let deadline = Instant::now().checked_add(duration);
        loop {
            if self.stop.load(Ordering::SeqCst) {
                return false;
            }
            let remaining = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return true;
                    }
                    deadline - now
                }
                None => self.slice,
            };
            thread::sleep(self.slice.min(remaining));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Running,
    Stopped,
}

/// Runs collectors cycle after cycle until the iteration bound or a stop request
pub struct CycleRunner {
    collectors: Vec<Box<dyn Collector>>,
    interval: Duration,
    /// `None` runs until stopped
    iterations: Option<NonZeroU32>,
    sleeper: Box<dyn Sleeper>,
    stop: Arc<AtomicBool>,
    state: RunnerState,
    stats: RunStatistics,
}

impl CycleRunner {
    pub fn new(
        collectors: Vec<Box<dyn Collector>>,
        interval: Duration,
        iterations: Option<NonZeroU32>,
        sleeper: Box<dyn Sleeper>,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            collectors,
            interval,
            iterations,
            sleeper,
            stop,
            state: RunnerState::Running,
            stats: RunStatistics::new(),
        }
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    pub fn statistics(&self) -> &RunStatistics {
        &self.stats
    }

    /// Names of the collectors in invocation order
    pub fn collector_names(&self) -> Vec<String> {
        self.collectors.iter().map(|c| c.name().to_string()).collect()
    }

    /// Run until the iteration bound is reached or a stop is requested
    pub fn run(&mut self) -> &RunStatistics {
        match self.iterations {
            Some(n) => info!(
                "Running {} cycle(s) every {}s: {}",
                n,
                self.interval.as_secs(),
                self.collector_names().join(" -> ")
            ),
            None => info!(
                "Running every {}s until stopped: {}",
                self.interval.as_secs(),
                self.collector_names().join(" -> ")
            ),
        }

        while self.state == RunnerState::Running {
            self.run_cycle();

            if !self.another_cycle() {
                self.state = RunnerState::Stopped;
                break;
            }

            debug!("Sleeping {}s until the next cycle", self.interval.as_secs());
            if !self.sleeper.sleep(self.interval) {
                info!("Stop requested, not starting another cycle");
                self.state = RunnerState::Stopped;
            }
        }

        self.stats.log_summary();
        &self.stats
    }

    /// Invoke every collector once, in order
    fn run_cycle(&mut self) {
        let cycle = self.stats.cycles() + 1;
        debug!("Starting cycle {}", cycle);

        for collector in self.collectors.iter_mut() {
            let outcome = collector.collect();
            match &outcome {
                Ok(report) => debug!(
                    "Collector {} wrote {} row(s), skipped {}",
                    collector.name(),
                    report.rows,
                    report.skipped
                ),
                Err(e) => warn!("Collector {} failed: {}", collector.name(), e),
            }
            self.stats.record(collector.name(), &outcome);
        }

        self.stats.complete_cycle();
    }

    fn another_cycle(&self) -> bool {
        if self.stop.load(Ordering::SeqCst) {
            info!("Stop requested, not starting another cycle");
            return false;
        }
        match self.iterations {
            Some(n) => self.stats.cycles() < u64::from(n.get()),
            None => true,
        }
    }
}
