/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;

use crate::opts::BenchConfig;
use crate::report;
use crate::stats::{LatencySketch, RuntimeStats};
use crate::worker;

/// One hour of one-second samples; runs longer than that stop recording.
const HISTORY_LIMIT: usize = 3600;

/// Driver-owned throughput aggregation over the per-second samples.
pub(crate) struct ThroughputWindow {
    last_time: Instant,
    measures: u64,
    max_hs: i64,
    min_hs: i64,
    avg_hs: i64,
    history: Vec<i64>,
    history_full: bool,
}

impl ThroughputWindow {
    fn new(now: Instant) -> Self {
        ThroughputWindow {
            last_time: now,
            measures: 0,
            max_hs: 0,
            min_hs: 0,
            avg_hs: 0,
            history: Vec::new(),
            history_full: false,
        }
    }

    fn record(&mut self, curr_hs: i64) {
        self.measures += 1;
        if curr_hs > self.max_hs {
            self.max_hs = curr_hs;
        }
        if curr_hs != 0 && (self.min_hs > curr_hs || self.min_hs == 0) {
            self.min_hs = curr_hs;
        }
        self.avg_hs = (self.avg_hs * (self.measures as i64 - 1) + curr_hs) / self.measures as i64;
        if self.history.len() < HISTORY_LIMIT {
            self.history.push(curr_hs);
        } else if !self.history_full {
            eprintln!("WARNING: benchmark has been running for over an hour, dropping further throughput history");
            self.history_full = true;
        }
    }

    pub(crate) fn measures(&self) -> u64 {
        self.measures
    }

    pub(crate) fn max_hs(&self) -> i64 {
        self.max_hs
    }

    pub(crate) fn min_hs(&self) -> i64 {
        self.min_hs
    }

    pub(crate) fn avg_hs(&self) -> i64 {
        self.avg_hs
    }

    pub(crate) fn history(&self) -> &[i64] {
        &self.history
    }
}

struct Driver {
    config: Arc<BenchConfig>,
    stats: Arc<RuntimeStats>,
    shutdown: Arc<AtomicBool>,
    start_stats: Arc<AtomicBool>,
    window: ThroughputWindow,
}

impl Driver {
    fn new(
        config: Arc<BenchConfig>,
        stats: Arc<RuntimeStats>,
        shutdown: Arc<AtomicBool>,
        start_stats: Arc<AtomicBool>,
    ) -> Self {
        Driver {
            config,
            stats,
            shutdown,
            start_stats,
            window: ThroughputWindow::new(Instant::now()),
        }
    }

    fn end_of_work(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
            || self.stats.tot_tls_handshakes() >= self.config.handshake_cap
    }

    fn sample_once(&mut self) {
        let completed = self.stats.pull_window_tls_connections();
        let now = Instant::now();
        let dt_ms = now.duration_since(self.window.last_time).as_millis().max(1) as i64;
        self.window.last_time = now;

        let curr_hs = 1000 * completed / dt_ms;
        println!(
            "TLS handshakes in flight {} [{curr_hs} h/s], TCP conns open {} [{} connecting], errors {}",
            self.stats.tls_handshakes(),
            self.stats.tcp_connections(),
            self.stats.tcp_handshakes(),
            self.stats.error_count(),
        );

        // Until every worker is at full concurrency the rate is still ramping;
        // show it but keep it out of the record.
        if !self.start_stats.load(Ordering::Relaxed) {
            return;
        }
        self.window.record(curr_hs);
    }

    fn run(&mut self) {
        let start = Instant::now();
        self.window.last_time = start;
        while !self.end_of_work() {
            thread::sleep(Duration::from_secs(1));
            self.sample_once();

            if let Some(limit) = self.config.time_limit {
                if start.elapsed() >= limit {
                    self.shutdown.store(true, Ordering::Relaxed);
                }
            }
        }
        // Covers the handshake-cap exit so workers stop their backlog drains.
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

/// Run the whole benchmark: spawn workers, sample counters once per second,
/// join, report.
pub fn run(config: BenchConfig) -> anyhow::Result<()> {
    let config = Arc::new(config);
    let stats = Arc::new(RuntimeStats::default());
    let sketch = Arc::new(LatencySketch::default());
    let shutdown = Arc::new(AtomicBool::new(false));
    let start_stats = Arc::new(AtomicBool::new(false));

    let sig_shutdown = Arc::clone(&shutdown);
    ctrlc::set_handler(move || sig_shutdown.store(true, Ordering::Relaxed))
        .context("failed to set termination signal handler")?;

    let handles = worker::spawn_workers(&config, &stats, &sketch, &shutdown, &start_stats)?;

    let mut driver = Driver::new(
        Arc::clone(&config),
        Arc::clone(&stats),
        Arc::clone(&shutdown),
        Arc::clone(&start_stats),
    );
    driver.run();

    for (i, handle) in handles.into_iter().enumerate() {
        if handle.join().is_err() {
            eprintln!("ERROR: worker thread {i} panicked");
        }
    }

    report::dump(
        &driver.window,
        &sketch,
        &stats,
        start_stats.load(Ordering::Relaxed),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> ThroughputWindow {
        ThroughputWindow::new(Instant::now())
    }

    #[test]
    fn record_tracks_extremes_and_average() {
        let mut w = window();
        w.record(10);
        w.record(30);
        w.record(20);
        assert_eq!(w.measures(), 3);
        assert_eq!(w.max_hs(), 30);
        assert_eq!(w.min_hs(), 10);
        assert_eq!(w.avg_hs(), 20);
        assert_eq!(w.history(), &[10, 30, 20]);
    }

    #[test]
    fn zero_sample_does_not_set_min() {
        let mut w = window();
        w.record(0);
        w.record(5);
        w.record(0);
        assert_eq!(w.min_hs(), 5);
        assert_eq!(w.max_hs(), 5);
        assert_eq!(w.measures(), 3);
    }

    #[test]
    fn history_capped_at_one_hour() {
        let mut w = window();
        for _ in 0..HISTORY_LIMIT + 50 {
            w.record(1);
        }
        assert_eq!(w.history().len(), HISTORY_LIMIT);
        assert_eq!(w.measures() as usize, HISTORY_LIMIT + 50);
    }
}
