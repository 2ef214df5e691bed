/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::cmp;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::anyhow;
use tracing::debug;

use crate::error::WorkerError;
use crate::opts::BenchConfig;
use crate::peer::Peer;
use crate::poller::Poller;
use crate::stats::{LatencySketch, LatencyStat, RuntimeStats};
use crate::tls;

/// Initial ceiling on peer creation. The budget grows by one for every
/// handshake that completes while concurrency is still below target, so load
/// ramps up as the endpoint proves it keeps up instead of all at once.
const PEERS_SLOW_START: usize = 10;

pub struct Worker {
    id: usize,
    config: Arc<BenchConfig>,
    stats: Arc<RuntimeStats>,
    shutdown: Arc<AtomicBool>,
    start_stats: Arc<AtomicBool>,
}

impl Worker {
    pub fn new(
        id: usize,
        config: Arc<BenchConfig>,
        stats: Arc<RuntimeStats>,
        shutdown: Arc<AtomicBool>,
        start_stats: Arc<AtomicBool>,
    ) -> Self {
        Worker {
            id,
            config,
            stats,
            shutdown,
            start_stats,
        }
    }

    fn end_of_work(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
            || self.stats.tot_tls_handshakes() >= self.config.handshake_cap
    }

    /// The worker event loop. Returns the latency reservoir for draining into
    /// the global sketch; any error out of here is fatal for the whole run.
    pub fn run(&self) -> Result<LatencyStat, WorkerError> {
        let tls_ctx = tls::build_client_context(&self.config)?;
        let mut io = Poller::new().map_err(WorkerError::Poller)?;
        let mut sampler = LatencyStat::default();

        let target = self.config.peers_per_worker;
        let mut peers: Vec<Peer> = Vec::with_capacity(target);
        let mut active = 0usize;
        let mut budget = cmp::min(target, PEERS_SLOW_START);

        while !self.end_of_work() {
            while active < target && budget > 0 {
                budget -= 1;
                let id = active;
                peers.push(Peer::new(id, self.config.target));
                active += 1;
                let done = peers[id].advance(&mut io, &tls_ctx, &self.stats, &mut sampler)?;
                if done && active + budget < target {
                    budget += 1;
                }
            }

            io.wait().map_err(WorkerError::Poller)?;
            while let Some(id) = io.next_ready() {
                if id >= peers.len() {
                    continue;
                }
                let done = peers[id].advance(&mut io, &tls_ctx, &self.stats, &mut sampler)?;
                if done && active + budget < target {
                    budget += 1;
                }
            }

            // Peers torn down above queued themselves for a fresh connect.
            // Stop the drain early once shutdown is flagged so exit is prompt.
            io.swap_backlog();
            while !self.shutdown.load(Ordering::Relaxed) {
                let Some(id) = io.next_backlog() else {
                    break;
                };
                if id >= peers.len() {
                    continue;
                }
                let done = peers[id].advance(&mut io, &tls_ctx, &self.stats, &mut sampler)?;
                if done && active + budget < target {
                    budget += 1;
                }
            }

            if active == target && !self.start_stats.swap(true, Ordering::Relaxed) {
                println!("( all peers are active, recording measurements )");
            }
        }

        for peer in peers.iter_mut() {
            peer.disconnect(&mut io);
        }

        debug!("worker {} finished", self.id);
        Ok(sampler)
    }
}

/// Spawn the worker threads. A worker-fatal error terminates the process with
/// exit code 1; a clean exit drains the worker's latency samples into the
/// shared sketch.
pub fn spawn_workers(
    config: &Arc<BenchConfig>,
    stats: &Arc<RuntimeStats>,
    sketch: &Arc<LatencySketch>,
    shutdown: &Arc<AtomicBool>,
    start_stats: &Arc<AtomicBool>,
) -> anyhow::Result<Vec<JoinHandle<()>>> {
    let mut handles = Vec::with_capacity(config.workers);
    for i in 0..config.workers {
        debug!("spawning worker {i}");
        let worker = Worker::new(
            i,
            Arc::clone(config),
            Arc::clone(stats),
            Arc::clone(shutdown),
            Arc::clone(start_stats),
        );
        let sketch = Arc::clone(sketch);
        let handle = std::thread::Builder::new()
            .name(format!("worker-{i}"))
            .spawn(move || match worker.run() {
                Ok(sampler) => sampler.drain(&sketch),
                Err(e) => {
                    eprintln!("ERROR: worker {i}: {e}");
                    std::process::exit(1);
                }
            })
            .map_err(|e| anyhow!("failed to spawn worker thread {i}: {e}"))?;
        handles.push(handle);
    }
    Ok(handles)
}
