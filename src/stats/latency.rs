/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::Mutex;

use tracing::debug;

pub(crate) const LATENCY_N: usize = 1024;

/// Per-worker reservoir of handshake latencies (whole microseconds).
///
/// Samples are written in ring-buffer fashion, but the write cursor advances
/// by a stride that grows on each wrap, so later samples interleave with
/// earlier ones instead of rewriting them front to back. The reservoir stays
/// temporally mixed even if it is never drained.
pub struct LatencyStat {
    i: usize,
    di: usize,
    slots: [u64; LATENCY_N],
}

impl Default for LatencyStat {
    fn default() -> Self {
        LatencyStat {
            i: 0,
            di: 1,
            slots: [0; LATENCY_N],
        }
    }
}

impl LatencyStat {
    pub fn update(&mut self, dt_us: u64) {
        if dt_us == 0 {
            // A zero reading means the clock did not advance across a full
            // handshake, which is a measurement bug, not a sample.
            debug!("dropping zero latency sample");
            return;
        }
        self.slots[self.i] = dt_us;

        self.i += self.di;
        if self.i >= LATENCY_N {
            self.i = 0;
            self.di += 1;
            if self.di > LATENCY_N / 4 {
                self.di = 1;
            }
        }
    }

    /// Append all samples up to the first empty slot into the global sketch.
    pub fn drain(&self, sketch: &LatencySketch) {
        let mut inner = sketch.inner.lock().unwrap_or_else(|e| e.into_inner());
        for &v in self.slots.iter() {
            if v == 0 {
                break;
            }
            inner.samples.push(v);
            inner.acc += v;
        }
    }
}

#[derive(Default)]
struct SketchData {
    samples: Vec<u64>,
    acc: u64,
}

/// Process-wide latency sample store. Workers push into it exactly once, at
/// shutdown; the final report is the only reader.
#[derive(Default)]
pub struct LatencySketch {
    inner: Mutex<SketchData>,
}

impl LatencySketch {
    /// Move the collected samples and their sum out for reporting.
    pub fn take(&self) -> (Vec<u64>, u64) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let samples = std::mem::take(&mut inner.samples);
        let acc = inner.acc;
        inner.acc = 0;
        (samples, acc)
    }
}
