/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use crate::driver::ThroughputWindow;
use crate::stats::{LatencySketch, RuntimeStats};

/// Index of the 95th-percentile element in a sorted sample set.
fn percentile_slot(len: usize) -> usize {
    len * 95 / 100
}

/// Print the final summary block. Throughput history is ranked descending, so
/// the picked element is the rate at least 95% of seconds achieved; latency is
/// ranked ascending, so the picked element bounds 95% of handshakes from
/// above.
pub(crate) fn dump(
    window: &ThroughputWindow,
    sketch: &LatencySketch,
    stats: &RuntimeStats,
    started: bool,
) {
    if !started || window.history().is_empty() {
        eprintln!("ERROR: not enough statistics collected");
        return;
    }

    let mut hs_history = window.history().to_vec();
    hs_history.sort_unstable_by(|a, b| b.cmp(a));

    println!("========================================");
    println!(
        " TOTAL:                  SECONDS {}; HANDSHAKES {}",
        window.measures(),
        stats.tot_tls_handshakes()
    );
    println!(
        " MEASURES (seconds):     MAX h/s {}; AVG h/s {}; 95P h/s {}; MIN h/s {}",
        window.max_hs(),
        window.avg_hs(),
        hs_history[percentile_slot(hs_history.len())],
        window.min_hs()
    );

    let (mut latencies, acc) = sketch.take();
    if latencies.is_empty() {
        println!(" LATENCY:                no samples collected");
        return;
    }
    latencies.sort_unstable();
    println!(
        " LATENCY (microseconds): MIN {}; AVG {}; 95P {}; MAX {}",
        latencies[0],
        acc / latencies.len() as u64,
        latencies[percentile_slot(latencies.len())],
        latencies[latencies.len() - 1]
    );
}
