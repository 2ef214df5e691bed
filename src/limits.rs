/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use tracing::warn;

/// Descriptors needed per worker: one per peer socket, plus the poller handle
/// and headroom for the standard streams.
fn required_fds(peers: usize, workers: usize) -> u64 {
    ((peers + 4) * workers) as u64
}

fn reduced_peers(available: u64, workers: usize) -> usize {
    (available as usize / workers.max(1)).saturating_sub(4)
}

/// Make sure the open-file ceiling covers the requested concurrency, raising
/// it if needed. If the ceiling cannot be raised the per-worker peer count is
/// scaled down to what fits; the caller aborts on zero.
pub fn adjust_open_file_limit(peers: usize, workers: usize) -> usize {
    let required = required_fds(peers, workers);

    let mut rl = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    if unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut rl) } != 0 {
        warn!("cannot read the open file limit, continuing unchanged");
        return peers;
    }
    if rl.rlim_cur as u64 > required {
        return peers;
    }

    println!("set open files limit to {required}");
    let available = rl.rlim_cur as u64;
    rl.rlim_cur = required as libc::rlim_t;
    if unsafe { libc::setrlimit(libc::RLIMIT_NOFILE, &rl) } != 0 {
        let reduced = reduced_peers(available, workers);
        eprintln!(
            "WARNING: {required} open files required ((peers + 4) * threads) but the \
             limit cannot be raised; continuing with {reduced} peers per thread"
        );
        return reduced;
    }
    peers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_counts_poller_and_stdio() {
        assert_eq!(required_fds(1, 1), 5);
        assert_eq!(required_fds(100, 4), 416);
    }

    #[test]
    fn reduction_inverts_requirement() {
        // Whatever fits must satisfy its own requirement again.
        for workers in 1..8 {
            for available in [8u64, 64, 1024, 4096] {
                let peers = reduced_peers(available, workers);
                assert!(required_fds(peers, workers) <= available.max(4 * workers as u64));
            }
        }
    }

    #[test]
    fn reduction_bottoms_out_at_zero() {
        assert_eq!(reduced_peers(4, 1), 0);
        assert_eq!(reduced_peers(0, 8), 0);
    }
}
