/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Shared handshake counters, mutated from every worker on every state
/// transition. Alignment keeps the block on its own cache lines so the hot
/// relaxed updates do not false-share with neighboring scalars.
#[derive(Default)]
#[repr(align(128))]
pub struct RuntimeStats {
    tot_tls_handshakes: AtomicU64,
    tcp_handshakes: AtomicI64,
    tcp_connections: AtomicI64,
    tls_handshakes: AtomicI64,
    tls_connections: AtomicI64,
    error_count: AtomicU64,
}

impl RuntimeStats {
    pub fn add_tcp_handshake(&self) {
        self.tcp_handshakes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn del_tcp_handshake(&self) {
        self.tcp_handshakes.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn add_tcp_connection(&self) {
        self.tcp_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn del_tcp_connection(&self) {
        self.tcp_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn add_tls_handshake(&self) {
        self.tls_handshakes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn del_tls_handshake(&self) {
        self.tls_handshakes.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn add_tls_connection(&self) {
        self.tls_connections.fetch_add(1, Ordering::Relaxed);
        self.tot_tls_handshakes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tcp_handshakes(&self) -> i64 {
        self.tcp_handshakes.load(Ordering::Relaxed)
    }

    pub fn tcp_connections(&self) -> i64 {
        self.tcp_connections.load(Ordering::Relaxed)
    }

    pub fn tls_handshakes(&self) -> i64 {
        self.tls_handshakes.load(Ordering::Relaxed)
    }

    pub fn tot_tls_handshakes(&self) -> u64 {
        self.tot_tls_handshakes.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Take the completions recorded since the last call. Completions landing
    /// between the load and the subtract are credited to the next window.
    pub fn pull_window_tls_connections(&self) -> i64 {
        let v = self.tls_connections.load(Ordering::Relaxed);
        self.tls_connections.fetch_sub(v, Ordering::Relaxed);
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_flight_counters() {
        let stats = RuntimeStats::default();
        stats.add_tcp_handshake();
        stats.add_tcp_handshake();
        stats.del_tcp_handshake();
        assert_eq!(stats.tcp_handshakes(), 1);

        stats.add_tcp_connection();
        assert_eq!(stats.tcp_connections(), 1);
        stats.del_tcp_connection();
        assert_eq!(stats.tcp_connections(), 0);
    }

    #[test]
    fn completion_bumps_window_and_total() {
        let stats = RuntimeStats::default();
        for _ in 0..5 {
            stats.add_tls_connection();
        }
        assert_eq!(stats.tot_tls_handshakes(), 5);
        assert_eq!(stats.pull_window_tls_connections(), 5);
        // The window is consumed, the monotonic total is not.
        assert_eq!(stats.pull_window_tls_connections(), 0);
        assert_eq!(stats.tot_tls_handshakes(), 5);
    }

    #[test]
    fn window_pulls_conserve_total() {
        let stats = RuntimeStats::default();
        let mut pulled = 0;
        for round in 1..=4 {
            for _ in 0..round {
                stats.add_tls_connection();
            }
            pulled += stats.pull_window_tls_connections();
        }
        assert_eq!(pulled as u64, stats.tot_tls_handshakes());
    }
}
