/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use mio::net::TcpStream;
use mio::{Events, Interest, Poll, Token};

const EVENTS_N: usize = 128;
const WAIT_TIMEOUT: Duration = Duration::from_millis(5);

/// Per-worker readiness multiplexer.
///
/// Ready peers are addressed by their index in the worker's peer table, which
/// doubles as the registration token. The reconnect queue collects peers whose
/// connection was torn down during event dispatch; `swap_backlog` moves it
/// aside so a peer finishing a handshake while the backlog drains is not
/// redriven in the same iteration.
pub(crate) struct Poller {
    poll: Poll,
    events: Events,
    ready: Vec<usize>,
    reconnect_q: VecDeque<usize>,
    backlog: VecDeque<usize>,
}

impl Poller {
    pub(crate) fn new() -> io::Result<Self> {
        Ok(Poller {
            poll: Poll::new()?,
            events: Events::with_capacity(EVENTS_N),
            ready: Vec::with_capacity(EVENTS_N),
            reconnect_q: VecDeque::new(),
            backlog: VecDeque::new(),
        })
    }

    pub(crate) fn add(&self, id: usize, stream: &mut TcpStream) -> io::Result<()> {
        self.poll
            .registry()
            .register(stream, Token(id), Interest::READABLE | Interest::WRITABLE)
    }

    pub(crate) fn del(&self, stream: &mut TcpStream) -> io::Result<()> {
        self.poll.registry().deregister(stream)
    }

    pub(crate) fn queue_reconnect(&mut self, id: usize) {
        self.reconnect_q.push_back(id);
    }

    /// Block for readiness up to the short poll timeout, retrying if a signal
    /// interrupts the wait.
    pub(crate) fn wait(&mut self) -> io::Result<()> {
        loop {
            match self.poll.poll(&mut self.events, Some(WAIT_TIMEOUT)) {
                Ok(()) => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        self.ready.clear();
        for ev in self.events.iter() {
            self.ready.push(ev.token().0);
        }
        Ok(())
    }

    pub(crate) fn next_ready(&mut self) -> Option<usize> {
        self.ready.pop()
    }

    pub(crate) fn swap_backlog(&mut self) {
        std::mem::swap(&mut self.backlog, &mut self.reconnect_q);
    }

    pub(crate) fn next_backlog(&mut self) -> Option<usize> {
        self.backlog.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sock::{self, ConnectStart};
    use std::net::TcpListener;

    #[test]
    fn backlog_swap_keeps_queues_separate() {
        let mut io = Poller::new().unwrap();
        io.queue_reconnect(1);
        io.queue_reconnect(2);
        assert!(io.next_backlog().is_none());

        io.swap_backlog();
        assert_eq!(io.next_backlog(), Some(1));
        // Requeued during the drain: lands in the reconnect queue, not the
        // backlog being drained.
        io.queue_reconnect(3);
        assert_eq!(io.next_backlog(), Some(2));
        assert!(io.next_backlog().is_none());

        io.swap_backlog();
        assert_eq!(io.next_backlog(), Some(3));
    }

    #[test]
    fn leftover_backlog_survives_swap() {
        let mut io = Poller::new().unwrap();
        io.queue_reconnect(7);
        io.swap_backlog();
        // Drain interrupted; next swap returns the leftover to the reconnect
        // side and it comes back on the swap after that.
        io.swap_backlog();
        assert!(io.next_backlog().is_none());
        io.swap_backlog();
        assert_eq!(io.next_backlog(), Some(7));
    }

    #[test]
    fn wait_reports_connect_readiness() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let mut io = Poller::new().unwrap();
        let mut stream = match sock::start_connect(addr).unwrap() {
            ConnectStart::Established(s) | ConnectStart::Pending(s) => s,
            ConnectStart::Failed(e) => panic!("connect failed: {e}"),
        };
        io.add(42, &mut stream).unwrap();

        let mut seen = None;
        for _ in 0..200 {
            io.wait().unwrap();
            if let Some(id) = io.next_ready() {
                seen = Some(id);
                break;
            }
        }
        assert_eq!(seen, Some(42));
        io.del(&mut stream).unwrap();
    }
}
