/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::net::SocketAddr;
use std::time::Instant;

use mio::net::TcpStream;
use openssl::ssl::{ErrorCode, Ssl, SslContext, SslStream};
use tracing::{debug, error};

use crate::error::WorkerError;
use crate::poller::Poller;
use crate::sock::{self, ConnectStart};
use crate::stats::{LatencyStat, RuntimeStats};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PeerState {
    TcpConnect,
    TcpConnecting,
    TlsHandshaking,
}

/// One logical client cycling through connect, handshake, teardown and
/// reconnect. The id is the peer's slot in the worker table and its poller
/// registration token.
pub(crate) struct Peer {
    id: usize,
    addr: SocketAddr,
    state: PeerState,
    sock: Option<TcpStream>,
    tls: Option<SslStream<TcpStream>>,
    registered: bool,
}

impl Peer {
    pub(crate) fn new(id: usize, addr: SocketAddr) -> Self {
        debug!("peer {id} created");
        Peer {
            id,
            addr,
            state: PeerState::TcpConnect,
            sock: None,
            tls: None,
            registered: false,
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> PeerState {
        self.state
    }

    #[cfg(test)]
    pub(crate) fn is_disarmed(&self) -> bool {
        self.sock.is_none() && self.tls.is_none() && !self.registered
    }

    /// Drive the state machine one step. Returns true when this call carried
    /// a handshake to completion, which is what feeds the slow-start budget.
    pub(crate) fn advance(
        &mut self,
        io: &mut Poller,
        tls_ctx: &SslContext,
        stats: &RuntimeStats,
        sampler: &mut LatencyStat,
    ) -> Result<bool, WorkerError> {
        match self.state {
            PeerState::TcpConnect => self.tcp_connect(io, tls_ctx, stats, sampler),
            PeerState::TcpConnecting => self.tcp_connect_try_finish(io, tls_ctx, stats, sampler),
            PeerState::TlsHandshaking => self.tls_handshake(io, tls_ctx, stats, sampler),
        }
    }

    fn tcp_connect(
        &mut self,
        io: &mut Poller,
        tls_ctx: &SslContext,
        stats: &RuntimeStats,
        sampler: &mut LatencyStat,
    ) -> Result<bool, WorkerError> {
        let start = sock::start_connect(self.addr).map_err(WorkerError::Socket)?;
        stats.add_tcp_handshake();
        self.state = PeerState::TcpConnecting;

        match start {
            ConnectStart::Established(stream) => {
                self.sock = Some(stream);
                self.tcp_established(io, tls_ctx, stats, sampler)
            }
            ConnectStart::Pending(stream) => {
                self.sock = Some(stream);
                self.register(io)?;
                Ok(false)
            }
            ConnectStart::Failed(e) => self.tcp_connect_failed(io, stats, e),
        }
    }

    fn tcp_connect_try_finish(
        &mut self,
        io: &mut Poller,
        tls_ctx: &SslContext,
        stats: &RuntimeStats,
        sampler: &mut LatencyStat,
    ) -> Result<bool, WorkerError> {
        let err = match self.sock.as_ref() {
            Some(s) => s.take_error().map_err(WorkerError::Socket)?,
            None => return Ok(false),
        };
        match err {
            None => self.tcp_established(io, tls_ctx, stats, sampler),
            Some(e)
                if e.raw_os_error() == Some(libc::EINPROGRESS)
                    || e.kind() == io::ErrorKind::WouldBlock =>
            {
                // Still connecting, keep polling.
                Ok(false)
            }
            Some(e) => self.tcp_connect_failed(io, stats, e),
        }
    }

    fn tcp_established(
        &mut self,
        io: &mut Poller,
        tls_ctx: &SslContext,
        stats: &RuntimeStats,
        sampler: &mut LatencyStat,
    ) -> Result<bool, WorkerError> {
        debug!("peer {} established TCP connection", self.id);
        stats.del_tcp_handshake();
        stats.add_tcp_connection();
        self.tls_handshake(io, tls_ctx, stats, sampler)
    }

    fn tcp_connect_failed(
        &mut self,
        io: &mut Poller,
        stats: &RuntimeStats,
        e: io::Error,
    ) -> Result<bool, WorkerError> {
        // Failing before a single TCP connection ever succeeded means the
        // endpoint is down or unroutable; give up instead of spinning.
        if stats.tcp_connections() == 0 {
            return Err(WorkerError::TcpColdStart(e));
        }
        debug!("peer {}: connect failed: {e}", self.id);
        stats.del_tcp_handshake();
        self.disconnect(io);
        Ok(false)
    }

    fn tls_handshake(
        &mut self,
        io: &mut Poller,
        tls_ctx: &SslContext,
        stats: &RuntimeStats,
        sampler: &mut LatencyStat,
    ) -> Result<bool, WorkerError> {
        self.state = PeerState::TlsHandshaking;

        let t0 = Instant::now();
        let fresh = self.tls.is_none();
        if fresh {
            if let Some(sock) = self.sock.take() {
                let ssl = Ssl::new(tls_ctx)?;
                self.tls = Some(SslStream::new(ssl, sock)?);
                stats.add_tls_handshake();
            }
        }

        let outcome = match self.tls.as_mut() {
            Some(tls) => tls.connect(),
            None => return Ok(false),
        };

        match outcome {
            Ok(()) => {
                // Only handshakes that never suspended are sampled: the call
                // entry-to-completion time of a resumed handshake covers just
                // its final step and would skew the distribution low.
                if fresh {
                    sampler.update(t0.elapsed().as_micros() as u64);
                }
                debug!("peer {} completed TLS handshake", self.id);
                stats.del_tls_handshake();
                stats.add_tls_connection();
                self.disconnect(io);
                stats.del_tcp_connection();
                io.queue_reconnect(self.id);
                Ok(true)
            }
            Err(e) => match e.code() {
                ErrorCode::WANT_READ | ErrorCode::WANT_WRITE => {
                    self.register(io)?;
                    Ok(false)
                }
                _ => {
                    if stats.tot_tls_handshakes() == 0 {
                        return Err(WorkerError::TlsColdStart(e));
                    }
                    debug!("peer {}: TLS handshake failed: {e}", self.id);
                    stats.del_tls_handshake();
                    stats.add_error();
                    self.disconnect(io);
                    stats.del_tcp_connection();
                    Ok(false)
                }
            },
        }
    }

    fn register(&mut self, io: &mut Poller) -> Result<(), WorkerError> {
        if self.registered {
            return Ok(());
        }
        let id = self.id;
        if let Some(stream) = self.socket_mut() {
            io.add(id, stream).map_err(WorkerError::Poller)?;
            self.registered = true;
        }
        Ok(())
    }

    fn socket_mut(&mut self) -> Option<&mut TcpStream> {
        if let Some(s) = self.sock.as_mut() {
            return Some(s);
        }
        self.tls.as_mut().map(|t| t.get_mut())
    }

    /// Tear the connection down without any TLS-level goodbye: the session is
    /// freed unshutdown (so nothing lands in a session cache) and the socket
    /// closes with zero linger. The peer is back at TCP-CONNECT afterwards.
    pub(crate) fn disconnect(&mut self, io: &mut Poller) {
        if self.registered {
            if let Some(stream) = self.socket_mut() {
                if let Err(e) = io.del(stream) {
                    error!("peer {}: failed to deregister socket: {e}", self.id);
                }
            }
            self.registered = false;
        }
        if let Some(tls) = self.tls.take() {
            sock::set_quick_close(tls.get_ref());
        }
        if let Some(sock) = self.sock.take() {
            sock::set_quick_close(&sock);
        }
        self.state = PeerState::TcpConnect;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opts::BenchConfig;
    use crate::tls::build_client_context;
    use std::net::TcpListener;

    fn test_ctx() -> SslContext {
        build_client_context(&BenchConfig::default()).unwrap()
    }

    fn drive_until<F: Fn(&Peer) -> bool>(
        peer: &mut Peer,
        io: &mut Poller,
        ctx: &SslContext,
        stats: &RuntimeStats,
        sampler: &mut LatencyStat,
        stop: F,
    ) -> Result<(), WorkerError> {
        peer.advance(io, ctx, stats, sampler)?;
        for _ in 0..400 {
            if stop(peer) {
                return Ok(());
            }
            io.wait().map_err(WorkerError::Poller)?;
            while let Some(id) = io.next_ready() {
                assert_eq!(id, 0);
                peer.advance(io, ctx, stats, sampler)?;
            }
        }
        panic!("peer did not reach the expected state");
    }

    #[test]
    fn refused_endpoint_is_cold_start_fatal() {
        // Bind then drop to learn a port nothing listens on.
        let addr = {
            let l = TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap()
        };
        let ctx = test_ctx();
        let stats = RuntimeStats::default();
        let mut sampler = LatencyStat::default();
        let mut io = Poller::new().unwrap();
        let mut peer = Peer::new(0, addr);

        let res = drive_until(&mut peer, &mut io, &ctx, &stats, &mut sampler, |_| false);
        match res {
            Err(WorkerError::TcpColdStart(_)) => {}
            other => panic!("expected TCP cold-start failure, got {other:?}"),
        }
    }

    #[test]
    fn tcp_established_enters_tls_handshake() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let ctx = test_ctx();
        let stats = RuntimeStats::default();
        let mut sampler = LatencyStat::default();
        let mut io = Poller::new().unwrap();
        let mut peer = Peer::new(0, addr);

        // A plain TCP listener never answers the ClientHello, so the peer
        // parks in TLS-HANDSHAKING waiting for read.
        drive_until(&mut peer, &mut io, &ctx, &stats, &mut sampler, |p| {
            p.state() == PeerState::TlsHandshaking
        })
        .unwrap();

        assert_eq!(stats.tcp_connections(), 1);
        assert_eq!(stats.tls_handshakes(), 1);
        assert_eq!(stats.tcp_handshakes(), 0);

        peer.disconnect(&mut io);
        assert_eq!(peer.state(), PeerState::TcpConnect);
        assert!(peer.is_disarmed());
    }
}
