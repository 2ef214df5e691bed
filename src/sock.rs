/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use mio::net::TcpStream;
use socket2::{Domain, Protocol, SockAddr, SockRef, Socket, Type};

pub(crate) enum ConnectStart {
    /// The connect completed within the call (common on loopback).
    Established(TcpStream),
    /// The connect is in flight; wait for writability.
    Pending(TcpStream),
    /// The connect was rejected outright (e.g. unreachable network).
    Failed(io::Error),
}

/// Build a non-blocking stream socket and issue a connect to `addr`.
///
/// An `Err` here means the socket itself could not be created, which is a
/// setup failure; connect-level rejections come back as `ConnectStart::Failed`
/// so the caller can apply its per-connection error policy.
pub(crate) fn start_connect(addr: SocketAddr) -> io::Result<ConnectStart> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_nonblocking(true)?;

    match socket.connect(&SockAddr::from(addr)) {
        Ok(()) => Ok(ConnectStart::Established(into_mio(socket))),
        Err(e)
            if e.raw_os_error() == Some(libc::EINPROGRESS)
                || e.kind() == io::ErrorKind::WouldBlock =>
        {
            Ok(ConnectStart::Pending(into_mio(socket)))
        }
        Err(e) => Ok(ConnectStart::Failed(e)),
    }
}

fn into_mio(socket: Socket) -> TcpStream {
    TcpStream::from_std(socket.into())
}

/// Arm zero-timeout linger so the following close sends an immediate reset
/// instead of parking the socket in TIME-WAIT.
pub(crate) fn set_quick_close(stream: &TcpStream) {
    let _ = SockRef::from(stream).set_linger(Some(Duration::ZERO));
}
