/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;

use thiserror::Error;

/// Failures that unwind out of a worker loop and terminate the benchmark.
/// Per-connection failures are absorbed inside the peer state machine and
/// never surface here.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("failed to set up TLS client context: {0}")]
    TlsSetup(#[from] openssl::error::ErrorStack),
    #[error("poller failure: {0}")]
    Poller(#[source] io::Error),
    #[error("socket failure: {0}")]
    Socket(#[source] io::Error),
    #[error("cannot establish even one TCP connection: {0}")]
    TcpColdStart(#[source] io::Error),
    #[error("cannot establish even one TLS connection: {0}")]
    TlsColdStart(#[source] openssl::ssl::Error),
}
