/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

mod driver;
mod peer;
mod poller;
mod report;
mod sock;
mod tls;

pub mod error;
pub mod limits;
pub mod opts;
pub mod stats;
pub mod worker;

pub use driver::run;
pub use opts::{add_args, parse_args, BenchConfig, TlsVersionPick};
