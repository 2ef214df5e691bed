/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

mod latency;
mod runtime;

pub use latency::{LatencySketch, LatencyStat};
pub use runtime::RuntimeStats;
