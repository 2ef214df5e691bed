/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::process::ExitCode;

use clap::Command;
use tracing_subscriber::EnvFilter;

fn init_tracing(debug: bool) {
    let default_filter = if debug { "hsbench=debug" } else { "hsbench=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn build_cli_args() -> Command {
    hsbench::add_args(
        Command::new("hsbench")
            .about("TLS handshake benchmarking tool")
            .after_help("127.0.0.1:443 is targeted by default."),
    )
}

fn main() -> ExitCode {
    openssl::init();

    // Usage errors exit with code 2 through clap itself.
    let args = build_cli_args().get_matches();
    let mut config = match hsbench::parse_args(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ERROR: {e}");
            return ExitCode::from(2);
        }
    };

    init_tracing(config.debug);
    config.summary();

    config.peers_per_worker =
        hsbench::limits::adjust_open_file_limit(config.peers_per_worker, config.workers);
    if config.peers_per_worker == 0 {
        eprintln!("ERROR: cannot run with no peers");
        return ExitCode::from(3);
    }

    match hsbench::run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {e:?}");
            ExitCode::FAILURE
        }
    }
}
