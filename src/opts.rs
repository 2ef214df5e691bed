/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use anyhow::anyhow;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};

const ARG_IP: &str = "ip";
const ARG_PORT: &str = "port";
const ARG_PEERS: &str = "peers";
const ARG_THREADS: &str = "threads";
const ARG_HANDSHAKES: &str = "handshakes";
const ARG_DURATION: &str = "to";
const ARG_CIPHER: &str = "cipher";
const ARG_TLS_VERSION: &str = "tls";
const ARG_USE_TICKETS: &str = "use-tickets";
const ARG_DEBUG: &str = "debug";

pub const DEFAULT_CIPHER_TLS12: &str = "ECDHE-ECDSA-AES128-GCM-SHA256";
pub const DEFAULT_CIPHER_TLS13: &str = "TLS_AES_256_GCM_SHA384";

const MAX_THREADS: usize = 512;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TlsVersionPick {
    Tls12,
    Tls13,
    Any,
}

impl fmt::Display for TlsVersionPick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TlsVersionPick::Tls12 => f.write_str("1.2"),
            TlsVersionPick::Tls13 => f.write_str("1.3"),
            TlsVersionPick::Any => f.write_str("any of 1.2 or 1.3"),
        }
    }
}

/// The run configuration. Read-only once parsing is done; every worker gets a
/// shared reference.
pub struct BenchConfig {
    pub target: SocketAddr,
    pub peers_per_worker: usize,
    pub workers: usize,
    pub handshake_cap: u64,
    pub time_limit: Option<Duration>,
    pub tls_version: TlsVersionPick,
    pub cipher: Option<String>,
    pub use_tickets: bool,
    pub debug: bool,
}

impl Default for BenchConfig {
    fn default() -> Self {
        BenchConfig {
            target: SocketAddr::from(([127, 0, 0, 1], 443)),
            peers_per_worker: 1,
            workers: 1,
            handshake_cap: u64::MAX,
            time_limit: None,
            tls_version: TlsVersionPick::Tls12,
            cipher: Some(DEFAULT_CIPHER_TLS12.to_string()),
            use_tickets: false,
            debug: false,
        }
    }
}

impl BenchConfig {
    pub fn summary(&self) {
        println!("Running TLS handshake benchmark with the following settings:");
        println!("Host:        {}", self.target);
        println!("TLS version: {}", self.tls_version);
        println!(
            "Cipher:      {}",
            self.cipher.as_deref().unwrap_or("no restriction")
        );
        println!(
            "TLS tickets: {}",
            if self.use_tickets { "on" } else { "off" }
        );
        match self.time_limit {
            Some(d) => println!("Duration:    {}s", d.as_secs()),
            None => println!("Duration:    until the handshake cap or a signal"),
        }
        println!();
    }
}

pub fn add_args(app: Command) -> Command {
    app.arg(
        Arg::new(ARG_IP)
            .help("Target ip address (IPv4 or IPv6 literal)")
            .value_name("IP")
            .num_args(1)
            .requires(ARG_PORT),
    )
    .arg(
        Arg::new(ARG_PORT)
            .help("Target port")
            .value_name("PORT")
            .num_args(1)
            .value_parser(value_parser!(u16)),
    )
    .arg(
        Arg::new(ARG_PEERS)
            .help("Limit of parallel connections for each thread")
            .value_name("N")
            .short('l')
            .num_args(1)
            .value_parser(value_parser!(usize))
            .default_value("1"),
    )
    .arg(
        Arg::new(ARG_THREADS)
            .help("Number of worker threads")
            .value_name("N")
            .short('t')
            .num_args(1)
            .value_parser(value_parser!(usize))
            .default_value("1"),
    )
    .arg(
        Arg::new(ARG_HANDSHAKES)
            .help("Total number of handshakes to establish")
            .value_name("N")
            .short('n')
            .num_args(1)
            .value_parser(value_parser!(u64)),
    )
    .arg(
        Arg::new(ARG_DURATION)
            .help("Duration of the test, in seconds")
            .value_name("SECONDS")
            .short('T')
            .long(ARG_DURATION)
            .num_args(1)
            .value_parser(value_parser!(u64)),
    )
    .arg(
        Arg::new(ARG_CIPHER)
            .help("Force cipher choice; 'any' lifts the restriction")
            .value_name("CIPHER")
            .short('c')
            .num_args(1),
    )
    .arg(
        Arg::new(ARG_TLS_VERSION)
            .help("TLS version for the handshake: '1.2', '1.3' or 'any' for both")
            .value_name("VERSION")
            .long(ARG_TLS_VERSION)
            .num_args(1)
            .default_value("1.2"),
    )
    .arg(
        Arg::new(ARG_USE_TICKETS)
            .help("Enable TLS session tickets")
            .long(ARG_USE_TICKETS)
            .action(ArgAction::SetTrue),
    )
    .arg(
        Arg::new(ARG_DEBUG)
            .help("Verbose per-peer logging")
            .short('d')
            .long(ARG_DEBUG)
            .action(ArgAction::SetTrue),
    )
}

pub fn parse_args(args: &ArgMatches) -> anyhow::Result<BenchConfig> {
    let mut config = BenchConfig::default();

    if let Some(ip) = args.get_one::<String>(ARG_IP) {
        let ip = IpAddr::from_str(ip).map_err(|_| anyhow!("invalid ip address '{ip}'"))?;
        let port = args.get_one::<u16>(ARG_PORT).copied().unwrap_or(443);
        config.target = SocketAddr::new(ip, port);
    }

    if let Some(n) = args.get_one::<usize>(ARG_PEERS) {
        config.peers_per_worker = *n;
    }
    if let Some(n) = args.get_one::<usize>(ARG_THREADS) {
        if *n > MAX_THREADS {
            return Err(anyhow!("too many threads requested, the limit is {MAX_THREADS}"));
        }
        config.workers = *n;
    }
    if let Some(n) = args.get_one::<u64>(ARG_HANDSHAKES) {
        config.handshake_cap = *n;
    }
    if let Some(n) = args.get_one::<u64>(ARG_DURATION) {
        if *n > 0 {
            config.time_limit = Some(Duration::from_secs(*n));
        }
    }

    if let Some(v) = args.get_one::<String>(ARG_TLS_VERSION) {
        config.tls_version = match v.as_str() {
            "1.2" => TlsVersionPick::Tls12,
            "1.3" => TlsVersionPick::Tls13,
            "any" => TlsVersionPick::Any,
            other => {
                eprintln!("unknown TLS version '{other}', falling back to 1.2");
                TlsVersionPick::Tls12
            }
        };
    }

    config.cipher = match args.get_one::<String>(ARG_CIPHER) {
        Some(s) if s == "any" => None,
        Some(s) => Some(s.clone()),
        None => match config.tls_version {
            TlsVersionPick::Tls13 => Some(DEFAULT_CIPHER_TLS13.to_string()),
            _ => Some(DEFAULT_CIPHER_TLS12.to_string()),
        },
    };

    config.use_tickets = args.get_flag(ARG_USE_TICKETS);
    config.debug = args.get_flag(ARG_DEBUG);

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> anyhow::Result<BenchConfig> {
        let mut full = vec!["hsbench"];
        full.extend_from_slice(argv);
        let matches = add_args(Command::new("hsbench"))
            .try_get_matches_from(full)
            .unwrap();
        parse_args(&matches)
    }

    #[test]
    fn defaults() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.target, SocketAddr::from(([127, 0, 0, 1], 443)));
        assert_eq!(config.peers_per_worker, 1);
        assert_eq!(config.workers, 1);
        assert_eq!(config.handshake_cap, u64::MAX);
        assert!(config.time_limit.is_none());
        assert_eq!(config.tls_version, TlsVersionPick::Tls12);
        assert_eq!(config.cipher.as_deref(), Some(DEFAULT_CIPHER_TLS12));
        assert!(!config.use_tickets);
    }

    #[test]
    fn explicit_target_v4_and_v6() {
        let config = parse(&["192.0.2.7", "8443"]).unwrap();
        assert_eq!(config.target.to_string(), "192.0.2.7:8443");

        let config = parse(&["::1", "8443"]).unwrap();
        assert_eq!(config.target.to_string(), "[::1]:8443");
    }

    #[test]
    fn bad_address_rejected() {
        assert!(parse(&["not-an-ip", "443"]).is_err());
    }

    #[test]
    fn tls13_switches_default_cipher() {
        let config = parse(&["--tls", "1.3"]).unwrap();
        assert_eq!(config.tls_version, TlsVersionPick::Tls13);
        assert_eq!(config.cipher.as_deref(), Some(DEFAULT_CIPHER_TLS13));
    }

    #[test]
    fn cipher_any_lifts_restriction() {
        let config = parse(&["-c", "any"]).unwrap();
        assert!(config.cipher.is_none());
    }

    #[test]
    fn unknown_tls_version_falls_back() {
        let config = parse(&["--tls", "1.1"]).unwrap();
        assert_eq!(config.tls_version, TlsVersionPick::Tls12);
    }

    #[test]
    fn thread_limit_enforced() {
        assert!(parse(&["-t", "512"]).is_ok());
        assert!(parse(&["-t", "513"]).is_err());
    }

    #[test]
    fn caps_and_duration() {
        let config = parse(&["-n", "1000", "-T", "3", "-l", "100", "-t", "4"]).unwrap();
        assert_eq!(config.handshake_cap, 1000);
        assert_eq!(config.time_limit, Some(Duration::from_secs(3)));
        assert_eq!(config.peers_per_worker, 100);
        assert_eq!(config.workers, 4);
    }
}
