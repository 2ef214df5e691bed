/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use openssl::error::ErrorStack;
use openssl::ssl::{SslContext, SslMethod, SslOptions, SslVersion};

use crate::opts::{BenchConfig, TlsVersionPick};

/// Build the reusable client context for one worker: protocol pinned to the
/// requested version(s), session tickets off unless asked for, and the cipher
/// restriction applied through the knob matching the protocol generation.
pub(crate) fn build_client_context(config: &BenchConfig) -> Result<SslContext, ErrorStack> {
    let mut builder = SslContext::builder(SslMethod::tls_client())?;

    match config.tls_version {
        TlsVersionPick::Tls12 => {
            builder.set_min_proto_version(Some(SslVersion::TLS1_2))?;
            builder.set_max_proto_version(Some(SslVersion::TLS1_2))?;
        }
        TlsVersionPick::Tls13 => {
            builder.set_min_proto_version(Some(SslVersion::TLS1_3))?;
            builder.set_max_proto_version(Some(SslVersion::TLS1_3))?;
        }
        TlsVersionPick::Any => {
            builder.set_min_proto_version(Some(SslVersion::TLS1_2))?;
            builder.set_max_proto_version(Some(SslVersion::TLS1_3))?;
        }
    }

    if !config.use_tickets {
        builder.set_options(SslOptions::NO_TICKET);
    }

    if let Some(cipher) = &config.cipher {
        match config.tls_version {
            TlsVersionPick::Tls13 => builder.set_ciphersuites(cipher)?,
            TlsVersionPick::Tls12 => builder.set_cipher_list(cipher)?,
            // With both generations allowed there is no single knob; leave
            // the library defaults in place.
            TlsVersionPick::Any => {}
        }
    }

    Ok(builder.build())
}
