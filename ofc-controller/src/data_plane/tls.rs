/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! rustls acceptor for secured listeners.

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;

use crate::config::ListenerConfig;
use crate::error::TlsSetupError;

/// Builds the acceptor from the listener's `key`/`cert` and optional `ca`.
///
/// With a `ca` bundle, peers must present a certificate signed by it.
pub(crate) fn build_acceptor(config: &ListenerConfig) -> Result<TlsAcceptor, TlsSetupError> {
    let (Some(key_path), Some(cert_path)) = (config.key.as_deref(), config.cert.as_deref()) else {
        return Err(TlsSetupError::MissingCredentials);
    };

    let certs = load_certs(cert_path)?;
    let key = load_key(key_path)?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ServerConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()?;

    let server_config = match config.ca.as_deref() {
        Some(ca_path) => {
            let mut roots = RootCertStore::empty();
            for cert in load_certs(ca_path)? {
                roots.add(cert)?;
            }
            let verifier =
                WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider).build()?;
            builder
                .with_client_cert_verifier(verifier)
                .with_single_cert(certs, key)?
        }
        None => builder.with_no_client_auth().with_single_cert(certs, key)?,
    };

    Ok(TlsAcceptor::from(Arc::new(server_config)))
}

fn open(path: &Path) -> Result<BufReader<File>, TlsSetupError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| TlsSetupError::Read {
            path: path.to_path_buf(),
            source,
        })
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsSetupError> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsSetupError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    if certs.is_empty() {
        return Err(TlsSetupError::NoCertificates {
            path: path.to_path_buf(),
        });
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsSetupError> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| TlsSetupError::Read {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| TlsSetupError::NoPrivateKey {
            path: path.to_path_buf(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secured_listener_needs_key_and_cert() {
        let config = ListenerConfig {
            cert: Some("cert.pem".into()),
            ..ListenerConfig::plaintext("127.0.0.1", 6653)
        };
        assert!(matches!(
            build_acceptor(&config),
            Err(TlsSetupError::MissingCredentials)
        ));
    }

    #[test]
    fn unreadable_certificate_names_the_path() {
        let config = ListenerConfig::secured(
            "127.0.0.1",
            6653,
            "/nonexistent/key.pem",
            "/nonexistent/cert.pem",
        );
        match build_acceptor(&config) {
            Err(TlsSetupError::Read { path, .. }) => {
                assert_eq!(path, Path::new("/nonexistent/cert.pem"))
            }
            Err(other) => panic!("expected read error, got {other:?}"),
            Ok(_) => panic!("acceptor built from missing files"),
        }
    }
}
