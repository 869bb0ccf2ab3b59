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

//! Error types shared across layers.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::data_plane::Owner;
use crate::identity::{ConnectionId, DatapathId, SessionId, TransportKind};
use crate::observability::fields;
use crate::wire::EncodeError;

/// Why one configured listener could not start.
#[derive(Debug, Error)]
pub enum BindFailure {
    #[error("no address or port specified")]
    MissingEndpoint,
    #[error("bind failed: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Tls(#[from] TlsSetupError),
}

/// One entry of the aggregate returned by `Controller::start`.
#[derive(Debug, Error)]
#[error(
    "listener {} ({transport}) failed to start: {source}",
    fields::format_endpoint(address.as_deref(), *port)
)]
pub struct ListenerStartError {
    pub address: Option<String>,
    pub port: Option<u16>,
    pub transport: TransportKind,
    pub source: BindFailure,
}

#[derive(Debug, Error)]
pub enum TlsSetupError {
    #[error("secured listener requires both key and cert")]
    MissingCredentials,
    #[error("unable to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("no certificate found in {}", path.display())]
    NoCertificates { path: PathBuf },
    #[error("no private key found in {}", path.display())]
    NoPrivateKey { path: PathBuf },
    #[error("invalid TLS configuration: {0}")]
    Rustls(#[from] rustls::Error),
    #[error("invalid client verifier: {0}")]
    Verifier(#[from] rustls::server::VerifierBuilderError),
}

/// Outcome of a failed `Session::send`. Never fatal.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("unable to encode message: {0}")]
    Encode(#[from] EncodeError),
    #[error("{0} is closed")]
    ConnectionClosed(ConnectionId),
}

/// Outcome of a failed application command on a switch.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("switch {dpid} owns no session {session_id}")]
    UnknownSession {
        dpid: DatapathId,
        session_id: SessionId,
    },
    #[error(transparent)]
    Send(#[from] SendError),
}

/// Violations of single ownership over a connection slot.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OwnershipError {
    #[error("{0} is not in the connection table")]
    UnknownConnection(ConnectionId),
    #[error("{conn} is already wired to {owner}")]
    AlreadyWired { conn: ConnectionId, owner: Owner },
    #[error("{conn} is not owned by {claimed}")]
    NotOwner { conn: ConnectionId, claimed: Owner },
}
