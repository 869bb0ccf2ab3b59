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

//! Data-plane layer.
//!
//! Owns raw connections from accept to close. Transport I/O runs in spawned
//! reader/writer tasks that report [`ConnectionEvent`]s to the control loop;
//! everything else here lives inside that loop. The [`ConnectionTable`] is the
//! single arena of connection resources and records which component is
//! currently wired to each one, so a hand-off is a move between owners rather
//! than shared access.

mod connection_io;
mod connection_table;
mod listener;
mod session;
mod tls;

pub(crate) use connection_io::{accept_loop, EventSink};
pub(crate) use connection_table::ConnectionTable;
pub(crate) use listener::Listener;
pub use session::{SendReceipt, Session, SessionSnapshot, SessionState};
pub(crate) use tls::build_acceptor;

use bytes::Bytes;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use tokio::sync::{mpsc, watch};

use crate::bus::Bus;
use crate::identity::{ConnectionId, DatapathId, ListenerId, TransportKind};

/// Addresses and transport of one accepted connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub remote_addr: SocketAddr,
    pub local_addr: SocketAddr,
    pub transport: TransportKind,
}

/// The component currently processing a connection's events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Owner {
    Listener(ListenerId),
    Switch(DatapathId),
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::Listener(id) => write!(f, "{id}"),
            Owner::Switch(dpid) => write!(f, "switch {dpid}"),
        }
    }
}

/// Control-loop side of a freshly accepted connection.
#[derive(Debug)]
pub(crate) struct AcceptedConnection {
    pub(crate) id: ConnectionId,
    pub(crate) info: ConnectionInfo,
    pub(crate) outbound: mpsc::UnboundedSender<Bytes>,
    /// `true` pauses the reader task.
    pub(crate) flow: watch::Sender<bool>,
}

/// What the I/O tasks report to the control loop.
#[derive(Debug)]
pub(crate) enum ConnectionEvent {
    Accepted {
        listener: ListenerId,
        connection: AcceptedConnection,
    },
    Data {
        conn: ConnectionId,
        chunk: Bytes,
    },
    FlowChanged {
        conn: ConnectionId,
        paused: bool,
    },
    Closed {
        conn: ConnectionId,
    },
    Failed {
        conn: ConnectionId,
        error: io::Error,
    },
}

/// Transport-level callbacks of whichever component owns a connection.
///
/// `on_data` is called after the chunk has been pushed into the connection's
/// frame reconstructor; the owner pulls complete messages from the table.
pub(crate) trait ConnectionEvents {
    fn on_data(&self, bus: &Bus, conn: ConnectionId);
    fn on_close(&self, bus: &Bus, conn: ConnectionId);
    fn on_error(&self, bus: &Bus, conn: ConnectionId, error: &io::Error);
    fn on_pause(&self, conn: ConnectionId);
    fn on_resume(&self, conn: ConnectionId);
}
