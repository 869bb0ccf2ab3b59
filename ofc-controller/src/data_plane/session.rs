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

//! One control channel: a connection slot plus protocol state.

use strum::Display;
use tracing::debug;

use super::{ConnectionInfo, ConnectionTable, Owner};
use crate::error::{OwnershipError, SendError};
use crate::identity::{ConnectionId, SessionId, TransportKind};
use crate::observability::{events, fields};
use crate::wire::{encode, MessageType, OfBody, OfMessage, OFP_VERSION};

const COMPONENT: &str = "session";

/// Handshake/liveness state, in the order a session walks through it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum SessionState {
    Connected,
    HelloSent,
    FeaturesRequested,
    /// Identity known, no switch yet; I/O is paused.
    Paired,
    Active,
    Closed,
}

/// Identity and metadata needed to rebuild a session under a new owner.
///
/// Carries the connection's arena index, never a second handle to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub transport: TransportKind,
    pub version: u8,
    pub connection: ConnectionId,
}

/// What was handed to the writer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SendReceipt {
    pub xid: u32,
    pub message_type: MessageType,
    pub len: usize,
}

pub struct Session {
    id: SessionId,
    transport: TransportKind,
    version: u8,
    conn: ConnectionId,
    state: SessionState,
    connections: ConnectionTable,
}

impl Session {
    pub(crate) fn open(
        conn: ConnectionId,
        info: &ConnectionInfo,
        connections: ConnectionTable,
    ) -> Self {
        Self {
            id: SessionId::from_remote(&info.remote_addr),
            transport: info.transport,
            version: OFP_VERSION,
            conn,
            state: SessionState::Connected,
            connections,
        }
    }

    /// Rebuilds a handed-off session. It starts `Active`.
    pub(crate) fn adopt(snapshot: SessionSnapshot, connections: ConnectionTable) -> Self {
        Self {
            id: snapshot.session_id,
            transport: snapshot.transport,
            version: snapshot.version,
            conn: snapshot.connection,
            state: SessionState::Active,
            connections,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn transport(&self) -> TransportKind {
        self.transport
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn connection(&self) -> ConnectionId {
        self.conn
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: SessionState) {
        if self.state != SessionState::Closed {
            self.state = state;
        }
    }

    /// Never raises the version.
    pub fn negotiate_version(&mut self, peer_version: u8) -> u8 {
        self.version = self.version.min(peer_version);
        self.version
    }

    pub fn pause(&self) {
        self.connections.set_paused(self.conn, true);
    }

    pub fn resume(&self) {
        self.connections.set_paused(self.conn, false);
    }

    /// Builds a message stamped with the negotiated version.
    pub fn message(&self, xid: u32, body: OfBody) -> OfMessage {
        OfMessage::new(self.version, xid, body)
    }

    pub fn send(&self, message: &OfMessage) -> Result<SendReceipt, SendError> {
        if self.state == SessionState::Closed {
            return Err(SendError::ConnectionClosed(self.conn));
        }
        let result = encode(message)
            .map_err(SendError::from)
            .and_then(|frame| {
                let len = frame.len();
                self.connections.send(self.conn, frame).map(|()| len)
            });
        match result {
            Ok(len) => Ok(SendReceipt {
                xid: message.xid,
                message_type: message.message_type(),
                len,
            }),
            Err(err) => {
                debug!(
                    event = events::SESSION_SEND_FAILED,
                    component = COMPONENT,
                    session_id = %self.id,
                    conn_id = %self.conn,
                    msg = %fields::format_message(message),
                    err = %err,
                    "send failed"
                );
                Err(err)
            }
        }
    }

    /// Releases the connection slot. Returns `false` if already closed.
    pub fn close(&mut self) -> bool {
        if self.state == SessionState::Closed {
            return false;
        }
        self.state = SessionState::Closed;
        self.connections.release(self.conn);
        debug!(
            event = events::SESSION_CLOSED,
            component = COMPONENT,
            session_id = %self.id,
            conn_id = %self.conn,
            "session closed"
        );
        true
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id.clone(),
            transport: self.transport,
            version: self.version,
            connection: self.conn,
        }
    }

    /// Detaches `owner`'s wiring and gives up the session.
    ///
    /// On success nobody is wired to the connection until the receiver of the
    /// snapshot wires itself; inbound bytes keep buffering meanwhile.
    pub(crate) fn hand_off(self, owner: Owner) -> Result<SessionSnapshot, OwnershipError> {
        self.connections.detach(self.conn, owner)?;
        Ok(self.snapshot())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("transport", &self.transport)
            .field("version", &self.version)
            .field("conn", &self.conn)
            .field("state", &self.state)
            .finish()
    }
}
