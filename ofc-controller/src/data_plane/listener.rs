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

//! Listener: accept, handshake and hand-off of pending sessions.
//!
//! A session walks `Connected -> HelloSent -> FeaturesRequested -> Paired`
//! while the listener owns it. On the feature-reply the session is paused and
//! parked under its datapath id, and `device.createRequested` is published.
//! When `device.created` arrives for that id, every parked session is
//! detached and published as `session.handOff`; the switch that claims it
//! wires itself to the connection and resumes it.

use bytes::Bytes;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io;
use std::rc::{Rc, Weak};
use tracing::{debug, error, info, warn};

use super::{
    AcceptedConnection, ConnectionEvents, ConnectionTable, Owner, Session, SessionState,
};
use crate::bus::{Bus, BusEvent, ServerConnection, SubscriptionId, Topic, WeakBus};
use crate::config::LogFlags;
use crate::identity::{ConnectionId, DatapathId, ListenerId, TransportKind};
use crate::observability::{events, fields};
use crate::wire::{OfBody, OfMessage, FEATURES_REQUEST_XID};

const COMPONENT: &str = "listener";

/// Transaction id of the hello sent on accept.
const HELLO_XID: u32 = 1;

#[derive(Default)]
struct ListenerState {
    sessions: HashMap<ConnectionId, Session>,
    /// Sessions waiting for a switch, in pairing order.
    pairing: HashMap<DatapathId, Vec<ConnectionId>>,
}

struct ListenerInner {
    id: ListenerId,
    transport: TransportKind,
    flags: LogFlags,
    connections: ConnectionTable,
    state: RefCell<ListenerState>,
    bus: WeakBus,
    subscription: Cell<Option<SubscriptionId>>,
    this: Weak<ListenerInner>,
}

/// Handle to one listener's control-loop state.
#[derive(Clone)]
pub(crate) struct Listener {
    inner: Rc<ListenerInner>,
}

impl Listener {
    pub(crate) fn new(
        id: ListenerId,
        transport: TransportKind,
        flags: LogFlags,
        bus: &Bus,
        connections: ConnectionTable,
    ) -> Self {
        let inner = Rc::new_cyclic(|this| ListenerInner {
            id,
            transport,
            flags,
            connections,
            state: RefCell::new(ListenerState::default()),
            bus: bus.downgrade(),
            subscription: Cell::new(None),
            this: this.clone(),
        });

        let weak = Rc::downgrade(&inner);
        let subscription = bus.subscribe(Topic::DeviceCreated, move |bus, event| {
            if let (Some(listener), BusEvent::DeviceCreated { dpid }) = (weak.upgrade(), event) {
                listener.on_device_created(bus, *dpid);
            }
        });
        inner.subscription.set(Some(subscription));

        Self { inner }
    }

    pub(crate) fn accept(&self, bus: &Bus, connection: AcceptedConnection) {
        self.inner.accept(bus, connection);
    }

    pub(crate) fn session_count(&self) -> usize {
        self.inner.state.borrow().sessions.len()
    }

    #[cfg(test)]
    pub(crate) fn session_state(&self, conn: ConnectionId) -> Option<SessionState> {
        self.inner
            .state
            .borrow()
            .sessions
            .get(&conn)
            .map(Session::state)
    }

    #[cfg(test)]
    pub(crate) fn pending(&self, dpid: DatapathId) -> usize {
        self.inner
            .state
            .borrow()
            .pairing
            .get(&dpid)
            .map_or(0, Vec::len)
    }
}

impl ListenerInner {
    fn owner(&self) -> Owner {
        Owner::Listener(self.id)
    }

    fn handler(&self) -> Weak<dyn ConnectionEvents> {
        self.this.clone()
    }

    fn accept(&self, bus: &Bus, connection: AcceptedConnection) {
        let conn = connection.id;
        let info = connection.info.clone();
        self.connections.insert(connection);

        let mut session = Session::open(conn, &info, self.connections.clone());
        if let Err(err) = self.connections.wire(conn, self.owner(), self.handler()) {
            error!(
                event = events::LISTENER_ACCEPT_FAILED,
                component = COMPONENT,
                listener = %self.id,
                conn_id = %conn,
                err = %err,
                "unable to wire accepted connection"
            );
            session.close();
            return;
        }

        let hello = session.message(HELLO_XID, OfBody::Hello(Bytes::new()));
        if let Err(err) = session.send(&hello) {
            warn!(
                event = events::SESSION_SEND_FAILED,
                component = COMPONENT,
                listener = %self.id,
                session_id = %session.id(),
                err = %err,
                "unable to send hello"
            );
        }
        session.set_state(SessionState::HelloSent);

        info!(
            event = events::LISTENER_ACCEPT,
            component = COMPONENT,
            listener = %self.id,
            session_id = %session.id(),
            conn_id = %conn,
            transport = %self.transport,
            "accepted connection"
        );

        let announcement = BusEvent::ServerConnection(ServerConnection {
            listener: self.id,
            session_id: session.id().clone(),
            remote_addr: info.remote_addr,
            local_addr: info.local_addr,
            transport: info.transport,
        });
        self.state.borrow_mut().sessions.insert(conn, session);
        bus.publish(&announcement);
    }

    /// Paired sessions are not read; their bytes wait for the switch.
    fn readable(&self, conn: ConnectionId) -> bool {
        matches!(
            self.state.borrow().sessions.get(&conn).map(Session::state),
            Some(state) if state != SessionState::Paired && state != SessionState::Closed
        )
    }

    fn handle_message(&self, conn: ConnectionId, message: OfMessage) -> Option<BusEvent> {
        let mut state = self.state.borrow_mut();
        let ListenerState { sessions, pairing } = &mut *state;
        let session = sessions.get_mut(&conn)?;

        if self.flags.debug {
            debug!(
                component = COMPONENT,
                listener = %self.id,
                session_id = %session.id(),
                msg = %fields::format_message(&message),
                "handshake message received"
            );
        }

        let OfMessage { version, xid, body } = message;
        match (session.state(), body) {
            (_, OfBody::EchoRequest(payload)) => {
                if self.flags.echo {
                    debug!(
                        event = events::SESSION_ECHO,
                        component = COMPONENT,
                        session_id = %session.id(),
                        xid,
                        "echo request"
                    );
                }
                let reply = session.message(xid, OfBody::EchoReply(payload));
                let _ = session.send(&reply);
                None
            }
            (SessionState::HelloSent, OfBody::Hello(_)) => {
                let negotiated = session.negotiate_version(version);
                let request = session.message(FEATURES_REQUEST_XID, OfBody::FeaturesRequest);
                let _ = session.send(&request);
                session.set_state(SessionState::FeaturesRequested);
                debug!(
                    event = events::LISTENER_FEATURES_REQUESTED,
                    component = COMPONENT,
                    session_id = %session.id(),
                    peer_version = version,
                    negotiated,
                    "hello received, features requested"
                );
                None
            }
            (SessionState::FeaturesRequested, OfBody::FeaturesReply(features)) => {
                if xid != FEATURES_REQUEST_XID {
                    warn!(
                        event = events::LISTENER_FEATURES_XID_MISMATCH,
                        component = COMPONENT,
                        session_id = %session.id(),
                        xid,
                        expected = FEATURES_REQUEST_XID,
                        "ignoring feature-reply with unexpected transaction id"
                    );
                    return None;
                }
                let dpid = DatapathId(features.datapath_id);
                session.pause();
                session.set_state(SessionState::Paired);
                pairing.entry(dpid).or_default().push(conn);
                info!(
                    event = events::LISTENER_SESSION_PAIRED,
                    component = COMPONENT,
                    session_id = %session.id(),
                    dpid = %dpid,
                    ports = features.ports.len(),
                    "session paired, requesting switch"
                );
                Some(BusEvent::DeviceCreateRequested { dpid, features })
            }
            (state, OfBody::Error(error)) => {
                warn!(
                    event = events::LISTENER_UNEXPECTED_MESSAGE,
                    component = COMPONENT,
                    session_id = %session.id(),
                    %state,
                    error_type = error.error_type,
                    code = error.code,
                    "device reported an error during handshake"
                );
                None
            }
            (state, body) => {
                debug!(
                    event = events::LISTENER_UNEXPECTED_MESSAGE,
                    component = COMPONENT,
                    session_id = %session.id(),
                    %state,
                    msg_type = %body.message_type(),
                    xid,
                    "dropping message outside the handshake"
                );
                None
            }
        }
    }

    fn on_device_created(&self, bus: &Bus, dpid: DatapathId) {
        let handed: Vec<Session> = {
            let mut state = self.state.borrow_mut();
            let Some(pending) = state.pairing.remove(&dpid) else {
                return;
            };
            pending
                .into_iter()
                .filter_map(|conn| state.sessions.remove(&conn))
                .collect()
        };

        for session in handed {
            let conn = session.connection();
            let session_id = session.id().clone();
            match session.hand_off(self.owner()) {
                Ok(snapshot) => {
                    info!(
                        event = events::LISTENER_HANDOFF,
                        component = COMPONENT,
                        listener = %self.id,
                        session_id = %session_id,
                        dpid = %dpid,
                        "handing session off"
                    );
                    bus.publish(&BusEvent::SessionHandOff { dpid, snapshot });
                    if self.connections.contains(conn) && self.connections.owner(conn).is_none() {
                        error!(
                            event = events::LISTENER_HANDOFF_UNCLAIMED,
                            component = COMPONENT,
                            session_id = %session_id,
                            dpid = %dpid,
                            "no switch claimed the session, releasing it"
                        );
                        self.connections.release(conn);
                    }
                }
                Err(err) => {
                    error!(
                        event = events::LISTENER_HANDOFF,
                        component = COMPONENT,
                        session_id = %session_id,
                        dpid = %dpid,
                        err = %err,
                        "hand-off failed, releasing connection"
                    );
                    self.connections.release(conn);
                }
            }
        }
    }

    fn close_session(&self, conn: ConnectionId) -> bool {
        let session = {
            let mut state = self.state.borrow_mut();
            let session = state.sessions.remove(&conn);
            for pending in state.pairing.values_mut() {
                pending.retain(|parked| *parked != conn);
            }
            state.pairing.retain(|_, pending| !pending.is_empty());
            session
        };
        match session {
            Some(mut session) => session.close(),
            None => self.connections.release(conn).is_some(),
        }
    }
}

impl ConnectionEvents for ListenerInner {
    fn on_data(&self, bus: &Bus, conn: ConnectionId) {
        while self.readable(conn) {
            let Some(frame) = self.connections.next_message(conn, self.owner()) else {
                break;
            };
            match frame {
                Ok(message) => {
                    if let Some(event) = self.handle_message(conn, message) {
                        bus.publish(&event);
                    }
                }
                Err(err) => warn!(
                    event = events::LISTENER_FRAME_ERROR,
                    component = COMPONENT,
                    conn_id = %conn,
                    err = %err.error,
                    raw = %fields::format_hex_preview(&err.raw),
                    "dropping undecodable frame"
                ),
            }
        }
    }

    fn on_close(&self, _bus: &Bus, conn: ConnectionId) {
        if self.close_session(conn) {
            debug!(
                event = events::LISTENER_SESSION_CLOSED,
                component = COMPONENT,
                listener = %self.id,
                conn_id = %conn,
                "connection closed before hand-off"
            );
        }
    }

    fn on_error(&self, _bus: &Bus, conn: ConnectionId, error: &io::Error) {
        if self.close_session(conn) {
            warn!(
                event = events::LISTENER_SESSION_CLOSED,
                component = COMPONENT,
                listener = %self.id,
                conn_id = %conn,
                err = %error,
                "connection failed before hand-off"
            );
        }
    }

    fn on_pause(&self, conn: ConnectionId) {
        debug!(component = COMPONENT, conn_id = %conn, "connection paused");
    }

    fn on_resume(&self, conn: ConnectionId) {
        debug!(component = COMPONENT, conn_id = %conn, "connection resumed");
    }
}

impl Drop for ListenerInner {
    fn drop(&mut self) {
        if let (Some(bus), Some(subscription)) = (self.bus.upgrade(), self.subscription.take()) {
            bus.unsubscribe(subscription);
        }
    }
}
