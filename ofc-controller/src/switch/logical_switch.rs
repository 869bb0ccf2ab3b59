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

//! One device identity and the sessions that back it.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io;
use std::rc::{Rc, Weak};
use tracing::{debug, info, warn};

use super::ports::PortTable;
use crate::bus::{
    Bus, BusEvent, FlowRemovedEvent, PacketInEvent, SubscriptionId, SwitchCommand, Topic, WeakBus,
};
use crate::config::LogFlags;
use crate::data_plane::{
    ConnectionEvents, ConnectionTable, Owner, SendReceipt, Session, SessionSnapshot,
};
use crate::error::CommandError;
use crate::identity::{ConnectionId, DatapathId, SessionId};
use crate::observability::{events, fields};
use crate::packet::PacketDecoder;
use crate::wire::{FlowMod, OfBody, OfMessage, PacketOut, PhyPort, PortMod, SwitchFeatures};

const COMPONENT: &str = "logical_switch";

/// Collaborators a switch needs besides the bus.
#[derive(Clone)]
pub(crate) struct SwitchDeps {
    pub(crate) connections: ConnectionTable,
    pub(crate) decoder: Rc<dyn PacketDecoder>,
    pub(crate) flags: LogFlags,
}

struct SwitchInner {
    dpid: DatapathId,
    n_buffers: u32,
    n_tables: u8,
    capabilities: u32,
    actions: u32,
    ports: RefCell<PortTable>,
    sessions: RefCell<BTreeMap<SessionId, Session>>,
    deps: SwitchDeps,
    bus: WeakBus,
    subscriptions: RefCell<Vec<SubscriptionId>>,
    this: Weak<SwitchInner>,
}

/// Handle to a logical switch. Clones share the same device.
#[derive(Clone)]
pub struct LogicalSwitch {
    inner: Rc<SwitchInner>,
}

impl LogicalSwitch {
    /// Builds the switch, subscribes it, then announces `device.created`.
    ///
    /// The announcement runs synchronously and may hand sessions to the new
    /// switch before the caller has registered it anywhere.
    pub(crate) fn create(
        bus: &Bus,
        dpid: DatapathId,
        features: &SwitchFeatures,
        deps: SwitchDeps,
    ) -> Self {
        let inner = Rc::new_cyclic(|this| SwitchInner {
            dpid,
            n_buffers: features.n_buffers,
            n_tables: features.n_tables,
            capabilities: features.capabilities,
            actions: features.actions,
            ports: RefCell::new(PortTable::default()),
            sessions: RefCell::new(BTreeMap::new()),
            deps,
            bus: bus.downgrade(),
            subscriptions: RefCell::new(Vec::new()),
            this: this.clone(),
        });

        for port in &features.ports {
            inner.change_port(port.clone());
        }
        inner.subscribe(bus);

        info!(
            event = events::SWITCH_CREATED,
            component = COMPONENT,
            dpid = %dpid,
            ports = features.ports.len(),
            buffers = features.n_buffers,
            tables = features.n_tables,
            "logical switch created"
        );
        bus.publish(&BusEvent::DeviceCreated { dpid });

        Self { inner }
    }

    pub fn dpid(&self) -> DatapathId {
        self.inner.dpid
    }

    pub fn n_buffers(&self) -> u32 {
        self.inner.n_buffers
    }

    pub fn n_tables(&self) -> u8 {
        self.inner.n_tables
    }

    pub fn capabilities(&self) -> u32 {
        self.inner.capabilities
    }

    pub fn actions(&self) -> u32 {
        self.inner.actions
    }

    pub fn ports(&self) -> PortTable {
        self.inner.ports.borrow().clone()
    }

    pub fn port(&self, port_no: u16) -> Option<PhyPort> {
        self.inner.ports.borrow().get(port_no).cloned()
    }

    pub fn session_ids(&self) -> Vec<SessionId> {
        self.inner.sessions.borrow().keys().cloned().collect()
    }

    pub fn session_count(&self) -> usize {
        self.inner.sessions.borrow().len()
    }

    pub fn packet_out(
        &self,
        session_id: &SessionId,
        xid: u32,
        body: PacketOut,
    ) -> Result<SendReceipt, CommandError> {
        self.inner.send_command(session_id, xid, OfBody::PacketOut(body))
    }

    pub fn flow_mod(
        &self,
        session_id: &SessionId,
        xid: u32,
        body: FlowMod,
    ) -> Result<SendReceipt, CommandError> {
        self.inner.send_command(session_id, xid, OfBody::FlowMod(body))
    }

    pub fn port_mod(
        &self,
        session_id: &SessionId,
        xid: u32,
        body: PortMod,
    ) -> Result<SendReceipt, CommandError> {
        self.inner.send_command(session_id, xid, OfBody::PortMod(body))
    }

    /// Leaves every bus cascade and closes the owned sessions.
    ///
    /// Clones held elsewhere stay readable afterwards, but the switch no
    /// longer answers create requests, adopts sessions or routes commands.
    pub(crate) fn retire(&self) {
        self.inner.retire();
    }
}

impl std::fmt::Debug for LogicalSwitch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogicalSwitch")
            .field("dpid", &self.inner.dpid)
            .field("ports", &self.inner.ports.borrow().len())
            .field("sessions", &self.session_ids())
            .finish()
    }
}

fn on<F>(bus: &Bus, topic: Topic, switch: &Weak<SwitchInner>, handler: F) -> SubscriptionId
where
    F: Fn(&SwitchInner, &Bus, &BusEvent) + 'static,
{
    let switch = switch.clone();
    bus.subscribe(topic, move |bus, event| {
        if let Some(switch) = switch.upgrade() {
            handler(&switch, bus, event);
        }
    })
}

impl SwitchInner {
    fn owner(&self) -> Owner {
        Owner::Switch(self.dpid)
    }

    fn handler(&self) -> Weak<dyn ConnectionEvents> {
        self.this.clone()
    }

    fn change_port(&self, port: PhyPort) {
        self.ports.borrow_mut().update(port);
    }

    fn subscribe(&self, bus: &Bus) {
        let subscriptions = vec![
            on(bus, Topic::SessionHandOff, &self.this, |switch, bus, event| {
                if let BusEvent::SessionHandOff { dpid, snapshot } = event {
                    switch.on_hand_off(bus, *dpid, snapshot);
                }
            }),
            on(bus, Topic::DeviceCreateRequested, &self.this, |switch, bus, event| {
                if let BusEvent::DeviceCreateRequested { dpid, .. } = event {
                    if *dpid == switch.dpid {
                        debug!(
                            component = COMPONENT,
                            dpid = %dpid,
                            "switch exists, re-announcing"
                        );
                        bus.publish(&BusEvent::DeviceCreated { dpid: *dpid });
                    }
                }
            }),
            on(bus, Topic::AppPacketOut, &self.this, |switch, _, event| {
                if let BusEvent::AppPacketOut(command) = event {
                    switch.command_from_bus(command, OfBody::PacketOut);
                }
            }),
            on(bus, Topic::AppFlowMod, &self.this, |switch, _, event| {
                if let BusEvent::AppFlowMod(command) = event {
                    switch.command_from_bus(command, OfBody::FlowMod);
                }
            }),
            on(bus, Topic::AppPortMod, &self.this, |switch, _, event| {
                if let BusEvent::AppPortMod(command) = event {
                    switch.command_from_bus(command, OfBody::PortMod);
                }
            }),
        ];
        *self.subscriptions.borrow_mut() = subscriptions;
    }

    fn on_hand_off(&self, bus: &Bus, dpid: DatapathId, snapshot: &SessionSnapshot) {
        if dpid != self.dpid {
            return;
        }

        let conn = snapshot.connection;
        let connections = &self.deps.connections;
        if let Err(err) = connections.wire(conn, self.owner(), self.handler()) {
            warn!(
                event = events::SWITCH_HANDOFF_FAILED,
                component = COMPONENT,
                dpid = %self.dpid,
                session_id = %snapshot.session_id,
                err = %err,
                "unable to take over session"
            );
            return;
        }

        let session = Session::adopt(snapshot.clone(), connections.clone());
        session.resume();
        info!(
            event = events::SWITCH_SESSION_ADOPTED,
            component = COMPONENT,
            dpid = %self.dpid,
            session_id = %session.id(),
            version = session.version(),
            "session adopted"
        );
        let displaced = self
            .sessions
            .borrow_mut()
            .insert(session.id().clone(), session);
        if let Some(mut displaced) = displaced {
            warn!(
                event = events::SWITCH_SESSION_DISPLACED,
                component = COMPONENT,
                dpid = %self.dpid,
                session_id = %displaced.id(),
                conn_id = %displaced.connection(),
                "session id reused, closing the previous session"
            );
            displaced.close();
        }

        // Frames that arrived during the hand-off are still buffered.
        self.on_data(bus, conn);
    }

    fn command_from_bus<T: Clone>(&self, command: &SwitchCommand<T>, wrap: fn(T) -> OfBody) {
        if command.dpid != self.dpid {
            return;
        }
        let _ = self.send_command(&command.session_id, command.xid, wrap(command.body.clone()));
    }

    fn send_command(
        &self,
        session_id: &SessionId,
        xid: u32,
        body: OfBody,
    ) -> Result<SendReceipt, CommandError> {
        let message_type = body.message_type();
        let result = match self.sessions.borrow().get(session_id) {
            Some(session) => session
                .send(&session.message(xid, body))
                .map_err(CommandError::from),
            None => Err(CommandError::UnknownSession {
                dpid: self.dpid,
                session_id: session_id.clone(),
            }),
        };

        match &result {
            Ok(receipt) => debug!(
                event = events::SWITCH_COMMAND_SENT,
                component = COMPONENT,
                dpid = %self.dpid,
                session_id = %session_id,
                msg_type = %receipt.message_type,
                xid,
                len = receipt.len,
                "command sent"
            ),
            Err(err) => warn!(
                event = events::SWITCH_COMMAND_FAILED,
                component = COMPONENT,
                dpid = %self.dpid,
                session_id = %session_id,
                msg_type = %message_type,
                xid,
                err = %err,
                "command not sent"
            ),
        }
        result
    }

    fn handle_message(&self, conn: ConnectionId, message: OfMessage) -> Option<BusEvent> {
        let sessions = self.sessions.borrow();
        let session = sessions.values().find(|session| session.connection() == conn)?;
        let session_id = session.id();

        if self.deps.flags.debug {
            debug!(
                component = COMPONENT,
                dpid = %self.dpid,
                %session_id,
                msg = %fields::format_message(&message),
                "device message received"
            );
        }

        let OfMessage { xid, body, .. } = message;
        match body {
            OfBody::PacketIn(packet_in) => {
                let data = self.deps.decoder.decode(&packet_in.data);
                debug!(
                    event = events::SWITCH_PACKET_IN,
                    component = COMPONENT,
                    dpid = %self.dpid,
                    %session_id,
                    xid,
                    in_port = packet_in.in_port,
                    buffer_id = packet_in.buffer_id,
                    packet = %data,
                    "packet-in"
                );
                Some(BusEvent::AppPacketIn(PacketInEvent {
                    dpid: self.dpid,
                    session_id: session_id.clone(),
                    xid,
                    buffer_id: packet_in.buffer_id,
                    data,
                    in_port: packet_in.in_port,
                    reason: packet_in.reason,
                    total_len: packet_in.total_len,
                    frame: packet_in.data,
                }))
            }
            OfBody::FlowRemoved(body) => {
                debug!(
                    event = events::SWITCH_FLOW_REMOVED,
                    component = COMPONENT,
                    dpid = %self.dpid,
                    %session_id,
                    xid,
                    reason = body.reason,
                    "flow removed"
                );
                Some(BusEvent::AppFlowRemoved(FlowRemovedEvent {
                    dpid: self.dpid,
                    session_id: session_id.clone(),
                    xid,
                    body,
                }))
            }
            OfBody::EchoRequest(payload) => {
                if self.deps.flags.echo {
                    debug!(
                        event = events::SESSION_ECHO,
                        component = COMPONENT,
                        dpid = %self.dpid,
                        %session_id,
                        xid,
                        "echo request"
                    );
                }
                let _ = session.send(&session.message(xid, OfBody::EchoReply(payload)));
                None
            }
            OfBody::PortStatus(status) => {
                info!(
                    event = events::SWITCH_PORT_STATUS,
                    component = COMPONENT,
                    dpid = %self.dpid,
                    %session_id,
                    port = status.desc.port_no,
                    reason = status.reason,
                    "port status"
                );
                None
            }
            OfBody::Error(error) => {
                warn!(
                    event = events::SWITCH_MESSAGE_LOGGED,
                    component = COMPONENT,
                    dpid = %self.dpid,
                    %session_id,
                    xid,
                    error_type = error.error_type,
                    code = error.code,
                    "device reported an error"
                );
                None
            }
            other => {
                debug!(
                    event = events::SWITCH_MESSAGE_LOGGED,
                    component = COMPONENT,
                    dpid = %self.dpid,
                    %session_id,
                    xid,
                    msg_type = %other.message_type(),
                    "message logged only"
                );
                None
            }
        }
    }

    fn retire(&self) {
        let subscriptions = std::mem::take(&mut *self.subscriptions.borrow_mut());
        if let Some(bus) = self.bus.upgrade() {
            for subscription in subscriptions {
                bus.unsubscribe(subscription);
            }
        }
        let sessions = std::mem::take(&mut *self.sessions.borrow_mut());
        for (_, mut session) in sessions {
            session.close();
        }
    }

    fn close_session(&self, bus: &Bus, conn: ConnectionId) {
        let (closed, remaining) = {
            let mut sessions = self.sessions.borrow_mut();
            let key = sessions
                .iter()
                .find(|(_, session)| session.connection() == conn)
                .map(|(key, _)| key.clone());
            let closed = key.and_then(|key| sessions.remove(&key));
            (closed, sessions.len())
        };

        let Some(mut session) = closed else {
            self.deps.connections.release(conn);
            return;
        };
        session.close();
        info!(
            event = events::SWITCH_SESSION_CLOSED,
            component = COMPONENT,
            dpid = %self.dpid,
            session_id = %session.id(),
            remaining,
            "session closed"
        );

        if remaining == 0 {
            info!(
                event = events::SWITCH_REMOVE_REQUESTED,
                component = COMPONENT,
                dpid = %self.dpid,
                "last session gone, requesting removal"
            );
            bus.publish(&BusEvent::DeviceRemoveRequested { dpid: self.dpid });
        }
    }
}

impl ConnectionEvents for SwitchInner {
    fn on_data(&self, bus: &Bus, conn: ConnectionId) {
        while let Some(frame) = self.deps.connections.next_message(conn, self.owner()) {
            match frame {
                Ok(message) => {
                    if let Some(event) = self.handle_message(conn, message) {
                        bus.publish(&event);
                    }
                }
                Err(err) => warn!(
                    event = events::SWITCH_FRAME_ERROR,
                    component = COMPONENT,
                    dpid = %self.dpid,
                    conn_id = %conn,
                    err = %err.error,
                    raw = %fields::format_hex_preview(&err.raw),
                    "dropping undecodable frame"
                ),
            }
        }
    }

    fn on_close(&self, bus: &Bus, conn: ConnectionId) {
        self.close_session(bus, conn);
    }

    fn on_error(&self, bus: &Bus, conn: ConnectionId, error: &io::Error) {
        warn!(
            event = events::SWITCH_SESSION_CLOSED,
            component = COMPONENT,
            dpid = %self.dpid,
            conn_id = %conn,
            err = %error,
            "session failed"
        );
        self.close_session(bus, conn);
    }

    fn on_pause(&self, conn: ConnectionId) {
        debug!(
            event = events::SWITCH_FLOW_CONTROL,
            component = COMPONENT,
            dpid = %self.dpid,
            conn_id = %conn,
            "session paused"
        );
    }

    fn on_resume(&self, conn: ConnectionId) {
        debug!(
            event = events::SWITCH_FLOW_CONTROL,
            component = COMPONENT,
            dpid = %self.dpid,
            conn_id = %conn,
            "session resumed"
        );
    }
}

impl Drop for SwitchInner {
    fn drop(&mut self) {
        self.retire();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::EthernetDecoder;
    use crate::test_support::{features, fake_connection, frame, message, record, FakePeer};
    use crate::wire::{
        Action, FlowModCommand, FlowRemoved, Match, MessageType, PacketIn, OFP_NO_BUFFER,
        OFP_VERSION,
    };
    use bytes::Bytes;
    use std::cell::Cell;

    const DPID: DatapathId = DatapathId(0x0a);

    struct Harness {
        bus: Bus,
        table: ConnectionTable,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                bus: Bus::new(),
                table: ConnectionTable::new(),
            }
        }

        fn deps(&self) -> SwitchDeps {
            SwitchDeps {
                connections: self.table.clone(),
                decoder: Rc::new(EthernetDecoder),
                flags: LogFlags::default(),
            }
        }

        fn create(&self) -> LogicalSwitch {
            LogicalSwitch::create(&self.bus, DPID, &features(DPID.0, &[1, 2, 3]), self.deps())
        }

        /// A paused, unwired slot as the listener leaves it after hand-off.
        fn handed_off(&self, n: u64) -> (SessionSnapshot, FakePeer) {
            let (connection, peer) = fake_connection(n);
            let info = connection.info.clone();
            let id = connection.id;
            self.table.insert(connection);
            let session = Session::open(id, &info, self.table.clone());
            session.pause();
            (session.snapshot(), peer)
        }

        fn hand_off(&self, n: u64) -> (SessionSnapshot, FakePeer) {
            let (snapshot, peer) = self.handed_off(n);
            self.bus.publish(&BusEvent::SessionHandOff {
                dpid: DPID,
                snapshot: snapshot.clone(),
            });
            (snapshot, peer)
        }

        fn feed(&self, conn: ConnectionId, incoming: &OfMessage) {
            if let Some(handler) = self.table.receive(conn, &frame(incoming)) {
                handler.on_data(&self.bus, conn);
            }
        }
    }

    fn ethernet_frame() -> Bytes {
        let mut raw = vec![0x02, 0, 0, 0, 0, 0x02, 0x02, 0, 0, 0, 0, 0x01, 0x88, 0xb5];
        raw.extend_from_slice(&[0u8; 46]);
        Bytes::from(raw)
    }

    #[test]
    fn construction_fills_sparse_port_table_and_announces() {
        let harness = Harness::new();
        let created = record(&harness.bus, &[Topic::DeviceCreated]);
        let switch = harness.create();

        assert_eq!(switch.ports().numbers(), vec![1, 2, 3]);
        assert_eq!(switch.port(2).map(|port| port.name), Some("eth2".to_string()));
        assert_eq!(switch.n_buffers(), 256);
        assert_eq!(created.borrow().len(), 1);
    }

    #[test]
    fn hand_off_issued_during_announcement_is_adopted() {
        let harness = Harness::new();
        let (snapshot, peer) = harness.handed_off(1);
        let pending = RefCell::new(Some(snapshot));
        harness.bus.subscribe(Topic::DeviceCreated, move |bus, event| {
            if let (BusEvent::DeviceCreated { dpid }, Some(snapshot)) =
                (event, pending.borrow_mut().take())
            {
                bus.publish(&BusEvent::SessionHandOff {
                    dpid: *dpid,
                    snapshot,
                });
            }
        });

        let switch = harness.create();
        assert_eq!(switch.session_count(), 1);
        assert!(!peer.is_paused());
    }

    #[test]
    fn hand_off_for_other_identity_is_ignored() {
        let harness = Harness::new();
        let switch = harness.create();
        let (snapshot, _peer) = harness.handed_off(1);
        harness.bus.publish(&BusEvent::SessionHandOff {
            dpid: DatapathId(0xbeef),
            snapshot: snapshot.clone(),
        });

        assert_eq!(switch.session_count(), 0);
        assert_eq!(harness.table.owner(snapshot.connection), None);
    }

    #[test]
    fn adopted_session_is_wired_resumed_and_drained() {
        let harness = Harness::new();
        let switch = harness.create();
        let (snapshot, mut peer) = harness.handed_off(1);
        let echo = message(OFP_VERSION, 33, OfBody::EchoRequest(Bytes::new()));
        harness.table.receive(snapshot.connection, &frame(&echo));

        harness.bus.publish(&BusEvent::SessionHandOff {
            dpid: DPID,
            snapshot: snapshot.clone(),
        });

        assert_eq!(
            harness.table.owner(snapshot.connection),
            Some(Owner::Switch(DPID))
        );
        assert!(!peer.is_paused());
        assert_eq!(switch.session_ids(), vec![snapshot.session_id]);
        let sent = peer.drain();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].message_type(), MessageType::EchoReply);
        assert_eq!(sent[0].xid, 33);
    }

    #[test]
    fn packet_in_is_decoded_and_published() {
        let harness = Harness::new();
        let _switch = harness.create();
        let seen = record(&harness.bus, &[Topic::AppPacketIn]);
        let (snapshot, _peer) = harness.hand_off(1);

        let raw = ethernet_frame();
        harness.feed(
            snapshot.connection,
            &message(
                OFP_VERSION,
                21,
                OfBody::PacketIn(PacketIn {
                    buffer_id: 0x77,
                    total_len: raw.len() as u16,
                    in_port: 3,
                    reason: 0,
                    data: raw.clone(),
                }),
            ),
        );

        let seen = seen.borrow();
        let [BusEvent::AppPacketIn(event)] = seen.as_slice() else {
            panic!("expected one packet-in, got {seen:?}");
        };
        assert_eq!(event.dpid, DPID);
        assert_eq!(event.session_id, snapshot.session_id);
        assert_eq!(event.xid, 21);
        assert_eq!(event.buffer_id, 0x77);
        assert_eq!(event.in_port, 3);
        assert_eq!(event.data, EthernetDecoder.decode(&raw));
        assert_eq!(event.frame, raw);
    }

    #[test]
    fn flow_removed_is_published_verbatim() {
        let harness = Harness::new();
        let _switch = harness.create();
        let seen = record(&harness.bus, &[Topic::AppFlowRemoved]);
        let (snapshot, _peer) = harness.hand_off(1);

        let body = FlowRemoved {
            flow_match: Match::for_destination([0x02, 0, 0, 0, 0, 0x09], 0),
            cookie: 4,
            priority: 0x8000,
            reason: 0,
            duration_sec: 100,
            duration_nsec: 0,
            idle_timeout: 100,
            packet_count: 12,
            byte_count: 1200,
        };
        harness.feed(
            snapshot.connection,
            &message(OFP_VERSION, 8, OfBody::FlowRemoved(body.clone())),
        );

        let seen = seen.borrow();
        let [BusEvent::AppFlowRemoved(event)] = seen.as_slice() else {
            panic!("expected one flow-removed, got {seen:?}");
        };
        assert_eq!(event.xid, 8);
        assert_eq!(event.body, body);
    }

    #[test]
    fn command_for_unknown_session_is_reported_not_sent() {
        let harness = Harness::new();
        let switch = harness.create();
        let (_snapshot, mut peer) = harness.hand_off(1);

        let stranger = SessionId::new("192.0.2.1:1");
        let result = switch.flow_mod(
            &stranger,
            5,
            FlowMod {
                flow_match: Match::default(),
                cookie: 0,
                command: FlowModCommand::Add,
                idle_timeout: 0,
                hard_timeout: 0,
                priority: 1,
                buffer_id: OFP_NO_BUFFER,
                out_port: 0xffff,
                flags: 0,
                actions: vec![],
            },
        );

        assert!(matches!(
            result,
            Err(CommandError::UnknownSession { session_id, .. }) if session_id == stranger
        ));
        assert!(peer.drain().is_empty());
    }

    #[test]
    fn bus_command_reaches_named_session() {
        let harness = Harness::new();
        let _switch = harness.create();
        let (snapshot, mut peer) = harness.hand_off(1);

        harness.bus.publish(&BusEvent::AppPacketOut(SwitchCommand {
            dpid: DPID,
            session_id: snapshot.session_id.clone(),
            xid: 12,
            body: PacketOut {
                buffer_id: 9,
                in_port: 1,
                actions: vec![Action::output(2)],
                data: Bytes::new(),
            },
        }));
        harness.bus.publish(&BusEvent::AppPacketOut(SwitchCommand {
            dpid: DatapathId(0xffff),
            session_id: snapshot.session_id.clone(),
            xid: 13,
            body: PacketOut {
                buffer_id: 9,
                in_port: 1,
                actions: vec![],
                data: Bytes::new(),
            },
        }));

        let sent = peer.drain();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].xid, 12);
        assert_eq!(sent[0].message_type(), MessageType::PacketOut);
    }

    #[test]
    fn removal_requested_only_when_last_session_closes() {
        let harness = Harness::new();
        let switch = harness.create();
        let removals = Rc::new(Cell::new(0));
        let counter = removals.clone();
        harness.bus.subscribe(Topic::DeviceRemoveRequested, move |_, _| {
            counter.set(counter.get() + 1)
        });
        let (first, mut first_peer) = harness.hand_off(1);
        let (second, _second_peer) = harness.hand_off(2);
        assert_eq!(switch.session_count(), 2);

        let handler = harness.table.handler(first.connection).expect("switch wired");
        handler.on_close(&harness.bus, first.connection);
        handler.on_error(&harness.bus, first.connection, &io::Error::other("again"));
        assert_eq!(removals.get(), 0);
        assert!(first_peer.is_released());

        let handler = harness.table.handler(second.connection).expect("switch wired");
        handler.on_close(&harness.bus, second.connection);
        assert_eq!(removals.get(), 1);
        assert_eq!(switch.session_count(), 0);
    }

    #[test]
    fn create_request_for_own_identity_re_announces() {
        let harness = Harness::new();
        let _switch = harness.create();
        let created = record(&harness.bus, &[Topic::DeviceCreated]);

        harness.bus.publish(&BusEvent::DeviceCreateRequested {
            dpid: DPID,
            features: features(DPID.0, &[]),
        });
        harness.bus.publish(&BusEvent::DeviceCreateRequested {
            dpid: DatapathId(0x0b),
            features: features(0x0b, &[]),
        });
        assert_eq!(created.borrow().len(), 1);
    }

    #[test]
    fn reused_session_id_closes_the_displaced_session() {
        let harness = Harness::new();
        let switch = harness.create();
        let (first, mut first_peer) = harness.hand_off(1);
        let (mut second, mut second_peer) = harness.handed_off(2);
        second.session_id = first.session_id.clone();
        harness.bus.publish(&BusEvent::SessionHandOff {
            dpid: DPID,
            snapshot: second.clone(),
        });

        assert_eq!(switch.session_count(), 1);
        assert!(first_peer.is_released());
        assert!(!harness.table.contains(first.connection));

        harness.feed(
            second.connection,
            &message(OFP_VERSION, 61, OfBody::EchoRequest(Bytes::new())),
        );
        let sent = second_peer.drain();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].xid, 61);
    }

    #[test]
    fn retired_switch_leaves_the_bus_while_clones_live() {
        let harness = Harness::new();
        let switch = harness.create();
        let held = switch.clone();
        let (_snapshot, mut peer) = harness.hand_off(1);
        let created = record(&harness.bus, &[Topic::DeviceCreated]);

        switch.retire();
        drop(switch);

        assert_eq!(held.session_count(), 0);
        assert!(peer.is_released());
        assert_eq!(harness.bus.subscriber_count(Topic::SessionHandOff), 0);
        assert_eq!(harness.bus.subscriber_count(Topic::DeviceCreateRequested), 0);

        harness.bus.publish(&BusEvent::DeviceCreateRequested {
            dpid: DPID,
            features: features(DPID.0, &[]),
        });
        let (snapshot, _peer) = harness.hand_off(2);
        assert!(created.borrow().is_empty());
        assert_eq!(held.session_count(), 0);
        assert_eq!(harness.table.owner(snapshot.connection), None);
    }

    #[test]
    fn dropping_switch_unsubscribes_and_releases_sessions() {
        let harness = Harness::new();
        let switch = harness.create();
        let (_snapshot, mut peer) = harness.hand_off(1);
        assert_eq!(harness.bus.subscriber_count(Topic::SessionHandOff), 1);

        drop(switch);
        assert_eq!(harness.bus.subscriber_count(Topic::SessionHandOff), 0);
        assert_eq!(harness.bus.subscriber_count(Topic::AppFlowMod), 0);
        assert!(peer.is_released());
    }
}
