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

//! # learning-switch
//!
//! An L2 learning switch built only on the controller's bus API.
//!
//! Every packet-in teaches the application which port a source MAC lives
//! behind, per device. Frames for a known unicast destination get a flow
//! installed; anything else is flooded. When the device reports that a flow
//! expired, the destination is forgotten again. A removed device takes its
//! whole table with it.

use bytes::Bytes;
use ofc_controller::bus::{
    Bus, BusEvent, FlowRemovedEvent, PacketInEvent, SubscriptionId, SwitchCommand, Topic, WeakBus,
};
use ofc_controller::packet::MacAddr;
use ofc_controller::wire::{
    ports, Action, FlowMod, FlowModCommand, Match, PacketOut, OFPFF_SEND_FLOW_REM, OFP_NO_BUFFER,
};
use ofc_controller::DatapathId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, info, warn};

const COMPONENT: &str = "learning_switch";

/// Transaction id of flood packet-outs.
pub const PACKET_OUT_XID: u32 = 0x03;
/// Transaction id of installed flows.
pub const FLOW_MOD_XID: u32 = 0x04;
/// Idle timeout, in seconds, of installed flows.
pub const FLOW_IDLE_TIMEOUT: u16 = 100;
pub const FLOW_PRIORITY: u16 = 0x8000;
/// `dl_vlan` of untagged frames.
const OFP_VLAN_NONE: u16 = 0xffff;

#[derive(Clone, Copy, Debug, Default)]
pub struct LearningConfig {
    /// Log every learning decision at `info` instead of `debug`.
    pub debug: bool,
}

type MacTable = HashMap<MacAddr, u16>;

struct LearningInner {
    config: LearningConfig,
    tables: RefCell<HashMap<DatapathId, MacTable>>,
    bus: WeakBus,
    subscriptions: RefCell<Vec<SubscriptionId>>,
}

/// Handle to an attached learning switch. Dropping the last handle detaches it.
#[derive(Clone)]
pub struct LearningSwitch {
    inner: Rc<LearningInner>,
}

impl LearningSwitch {
    pub fn attach(bus: &Bus, config: LearningConfig) -> Self {
        let inner = Rc::new(LearningInner {
            config,
            tables: RefCell::new(HashMap::new()),
            bus: bus.downgrade(),
            subscriptions: RefCell::new(Vec::new()),
        });

        let weak = Rc::downgrade(&inner);
        let packet_in = bus.subscribe(Topic::AppPacketIn, move |bus, event| {
            if let (Some(app), BusEvent::AppPacketIn(packet_in)) = (weak.upgrade(), event) {
                app.on_packet_in(bus, packet_in);
            }
        });
        let weak = Rc::downgrade(&inner);
        let flow_removed = bus.subscribe(Topic::AppFlowRemoved, move |_, event| {
            if let (Some(app), BusEvent::AppFlowRemoved(removed)) = (weak.upgrade(), event) {
                app.on_flow_removed(removed);
            }
        });
        let weak = Rc::downgrade(&inner);
        let device_removed = bus.subscribe(Topic::DeviceRemoveRequested, move |_, event| {
            if let (Some(app), BusEvent::DeviceRemoveRequested { dpid }) = (weak.upgrade(), event) {
                app.forget_device(*dpid);
            }
        });
        *inner.subscriptions.borrow_mut() = vec![packet_in, flow_removed, device_removed];

        Self { inner }
    }

    /// Port `mac` was last seen on, for one device.
    pub fn learned_port(&self, dpid: DatapathId, mac: MacAddr) -> Option<u16> {
        self.inner
            .tables
            .borrow()
            .get(&dpid)
            .and_then(|table| table.get(&mac).copied())
    }

    pub fn table_len(&self, dpid: DatapathId) -> usize {
        self.inner.tables.borrow().get(&dpid).map_or(0, HashMap::len)
    }
}

impl LearningInner {
    fn log(&self, message: &str, dpid: DatapathId, mac: MacAddr, port: u16) {
        if self.config.debug {
            info!(component = COMPONENT, dpid = %dpid, mac = %mac, port, "{message}");
        } else {
            debug!(component = COMPONENT, dpid = %dpid, mac = %mac, port, "{message}");
        }
    }

    fn on_packet_in(&self, bus: &Bus, packet_in: &PacketInEvent) {
        let Some(frame) = packet_in.data.ethernet.as_ref() else {
            warn!(
                component = COMPONENT,
                dpid = %packet_in.dpid,
                in_port = packet_in.in_port,
                "packet-in without an ethernet header"
            );
            return;
        };

        self.learn(packet_in.dpid, frame.source, packet_in.in_port);
        let vlan = frame.vlan.map_or(OFP_VLAN_NONE, |tag| tag.vid);
        if let Some(command) = self.forward(packet_in, frame.destination, frame.source, vlan) {
            bus.publish(&command);
        }
    }

    fn learn(&self, dpid: DatapathId, source: MacAddr, in_port: u16) {
        if source.is_broadcast() {
            warn!(
                component = COMPONENT,
                dpid = %dpid,
                in_port,
                "source address is broadcast, not learning"
            );
            return;
        }

        let previous = self
            .tables
            .borrow_mut()
            .entry(dpid)
            .or_default()
            .insert(source, in_port);
        match previous {
            None => self.log("learned mac", dpid, source, in_port),
            Some(old) if old != in_port => self.log("mac moved", dpid, source, in_port),
            Some(_) => {}
        }
    }

    fn forward(
        &self,
        packet_in: &PacketInEvent,
        destination: MacAddr,
        source: MacAddr,
        vlan: u16,
    ) -> Option<BusEvent> {
        let (in_port, out_port) = {
            let tables = self.tables.borrow();
            let table = tables.get(&packet_in.dpid);
            let in_port = table
                .and_then(|table| table.get(&source).copied())
                .unwrap_or(packet_in.in_port);
            let out_port = if destination.is_broadcast() {
                None
            } else {
                table.and_then(|table| table.get(&destination).copied())
            };
            (in_port, out_port)
        };

        match out_port {
            Some(out_port) if out_port == in_port => {
                warn!(
                    component = COMPONENT,
                    dpid = %packet_in.dpid,
                    port = in_port,
                    "destination is behind the ingress port, dropping"
                );
                None
            }
            Some(out_port) => {
                self.log("installing flow", packet_in.dpid, destination, out_port);
                Some(BusEvent::AppFlowMod(SwitchCommand {
                    dpid: packet_in.dpid,
                    session_id: packet_in.session_id.clone(),
                    xid: FLOW_MOD_XID,
                    body: FlowMod {
                        flow_match: Match::for_destination(destination.octets(), vlan),
                        cookie: mac_cookie(destination),
                        command: FlowModCommand::Add,
                        idle_timeout: FLOW_IDLE_TIMEOUT,
                        hard_timeout: 0,
                        priority: FLOW_PRIORITY,
                        buffer_id: packet_in.buffer_id,
                        out_port: ports::OFPP_NONE,
                        flags: OFPFF_SEND_FLOW_REM,
                        actions: vec![Action::output(out_port)],
                    },
                }))
            }
            None => {
                debug!(
                    component = COMPONENT,
                    dpid = %packet_in.dpid,
                    buffer_id = packet_in.buffer_id,
                    "flooding"
                );
                let data = if packet_in.buffer_id == OFP_NO_BUFFER {
                    packet_in.frame.clone()
                } else {
                    Bytes::new()
                };
                Some(BusEvent::AppPacketOut(SwitchCommand {
                    dpid: packet_in.dpid,
                    session_id: packet_in.session_id.clone(),
                    xid: PACKET_OUT_XID,
                    body: PacketOut {
                        buffer_id: packet_in.buffer_id,
                        in_port,
                        actions: vec![Action::output(ports::OFPP_FLOOD)],
                        data,
                    },
                }))
            }
        }
    }

    fn on_flow_removed(&self, removed: &FlowRemovedEvent) {
        let destination = MacAddr::from(removed.body.flow_match.dl_dst);
        let port = self
            .tables
            .borrow_mut()
            .get_mut(&removed.dpid)
            .and_then(|table| table.remove(&destination));
        if let Some(port) = port {
            self.log("flushed mac", removed.dpid, destination, port);
        }
    }

    fn forget_device(&self, dpid: DatapathId) {
        if let Some(table) = self.tables.borrow_mut().remove(&dpid) {
            debug!(
                component = COMPONENT,
                dpid = %dpid,
                entries = table.len(),
                "device removed, dropping its table"
            );
        }
    }
}

impl Drop for LearningInner {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            for subscription in self.subscriptions.get_mut().drain(..) {
                bus.unsubscribe(subscription);
            }
        }
    }
}

fn mac_cookie(mac: MacAddr) -> u64 {
    let mut cookie = [0u8; 8];
    cookie[2..].copy_from_slice(&mac.octets());
    u64::from_be_bytes(cookie)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ofc_controller::packet::{EthernetDecoder, PacketDecoder};
    use ofc_controller::wire::FlowRemoved;
    use ofc_controller::SessionId;

    const DPID: DatapathId = DatapathId(0x42);
    const HOST_A: [u8; 6] = [0x0e, 0, 0, 0, 0, 0x0a];
    const HOST_B: [u8; 6] = [0x0e, 0, 0, 0, 0, 0x0b];

    fn frame(destination: [u8; 6], source: [u8; 6]) -> Bytes {
        let mut raw = destination.to_vec();
        raw.extend_from_slice(&source);
        raw.extend_from_slice(&[0x88, 0xb5]);
        raw.extend_from_slice(&[0u8; 46]);
        Bytes::from(raw)
    }

    fn packet_in(dpid: DatapathId, raw: Bytes, in_port: u16, buffer_id: u32) -> BusEvent {
        BusEvent::AppPacketIn(PacketInEvent {
            dpid,
            session_id: SessionId::new("10.0.0.1:40001"),
            xid: 0,
            buffer_id,
            data: EthernetDecoder.decode(&raw),
            in_port,
            reason: 0,
            total_len: raw.len() as u16,
            frame: raw,
        })
    }

    fn commands(bus: &Bus) -> Rc<RefCell<Vec<BusEvent>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        for topic in [Topic::AppFlowMod, Topic::AppPacketOut] {
            let seen = seen.clone();
            bus.subscribe(topic, move |_, event| seen.borrow_mut().push(event.clone()));
        }
        seen
    }

    #[test]
    fn unknown_destination_floods_with_frame_when_unbuffered() {
        let bus = Bus::new();
        let app = LearningSwitch::attach(&bus, LearningConfig::default());
        let seen = commands(&bus);
        let raw = frame(HOST_B, HOST_A);

        bus.publish(&packet_in(DPID, raw.clone(), 1, OFP_NO_BUFFER));

        assert_eq!(app.learned_port(DPID, MacAddr(HOST_A)), Some(1));
        let seen = seen.borrow();
        let [BusEvent::AppPacketOut(command)] = seen.as_slice() else {
            panic!("expected one packet-out, got {seen:?}");
        };
        assert_eq!(command.xid, PACKET_OUT_XID);
        assert_eq!(command.body.in_port, 1);
        assert_eq!(command.body.actions, vec![Action::output(ports::OFPP_FLOOD)]);
        assert_eq!(command.body.data, raw);
    }

    #[test]
    fn buffered_flood_does_not_carry_the_frame() {
        let bus = Bus::new();
        let _app = LearningSwitch::attach(&bus, LearningConfig::default());
        let seen = commands(&bus);

        bus.publish(&packet_in(DPID, frame([0xff; 6], HOST_A), 1, 77));

        let seen = seen.borrow();
        let [BusEvent::AppPacketOut(command)] = seen.as_slice() else {
            panic!("expected one packet-out, got {seen:?}");
        };
        assert_eq!(command.body.buffer_id, 77);
        assert!(command.body.data.is_empty());
    }

    #[test]
    fn known_destination_installs_a_flow() {
        let bus = Bus::new();
        let _app = LearningSwitch::attach(&bus, LearningConfig { debug: true });
        bus.publish(&packet_in(DPID, frame(HOST_A, HOST_B), 2, 5));
        let seen = commands(&bus);

        bus.publish(&packet_in(DPID, frame(HOST_B, HOST_A), 1, 6));

        let seen = seen.borrow();
        let [BusEvent::AppFlowMod(command)] = seen.as_slice() else {
            panic!("expected one flow-mod, got {seen:?}");
        };
        assert_eq!(command.dpid, DPID);
        assert_eq!(command.xid, FLOW_MOD_XID);
        let flow = &command.body;
        assert_eq!(flow.flow_match, Match::for_destination(HOST_B, OFP_VLAN_NONE));
        assert_eq!(flow.cookie, 0x0e00_0000_000b);
        assert_eq!(flow.command, FlowModCommand::Add);
        assert_eq!(flow.idle_timeout, FLOW_IDLE_TIMEOUT);
        assert_eq!(flow.priority, FLOW_PRIORITY);
        assert_eq!(flow.buffer_id, 6);
        assert_eq!(flow.flags, OFPFF_SEND_FLOW_REM);
        assert_eq!(flow.actions, vec![Action::output(2)]);
    }

    #[test]
    fn broadcast_source_is_not_learned() {
        let bus = Bus::new();
        let app = LearningSwitch::attach(&bus, LearningConfig::default());

        bus.publish(&packet_in(DPID, frame(HOST_A, [0xff; 6]), 3, 1));

        assert_eq!(app.table_len(DPID), 0);
    }

    #[test]
    fn destination_on_ingress_port_is_dropped() {
        let bus = Bus::new();
        let _app = LearningSwitch::attach(&bus, LearningConfig::default());
        bus.publish(&packet_in(DPID, frame(HOST_A, HOST_B), 4, 1));
        let seen = commands(&bus);

        bus.publish(&packet_in(DPID, frame(HOST_B, HOST_A), 4, 2));

        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn flow_removed_flushes_the_destination() {
        let bus = Bus::new();
        let app = LearningSwitch::attach(&bus, LearningConfig::default());
        bus.publish(&packet_in(DPID, frame(HOST_A, HOST_B), 2, 1));
        bus.publish(&packet_in(DPID, frame(HOST_A, HOST_B), 2, 1));
        bus.publish(&packet_in(DatapathId(0x43), frame(HOST_A, HOST_B), 9, 1));

        bus.publish(&BusEvent::AppFlowRemoved(FlowRemovedEvent {
            dpid: DPID,
            session_id: SessionId::new("10.0.0.1:40001"),
            xid: 0,
            body: FlowRemoved {
                flow_match: Match::for_destination(HOST_B, OFP_VLAN_NONE),
                ..Default::default()
            },
        }));

        assert_eq!(app.learned_port(DPID, MacAddr(HOST_B)), None);
        assert_eq!(app.learned_port(DatapathId(0x43), MacAddr(HOST_B)), Some(9));
    }

    #[test]
    fn removed_device_forgets_its_table() {
        let bus = Bus::new();
        let app = LearningSwitch::attach(&bus, LearningConfig::default());
        bus.publish(&packet_in(DPID, frame(HOST_A, HOST_B), 2, 1));
        bus.publish(&packet_in(DPID, frame(HOST_B, HOST_A), 3, 1));
        bus.publish(&packet_in(DatapathId(0x43), frame(HOST_A, HOST_B), 9, 1));
        assert_eq!(app.table_len(DPID), 2);

        bus.publish(&BusEvent::DeviceRemoveRequested { dpid: DPID });

        assert_eq!(app.table_len(DPID), 0);
        assert_eq!(app.learned_port(DPID, MacAddr(HOST_A)), None);
        assert_eq!(app.learned_port(DatapathId(0x43), MacAddr(HOST_B)), Some(9));

        bus.publish(&packet_in(DPID, frame(HOST_A, HOST_B), 5, 1));
        assert_eq!(app.learned_port(DPID, MacAddr(HOST_B)), Some(5));
    }

    #[test]
    fn dropping_the_app_detaches_it() {
        let bus = Bus::new();
        let app = LearningSwitch::attach(&bus, LearningConfig::default());
        assert_eq!(bus.subscriber_count(Topic::AppPacketIn), 1);

        drop(app);
        assert_eq!(bus.subscriber_count(Topic::AppPacketIn), 0);
        assert_eq!(bus.subscriber_count(Topic::AppFlowRemoved), 0);
        assert_eq!(bus.subscriber_count(Topic::DeviceRemoveRequested), 0);
    }
}
