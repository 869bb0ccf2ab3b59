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

//! The event catalogue: topics and their typed payloads.

use bytes::Bytes;
use std::net::SocketAddr;
use strum::{Display, EnumIter};

use crate::data_plane::SessionSnapshot;
use crate::identity::{DatapathId, ListenerId, SessionId, TransportKind};
use crate::packet::DecodedPacket;
use crate::wire::{FlowMod, FlowRemoved, PacketOut, PortMod, SwitchFeatures};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum Topic {
    #[strum(serialize = "server.started")]
    ServerStarted,
    #[strum(serialize = "server.connection")]
    ServerConnection,
    #[strum(serialize = "device.createRequested")]
    DeviceCreateRequested,
    #[strum(serialize = "device.created")]
    DeviceCreated,
    #[strum(serialize = "device.removeRequested")]
    DeviceRemoveRequested,
    #[strum(serialize = "session.handOff")]
    SessionHandOff,
    #[strum(serialize = "app.packetIn")]
    AppPacketIn,
    #[strum(serialize = "app.flowRemoved")]
    AppFlowRemoved,
    #[strum(serialize = "app.packetOut")]
    AppPacketOut,
    #[strum(serialize = "app.flowMod")]
    AppFlowMod,
    #[strum(serialize = "app.portMod")]
    AppPortMod,
}

#[derive(Clone, Debug)]
pub struct ServerStarted {
    pub listener: ListenerId,
    pub address: String,
    pub port: u16,
    /// Bound address; differs from `port` when port 0 was requested.
    pub local_addr: SocketAddr,
    pub transport: TransportKind,
}

#[derive(Clone, Debug)]
pub struct ServerConnection {
    pub listener: ListenerId,
    pub session_id: SessionId,
    pub remote_addr: SocketAddr,
    pub local_addr: SocketAddr,
    pub transport: TransportKind,
}

/// Device-originated packet-in, decoded for applications.
#[derive(Clone, Debug)]
pub struct PacketInEvent {
    pub dpid: DatapathId,
    pub session_id: SessionId,
    pub xid: u32,
    pub buffer_id: u32,
    pub data: DecodedPacket,
    pub in_port: u16,
    pub reason: u8,
    pub total_len: u16,
    /// The embedded frame as received.
    pub frame: Bytes,
}

#[derive(Clone, Debug)]
pub struct FlowRemovedEvent {
    pub dpid: DatapathId,
    pub session_id: SessionId,
    pub xid: u32,
    pub body: FlowRemoved,
}

/// Application-originated command addressed to one session of one device.
#[derive(Clone, Debug)]
pub struct SwitchCommand<T> {
    pub dpid: DatapathId,
    pub session_id: SessionId,
    pub xid: u32,
    pub body: T,
}

#[derive(Clone, Debug)]
pub enum BusEvent {
    ServerStarted(ServerStarted),
    ServerConnection(ServerConnection),
    DeviceCreateRequested {
        dpid: DatapathId,
        features: SwitchFeatures,
    },
    DeviceCreated {
        dpid: DatapathId,
    },
    DeviceRemoveRequested {
        dpid: DatapathId,
    },
    SessionHandOff {
        dpid: DatapathId,
        snapshot: SessionSnapshot,
    },
    AppPacketIn(PacketInEvent),
    AppFlowRemoved(FlowRemovedEvent),
    AppPacketOut(SwitchCommand<PacketOut>),
    AppFlowMod(SwitchCommand<FlowMod>),
    AppPortMod(SwitchCommand<PortMod>),
}

impl BusEvent {
    pub fn topic(&self) -> Topic {
        match self {
            BusEvent::ServerStarted(_) => Topic::ServerStarted,
            BusEvent::ServerConnection(_) => Topic::ServerConnection,
            BusEvent::DeviceCreateRequested { .. } => Topic::DeviceCreateRequested,
            BusEvent::DeviceCreated { .. } => Topic::DeviceCreated,
            BusEvent::DeviceRemoveRequested { .. } => Topic::DeviceRemoveRequested,
            BusEvent::SessionHandOff { .. } => Topic::SessionHandOff,
            BusEvent::AppPacketIn(_) => Topic::AppPacketIn,
            BusEvent::AppFlowRemoved(_) => Topic::AppFlowRemoved,
            BusEvent::AppPacketOut(_) => Topic::AppPacketOut,
            BusEvent::AppFlowMod(_) => Topic::AppFlowMod,
            BusEvent::AppPortMod(_) => Topic::AppPortMod,
        }
    }
}
