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

//! Typed OpenFlow 1.0 message bodies.

use bytes::Bytes;

/// `ofp_phy_port`: one port description in a feature-reply or port-status.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PhyPort {
    pub port_no: u16,
    pub hw_addr: [u8; 6],
    pub name: String,
    pub config: u32,
    pub state: u32,
    pub curr: u32,
    pub advertised: u32,
    pub supported: u32,
    pub peer: u32,
}

/// `ofp_switch_features`: the feature-reply body.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SwitchFeatures {
    pub datapath_id: u64,
    pub n_buffers: u32,
    pub n_tables: u8,
    pub capabilities: u32,
    pub actions: u32,
    pub ports: Vec<PhyPort>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorMsg {
    pub error_type: u16,
    pub code: u16,
    pub data: Bytes,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VendorMsg {
    pub vendor: u32,
    pub data: Bytes,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacketIn {
    pub buffer_id: u32,
    pub total_len: u16,
    pub in_port: u16,
    pub reason: u8,
    pub data: Bytes,
}

/// `ofp_match`, the fixed 40-byte OpenFlow 1.0 flow match.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Match {
    pub wildcards: u32,
    pub in_port: u16,
    pub dl_src: [u8; 6],
    pub dl_dst: [u8; 6],
    pub dl_vlan: u16,
    pub dl_vlan_pcp: u8,
    pub dl_type: u16,
    pub nw_tos: u8,
    pub nw_proto: u8,
    pub nw_src: u32,
    pub nw_dst: u32,
    pub tp_src: u16,
    pub tp_dst: u16,
}

impl Match {
    pub const OFPFW_IN_PORT: u32 = 1 << 0;
    pub const OFPFW_DL_VLAN: u32 = 1 << 1;
    pub const OFPFW_DL_SRC: u32 = 1 << 2;
    pub const OFPFW_DL_DST: u32 = 1 << 3;
    pub const OFPFW_DL_TYPE: u32 = 1 << 4;
    pub const OFPFW_NW_PROTO: u32 = 1 << 5;
    pub const OFPFW_TP_SRC: u32 = 1 << 6;
    pub const OFPFW_TP_DST: u32 = 1 << 7;
    pub const OFPFW_NW_SRC_ALL: u32 = 32 << 8;
    pub const OFPFW_NW_DST_ALL: u32 = 32 << 14;
    pub const OFPFW_DL_VLAN_PCP: u32 = 1 << 20;
    pub const OFPFW_NW_TOS: u32 = 1 << 21;
    pub const OFPFW_ALL: u32 = (1 << 22) - 1;

    /// Match everything except the destination MAC and VLAN id.
    pub fn for_destination(dl_dst: [u8; 6], dl_vlan: u16) -> Self {
        Self {
            wildcards: Self::OFPFW_ALL & !(Self::OFPFW_DL_DST | Self::OFPFW_DL_VLAN),
            dl_dst,
            dl_vlan,
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlowRemoved {
    pub flow_match: Match,
    pub cookie: u64,
    pub priority: u16,
    pub reason: u8,
    pub duration_sec: u32,
    pub duration_nsec: u32,
    pub idle_timeout: u16,
    pub packet_count: u64,
    pub byte_count: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortStatus {
    pub reason: u8,
    pub desc: PhyPort,
}

/// `ofp_action_*` variants; unknown kinds keep their raw body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Output { port: u16, max_len: u16 },
    SetVlanVid(u16),
    SetVlanPcp(u8),
    StripVlan,
    SetDlSrc([u8; 6]),
    SetDlDst([u8; 6]),
    SetNwSrc(u32),
    SetNwDst(u32),
    SetNwTos(u8),
    SetTpSrc(u16),
    SetTpDst(u16),
    Enqueue { port: u16, queue_id: u32 },
    Unknown { kind: u16, body: Bytes },
}

impl Action {
    pub fn output(port: u16) -> Self {
        Action::Output { port, max_len: 0 }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacketOut {
    pub buffer_id: u32,
    pub in_port: u16,
    pub actions: Vec<Action>,
    pub data: Bytes,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum FlowModCommand {
    Add = 0,
    Modify = 1,
    ModifyStrict = 2,
    Delete = 3,
    DeleteStrict = 4,
}

impl FlowModCommand {
    pub(crate) fn from_wire(value: u16) -> Option<Self> {
        match value {
            0 => Some(FlowModCommand::Add),
            1 => Some(FlowModCommand::Modify),
            2 => Some(FlowModCommand::ModifyStrict),
            3 => Some(FlowModCommand::Delete),
            4 => Some(FlowModCommand::DeleteStrict),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowMod {
    pub flow_match: Match,
    pub cookie: u64,
    pub command: FlowModCommand,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    pub priority: u16,
    pub buffer_id: u32,
    pub out_port: u16,
    pub flags: u16,
    pub actions: Vec<Action>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortMod {
    pub port_no: u16,
    pub hw_addr: [u8; 6],
    pub config: u32,
    pub mask: u32,
    pub advertise: u32,
}
