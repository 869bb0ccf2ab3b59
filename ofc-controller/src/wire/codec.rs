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

//! Pack and unpack single OpenFlow 1.0 frames.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use super::body::{
    Action, ErrorMsg, FlowMod, FlowModCommand, FlowRemoved, Match, PacketIn, PacketOut, PhyPort,
    PortMod, PortStatus, SwitchFeatures, VendorMsg,
};
use super::{MessageType, OfBody, OfMessage, OFP_HEADER_LEN};

const MATCH_LEN: usize = 40;
const PHY_PORT_LEN: usize = 48;
const PORT_NAME_LEN: usize = 16;
const ACTION_HEADER_LEN: usize = 4;

const FEATURES_REPLY_FIXED: usize = 24;
const PACKET_IN_FIXED: usize = 10;
const FLOW_REMOVED_BODY: usize = 80;
const PORT_STATUS_BODY: usize = 56;
const PACKET_OUT_FIXED: usize = 8;
const FLOW_MOD_FIXED: usize = 64;
const PORT_MOD_BODY: usize = 24;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("frame holds {available} bytes, at least {needed} required")]
    Truncated { needed: usize, available: usize },
    #[error("header declares length {0}, shorter than the header itself")]
    InvalidLength(usize),
    #[error("header declares length {declared}, frame holds {actual} bytes")]
    LengthMismatch { declared: usize, actual: usize },
    #[error("unknown message type {0}")]
    UnknownType(u8),
    #[error("malformed {message_type} body: {reason}")]
    Malformed {
        message_type: MessageType,
        reason: &'static str,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("encoded {message_type} is {len} bytes, larger than the 16-bit length field")]
    TooLarge { message_type: MessageType, len: usize },
    #[error("action {kind} has a {len}-byte body; actions must be padded to 8 bytes")]
    MisalignedAction { kind: u16, len: usize },
}

/// Encodes `message` into one frame.
///
/// The buffer is sized from the encoded body, so variable-length bodies
/// (port lists, action lists, payloads) are always covered.
pub fn encode(message: &OfMessage) -> Result<Bytes, EncodeError> {
    let mut body = BytesMut::new();
    write_body(&message.body, &mut body)?;

    let message_type = message.message_type();
    let len = OFP_HEADER_LEN + body.len();
    let wire_len = u16::try_from(len).map_err(|_| EncodeError::TooLarge { message_type, len })?;

    let mut frame = BytesMut::with_capacity(len);
    frame.put_u8(message.version);
    frame.put_u8(message_type as u8);
    frame.put_u16(wire_len);
    frame.put_u32(message.xid);
    frame.extend_from_slice(&body);
    Ok(frame.freeze())
}

/// Decodes exactly one complete frame.
pub fn decode(frame: Bytes) -> Result<OfMessage, DecodeError> {
    if frame.len() < OFP_HEADER_LEN {
        return Err(DecodeError::Truncated {
            needed: OFP_HEADER_LEN,
            available: frame.len(),
        });
    }

    let mut buf = frame;
    let version = buf.get_u8();
    let type_byte = buf.get_u8();
    let declared = usize::from(buf.get_u16());
    let xid = buf.get_u32();

    if declared < OFP_HEADER_LEN {
        return Err(DecodeError::InvalidLength(declared));
    }
    let actual = buf.len() + OFP_HEADER_LEN;
    if declared != actual {
        return Err(DecodeError::LengthMismatch { declared, actual });
    }

    let message_type =
        MessageType::from_repr(type_byte).ok_or(DecodeError::UnknownType(type_byte))?;
    let body = read_body(message_type, buf)?;
    Ok(OfMessage::new(version, xid, body))
}

fn write_body(body: &OfBody, out: &mut BytesMut) -> Result<(), EncodeError> {
    match body {
        OfBody::Hello(payload) | OfBody::EchoRequest(payload) | OfBody::EchoReply(payload) => {
            out.extend_from_slice(payload);
        }
        OfBody::Error(error) => {
            out.put_u16(error.error_type);
            out.put_u16(error.code);
            out.extend_from_slice(&error.data);
        }
        OfBody::Vendor(vendor) => {
            out.put_u32(vendor.vendor);
            out.extend_from_slice(&vendor.data);
        }
        OfBody::FeaturesRequest => {}
        OfBody::FeaturesReply(features) => {
            out.put_u64(features.datapath_id);
            out.put_u32(features.n_buffers);
            out.put_u8(features.n_tables);
            out.put_bytes(0, 3);
            out.put_u32(features.capabilities);
            out.put_u32(features.actions);
            for port in &features.ports {
                write_phy_port(port, out);
            }
        }
        OfBody::PacketIn(packet_in) => {
            out.put_u32(packet_in.buffer_id);
            out.put_u16(packet_in.total_len);
            out.put_u16(packet_in.in_port);
            out.put_u8(packet_in.reason);
            out.put_u8(0);
            out.extend_from_slice(&packet_in.data);
        }
        OfBody::FlowRemoved(removed) => {
            write_match(&removed.flow_match, out);
            out.put_u64(removed.cookie);
            out.put_u16(removed.priority);
            out.put_u8(removed.reason);
            out.put_u8(0);
            out.put_u32(removed.duration_sec);
            out.put_u32(removed.duration_nsec);
            out.put_u16(removed.idle_timeout);
            out.put_bytes(0, 2);
            out.put_u64(removed.packet_count);
            out.put_u64(removed.byte_count);
        }
        OfBody::PortStatus(status) => {
            out.put_u8(status.reason);
            out.put_bytes(0, 7);
            write_phy_port(&status.desc, out);
        }
        OfBody::PacketOut(packet_out) => {
            let mut actions = BytesMut::new();
            write_actions(&packet_out.actions, &mut actions)?;
            let actions_len = u16::try_from(actions.len()).map_err(|_| EncodeError::TooLarge {
                message_type: MessageType::PacketOut,
                len: actions.len(),
            })?;
            out.put_u32(packet_out.buffer_id);
            out.put_u16(packet_out.in_port);
            out.put_u16(actions_len);
            out.extend_from_slice(&actions);
            out.extend_from_slice(&packet_out.data);
        }
        OfBody::FlowMod(flow_mod) => {
            write_match(&flow_mod.flow_match, out);
            out.put_u64(flow_mod.cookie);
            out.put_u16(flow_mod.command as u16);
            out.put_u16(flow_mod.idle_timeout);
            out.put_u16(flow_mod.hard_timeout);
            out.put_u16(flow_mod.priority);
            out.put_u32(flow_mod.buffer_id);
            out.put_u16(flow_mod.out_port);
            out.put_u16(flow_mod.flags);
            write_actions(&flow_mod.actions, out)?;
        }
        OfBody::PortMod(port_mod) => {
            out.put_u16(port_mod.port_no);
            out.extend_from_slice(&port_mod.hw_addr);
            out.put_u32(port_mod.config);
            out.put_u32(port_mod.mask);
            out.put_u32(port_mod.advertise);
            out.put_bytes(0, 4);
        }
        OfBody::Unparsed { payload, .. } => out.extend_from_slice(payload),
    }
    Ok(())
}

fn write_phy_port(port: &PhyPort, out: &mut BytesMut) {
    out.put_u16(port.port_no);
    out.extend_from_slice(&port.hw_addr);
    let mut name = [0u8; PORT_NAME_LEN];
    // Keep one trailing NUL.
    let copied = port.name.len().min(PORT_NAME_LEN - 1);
    name[..copied].copy_from_slice(&port.name.as_bytes()[..copied]);
    out.extend_from_slice(&name);
    out.put_u32(port.config);
    out.put_u32(port.state);
    out.put_u32(port.curr);
    out.put_u32(port.advertised);
    out.put_u32(port.supported);
    out.put_u32(port.peer);
}

fn write_match(flow_match: &Match, out: &mut BytesMut) {
    out.put_u32(flow_match.wildcards);
    out.put_u16(flow_match.in_port);
    out.extend_from_slice(&flow_match.dl_src);
    out.extend_from_slice(&flow_match.dl_dst);
    out.put_u16(flow_match.dl_vlan);
    out.put_u8(flow_match.dl_vlan_pcp);
    out.put_u8(0);
    out.put_u16(flow_match.dl_type);
    out.put_u8(flow_match.nw_tos);
    out.put_u8(flow_match.nw_proto);
    out.put_bytes(0, 2);
    out.put_u32(flow_match.nw_src);
    out.put_u32(flow_match.nw_dst);
    out.put_u16(flow_match.tp_src);
    out.put_u16(flow_match.tp_dst);
}

fn write_actions(actions: &[Action], out: &mut BytesMut) -> Result<(), EncodeError> {
    for action in actions {
        match action {
            Action::Output { port, max_len } => {
                action_header(out, 0, 8);
                out.put_u16(*port);
                out.put_u16(*max_len);
            }
            Action::SetVlanVid(vid) => {
                action_header(out, 1, 8);
                out.put_u16(*vid);
                out.put_bytes(0, 2);
            }
            Action::SetVlanPcp(pcp) => {
                action_header(out, 2, 8);
                out.put_u8(*pcp);
                out.put_bytes(0, 3);
            }
            Action::StripVlan => {
                action_header(out, 3, 8);
                out.put_bytes(0, 4);
            }
            Action::SetDlSrc(addr) | Action::SetDlDst(addr) => {
                let kind = if matches!(action, Action::SetDlSrc(_)) { 4 } else { 5 };
                action_header(out, kind, 16);
                out.extend_from_slice(addr);
                out.put_bytes(0, 6);
            }
            Action::SetNwSrc(addr) | Action::SetNwDst(addr) => {
                let kind = if matches!(action, Action::SetNwSrc(_)) { 6 } else { 7 };
                action_header(out, kind, 8);
                out.put_u32(*addr);
            }
            Action::SetNwTos(tos) => {
                action_header(out, 8, 8);
                out.put_u8(*tos);
                out.put_bytes(0, 3);
            }
            Action::SetTpSrc(port) | Action::SetTpDst(port) => {
                let kind = if matches!(action, Action::SetTpSrc(_)) { 9 } else { 10 };
                action_header(out, kind, 8);
                out.put_u16(*port);
                out.put_bytes(0, 2);
            }
            Action::Enqueue { port, queue_id } => {
                action_header(out, 11, 16);
                out.put_u16(*port);
                out.put_bytes(0, 6);
                out.put_u32(*queue_id);
            }
            Action::Unknown { kind, body } => {
                let len = ACTION_HEADER_LEN + body.len();
                if len % 8 != 0 {
                    return Err(EncodeError::MisalignedAction {
                        kind: *kind,
                        len: body.len(),
                    });
                }
                let wire_len = u16::try_from(len).map_err(|_| EncodeError::MisalignedAction {
                    kind: *kind,
                    len: body.len(),
                })?;
                action_header(out, *kind, wire_len);
                out.extend_from_slice(body);
            }
        }
    }
    Ok(())
}

fn action_header(out: &mut BytesMut, kind: u16, len: u16) {
    out.put_u16(kind);
    out.put_u16(len);
}

fn ensure(
    buf: &Bytes,
    needed: usize,
    message_type: MessageType,
    reason: &'static str,
) -> Result<(), DecodeError> {
    if buf.len() < needed {
        return Err(DecodeError::Malformed {
            message_type,
            reason,
        });
    }
    Ok(())
}

fn read_body(message_type: MessageType, mut buf: Bytes) -> Result<OfBody, DecodeError> {
    let body = match message_type {
        MessageType::Hello => OfBody::Hello(buf),
        MessageType::EchoRequest => OfBody::EchoRequest(buf),
        MessageType::EchoReply => OfBody::EchoReply(buf),
        MessageType::Error => {
            ensure(&buf, 4, message_type, "error header shorter than 4 bytes")?;
            let error_type = buf.get_u16();
            let code = buf.get_u16();
            OfBody::Error(ErrorMsg {
                error_type,
                code,
                data: buf,
            })
        }
        MessageType::Vendor => {
            ensure(&buf, 4, message_type, "missing vendor id")?;
            let vendor = buf.get_u32();
            OfBody::Vendor(VendorMsg { vendor, data: buf })
        }
        MessageType::FeaturesRequest => OfBody::FeaturesRequest,
        MessageType::FeaturesReply => {
            ensure(&buf, FEATURES_REPLY_FIXED, message_type, "fixed part truncated")?;
            let datapath_id = buf.get_u64();
            let n_buffers = buf.get_u32();
            let n_tables = buf.get_u8();
            buf.advance(3);
            let capabilities = buf.get_u32();
            let actions = buf.get_u32();
            if buf.len() % PHY_PORT_LEN != 0 {
                return Err(DecodeError::Malformed {
                    message_type,
                    reason: "port list is not a multiple of 48 bytes",
                });
            }
            let mut ports = Vec::with_capacity(buf.len() / PHY_PORT_LEN);
            while buf.has_remaining() {
                ports.push(read_phy_port(&mut buf));
            }
            OfBody::FeaturesReply(SwitchFeatures {
                datapath_id,
                n_buffers,
                n_tables,
                capabilities,
                actions,
                ports,
            })
        }
        MessageType::PacketIn => {
            ensure(&buf, PACKET_IN_FIXED, message_type, "fixed part truncated")?;
            let buffer_id = buf.get_u32();
            let total_len = buf.get_u16();
            let in_port = buf.get_u16();
            let reason = buf.get_u8();
            buf.advance(1);
            OfBody::PacketIn(PacketIn {
                buffer_id,
                total_len,
                in_port,
                reason,
                data: buf,
            })
        }
        MessageType::FlowRemoved => {
            ensure(&buf, FLOW_REMOVED_BODY, message_type, "body truncated")?;
            let flow_match = read_match(&mut buf);
            let cookie = buf.get_u64();
            let priority = buf.get_u16();
            let reason = buf.get_u8();
            buf.advance(1);
            let duration_sec = buf.get_u32();
            let duration_nsec = buf.get_u32();
            let idle_timeout = buf.get_u16();
            buf.advance(2);
            let packet_count = buf.get_u64();
            let byte_count = buf.get_u64();
            OfBody::FlowRemoved(FlowRemoved {
                flow_match,
                cookie,
                priority,
                reason,
                duration_sec,
                duration_nsec,
                idle_timeout,
                packet_count,
                byte_count,
            })
        }
        MessageType::PortStatus => {
            ensure(&buf, PORT_STATUS_BODY, message_type, "body truncated")?;
            let reason = buf.get_u8();
            buf.advance(7);
            let desc = read_phy_port(&mut buf);
            OfBody::PortStatus(PortStatus { reason, desc })
        }
        MessageType::PacketOut => {
            ensure(&buf, PACKET_OUT_FIXED, message_type, "fixed part truncated")?;
            let buffer_id = buf.get_u32();
            let in_port = buf.get_u16();
            let actions_len = usize::from(buf.get_u16());
            ensure(&buf, actions_len, message_type, "action list overruns frame")?;
            let actions = read_actions(buf.split_to(actions_len), message_type)?;
            OfBody::PacketOut(PacketOut {
                buffer_id,
                in_port,
                actions,
                data: buf,
            })
        }
        MessageType::FlowMod => {
            ensure(&buf, FLOW_MOD_FIXED, message_type, "fixed part truncated")?;
            let flow_match = read_match(&mut buf);
            let cookie = buf.get_u64();
            let command = FlowModCommand::from_wire(buf.get_u16()).ok_or(
                DecodeError::Malformed {
                    message_type,
                    reason: "unknown flow-mod command",
                },
            )?;
            let idle_timeout = buf.get_u16();
            let hard_timeout = buf.get_u16();
            let priority = buf.get_u16();
            let buffer_id = buf.get_u32();
            let out_port = buf.get_u16();
            let flags = buf.get_u16();
            let actions = read_actions(buf, message_type)?;
            OfBody::FlowMod(FlowMod {
                flow_match,
                cookie,
                command,
                idle_timeout,
                hard_timeout,
                priority,
                buffer_id,
                out_port,
                flags,
                actions,
            })
        }
        MessageType::PortMod => {
            ensure(&buf, PORT_MOD_BODY, message_type, "body truncated")?;
            let port_no = buf.get_u16();
            let mut hw_addr = [0u8; 6];
            buf.copy_to_slice(&mut hw_addr);
            let config = buf.get_u32();
            let mask = buf.get_u32();
            let advertise = buf.get_u32();
            OfBody::PortMod(PortMod {
                port_no,
                hw_addr,
                config,
                mask,
                advertise,
            })
        }
        other => OfBody::Unparsed {
            message_type: other,
            payload: buf,
        },
    };
    Ok(body)
}

fn read_phy_port(buf: &mut Bytes) -> PhyPort {
    let port_no = buf.get_u16();
    let mut hw_addr = [0u8; 6];
    buf.copy_to_slice(&mut hw_addr);
    let raw_name = buf.split_to(PORT_NAME_LEN);
    let name_end = raw_name
        .iter()
        .position(|byte| *byte == 0)
        .unwrap_or(PORT_NAME_LEN);
    let name = String::from_utf8_lossy(&raw_name[..name_end]).into_owned();
    PhyPort {
        port_no,
        hw_addr,
        name,
        config: buf.get_u32(),
        state: buf.get_u32(),
        curr: buf.get_u32(),
        advertised: buf.get_u32(),
        supported: buf.get_u32(),
        peer: buf.get_u32(),
    }
}

fn read_match(buf: &mut Bytes) -> Match {
    let mut raw = buf.split_to(MATCH_LEN);
    let wildcards = raw.get_u32();
    let in_port = raw.get_u16();
    let mut dl_src = [0u8; 6];
    raw.copy_to_slice(&mut dl_src);
    let mut dl_dst = [0u8; 6];
    raw.copy_to_slice(&mut dl_dst);
    let dl_vlan = raw.get_u16();
    let dl_vlan_pcp = raw.get_u8();
    raw.advance(1);
    let dl_type = raw.get_u16();
    let nw_tos = raw.get_u8();
    let nw_proto = raw.get_u8();
    raw.advance(2);
    Match {
        wildcards,
        in_port,
        dl_src,
        dl_dst,
        dl_vlan,
        dl_vlan_pcp,
        dl_type,
        nw_tos,
        nw_proto,
        nw_src: raw.get_u32(),
        nw_dst: raw.get_u32(),
        tp_src: raw.get_u16(),
        tp_dst: raw.get_u16(),
    }
}

fn read_actions(mut buf: Bytes, message_type: MessageType) -> Result<Vec<Action>, DecodeError> {
    let mut actions = Vec::new();
    while buf.has_remaining() {
        ensure(&buf, ACTION_HEADER_LEN, message_type, "action header truncated")?;
        let kind = buf.get_u16();
        let len = usize::from(buf.get_u16());
        if len < 8 || len % 8 != 0 {
            return Err(DecodeError::Malformed {
                message_type,
                reason: "action length is not a positive multiple of 8",
            });
        }
        ensure(&buf, len - ACTION_HEADER_LEN, message_type, "action overruns list")?;
        let mut body = buf.split_to(len - ACTION_HEADER_LEN);
        let action = match (kind, len) {
            (0, 8) => Action::Output {
                port: body.get_u16(),
                max_len: body.get_u16(),
            },
            (1, 8) => Action::SetVlanVid(body.get_u16()),
            (2, 8) => Action::SetVlanPcp(body.get_u8()),
            (3, 8) => Action::StripVlan,
            (4 | 5, 16) => {
                let mut addr = [0u8; 6];
                body.copy_to_slice(&mut addr);
                if kind == 4 {
                    Action::SetDlSrc(addr)
                } else {
                    Action::SetDlDst(addr)
                }
            }
            (6, 8) => Action::SetNwSrc(body.get_u32()),
            (7, 8) => Action::SetNwDst(body.get_u32()),
            (8, 8) => Action::SetNwTos(body.get_u8()),
            (9, 8) => Action::SetTpSrc(body.get_u16()),
            (10, 8) => Action::SetTpDst(body.get_u16()),
            (11, 16) => {
                let port = body.get_u16();
                body.advance(6);
                Action::Enqueue {
                    port,
                    queue_id: body.get_u32(),
                }
            }
            _ => Action::Unknown { kind, body },
        };
        actions.push(action);
    }
    Ok(actions)
}
