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

//! OpenFlow 1.0 wire codec.
//!
//! The control-plane core only depends on the contract exposed here:
//! [`FrameReconstructor`] turns raw byte chunks into complete messages (or
//! `{error, raw}` failures) and [`encode`] packs a message, sizing the buffer
//! from the encoded body itself.
//!
//! ```
//! use ofc_controller::wire::{encode, FrameReconstructor, OfBody, OfMessage, OFP_VERSION};
//!
//! let hello = OfMessage::new(OFP_VERSION, 1, OfBody::Hello(Default::default()));
//! let bytes = encode(&hello).unwrap();
//!
//! let mut frames = FrameReconstructor::new();
//! let (head, tail) = bytes.split_at(3);
//! assert!(frames.reconstruct(head).is_empty());
//! let decoded = frames.reconstruct(tail);
//! assert_eq!(decoded.len(), 1);
//! assert_eq!(decoded[0].as_ref().unwrap(), &hello);
//! ```

mod body;
mod codec;
mod reconstructor;

pub use body::{
    Action, ErrorMsg, FlowModCommand, FlowRemoved, FlowMod, Match, PacketIn, PacketOut, PhyPort,
    PortMod, PortStatus, SwitchFeatures, VendorMsg,
};
pub use codec::{decode, encode, DecodeError, EncodeError};
pub use reconstructor::{FrameError, FrameReconstructor};

use bytes::Bytes;
use strum::{Display, FromRepr};

/// Highest protocol version this controller offers in its hello.
pub const OFP_VERSION: u8 = 0x01;

/// Size of the common `ofp_header`.
pub const OFP_HEADER_LEN: usize = 8;

/// Transaction id used for the handshake feature-request.
pub const FEATURES_REQUEST_XID: u32 = 2;

/// `buffer_id` meaning "packet not buffered on the device".
pub const OFP_NO_BUFFER: u32 = 0xffff_ffff;

/// Reserved port numbers.
pub mod ports {
    pub const OFPP_MAX: u16 = 0xff00;
    pub const OFPP_IN_PORT: u16 = 0xfff8;
    pub const OFPP_TABLE: u16 = 0xfff9;
    pub const OFPP_NORMAL: u16 = 0xfffa;
    pub const OFPP_FLOOD: u16 = 0xfffb;
    pub const OFPP_ALL: u16 = 0xfffc;
    pub const OFPP_CONTROLLER: u16 = 0xfffd;
    pub const OFPP_LOCAL: u16 = 0xfffe;
    pub const OFPP_NONE: u16 = 0xffff;
}

/// `ofp_flow_mod_flags`.
pub const OFPFF_SEND_FLOW_REM: u16 = 1 << 0;

/// Explicit message-type tag, dispatched with `match`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, FromRepr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum MessageType {
    Hello = 0,
    Error = 1,
    EchoRequest = 2,
    EchoReply = 3,
    Vendor = 4,
    FeaturesRequest = 5,
    FeaturesReply = 6,
    GetConfigRequest = 7,
    GetConfigReply = 8,
    SetConfig = 9,
    PacketIn = 10,
    FlowRemoved = 11,
    PortStatus = 12,
    PacketOut = 13,
    FlowMod = 14,
    PortMod = 15,
    StatsRequest = 16,
    StatsReply = 17,
    BarrierRequest = 18,
    BarrierReply = 19,
    QueueGetConfigRequest = 20,
    QueueGetConfigReply = 21,
}

/// Type-specific message body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OfBody {
    Hello(Bytes),
    Error(ErrorMsg),
    EchoRequest(Bytes),
    EchoReply(Bytes),
    Vendor(VendorMsg),
    FeaturesRequest,
    FeaturesReply(SwitchFeatures),
    PacketIn(PacketIn),
    FlowRemoved(FlowRemoved),
    PortStatus(PortStatus),
    PacketOut(PacketOut),
    FlowMod(FlowMod),
    PortMod(PortMod),
    /// A known message type whose body this codec carries opaquely.
    Unparsed {
        message_type: MessageType,
        payload: Bytes,
    },
}

impl OfBody {
    pub fn message_type(&self) -> MessageType {
        match self {
            OfBody::Hello(_) => MessageType::Hello,
            OfBody::Error(_) => MessageType::Error,
            OfBody::EchoRequest(_) => MessageType::EchoRequest,
            OfBody::EchoReply(_) => MessageType::EchoReply,
            OfBody::Vendor(_) => MessageType::Vendor,
            OfBody::FeaturesRequest => MessageType::FeaturesRequest,
            OfBody::FeaturesReply(_) => MessageType::FeaturesReply,
            OfBody::PacketIn(_) => MessageType::PacketIn,
            OfBody::FlowRemoved(_) => MessageType::FlowRemoved,
            OfBody::PortStatus(_) => MessageType::PortStatus,
            OfBody::PacketOut(_) => MessageType::PacketOut,
            OfBody::FlowMod(_) => MessageType::FlowMod,
            OfBody::PortMod(_) => MessageType::PortMod,
            OfBody::Unparsed { message_type, .. } => *message_type,
        }
    }
}

/// Minimal message envelope: version, transaction id and body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OfMessage {
    pub version: u8,
    pub xid: u32,
    pub body: OfBody,
}

impl OfMessage {
    pub fn new(version: u8, xid: u32, body: OfBody) -> Self {
        Self { version, xid, body }
    }

    pub fn message_type(&self) -> MessageType {
        self.body.message_type()
    }
}
