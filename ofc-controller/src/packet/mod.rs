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

//! Forwarded-packet decoding.
//!
//! Packet-in messages embed the frame the device could not forward. The
//! switch hands those bytes to a [`PacketDecoder`] and passes the result to
//! applications untouched. Every layer is optional: a protocol the decoder
//! does not understand ends the walk and leaves a [`DecodeGap`] behind.

mod ethernet;
mod layers;

pub use ethernet::EthernetDecoder;
pub use layers::{
    ArpPacket, DnsHeader, DnsMessage, DnsQuestion, EthernetFrame, IcmpMessage, IgmpMessage,
    Ipv4Packet, Ipv6Packet, NetworkLayer, TcpSegment, TransportLayer, UdpDatagram, VlanTag,
};

use std::fmt;

/// Decodes raw link-layer frames into a layered structure.
pub trait PacketDecoder {
    fn decode(&self, raw: &[u8]) -> DecodedPacket;
}

/// Six-octet hardware address.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub const BROADCAST: MacAddr = MacAddr([0xff; 6]);

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Group bit set (broadcast included).
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 == 0x01
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl From<[u8; 6]> for MacAddr {
    fn from(value: [u8; 6]) -> Self {
        Self(value)
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// A point where decoding stopped early.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodeGap {
    pub layer: &'static str,
    pub protocol: u16,
    pub reason: &'static str,
}

/// Result of decoding one forwarded frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecodedPacket {
    pub ethernet: Option<EthernetFrame>,
    pub gaps: Vec<DecodeGap>,
}

impl DecodedPacket {
    pub fn source_mac(&self) -> Option<MacAddr> {
        self.ethernet.as_ref().map(|frame| frame.source)
    }

    pub fn destination_mac(&self) -> Option<MacAddr> {
        self.ethernet.as_ref().map(|frame| frame.destination)
    }

    pub fn network(&self) -> Option<&NetworkLayer> {
        self.ethernet.as_ref().and_then(|frame| frame.payload.as_ref())
    }

    pub fn is_complete(&self) -> bool {
        self.gaps.is_empty()
    }
}

/// One-line summary, outermost layer first.
impl fmt::Display for DecodedPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(frame) = &self.ethernet else {
            return f.write_str("undecoded frame");
        };
        write!(f, "{} > {}", frame.source, frame.destination)?;
        if let Some(vlan) = &frame.vlan {
            write!(f, " vlan {}", vlan.vid)?;
        }
        match &frame.payload {
            None => write!(f, " ethertype {:#06x}", frame.ether_type),
            Some(NetworkLayer::Arp(arp)) => {
                write!(f, " arp op {}", arp.operation)?;
                if let (Some(sender), Some(target)) = (arp.sender_ip, arp.target_ip) {
                    write!(f, " {sender} > {target}")?;
                }
                Ok(())
            }
            Some(NetworkLayer::Ipv4(ip)) => {
                write!(f, " ipv4 {} > {}", ip.source, ip.destination)?;
                write_transport(f, ip.transport.as_ref())
            }
            Some(NetworkLayer::Ipv6(ip)) => {
                write!(f, " ipv6 {} > {}", ip.source, ip.destination)?;
                write_transport(f, ip.transport.as_ref())
            }
        }
    }
}

fn write_transport(f: &mut fmt::Formatter<'_>, transport: Option<&TransportLayer>) -> fmt::Result {
    match transport {
        None => Ok(()),
        Some(TransportLayer::Tcp(tcp)) => {
            write!(f, " tcp {} > {}", tcp.source_port, tcp.destination_port)
        }
        Some(TransportLayer::Udp(udp)) => {
            write!(f, " udp {} > {}", udp.source_port, udp.destination_port)?;
            let Some(dns) = &udp.dns else {
                return Ok(());
            };
            let kind = if dns.header.is_response() { "response" } else { "query" };
            write!(f, " dns {kind} {:#06x}", dns.header.id)?;
            for question in &dns.questions {
                match question.type_name() {
                    Some(qtype) => write!(f, " {qtype} {}", question.name)?,
                    None => write!(f, " type{} {}", question.qtype, question.name)?,
                }
            }
            Ok(())
        }
        Some(TransportLayer::Icmp(icmp)) => {
            write!(f, " icmp type {} code {}", icmp.icmp_type, icmp.code)
        }
        Some(TransportLayer::Igmp(igmp)) => {
            write!(f, " igmp type {} group {}", igmp.igmp_type, igmp.group)
        }
    }
}
