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

use std::net::{Ipv4Addr, Ipv6Addr};

use super::MacAddr;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VlanTag {
    pub pcp: u8,
    pub dei: bool,
    pub vid: u16,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EthernetFrame {
    pub destination: MacAddr,
    pub source: MacAddr,
    pub vlan: Option<VlanTag>,
    pub ether_type: u16,
    pub payload: Option<NetworkLayer>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetworkLayer {
    Arp(ArpPacket),
    Ipv4(Ipv4Packet),
    Ipv6(Ipv6Packet),
}

/// Ethernet/IPv4 ARP. Other hardware/protocol pairs keep only the header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArpPacket {
    pub hardware_type: u16,
    pub protocol_type: u16,
    pub operation: u16,
    pub sender_hw: Option<MacAddr>,
    pub sender_ip: Option<Ipv4Addr>,
    pub target_hw: Option<MacAddr>,
    pub target_ip: Option<Ipv4Addr>,
}

impl ArpPacket {
    pub const REQUEST: u16 = 1;
    pub const REPLY: u16 = 2;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ipv4Packet {
    pub header_len: u8,
    pub tos: u8,
    pub total_len: u16,
    pub identification: u16,
    pub ttl: u8,
    pub protocol: u8,
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
    pub transport: Option<TransportLayer>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ipv6Packet {
    pub traffic_class: u8,
    pub flow_label: u32,
    pub payload_len: u16,
    pub next_header: u8,
    pub hop_limit: u8,
    pub source: Ipv6Addr,
    pub destination: Ipv6Addr,
    pub transport: Option<TransportLayer>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportLayer {
    Tcp(TcpSegment),
    Udp(UdpDatagram),
    Icmp(IcmpMessage),
    Igmp(IgmpMessage),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TcpSegment {
    pub source_port: u16,
    pub destination_port: u16,
    pub sequence: u32,
    pub acknowledgement: u32,
    pub data_offset: u8,
    pub flags: u16,
    pub window: u16,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UdpDatagram {
    pub source_port: u16,
    pub destination_port: u16,
    pub length: u16,
    /// Present when either port is 53.
    pub dns: Option<DnsMessage>,
}

/// DNS header and question section. Resource records are only counted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DnsMessage {
    pub header: DnsHeader,
    pub questions: Vec<DnsQuestion>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DnsHeader {
    pub id: u16,
    pub flags: u16,
    pub question_count: u16,
    pub answer_count: u16,
    pub authority_count: u16,
    pub additional_count: u16,
}

impl DnsHeader {
    pub fn is_response(&self) -> bool {
        self.flags & 0x8000 != 0
    }

    pub fn opcode(&self) -> u8 {
        ((self.flags >> 11) & 0x0f) as u8
    }

    pub fn recursion_desired(&self) -> bool {
        self.flags & 0x0100 != 0
    }

    pub fn rcode(&self) -> u8 {
        (self.flags & 0x000f) as u8
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DnsQuestion {
    pub name: String,
    pub qtype: u16,
    pub qclass: u16,
}

impl DnsQuestion {
    /// Mnemonic of `qtype`, if it is a common one.
    pub fn type_name(&self) -> Option<&'static str> {
        let name = match self.qtype {
            1 => "A",
            2 => "NS",
            5 => "CNAME",
            6 => "SOA",
            12 => "PTR",
            15 => "MX",
            16 => "TXT",
            28 => "AAAA",
            33 => "SRV",
            252 => "AXFR",
            255 => "*",
            _ => return None,
        };
        Some(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IcmpMessage {
    pub icmp_type: u8,
    pub code: u8,
    pub checksum: u16,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IgmpMessage {
    pub igmp_type: u8,
    pub max_response_time: u8,
    pub group: Ipv4Addr,
}
