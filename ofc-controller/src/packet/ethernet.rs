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

//! Ethernet II walker down to the transport header, plus DNS over UDP.

use bytes::Buf;
use std::net::{Ipv4Addr, Ipv6Addr};
use tracing::debug;

use super::layers::{
    ArpPacket, DnsHeader, DnsMessage, DnsQuestion, EthernetFrame, IcmpMessage, IgmpMessage,
    Ipv4Packet, Ipv6Packet, NetworkLayer, TcpSegment, TransportLayer, UdpDatagram, VlanTag,
};
use super::{DecodeGap, DecodedPacket, MacAddr, PacketDecoder};
use crate::observability::events;

const COMPONENT: &str = "packet_decoder";

const ETHERTYPE_IPV4: u16 = 0x0800;
const ETHERTYPE_ARP: u16 = 0x0806;
const ETHERTYPE_VLAN: u16 = 0x8100;
const ETHERTYPE_IPV6: u16 = 0x86dd;

const IPPROTO_ICMP: u8 = 1;
const IPPROTO_IGMP: u8 = 2;
const IPPROTO_TCP: u8 = 6;
const IPPROTO_UDP: u8 = 17;
const IPPROTO_ICMPV6: u8 = 58;

const DNS_PORT: u16 = 53;
const DNS_HEADER_LEN: usize = 12;

/// Default [`PacketDecoder`]: Ethernet, 802.1Q, ARP, IPv4/IPv6, TCP/UDP/ICMP/IGMP
/// and DNS questions.
#[derive(Clone, Copy, Debug, Default)]
pub struct EthernetDecoder;

impl PacketDecoder for EthernetDecoder {
    fn decode(&self, raw: &[u8]) -> DecodedPacket {
        let mut walk = Walk::default();
        let ethernet = walk.ethernet(raw);
        DecodedPacket {
            ethernet,
            gaps: walk.gaps,
        }
    }
}

#[derive(Default)]
struct Walk {
    gaps: Vec<DecodeGap>,
}

impl Walk {
    fn gap(&mut self, layer: &'static str, protocol: u16, reason: &'static str) {
        debug!(
            event = events::PACKET_DECODE_GAP,
            component = COMPONENT,
            layer,
            protocol,
            reason,
            "stopping packet decode"
        );
        self.gaps.push(DecodeGap {
            layer,
            protocol,
            reason,
        });
    }

    fn ethernet(&mut self, mut buf: &[u8]) -> Option<EthernetFrame> {
        if buf.remaining() < 14 {
            self.gap("ethernet", 0, "frame shorter than an ethernet header");
            return None;
        }
        let destination = mac(&mut buf);
        let source = mac(&mut buf);
        let mut ether_type = buf.get_u16();

        let mut vlan = None;
        if ether_type == ETHERTYPE_VLAN {
            if buf.remaining() < 4 {
                self.gap("vlan", ether_type, "truncated 802.1Q tag");
                return Some(EthernetFrame {
                    destination,
                    source,
                    vlan,
                    ether_type,
                    payload: None,
                });
            }
            let tci = buf.get_u16();
            vlan = Some(VlanTag {
                pcp: (tci >> 13) as u8,
                dei: tci & 0x1000 != 0,
                vid: tci & 0x0fff,
            });
            ether_type = buf.get_u16();
        }

        let payload = match ether_type {
            ETHERTYPE_ARP => self.arp(buf).map(NetworkLayer::Arp),
            ETHERTYPE_IPV4 => self.ipv4(buf).map(NetworkLayer::Ipv4),
            ETHERTYPE_IPV6 => self.ipv6(buf).map(NetworkLayer::Ipv6),
            other => {
                self.gap("network", other, "unsupported ether type");
                None
            }
        };

        Some(EthernetFrame {
            destination,
            source,
            vlan,
            ether_type,
            payload,
        })
    }

    fn arp(&mut self, mut buf: &[u8]) -> Option<ArpPacket> {
        if buf.remaining() < 8 {
            self.gap("arp", ETHERTYPE_ARP, "truncated arp header");
            return None;
        }
        let hardware_type = buf.get_u16();
        let protocol_type = buf.get_u16();
        let hw_len = buf.get_u8();
        let proto_len = buf.get_u8();
        let operation = buf.get_u16();

        let mut packet = ArpPacket {
            hardware_type,
            protocol_type,
            operation,
            sender_hw: None,
            sender_ip: None,
            target_hw: None,
            target_ip: None,
        };
        if hw_len != 6 || proto_len != 4 {
            self.gap("arp", protocol_type, "only ethernet/ipv4 arp addresses are decoded");
            return Some(packet);
        }
        if buf.remaining() < 20 {
            self.gap("arp", protocol_type, "truncated arp addresses");
            return Some(packet);
        }
        packet.sender_hw = Some(mac(&mut buf));
        packet.sender_ip = Some(Ipv4Addr::from(buf.get_u32()));
        packet.target_hw = Some(mac(&mut buf));
        packet.target_ip = Some(Ipv4Addr::from(buf.get_u32()));
        Some(packet)
    }

    fn ipv4(&mut self, packet: &[u8]) -> Option<Ipv4Packet> {
        let mut buf = packet;
        if buf.remaining() < 20 {
            self.gap("ipv4", ETHERTYPE_IPV4, "truncated ipv4 header");
            return None;
        }
        let version_ihl = buf.get_u8();
        let header_len = (version_ihl & 0x0f) * 4;
        let tos = buf.get_u8();
        let total_len = buf.get_u16();
        let identification = buf.get_u16();
        buf.advance(2);
        let ttl = buf.get_u8();
        let protocol = buf.get_u8();
        buf.advance(2);
        let source = Ipv4Addr::from(buf.get_u32());
        let destination = Ipv4Addr::from(buf.get_u32());

        let mut decoded = Ipv4Packet {
            header_len,
            tos,
            total_len,
            identification,
            ttl,
            protocol,
            source,
            destination,
            transport: None,
        };
        let header_len = usize::from(header_len);
        if header_len < 20 || packet.len() < header_len {
            self.gap("ipv4", ETHERTYPE_IPV4, "invalid header length");
            return Some(decoded);
        }
        // Options are skipped.
        decoded.transport = self.transport(protocol, &packet[header_len..]);
        Some(decoded)
    }

    fn ipv6(&mut self, mut buf: &[u8]) -> Option<Ipv6Packet> {
        if buf.remaining() < 40 {
            self.gap("ipv6", ETHERTYPE_IPV6, "truncated ipv6 header");
            return None;
        }
        let word = buf.get_u32();
        let payload_len = buf.get_u16();
        let next_header = buf.get_u8();
        let hop_limit = buf.get_u8();
        let source = Ipv6Addr::from(buf.get_u128());
        let destination = Ipv6Addr::from(buf.get_u128());
        let transport = self.transport(next_header, buf);
        Some(Ipv6Packet {
            traffic_class: ((word >> 20) & 0xff) as u8,
            flow_label: word & 0x000f_ffff,
            payload_len,
            next_header,
            hop_limit,
            source,
            destination,
            transport,
        })
    }

    fn transport(&mut self, protocol: u8, mut buf: &[u8]) -> Option<TransportLayer> {
        match protocol {
            IPPROTO_TCP => {
                if buf.remaining() < 20 {
                    self.gap("tcp", protocol.into(), "truncated tcp header");
                    return None;
                }
                let source_port = buf.get_u16();
                let destination_port = buf.get_u16();
                let sequence = buf.get_u32();
                let acknowledgement = buf.get_u32();
                let offset_flags = buf.get_u16();
                let window = buf.get_u16();
                Some(TransportLayer::Tcp(TcpSegment {
                    source_port,
                    destination_port,
                    sequence,
                    acknowledgement,
                    data_offset: (offset_flags >> 12) as u8,
                    flags: offset_flags & 0x01ff,
                    window,
                }))
            }
            IPPROTO_UDP => {
                if buf.remaining() < 8 {
                    self.gap("udp", protocol.into(), "truncated udp header");
                    return None;
                }
                let source_port = buf.get_u16();
                let destination_port = buf.get_u16();
                let length = buf.get_u16();
                buf.advance(2);
                let dns = if source_port == DNS_PORT || destination_port == DNS_PORT {
                    self.dns(buf)
                } else {
                    None
                };
                Some(TransportLayer::Udp(UdpDatagram {
                    source_port,
                    destination_port,
                    length,
                    dns,
                }))
            }
            IPPROTO_ICMP | IPPROTO_ICMPV6 => {
                if buf.remaining() < 4 {
                    self.gap("icmp", protocol.into(), "truncated icmp header");
                    return None;
                }
                Some(TransportLayer::Icmp(IcmpMessage {
                    icmp_type: buf.get_u8(),
                    code: buf.get_u8(),
                    checksum: buf.get_u16(),
                }))
            }
            IPPROTO_IGMP => {
                if buf.remaining() < 8 {
                    self.gap("igmp", protocol.into(), "truncated igmp header");
                    return None;
                }
                let igmp_type = buf.get_u8();
                let max_response_time = buf.get_u8();
                buf.advance(2);
                Some(TransportLayer::Igmp(IgmpMessage {
                    igmp_type,
                    max_response_time,
                    group: Ipv4Addr::from(buf.get_u32()),
                }))
            }
            other => {
                self.gap("transport", other.into(), "unsupported ip protocol");
                None
            }
        }
    }
}

impl Walk {
    fn dns(&mut self, mut buf: &[u8]) -> Option<DnsMessage> {
        if buf.remaining() < DNS_HEADER_LEN {
            self.gap("dns", DNS_PORT, "truncated dns header");
            return None;
        }
        let header = DnsHeader {
            id: buf.get_u16(),
            flags: buf.get_u16(),
            question_count: buf.get_u16(),
            answer_count: buf.get_u16(),
            authority_count: buf.get_u16(),
            additional_count: buf.get_u16(),
        };

        let mut questions = Vec::new();
        for _ in 0..header.question_count {
            match self.dns_question(&mut buf) {
                Some(question) => questions.push(question),
                None => break,
            }
        }
        Some(DnsMessage { header, questions })
    }

    fn dns_question(&mut self, buf: &mut &[u8]) -> Option<DnsQuestion> {
        let mut labels = Vec::new();
        loop {
            if !buf.has_remaining() {
                self.gap("dns", DNS_PORT, "truncated question name");
                return None;
            }
            let len = usize::from(buf.get_u8());
            if len == 0 {
                break;
            }
            if len & 0xc0 != 0 {
                self.gap("dns", DNS_PORT, "compressed question names are not decoded");
                return None;
            }
            if buf.remaining() < len {
                self.gap("dns", DNS_PORT, "truncated question label");
                return None;
            }
            labels.push(String::from_utf8_lossy(&buf[..len]).into_owned());
            buf.advance(len);
        }
        if buf.remaining() < 4 {
            self.gap("dns", DNS_PORT, "truncated question");
            return None;
        }
        Some(DnsQuestion {
            name: labels.join("."),
            qtype: buf.get_u16(),
            qclass: buf.get_u16(),
        })
    }
}

fn mac(buf: &mut &[u8]) -> MacAddr {
    let mut octets = [0u8; 6];
    buf.copy_to_slice(&mut octets);
    MacAddr(octets)
}
