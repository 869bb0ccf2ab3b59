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

use std::net::SocketAddr;

use crate::wire::OfMessage;

const PREVIEW_BYTES: usize = 16;

/// `TYPE/xid`, e.g. `PACKET_IN/42`.
pub fn format_message(message: &OfMessage) -> String {
    format!("{}/{}", message.message_type(), message.xid)
}

pub fn format_endpoint(address: Option<&str>, port: Option<u16>) -> String {
    format!(
        "{}:{}",
        address.unwrap_or("<none>"),
        port.map_or_else(|| "<none>".to_string(), |port| port.to_string())
    )
}

pub fn format_peer(peer: Option<SocketAddr>) -> String {
    peer.map_or_else(|| "unknown".to_string(), |peer| peer.to_string())
}

/// Hex of the first bytes of a frame, for undecodable input.
pub fn format_hex_preview(raw: &[u8]) -> String {
    let mut out = String::with_capacity(PREVIEW_BYTES * 2 + 3);
    for byte in raw.iter().take(PREVIEW_BYTES) {
        out.push_str(&format!("{byte:02x}"));
    }
    if raw.len() > PREVIEW_BYTES {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_preview_is_truncated() {
        assert_eq!(format_hex_preview(&[0x01, 0xab]), "01ab");
        assert!(format_hex_preview(&[0u8; 40]).ends_with("..."));
    }

    #[test]
    fn missing_endpoint_parts_are_marked() {
        assert_eq!(format_endpoint(None, Some(6633)), "<none>:6633");
    }
}
