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

//! Identity newtypes shared by every layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;

/// Stable identity of one forwarding device (the OpenFlow datapath id).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatapathId(pub u64);

impl fmt::Display for DatapathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0.to_be_bytes();
        for (idx, byte) in bytes.iter().enumerate() {
            if idx > 0 {
                f.write_str(":")?;
            }
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<u64> for DatapathId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Identity of one control channel. Defaults to `<remoteAddress>:<remotePort>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn from_remote(remote: &SocketAddr) -> Self {
        Self(format!("{}:{}", remote.ip(), remote.port()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Index of a connection resource in the connection arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u32);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Transport a listener accepts connections on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    #[serde(alias = "tcp", alias = "TCP")]
    Plaintext,
    #[serde(alias = "tls", alias = "TLS")]
    Secured,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Plaintext => f.write_str("TCP"),
            TransportKind::Secured => f.write_str("TLS"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DatapathId, SessionId};

    #[test]
    fn datapath_id_displays_as_colon_separated_octets() {
        assert_eq!(
            DatapathId(0x0000_0000_00ab_cd01).to_string(),
            "00:00:00:00:00:ab:cd:01"
        );
    }

    #[test]
    fn session_id_defaults_to_remote_address_and_port() {
        let remote = "10.0.0.7:40211".parse().expect("valid socket address");
        assert_eq!(SessionId::from_remote(&remote).as_str(), "10.0.0.7:40211");
    }
}
