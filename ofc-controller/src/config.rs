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

//! Controller and listener configuration.

use serde::Deserialize;
use std::path::PathBuf;

use crate::error::BindFailure;
use crate::identity::TransportKind;

/// Top-level configuration, as read from a json5 file by the server binary.
///
/// ```json5
/// {
///   debug: false,
///   echo: false,
///   listeners: [
///     { address: "0.0.0.0", port: 6633, transport: "tcp" },
///     { address: "0.0.0.0", port: 6653, transport: "tls", key: "key.pem", cert: "cert.pem" },
///   ],
/// }
/// ```
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControllerConfig {
    pub listeners: Vec<ListenerConfig>,
    /// Verbose protocol logging for every listener that does not override it.
    pub debug: bool,
    /// Log echo request/reply traffic.
    pub echo: bool,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListenerConfig {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default, alias = "type")]
    pub transport: TransportKind,
    #[serde(default)]
    pub key: Option<PathBuf>,
    #[serde(default)]
    pub cert: Option<PathBuf>,
    /// Client CA bundle; when set, secured listeners require client certificates.
    #[serde(default)]
    pub ca: Option<PathBuf>,
    #[serde(default)]
    pub debug: Option<bool>,
    #[serde(default)]
    pub echo: Option<bool>,
}

/// Log flags resolved for one listener.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LogFlags {
    pub debug: bool,
    pub echo: bool,
}

impl ListenerConfig {
    pub fn plaintext(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: Some(address.into()),
            port: Some(port),
            ..Default::default()
        }
    }

    pub fn secured(
        address: impl Into<String>,
        port: u16,
        key: impl Into<PathBuf>,
        cert: impl Into<PathBuf>,
    ) -> Self {
        Self {
            address: Some(address.into()),
            port: Some(port),
            transport: TransportKind::Secured,
            key: Some(key.into()),
            cert: Some(cert.into()),
            ..Default::default()
        }
    }

    pub(crate) fn endpoint(&self) -> Result<(&str, u16), BindFailure> {
        match (self.address.as_deref(), self.port) {
            (Some(address), Some(port)) if !address.is_empty() => Ok((address, port)),
            _ => Err(BindFailure::MissingEndpoint),
        }
    }

    /// Per-listener flags win; otherwise the controller-wide ones apply.
    pub fn log_flags(&self, controller: &ControllerConfig) -> LogFlags {
        LogFlags {
            debug: self.debug.unwrap_or(controller.debug),
            echo: self.echo.unwrap_or(controller.echo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_address_is_not_an_endpoint() {
        let config = ListenerConfig {
            port: Some(6633),
            ..Default::default()
        };
        assert!(matches!(config.endpoint(), Err(BindFailure::MissingEndpoint)));
        assert_eq!(
            ListenerConfig::plaintext("127.0.0.1", 6633).endpoint().ok(),
            Some(("127.0.0.1", 6633))
        );
    }

    #[test]
    fn listener_flags_fall_back_to_controller_flags() {
        let controller = ControllerConfig {
            debug: true,
            echo: false,
            ..Default::default()
        };
        let listener = ListenerConfig {
            echo: Some(true),
            debug: Some(false),
            ..ListenerConfig::plaintext("0.0.0.0", 6653)
        };
        assert_eq!(
            listener.log_flags(&controller),
            LogFlags {
                debug: false,
                echo: true
            }
        );
        assert_eq!(
            ListenerConfig::default().log_flags(&controller),
            LogFlags {
                debug: true,
                echo: false
            }
        );
    }
}
