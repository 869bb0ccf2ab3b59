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

//! # ofc-controller
//!
//! `ofc-controller` accepts OpenFlow 1.0 control channels from forwarding
//! devices, completes the hello/features handshake, represents each device as a
//! [`LogicalSwitch`] and connects switches to applications through a
//! synchronous event [`bus::Bus`].
//!
//! Typical usage builds a [`Controller`], lets applications subscribe to its bus,
//! starts the configured listeners and then drives the control loop.
//!
//! ```
//! use ofc_controller::bus::{BusEvent, Topic};
//! use ofc_controller::{Controller, ControllerConfig, ListenerConfig};
//!
//! # tokio::runtime::Builder::new_current_thread()
//! #     .enable_all()
//! #     .build()
//! #     .unwrap()
//! #     .block_on(async {
//! let config = ControllerConfig {
//!     listeners: vec![
//!         ListenerConfig::plaintext("127.0.0.1", 0),
//!         ListenerConfig::default(),
//!     ],
//!     ..Default::default()
//! };
//! let mut controller = Controller::new(config);
//! controller.bus().subscribe(Topic::AppPacketIn, |_bus, event| {
//!     if let BusEvent::AppPacketIn(packet_in) = event {
//!         println!("packet-in from {}", packet_in.dpid);
//!     }
//! });
//!
//! // The second listener has no endpoint; the first one still starts.
//! let failures = controller.start().await;
//! assert_eq!(failures.len(), 1);
//! assert_eq!(controller.local_addrs().len(), 1);
//!
//! controller.run(async {}).await;
//! assert!(controller.registry().is_empty());
//! # });
//! ```
//!
//! ## Internal architecture map
//!
//! - Bus: topic-keyed synchronous publish/subscribe with re-entrant cascades
//! - Control plane: the controller, its device registry and the control loop
//! - Data plane: listeners, sessions, the connection arena and transport tasks
//! - Switch: one logical device per datapath id and its owned sessions
//! - Wire / packet: the OpenFlow 1.0 codec and the forwarded-frame decoder
//!
//! ## Ownership of connections
//!
//! Every accepted connection lives in one arena slot that is wired to exactly one
//! owner at a time. A listener owns it during the handshake and pairing; a
//! switch owns it after the hand-off. Bytes arriving while nobody is wired are
//! buffered and processed by the next owner.
//!
//! ## Observability model
//!
//! The workspace uses `tracing` for logs/events.
//! Library code emits events/spans and does not initialize a global subscriber.
//! Binaries and tests are responsible for `tracing_subscriber` initialization.

pub mod bus;
mod config;
mod control_plane;
mod data_plane;
mod error;
mod identity;
#[doc(hidden)]
pub mod observability;
pub mod packet;
mod switch;
pub mod wire;

#[cfg(test)]
mod test_support;

pub use config::{ControllerConfig, ListenerConfig, LogFlags};
pub use control_plane::{Controller, DeviceRegistry};
pub use data_plane::{ConnectionInfo, Owner, SendReceipt, Session, SessionSnapshot, SessionState};
pub use error::{
    BindFailure, CommandError, ListenerStartError, OwnershipError, SendError, TlsSetupError,
};
pub use identity::{ConnectionId, DatapathId, ListenerId, SessionId, TransportKind};
pub use switch::{LogicalSwitch, PortTable};
