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

//! Fake connections and recording collaborators for unit tests.

use bytes::Bytes;
use std::cell::{Cell, RefCell};
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::rc::Rc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, watch};

use crate::bus::{Bus, BusEvent, Topic};
use crate::data_plane::{AcceptedConnection, ConnectionEvents, ConnectionInfo};
use crate::identity::{ConnectionId, TransportKind};
use crate::wire::{encode, FrameReconstructor, OfBody, OfMessage, PhyPort, SwitchFeatures};

/// Test-side end of a connection created by [`fake_connection`].
pub(crate) struct FakePeer {
    outbound: mpsc::UnboundedReceiver<Bytes>,
    flow: watch::Receiver<bool>,
    frames: FrameReconstructor,
    released: bool,
}

impl FakePeer {
    /// Decodes everything queued for the wire since the last call.
    pub(crate) fn drain(&mut self) -> Vec<OfMessage> {
        let mut messages = Vec::new();
        loop {
            match self.outbound.try_recv() {
                Ok(frame) => messages.extend(
                    self.frames
                        .reconstruct(&frame)
                        .into_iter()
                        .map(|decoded| decoded.expect("controller sent a decodable frame")),
                ),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.released = true;
                    break;
                }
            }
        }
        messages
    }

    pub(crate) fn is_paused(&self) -> bool {
        *self.flow.borrow()
    }

    /// `true` once the controller dropped the slot (after draining).
    pub(crate) fn is_released(&mut self) -> bool {
        let _ = self.drain();
        self.released
    }
}

/// A connection from `10.0.0.1:<40000 + n>` with id `n`.
pub(crate) fn fake_connection(n: u64) -> (AcceptedConnection, FakePeer) {
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (flow_tx, flow_rx) = watch::channel(false);
    let connection = AcceptedConnection {
        id: ConnectionId(n),
        info: ConnectionInfo {
            remote_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 40_000 + n as u16),
            local_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 254)), 6633),
            transport: TransportKind::Plaintext,
        },
        outbound: outbound_tx,
        flow: flow_tx,
    };
    let peer = FakePeer {
        outbound: outbound_rx,
        flow: flow_rx,
        frames: FrameReconstructor::new(),
        released: false,
    };
    (connection, peer)
}

pub(crate) fn frame(message: &OfMessage) -> Bytes {
    encode(message).expect("test message encodes")
}

pub(crate) fn features(dpid: u64, port_numbers: &[u16]) -> SwitchFeatures {
    SwitchFeatures {
        datapath_id: dpid,
        n_buffers: 256,
        n_tables: 1,
        capabilities: 0x87,
        actions: 0xfff,
        ports: port_numbers
            .iter()
            .map(|port_no| PhyPort {
                port_no: *port_no,
                hw_addr: [0x02, 0, 0, 0, 0, *port_no as u8],
                name: format!("eth{port_no}"),
                ..Default::default()
            })
            .collect(),
    }
}

pub(crate) fn message(version: u8, xid: u32, body: OfBody) -> OfMessage {
    OfMessage::new(version, xid, body)
}

/// Records every event published on `topics`.
pub(crate) fn record(bus: &Bus, topics: &[Topic]) -> Rc<RefCell<Vec<BusEvent>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    for topic in topics {
        let seen = seen.clone();
        bus.subscribe(*topic, move |_, event| seen.borrow_mut().push(event.clone()));
    }
    seen
}

#[derive(Default)]
pub(crate) struct RecordingEvents {
    pub(crate) data: Cell<usize>,
    pub(crate) closes: Cell<usize>,
    pub(crate) errors: Cell<usize>,
    pub(crate) pauses: Cell<usize>,
    pub(crate) resumes: Cell<usize>,
}

impl ConnectionEvents for RecordingEvents {
    fn on_data(&self, _bus: &Bus, _conn: ConnectionId) {
        self.data.set(self.data.get() + 1);
    }

    fn on_close(&self, _bus: &Bus, _conn: ConnectionId) {
        self.closes.set(self.closes.get() + 1);
    }

    fn on_error(&self, _bus: &Bus, _conn: ConnectionId, _error: &io::Error) {
        self.errors.set(self.errors.get() + 1);
    }

    fn on_pause(&self, _conn: ConnectionId) {
        self.pauses.set(self.pauses.get() + 1);
    }

    fn on_resume(&self, _conn: ConnectionId) {
        self.resumes.set(self.resumes.get() + 1);
    }
}
