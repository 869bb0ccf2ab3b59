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

//! Connection-resource arena with explicit single-owner wiring.

use bytes::Bytes;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use tokio::sync::{mpsc, watch};

use super::{AcceptedConnection, ConnectionEvents, ConnectionInfo, Owner};
use crate::error::{OwnershipError, SendError};
use crate::identity::ConnectionId;
use crate::wire::{FrameError, FrameReconstructor, OfMessage};

struct Wiring {
    owner: Owner,
    handler: Weak<dyn ConnectionEvents>,
}

struct ConnectionSlot {
    info: ConnectionInfo,
    outbound: mpsc::UnboundedSender<Bytes>,
    flow: watch::Sender<bool>,
    frames: FrameReconstructor,
    wiring: Option<Wiring>,
}

/// Shared handle to the arena. All clones see the same slots.
///
/// A slot is either wired to exactly one [`Owner`] or unwired. Unwired slots
/// buffer inbound bytes in their reconstructor; nothing is decoded until an
/// owner wires itself and pulls.
#[derive(Clone, Default)]
pub(crate) struct ConnectionTable {
    slots: Rc<RefCell<HashMap<ConnectionId, ConnectionSlot>>>,
}

impl ConnectionTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, connection: AcceptedConnection) {
        let AcceptedConnection {
            id,
            info,
            outbound,
            flow,
        } = connection;
        self.slots.borrow_mut().insert(
            id,
            ConnectionSlot {
                info,
                outbound,
                flow,
                frames: FrameReconstructor::new(),
                wiring: None,
            },
        );
    }

    pub(crate) fn contains(&self, id: ConnectionId) -> bool {
        self.slots.borrow().contains_key(&id)
    }

    /// Installs `owner` as the only reader of `id`'s events.
    pub(crate) fn wire(
        &self,
        id: ConnectionId,
        owner: Owner,
        handler: Weak<dyn ConnectionEvents>,
    ) -> Result<(), OwnershipError> {
        let mut slots = self.slots.borrow_mut();
        let slot = slots
            .get_mut(&id)
            .ok_or(OwnershipError::UnknownConnection(id))?;
        if let Some(wiring) = &slot.wiring {
            return Err(OwnershipError::AlreadyWired {
                conn: id,
                owner: wiring.owner,
            });
        }
        slot.wiring = Some(Wiring { owner, handler });
        Ok(())
    }

    /// Removes `owner`'s wiring; fails if someone else holds the slot.
    pub(crate) fn detach(&self, id: ConnectionId, owner: Owner) -> Result<(), OwnershipError> {
        let mut slots = self.slots.borrow_mut();
        let slot = slots
            .get_mut(&id)
            .ok_or(OwnershipError::UnknownConnection(id))?;
        match &slot.wiring {
            Some(wiring) if wiring.owner == owner => {
                slot.wiring = None;
                Ok(())
            }
            _ => Err(OwnershipError::NotOwner {
                conn: id,
                claimed: owner,
            }),
        }
    }

    pub(crate) fn owner(&self, id: ConnectionId) -> Option<Owner> {
        self.slots
            .borrow()
            .get(&id)
            .and_then(|slot| slot.wiring.as_ref().map(|wiring| wiring.owner))
    }

    pub(crate) fn handler(&self, id: ConnectionId) -> Option<Rc<dyn ConnectionEvents>> {
        self.slots
            .borrow()
            .get(&id)
            .and_then(|slot| slot.wiring.as_ref())
            .and_then(|wiring| wiring.handler.upgrade())
    }

    /// Buffers `chunk` and returns the handler to notify, if the slot is wired.
    pub(crate) fn receive(
        &self,
        id: ConnectionId,
        chunk: &[u8],
    ) -> Option<Rc<dyn ConnectionEvents>> {
        let mut slots = self.slots.borrow_mut();
        let slot = slots.get_mut(&id)?;
        slot.frames.push(chunk);
        slot.wiring
            .as_ref()
            .and_then(|wiring| wiring.handler.upgrade())
    }

    /// Pops the next buffered frame, but only for the current owner.
    pub(crate) fn next_message(
        &self,
        id: ConnectionId,
        owner: Owner,
    ) -> Option<Result<OfMessage, FrameError>> {
        let mut slots = self.slots.borrow_mut();
        let slot = slots.get_mut(&id)?;
        match &slot.wiring {
            Some(wiring) if wiring.owner == owner => slot.frames.next_frame(),
            _ => None,
        }
    }

    #[cfg(test)]
    pub(crate) fn buffered_len(&self, id: ConnectionId) -> usize {
        self.slots
            .borrow()
            .get(&id)
            .map_or(0, |slot| slot.frames.buffered_len())
    }

    pub(crate) fn send(&self, id: ConnectionId, frame: Bytes) -> Result<(), SendError> {
        let slots = self.slots.borrow();
        let slot = slots.get(&id).ok_or(SendError::ConnectionClosed(id))?;
        slot.outbound
            .send(frame)
            .map_err(|_| SendError::ConnectionClosed(id))
    }

    /// Returns `false` when the slot is gone.
    pub(crate) fn set_paused(&self, id: ConnectionId, paused: bool) -> bool {
        match self.slots.borrow().get(&id) {
            Some(slot) => {
                slot.flow.send_replace(paused);
                true
            }
            None => false,
        }
    }

    /// Drops the slot. The writer task flushes and shuts the stream down once
    /// the outbound queue closes; the reader stops when the flow flag closes.
    pub(crate) fn release(&self, id: ConnectionId) -> Option<ConnectionInfo> {
        let slot = self.slots.borrow_mut().remove(&id)?;
        let ConnectionSlot {
            info, mut frames, ..
        } = slot;
        frames.release();
        Some(info)
    }
}
