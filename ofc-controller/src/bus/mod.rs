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

//! Event Bus.
//!
//! Synchronous, single-context publish/subscribe. [`Bus::publish`] runs every
//! handler registered for the event's [`Topic`] in registration order before
//! it returns. Handlers receive the bus itself and may publish further events
//! (a cascade); re-entrant dispatch works to any depth because no borrow of
//! the subscriber table is held while handlers run.
//!
//! The handler list is snapshotted when `publish` starts: a handler
//! subscribed mid-cascade does not see the event that was being delivered.
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use ofc_controller::bus::{Bus, BusEvent, Topic};
//! use ofc_controller::DatapathId;
//!
//! let bus = Bus::new();
//! let created = Rc::new(Cell::new(0));
//!
//! let seen = created.clone();
//! bus.subscribe(Topic::DeviceCreated, move |_bus, _event| seen.set(seen.get() + 1));
//! bus.subscribe(Topic::DeviceCreateRequested, |bus, event| {
//!     if let BusEvent::DeviceCreateRequested { dpid, .. } = event {
//!         bus.publish(&BusEvent::DeviceCreated { dpid: *dpid });
//!     }
//! });
//!
//! bus.publish(&BusEvent::DeviceCreateRequested {
//!     dpid: DatapathId(1),
//!     features: Default::default(),
//! });
//! assert_eq!(created.get(), 1);
//! ```

mod events;

pub use events::{
    BusEvent, FlowRemovedEvent, PacketInEvent, ServerConnection, ServerStarted, SwitchCommand,
    Topic,
};

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::trace;

type Handler = Rc<dyn Fn(&Bus, &BusEvent)>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct BusInner {
    next_id: Cell<u64>,
    handlers: RefCell<HashMap<Topic, Vec<(SubscriptionId, Handler)>>>,
}

/// Cheaply cloneable handle to one shared subscriber table.
#[derive(Clone, Default)]
pub struct Bus {
    inner: Rc<BusInner>,
}

/// Non-owning handle, for components that must not keep the bus alive.
#[derive(Clone, Default)]
pub struct WeakBus {
    inner: Weak<BusInner>,
}

impl WeakBus {
    pub fn upgrade(&self) -> Option<Bus> {
        self.inner.upgrade().map(|inner| Bus { inner })
    }
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn downgrade(&self) -> WeakBus {
        WeakBus {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn subscribe<F>(&self, topic: Topic, handler: F) -> SubscriptionId
    where
        F: Fn(&Bus, &BusEvent) + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.get());
        self.inner.next_id.set(id.0 + 1);
        self.inner
            .handlers
            .borrow_mut()
            .entry(topic)
            .or_default()
            .push((id, Rc::new(handler)));
        id
    }

    /// Returns `false` when `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.inner.handlers.borrow_mut();
        for subscribers in handlers.values_mut() {
            if let Some(position) = subscribers.iter().position(|(sub, _)| *sub == id) {
                subscribers.remove(position);
                return true;
            }
        }
        false
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.inner
            .handlers
            .borrow()
            .get(&topic)
            .map_or(0, Vec::len)
    }

    pub fn publish(&self, event: &BusEvent) {
        let topic = event.topic();
        let snapshot: Vec<Handler> = self
            .inner
            .handlers
            .borrow()
            .get(&topic)
            .map(|subscribers| subscribers.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default();

        trace!(%topic, handlers = snapshot.len(), "publishing bus event");
        for handler in snapshot {
            handler(self, event);
        }
    }
}

impl fmt::Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.inner.handlers.borrow();
        f.debug_struct("Bus")
            .field("topics", &handlers.len())
            .field(
                "subscribers",
                &handlers.values().map(Vec::len).sum::<usize>(),
            )
            .finish()
    }
}
