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

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::identity::DatapathId;
use crate::switch::LogicalSwitch;

/// Identity-keyed map of live switches. Clones share the same map.
///
/// A switch handed out by [`DeviceRegistry::get`] stays readable after it is
/// removed here, but removal retires it: it leaves the bus, closes its
/// sessions and never adopts another one.
#[derive(Clone, Debug, Default)]
pub struct DeviceRegistry {
    switches: Rc<RefCell<BTreeMap<DatapathId, LogicalSwitch>>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, dpid: DatapathId) -> bool {
        self.switches.borrow().contains_key(&dpid)
    }

    pub fn get(&self, dpid: DatapathId) -> Option<LogicalSwitch> {
        self.switches.borrow().get(&dpid).cloned()
    }

    pub fn len(&self) -> usize {
        self.switches.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.switches.borrow().is_empty()
    }

    pub fn identities(&self) -> Vec<DatapathId> {
        self.switches.borrow().keys().copied().collect()
    }

    /// Inserts unless the identity is taken. Returns whether it was inserted.
    pub(crate) fn insert(&self, switch: LogicalSwitch) -> bool {
        let mut switches = self.switches.borrow_mut();
        if switches.contains_key(&switch.dpid()) {
            return false;
        }
        switches.insert(switch.dpid(), switch);
        true
    }

    /// The caller drops the returned switch outside of any registry borrow.
    pub(crate) fn remove(&self, dpid: DatapathId) -> Option<LogicalSwitch> {
        self.switches.borrow_mut().remove(&dpid)
    }
}
