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

use std::collections::BTreeMap;

use crate::wire::PhyPort;

/// Sparse port table keyed by port number.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PortTable {
    ports: BTreeMap<u16, PhyPort>,
}

impl PortTable {
    /// Creates or replaces the entry for `port.port_no`.
    pub fn update(&mut self, port: PhyPort) -> Option<PhyPort> {
        self.ports.insert(port.port_no, port)
    }

    pub fn get(&self, port_no: u16) -> Option<&PhyPort> {
        self.ports.get(&port_no)
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn numbers(&self) -> Vec<u16> {
        self.ports.keys().copied().collect()
    }
}
