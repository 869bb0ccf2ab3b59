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

//! Logical switches.
//!
//! A [`LogicalSwitch`] stands for one device identity and outlives any single
//! control channel: it owns zero or more sessions handed off by listeners,
//! turns device messages into application events and executes application
//! commands on a named session.

mod logical_switch;
mod ports;

pub use logical_switch::LogicalSwitch;
pub(crate) use logical_switch::SwitchDeps;
pub use ports::PortTable;
