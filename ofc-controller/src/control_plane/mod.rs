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

//! Control-plane layer.
//!
//! The [`Controller`] owns the bus, the [`DeviceRegistry`] and every
//! listener, and runs the loop that routes transport events into them.

mod controller;
mod device_registry;

pub use controller::Controller;
pub use device_registry::DeviceRegistry;
