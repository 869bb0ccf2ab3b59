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
use std::future::Future;
use std::net::SocketAddr;
use std::rc::Rc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::DeviceRegistry;
use crate::bus::{Bus, BusEvent, ServerStarted, SubscriptionId, Topic};
use crate::config::{ControllerConfig, ListenerConfig, LogFlags};
use crate::data_plane::{
    accept_loop, build_acceptor, ConnectionEvent, ConnectionTable, EventSink, Listener,
};
use crate::error::{BindFailure, ListenerStartError};
use crate::identity::{ConnectionId, DatapathId, ListenerId, TransportKind};
use crate::observability::{events, fields};
use crate::packet::{EthernetDecoder, PacketDecoder};
use crate::switch::{LogicalSwitch, SwitchDeps};

const COMPONENT: &str = "controller";

/// Top-level owner of the bus, the switch registry and the listeners.
///
/// Everything bus-confined lives on the task that drives [`Controller::run`].
/// Transport I/O runs in spawned tasks that only exchange channel messages
/// with it, so the controller itself is neither `Send` nor `Sync`.
///
/// ```no_run
/// use ofc_controller::{Controller, ControllerConfig, ListenerConfig};
///
/// # async fn serve() {
/// let config = ControllerConfig {
///     listeners: vec![ListenerConfig::plaintext("0.0.0.0", 6633)],
///     ..Default::default()
/// };
/// let mut controller = Controller::new(config);
/// for failure in controller.start().await {
///     eprintln!("{failure}");
/// }
/// controller.run(std::future::pending()).await;
/// # }
/// ```
pub struct Controller {
    config: ControllerConfig,
    bus: Bus,
    registry: DeviceRegistry,
    connections: ConnectionTable,
    listeners: BTreeMap<ListenerId, Listener>,
    local_addrs: Vec<SocketAddr>,
    accept_tasks: Vec<JoinHandle<()>>,
    sink: EventSink,
    inbound: mpsc::UnboundedReceiver<ConnectionEvent>,
    subscriptions: Vec<SubscriptionId>,
}

impl Controller {
    pub fn new(config: ControllerConfig) -> Self {
        Self::with_bus(config, Bus::new())
    }

    /// Uses a bus the caller already holds, e.g. one applications subscribed to.
    pub fn with_bus(config: ControllerConfig, bus: Bus) -> Self {
        Self::with_parts(config, bus, Rc::new(EthernetDecoder))
    }

    pub fn with_parts(
        config: ControllerConfig,
        bus: Bus,
        decoder: Rc<dyn PacketDecoder>,
    ) -> Self {
        let (tx, inbound) = mpsc::unbounded_channel();
        let registry = DeviceRegistry::new();
        let connections = ConnectionTable::new();
        let deps = SwitchDeps {
            connections: connections.clone(),
            decoder,
            flags: LogFlags {
                debug: config.debug,
                echo: config.echo,
            },
        };

        let subscriptions = vec![
            subscribe_create(&bus, registry.clone(), deps),
            subscribe_remove(&bus, registry.clone()),
        ];

        Self {
            config,
            bus,
            registry,
            connections,
            listeners: BTreeMap::new(),
            local_addrs: Vec::new(),
            accept_tasks: Vec::new(),
            sink: EventSink::new(tx),
            inbound,
            subscriptions,
        }
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn switch(&self, dpid: DatapathId) -> Option<LogicalSwitch> {
        self.registry.get(dpid)
    }

    /// Bound addresses of the listeners that started, in start order.
    pub fn local_addrs(&self) -> &[SocketAddr] {
        &self.local_addrs
    }

    /// Starts every configured listener.
    ///
    /// One listener failing does not stop the others. The returned list is
    /// empty when all of them started.
    pub async fn start(&mut self) -> Vec<ListenerStartError> {
        let configs = self.config.listeners.clone();
        let mut failures = Vec::new();
        for (index, config) in configs.iter().enumerate() {
            let id = ListenerId(index as u32);
            if let Err(err) = self.start_listener(id, config).await {
                warn!(
                    event = events::CONTROLLER_LISTENER_START_FAILED,
                    component = COMPONENT,
                    listener = %id,
                    err = %err,
                    "listener did not start"
                );
                failures.push(err);
            }
        }
        failures
    }

    async fn start_listener(
        &mut self,
        id: ListenerId,
        config: &ListenerConfig,
    ) -> Result<(), ListenerStartError> {
        let fail = |source: BindFailure| ListenerStartError {
            address: config.address.clone(),
            port: config.port,
            transport: config.transport,
            source,
        };

        let (address, port) = config.endpoint().map_err(fail)?;
        let acceptor = match config.transport {
            TransportKind::Plaintext => None,
            TransportKind::Secured => {
                Some(build_acceptor(config).map_err(|err| fail(err.into()))?)
            }
        };
        let tcp = TcpListener::bind((address, port))
            .await
            .map_err(|err| fail(err.into()))?;
        let local_addr = tcp.local_addr().map_err(|err| fail(err.into()))?;

        let listener = Listener::new(
            id,
            config.transport,
            config.log_flags(&self.config),
            &self.bus,
            self.connections.clone(),
        );
        self.listeners.insert(id, listener);
        self.local_addrs.push(local_addr);
        self.accept_tasks.push(tokio::spawn(accept_loop(
            id,
            tcp,
            acceptor,
            self.sink.clone(),
        )));

        info!(
            event = events::CONTROLLER_LISTENER_STARTED,
            component = COMPONENT,
            listener = %id,
            endpoint = %fields::format_endpoint(Some(address), Some(port)),
            local_addr = %local_addr,
            transport = %config.transport,
            "listener started"
        );
        self.bus.publish(&BusEvent::ServerStarted(ServerStarted {
            listener: id,
            address: address.to_string(),
            port,
            local_addr,
            transport: config.transport,
        }));
        Ok(())
    }

    /// Runs the control loop until `shutdown` resolves.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                event = self.inbound.recv() => match event {
                    Some(event) => self.dispatch(event),
                    None => break,
                },
            }
        }
        info!(
            event = events::CONTROLLER_LOOP_STOPPED,
            component = COMPONENT,
            switches = self.registry.len(),
            "control loop stopped"
        );
    }

    /// Routes one transport event to whoever owns the connection now.
    pub(crate) fn dispatch(&self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Accepted {
                listener,
                connection,
            } => match self.listeners.get(&listener) {
                Some(owner) => owner.accept(&self.bus, connection),
                None => warn!(
                    event = events::CONTROLLER_EVENT_UNROUTED,
                    component = COMPONENT,
                    %listener,
                    conn_id = %connection.id,
                    "connection for unknown listener dropped"
                ),
            },
            ConnectionEvent::Data { conn, chunk } => {
                match self.connections.receive(conn, &chunk) {
                    Some(handler) => handler.on_data(&self.bus, conn),
                    None => trace!(
                        component = COMPONENT,
                        conn_id = %conn,
                        len = chunk.len(),
                        "data for unwired connection buffered"
                    ),
                }
            }
            ConnectionEvent::FlowChanged { conn, paused } => {
                if let Some(handler) = self.connections.handler(conn) {
                    if paused {
                        handler.on_pause(conn);
                    } else {
                        handler.on_resume(conn);
                    }
                }
            }
            ConnectionEvent::Closed { conn } => match self.connections.handler(conn) {
                Some(handler) => handler.on_close(&self.bus, conn),
                None => self.release_unwired(conn),
            },
            ConnectionEvent::Failed { conn, error } => match self.connections.handler(conn) {
                Some(handler) => handler.on_error(&self.bus, conn, &error),
                None => self.release_unwired(conn),
            },
        }
    }

    fn release_unwired(&self, conn: ConnectionId) {
        if let Some(info) = self.connections.release(conn) {
            debug!(
                event = events::CONNECTION_UNWIRED_RELEASED,
                component = COMPONENT,
                conn_id = %conn,
                peer = %info.remote_addr,
                "unowned connection released"
            );
        }
    }

    #[cfg(test)]
    pub(crate) fn register_listener(&mut self, id: ListenerId) -> Listener {
        let listener = Listener::new(
            id,
            TransportKind::Plaintext,
            LogFlags::default(),
            &self.bus,
            self.connections.clone(),
        );
        self.listeners.insert(id, listener.clone());
        listener
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        for task in self.accept_tasks.drain(..) {
            task.abort();
        }
        for subscription in self.subscriptions.drain(..) {
            self.bus.unsubscribe(subscription);
        }
    }
}

fn subscribe_create(bus: &Bus, registry: DeviceRegistry, deps: SwitchDeps) -> SubscriptionId {
    bus.subscribe(Topic::DeviceCreateRequested, move |bus, event| {
        let BusEvent::DeviceCreateRequested { dpid, features } = event else {
            return;
        };
        if registry.contains(*dpid) {
            debug!(
                event = events::CONTROLLER_SWITCH_EXISTS,
                component = COMPONENT,
                dpid = %dpid,
                "switch already registered"
            );
            return;
        }

        // Creation announces the switch before it is registered here.
        let switch = LogicalSwitch::create(bus, *dpid, features, deps.clone());
        if registry.insert(switch) {
            info!(
                event = events::CONTROLLER_SWITCH_CREATED,
                component = COMPONENT,
                dpid = %dpid,
                switches = registry.len(),
                "switch registered"
            );
        }
    })
}

fn subscribe_remove(bus: &Bus, registry: DeviceRegistry) -> SubscriptionId {
    bus.subscribe(Topic::DeviceRemoveRequested, move |_, event| {
        let BusEvent::DeviceRemoveRequested { dpid } = event else {
            return;
        };
        match registry.remove(*dpid) {
            Some(switch) => {
                info!(
                    event = events::CONTROLLER_SWITCH_REMOVED,
                    component = COMPONENT,
                    dpid = %dpid,
                    switches = registry.len(),
                    "switch removed"
                );
                switch.retire();
            }
            None => debug!(
                event = events::CONTROLLER_SWITCH_REMOVE_MISSING,
                component = COMPONENT,
                dpid = %dpid,
                "no switch to remove"
            ),
        }
    })
}
