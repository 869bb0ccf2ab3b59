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

use anyhow::{bail, Context};
use clap::Parser;
use learning_switch::{LearningConfig, LearningSwitch};
use ofc_controller::{Controller, ControllerConfig, ListenerConfig};
use std::fs;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_ADDRESS: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 6633;

#[derive(Debug, Parser)]
#[command(name = "ofc-server")]
#[command(about = "OpenFlow 1.0 controller with an L2 learning switch")]
struct Cli {
    /// json5 controller configuration.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Address of an extra plaintext listener.
    #[arg(long, requires = "port")]
    address: Option<String>,
    /// Port of the extra plaintext listener.
    #[arg(long, requires = "address")]
    port: Option<u16>,
    /// Run without the learning switch application.
    #[arg(long)]
    no_learning_switch: bool,
}

fn load_config(cli: &Cli) -> anyhow::Result<ControllerConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("unable to read {}", path.display()))?;
            json5::from_str::<ControllerConfig>(&text)
                .with_context(|| format!("invalid configuration in {}", path.display()))?
        }
        None => ControllerConfig::default(),
    };

    if let (Some(address), Some(port)) = (&cli.address, cli.port) {
        config
            .listeners
            .push(ListenerConfig::plaintext(address.clone(), port));
    }
    if config.listeners.is_empty() {
        config
            .listeners
            .push(ListenerConfig::plaintext(DEFAULT_ADDRESS, DEFAULT_PORT));
    }
    Ok(config)
}

fn init_tracing(config: &ControllerConfig) {
    let fallback = if config.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_tracing(&config);

    let mut controller = Controller::new(config.clone());
    let _app = (!cli.no_learning_switch).then(|| {
        LearningSwitch::attach(
            controller.bus(),
            LearningConfig {
                debug: config.debug,
            },
        )
    });

    let failures = controller.start().await;
    for failure in &failures {
        error!("{failure}");
    }
    if controller.local_addrs().is_empty() {
        bail!("no listener could be started ({} failed)", failures.len());
    }
    info!(listeners = ?controller.local_addrs(), "controller running, Ctrl-C to stop");

    controller
        .run(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!("unable to listen for Ctrl-C: {err}");
                std::future::pending::<()>().await;
            }
        })
        .await;
    info!(switches = controller.registry().len(), "controller stopped");
    Ok(())
}
