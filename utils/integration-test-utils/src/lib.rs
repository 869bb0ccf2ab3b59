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

//! A scripted OpenFlow datapath for driving a controller over real sockets.

use bytes::{Bytes, BytesMut};
use ofc_controller::wire::{
    encode, FrameReconstructor, MessageType, OfBody, OfMessage, PhyPort, SwitchFeatures,
};
use rustls::pki_types::ServerName;
use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

mod pki;

pub use pki::TestPki;

/// How long any single expectation waits for the controller.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Installs a test subscriber once. `RUST_LOG` controls verbosity.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Features advertised by [`FakeDatapath::handshake`].
pub fn features(dpid: u64, port_numbers: &[u16]) -> SwitchFeatures {
    SwitchFeatures {
        datapath_id: dpid,
        n_buffers: 256,
        n_tables: 1,
        capabilities: 0xc7,
        actions: 0xfff,
        ports: port_numbers
            .iter()
            .map(|port_no| PhyPort {
                port_no: *port_no,
                hw_addr: [0x0e, 0, 0, 0, (dpid & 0xff) as u8, *port_no as u8],
                name: format!("s{dpid}-eth{port_no}"),
                ..Default::default()
            })
            .collect(),
    }
}

/// Any byte stream a [`FakeDatapath`] can speak OpenFlow over.
pub trait DatapathStream: AsyncRead + AsyncWrite + Unpin {}

impl<S: AsyncRead + AsyncWrite + Unpin> DatapathStream for S {}

pub struct FakeDatapath<S = TcpStream> {
    stream: S,
    local_addr: SocketAddr,
    frames: FrameReconstructor,
    received: VecDeque<OfMessage>,
    version: u8,
}

async fn connect_tcp(addr: SocketAddr) -> io::Result<TcpStream> {
    timeout(RECV_TIMEOUT, TcpStream::connect(addr))
        .await
        .map_err(|_| io::Error::from(io::ErrorKind::TimedOut))?
}

impl FakeDatapath<TcpStream> {
    pub async fn connect(addr: SocketAddr) -> io::Result<Self> {
        let stream = connect_tcp(addr).await?;
        let local_addr = stream.local_addr()?;
        Ok(Self::over(stream, local_addr))
    }
}

impl FakeDatapath<TlsStream<TcpStream>> {
    /// Connects and completes the TLS handshake as `localhost`.
    pub async fn connect_tls(addr: SocketAddr, connector: &TlsConnector) -> io::Result<Self> {
        let tcp = connect_tcp(addr).await?;
        let local_addr = tcp.local_addr()?;
        let server_name = ServerName::try_from("localhost").map_err(io::Error::other)?;
        let stream = timeout(RECV_TIMEOUT, connector.connect(server_name, tcp))
            .await
            .map_err(|_| io::Error::from(io::ErrorKind::TimedOut))??;
        Ok(Self::over(stream, local_addr))
    }
}

impl<S: DatapathStream> FakeDatapath<S> {
    fn over(stream: S, local_addr: SocketAddr) -> Self {
        Self {
            stream,
            local_addr,
            frames: FrameReconstructor::new(),
            received: VecDeque::new(),
            version: ofc_controller::wire::OFP_VERSION,
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Session id the controller assigns to this connection.
    pub fn session_id(&self) -> String {
        format!("{}:{}", self.local_addr.ip(), self.local_addr.port())
    }

    pub async fn send(&mut self, xid: u32, body: OfBody) -> io::Result<()> {
        let message = OfMessage::new(self.version, xid, body);
        let frame = encode(&message).map_err(io::Error::other)?;
        self.send_raw(&frame).await
    }

    pub async fn send_raw(&mut self, frame: &[u8]) -> io::Result<()> {
        self.stream.write_all(frame).await?;
        self.stream.flush().await
    }

    /// Next message from the controller, in arrival order.
    pub async fn recv(&mut self) -> io::Result<OfMessage> {
        loop {
            if let Some(message) = self.received.pop_front() {
                debug!(
                    msg_type = %message.message_type(),
                    xid = message.xid,
                    "fake datapath received"
                );
                return Ok(message);
            }
            let chunk = self.read_chunk().await?;
            if chunk.is_empty() {
                return Err(io::Error::from(io::ErrorKind::UnexpectedEof));
            }
            for frame in self.frames.reconstruct(&chunk) {
                let message =
                    frame.map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
                self.received.push_back(message);
            }
        }
    }

    /// Receives the next message and checks its type.
    pub async fn expect(&mut self, message_type: MessageType) -> io::Result<OfMessage> {
        let message = self.recv().await?;
        if message.message_type() != message_type {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("expected {message_type}, got {}", message.message_type()),
            ));
        }
        Ok(message)
    }

    /// Plays the device side of hello and features.
    pub async fn handshake(&mut self, dpid: u64, version: u8, ports: &[u16]) -> io::Result<()> {
        self.expect(MessageType::Hello).await?;
        self.version = version;
        self.send(1, OfBody::Hello(Bytes::new())).await?;
        let request = self.expect(MessageType::FeaturesRequest).await?;
        self.version = request.version;
        self.send(request.xid, OfBody::FeaturesReply(features(dpid, ports)))
            .await
    }

    /// `true` once the controller closes its side.
    pub async fn closed(&mut self) -> bool {
        loop {
            match self.read_chunk().await {
                Ok(chunk) if chunk.is_empty() => return true,
                Ok(chunk) => {
                    self.frames.push(&chunk);
                }
                Err(err) => return err.kind() != io::ErrorKind::TimedOut,
            }
        }
    }

    pub async fn shutdown(mut self) -> io::Result<()> {
        self.stream.shutdown().await
    }

    async fn read_chunk(&mut self) -> io::Result<BytesMut> {
        let mut chunk = BytesMut::with_capacity(4096);
        timeout(RECV_TIMEOUT, self.stream.read_buf(&mut chunk))
            .await
            .map_err(|_| io::Error::from(io::ErrorKind::TimedOut))??;
        Ok(chunk)
    }
}
