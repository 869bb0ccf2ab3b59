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

//! Per-connection reader/writer tasks and the accept loop.

use bytes::{Bytes, BytesMut};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio_rustls::TlsAcceptor;
use tracing::{debug, trace, warn};

use super::{AcceptedConnection, ConnectionEvent, ConnectionInfo};
use crate::identity::{ConnectionId, ListenerId, TransportKind};
use crate::observability::{events, fields};

const COMPONENT: &str = "connection_io";
const READ_CHUNK: usize = 8 * 1024;

/// Where I/O tasks report, plus the shared connection-id counter.
#[derive(Clone, Debug)]
pub(crate) struct EventSink {
    tx: mpsc::UnboundedSender<ConnectionEvent>,
    next_conn: Arc<AtomicU64>,
}

impl EventSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<ConnectionEvent>) -> Self {
        Self {
            tx,
            next_conn: Arc::new(AtomicU64::new(1)),
        }
    }

    pub(crate) fn next_id(&self) -> ConnectionId {
        ConnectionId(self.next_conn.fetch_add(1, Ordering::Relaxed))
    }

    fn emit(&self, event: ConnectionEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Accepts until the control loop goes away.
pub(crate) async fn accept_loop(
    listener: ListenerId,
    tcp: TcpListener,
    acceptor: Option<TlsAcceptor>,
    sink: EventSink,
) {
    let transport = if acceptor.is_some() {
        TransportKind::Secured
    } else {
        TransportKind::Plaintext
    };

    loop {
        let (stream, remote_addr) = match tcp.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                warn!(
                    event = events::LISTENER_ACCEPT_FAILED,
                    component = COMPONENT,
                    %listener,
                    err = %err,
                    "accept failed"
                );
                if sink.is_closed() {
                    break;
                }
                continue;
            }
        };
        if sink.is_closed() {
            break;
        }

        let local_addr = match stream.local_addr() {
            Ok(local_addr) => local_addr,
            Err(err) => {
                warn!(
                    event = events::LISTENER_ACCEPT_FAILED,
                    component = COMPONENT,
                    %listener,
                    peer = %remote_addr,
                    err = %err,
                    "accepted socket has no local address"
                );
                continue;
            }
        };
        let info = ConnectionInfo {
            remote_addr,
            local_addr,
            transport,
        };

        match &acceptor {
            None => attach_stream(stream, listener, info, &sink),
            Some(acceptor) => {
                // The handshake runs aside so one slow peer does not stall accepts.
                let acceptor = acceptor.clone();
                let sink = sink.clone();
                tokio::spawn(async move {
                    secure_and_attach(acceptor, stream, listener, info, sink).await;
                });
            }
        }
    }

    debug!(
        event = events::LISTENER_ACCEPT_LOOP_STOPPED,
        component = COMPONENT,
        %listener,
        "accept loop stopped"
    );
}

async fn secure_and_attach(
    acceptor: TlsAcceptor,
    stream: TcpStream,
    listener: ListenerId,
    info: ConnectionInfo,
    sink: EventSink,
) {
    match acceptor.accept(stream).await {
        Ok(tls) => attach_stream(tls, listener, info, &sink),
        Err(err) => warn!(
            event = events::LISTENER_TLS_HANDSHAKE_FAILED,
            component = COMPONENT,
            %listener,
            peer = %fields::format_peer(Some(info.remote_addr)),
            err = %err,
            "TLS handshake failed"
        ),
    }
}

/// Announces `stream` to the control loop, then starts its I/O tasks.
///
/// `Accepted` is queued before the reader can produce anything, so the control
/// loop always sees the connection before its first byte.
pub(crate) fn attach_stream<S>(
    stream: S,
    listener: ListenerId,
    info: ConnectionInfo,
    sink: &EventSink,
) where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let conn = sink.next_id();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (flow_tx, flow_rx) = watch::channel(false);
    let remote_addr = info.remote_addr;

    let announced = sink.emit(ConnectionEvent::Accepted {
        listener,
        connection: AcceptedConnection {
            id: conn,
            info,
            outbound: outbound_tx,
            flow: flow_tx,
        },
    });
    if !announced {
        return;
    }

    let (reader, writer) = tokio::io::split(stream);
    tokio::spawn(read_loop(conn, remote_addr, reader, flow_rx, sink.clone()));
    tokio::spawn(write_loop(conn, writer, outbound_rx, sink.clone()));
}

async fn read_loop<S>(
    conn: ConnectionId,
    remote_addr: SocketAddr,
    mut reader: ReadHalf<S>,
    mut flow: watch::Receiver<bool>,
    sink: EventSink,
) where
    S: AsyncRead + AsyncWrite,
{
    let mut buf = BytesMut::with_capacity(READ_CHUNK);
    let mut paused = false;

    loop {
        if paused {
            if flow.changed().await.is_err() {
                break;
            }
            paused = *flow.borrow_and_update();
            if !paused && !sink.emit(ConnectionEvent::FlowChanged { conn, paused }) {
                break;
            }
            continue;
        }

        buf.reserve(READ_CHUNK);
        tokio::select! {
            read = reader.read_buf(&mut buf) => match read {
                Ok(0) => {
                    trace!(component = COMPONENT, %conn, peer = %remote_addr, "peer closed");
                    sink.emit(ConnectionEvent::Closed { conn });
                    break;
                }
                Ok(_) => {
                    let chunk: Bytes = buf.split().freeze();
                    if !sink.emit(ConnectionEvent::Data { conn, chunk }) {
                        break;
                    }
                }
                Err(error) => {
                    debug!(
                        event = events::CONNECTION_READ_FAILED,
                        component = COMPONENT,
                        %conn,
                        peer = %remote_addr,
                        err = %error,
                        "read failed"
                    );
                    sink.emit(ConnectionEvent::Failed { conn, error });
                    break;
                }
            },
            changed = flow.changed() => {
                // The owner released the connection.
                if changed.is_err() {
                    break;
                }
                paused = *flow.borrow_and_update();
                if paused && !sink.emit(ConnectionEvent::FlowChanged { conn, paused }) {
                    break;
                }
            }
        }
    }
}

async fn write_loop<S>(
    conn: ConnectionId,
    mut writer: WriteHalf<S>,
    mut outbound: mpsc::UnboundedReceiver<Bytes>,
    sink: EventSink,
) where
    S: AsyncRead + AsyncWrite,
{
    while let Some(frame) = outbound.recv().await {
        if let Err(error) = writer.write_all(&frame).await {
            debug!(
                event = events::CONNECTION_WRITE_FAILED,
                component = COMPONENT,
                %conn,
                err = %error,
                "write failed"
            );
            sink.emit(ConnectionEvent::Failed { conn, error });
            return;
        }
    }
    let _ = writer.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn info() -> ConnectionInfo {
        let addr: SocketAddr = "127.0.0.1:6633".parse().expect("valid address");
        ConnectionInfo {
            remote_addr: addr,
            local_addr: addr,
            transport: TransportKind::Plaintext,
        }
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<ConnectionEvent>) -> ConnectionEvent {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("event in time")
            .expect("sink open")
    }

    #[tokio::test]
    async fn accepted_is_reported_before_data_and_close() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(tx);
        let (ours, mut theirs) = tokio::io::duplex(64);

        attach_stream(ours, ListenerId(0), info(), &sink);
        theirs.write_all(b"abc").await.expect("write");
        drop(theirs);

        let ConnectionEvent::Accepted { connection, .. } = next(&mut rx).await else {
            panic!("expected accepted first");
        };
        let mut data = Vec::new();
        loop {
            match next(&mut rx).await {
                ConnectionEvent::Data { conn, chunk } => {
                    assert_eq!(conn, connection.id);
                    data.extend_from_slice(&chunk);
                }
                ConnectionEvent::Closed { conn } => {
                    assert_eq!(conn, connection.id);
                    break;
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(data, b"abc");
    }

    #[tokio::test]
    async fn paused_reader_holds_data_until_resumed() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(tx);
        let (ours, mut theirs) = tokio::io::duplex(64);

        attach_stream(ours, ListenerId(0), info(), &sink);
        let ConnectionEvent::Accepted { connection, .. } = next(&mut rx).await else {
            panic!("expected accepted first");
        };

        connection.flow.send_replace(true);
        assert!(matches!(
            next(&mut rx).await,
            ConnectionEvent::FlowChanged { paused: true, .. }
        ));

        theirs.write_all(b"held").await.expect("write");
        assert!(timeout(Duration::from_millis(50), rx.recv()).await.is_err());

        connection.flow.send_replace(false);
        assert!(matches!(
            next(&mut rx).await,
            ConnectionEvent::FlowChanged { paused: false, .. }
        ));
        let ConnectionEvent::Data { chunk, .. } = next(&mut rx).await else {
            panic!("expected data after resume");
        };
        assert_eq!(&chunk[..], b"held");
    }

    #[tokio::test]
    async fn dropping_outbound_queue_shuts_write_half() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(tx);
        let (ours, mut theirs) = tokio::io::duplex(64);

        attach_stream(ours, ListenerId(0), info(), &sink);
        let ConnectionEvent::Accepted { connection, .. } = next(&mut rx).await else {
            panic!("expected accepted first");
        };
        connection
            .outbound
            .send(Bytes::from_static(b"bye"))
            .expect("writer alive");
        drop(connection);

        let mut received = Vec::new();
        timeout(Duration::from_secs(2), theirs.read_to_end(&mut received))
            .await
            .expect("eof in time")
            .expect("read");
        assert_eq!(received, b"bye");
    }
}
