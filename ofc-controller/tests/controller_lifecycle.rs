use bytes::Bytes;
use integration_test_utils::{init_logging, DatapathStream, FakeDatapath, TestPki, RECV_TIMEOUT};
use ofc_controller::bus::{BusEvent, SwitchCommand, Topic};
use ofc_controller::packet::{EthernetDecoder, PacketDecoder};
use ofc_controller::wire::{
    Action, FlowMod, FlowModCommand, Match, MessageType, OfBody, PacketIn, PacketOut,
    OFP_NO_BUFFER, OFP_VERSION,
};
use ofc_controller::{
    CommandError, Controller, ControllerConfig, DatapathId, DeviceRegistry, ListenerConfig,
    SessionId, TransportKind,
};
use std::cell::RefCell;
use std::net::SocketAddr;
use std::rc::Rc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

const DPID: DatapathId = DatapathId(0x1);

async fn started_controller() -> (Controller, SocketAddr) {
    init_logging();
    let config = ControllerConfig {
        listeners: vec![ListenerConfig::plaintext("127.0.0.1", 0)],
        ..Default::default()
    };
    let mut controller = Controller::new(config);
    let failures = controller.start().await;
    assert!(failures.is_empty(), "listener failed: {failures:?}");
    let addr = controller.local_addrs()[0];
    (controller, addr)
}

async fn paired(addr: SocketAddr, dpid: DatapathId) -> FakeDatapath {
    let mut datapath = FakeDatapath::connect(addr).await.expect("connect");
    datapath
        .handshake(dpid.0, OFP_VERSION, &[1, 2, 3])
        .await
        .expect("handshake");
    datapath
}

/// Round-trips an echo so everything sent before it has been processed.
async fn sync<S: DatapathStream>(datapath: &mut FakeDatapath<S>, xid: u32) {
    datapath
        .send(xid, OfBody::EchoRequest(Bytes::from_static(b"sync")))
        .await
        .expect("send echo");
    let reply = datapath
        .expect(MessageType::EchoReply)
        .await
        .expect("echo reply");
    assert_eq!(reply.xid, xid);
}

async fn wait_for_removal(registry: &DeviceRegistry, dpid: DatapathId) {
    let deadline = Instant::now() + RECV_TIMEOUT;
    while registry.contains(dpid) {
        assert!(Instant::now() < deadline, "switch was never removed");
        sleep(Duration::from_millis(10)).await;
    }
}

fn arp_request() -> Bytes {
    let mut frame = vec![0xff; 6];
    frame.extend_from_slice(&[0x0e, 0, 0, 0, 0, 0x01, 0x08, 0x06]);
    frame.extend_from_slice(&[0, 1, 0x08, 0, 6, 4, 0, 1]);
    frame.extend_from_slice(&[0x0e, 0, 0, 0, 0, 0x01, 10, 0, 0, 1]);
    frame.extend_from_slice(&[0, 0, 0, 0, 0, 0, 10, 0, 0, 2]);
    Bytes::from(frame)
}

#[tokio::test]
async fn racing_sessions_for_one_identity_share_one_switch() {
    let (mut controller, addr) = started_controller().await;
    let registry = controller.registry().clone();

    controller
        .run(async move {
            let mut first = FakeDatapath::connect(addr).await.expect("connect");
            let mut second = FakeDatapath::connect(addr).await.expect("connect");
            first.handshake(DPID.0, OFP_VERSION, &[1]).await.expect("handshake");
            second.handshake(DPID.0, OFP_VERSION, &[1]).await.expect("handshake");
            sync(&mut first, 100).await;
            sync(&mut second, 101).await;

            assert_eq!(registry.identities(), vec![DPID]);
            let switch = registry.get(DPID).expect("switch registered");
            assert_eq!(switch.session_count(), 2);
        })
        .await;
}

#[tokio::test]
async fn handshake_negotiates_the_lower_version() {
    let (mut controller, addr) = started_controller().await;

    controller
        .run(async move {
            let mut datapath = FakeDatapath::connect(addr).await.expect("connect");
            let hello = datapath.expect(MessageType::Hello).await.expect("hello");
            assert_eq!(hello.version, OFP_VERSION);

            datapath
                .send(7, OfBody::Hello(Bytes::new()))
                .await
                .expect("send hello");
            let request = datapath
                .expect(MessageType::FeaturesRequest)
                .await
                .expect("features request");
            assert_eq!(request.version, OFP_VERSION);
            assert_eq!(request.xid, 2);
        })
        .await;
}

#[tokio::test]
async fn echo_is_answered_before_the_handshake_completes() {
    let (mut controller, addr) = started_controller().await;

    controller
        .run(async move {
            let mut datapath = FakeDatapath::connect(addr).await.expect("connect");
            datapath.expect(MessageType::Hello).await.expect("hello");
            datapath
                .send(0xdead, OfBody::EchoRequest(Bytes::from_static(b"abc")))
                .await
                .expect("send echo");

            let reply = datapath
                .expect(MessageType::EchoReply)
                .await
                .expect("echo reply");
            assert_eq!(reply.xid, 0xdead);
            assert_eq!(reply.body, OfBody::EchoReply(Bytes::from_static(b"abc")));
        })
        .await;
}

#[tokio::test]
async fn feature_reply_with_wrong_xid_does_not_pair() {
    let (mut controller, addr) = started_controller().await;
    let registry = controller.registry().clone();
    let requested = Rc::new(RefCell::new(0));
    let counter = requested.clone();
    controller
        .bus()
        .subscribe(Topic::DeviceCreateRequested, move |_, _| {
            *counter.borrow_mut() += 1
        });

    controller
        .run(async move {
            let mut datapath = FakeDatapath::connect(addr).await.expect("connect");
            datapath.expect(MessageType::Hello).await.expect("hello");
            datapath
                .send(1, OfBody::Hello(Bytes::new()))
                .await
                .expect("send hello");
            datapath
                .expect(MessageType::FeaturesRequest)
                .await
                .expect("features request");
            datapath
                .send(
                    99,
                    OfBody::FeaturesReply(integration_test_utils::features(DPID.0, &[1])),
                )
                .await
                .expect("send features reply");
            sync(&mut datapath, 5).await;

            assert_eq!(*requested.borrow(), 0);
            assert!(registry.is_empty());
        })
        .await;
}

#[tokio::test]
async fn packet_in_reaches_applications_decoded() {
    let (mut controller, addr) = started_controller().await;
    let seen = Rc::new(RefCell::new(Vec::new()));
    let recorder = seen.clone();
    controller.bus().subscribe(Topic::AppPacketIn, move |_, event| {
        if let BusEvent::AppPacketIn(packet_in) = event {
            recorder.borrow_mut().push(packet_in.clone());
        }
    });

    controller
        .run(async move {
            let mut datapath = paired(addr, DPID).await;
            let frame = arp_request();
            datapath
                .send(
                    31,
                    OfBody::PacketIn(PacketIn {
                        buffer_id: 0x100,
                        total_len: frame.len() as u16,
                        in_port: 2,
                        reason: 0,
                        data: frame.clone(),
                    }),
                )
                .await
                .expect("send packet-in");
            sync(&mut datapath, 32).await;

            let seen = seen.borrow();
            assert_eq!(seen.len(), 1);
            let packet_in = &seen[0];
            assert_eq!(packet_in.dpid, DPID);
            assert_eq!(packet_in.session_id.as_str(), datapath.session_id());
            assert_eq!(packet_in.xid, 31);
            assert_eq!(packet_in.buffer_id, 0x100);
            assert_eq!(packet_in.in_port, 2);
            assert_eq!(packet_in.data, EthernetDecoder.decode(&frame));
        })
        .await;
}

#[tokio::test]
async fn commands_reach_only_the_named_session() {
    let (mut controller, addr) = started_controller().await;
    let registry = controller.registry().clone();
    let bus = controller.bus().clone();

    controller
        .run(async move {
            let mut datapath = paired(addr, DPID).await;
            sync(&mut datapath, 1).await;
            let session_id = SessionId::new(datapath.session_id());
            let switch = registry.get(DPID).expect("switch registered");

            let stranger = SessionId::new("192.0.2.10:1234");
            let result = switch.flow_mod(
                &stranger,
                40,
                FlowMod {
                    flow_match: Match::default(),
                    cookie: 0,
                    command: FlowModCommand::Add,
                    idle_timeout: 0,
                    hard_timeout: 0,
                    priority: 1,
                    buffer_id: OFP_NO_BUFFER,
                    out_port: 0xffff,
                    flags: 0,
                    actions: vec![Action::output(1)],
                },
            );
            assert!(matches!(result, Err(CommandError::UnknownSession { .. })));

            bus.publish(&BusEvent::AppPacketOut(SwitchCommand {
                dpid: DPID,
                session_id,
                xid: 41,
                body: PacketOut {
                    buffer_id: OFP_NO_BUFFER,
                    in_port: 1,
                    actions: vec![Action::output(3)],
                    data: arp_request(),
                },
            }));

            let sent = datapath
                .expect(MessageType::PacketOut)
                .await
                .expect("packet-out");
            assert_eq!(sent.xid, 41);
            let OfBody::PacketOut(packet_out) = sent.body else {
                panic!("packet-out body expected");
            };
            assert_eq!(packet_out.actions, vec![Action::output(3)]);
            assert_eq!(packet_out.data, arp_request());
        })
        .await;
}

#[tokio::test]
async fn disconnecting_the_last_session_removes_the_switch() {
    let (mut controller, addr) = started_controller().await;
    let registry = controller.registry().clone();

    controller
        .run(async move {
            let mut datapath = paired(addr, DPID).await;
            sync(&mut datapath, 1).await;
            assert!(registry.contains(DPID));

            datapath.shutdown().await.expect("shutdown");
            wait_for_removal(&registry, DPID).await;
        })
        .await;
}

#[tokio::test]
async fn switch_held_across_reconnect_leaves_the_new_session_alone() {
    let (mut controller, addr) = started_controller().await;
    let registry = controller.registry().clone();

    controller
        .run(async move {
            let mut first = paired(addr, DPID).await;
            sync(&mut first, 1).await;
            let stale = registry.get(DPID).expect("switch registered");

            first.shutdown().await.expect("shutdown");
            wait_for_removal(&registry, DPID).await;

            let mut second = paired(addr, DPID).await;
            sync(&mut second, 2).await;
            let fresh = registry.get(DPID).expect("switch re-created");
            assert_eq!(fresh.session_ids(), vec![SessionId::new(second.session_id())]);
            assert_eq!(stale.session_count(), 0);

            second.shutdown().await.expect("shutdown");
            wait_for_removal(&registry, DPID).await;
        })
        .await;
}

#[tokio::test]
async fn secured_listener_pairs_over_tls() {
    init_logging();
    let pki = TestPki::generate().expect("test certificate");
    let config = ControllerConfig {
        listeners: vec![ListenerConfig::secured(
            "127.0.0.1",
            0,
            pki.key_path(),
            pki.cert_path(),
        )],
        ..Default::default()
    };
    let mut controller = Controller::new(config);
    let failures = controller.start().await;
    assert!(failures.is_empty(), "listener failed: {failures:?}");
    let addr = controller.local_addrs()[0];
    let registry = controller.registry().clone();
    let connections = Rc::new(RefCell::new(Vec::new()));
    let recorder = connections.clone();
    controller.bus().subscribe(Topic::ServerConnection, move |_, event| {
        if let BusEvent::ServerConnection(connection) = event {
            recorder.borrow_mut().push(connection.clone());
        }
    });
    let connector = pki.connector();

    controller
        .run(async move {
            let mut datapath = FakeDatapath::connect_tls(addr, &connector)
                .await
                .expect("tls connect");
            datapath
                .handshake(DPID.0, OFP_VERSION, &[1, 2])
                .await
                .expect("handshake");
            sync(&mut datapath, 9).await;

            let connections = connections.borrow();
            assert_eq!(connections.len(), 1);
            assert_eq!(connections[0].transport, TransportKind::Secured);
            assert_eq!(connections[0].session_id.as_str(), datapath.session_id());

            let switch = registry.get(DPID).expect("switch registered");
            assert_eq!(switch.session_ids(), vec![SessionId::new(datapath.session_id())]);
            assert_eq!(switch.ports().numbers(), vec![1, 2]);
        })
        .await;
}

#[tokio::test]
async fn listener_without_address_fails_alone() {
    init_logging();
    let config = ControllerConfig {
        listeners: vec![
            ListenerConfig {
                port: Some(6633),
                ..Default::default()
            },
            ListenerConfig::plaintext("127.0.0.1", 0),
        ],
        ..Default::default()
    };
    let mut controller = Controller::new(config);
    let started = Rc::new(RefCell::new(Vec::new()));
    let recorder = started.clone();
    controller.bus().subscribe(Topic::ServerStarted, move |_, event| {
        if let BusEvent::ServerStarted(server) = event {
            recorder.borrow_mut().push(server.clone());
        }
    });

    let failures = controller.start().await;

    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].port, Some(6633));
    assert!(failures[0].address.is_none());
    let started = started.borrow();
    assert_eq!(started.len(), 1);
    assert_eq!(started[0].address, "127.0.0.1");
    assert_eq!(controller.local_addrs(), &[started[0].local_addr]);
}
