//! End-to-end tests over a loopback `TcpStream`, exercising the scenarios
//! spec.md §8 names explicitly: S4 (a corrupted frame is resynced past
//! without disconnecting) and S6 (messages before handshake confirmation
//! are dropped, messages after fire exactly once).
//!
//! Each test drives the wire directly with `meshwire_transport::send::send`
//! rather than going through a second `Session`, since the property under
//! test is the *receiving* session's behavior, not a full handshake
//! round-trip between two peers.

use meshwire_proto::{Container, Value};
use meshwire_session::config::MeshConfig;
use meshwire_session::handshake::{HandshakeRequest, SessionType};
use meshwire_session::{Callbacks, Session};
use meshwire_support::logging;
use meshwire_transport::frame::{DataMode, PayloadKind};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn provider_config(address: &str) -> MeshConfig {
    let mut config = MeshConfig::default();
    config.endpoint.address = address.to_string();
    config.session.source_id = "provider".to_string();
    config.session.connection_key = "shared-secret".to_string();
    config.session.auto_echo = false;
    config.pool.workers_high = 1;
    config.pool.workers_normal = 1;
    config.pool.workers_low = 1;
    config
}

/// Binds a listener, accepts one connection into a provider `Session`, and
/// hands back the raw client-side stream plus the messages its message
/// callback has observed.
fn start_provider() -> (Arc<Session>, TcpStream, Arc<Mutex<Vec<Container>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap().to_string();

    let client = TcpStream::connect(&address).unwrap();
    let (server_stream, _) = listener.accept().unwrap();

    let received = Arc::new(Mutex::new(Vec::new()));
    let received_clone = received.clone();

    let mut callbacks = Callbacks::default();
    callbacks.set_message(move |container| {
        received_clone.lock().unwrap().push(container);
    });

    let session = Session::new(provider_config(&address), callbacks, logging::discard());
    session.accept(server_stream).unwrap();

    (session, client, received)
}

fn send_handshake(client: &mut TcpStream) {
    let request = HandshakeRequest {
        session_type: SessionType::Requester,
        connection_key: "shared-secret".to_string(),
        compress: false,
        encrypt: false,
        bridge_line: false,
        snipping_targets: Vec::new(),
    };
    let container = request.to_container("requester", "");
    let text = container.serialize().unwrap();
    let frame_config = meshwire_transport::frame::FrameConfig::default();
    meshwire_transport::send::send(
        client,
        &frame_config,
        DataMode::compose(PayloadKind::Packet, false, false),
        text.as_bytes(),
    )
    .unwrap();
}

fn send_data_container(client: &mut TcpStream, note: &str) {
    let mut container = Container::data_container();
    container.add(Value::string("note", note));
    let text = container.serialize().unwrap();
    let frame_config = meshwire_transport::frame::FrameConfig::default();
    meshwire_transport::send::send(
        client,
        &frame_config,
        DataMode::compose(PayloadKind::Packet, false, false),
        text.as_bytes(),
    )
    .unwrap();
}

#[test]
fn s6_messages_before_confirmation_are_dropped_after_fire_once() {
    let (session, mut client, received) = start_provider();

    // Before the handshake: a data container must not reach the callback.
    send_data_container(&mut client, "too early");
    std::thread::sleep(Duration::from_millis(150));
    assert!(received.lock().unwrap().is_empty());
    assert!(!session.is_confirmed());

    // Complete the handshake; the provider confirms and flips to confirmed.
    send_handshake(&mut client);
    std::thread::sleep(Duration::from_millis(150));
    assert!(session.is_confirmed());

    // After confirmation: the same kind of message fires exactly once.
    send_data_container(&mut client, "on time");
    std::thread::sleep(Duration::from_millis(150));

    let mut messages = received.lock().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].get("note", 0).as_string(), "on time");

    session.stop();
}

#[test]
fn s4_corrupted_frame_resyncs_and_only_the_valid_packet_is_delivered() {
    let (session, mut client, received) = start_provider();

    send_handshake(&mut client);
    std::thread::sleep(Duration::from_millis(150));
    assert!(session.is_confirmed());

    // A well-formed frame with its end code corrupted, immediately followed
    // by a valid one — the receive state machine must resync past the first
    // and deliver only the second (spec.md §4.4, §8 S4).
    let frame_config = meshwire_transport::frame::FrameConfig::default();
    let mut corrupted = meshwire_transport::frame::encode(
        &frame_config,
        DataMode::compose(PayloadKind::Packet, false, false),
        b"@header={[5,data_container];[6,1];};@data={};",
    );
    let last = corrupted.len() - 1;
    corrupted[last] ^= 0xFF;
    std::io::Write::write_all(&mut client, &corrupted).unwrap();

    send_data_container(&mut client, "second packet");
    std::thread::sleep(Duration::from_millis(150));

    let messages = received.lock().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].get("note", 0).as_string(), "second packet");

    session.stop();
}
