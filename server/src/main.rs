//! Demo binary wiring the fabric into a runnable listener/dialer. Mirrors
//! `gamerunner`'s clap + `serdeconv` config loading and the authenticator
//! service's `logging::init` + panic routing, adapted to a session that
//! either accepts one inbound connection or dials out to a peer.

use clap::{App, Arg};
use meshwire_session::config::MeshConfig;
use meshwire_session::{Callbacks, Session};
use meshwire_support::logging;
use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn install_panic_hook(log: logging::Logger) {
    std::panic::set_hook(Box::new(move |info| {
        logging::error!(log, "panic"; "info" => %info);
    }));
}

fn build_callbacks(log: logging::Logger) -> Callbacks {
    let mut callbacks = Callbacks::default();

    let connection_log = log.clone();
    callbacks.set_connection(move |peer_id, peer_sub_id, connected| {
        logging::info!(connection_log, "connection state changed";
            "peer_id" => peer_id.to_string(),
            "peer_sub_id" => peer_sub_id.to_string(),
            "connected" => connected);
    });

    let message_log = log.clone();
    callbacks.set_message(move |container| {
        logging::info!(message_log, "message received";
            "message_type" => container.message_type().to_string(),
            "source_id" => container.source_id().to_string());
    });

    let file_log = log.clone();
    callbacks.set_file(move |source_id, source_sub_id, target_id, target_sub_id, path, content| {
        logging::info!(file_log, "file received";
            "source_id" => source_id.to_string(),
            "source_sub_id" => source_sub_id.to_string(),
            "target_id" => target_id.to_string(),
            "target_sub_id" => target_sub_id.to_string(),
            "path" => path.to_string(),
            "bytes" => content.len());
    });

    let binary_log = log.clone();
    callbacks.set_binary(move |source_id, source_sub_id, target_id, target_sub_id, data| {
        logging::info!(binary_log, "binary received";
            "source_id" => source_id.to_string(),
            "source_sub_id" => source_sub_id.to_string(),
            "target_id" => target_id.to_string(),
            "target_sub_id" => target_sub_id.to_string(),
            "bytes" => data.len());
    });

    callbacks
}

fn main() {
    let matches = App::new("Meshwire Server")
        .version("1.0")
        .author("Bush Hammer Industries")
        .about("Runs one endpoint of the framed, typed messaging fabric.")
        .arg(
            Arg::with_name("CONFIG_FILE")
                .help("Path to the endpoint's meshwire.toml")
                .default_value("meshwire.toml"),
        )
        .arg(
            Arg::with_name("LOG_CONFIG_FILE")
                .help("Path to the sloggers log config")
                .default_value("meshwire.log.toml"),
        )
        .arg(
            Arg::with_name("connect")
                .long("connect")
                .value_name("ADDRESS")
                .help("Dial a peer instead of listening for one"),
        )
        .get_matches();

    let config_path = matches.value_of("CONFIG_FILE").unwrap();
    let log_config_path = matches.value_of("LOG_CONFIG_FILE").unwrap();

    let log = logging::init(log_config_path);
    install_panic_hook(log.clone());

    let config = MeshConfig::load(config_path);
    let callbacks = build_callbacks(log.clone());
    let session = Session::new(config.clone(), callbacks, log.new(logging::o!("component" => "session")));

    let connect_result = match matches.value_of("connect") {
        Some(address) => {
            logging::info!(log, "dialing peer"; "address" => address.to_string());
            session.connect(address)
        }
        None => {
            logging::info!(log, "listening"; "address" => config.endpoint.address.clone());
            let listener = TcpListener::bind(&config.endpoint.address).expect("failed to bind endpoint address");
            let (stream, peer_addr) = listener.accept().expect("failed to accept inbound connection");
            logging::info!(log, "accepted connection"; "peer_addr" => peer_addr.to_string());
            session.accept(stream)
        }
    };

    if let Err(err) = connect_result {
        logging::error!(log, "failed to establish session"; "error" => ?err);
        return;
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_handler = shutdown.clone();
    ctrlc::set_handler(move || {
        shutdown_handler.store(true, Ordering::SeqCst);
    })
    .expect("failed to install SIGINT handler");

    while !shutdown.load(Ordering::SeqCst) {
        std::thread::sleep(std::time::Duration::from_millis(200));
    }

    logging::info!(log, "shutting down");
    session.stop();
}
