//! Session (spec.md §4.8): ties the frame codec, the job pool and the
//! typed data model together over one TCP connection. Grounded on
//! `messaging_client.h`'s single-class ownership of the socket, the
//! thread pool and the notification callbacks.

use crate::callbacks::Callbacks;
use crate::config::MeshConfig;
use crate::handshake::{self, HandshakeRequest, SessionType};
use meshwire_pool::{Job, JobPool, Priority, Worker};
use meshwire_proto::{binary, Container};
use meshwire_support::logging::{self, Logger};
use meshwire_support::transform::{CryptoState, NoopTransform, Transform};
use meshwire_support::{MeshError, MeshResult};
use meshwire_transport::frame::{DataMode, FrameConfig, PayloadKind};
use meshwire_transport::receive::ReceiveHooks;
use meshwire_support::FrameFault;
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

pub const MESSAGE_TYPE_ECHO: &str = "echo";

/// `mode`'s base kind selects the decode job's priority: control/data
/// containers travel as `packet` and decode at `High`; file bodies at
/// `Normal`; bulk binary at `Low` (spec.md §4.8).
fn priority_for_kind(kind: PayloadKind) -> Priority {
    match kind {
        PayloadKind::Packet => Priority::High,
        PayloadKind::File => Priority::Normal,
        PayloadKind::Binary => Priority::Low,
    }
}

struct PeerInfo {
    id: String,
    sub_id: String,
}

pub struct Session {
    config: MeshConfig,
    frame_config: FrameConfig,
    pool: Arc<JobPool>,
    workers: Mutex<Vec<Worker>>,
    writer: Mutex<Option<TcpStream>>,
    peer: Mutex<PeerInfo>,
    confirmed: Arc<AtomicBool>,
    transform: Mutex<Box<dyn Transform>>,
    callbacks: Arc<Callbacks>,
    io_thread: Mutex<Option<JoinHandle<()>>>,
    echo_thread: Mutex<Option<JoinHandle<()>>>,
    stopping: Arc<AtomicBool>,
    log: Logger,
}

impl Session {
    pub fn new(config: MeshConfig, callbacks: Callbacks, log: Logger) -> Arc<Session> {
        let frame_config = config.endpoint.frame_config();
        let pool = Arc::new(JobPool::new(log.new(logging::o!("component" => "pool"))));

        let workers = build_workers(&config, &pool, &log);

        // The connection key doubles as the shared secret the opaque
        // encrypt transform keys off (spec.md §1, §4.8) — both peers derive
        // the same AEAD key from it, with no separate exchange step. A
        // session that negotiates neither compression nor encryption falls
        // back to the no-op transform instead of special-casing `None`
        // everywhere the transform is used.
        let transform: Box<dyn Transform> = if config.session.encrypt {
            Box::new(CryptoState::new(meshwire_support::transform::derive_key(&config.session.connection_key)))
        } else {
            Box::new(NoopTransform)
        };

        Arc::new(Session {
            config,
            frame_config,
            pool,
            workers: Mutex::new(workers),
            writer: Mutex::new(None),
            peer: Mutex::new(PeerInfo { id: String::new(), sub_id: String::new() }),
            confirmed: Arc::new(AtomicBool::new(false)),
            transform: Mutex::new(transform),
            callbacks: Arc::new(callbacks),
            io_thread: Mutex::new(None),
            echo_thread: Mutex::new(None),
            stopping: Arc::new(AtomicBool::new(false)),
            log,
        })
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed.load(Ordering::SeqCst)
    }

    /// Connects to `address` as the requester side, sends the handshake,
    /// and starts the receive loop on a dedicated thread.
    pub fn connect(self: &Arc<Self>, address: &str) -> MeshResult<()> {
        let stream = TcpStream::connect(address)?;
        self.start_with_stream(stream)?;
        self.send_handshake(SessionType::Requester)
    }

    /// Adopts an already-accepted stream as the provider side and starts
    /// the receive loop. The provider waits for the peer's handshake
    /// rather than sending one first.
    pub fn accept(self: &Arc<Self>, stream: TcpStream) -> MeshResult<()> {
        self.start_with_stream(stream)
    }

    fn start_with_stream(self: &Arc<Self>, stream: TcpStream) -> MeshResult<()> {
        let reader = stream.try_clone()?;
        *self.writer.lock().unwrap() = Some(stream);

        let session = self.clone();
        let frame_config = self.frame_config;
        let handle = std::thread::spawn(move || {
            let mut hooks = SessionReceiveHooks { session: session.clone() };
            meshwire_transport::receive::run(reader, &frame_config, &mut hooks);
        });
        *self.io_thread.lock().unwrap() = Some(handle);

        if self.config.session.auto_echo {
            self.start_echo_thread();
        }

        Ok(())
    }

    fn start_echo_thread(self: &Arc<Self>) {
        let session = self.clone();
        let interval = Duration::from_secs(self.config.session.echo_interval_secs.max(1));
        let stopping = self.stopping.clone();
        let handle = std::thread::spawn(move || {
            while !stopping.load(Ordering::SeqCst) {
                std::thread::sleep(interval);
                if stopping.load(Ordering::SeqCst) {
                    break;
                }
                let heartbeat = Container::new(MESSAGE_TYPE_ECHO, "1");
                if let Err(err) = session.send(&heartbeat) {
                    if err.is_retryable() {
                        logging::debug!(session.log, "echo send would block, retrying next interval"; "error" => ?err);
                    } else {
                        logging::warn!(session.log, "echo send failed"; "error" => ?err);
                    }
                }
            }
        });
        *self.echo_thread.lock().unwrap() = Some(handle);
    }

    fn send_handshake(self: &Arc<Self>, session_type: SessionType) -> MeshResult<()> {
        let settings = &self.config.session;
        let request = HandshakeRequest {
            session_type,
            connection_key: settings.connection_key.clone(),
            compress: settings.compress,
            encrypt: settings.encrypt,
            bridge_line: settings.bridge_line,
            snipping_targets: Vec::new(),
        };
        let container = request.to_container(&settings.source_id, &settings.source_sub_id);
        self.send(&container)
    }

    /// Pushes a send job that serializes `container`, applies the
    /// negotiated transform, frames it, and writes it to the socket
    /// (spec.md §4.8's outbound path).
    pub fn send(self: &Arc<Self>, container: &Container) -> MeshResult<()> {
        let text = container.serialize()?;
        let compress = self.config.session.compress;
        let encrypt = self.config.session.encrypt;
        let session = self.clone();

        let pushed = self.pool.push(Job::new(Priority::High, Some(text.into_bytes()), move |payload| {
            let payload = session.apply_transform(encrypt, payload.unwrap_or_default());
            let mode = DataMode::compose(PayloadKind::Packet, compress, encrypt);
            if let Err(err) = session.write_framed(mode, &payload) {
                logging::error!(session.log, "send failed"; "error" => ?err);
            }
        }));

        if !pushed {
            return Err(MeshError::PoolLocked);
        }
        Ok(())
    }

    /// Sends a binary payload addressed to `target_id`/`target_sub_id`
    /// (spec.md §6.2).
    pub fn send_binary(self: &Arc<Self>, target_id: &str, target_sub_id: &str, data: Vec<u8>) -> MeshResult<()> {
        let settings = &self.config.session;
        let body = binary::encode_binary(&settings.source_id, &settings.source_sub_id, target_id, target_sub_id, &data);
        let compress = settings.compress;
        let encrypt = settings.encrypt;
        let session = self.clone();

        let pushed = self.pool.push(Job::new(Priority::Low, Some(body), move |payload| {
            let payload = payload.unwrap_or_default();
            let mode = DataMode::compose(PayloadKind::Binary, compress, encrypt);
            if let Err(err) = session.write_framed(mode, &payload) {
                logging::error!(session.log, "binary send failed"; "error" => ?err);
            }
        }));

        if !pushed {
            return Err(MeshError::PoolLocked);
        }
        Ok(())
    }

    /// Loads `local_path` through the file I/O helper and sends it as a
    /// `file`-mode frame addressed to `target_id`/`target_sub_id`, carrying
    /// the path and content as the two trailing runs (spec.md §6.1, §6.2,
    /// S3).
    pub fn send_files(self: &Arc<Self>, target_id: &str, target_sub_id: &str, local_path: &str) -> MeshResult<()> {
        let content = meshwire_support::filestore::load_bytes(local_path)?;
        let settings = &self.config.session;
        let body = binary::encode_file(
            &settings.source_id,
            &settings.source_sub_id,
            target_id,
            target_sub_id,
            local_path,
            &content,
        );
        let compress = settings.compress;
        let encrypt = settings.encrypt;
        let session = self.clone();

        let pushed = self.pool.push(Job::new(Priority::Normal, Some(body), move |payload| {
            let payload = payload.unwrap_or_default();
            let mode = DataMode::compose(PayloadKind::File, compress, encrypt);
            if let Err(err) = session.write_framed(mode, &payload) {
                logging::error!(session.log, "file send failed"; "error" => ?err);
            }
        }));

        if !pushed {
            return Err(MeshError::PoolLocked);
        }
        Ok(())
    }

    fn write_framed(&self, mode: DataMode, payload: &[u8]) -> MeshResult<()> {
        let mut guard = self.writer.lock().unwrap();
        let stream = guard.as_mut().ok_or(MeshError::Protocol("socket not connected"))?;
        meshwire_transport::send::send(stream, &self.frame_config, mode, payload)
    }

    /// Entry point for decoded frames, dispatched from the receive thread
    /// onto the job pool (spec.md §4.8).
    fn receive_on_tcp(self: &Arc<Self>, mode: DataMode, payload: Vec<u8>) {
        let priority = priority_for_kind(mode.kind());
        let session = self.clone();

        self.pool.push(Job::new(priority, Some(payload), move |payload| {
            let payload = payload.unwrap_or_default();
            session.decode_and_dispatch(mode, payload);
        }));
    }

    fn decode_and_dispatch(self: &Arc<Self>, mode: DataMode, payload: Vec<u8>) {
        let plain = match self.invert_transform(mode, payload) {
            Some(p) => p,
            None => {
                logging::error!(self.log, "transform inversion failed; dropping frame");
                return;
            }
        };

        match mode.kind() {
            PayloadKind::Packet => self.dispatch_packet(plain),
            PayloadKind::File => self.dispatch_file(plain),
            PayloadKind::Binary => self.dispatch_binary(plain),
        }
    }

    fn invert_transform(&self, mode: DataMode, payload: Vec<u8>) -> Option<Vec<u8>> {
        if !mode.encrypted() {
            return Some(payload);
        }
        let guard = self.transform.lock().unwrap();
        guard.open(&payload, &meshwire_support::PROTOCOL_ID.to_le_bytes())
    }

    fn apply_transform(&self, encrypt: bool, plain: Vec<u8>) -> Vec<u8> {
        if !encrypt {
            return plain;
        }
        let mut guard = self.transform.lock().unwrap();
        guard.seal(&plain, &meshwire_support::PROTOCOL_ID.to_le_bytes())
    }

    fn dispatch_packet(self: &Arc<Self>, payload: Vec<u8>) {
        let text = String::from_utf8_lossy(&payload);
        let container = match Container::parse(&text, false) {
            Ok(c) => c,
            Err(err) => {
                logging::error!(self.log, "container parse failed"; "error" => ?err);
                return;
            }
        };

        match container.message_type() {
            handshake::MESSAGE_TYPE_CONNECTION => self.handle_connection(container),
            handshake::MESSAGE_TYPE_CONFIRM => self.handle_confirm(container),
            MESSAGE_TYPE_ECHO => {}
            _ => {
                if !self.is_confirmed() {
                    logging::warn!(self.log, "dropping message before confirmation");
                    return;
                }
                self.callbacks.fire_message(container);
            }
        }
    }

    fn handle_connection(self: &Arc<Self>, container: Container) {
        let request = match HandshakeRequest::from_container(&container) {
            Ok(r) => r,
            Err(err) => {
                logging::error!(self.log, "bad handshake"; "error" => ?err);
                return;
            }
        };

        if request.connection_key != self.config.session.connection_key {
            logging::warn!(self.log, "connection key mismatch");
            return;
        }

        {
            let mut peer = self.peer.lock().unwrap();
            peer.id = container.source_id().to_string();
            peer.sub_id = container.source_sub_id().to_string();
        }

        let settings = &self.config.session;
        let confirm = handshake::confirm_container(&settings.source_id, &settings.source_sub_id, &request.connection_key);
        if let Err(err) = self.send(&confirm) {
            logging::error!(self.log, "confirm send failed"; "error" => ?err);
            return;
        }

        self.confirmed.store(true, Ordering::SeqCst);
        let peer = self.peer.lock().unwrap();
        self.callbacks.fire_connection(&peer.id, &peer.sub_id, true);
    }

    fn handle_confirm(self: &Arc<Self>, container: Container) {
        let expected = self.config.session.connection_key.clone();
        match handshake::is_matching_confirm(&container, &expected) {
            Ok(true) => {
                {
                    let mut peer = self.peer.lock().unwrap();
                    peer.id = container.source_id().to_string();
                    peer.sub_id = container.source_sub_id().to_string();
                }
                self.confirmed.store(true, Ordering::SeqCst);
                let peer = self.peer.lock().unwrap();
                self.callbacks.fire_connection(&peer.id, &peer.sub_id, true);
            }
            Ok(false) => logging::warn!(self.log, "confirm key mismatch"),
            Err(err) => logging::error!(self.log, "confirm parse failed"; "error" => ?err),
        }
    }

    fn dispatch_file(self: &Arc<Self>, payload: Vec<u8>) {
        if !self.is_confirmed() {
            return;
        }
        match binary::parse_addressing(&payload) {
            Ok((addr, rest)) if rest.len() == 2 => {
                let path = String::from_utf8_lossy(rest[0]).into_owned();
                self.callbacks.fire_file(
                    &addr.source_id,
                    &addr.source_sub_id,
                    &addr.target_id,
                    &addr.target_sub_id,
                    &path,
                    rest[1].to_vec(),
                );
            }
            Ok(_) => logging::error!(self.log, "file body missing path/content runs"),
            Err(err) => logging::error!(self.log, "file body parse failed"; "error" => ?err),
        }
    }

    fn dispatch_binary(self: &Arc<Self>, payload: Vec<u8>) {
        if !self.is_confirmed() {
            return;
        }
        match binary::parse_addressing(&payload) {
            Ok((addr, rest)) if rest.len() == 1 => {
                self.callbacks.fire_binary(
                    &addr.source_id,
                    &addr.source_sub_id,
                    &addr.target_id,
                    &addr.target_sub_id,
                    rest[0].to_vec(),
                );
            }
            Ok(_) => logging::error!(self.log, "binary body missing content run"),
            Err(err) => logging::error!(self.log, "binary body parse failed"; "error" => ?err),
        }
    }

    fn on_disconnected(self: &Arc<Self>) {
        self.confirmed.store(false, Ordering::SeqCst);
        let peer = self.peer.lock().unwrap();
        self.callbacks.fire_connection(&peer.id, &peer.sub_id, false);
    }

    /// Cooperative teardown (spec.md §5): lock the pool against new
    /// pushes, let in-flight jobs finish, stop the workers, close the
    /// socket and join the I/O thread.
    pub fn stop(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        self.pool.lock_for_teardown();

        for worker in self.workers.lock().unwrap().iter() {
            worker.stop();
        }

        if let Some(stream) = self.writer.lock().unwrap().take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }

        if let Some(handle) = self.io_thread.lock().unwrap().take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.echo_thread.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

struct SessionReceiveHooks {
    session: Arc<Session>,
}

impl ReceiveHooks for SessionReceiveHooks {
    fn on_frame(&mut self, mode: DataMode, payload: Vec<u8>) {
        self.session.receive_on_tcp(mode, payload);
    }

    fn on_frame_error(&mut self, fault: FrameFault) {
        let err = MeshError::Frame(fault);
        logging::error!(self.session.log, "frame error, resyncing"; "error" => ?err);
    }

    fn on_disconnected(&mut self) {
        self.session.on_disconnected();
    }
}

fn build_workers(config: &MeshConfig, pool: &Arc<JobPool>, log: &Logger) -> Vec<Worker> {
    let mut workers = Vec::new();

    for _ in 0..config.pool.workers_high {
        let worker = Worker::new(Priority::High, vec![Priority::Normal, Priority::Low], log.new(logging::o!("priority" => "high")));
        worker.start(pool.clone());
        workers.push(worker);
    }
    for _ in 0..config.pool.workers_normal {
        let worker = Worker::new(Priority::Normal, vec![Priority::Low, Priority::High], log.new(logging::o!("priority" => "normal")));
        worker.start(pool.clone());
        workers.push(worker);
    }
    for _ in 0..config.pool.workers_low {
        let worker = Worker::new(Priority::Low, vec![Priority::Normal, Priority::High], log.new(logging::o!("priority" => "low")));
        worker.start(pool.clone());
        workers.push(worker);
    }

    workers
}
