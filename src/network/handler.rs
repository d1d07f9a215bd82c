//! The connection engine: socket ownership, the reader task, request
//! correlation, and the resume state machine.

use std::sync::{Arc, Mutex as StdMutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::pending::PendingTable;
use super::state::NetworkState;
use crate::codec::{
    commands, decrypt_frame, encode_request, CodecError, CommandRegistry, InboundChat, Packet,
    PacketBody,
};
use crate::config::ImpConfig;
use crate::error::{ImpError, Result};
use crate::event::{Event, InboundMessage};
use crate::message::{MessageContext, MessagePipeline};
use crate::session::SessionKeys;
use crate::sso::SsoProcessor;

/// Read buffer size for the socket reader task.
const READ_CHUNK: usize = 8 * 1024;

/// Cheap-to-clone handle to one account's connection engine.
///
/// All per-connection state (keys, socket halves, pending table entries)
/// is rebuilt by [`resume_connection`]; the handle itself survives any
/// number of drops and resumes. Tasks spawned by the engine hold clones
/// of this handle, so [`close`] must be called for a full teardown.
///
/// [`resume_connection`]: NetworkHandler::resume_connection
/// [`close`]: NetworkHandler::close
#[derive(Clone)]
pub struct NetworkHandler {
    inner: Arc<HandlerInner>,
}

struct HandlerInner {
    config: ImpConfig,
    sso: SsoProcessor,
    registry: CommandRegistry,
    pipeline: MessagePipeline,

    state: StdMutex<NetworkState>,
    pending: PendingTable,
    /// Keys of the current connection; replaced wholesale on resume.
    session: StdMutex<Option<Arc<SessionKeys>>>,
    writer: AsyncMutex<Option<OwnedWriteHalf>>,
    /// Serializes resume/close so only one handshake runs at a time.
    transition: AsyncMutex<()>,
    events: broadcast::Sender<Event>,
    reader_task: StdMutex<Option<JoinHandle<()>>>,
    heartbeat_task: StdMutex<Option<JoinHandle<()>>>,
}

impl NetworkHandler {
    /// Builds an engine in [`NetworkState::Initialized`]. Nothing
    /// touches the network until [`resume_connection`] is called.
    ///
    /// [`resume_connection`]: NetworkHandler::resume_connection
    pub fn new(
        config: ImpConfig,
        sso: SsoProcessor,
        registry: CommandRegistry,
        pipeline: MessagePipeline,
    ) -> Self {
        let (events, _) = broadcast::channel(config.network.event_buffer.max(1));
        Self {
            inner: Arc::new(HandlerInner {
                config,
                sso,
                registry,
                pipeline,
                state: StdMutex::new(NetworkState::Initialized),
                pending: PendingTable::new(),
                session: StdMutex::new(None),
                writer: AsyncMutex::new(None),
                transition: AsyncMutex::new(()),
                events,
                reader_task: StdMutex::new(None),
                heartbeat_task: StdMutex::new(None),
            }),
        }
    }

    /// Current connection state.
    pub fn state(&self) -> NetworkState {
        *lock(&self.inner.state)
    }

    /// Subscribes to engine events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.events.subscribe()
    }

    /// Number of requests awaiting a response.
    pub fn pending_requests(&self) -> usize {
        self.inner.pending.len()
    }

    /// Account this engine authenticates as.
    pub fn account_id(&self) -> i64 {
        self.inner.sso.account_id()
    }

    /// Connects, negotiates keys, logs in, and registers the device.
    ///
    /// Idempotent: returns `Ok(true)` immediately when already `Ok`.
    /// Transient failures (unreachable servers, dropped sockets,
    /// retry-later logins) leave the engine in
    /// [`NetworkState::SneakOff`] and return `Ok(false)`. Fatal login
    /// failures close the engine and return the error.
    pub async fn resume_connection(&self) -> Result<bool> {
        let _guard = self.inner.transition.lock().await;

        match self.state() {
            NetworkState::Ok => return Ok(true),
            NetworkState::Closed => return Err(ImpError::NotConnected),
            _ => {}
        }
        self.set_state(NetworkState::Connecting);
        self.teardown_connection().await;

        let stream = match self.connect_any().await {
            Some(stream) => stream,
            None => {
                warn!("no configured server reachable");
                self.set_state(NetworkState::SneakOff);
                return Ok(false);
            }
        };

        let keys = Arc::new(SessionKeys::new());
        *lock(&self.inner.session) = Some(keys.clone());
        let (read_half, write_half) = stream.into_split();
        *self.inner.writer.lock().await = Some(write_half);
        self.spawn_reader(read_half, keys.clone());

        let handshake = async {
            self.inner.sso.login(self, &keys).await?;
            self.inner.sso.register(self).await
        };
        if let Err(e) = handshake.await {
            self.teardown_connection().await;
            // Transport errors here only mean the socket died
            // mid-handshake; fatal is reserved for login verdicts that
            // retrying cannot fix.
            let fatal = matches!(&e, ImpError::Login(l) if l.kill_bot());
            if fatal {
                warn!(error = %e, "login failed fatally, closing engine");
                self.set_state(NetworkState::Closed);
                return Err(e);
            }
            warn!(error = %e, "login failed, engine left resumable");
            self.set_state(NetworkState::SneakOff);
            return Ok(false);
        }

        self.spawn_heartbeat();
        self.set_state(NetworkState::Ok);
        info!(account = self.account_id(), "connection established");
        Ok(true)
    }

    /// Sends a request and waits for the matching response.
    ///
    /// Each timed-out attempt abandons its sequence id and retries with
    /// a fresh one, up to the configured attempt count; a response to an
    /// abandoned id is dropped by the reader. Write failures surface to
    /// this caller only.
    pub async fn send_and_expect(&self, command: &str, body: Vec<u8>) -> Result<Packet> {
        let attempts = self.inner.config.network.max_retries.max(1);
        let per_attempt = self.inner.config.network.request_timeout();

        for attempt in 1..=attempts {
            let keys = self.current_keys()?;
            let sequence_id = keys.next_sequence();
            let frame = encode_request(command, sequence_id, &body, &keys)?;
            // Register before writing so a fast response cannot race
            // past an unregistered waiter.
            let rx = self.inner.pending.insert(sequence_id);
            if let Err(e) = self.write_frame(&frame, command, sequence_id).await {
                self.inner.pending.remove(sequence_id);
                return Err(e);
            }
            match tokio::time::timeout(per_attempt, rx).await {
                Ok(Ok(packet)) => return Ok(packet),
                Ok(Err(_dropped)) => {
                    // Waiters are only woken en masse during teardown;
                    // close() marks the state before tearing down, so the
                    // state tells shutdown apart from a connection being
                    // replaced by a resume or killed by the server.
                    if self.state() == NetworkState::Closed {
                        return Err(ImpError::HandlerClosed);
                    }
                    return Err(ImpError::NotConnected);
                }
                Err(_elapsed) => {
                    self.inner.pending.remove(sequence_id);
                    debug!(command, attempt, "request attempt timed out");
                }
            }
        }
        Err(ImpError::Timeout {
            command: command.to_owned(),
            attempts,
        })
    }

    /// Sends a request without waiting for any response.
    pub async fn send_without_expect(&self, command: &str, body: Vec<u8>) -> Result<()> {
        let keys = self.current_keys()?;
        let sequence_id = keys.next_sequence();
        let frame = encode_request(command, sequence_id, &body, &keys)?;
        self.write_frame(&frame, command, sequence_id).await
    }

    /// Shuts the engine down for good: best-effort logout, then socket
    /// teardown. Every in-flight request fails with
    /// [`ImpError::HandlerClosed`].
    pub async fn close(&self) {
        let _guard = self.inner.transition.lock().await;
        if self.state() == NetworkState::Closed {
            return;
        }
        if self.state() == NetworkState::Ok {
            self.inner.sso.logout(self).await;
        }
        self.set_state(NetworkState::Closed);
        self.teardown_connection().await;
        info!(account = self.account_id(), "engine closed");
    }

    fn current_keys(&self) -> Result<Arc<SessionKeys>> {
        lock(&self.inner.session)
            .clone()
            .ok_or(ImpError::NotConnected)
    }

    async fn write_frame(&self, frame: &[u8], command: &str, sequence_id: i32) -> Result<()> {
        let mut writer = self.inner.writer.lock().await;
        let stream = writer.as_mut().ok_or(ImpError::NotConnected)?;
        stream.write_all(frame).await?;
        trace!(command, sequence_id, len = frame.len(), "frame sent");
        Ok(())
    }

    async fn connect_any(&self) -> Option<TcpStream> {
        let servers = &self.inner.config.network.servers;
        let timeout = self.inner.config.network.connect_timeout();
        for server in servers {
            match tokio::time::timeout(timeout, TcpStream::connect(server)).await {
                Ok(Ok(stream)) => {
                    debug!(server, "connected");
                    return Some(stream);
                }
                Ok(Err(e)) => warn!(server, error = %e, "connect failed"),
                Err(_) => warn!(server, "connect timed out"),
            }
        }
        None
    }

    fn spawn_reader(&self, mut read_half: OwnedReadHalf, keys: Arc<SessionKeys>) {
        let handler = self.clone();
        let task = tokio::spawn(async move {
            let mut decoder = crate::codec::FrameDecoder::new();
            let mut buf = [0u8; READ_CHUNK];
            'io: loop {
                let n = match read_half.read(&mut buf).await {
                    Ok(0) => {
                        debug!("server closed the connection");
                        break;
                    }
                    Ok(n) => n,
                    Err(e) => {
                        warn!(error = %e, "socket read failed");
                        break;
                    }
                };
                decoder.extend(&buf[..n]);
                loop {
                    match decoder.next_frame() {
                        Ok(None) => break,
                        Ok(Some(frame)) => handler.handle_frame(&keys, frame).await,
                        Err(e @ CodecError::InvalidLength { .. }) => {
                            warn!(error = %e, "stream desynced, dropping connection");
                            break 'io;
                        }
                        Err(e) => warn!(error = %e, "malformed frame dropped"),
                    }
                }
            }
            handler.on_connection_lost();
        });
        *lock(&self.inner.reader_task) = Some(task);
    }

    fn spawn_heartbeat(&self) {
        if !self.inner.config.heartbeat.enabled {
            return;
        }
        let handler = self.clone();
        let interval = self.inner.config.heartbeat.interval();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match handler.send_and_expect(commands::HEARTBEAT, Vec::new()).await {
                    Ok(_) => trace!("heartbeat acknowledged"),
                    Err(e) => {
                        warn!(error = %e, "heartbeat failed, marking connection dropped");
                        handler.on_connection_lost();
                        break;
                    }
                }
            }
        });
        *lock(&self.inner.heartbeat_task) = Some(task);
    }

    /// One decrypted frame off the wire: complete a pending request or
    /// dispatch a push.
    async fn handle_frame(&self, keys: &SessionKeys, frame: crate::codec::RawFrame) {
        let plaintext = match decrypt_frame(&frame, keys) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                warn!(command = %frame.header.command, error = %e, "undecryptable frame dropped");
                return;
            }
        };
        let packets = match self.inner.registry.decode_packets(&frame.header, &plaintext) {
            Ok(packets) => packets,
            Err(e) => {
                warn!(command = %frame.header.command, error = %e, "unparseable body dropped");
                return;
            }
        };
        for packet in packets {
            let sequence_id = packet.sequence_id;
            if self.inner.pending.complete(sequence_id, packet.clone()) {
                continue;
            }
            self.dispatch_push(packet).await;
        }
    }

    async fn dispatch_push(&self, packet: Packet) {
        match packet.body {
            PacketBody::Chat(chat) => self.dispatch_chat(chat),
            PacketBody::ForceOffline(notice) => {
                warn!(code = notice.code, message = %notice.message, "forced offline by server");
                self.emit(Event::ForceOffline {
                    code: notice.code,
                    message: notice.message,
                });
                if self.state() != NetworkState::Closed {
                    self.set_state(NetworkState::SneakOff);
                }
                // The server ended the session; every pending request
                // died with it, so wake the waiters immediately.
                self.inner.pending.fail_all();
                self.inner.writer.lock().await.take();
            }
            other => {
                trace!(command = %packet.command, body = ?other, "uncorrelated packet dropped");
            }
        }
    }

    fn dispatch_chat(&self, chat: InboundChat) {
        let context = MessageContext {
            source: chat.source,
            sender: chat.sender,
            receiver: self.account_id(),
        };
        let message = self.inner.pipeline.decode(&chat.elements, &context);
        self.emit(Event::MessageReceived(InboundMessage {
            context,
            message_seq: chat.message_seq,
            message,
        }));
    }

    /// Reader exit or heartbeat failure: drop to `SneakOff` unless the
    /// engine is already closed. In-flight requests are not cancelled;
    /// each runs into its own timeout and retry accounting, and only
    /// the request hit by an I/O failure sees that error directly.
    fn on_connection_lost(&self) {
        if self.state() != NetworkState::Closed {
            self.set_state(NetworkState::SneakOff);
        }
    }

    /// Aborts the connection tasks and releases the socket. State is
    /// untouched; callers set it.
    async fn teardown_connection(&self) {
        if let Some(task) = lock(&self.inner.reader_task).take() {
            task.abort();
        }
        if let Some(task) = lock(&self.inner.heartbeat_task).take() {
            task.abort();
        }
        self.inner.pending.fail_all();
        if let Some(mut stream) = self.inner.writer.lock().await.take() {
            let _ = stream.shutdown().await;
        }
        lock(&self.inner.session).take();
    }

    fn set_state(&self, next: NetworkState) {
        {
            let mut state = lock(&self.inner.state);
            if *state == next {
                return;
            }
            debug!(from = %*state, to = %next, "state transition");
            *state = next;
        }
        self.emit(Event::StateChanged(next));
    }

    // A send error only means nobody is subscribed.
    fn emit(&self, event: Event) {
        let _ = self.inner.events.send(event);
    }

    /// Access to the content pipeline for encoding outbound messages.
    pub fn pipeline(&self) -> &MessagePipeline {
        &self.inner.pipeline
    }
}

fn lock<T>(mutex: &StdMutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
