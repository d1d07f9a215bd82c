//! Scripted loopback server speaking the IMP wire format.
//!
//! Runs a real TCP listener and drives the protocol with its own key
//! exchange, so the client stack under test is exercised end to end,
//! crypto included. Behavior is selected per test via [`ServerBehavior`].
//!
//! Debug commands understood by the mock (no parser registered client
//! side, so responses surface as `PacketBody::Unknown`):
//!
//! - `debug.delay`: first body byte is a delay in 10 ms units; the rest
//!   is echoed back after the delay, enabling out-of-order responses
//! - `debug.kick`: answers nothing, pushes a `push.force_offline`

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use imp::codec::{
    commands, decrypt_body, encode_frame, BodyReader, BodyWriter, FrameDecoder, RawFrame,
};
use imp::crypto::{KeyExchange, KeyMaterial, PublicKey};
use imp::session::CryptoPhase;

/// Session key the mock issues on every successful login.
pub const SESSION_KEY_BYTES: [u8; 32] = [0xA5; 32];

/// Session signature the mock issues on every successful login.
pub const SESSION_SIGNATURE: &[u8] = b"mock-signature-v2";

/// How the mock answers `auth.login` submissions.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub enum LoginScript {
    /// Any credential submission succeeds.
    #[default]
    Immediate,
    /// Credential submissions get a captcha; a captcha answer succeeds.
    CaptchaOnce,
    /// Resume submissions are expired; password submissions succeed.
    ExpireResume,
    /// Everything is a wrong credential.
    WrongCredential,
}

/// Per-connection behavior knobs.
#[derive(Clone, Default)]
pub struct ServerBehavior {
    pub login: LoginScript,
    /// Silently drop this many `message.send` requests before answering.
    pub ignore_sends: usize,
    /// After acking a `message.send`, push the same elements back as an
    /// inbound group message from account 777.
    pub push_on_send: bool,
}

pub struct MockServer {
    pub addr: String,
    handle: JoinHandle<()>,
    connections: Arc<std::sync::Mutex<Vec<JoinHandle<()>>>>,
}

impl MockServer {
    pub async fn spawn(behavior: ServerBehavior) -> Self {
        // RUST_LOG=imp=trace makes failing runs readable.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind loopback");
        let addr = listener.local_addr().expect("local addr").to_string();
        let connections = Arc::new(std::sync::Mutex::new(Vec::new()));
        let tracked = connections.clone();
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let task = tokio::spawn(serve_connection(stream, behavior.clone()));
                tracked.lock().expect("tracker lock").push(task);
            }
        });
        Self {
            addr,
            handle,
            connections,
        }
    }

    /// Config pointing a client at this mock, with test-friendly
    /// timeouts.
    pub fn client_config(&self) -> imp::ImpConfig {
        let mut config = imp::ImpConfig::default();
        config.network.servers = vec![self.addr.clone()];
        config.network.connect_timeout_ms = 2_000;
        config.network.request_timeout_ms = 2_000;
        config.network.max_retries = 3;
        config.heartbeat.enabled = false;
        config
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
        // Aborting the connection tasks drops their sockets, so clients
        // observe the disconnect.
        for task in self.connections.lock().expect("tracker lock").drain(..) {
            task.abort();
        }
    }
}

struct Connection {
    writer: Arc<Mutex<OwnedWriteHalf>>,
    exchange: KeyExchange,
    session_key: Option<KeyMaterial>,
    behavior: ServerBehavior,
    ignored_sends: usize,
    next_message_seq: i32,
    /// Sequence ids for server-initiated pushes; negative so they can
    /// never collide with client-issued ids.
    next_push_seq: i32,
}

async fn serve_connection(stream: TcpStream, behavior: ServerBehavior) {
    let (mut read_half, write_half) = stream.into_split();
    let mut conn = Connection {
        writer: Arc::new(Mutex::new(write_half)),
        exchange: KeyExchange::new(),
        session_key: None,
        behavior,
        ignored_sends: 0,
        next_message_seq: 1_000,
        next_push_seq: -1,
    };

    let mut decoder = FrameDecoder::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = match read_half.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        decoder.extend(&buf[..n]);
        while let Ok(Some(frame)) = decoder.next_frame() {
            conn.handle(frame).await;
        }
    }
}

impl Connection {
    fn key_for(&self, phase: CryptoPhase) -> Option<KeyMaterial> {
        match phase {
            CryptoPhase::Plain => None,
            CryptoPhase::Handshake => self.exchange.handshake_key().cloned(),
            CryptoPhase::Session => self.session_key.clone(),
        }
    }

    async fn reply(&self, phase: CryptoPhase, seq: i32, command: &str, body: &[u8]) {
        let key = self.key_for(phase);
        let frame =
            encode_frame(phase, seq, command, body, key.as_ref()).expect("mock encodes frame");
        let _ = self.writer.lock().await.write_all(&frame).await;
    }

    async fn handle(&mut self, frame: RawFrame) {
        let phase = frame.header.phase;
        let seq = frame.header.sequence_id;
        let key = self.key_for(phase);
        let Ok(body) = decrypt_body(&frame, key.as_ref()) else {
            return;
        };

        match frame.header.command.as_str() {
            commands::KEY_EXCHANGE => {
                let client_public =
                    PublicKey::from_slice(&body).expect("client public key");
                self.exchange
                    .complete(&client_public)
                    .expect("mock exchange completes");
                let server_public = *self.exchange.public_key().as_bytes();
                self.reply(CryptoPhase::Plain, seq, commands::KEY_EXCHANGE, &server_public)
                    .await;
            }
            commands::LOGIN => {
                let response = self.login_response(body[0]);
                self.reply(CryptoPhase::Handshake, seq, commands::LOGIN, &response)
                    .await;
            }
            commands::REGISTER => {
                let mut w = BodyWriter::new();
                w.u8(0).bytes_u16(b"mock-device-session");
                self.reply(phase, seq, commands::REGISTER, &w.into_bytes())
                    .await;
            }
            commands::HEARTBEAT => {
                self.reply(phase, seq, commands::HEARTBEAT, &[]).await;
            }
            commands::SEND_MESSAGE => {
                if self.ignored_sends < self.behavior.ignore_sends {
                    self.ignored_sends += 1;
                    return;
                }
                self.next_message_seq += 1;
                let message_seq = self.next_message_seq;
                let mut w = BodyWriter::new();
                w.u8(0).i32(message_seq);
                self.reply(phase, seq, commands::SEND_MESSAGE, &w.into_bytes())
                    .await;

                if self.behavior.push_on_send {
                    self.push_back(&body, message_seq).await;
                }
            }
            "debug.delay" => {
                let delay_units = body.first().copied().unwrap_or(0);
                let echo = body[1.min(body.len())..].to_vec();
                // Hold only a weak reference so a pending echo does not
                // keep the socket's write half alive after the
                // connection task is aborted.
                let writer = Arc::downgrade(&self.writer);
                let command = frame.header.command.clone();
                let frame_out = encode_frame(phase, seq, &command, &echo, key.as_ref())
                    .expect("mock encodes echo");
                tokio::spawn(async move {
                    tokio::time::sleep(std::time::Duration::from_millis(
                        u64::from(delay_units) * 10,
                    ))
                    .await;
                    if let Some(writer) = writer.upgrade() {
                        let _ = writer.lock().await.write_all(&frame_out).await;
                    }
                });
            }
            "debug.kick" => {
                let mut w = BodyWriter::new();
                w.u8(1).string_u16("logged in elsewhere");
                let push_seq = self.next_push_seq;
                self.next_push_seq -= 1;
                self.reply(phase, push_seq, commands::FORCE_OFFLINE, &w.into_bytes())
                    .await;
            }
            _ => {
                // Echo unknown commands verbatim.
                self.reply(phase, seq, &frame.header.command, &body).await;
            }
        }
    }

    fn login_response(&mut self, kind: u8) -> Vec<u8> {
        let mut w = BodyWriter::new();
        let mut success = false;
        match (self.behavior.login, kind) {
            (LoginScript::WrongCredential, _) => {
                w.u8(0x05);
            }
            (LoginScript::CaptchaOnce, 0x01 | 0x02) => {
                w.u8(0x01).bytes_u32(b"mock-captcha-image");
            }
            (LoginScript::ExpireResume, 0x02) => {
                w.u8(0x04);
            }
            _ => {
                w.u8(0x00)
                    .bytes_u16(SESSION_SIGNATURE)
                    .bytes_u16(&SESSION_KEY_BYTES);
                success = true;
            }
        }
        // A success response means the session key is live from now on.
        if success {
            self.session_key = Some(KeyMaterial::new(SESSION_KEY_BYTES.to_vec()));
        }
        w.into_bytes()
    }

    /// Re-sends the elements of a `message.send` body as a group push
    /// from account 777.
    async fn push_back(&mut self, send_body: &[u8], message_seq: i32) {
        let mut r = BodyReader::new(send_body);
        // source: kind byte plus one or two i64 ids
        let source_kind = r.u8().expect("source kind");
        let group_id = r.i64().expect("chat id");
        if source_kind == 0x03 {
            r.i64().expect("peer id");
        }
        let elements = r.bytes_u32().expect("elements");

        let mut w = BodyWriter::new();
        w.u16(1);
        w.u8(0x01).i64(group_id).i64(777).i32(message_seq);
        w.bytes_u32(elements);

        let push_seq = self.next_push_seq;
        self.next_push_seq -= 1;
        self.reply(
            CryptoPhase::Session,
            push_seq,
            commands::PUSH_MESSAGE,
            &w.into_bytes(),
        )
        .await;
    }
}
