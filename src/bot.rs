//! The application-facing facade.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use crate::auth::{AccountSecretsManager, ChallengeSolver, MemorySecretsManager, UnattendedSolver};
use crate::codec::{commands, write_source, BodyWriter, CommandRegistry, PacketBody};
use crate::config::ImpConfig;
use crate::error::{ImpError, Result};
use crate::event::Event;
use crate::message::{encode_elements, Message, MessageContext, MessagePipeline, MessageSource};
use crate::network::{NetworkHandler, NetworkState};
use crate::sso::SsoProcessor;

/// Server acknowledgement of a sent message.
#[derive(Debug, Clone, Copy)]
pub struct MessageReceipt {
    /// Sequence the server assigned to the stored message.
    pub message_seq: i32,
}

/// One logged-in account.
///
/// Owns a [`NetworkHandler`] and wires the content pipeline over it.
/// Construction is cheap and offline; [`resume_connection`] does the
/// network work and can be called again whenever the connection drops.
///
/// [`resume_connection`]: Bot::resume_connection
pub struct Bot {
    handler: NetworkHandler,
}

impl Bot {
    /// A bot with default components: in-memory secret storage, an
    /// unattended challenge solver, and the standard pipeline and
    /// command registry.
    pub fn new(account_id: i64, password: &str, config: ImpConfig) -> Self {
        Self::builder(account_id, password).build(config)
    }

    /// Starts component-by-component construction.
    pub fn builder(account_id: i64, password: &str) -> BotBuilder {
        BotBuilder {
            account_id,
            password: password.to_owned(),
            manager: None,
            solver: None,
            pipeline: None,
            registry: None,
        }
    }

    /// Connects and authenticates. See
    /// [`NetworkHandler::resume_connection`] for the return contract.
    pub async fn resume_connection(&self) -> Result<bool> {
        self.handler.resume_connection().await
    }

    /// Logs out (best effort) and shuts the engine down for good.
    pub async fn close(&self) {
        self.handler.close().await;
    }

    pub fn state(&self) -> NetworkState {
        self.handler.state()
    }

    pub fn account_id(&self) -> i64 {
        self.handler.account_id()
    }

    /// Subscribes to engine events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.handler.subscribe()
    }

    /// The underlying engine, for raw command traffic beyond the chat
    /// surface.
    pub fn handler(&self) -> &NetworkHandler {
        &self.handler
    }

    /// Encodes `message` through the pipeline and sends it to `target`,
    /// waiting for the server's acknowledgement.
    pub async fn send_message(
        &self,
        target: MessageSource,
        message: &Message,
    ) -> Result<MessageReceipt> {
        let context = MessageContext {
            source: target,
            sender: self.account_id(),
            receiver: self.account_id(),
        };
        let elements = self.handler.pipeline().encode(message, &context);
        let element_bytes = encode_elements(&elements);

        let mut w = BodyWriter::new();
        write_source(&target, &mut w);
        w.bytes_u32(&element_bytes);

        let packet = self
            .handler
            .send_and_expect(commands::SEND_MESSAGE, w.into_bytes())
            .await?;
        match packet.body {
            PacketBody::MessageAck(ack) if ack.status == 0 => {
                debug!(message_seq = ack.message_seq, "message accepted");
                Ok(MessageReceipt {
                    message_seq: ack.message_seq,
                })
            }
            PacketBody::MessageAck(ack) => Err(ImpError::Server {
                command: commands::SEND_MESSAGE.to_owned(),
                status: ack.status,
            }),
            other => Err(ImpError::Codec(crate::codec::CodecError::BadBody {
                command: commands::SEND_MESSAGE.to_owned(),
                reason: format!("unexpected body {other:?}"),
            })),
        }
    }
}

/// Assembles a [`Bot`] from replaceable components.
pub struct BotBuilder {
    account_id: i64,
    password: String,
    manager: Option<Arc<dyn AccountSecretsManager>>,
    solver: Option<Arc<dyn ChallengeSolver>>,
    pipeline: Option<MessagePipeline>,
    registry: Option<CommandRegistry>,
}

impl BotBuilder {
    /// Persistent storage for account secrets. Defaults to
    /// [`MemorySecretsManager`].
    pub fn secrets_manager(mut self, manager: Arc<dyn AccountSecretsManager>) -> Self {
        self.manager = Some(manager);
        self
    }

    /// Interactive challenge resolution. Defaults to
    /// [`UnattendedSolver`], which fails every challenge fatally.
    pub fn challenge_solver(mut self, solver: Arc<dyn ChallengeSolver>) -> Self {
        self.solver = Some(solver);
        self
    }

    /// Content pipeline, for registering custom element processors.
    pub fn pipeline(mut self, pipeline: MessagePipeline) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    /// Command registry, for registering custom body parsers.
    pub fn registry(mut self, registry: CommandRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self, config: ImpConfig) -> Bot {
        let manager = self
            .manager
            .unwrap_or_else(|| Arc::new(MemorySecretsManager::new()));
        let solver = self.solver.unwrap_or_else(|| Arc::new(UnattendedSolver));
        let sso = SsoProcessor::new(self.account_id, &self.password, manager, solver);
        let handler = NetworkHandler::new(
            config,
            sso,
            self.registry.unwrap_or_default(),
            self.pipeline.unwrap_or_else(MessagePipeline::standard),
        );
        Bot { handler }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_is_offline() {
        let bot = Bot::new(42, "pw", ImpConfig::default());
        assert_eq!(bot.account_id(), 42);
        assert_eq!(bot.state(), NetworkState::Initialized);
    }

    #[tokio::test]
    async fn send_requires_connection() {
        let bot = Bot::new(42, "pw", ImpConfig::default());
        let err = bot
            .send_message(
                MessageSource::Direct { peer: 7 },
                &Message::new().text("hello"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ImpError::NotConnected));
    }
}
