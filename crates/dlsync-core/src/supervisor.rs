//! Push channel lifecycle: connect, pump frames, reconnect after a delay.
//!
//! `Disconnected -> Connecting -> Open -> Disconnected -> ...` with no
//! terminal state; the loop only ends when the engine goes away. Clean and
//! unclean closes are treated alike. Frames are decoded here so a malformed
//! one is dropped without disturbing the channel.

use tokio::sync::{mpsc, watch};

use crate::engine::EngineInput;
use crate::protocol;
use crate::reconnect::ReconnectPolicy;
use crate::transport::Connector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Open,
}

impl ChannelState {
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelState::Disconnected => "disconnected",
            ChannelState::Connecting => "connecting",
            ChannelState::Open => "open",
        }
    }
}

pub struct Supervisor<C> {
    connector: C,
    engine: mpsc::UnboundedSender<EngineInput>,
    state: watch::Sender<ChannelState>,
    policy: ReconnectPolicy,
}

impl<C: Connector> Supervisor<C> {
    pub fn new(
        connector: C,
        engine: mpsc::UnboundedSender<EngineInput>,
        policy: ReconnectPolicy,
    ) -> (Self, watch::Receiver<ChannelState>) {
        let (state, state_rx) = watch::channel(ChannelState::Disconnected);
        let supervisor = Self {
            connector,
            engine,
            state,
            policy,
        };
        (supervisor, state_rx)
    }

    /// Run until the engine's inbox closes.
    pub async fn run(self) {
        let mut generation = 0u64;
        let mut failures = 0u32;
        loop {
            if !self.publish(EngineInput::ChannelState(ChannelState::Connecting)) {
                return;
            }
            match self.connector.connect().await {
                Ok(conn) => {
                    generation += 1;
                    failures = 0;
                    tracing::info!(generation, "push channel open");
                    self.state.send_replace(ChannelState::Open);
                    let opened = EngineInput::ChannelOpened {
                        generation,
                        outbound: conn.outbound,
                    };
                    if self.engine.send(opened).is_err() {
                        return;
                    }
                    if !self.pump(generation, conn.inbound).await {
                        return;
                    }
                    self.state.send_replace(ChannelState::Disconnected);
                    if self
                        .engine
                        .send(EngineInput::ChannelClosed { generation })
                        .is_err()
                    {
                        return;
                    }
                }
                Err(e) => {
                    tracing::warn!("push channel connect failed: {}", e);
                    if !self.publish(EngineInput::ChannelState(ChannelState::Disconnected)) {
                        return;
                    }
                }
            }

            failures = failures.saturating_add(1);
            let delay = self.policy.delay_for(failures);
            tracing::info!(delay_ms = delay.as_millis() as u64, "reconnecting push channel");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.engine.closed() => return,
            }
        }
    }

    /// Forward decoded frames until the channel closes. Returns false when the
    /// engine is gone.
    async fn pump(&self, generation: u64, mut inbound: mpsc::UnboundedReceiver<String>) -> bool {
        loop {
            let text = tokio::select! {
                frame = inbound.recv() => match frame {
                    Some(text) => text,
                    None => {
                        tracing::info!(generation, "push channel closed");
                        return true;
                    }
                },
                _ = self.engine.closed() => return false,
            };
            match protocol::decode_event(&text) {
                Ok(event) => {
                    if self
                        .engine
                        .send(EngineInput::Event { generation, event })
                        .is_err()
                    {
                        return false;
                    }
                }
                Err(e) => tracing::warn!(generation, "dropping push frame: {}", e),
            }
        }
    }

    /// Mirror a state change to the watch channel and the engine.
    fn publish(&self, input: EngineInput) -> bool {
        if let EngineInput::ChannelState(state) = &input {
            self.state.send_replace(*state);
        }
        self.engine.send(input).is_ok()
    }
}
