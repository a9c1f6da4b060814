use tokio::sync::broadcast::error::SendError;
use tokio::sync::{broadcast, mpsc};

use crate::agent_engine::state::{LoopCommand, LoopEvent};

/// Loop events fan out to any number of subscribers; commands flow back in.
pub struct EventBus {
    tx: broadcast::Sender<LoopEvent>,
    command_tx: mpsc::Sender<LoopCommand>,
    command_rx: mpsc::Receiver<LoopCommand>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(100);
        let (command_tx, command_rx) = mpsc::channel(16);

        Self {
            tx,
            command_tx,
            command_rx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LoopEvent> {
        self.tx.subscribe()
    }

    /// Fails only when nobody is subscribed.
    pub fn send(&self, event: LoopEvent) -> Result<(), SendError<LoopEvent>> {
        self.tx.send(event).map(|_| ())
    }

    pub fn command_sender(&self) -> mpsc::Sender<LoopCommand> {
        self.command_tx.clone()
    }

    /// Non-blocking poll for a pending command.
    pub fn try_recv_command(&mut self) -> Option<LoopCommand> {
        self.command_rx.try_recv().ok()
    }
}
