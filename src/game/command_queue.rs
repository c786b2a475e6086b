//! Lock-free command queue between controller connections and the tick loop
//!
//! Uses crossbeam-channel for lock-free MPSC submission. Each command carries
//! a oneshot reply sender; the loop drains the queue before every tick and
//! answers each command once it has been applied.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tokio::sync::oneshot;

use crate::game::commands::{Command, CommandOutput};
use crate::game::constants::net::COMMAND_QUEUE_CAPACITY;
use crate::game::lifecycle::SwarmError;

/// Result delivered back to the submitter
pub type CommandResult = Result<CommandOutput, SwarmError>;

/// A command waiting for the next tick
#[derive(Debug)]
pub struct PendingCommand {
    pub command: Command,
    reply: oneshot::Sender<CommandResult>,
}

impl PendingCommand {
    /// Send the result back. A submitter that stopped waiting is ignored.
    pub fn respond(self, result: CommandResult) {
        let _ = self.reply.send(result);
    }
}

/// Bounded command queue
///
/// Connection handlers submit through cloned `CommandSender`s; the loop
/// owns the queue and drains it once per tick.
pub struct CommandQueue {
    sender: Sender<PendingCommand>,
    receiver: Receiver<PendingCommand>,
    capacity: usize,
}

impl CommandQueue {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Create a new sender handle for a connection
    pub fn sender(&self) -> CommandSender {
        CommandSender {
            sender: self.sender.clone(),
        }
    }

    /// Drain all pending commands in submission order
    pub fn drain(&self) -> Vec<PendingCommand> {
        self.receiver.try_iter().collect()
    }

    #[inline]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new(COMMAND_QUEUE_CAPACITY)
    }
}

/// Clonable sender handle for connection handlers
#[derive(Clone)]
pub struct CommandSender {
    sender: Sender<PendingCommand>,
}

impl CommandSender {
    /// Queue a command without blocking and return the reply receiver
    pub fn submit(
        &self,
        command: Command,
    ) -> Result<oneshot::Receiver<CommandResult>, CommandQueueError> {
        let (reply, receiver) = oneshot::channel();
        self.sender
            .try_send(PendingCommand { command, reply })
            .map_err(|e| match e {
                TrySendError::Full(_) => CommandQueueError::Full,
                TrySendError::Disconnected(_) => CommandQueueError::Disconnected,
            })?;
        Ok(receiver)
    }

    /// Queue a command and wait until the loop has applied it
    pub async fn execute(&self, command: Command) -> Result<CommandResult, CommandQueueError> {
        let receiver = self.submit(command)?;
        receiver.await.map_err(|_| CommandQueueError::Disconnected)
    }
}

/// Command queue errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CommandQueueError {
    /// Queue is full (backpressure)
    #[error("Command queue is full")]
    Full,
    /// Simulation loop stopped
    #[error("Simulation loop is not running")]
    Disconnected,
}
