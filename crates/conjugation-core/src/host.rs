use thiserror::Error;

use crate::{CommandSpec, Interaction, InteractionRef, ReplyPayload};

/// An error from a host.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("host is not open")]
    NotOpen,
    #[error("host is already open")]
    AlreadyOpen,
    /// Nothing is waiting for a reply to the interaction, e.g. because its connection went away.
    #[error("no one is waiting for a reply to interaction {0}")]
    NoRecipient(InteractionRef),
    #[error("error creating command {name}: {reason}")]
    CommandCreate { name: String, reason: String },
    #[error("host I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
}

/// Something that can deliver replies to interactions.
pub trait Responder: Send + Sync {
    /// Sends the provided reply to whoever sent the referenced interaction.
    fn respond(&self, interaction: &InteractionRef, reply: &ReplyPayload) -> Result<(), HostError>;
}

/// Called once for each interaction a host receives.
pub type EventHandler = Box<dyn Fn(&dyn Responder, Interaction) + Send + Sync>;

/// A platform that delivers interactions and accepts replies to them.
pub trait Host: Responder {
    /// Starts receiving interactions.
    fn open(&mut self) -> Result<(), HostError>;

    /// Stops receiving interactions.
    fn close(&mut self) -> Result<(), HostError>;

    /// Registers a handler to be called for every received interaction.
    fn add_handler(&mut self, handler: EventHandler);

    /// Registers a command users can invoke.
    fn create_command(&mut self, command: &CommandSpec) -> Result<(), HostError>;
}
