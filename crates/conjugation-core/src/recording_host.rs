use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
};

use log::debug;

use crate::{
    CommandSpec, EventHandler, Host, HostError, Interaction, InteractionRef, ReplyPayload,
    Responder,
};

/// A host that keeps everything in memory, for driving handlers without a network connection.
#[derive(Default)]
pub struct RecordingHost {
    open: bool,
    handlers: Vec<EventHandler>,
    commands: Vec<CommandSpec>,
    replies: Mutex<Vec<(InteractionRef, ReplyPayload)>>,
    fail_replies: AtomicBool,
}

impl RecordingHost {
    pub fn new() -> RecordingHost {
        Self::default()
    }

    /// Makes all future replies fail, or succeed again.
    pub fn set_fail_replies(&self, fail: bool) {
        self.fail_replies.store(fail, Ordering::SeqCst);
    }

    /// Delivers an interaction to every registered handler, in the order they were added.
    pub fn dispatch(&self, interaction: Interaction) -> Result<(), HostError> {
        if !self.open {
            return Err(HostError::NotOpen);
        }

        debug!("Dispatching interaction {}", interaction.reference);
        for handler in &self.handlers {
            handler(self, interaction.clone());
        }

        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// The commands created so far.
    pub fn commands(&self) -> &[CommandSpec] {
        &self.commands
    }

    /// The replies successfully sent so far.
    pub fn replies(&self) -> Vec<(InteractionRef, ReplyPayload)> {
        self.replies
            .lock()
            .map(|replies| replies.clone())
            .unwrap_or_default()
    }
}

impl Responder for RecordingHost {
    fn respond(&self, interaction: &InteractionRef, reply: &ReplyPayload) -> Result<(), HostError> {
        if self.fail_replies.load(Ordering::SeqCst) {
            return Err(HostError::NoRecipient(*interaction));
        }

        self.replies
            .lock()
            .map_err(|_| HostError::Other("reply log lock poisoned".to_string()))?
            .push((*interaction, reply.clone()));

        Ok(())
    }
}

impl Host for RecordingHost {
    fn open(&mut self) -> Result<(), HostError> {
        if self.open {
            return Err(HostError::AlreadyOpen);
        }
        self.open = true;

        Ok(())
    }

    fn close(&mut self) -> Result<(), HostError> {
        if !self.open {
            return Err(HostError::NotOpen);
        }
        self.open = false;

        Ok(())
    }

    fn add_handler(&mut self, handler: EventHandler) {
        self.handlers.push(handler);
    }

    fn create_command(&mut self, command: &CommandSpec) -> Result<(), HostError> {
        if self.commands.iter().any(|c| c.name == command.name) {
            return Err(HostError::CommandCreate {
                name: command.name.clone(),
                reason: "already exists".to_string(),
            });
        }
        self.commands.push(command.clone());

        Ok(())
    }
}
