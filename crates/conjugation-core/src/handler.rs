use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::{
    format_error, format_success, option_extractor::extract, Command, CommandOption,
    ConjugateError, EventHandler, Interaction, InteractionRef, LookupError, ReplyPayload,
    Responder, TenseCatalog, VerbGateway,
};

/// Handles interactions by looking up conjugations and replying with them.
pub struct InteractionHandler {
    catalog: TenseCatalog,
    gateway: VerbGateway,
}

impl InteractionHandler {
    pub fn new(catalog: TenseCatalog, gateway: VerbGateway) -> InteractionHandler {
        InteractionHandler { catalog, gateway }
    }

    /// The catalog of tenses this handler understands.
    pub fn catalog(&self) -> &TenseCatalog {
        &self.catalog
    }

    /// Wraps this handler up so it can be registered with a host.
    pub fn into_event_handler(self: Arc<Self>) -> EventHandler {
        Box::new(move |responder, interaction| {
            // failures have already been reported and logged by this point
            let _ = self.handle(responder, interaction);
        })
    }

    /// Handles a single interaction, replying to it via the provided responder.
    ///
    /// Exactly one reply is attempted per handled interaction. Returns the error that ended handling, if there was one.
    /// Interactions for unknown commands are ignored.
    pub fn handle(
        &self,
        responder: &dyn Responder,
        interaction: Interaction,
    ) -> Result<(), ConjugateError> {
        let reference = interaction.reference;
        debug!("Handling interaction {reference}: {interaction:?}");

        let Some(command) = Command::from_name(&interaction.command) else {
            warn!(
                "No handler found for command {:?} in interaction {reference}",
                interaction.command
            );
            return Ok(());
        };

        let result = match command {
            Command::Conjugate => self.conjugate(&interaction.options),
        };

        match result {
            Ok(reply) => {
                send_reply(responder, &reference, &reply)?;
                info!("Replied to interaction {reference}");
                Ok(())
            }
            Err(e) => {
                log_failure(&reference, &e);
                if let Some(kind) = e.kind() {
                    // report the pipeline failure rather than the send failure
                    let _ = send_reply(responder, &reference, &format_error(kind));
                }
                Err(e)
            }
        }
    }

    /// Builds the reply for a `conjugate` command with the provided options.
    fn conjugate(&self, options: &[CommandOption]) -> Result<ReplyPayload, ConjugateError> {
        let options = extract(options)?;
        debug!("Extracted options: {options:?}");

        let tense_mood = self.catalog.resolve(&options.tense_name)?;
        debug!("Resolved {:?} to {tense_mood:?}", options.tense_name);

        let verb = self
            .gateway
            .lookup(&options.infinitive, &tense_mood.mood, &tense_mood.tense)?;
        debug!("Found verb: {verb:?}");

        Ok(format_success(&options.infinitive, &verb))
    }
}

/// Sends a reply, logging if it can't be sent.
fn send_reply(
    responder: &dyn Responder,
    reference: &InteractionRef,
    reply: &ReplyPayload,
) -> Result<(), ConjugateError> {
    responder.respond(reference, reply).map_err(|e| {
        error!("Error sending reply to interaction {reference}: {e}");
        ConjugateError::Send(e)
    })
}

fn log_failure(reference: &InteractionRef, error: &ConjugateError) {
    match error {
        ConjugateError::MissingOption(e) => {
            info!("Missing required options in interaction {reference}: {e}")
        }
        ConjugateError::UnknownTense(e) => warn!("Error getting tense data for {reference}: {e}"),
        ConjugateError::Lookup(e @ LookupError::NotFound { .. }) => {
            info!("Verb not found for {reference}: {e}")
        }
        ConjugateError::Lookup(e) => error!("Error fetching verb for {reference}: {e}"),
        ConjugateError::Send(e) => error!("Error sending reply to {reference}: {e}"),
    }
}
