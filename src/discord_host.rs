use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError, RwLock},
};

use conjugation_core::{
    CommandOption, CommandOptionSpec, CommandSpec, Embed, EventHandler, Host, HostError,
    Interaction, InteractionRef, OptionValue, ReplyPayload, Responder,
};
use log::{debug, error, info, warn};
use serenity::{
    all::{
        CommandDataOptionValue, CommandInteraction, CommandOptionType, Context, CreateCommand,
        CreateCommandOption, CreateEmbed, CreateInteractionResponse,
        CreateInteractionResponseMessage, EventHandler as ClientEventHandler, GatewayIntents,
        GuildId, Interaction as ClientInteraction, Ready,
    },
    async_trait,
    http::Http,
    Client,
};
use tokio::{runtime::Handle, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::config::Credentials;

/// A host that receives slash commands from a Discord guild.
///
/// Commands are registered with the guild each time the gateway reports the bot as ready.
pub struct DiscordHost {
    shared: Arc<Shared>,
    running: Option<Running>,
}

/// State of an open host.
struct Running {
    client_task: JoinHandle<()>,
    shutdown: CancellationToken,
}

/// State shared between the host and the Discord client.
struct Shared {
    bot_token: String,
    guild_id: GuildId,
    http: Arc<Http>,
    handlers: RwLock<Vec<EventHandler>>,
    commands: RwLock<Vec<CommandSpec>>,
    /// Interactions that haven't been replied to yet.
    pending: Mutex<HashMap<InteractionRef, CommandInteraction>>,
}

impl DiscordHost {
    pub fn new(credentials: Credentials) -> Result<DiscordHost, HostError> {
        let guild_id = parse_guild_id(&credentials.guild_id)?;

        Ok(DiscordHost {
            shared: Arc::new(Shared {
                http: Arc::new(Http::new(&credentials.bot_token)),
                bot_token: credentials.bot_token,
                guild_id,
                handlers: RwLock::new(Vec::new()),
                commands: RwLock::new(Vec::new()),
                pending: Mutex::new(HashMap::new()),
            }),
            running: None,
        })
    }
}

fn parse_guild_id(guild_id: &str) -> Result<GuildId, HostError> {
    match guild_id.parse::<u64>() {
        Ok(id) if id != 0 => Ok(GuildId::new(id)),
        _ => Err(HostError::Other(format!("invalid guild ID: {guild_id:?}"))),
    }
}

impl Responder for DiscordHost {
    fn respond(&self, interaction: &InteractionRef, reply: &ReplyPayload) -> Result<(), HostError> {
        self.shared.respond(interaction, reply)
    }
}

impl Host for DiscordHost {
    /// Connects to Discord. Must be called from within a tokio runtime.
    fn open(&mut self) -> Result<(), HostError> {
        if self.running.is_some() {
            return Err(HostError::AlreadyOpen);
        }

        let runtime = Handle::try_current().map_err(|e| {
            HostError::Other(format!("no runtime to run the Discord client on: {e}"))
        })?;
        let shutdown = CancellationToken::new();
        let client_task = runtime.spawn(run_client(Arc::clone(&self.shared), shutdown.clone()));

        self.running = Some(Running {
            client_task,
            shutdown,
        });

        Ok(())
    }

    /// Disconnects from Discord. Interactions still being handled can't be replied to afterwards.
    fn close(&mut self) -> Result<(), HostError> {
        let running = self.running.take().ok_or(HostError::NotOpen)?;
        running.shutdown.cancel();
        if running.client_task.is_finished() {
            debug!("Discord client had already stopped");
        }
        self.shared
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();

        Ok(())
    }

    fn add_handler(&mut self, handler: EventHandler) {
        self.shared
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
    }

    fn create_command(&mut self, command: &CommandSpec) -> Result<(), HostError> {
        let mut commands = self
            .shared
            .commands
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if commands.iter().any(|c| c.name == command.name) {
            return Err(HostError::CommandCreate {
                name: command.name.clone(),
                reason: "already exists".to_string(),
            });
        }
        commands.push(command.clone());

        Ok(())
    }
}

impl Responder for Shared {
    /// Sends the reply over HTTP. Blocks, so must not be called from async code.
    fn respond(&self, interaction: &InteractionRef, reply: &ReplyPayload) -> Result<(), HostError> {
        let command = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(interaction)
            .ok_or(HostError::NoRecipient(*interaction))?;

        let runtime = Handle::try_current()
            .map_err(|e| HostError::Other(format!("no runtime to send replies on: {e}")))?;
        runtime
            .block_on(command.create_response(&self.http, interaction_response(reply)))
            .map_err(|e| {
                HostError::Other(format!(
                    "error responding to interaction {interaction}: {e}"
                ))
            })
    }
}

impl Shared {
    /// Turns a slash command into an interaction, and marks it as waiting for a reply.
    fn accept(&self, command: CommandInteraction) -> Interaction {
        let reference = InteractionRef {
            id: command.id.get(),
            connection: command.channel_id.get(),
        };
        let options = command
            .data
            .options
            .iter()
            .filter_map(|option| {
                let value = option_value(&option.value);
                if value.is_none() {
                    debug!("Ignoring option {:?} of unsupported type", option.name);
                }
                Some(CommandOption {
                    name: option.name.clone(),
                    value: value?,
                })
            })
            .collect();
        let interaction = Interaction {
            reference,
            command: command.data.name.clone(),
            options,
        };

        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(reference, command);

        interaction
    }

    /// Calls every handler with the provided interaction.
    fn dispatch(&self, interaction: Interaction) {
        let reference = interaction.reference;
        {
            let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
            if handlers.is_empty() {
                warn!("No handlers registered for interaction {reference}");
            }
            for handler in handlers.iter() {
                handler(self, interaction.clone());
            }
        }

        if self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&reference)
            .is_some()
        {
            debug!("Interaction {reference} was not replied to");
        }
    }

    fn command_builders(&self) -> Vec<CreateCommand> {
        self.commands
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(command_builder)
            .collect()
    }
}

/// Receives events from the Discord gateway.
struct Gateway {
    shared: Arc<Shared>,
}

#[async_trait]
impl ClientEventHandler for Gateway {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("Connected to Discord as {}", ready.user.name);

        let guild_id = self.shared.guild_id;
        match guild_id
            .set_commands(&ctx, self.shared.command_builders())
            .await
        {
            Ok(commands) => {
                for command in commands {
                    info!("Registered command {:?} in guild {guild_id}", command.name);
                }
            }
            Err(e) => error!("Failed to register commands in guild {guild_id}: {e}"),
        }
    }

    async fn interaction_create(&self, _ctx: Context, interaction: ClientInteraction) {
        let ClientInteraction::Command(command) = interaction else {
            return;
        };
        if command.guild_id != Some(self.shared.guild_id) {
            warn!(
                "Ignoring command {:?} from outside guild {}",
                command.data.name, self.shared.guild_id
            );
            return;
        }

        let interaction = self.shared.accept(command);
        debug!("Received interaction {}", interaction.reference);
        let shared = Arc::clone(&self.shared);
        // handlers block on the verb store and on sending replies
        let dispatched = tokio::task::spawn_blocking(move || shared.dispatch(interaction));
        if let Err(e) = dispatched.await {
            warn!("Handler failed: {e}");
        }
    }
}

async fn run_client(shared: Arc<Shared>, shutdown: CancellationToken) {
    let token = shared.bot_token.clone();
    let mut client = match Client::builder(&token, GatewayIntents::GUILDS)
        .event_handler(Gateway { shared })
        .await
    {
        Ok(client) => client,
        Err(e) => {
            error!("Error initializing Discord client: {e}");
            return;
        }
    };

    let shard_manager = Arc::clone(&client.shard_manager);
    tokio::select! {
        _ = shutdown.cancelled() => {
            shard_manager.shutdown_all().await;
            info!("Disconnected from Discord");
        }
        result = client.start() => {
            if let Err(e) = result {
                error!("Error connecting to Discord: {e}");
            }
        }
    }
}

fn command_builder(spec: &CommandSpec) -> CreateCommand {
    spec.options.iter().fold(
        CreateCommand::new(&spec.name).description(&spec.description),
        |command, option| command.add_option(option_builder(option)),
    )
}

fn option_builder(spec: &CommandOptionSpec) -> CreateCommandOption {
    spec.choices.iter().fold(
        CreateCommandOption::new(CommandOptionType::String, &spec.name, &spec.description)
            .required(spec.required),
        |option, choice| option.add_string_choice(choice, choice),
    )
}

fn option_value(value: &CommandDataOptionValue) -> Option<OptionValue> {
    match value {
        CommandDataOptionValue::String(s) => Some(OptionValue::String(s.clone())),
        CommandDataOptionValue::Integer(i) => Some(OptionValue::Integer(*i)),
        CommandDataOptionValue::Number(n) => Some(OptionValue::Number(*n)),
        CommandDataOptionValue::Boolean(b) => Some(OptionValue::Boolean(*b)),
        _ => None,
    }
}

fn interaction_response(reply: &ReplyPayload) -> CreateInteractionResponse {
    let message = match reply {
        ReplyPayload::Embed(embed) => {
            CreateInteractionResponseMessage::new().embed(embed_builder(embed))
        }
        ReplyPayload::Content(content) => {
            CreateInteractionResponseMessage::new().content(content)
        }
    };

    CreateInteractionResponse::Message(message)
}

fn embed_builder(embed: &Embed) -> CreateEmbed {
    CreateEmbed::new()
        .title(&embed.title)
        .colour(embed.color)
        .fields(
            embed
                .fields
                .iter()
                .map(|field| (field.name.clone(), field.value.clone(), field.inline)),
        )
}

#[cfg(test)]
mod tests {
    use conjugation_core::{format_error, Command, ErrorKind, TenseCatalog, EMBED_COLOR};
    use serde_json::json;

    use super::*;

    fn credentials(guild_id: &str) -> Credentials {
        Credentials {
            bot_token: "secret-token".to_string(),
            guild_id: guild_id.to_string(),
        }
    }

    #[test]
    fn guild_id_must_be_a_snowflake() {
        assert!(DiscordHost::new(credentials("1234567890")).is_ok());
        assert!(matches!(
            DiscordHost::new(credentials("0")),
            Err(HostError::Other(_))
        ));
        assert!(matches!(
            DiscordHost::new(credentials("my-guild")),
            Err(HostError::Other(_))
        ));
    }

    #[test]
    fn lifecycle_errors() {
        let mut host = DiscordHost::new(credentials("42")).unwrap();

        assert!(matches!(host.close(), Err(HostError::NotOpen)));
        assert!(matches!(host.open(), Err(HostError::Other(_))));
    }

    #[test]
    fn duplicate_commands_are_rejected() {
        let mut host = DiscordHost::new(credentials("42")).unwrap();
        let spec = Command::Conjugate.spec(&TenseCatalog::new());

        host.create_command(&spec).unwrap();

        assert!(matches!(
            host.create_command(&spec),
            Err(HostError::CommandCreate { .. })
        ));
        assert_eq!(1, host.shared.command_builders().len());
    }

    #[test]
    fn reply_without_pending_interaction() {
        let host = DiscordHost::new(credentials("42")).unwrap();

        let result = host.respond(
            &InteractionRef {
                id: 1,
                connection: 2,
            },
            &ReplyPayload::Content("hi".to_string()),
        );

        assert!(matches!(result, Err(HostError::NoRecipient(_))));
    }

    #[test]
    fn command_registration() {
        let catalog = TenseCatalog::new();

        let value =
            serde_json::to_value(command_builder(&Command::Conjugate.spec(&catalog))).unwrap();

        assert_eq!("conjugate", value["name"]);
        assert_eq!("infinitive", value["options"][0]["name"]);
        assert_eq!(true, value["options"][0]["required"]);
        assert_eq!("tense", value["options"][1]["name"]);
        let choices = value["options"][1]["choices"].as_array().unwrap();
        assert_eq!(catalog.choice_names().len(), choices.len());
        assert_eq!(json!("Present"), choices[0]["value"]);
    }

    #[test]
    fn option_values() {
        assert_eq!(
            Some(OptionValue::String("ser".to_string())),
            option_value(&CommandDataOptionValue::String("ser".to_string()))
        );
        assert_eq!(
            Some(OptionValue::Integer(4)),
            option_value(&CommandDataOptionValue::Integer(4))
        );
        assert_eq!(
            Some(OptionValue::Boolean(true)),
            option_value(&CommandDataOptionValue::Boolean(true))
        );
    }

    #[test]
    fn embed_response() {
        let embed = Embed {
            title: "ser - to be".to_string(),
            color: EMBED_COLOR,
            fields: vec![conjugation_core::EmbedField {
                name: "yo".to_string(),
                value: "soy".to_string(),
                inline: true,
            }],
        };

        let value =
            serde_json::to_value(interaction_response(&ReplyPayload::Embed(embed))).unwrap();

        let embed = &value["data"]["embeds"][0];
        assert_eq!("ser - to be", embed["title"]);
        assert_eq!(EMBED_COLOR, embed["color"]);
        assert_eq!(
            json!({ "name": "yo", "value": "soy", "inline": true }),
            embed["fields"][0]
        );
    }

    #[test]
    fn content_response() {
        let value =
            serde_json::to_value(interaction_response(&format_error(ErrorKind::NotFound))).unwrap();

        assert_eq!("Verb not found.", value["data"]["content"]);
    }
}
