use std::path::PathBuf;

use clap::{builder::NonEmptyStringValueParser, Parser, ValueEnum};
use log::debug;

/// File to load environment variables from before reading the configuration, if it exists.
const ENV_FILE: &str = ".env.local";

/// Serves Spanish verb conjugations to chat clients.
#[derive(Parser, Debug)]
#[command(name = "conjugador")]
pub struct Config {
    /// Discord bot token
    #[arg(
        long,
        env = "BOT_TOKEN",
        hide_env_values = true,
        value_parser = NonEmptyStringValueParser::new()
    )]
    pub bot_token: String,

    /// Discord guild that commands are registered in
    #[arg(long, env = "GUILD_ID", value_parser = NonEmptyStringValueParser::new())]
    pub guild_id: String,

    /// Where commands are received from
    #[arg(long, env = "BOT_HOST", value_enum, default_value_t = HostKind::Discord)]
    pub host: HostKind,

    /// Path to the SQLite database of conjugations
    #[arg(long, env = "DATABASE_PATH", default_value = "verbs.db")]
    pub database: PathBuf,

    /// Address to accept development client connections on, when using the TCP host
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen: String,
}

/// The platforms commands can be received from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HostKind {
    /// Slash commands in a Discord guild.
    Discord,
    /// Lines from local clients over TCP, for development. Clients authenticate with the bot token.
    Tcp,
}

/// What a host needs to identify itself and its clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub bot_token: String,
    pub guild_id: String,
}

impl Config {
    /// Loads the configuration from the command line and the environment.
    pub fn load() -> Config {
        match dotenvy::from_filename(ENV_FILE) {
            Ok(path) => debug!("Loaded environment from {}", path.display()),
            Err(e) => debug!("Not loading environment from {ENV_FILE}: {e}"),
        }

        Config::parse()
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            bot_token: self.bot_token.clone(),
            guild_id: self.guild_id.clone(),
        }
    }
}
