use std::sync::Arc;

use anyhow::{Context, Result};
use conjugation_core::{
    Command, Host, InteractionHandler, SqliteVerbStore, TenseCatalog, VerbGateway,
};
use log::{info, warn};
use tokio::signal::unix::{signal, SignalKind};

mod config;
use config::{Config, HostKind};

mod discord_host;
use discord_host::DiscordHost;

mod reply_to_string;

mod tcp_host;
use tcp_host::TcpHost;

mod wire;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = Config::load();

    let store = Arc::new(SqliteVerbStore::open(&config.database).with_context(|| {
        format!(
            "failed to initialize database at {}",
            config.database.display()
        )
    })?);

    let catalog = TenseCatalog::new();
    let commands = [Command::Conjugate.spec(&catalog)];
    let handler = Arc::new(InteractionHandler::new(
        catalog,
        VerbGateway::new(store.clone()),
    ));

    let mut host: Box<dyn Host> = match config.host {
        HostKind::Discord => {
            Box::new(DiscordHost::new(config.credentials()).context("error initializing bot")?)
        }
        HostKind::Tcp => Box::new(TcpHost::new(config.listen.clone(), config.credentials())),
    };
    for command in &commands {
        host.create_command(command)
            .with_context(|| format!("failed to register command {:?}", command.name))?;
    }
    host.add_handler(handler.into_event_handler());
    host.open().context("error opening connection")?;

    info!("Bot is now running. Press CTRL-C to exit.");
    let received = wait_for_shutdown().await?;
    info!("Received shutdown signal: {received}");

    if let Err(e) = host.close() {
        warn!("Error closing host: {e}");
    }
    if let Err(e) = store.close() {
        warn!("Error closing database: {e}");
    }

    Ok(())
}

/// Waits for the process to be interrupted or terminated, and returns the name of the signal that was received.
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut terminate =
        signal(SignalKind::terminate()).context("error listening for termination signal")?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("error listening for interrupt signal")?;
            Ok("SIGINT")
        }
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}
