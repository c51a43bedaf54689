use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError, RwLock,
    },
};

use conjugation_core::{
    parse_text_command, CommandSpec, EventHandler, Host, HostError, Interaction, InteractionRef,
    ReplyPayload, Responder,
};
use flume::Sender;
use futures::{SinkExt, StreamExt};
use log::{debug, info, trace, warn};
use tokio::{net::TcpListener, task::JoinHandle};
use tokio_util::{
    codec::{Decoder, LinesCodec, LinesCodecError},
    sync::CancellationToken,
};

use crate::{
    config::Credentials,
    wire::{WireFormat, WireInteraction},
};

const QUIT_COMMAND: &str = "quit";
const AUTHENTICATED_MESSAGE: &str = "ok";
const UNAUTHORIZED_MESSAGE: &str = "unauthorized";
const LINE_TOO_LONG_MESSAGE: &str = "line too long";

/// The longest line a client may send, in bytes. Comfortably more than any valid interaction needs.
const MAX_LINE_LENGTH: usize = 4096;

/// A host for local development that accepts interactions from clients connected over TCP, one interaction per line.
///
/// Clients first send the bot token on a line by itself. After that, each line is either a JSON interaction or a
/// typed-out command, and is replied to in the same format. Lines from one client are handled one at a time, so
/// replies arrive in the order the lines were sent.
pub struct TcpHost {
    listen_addr: String,
    shared: Arc<Shared>,
    running: Option<Running>,
}

/// State of an open host.
struct Running {
    local_addr: SocketAddr,
    accept_task: JoinHandle<()>,
    shutdown: CancellationToken,
}

/// State shared between the host and its connection tasks.
struct Shared {
    credentials: Credentials,
    handlers: RwLock<Vec<EventHandler>>,
    commands: RwLock<Vec<CommandSpec>>,
    connections: Mutex<HashMap<u64, ConnectionEntry>>,
    next_connection_id: AtomicU64,
    next_interaction_id: AtomicU64,
}

/// A connected client.
struct ConnectionEntry {
    sender: Sender<String>,
    /// Interactions from this client that haven't been replied to yet, by host-assigned ID.
    pending: HashMap<u64, PendingReply>,
}

/// How to reply to an interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingReply {
    format: WireFormat,
    /// The ID the client chose for the interaction. Only JSON clients choose IDs.
    client_id: Option<u64>,
}

impl TcpHost {
    pub fn new(listen_addr: String, credentials: Credentials) -> TcpHost {
        TcpHost {
            listen_addr,
            shared: Arc::new(Shared {
                credentials,
                handlers: RwLock::new(Vec::new()),
                commands: RwLock::new(Vec::new()),
                connections: Mutex::new(HashMap::new()),
                next_connection_id: AtomicU64::new(0),
                next_interaction_id: AtomicU64::new(0),
            }),
            running: None,
        }
    }

    /// The address the host is accepting connections on, if it's open.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.local_addr)
    }
}

impl Responder for TcpHost {
    fn respond(&self, interaction: &InteractionRef, reply: &ReplyPayload) -> Result<(), HostError> {
        self.shared.respond(interaction, reply)
    }
}

impl Host for TcpHost {
    /// Starts accepting connections. Must be called from within a tokio runtime.
    fn open(&mut self) -> Result<(), HostError> {
        if self.running.is_some() {
            return Err(HostError::AlreadyOpen);
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| HostError::Other(format!("no runtime to accept connections on: {e}")))?;
        let std_listener = std::net::TcpListener::bind(&self.listen_addr)?;
        std_listener.set_nonblocking(true)?;
        let listener = {
            let _guard = runtime.enter();
            TcpListener::from_std(std_listener)?
        };
        let local_addr = listener.local_addr()?;
        info!("Listening on: {local_addr}");

        let shutdown = CancellationToken::new();
        let accept_task = runtime.spawn(accept_connections(
            listener,
            Arc::clone(&self.shared),
            shutdown.clone(),
        ));

        self.running = Some(Running {
            local_addr,
            accept_task,
            shutdown,
        });

        Ok(())
    }

    /// Stops accepting connections and disconnects all clients.
    fn close(&mut self) -> Result<(), HostError> {
        let running = self.running.take().ok_or(HostError::NotOpen)?;
        running.shutdown.cancel();
        running.accept_task.abort();
        self.shared
            .connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        info!("Stopped listening on {}", running.local_addr);

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

        info!(
            "Registered command {:?} in guild {}",
            command.name, self.shared.credentials.guild_id
        );
        commands.push(command.clone());

        Ok(())
    }
}

impl Responder for Shared {
    fn respond(&self, interaction: &InteractionRef, reply: &ReplyPayload) -> Result<(), HostError> {
        let mut connections = self
            .connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let connection = connections
            .get_mut(&interaction.connection)
            .ok_or(HostError::NoRecipient(*interaction))?;
        let pending = connection
            .pending
            .remove(&interaction.id)
            .ok_or(HostError::NoRecipient(*interaction))?;

        let reply_id = pending.client_id.unwrap_or(interaction.id);
        connection
            .sender
            .send(pending.format.render_reply(reply_id, reply))
            .map_err(|_| HostError::NoRecipient(*interaction))
    }
}

impl Shared {
    fn add_connection(&self, connection_id: u64, sender: Sender<String>) {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                connection_id,
                ConnectionEntry {
                    sender,
                    pending: HashMap::new(),
                },
            );
    }

    fn remove_connection(&self, connection_id: u64) {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&connection_id);
    }

    /// Sends a line to a client that isn't a reply to any interaction.
    fn send_line(&self, connection_id: u64, line: String) {
        if let Some(connection) = self
            .connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&connection_id)
        {
            if connection.sender.send(line).is_err() {
                debug!("Connection {connection_id} is no longer receiving lines");
            }
        }
    }

    fn is_registered(&self, command: &str) -> bool {
        self.commands
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|c| c.name == command)
    }

    /// Turns a line from a client into an interaction, and marks it as waiting for a reply.
    fn accept_line(
        &self,
        connection_id: u64,
        line: &str,
        format: WireFormat,
    ) -> Result<Interaction, String> {
        let (client_id, command, options) = match format {
            WireFormat::Json => {
                let wire: WireInteraction = serde_json::from_str(line)
                    .map_err(|e| format!("malformed interaction: {e}"))?;
                if let Some(guild_id) = &wire.guild_id {
                    if *guild_id != self.credentials.guild_id {
                        return Err(format!("unknown guild: {guild_id}"));
                    }
                }
                (Some(wire.id), wire.command, wire.options)
            }
            WireFormat::Text => {
                let parsed = parse_text_command(line).map_err(|e| e.to_string())?;
                (None, parsed.command, parsed.options)
            }
        };

        if !self.is_registered(&command) {
            return Err(format!("unknown command: {command}"));
        }

        let mut connections = self
            .connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let connection = connections
            .get_mut(&connection_id)
            .ok_or_else(|| "connection closed".to_string())?;
        if let Some(client_id) = client_id {
            if connection
                .pending
                .values()
                .any(|pending| pending.client_id == Some(client_id))
            {
                return Err(format!("interaction {client_id} is already being handled"));
            }
        }
        let id = self.next_interaction_id.fetch_add(1, Ordering::Relaxed);
        connection
            .pending
            .insert(id, PendingReply { format, client_id });

        Ok(Interaction {
            reference: InteractionRef {
                id,
                connection: connection_id,
            },
            command,
            options,
        })
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

        self.forget_pending(&reference);
    }

    /// Stops waiting for a reply to the provided interaction.
    fn forget_pending(&self, interaction: &InteractionRef) {
        let mut connections = self
            .connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(connection) = connections.get_mut(&interaction.connection) {
            if connection.pending.remove(&interaction.id).is_some() {
                debug!("Interaction {interaction} was not replied to");
            }
        }
    }
}

async fn accept_connections(
    listener: TcpListener,
    shared: Arc<Shared>,
    shutdown: CancellationToken,
) {
    loop {
        let (socket, addr) = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(x) => x,
                Err(e) => {
                    warn!("Error accepting connection: {e}");
                    continue;
                }
            },
        };

        let connection_id = shared.next_connection_id.fetch_add(1, Ordering::Relaxed);
        info!("Connection {connection_id} opened from {addr}");

        let (line_sender, line_receiver) = flume::unbounded::<String>();
        shared.add_connection(connection_id, line_sender);

        let (mut sink, mut stream) = LinesCodec::new_with_max_length(MAX_LINE_LENGTH)
            .framed(socket)
            .split::<String>();

        // spawn task for sending lines to the client
        tokio::spawn(async move {
            while let Ok(line) = line_receiver.recv_async().await {
                trace!("Sending to connection {connection_id}: {line:?}");
                if let Err(e) = sink.send(line).await {
                    warn!("Error sending to connection {connection_id}: {e}");
                    break;
                }
            }
            debug!("Line sender for connection {connection_id} has been dropped");
        });

        // spawn task for receiving lines from the client
        let shared = Arc::clone(&shared);
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut authenticated = false;
            loop {
                let line = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    // the stream will return None once the client disconnects
                    line = stream.next() => match line {
                        Some(Ok(line)) => line,
                        Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                            warn!("Connection {connection_id} sent a line longer than {MAX_LINE_LENGTH} bytes");
                            shared.send_line(
                                connection_id,
                                WireFormat::Text.render_error(LINE_TOO_LONG_MESSAGE),
                            );
                            break;
                        }
                        Some(Err(e)) => {
                            warn!("Connection {connection_id} closed with error: {e:?}");
                            break;
                        }
                        None => break,
                    },
                };
                trace!("Raw input from connection {connection_id}: {line:?}");

                if !authenticated {
                    if line.trim() == shared.credentials.bot_token {
                        authenticated = true;
                        shared.send_line(connection_id, AUTHENTICATED_MESSAGE.to_string());
                        continue;
                    }
                    warn!("Connection {connection_id} failed to authenticate");
                    shared.send_line(connection_id, UNAUTHORIZED_MESSAGE.to_string());
                    break;
                }

                handle_line(&shared, connection_id, &line).await;
                if line.trim() == QUIT_COMMAND {
                    break;
                }
            }

            shared.remove_connection(connection_id);
            info!("Connection {connection_id} has disconnected");
        });
    }
}

/// Turns a line from a client into an interaction and waits for the handlers to finish with it.
async fn handle_line(shared: &Arc<Shared>, connection_id: u64, line: &str) {
    let line = line.trim();
    if line.is_empty() || line == QUIT_COMMAND {
        return;
    }

    let format = WireFormat::of(line);
    match shared.accept_line(connection_id, line, format) {
        Ok(interaction) => {
            debug!("Received interaction {}", interaction.reference);
            let shared = Arc::clone(shared);
            // handlers block on the verb store
            let dispatched = tokio::task::spawn_blocking(move || shared.dispatch(interaction));
            if let Err(e) = dispatched.await {
                warn!("Handler for connection {connection_id} failed: {e}");
            }
        }
        Err(message) => {
            debug!("Rejected line from connection {connection_id}: {message}");
            shared.send_line(connection_id, format.render_error(&message));
        }
    }
}

#[cfg(test)]
mod tests {
    use conjugation_core::Command;
    use conjugation_core::TenseCatalog;
    use tokio::{
        io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
        net::TcpStream,
    };

    use super::*;

    const TOKEN: &str = "secret-token";

    fn credentials() -> Credentials {
        Credentials {
            bot_token: TOKEN.to_string(),
            guild_id: "42".to_string(),
        }
    }

    /// Opens a host that replies to every interaction with the name of the command and how many options it had.
    fn open_echo_host() -> TcpHost {
        let mut host = TcpHost::new("127.0.0.1:0".to_string(), credentials());
        host.create_command(&Command::Conjugate.spec(&TenseCatalog::new()))
            .unwrap();
        host.add_handler(Box::new(|responder, interaction| {
            let content = format!("{} {}", interaction.command, interaction.options.len());
            responder
                .respond(&interaction.reference, &ReplyPayload::Content(content))
                .unwrap();
        }));
        host.open().unwrap();
        host
    }

    /// Creates an unopened host with the conjugate command registered and one connection.
    fn host_with_connection(connection_id: u64) -> (TcpHost, flume::Receiver<String>) {
        let mut host = TcpHost::new("127.0.0.1:0".to_string(), credentials());
        host.create_command(&Command::Conjugate.spec(&TenseCatalog::new()))
            .unwrap();
        let (sender, receiver) = flume::unbounded();
        host.shared.add_connection(connection_id, sender);
        (host, receiver)
    }

    fn pending_count(host: &TcpHost, connection_id: u64) -> usize {
        host.shared.connections.lock().unwrap()[&connection_id]
            .pending
            .len()
    }

    struct Client {
        reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
        writer: tokio::net::tcp::OwnedWriteHalf,
    }

    impl Client {
        async fn connect(host: &TcpHost) -> Client {
            let stream = TcpStream::connect(host.local_addr().unwrap()).await.unwrap();
            let (reader, writer) = stream.into_split();
            Client {
                reader: BufReader::new(reader),
                writer,
            }
        }

        async fn send(&mut self, line: &str) {
            self.writer
                .write_all(format!("{line}\n").as_bytes())
                .await
                .unwrap();
        }

        async fn send_raw(&mut self, bytes: &[u8]) {
            self.writer.write_all(bytes).await.unwrap();
        }

        async fn receive(&mut self) -> String {
            let mut line = String::new();
            self.reader.read_line(&mut line).await.unwrap();
            line.trim_end().to_string()
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn replies_to_json_and_text_interactions() {
        let mut host = open_echo_host();
        let mut client = Client::connect(&host).await;

        client.send(TOKEN).await;
        assert_eq!(AUTHENTICATED_MESSAGE, client.receive().await);

        client
            .send(r#"{"id": 5, "command": "conjugate", "options": [{"name": "infinitive", "value": "ser"}]}"#)
            .await;
        let reply: serde_json::Value = serde_json::from_str(&client.receive().await).unwrap();
        assert_eq!(
            serde_json::json!({ "interaction_id": 5, "reply": { "content": "conjugate 1" } }),
            reply
        );

        client
            .send("/conjugate infinitive: ser tense: Present perfect")
            .await;
        assert_eq!("conjugate 2", client.receive().await);

        host.close().unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rejects_unregistered_commands() {
        let mut host = open_echo_host();
        let mut client = Client::connect(&host).await;
        client.send(TOKEN).await;
        client.receive().await;

        client.send("/decline infinitive: ser").await;
        assert_eq!("unknown command: decline", client.receive().await);

        client.send(r#"{"id": 1, "command": "conjugate", "guild_id": "7"}"#).await;
        let reply: serde_json::Value = serde_json::from_str(&client.receive().await).unwrap();
        assert_eq!(serde_json::json!({ "error": "unknown guild: 7" }), reply);

        client.send("{not json").await;
        let reply: serde_json::Value = serde_json::from_str(&client.receive().await).unwrap();
        assert!(reply["error"]
            .as_str()
            .unwrap()
            .starts_with("malformed interaction"));

        host.close().unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn text_replies_arrive_in_order() {
        let mut host = open_echo_host();
        let mut client = Client::connect(&host).await;
        client.send(TOKEN).await;
        client.receive().await;

        client
            .send("/conjugate infinitive: ser\n/conjugate infinitive: ser tense: Present")
            .await;

        assert_eq!("conjugate 1", client.receive().await);
        assert_eq!("conjugate 2", client.receive().await);
        host.close().unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn overlong_lines_disconnect() {
        let mut host = open_echo_host();
        let mut client = Client::connect(&host).await;

        client.send_raw(&[b'a'; MAX_LINE_LENGTH + 1]).await;

        assert_eq!(LINE_TOO_LONG_MESSAGE, client.receive().await);
        assert_eq!("", client.receive().await);
        host.close().unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn requires_token() {
        let mut host = open_echo_host();
        let mut client = Client::connect(&host).await;

        client.send("wrong-token").await;

        assert_eq!(UNAUTHORIZED_MESSAGE, client.receive().await);
        host.close().unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn open_and_close() {
        let mut host = TcpHost::new("127.0.0.1:0".to_string(), credentials());

        assert!(matches!(host.close(), Err(HostError::NotOpen)));
        host.open().unwrap();
        assert!(host.local_addr().is_some());
        assert!(matches!(host.open(), Err(HostError::AlreadyOpen)));
        host.close().unwrap();
        assert!(host.local_addr().is_none());
    }

    #[test]
    fn open_needs_runtime() {
        let mut host = TcpHost::new("127.0.0.1:0".to_string(), credentials());

        assert!(matches!(host.open(), Err(HostError::Other(_))));
    }

    #[test]
    fn reply_without_pending_interaction() {
        let host = TcpHost::new("127.0.0.1:0".to_string(), credentials());

        let result = host.respond(
            &InteractionRef {
                id: 1,
                connection: 0,
            },
            &ReplyPayload::Content("hi".to_string()),
        );

        assert!(matches!(result, Err(HostError::NoRecipient(_))));
    }

    #[test]
    fn json_and_text_interaction_ids_are_separate() {
        let (host, receiver) = host_with_connection(1);

        let json = host
            .shared
            .accept_line(1, r#"{"id": 0, "command": "conjugate"}"#, WireFormat::Json)
            .unwrap();
        let text = host
            .shared
            .accept_line(
                1,
                "/conjugate infinitive: ser tense: Present",
                WireFormat::Text,
            )
            .unwrap();
        assert_ne!(json.reference, text.reference);

        host.respond(&text.reference, &ReplyPayload::Content("text".to_string()))
            .unwrap();
        host.respond(&json.reference, &ReplyPayload::Content("json".to_string()))
            .unwrap();

        assert_eq!("text", receiver.recv().unwrap());
        let reply: serde_json::Value = serde_json::from_str(&receiver.recv().unwrap()).unwrap();
        assert_eq!(
            serde_json::json!({ "interaction_id": 0, "reply": { "content": "json" } }),
            reply
        );
    }

    #[test]
    fn json_ids_in_flight_are_rejected() {
        let (host, _receiver) = host_with_connection(1);
        let line = r#"{"id": 3, "command": "conjugate"}"#;

        host.shared.accept_line(1, line, WireFormat::Json).unwrap();

        assert_eq!(
            Err("interaction 3 is already being handled".to_string()),
            host.shared.accept_line(1, line, WireFormat::Json)
        );
    }

    #[test]
    fn unanswered_interactions_are_forgotten() {
        let (host, _receiver) = host_with_connection(1);
        let interaction = host
            .shared
            .accept_line(1, "/conjugate infinitive: ser", WireFormat::Text)
            .unwrap();
        assert_eq!(1, pending_count(&host, 1));

        host.shared.dispatch(interaction);

        assert_eq!(0, pending_count(&host, 1));
    }

    #[test]
    fn duplicate_commands_are_rejected() {
        let mut host = TcpHost::new("127.0.0.1:0".to_string(), credentials());
        let spec = Command::Conjugate.spec(&TenseCatalog::new());

        host.create_command(&spec).unwrap();

        assert!(matches!(
            host.create_command(&spec),
            Err(HostError::CommandCreate { .. })
        ));
    }
}
