use conjugation_core::{CommandOption, ReplyPayload};
use serde::{Deserialize, Serialize};

use crate::reply_to_string::reply_to_string;

/// An interaction sent by a client as a line of JSON.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WireInteraction {
    pub id: u64,
    pub command: String,
    #[serde(default)]
    pub options: Vec<CommandOption>,
    /// The guild the interaction was sent from. Interactions without one are treated as coming from the host's guild.
    #[serde(default)]
    pub guild_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct WireReply<'a> {
    interaction_id: u64,
    reply: &'a ReplyPayload,
}

#[derive(Debug, Serialize)]
struct WireError<'a> {
    error: &'a str,
}

/// How a client wrote an interaction, and so how it expects to be replied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    /// One JSON object per line.
    Json,
    /// Typed-out commands, with replies rendered for a terminal.
    Text,
}

impl WireFormat {
    /// Determines the format of the provided line.
    pub fn of(line: &str) -> WireFormat {
        if line.trim_start().starts_with('{') {
            WireFormat::Json
        } else {
            WireFormat::Text
        }
    }

    /// Renders a reply to an interaction as a line.
    pub fn render_reply(&self, interaction_id: u64, reply: &ReplyPayload) -> String {
        match self {
            WireFormat::Json => to_json_line(&WireReply {
                interaction_id,
                reply,
            }),
            WireFormat::Text => reply_to_string(reply),
        }
    }

    /// Renders a problem with a line that couldn't be turned into an interaction.
    pub fn render_error(&self, error: &str) -> String {
        match self {
            WireFormat::Json => to_json_line(&WireError { error }),
            WireFormat::Text => error.to_string(),
        }
    }
}

fn to_json_line<T: Serialize>(value: &T) -> String {
    // serializing plain structs of strings and numbers can't fail
    serde_json::to_string(value).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
}
