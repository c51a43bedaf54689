use serde::{Deserialize, Serialize};

use crate::{ErrorKind, VerbRecord};

/// The accent color of conjugation embeds.
pub const EMBED_COLOR: u32 = 16711807;

const MISSING_OPTION_MESSAGE: &str = "Infinitive or tense not provided.";
const TENSE_DATA_MESSAGE: &str = "Error getting tense data.";
const VERB_NOT_FOUND_MESSAGE: &str = "Verb not found.";
const QUERY_ERROR_MESSAGE: &str = "Error querying database.";

/// A reply to an interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyPayload {
    /// A structured reply.
    Embed(Embed),
    /// A plain-text reply.
    Content(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    pub title: String,
    pub color: u32,
    pub fields: Vec<EmbedField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    /// Whether the field can be displayed on the same line as other inline fields.
    pub inline: bool,
}

impl EmbedField {
    fn new(name: &str, value: &str, inline: bool) -> EmbedField {
        EmbedField {
            name: name.to_string(),
            value: value.to_string(),
            inline,
        }
    }
}

/// Builds the reply describing the conjugations in the provided record.
pub fn format_success(infinitive: &str, verb: &VerbRecord) -> ReplyPayload {
    let forms = &verb.forms;
    let person_fields = [
        ("yo", &forms.first_singular),
        ("tú", &forms.second_singular),
        ("él/ella/Ud.", &forms.third_singular),
        ("nosotros", &forms.first_plural),
        ("vosotros", &forms.second_plural),
        ("ellos/ellas/Uds.", &forms.third_plural),
    ]
    .into_iter()
    .map(|(pronoun, form)| EmbedField::new(pronoun, display_or_empty(form), true));

    let fields = [
        EmbedField::new("Tiempo", &verb.tense, false),
        EmbedField::new("Modo", &verb.mood, false),
    ]
    .into_iter()
    .chain(person_fields)
    .collect();

    ReplyPayload::Embed(Embed {
        title: format!(
            "{infinitive} - {}",
            display_or_empty(&verb.english_gloss)
        ),
        color: EMBED_COLOR,
        fields,
    })
}

/// Builds the reply telling the user that handling failed.
pub fn format_error(kind: ErrorKind) -> ReplyPayload {
    let message = match kind {
        ErrorKind::MissingOption => MISSING_OPTION_MESSAGE,
        ErrorKind::UnknownTense => TENSE_DATA_MESSAGE,
        ErrorKind::NotFound => VERB_NOT_FOUND_MESSAGE,
        ErrorKind::QueryError | ErrorKind::Ambiguous => QUERY_ERROR_MESSAGE,
    };

    ReplyPayload::Content(message.to_string())
}

/// Missing values are displayed as nothing at all.
fn display_or_empty(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or_default()
}
