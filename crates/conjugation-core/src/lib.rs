//! Looks up Spanish verb conjugations in response to chat commands.
//!
//! An [`InteractionHandler`] takes interactions delivered by a [`Host`], pulls the infinitive and tense out of them,
//! resolves the tense with the [`TenseCatalog`], finds the matching row through a [`VerbGateway`], and replies with
//! either an embed of the conjugated forms or a short error message.

mod error;
pub use error::ConjugateError;
pub use error::ErrorKind;

mod handler;
pub use handler::InteractionHandler;

mod host;
pub use host::EventHandler;
pub use host::Host;
pub use host::HostError;
pub use host::Responder;

mod input_parser;
pub use input_parser::parse_text_command;
pub use input_parser::InputParseError;
pub use input_parser::TextCommand;

mod interaction;
pub use interaction::Command;
pub use interaction::CommandOption;
pub use interaction::CommandOptionSpec;
pub use interaction::CommandSpec;
pub use interaction::Interaction;
pub use interaction::InteractionRef;
pub use interaction::OptionValue;

mod option_extractor;
pub use option_extractor::extract;
pub use option_extractor::ConjugateOptions;
pub use option_extractor::MissingOption;
pub use option_extractor::OptionMap;

mod recording_host;
pub use recording_host::RecordingHost;

mod reply;
pub use reply::format_error;
pub use reply::format_success;
pub use reply::Embed;
pub use reply::EmbedField;
pub use reply::ReplyPayload;
pub use reply::EMBED_COLOR;

mod tense_catalog;
pub use tense_catalog::TenseCatalog;
pub use tense_catalog::TenseMoodEntry;
pub use tense_catalog::UnknownTense;

mod verb_gateway;
pub use verb_gateway::LookupError;
pub use verb_gateway::VerbGateway;

mod verb_store;
pub use verb_store::PersonForms;
pub use verb_store::SqliteVerbStore;
pub use verb_store::StoreError;
pub use verb_store::VerbKey;
pub use verb_store::VerbRecord;
pub use verb_store::VerbStore;
