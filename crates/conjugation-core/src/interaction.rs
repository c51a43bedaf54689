use std::fmt::Display;

use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString, IntoStaticStr};

use crate::TenseCatalog;

pub const INFINITIVE_OPTION: &str = "infinitive";
pub const TENSE_OPTION: &str = "tense";

/// Identifies an interaction so a reply can be routed back to whoever sent it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InteractionRef {
    /// The ID of the interaction, unique per connection.
    pub id: u64,
    /// The connection the interaction arrived on.
    pub connection: u64,
}

impl Display for InteractionRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.connection, self.id)
    }
}

/// A raw option value, exactly as the host delivered it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    String(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
}

impl OptionValue {
    /// Gets the value if it's a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::String(value.to_string())
    }
}

/// A named option provided with a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOption {
    pub name: String,
    pub value: OptionValue,
}

impl CommandOption {
    pub fn new(name: impl Into<String>, value: impl Into<OptionValue>) -> CommandOption {
        CommandOption {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One user-invoked command.
#[derive(Debug, Clone, PartialEq)]
pub struct Interaction {
    pub reference: InteractionRef,
    /// The name of the invoked command.
    pub command: String,
    pub options: Vec<CommandOption>,
}

/// The commands that can be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Command {
    Conjugate,
}

impl Command {
    /// Finds the command with the provided name, if there is one.
    pub fn from_name(name: &str) -> Option<Command> {
        name.parse().ok()
    }

    /// The name users invoke this command with.
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// Builds the metadata to register this command with a host.
    pub fn spec(&self, catalog: &TenseCatalog) -> CommandSpec {
        match self {
            Command::Conjugate => CommandSpec {
                name: self.name().to_string(),
                description: "Provides conjugation details for a given Spanish verb.".to_string(),
                options: vec![
                    CommandOptionSpec {
                        name: INFINITIVE_OPTION.to_string(),
                        description: "Verb to look up.".to_string(),
                        required: true,
                        choices: Vec::new(),
                    },
                    CommandOptionSpec {
                        name: TENSE_OPTION.to_string(),
                        description: "Tense and mood of the chosen verb.".to_string(),
                        required: true,
                        choices: catalog.choice_names(),
                    },
                ],
            },
        }
    }
}

/// Metadata describing a command, for registration with a host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub name: String,
    pub description: String,
    pub options: Vec<CommandOptionSpec>,
}

/// Metadata describing a string option of a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOptionSpec {
    pub name: String,
    pub description: String,
    pub required: bool,
    /// The only values allowed for the option. Empty if any value is allowed.
    pub choices: Vec<String>,
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn command_names() {
        assert_eq!(Some(Command::Conjugate), Command::from_name("conjugate"));
        assert_eq!(None, Command::from_name("Conjugate"));
        assert_eq!(None, Command::from_name("decline"));

        for command in Command::iter() {
            assert_eq!(Some(command), Command::from_name(command.name()));
        }
    }

    #[test]
    fn conjugate_spec_offers_catalog_choices() {
        let catalog = TenseCatalog::new();
        let spec = Command::Conjugate.spec(&catalog);

        assert_eq!("conjugate", spec.name);
        assert_eq!(2, spec.options.len());
        assert_eq!(INFINITIVE_OPTION, spec.options[0].name);
        assert!(spec.options[0].required);
        assert!(spec.options[0].choices.is_empty());
        assert_eq!(TENSE_OPTION, spec.options[1].name);
        assert!(spec.options[1].required);
        assert_eq!(catalog.choice_names(), spec.options[1].choices);
    }

    #[test]
    fn option_values_keep_their_type() {
        let values: Vec<OptionValue> = serde_json::from_str(r#"["ser", 3, 1.5, true]"#).unwrap();

        assert_eq!(
            vec![
                OptionValue::String("ser".to_string()),
                OptionValue::Integer(3),
                OptionValue::Number(1.5),
                OptionValue::Boolean(true),
            ],
            values
        );
        assert_eq!(Some("ser"), values[0].as_str());
        assert_eq!(None, values[1].as_str());
    }
}
