use std::collections::HashMap;

use itertools::Itertools;
use thiserror::Error;

use crate::interaction::{CommandOption, OptionValue, INFINITIVE_OPTION, TENSE_OPTION};

/// Options provided with a single interaction, by name.
pub struct OptionMap<'a> {
    options: HashMap<&'a str, &'a OptionValue>,
}

impl<'a> OptionMap<'a> {
    /// Builds a map from the provided options. Later options replace earlier options with the same name.
    pub fn new(options: &'a [CommandOption]) -> OptionMap<'a> {
        OptionMap {
            options: options
                .iter()
                .map(|o| (o.name.as_str(), &o.value))
                .collect(),
        }
    }

    /// Gets the value of the option with the provided name, if it was provided as a non-empty string.
    pub fn get_str(&self, name: &str) -> Option<&'a str> {
        self.options
            .get(name)
            .copied()
            .and_then(OptionValue::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// Required options were not provided.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing required options: {}", .0.join(", "))]
pub struct MissingOption(pub Vec<&'static str>);

/// The values needed to conjugate a verb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConjugateOptions {
    pub infinitive: String,
    pub tense_name: String,
}

/// Extracts the infinitive and tense name from the provided options.
pub fn extract(options: &[CommandOption]) -> Result<ConjugateOptions, MissingOption> {
    let option_map = OptionMap::new(options);

    let infinitive = option_map.get_str(INFINITIVE_OPTION);
    let tense_name = option_map.get_str(TENSE_OPTION);

    match (infinitive, tense_name) {
        (Some(infinitive), Some(tense_name)) => Ok(ConjugateOptions {
            infinitive: infinitive.to_string(),
            tense_name: tense_name.to_string(),
        }),
        (infinitive, tense_name) => Err(MissingOption(
            [
                (INFINITIVE_OPTION, infinitive),
                (TENSE_OPTION, tense_name),
            ]
            .into_iter()
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| name)
            .collect_vec(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_provided() {
        let options = vec![
            CommandOption::new("infinitive", "ser"),
            CommandOption::new("tense", "Present"),
        ];

        let expected = ConjugateOptions {
            infinitive: "ser".to_string(),
            tense_name: "Present".to_string(),
        };
        assert_eq!(Ok(expected), extract(&options));
    }

    #[test]
    fn order_does_not_matter() {
        let options = vec![
            CommandOption::new("tense", "Future perfect"),
            CommandOption::new("infinitive", "hablar"),
        ];

        let extracted = extract(&options).unwrap();
        assert_eq!("hablar", extracted.infinitive);
        assert_eq!("Future perfect", extracted.tense_name);
    }

    #[test]
    fn missing_tense() {
        let options = vec![CommandOption::new("infinitive", "ser")];

        assert_eq!(Err(MissingOption(vec!["tense"])), extract(&options));
    }

    #[test]
    fn missing_both() {
        assert_eq!(
            Err(MissingOption(vec!["infinitive", "tense"])),
            extract(&[])
        );
    }

    #[test]
    fn empty_string_is_missing() {
        let options = vec![
            CommandOption::new("infinitive", ""),
            CommandOption::new("tense", "Present"),
        ];

        assert_eq!(Err(MissingOption(vec!["infinitive"])), extract(&options));
    }

    #[test]
    fn non_string_is_missing() {
        let options = vec![
            CommandOption::new("infinitive", "ser"),
            CommandOption {
                name: "tense".to_string(),
                value: OptionValue::Integer(1),
            },
        ];

        assert_eq!(Err(MissingOption(vec!["tense"])), extract(&options));
    }

    #[test]
    fn last_duplicate_wins() {
        let options = vec![
            CommandOption::new("infinitive", "ser"),
            CommandOption::new("infinitive", "estar"),
            CommandOption::new("tense", "Present"),
        ];

        assert_eq!("estar", extract(&options).unwrap().infinitive);
    }

    #[test]
    fn unrelated_options_are_ignored() {
        let options = vec![
            CommandOption::new("infinitive", "ir"),
            CommandOption::new("tense", "Preterite"),
            CommandOption::new("ephemeral", "yes"),
        ];

        assert!(extract(&options).is_ok());
    }
}
