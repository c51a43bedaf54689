use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::CommandOption;

const COMMAND_CAPTURE: &str = "command";
const OPTIONS_CAPTURE: &str = "options";
const OPTION_NAME_CAPTURE: &str = "name";

static COMMAND_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/?(?P<command>[a-z_]+)(?:\s+(?P<options>.*))?$").unwrap()
});
static OPTION_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)(?P<name>[a-z_]+):").unwrap());

/// A command typed out as text, like `/conjugate infinitive: ser tense: Present perfect`.
#[derive(Debug, Clone, PartialEq)]
pub struct TextCommand {
    pub command: String,
    pub options: Vec<CommandOption>,
}

/// An error while parsing a typed command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputParseError {
    #[error("no command provided")]
    Empty,
    #[error("not a command: {0:?}")]
    NotACommand(String),
    /// There was text after the command name that isn't part of any option.
    #[error("unexpected text before options: {0:?}")]
    UnexpectedText(String),
}

/// Parses the provided line into a command name and its options.
///
/// Each option is written as `name: value`, and its value runs until the next option name or the end of the line.
pub fn parse_text_command(input: &str) -> Result<TextCommand, InputParseError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(InputParseError::Empty);
    }

    let captures = COMMAND_PATTERN
        .captures(input)
        .ok_or_else(|| InputParseError::NotACommand(input.to_string()))?;
    let command = captures[COMMAND_CAPTURE].to_string();
    let options = match captures.name(OPTIONS_CAPTURE) {
        Some(options_match) => parse_options(options_match.as_str())?,
        None => Vec::new(),
    };

    Ok(TextCommand { command, options })
}

fn parse_options(input: &str) -> Result<Vec<CommandOption>, InputParseError> {
    let names = OPTION_NAME_PATTERN
        .captures_iter(input)
        .filter_map(|captures| {
            let whole = captures.get(0)?;
            let name = captures.name(OPTION_NAME_CAPTURE)?;
            Some((whole.start(), whole.end(), name.as_str()))
        })
        .collect::<Vec<_>>();

    let leading_text = match names.first() {
        Some((start, _, _)) => &input[..*start],
        None => input,
    };
    if !leading_text.trim().is_empty() {
        return Err(InputParseError::UnexpectedText(leading_text.trim().to_string()));
    }

    let options = names
        .iter()
        .enumerate()
        .map(|(i, (_, value_start, name))| {
            let value_end = names
                .get(i + 1)
                .map(|(next_start, _, _)| *next_start)
                .unwrap_or(input.len());
            CommandOption::new(*name, input[*value_start..value_end].trim())
        })
        .collect();

    Ok(options)
}
