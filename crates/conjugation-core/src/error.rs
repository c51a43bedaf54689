use thiserror::Error;

use crate::{HostError, LookupError, MissingOption, UnknownTense};

/// An error that ended the handling of an interaction.
#[derive(Debug, Error)]
pub enum ConjugateError {
    #[error(transparent)]
    MissingOption(#[from] MissingOption),
    #[error(transparent)]
    UnknownTense(#[from] UnknownTense),
    #[error(transparent)]
    Lookup(#[from] LookupError),
    /// The reply couldn't be delivered.
    #[error("error sending reply: {0}")]
    Send(#[from] HostError),
}

/// The kinds of failures the user can be told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MissingOption,
    UnknownTense,
    NotFound,
    QueryError,
    Ambiguous,
}

impl ConjugateError {
    /// Determines what to tell the user about this error. Returns `None` if the user can't be told anything, since the reply itself failed.
    pub fn kind(&self) -> Option<ErrorKind> {
        let kind = match self {
            ConjugateError::MissingOption(_) => ErrorKind::MissingOption,
            ConjugateError::UnknownTense(_) => ErrorKind::UnknownTense,
            ConjugateError::Lookup(LookupError::NotFound { .. }) => ErrorKind::NotFound,
            ConjugateError::Lookup(LookupError::Ambiguous { .. }) => ErrorKind::Ambiguous,
            ConjugateError::Lookup(LookupError::Query(_)) => ErrorKind::QueryError,
            ConjugateError::Send(_) => return None,
        };

        Some(kind)
    }
}
