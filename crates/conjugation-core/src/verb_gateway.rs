use std::sync::Arc;

use log::warn;
use thiserror::Error;

use crate::verb_store::{StoreError, VerbKey, VerbRecord, VerbStore};

/// How many rows to ask the store for. Anything past the first means the key is ambiguous.
const ROW_LIMIT: usize = 2;

/// An error looking up a verb.
#[derive(Debug, Error)]
pub enum LookupError {
    /// No row matches the key.
    #[error("no verb found for {infinitive} in {mood} {tense}")]
    NotFound {
        infinitive: String,
        mood: String,
        tense: String,
    },
    /// More than one row matches the key.
    #[error("more than one verb found for {infinitive} in {mood} {tense}")]
    Ambiguous {
        infinitive: String,
        mood: String,
        tense: String,
    },
    /// The store couldn't be queried.
    #[error("error querying verb store: {0}")]
    Query(#[from] StoreError),
}

/// Looks up single conjugation rows in a verb store.
#[derive(Clone)]
pub struct VerbGateway {
    store: Arc<dyn VerbStore>,
}

impl VerbGateway {
    pub fn new(store: Arc<dyn VerbStore>) -> VerbGateway {
        VerbGateway { store }
    }

    /// Finds the single row for the provided infinitive, mood, and tense.
    pub fn lookup(
        &self,
        infinitive: &str,
        mood: &str,
        tense: &str,
    ) -> Result<VerbRecord, LookupError> {
        let key = VerbKey {
            infinitive,
            mood,
            tense,
        };
        let mut records = self.store.find_verbs(&key, ROW_LIMIT)?;

        match records.len() {
            0 => Err(LookupError::NotFound {
                infinitive: infinitive.to_string(),
                mood: mood.to_string(),
                tense: tense.to_string(),
            }),
            1 => Ok(records.swap_remove(0)),
            _ => {
                warn!("Found duplicate rows for {key:?}");
                Err(LookupError::Ambiguous {
                    infinitive: infinitive.to_string(),
                    mood: mood.to_string(),
                    tense: tense.to_string(),
                })
            }
        }
    }
}
