use std::collections::HashMap;

use thiserror::Error;

/// The tenses users can choose from, in the order they're offered, along with the mood and tense they're stored under.
const TENSE_MOODS: [(&str, &str, &str); 18] = [
    ("Present", "Indicativo", "Presente"),
    ("Preterite", "Indicativo", "Pretérito"),
    ("Imperfect", "Indicativo", "Imperfecto"),
    ("Conditional", "Indicativo", "Condicional"),
    ("Future", "Indicativo", "Futuro"),
    ("Present perfect", "Indicativo", "Presente"),
    (
        "Preterite perfect (Past anterior)",
        "Indicativo",
        "Pretérito anterior",
    ),
    ("Pluperfect (Past perfect)", "Indicativo", "Pluscuamperfecto"),
    ("Conditional perfect", "Indicativo", "Condicional perfecto"),
    ("Future perfect", "Indicativo", "Futuro perfecto"),
    ("Present subjunctive", "Subjuntivo", "Presente"),
    ("Imperfect subjunctive", "Subjuntivo", "Imperfecto"),
    ("Future subjunctive", "Subjuntivo", "Futuro"),
    ("Present perfect subjunctive", "Subjuntivo", "Presente perfecto"),
    (
        "Pluperfect (Past perfect) subjunctive",
        "Subjuntivo",
        "Pluscuamperfecto",
    ),
    (
        "Future perfect subjunctive",
        "Subjuntivo",
        "Pretérito anterior",
    ),
    ("Imperative", "Imperativo Afirmativo", "Presente"),
    ("Negative Imperative", "Imperativo Negativo", "Presente"),
];

/// A user-facing tense name and the mood and tense it corresponds to in the verb store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenseMoodEntry {
    /// The name users select.
    pub name: String,
    /// The mood, as stored.
    pub mood: String,
    /// The tense, as stored.
    pub tense: String,
}

/// The provided tense name isn't in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("tense name not found: {0}")]
pub struct UnknownTense(pub String);

/// Map of tense display names to their moods and tenses.
#[derive(Debug, Clone)]
pub struct TenseCatalog {
    entries: Vec<TenseMoodEntry>,
    by_name: HashMap<String, usize>,
}

impl Default for TenseCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl TenseCatalog {
    /// Creates the catalog of all the supported tenses.
    pub fn new() -> TenseCatalog {
        let entries = TENSE_MOODS
            .iter()
            .map(|(name, mood, tense)| TenseMoodEntry {
                name: name.to_string(),
                mood: mood.to_string(),
                tense: tense.to_string(),
            })
            .collect::<Vec<_>>();

        let by_name = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (entry.name.clone(), i))
            .collect();

        TenseCatalog { entries, by_name }
    }

    /// Finds the entry with exactly the provided name.
    pub fn resolve(&self, name: &str) -> Result<&TenseMoodEntry, UnknownTense> {
        self.by_name
            .get(name)
            .map(|i| &self.entries[*i])
            .ok_or_else(|| UnknownTense(name.to_string()))
    }

    /// All the entries, in display order.
    pub fn entries(&self) -> &[TenseMoodEntry] {
        &self.entries
    }

    /// The names to offer users as choices, in display order.
    pub fn choice_names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }
}
