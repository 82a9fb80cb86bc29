use std::collections::HashMap;

/// Rank code used for nodes without a proper taxonomic level.
pub const NO_RANK: &str = "n";
/// Rank code of the top-level domains hanging under "cellular organisms".
pub const SUPERKINGDOM: &str = "sk";

/// The rank codes every QIIME/GTDB style export is expected to use.
const BASE_RANKS: &[(&str, &str)] = &[
    ("n", "no rank"),
    ("sk", "superkingdom"),
    ("k", "kingdom"),
    ("d", "domain"),
    ("p", "phylum"),
    ("c", "class"),
    ("o", "order"),
    ("f", "family"),
    ("g", "genus"),
    ("s", "species"),
    ("x", "strain"),
];

/// Registry of rank codes seen so far and their canonical labels.
///
/// Codes are kept in the order they were first registered. A code that is not
/// in the base table becomes its own label, which lets non-standard rank
/// vocabularies pass through to the dump unchanged.
#[derive(Debug, Default, Clone)]
pub struct RankTable {
    labels: HashMap<String, String>,
    order: Vec<String>,
}

impl RankTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `code` and return its label. Registering a known code returns
    /// the label it already has.
    pub fn add_rank(&mut self, code: &str) -> &str {
        if !self.labels.contains_key(code) {
            let label = Self::base_label(code).unwrap_or(code).to_string();
            self.labels.insert(code.to_string(), label);
            self.order.push(code.to_string());
        }
        &self.labels[code]
    }

    /// Label from the fixed table, ignoring runtime registrations.
    pub fn base_label(code: &str) -> Option<&'static str> {
        BASE_RANKS
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, label)| *label)
    }

    pub fn label(&self, code: &str) -> Option<&str> {
        self.labels.get(code).map(|s| s.as_str())
    }

    pub fn contains(&self, code: &str) -> bool {
        self.labels.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// `(code, label)` pairs in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.order
            .iter()
            .map(move |code| (code.as_str(), self.labels[code].as_str()))
    }
}
