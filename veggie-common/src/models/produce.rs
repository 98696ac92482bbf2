//! Produce label vocabulary
//!
//! A produce label encodes both the kind of produce and its ripeness
//! state, e.g. `ripe_banana` or `unripe_avocado`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Every label the in-tree classifier can emit
pub const KNOWN_LABELS: [&str; 15] = [
    "unripe_banana",
    "ripe_banana",
    "rotten_banana",
    "unripe_avocado",
    "ripe_avocado",
    "rotten_avocado",
    "unripe_tomato",
    "ripe_tomato",
    "rotten_tomato",
    "unripe_mango",
    "ripe_mango",
    "rotten_mango",
    "unripe_strawberry",
    "ripe_strawberry",
    "rotten_strawberry",
];

/// Coarse produce category reported to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProduceCategory {
    Fruit,
    Vegetable,
}

impl ProduceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProduceCategory::Fruit => "fruit",
            ProduceCategory::Vegetable => "vegetable",
        }
    }

    /// Strict parse; anything but `fruit`/`vegetable` is rejected
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fruit" => Some(ProduceCategory::Fruit),
            "vegetable" => Some(ProduceCategory::Vegetable),
            _ => None,
        }
    }
}

impl fmt::Display for ProduceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ripeness state encoded in the label prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RipenessStage {
    Unripe,
    Ripe,
    Rotten,
}

/// Kind of produce encoded in the label suffix
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProduceKind {
    Banana,
    Avocado,
    Tomato,
    Mango,
    Strawberry,
    /// Kind the vocabulary does not know (kept verbatim)
    Other(String),
}

impl ProduceKind {
    fn parse(value: &str) -> Self {
        match value {
            "banana" => ProduceKind::Banana,
            "avocado" => ProduceKind::Avocado,
            "tomato" => ProduceKind::Tomato,
            "mango" => ProduceKind::Mango,
            "strawberry" => ProduceKind::Strawberry,
            other => ProduceKind::Other(other.to_string()),
        }
    }
}

/// Parsed produce label
///
/// Parsing never fails: a label without a recognized stage prefix has
/// `stage == None` and the whole label becomes the kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceLabel {
    pub stage: Option<RipenessStage>,
    pub kind: ProduceKind,
}

impl ProduceLabel {
    pub fn parse(label: &str) -> Self {
        let normalized = label.trim().to_ascii_lowercase().replace([' ', '-'], "_");

        let (stage, rest) = match normalized.split_once('_') {
            Some(("unripe", rest)) => (Some(RipenessStage::Unripe), rest),
            Some(("ripe", rest)) => (Some(RipenessStage::Ripe), rest),
            Some(("rotten", rest)) => (Some(RipenessStage::Rotten), rest),
            _ => (None, normalized.as_str()),
        };

        Self {
            stage,
            kind: ProduceKind::parse(rest),
        }
    }
}
