use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One value from the fixed estimate deck.
///
/// The deck is closed: anything outside it fails deserialization, so an
/// out-of-deck vote is rejected at the wire boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Card {
    #[serde(rename = "1")]
    One,
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3")]
    Three,
    #[serde(rename = "5")]
    Five,
    #[serde(rename = "8")]
    Eight,
    #[serde(rename = "13")]
    Thirteen,
    #[serde(rename = "21")]
    TwentyOne,
    /// Coffee break: unable/unwilling to estimate numerically.
    #[serde(rename = "☕")]
    Coffee,
}

impl Card {
    pub const DECK: [Card; 8] = [
        Card::One,
        Card::Two,
        Card::Three,
        Card::Five,
        Card::Eight,
        Card::Thirteen,
        Card::TwentyOne,
        Card::Coffee,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Card::One => "1",
            Card::Two => "2",
            Card::Three => "3",
            Card::Five => "5",
            Card::Eight => "8",
            Card::Thirteen => "13",
            Card::TwentyOne => "21",
            Card::Coffee => "☕",
        }
    }

    /// Numeric value used for sorting and the average; `None` for ☕.
    pub fn numeric_value(&self) -> Option<u32> {
        match self {
            Card::One => Some(1),
            Card::Two => Some(2),
            Card::Three => Some(3),
            Card::Five => Some(5),
            Card::Eight => Some(8),
            Card::Thirteen => Some(13),
            Card::TwentyOne => Some(21),
            Card::Coffee => None,
        }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Card {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Card::DECK
            .iter()
            .find(|c| c.as_str() == s)
            .copied()
            .ok_or_else(|| format!("'{}' is not in the deck", s))
    }
}

/// The single shared state document: who voted what, and whether results
/// have been opened.
///
/// `votes` preserves insertion order; results aggregation depends on the
/// order participants were first seen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionDocument {
    #[serde(default)]
    pub votes: IndexMap<String, Card>,
    #[serde(default)]
    pub revealed: bool,
}
