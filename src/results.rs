//! Aggregation of revealed votes into the results view.

use crate::types::Card;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// All participants who chose the same card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteGroup {
    pub card: Card,
    pub count: usize,
    /// Voter names in the order they were first seen in the document.
    pub voters: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsSummary {
    /// Groups ordered numerically ascending; non-numeric cards after all
    /// numeric ones, in encounter order among themselves.
    pub groups: Vec<VoteGroup>,
    /// Mean of the numeric votes, one decimal place. Omitted entirely when
    /// no vote is numeric.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average: Option<String>,
}

impl ResultsSummary {
    pub fn from_votes(votes: &IndexMap<String, Card>) -> Self {
        let mut groups: Vec<VoteGroup> = Vec::new();
        for (name, card) in votes {
            match groups.iter_mut().find(|g| g.card == *card) {
                Some(group) => {
                    group.count += 1;
                    group.voters.push(name.clone());
                }
                None => groups.push(VoteGroup {
                    card: *card,
                    count: 1,
                    voters: vec![name.clone()],
                }),
            }
        }

        // Stable sort keeps encounter order among non-numeric cards
        groups.sort_by_key(|g| g.card.numeric_value().map(u64::from).unwrap_or(u64::MAX));

        let numeric: Vec<u32> = votes.values().filter_map(Card::numeric_value).collect();
        let average = if numeric.is_empty() {
            None
        } else {
            let mean = numeric.iter().sum::<u32>() as f64 / numeric.len() as f64;
            Some(format!("{:.1}", mean))
        };

        Self { groups, average }
    }
}
