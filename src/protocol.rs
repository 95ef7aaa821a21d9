use crate::results::ResultsSummary;
use crate::types::{Card, SessionDocument};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    Join {
        name: String,
    },
    Authenticate {
        password: String,
    },
    CastVote {
        card: Card,
    },
    Reveal,
    Reset,
    /// Manual re-render request, independent of the staleness check.
    Sync,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        protocol: String,
        /// Whether this connection may present an admin password at all.
        admin_route: bool,
        server_now: String,
    },
    Joined {
        name: String,
    },
    AdminStatus {
        is_admin: bool,
    },
    VoteAck {
        card: Card,
    },
    Table(TableView),
    Error {
        code: String,
        msg: String,
    },
}

/// What a joined client sees of the shared table.
///
/// Aggregated results are only ever attached once the table is revealed;
/// before that, clients see participant presence alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableView {
    /// Participants who have cast a vote, in encounter order.
    pub participants: Vec<String>,
    pub revealed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<ResultsSummary>,
}

impl TableView {
    pub fn from_document(document: &SessionDocument) -> Self {
        let results = document
            .revealed
            .then(|| ResultsSummary::from_votes(&document.votes));
        Self {
            participants: document.votes.keys().cloned().collect(),
            revealed: document.revealed,
            results,
        }
    }
}
