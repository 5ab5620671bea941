use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub options: Vec<PollOption>,
    pub total_votes: u64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollOption {
    pub id: String,
    pub text: String,
    pub votes: u64,
}

/// Creation input as it arrives from a caller, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPoll {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub options: Vec<String>,
}

/// Identity of an authenticated user, produced outside the store and trusted as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: String,
}

impl AuthContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into() }
    }
}

/// What the storage layer persists: the poll plus everyone who has voted on it.
#[derive(Debug, Clone, PartialEq)]
pub struct PollRecord {
    pub poll: Poll,
    pub voters: BTreeSet<String>,
}

impl Poll {
    /// Builds a fresh poll from already-validated parts.
    pub fn new(
        creator_id: String,
        title: String,
        description: Option<String>,
        options: Vec<String>,
    ) -> Self {
        let options = options
            .into_iter()
            .enumerate()
            .map(|(position, text)| PollOption {
                id: format!("opt_{}", position),
                text,
                votes: 0,
            })
            .collect();

        Self {
            id: format!("poll_{}", Uuid::new_v4().simple()),
            title,
            description,
            options,
            total_votes: 0,
            active: true,
            created_at: Utc::now(),
            created_by: creator_id,
        }
    }

    pub fn tally_is_consistent(&self) -> bool {
        self.options.iter().map(|option| option.votes).sum::<u64>() == self.total_votes
    }
}

impl PollRecord {
    pub fn new(poll: Poll) -> Self {
        Self {
            poll,
            voters: BTreeSet::new(),
        }
    }

    pub fn has_voted(&self, voter_id: &str) -> bool {
        self.voters.contains(voter_id)
    }

    /// Counts one vote for the option at `index` and remembers the voter.
    /// Option counter, total and voter set move together.
    pub fn record_vote(&mut self, index: usize, voter_id: &str) {
        self.poll.options[index].votes += 1;
        self.poll.total_votes += 1;
        self.voters.insert(voter_id.to_string());
    }
}
