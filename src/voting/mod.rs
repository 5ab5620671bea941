mod plurality;

pub use plurality::tally;

use serde::Serialize;

/// Rendered standing of a poll, one entry per option in poll order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResults {
    pub poll_id: String,
    pub title: String,
    pub active: bool,
    pub total_votes: u64,
    pub options: Vec<VoteCount>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteCount {
    pub option_id: String,
    pub option_text: String,
    pub votes: u64,
    /// Whole-number share of all votes, 0 when nobody has voted.
    pub percentage: u32,
    /// Holds the highest count; ties all lead, and nobody leads an empty poll.
    pub leading: bool,
}
