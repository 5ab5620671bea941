use crate::models::Poll;
use crate::voting::{PollResults, VoteCount};

pub fn tally(poll: &Poll) -> PollResults {
    let top = poll.options.iter().map(|option| option.votes).max().unwrap_or(0);

    let options = poll
        .options
        .iter()
        .map(|option| VoteCount {
            option_id: option.id.clone(),
            option_text: option.text.clone(),
            votes: option.votes,
            percentage: percentage(option.votes, poll.total_votes),
            leading: top > 0 && option.votes == top,
        })
        .collect();

    PollResults {
        poll_id: poll.id.clone(),
        title: poll.title.clone(),
        active: poll.active,
        total_votes: poll.total_votes,
        options,
    }
}

// Rounds half up, so 1 of 8 shows as 13%.
fn percentage(votes: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    ((votes * 200 + total) / (total * 2)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PollRecord;

    fn poll_with_votes(counts: &[usize]) -> Poll {
        let texts = (0..counts.len()).map(|i| format!("Option {}", i)).collect();
        let mut record = PollRecord::new(Poll::new("owner".to_string(), "Q".to_string(), None, texts));
        let mut voter = 0;
        for (index, count) in counts.iter().enumerate() {
            for _ in 0..*count {
                record.record_vote(index, &format!("voter_{}", voter));
                voter += 1;
            }
        }
        record.poll
    }

    #[test]
    fn empty_poll_has_no_leader() {
        let results = tally(&poll_with_votes(&[0, 0]));
        assert_eq!(results.total_votes, 0);
        assert!(results.options.iter().all(|o| o.percentage == 0 && !o.leading));
    }

    #[test]
    fn percentages_round_half_up() {
        let results = tally(&poll_with_votes(&[1, 7]));
        assert_eq!(results.options[0].percentage, 13);
        assert_eq!(results.options[1].percentage, 88);
        assert!(results.options[1].leading);
    }

    #[test]
    fn ties_share_the_lead() {
        let results = tally(&poll_with_votes(&[2, 2, 1]));
        let leading: Vec<_> = results.options.iter().map(|o| o.leading).collect();
        assert_eq!(leading, vec![true, true, false]);
        assert_eq!(results.options[2].percentage, 20);
    }
}
