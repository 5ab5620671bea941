mod locks;

use crate::db::PollStorage;
use crate::error::{PollError, PollResult, StorageError};
use crate::models::{AuthContext, NewPoll, Poll, PollRecord};
use crate::voting::{self, PollResults};
use locks::PollLocks;
use log::{error, info, warn};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    Created(Poll),
    Updated(Poll),
    Deleted { poll_id: String },
}

/// Owns the poll collection. Every read-modify-write of an existing poll runs
/// under that poll's lock, so counters, the voter set and the active flag are
/// always checked and written as one unit.
pub struct PollStore {
    storage: Arc<dyn PollStorage>,
    locks: PollLocks,
    events: broadcast::Sender<PollEvent>,
}

impl PollStore {
    pub fn new(storage: Arc<dyn PollStorage>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            storage,
            locks: PollLocks::default(),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PollEvent> {
        self.events.subscribe()
    }

    pub async fn create(&self, auth: &AuthContext, input: NewPoll) -> PollResult<Poll> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(PollError::Validation("Poll title is required".to_string()));
        }

        let options: Vec<String> = input
            .options
            .iter()
            .map(|text| text.trim())
            .filter(|text| !text.is_empty())
            .map(str::to_string)
            .collect();
        if options.len() < 2 {
            return Err(PollError::Validation(
                "A poll needs at least 2 non-empty options".to_string(),
            ));
        }

        let description = input
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);

        let poll = Poll::new(auth.user_id.clone(), title.to_string(), description, options);
        let record = PollRecord::new(poll.clone());

        // Held so no vote or toggle on the new id is published before Created.
        let _guard = self.locks.lock(&poll.id).await;
        retry_once("put", || self.storage.put(&record)).await?;

        info!("Created poll {} with {} options for {}", poll.id, poll.options.len(), auth.user_id);
        self.publish(PollEvent::Created(poll.clone()));
        Ok(poll)
    }

    pub async fn list(&self) -> PollResult<Vec<Poll>> {
        let records = retry_once("list", || self.storage.list()).await?;
        Ok(records.into_iter().map(|r| r.poll).collect())
    }

    pub async fn list_active(&self) -> PollResult<Vec<Poll>> {
        let mut polls = self.list().await?;
        polls.retain(|p| p.active);
        Ok(polls)
    }

    pub async fn get(&self, poll_id: &str) -> PollResult<Poll> {
        Ok(self.load(poll_id).await?.poll)
    }

    pub async fn results(&self, poll_id: &str) -> PollResult<PollResults> {
        let poll = self.get(poll_id).await?;
        Ok(voting::tally(&poll))
    }

    pub async fn set_active(&self, auth: &AuthContext, poll_id: &str, active: bool) -> PollResult<Poll> {
        let _guard = self.locks.lock(poll_id).await;

        let mut record = self.load(poll_id).await?;
        ensure_owner(auth, &record.poll)?;

        if record.poll.active != active {
            record.poll.active = active;
            retry_once("put", || self.storage.put(&record)).await?;
            info!("Poll {} is now {}", poll_id, if active { "active" } else { "closed" });
            self.publish(PollEvent::Updated(record.poll.clone()));
        }

        Ok(record.poll)
    }

    pub async fn delete(&self, auth: &AuthContext, poll_id: &str) -> PollResult<()> {
        let _guard = self.locks.lock(poll_id).await;

        let record = self.load(poll_id).await?;
        ensure_owner(auth, &record.poll)?;

        if !retry_once("delete", || self.storage.delete(poll_id)).await? {
            return Err(PollError::NotFound(format!("Poll {}", poll_id)));
        }

        info!("Deleted poll {}", poll_id);
        self.publish(PollEvent::Deleted {
            poll_id: poll_id.to_string(),
        });
        Ok(())
    }

    pub async fn vote(&self, poll_id: &str, option_id: &str, voter_id: &str) -> PollResult<Poll> {
        let voter_id = voter_id.trim();
        if voter_id.is_empty() {
            return Err(PollError::Validation("Voter identity is required".to_string()));
        }

        let _guard = self.locks.lock(poll_id).await;

        let mut record = self.load(poll_id).await?;
        if !record.poll.active {
            warn!("Rejected vote by {} on closed poll {}", voter_id, poll_id);
            return Err(PollError::ClosedPoll(poll_id.to_string()));
        }

        let index = record
            .poll
            .options
            .iter()
            .position(|option| option.id == option_id)
            .ok_or_else(|| PollError::NotFound(format!("Option {} in poll {}", option_id, poll_id)))?;

        if record.has_voted(voter_id) {
            warn!("Rejected duplicate vote by {} on poll {}", voter_id, poll_id);
            return Err(PollError::DuplicateVote(poll_id.to_string()));
        }

        record.record_vote(index, voter_id);
        debug_assert!(record.poll.tally_is_consistent());
        retry_once("put", || self.storage.put(&record)).await?;

        info!("Recorded vote: poll_id={}, option_id={}, total={}", poll_id, option_id, record.poll.total_votes);
        self.publish(PollEvent::Updated(record.poll.clone()));
        Ok(record.poll)
    }

    async fn load(&self, poll_id: &str) -> PollResult<PollRecord> {
        retry_once("get", || self.storage.get(poll_id))
            .await?
            .ok_or_else(|| PollError::NotFound(format!("Poll {}", poll_id)))
    }

    fn publish(&self, event: PollEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

fn ensure_owner(auth: &AuthContext, poll: &Poll) -> PollResult<()> {
    if poll.created_by == auth.user_id {
        Ok(())
    } else {
        warn!("{} tried to modify poll {} owned by {}", auth.user_id, poll.id, poll.created_by);
        Err(PollError::Unauthorized)
    }
}

/// Runs a storage call, repeating it once if the first failure was transient.
async fn retry_once<T, F, Fut>(op: &str, mut call: F) -> Result<T, StorageError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StorageError>>,
{
    match call().await {
        Err(e) if e.is_transient() => {
            warn!("Storage {} failed ({}), retrying once", op, e);
            call().await.inspect_err(|e| error!("Storage {} failed again: {}", op, e))
        }
        Err(e) => {
            error!("Storage {} failed: {}", op, e);
            Err(e)
        }
        ok => ok,
    }
}
