use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Entry = Arc<AsyncMutex<()>>;

/// One async mutex per poll id. An entry lives only while some task holds or
/// waits on it, so ids that never name a poll leave nothing behind.
#[derive(Default)]
pub(super) struct PollLocks {
    table: Mutex<HashMap<String, Entry>>,
}

/// Held for the length of one critical section on a poll.
pub(super) struct PollGuard<'a> {
    locks: &'a PollLocks,
    poll_id: String,
    entry: Entry,
    held: Option<OwnedMutexGuard<()>>,
}

impl PollLocks {
    pub(super) async fn lock(&self, poll_id: &str) -> PollGuard<'_> {
        let entry = Arc::clone(self.table().entry(poll_id.to_string()).or_default());

        // Built before waiting so a cancelled waiter still cleans up its entry.
        let mut guard = PollGuard {
            locks: self,
            poll_id: poll_id.to_string(),
            entry,
            held: None,
        };
        guard.held = Some(Arc::clone(&guard.entry).lock_owned().await);
        guard
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[cfg(test)]
    pub(super) fn len(&self) -> usize {
        self.table().len()
    }
}

impl Drop for PollGuard<'_> {
    fn drop(&mut self) {
        let mut table = self.locks.table();
        drop(self.held.take());

        // Two references left: the table's and ours. Nobody else is waiting.
        let idle = table
            .get(&self.poll_id)
            .is_some_and(|entry| Arc::ptr_eq(entry, &self.entry) && Arc::strong_count(entry) == 2);
        if idle {
            table.remove(&self.poll_id);
        }
    }
}
