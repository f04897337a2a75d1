use crate::AppData;
use log::{error, info};
use std::collections::HashSet;
use std::sync::Mutex;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct StartTask {
    pub match_id: String,
    pub league_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Created,
    /// The task name was already enqueued once; redelivery collapses to a
    /// single logical task and counts as success.
    AlreadyExists,
}

/// Sharded at-least-once dispatch channel. Matches are spread over parallel
/// shards keyed by league id, so one slow league cannot serialize the rest,
/// and the match id doubles as the task's idempotency key.
pub struct StartQueue {
    shards: Vec<mpsc::UnboundedSender<StartTask>>,
    receivers: Mutex<Vec<Option<mpsc::UnboundedReceiver<StartTask>>>>,
    seen: Mutex<HashSet<String>>,
}

impl StartQueue {
    pub fn new(shard_count: usize) -> Self {
        let shard_count = shard_count.max(1);
        let mut shards = Vec::with_capacity(shard_count);
        let mut receivers = Vec::with_capacity(shard_count);
        for _ in 0..shard_count {
            let (tx, rx) = mpsc::unbounded_channel();
            shards.push(tx);
            receivers.push(Some(rx));
        }
        StartQueue {
            shards,
            receivers: Mutex::new(receivers),
            seen: Mutex::new(HashSet::new()),
        }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Byte sum of the league id modulo the shard count.
    pub fn shard_key(league_id: &str, shards: usize) -> usize {
        if shards <= 1 {
            return 0;
        }
        let sum: usize = league_id.bytes().map(|b| b as usize).sum();
        sum % shards
    }

    /// Enqueues the start work item `{matchId, leagueId}`. A duplicate task
    /// name is success, not an error; the downstream handler is status-guarded
    /// anyway, because delivery is at-least-once.
    pub fn enqueue(&self, match_id: &str, league_id: &str) -> EnqueueOutcome {
        let task_name = format!("run-{}", match_id);
        {
            let mut seen = self.seen.lock().expect("queue dedup lock poisoned");
            if !seen.insert(task_name) {
                return EnqueueOutcome::AlreadyExists;
            }
        }
        let shard = Self::shard_key(league_id, self.shards.len());
        let task = StartTask {
            match_id: match_id.to_string(),
            league_id: league_id.to_string(),
        };
        if self.shards[shard].send(task).is_err() {
            error!("start queue shard {} closed; task run-{} dropped", shard, match_id);
        }
        EnqueueOutcome::Created
    }

    /// Takes the receivers and spins one worker task per shard. Idempotent:
    /// a second call finds no receivers left.
    pub fn spawn_workers(&self, app: AppData) {
        let mut receivers = self.receivers.lock().expect("queue receiver lock poisoned");
        for (shard, slot) in receivers.iter_mut().enumerate() {
            let Some(mut rx) = slot.take() else { continue };
            let app = app.clone();
            tokio::spawn(async move {
                info!("start-match worker up (shard {})", shard);
                while let Some(task) = rx.recv().await {
                    let result = super::start_match_internal(
                        &app,
                        &task.match_id,
                        &task.league_id,
                        false,
                    )
                    .await;
                    if let Err(e) = result {
                        error!(
                            "start task failed: match {} league {}: {}",
                            task.match_id, task.league_id, e
                        );
                    }
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_key_is_stable_and_bounded() {
        let a = StartQueue::shard_key("league-abc", 4);
        assert_eq!(a, StartQueue::shard_key("league-abc", 4));
        assert!(a < 4);
        assert_eq!(StartQueue::shard_key("anything", 1), 0);
    }

    #[test]
    fn test_duplicate_enqueue_collapses() {
        let queue = StartQueue::new(2);
        assert_eq!(queue.enqueue("m1", "lg1"), EnqueueOutcome::Created);
        assert_eq!(queue.enqueue("m1", "lg1"), EnqueueOutcome::AlreadyExists);
        assert_eq!(queue.enqueue("m2", "lg1"), EnqueueOutcome::Created);
    }
}
