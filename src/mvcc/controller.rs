use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use crate::core::error::{Error, ErrorKind, Result};

/// Commit tick of one shard's indexing stream.
/// Tick 0 means "nothing written yet".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommitTick(pub u64);

/// Tracks which writes a shard index has made visible
///
/// Writers draw ticks in submission order, the indexing worker publishes
/// them in the same order once applied, and readers that asked for
/// read-your-writes wait on the published value.
pub struct CommitController {
    enqueued: AtomicU64,
    applied: watch::Sender<u64>,
}

impl CommitController {
    pub fn new() -> Self {
        let (applied, _) = watch::channel(0);
        CommitController {
            enqueued: AtomicU64::new(0),
            applied,
        }
    }

    pub fn next_tick(&self) -> CommitTick {
        CommitTick(self.enqueued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Last tick handed to a writer
    pub fn enqueued(&self) -> CommitTick {
        CommitTick(self.enqueued.load(Ordering::Acquire))
    }

    /// Last tick visible to readers
    pub fn applied(&self) -> CommitTick {
        CommitTick(*self.applied.borrow())
    }

    pub fn publish(&self, tick: CommitTick) {
        self.applied.send_modify(|applied| {
            if tick.0 > *applied {
                *applied = tick.0;
            }
        });
    }

    /// Suspends until `tick` is visible; fails rather than reading stale data
    pub async fn wait_for(&self, tick: CommitTick, timeout: Duration) -> Result<()> {
        let mut applied = self.applied.subscribe();
        let visible = async move {
            applied
                .wait_for(|current| *current >= tick.0)
                .await
                .map(|_| ())
        };

        match tokio::time::timeout(timeout, visible).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(Error::new(
                ErrorKind::Internal,
                "commit channel closed".to_string(),
            )),
            Err(_) => {
                tracing::warn!(tick = tick.0, applied = self.applied().0, ?timeout, "index visibility wait timed out");
                Err(Error::new(
                    ErrorKind::ConsistencyTimeout,
                    format!("tick {} not visible after {:?}", tick.0, timeout),
                ))
            }
        }
    }
}

impl Default for CommitController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn waits_until_tick_is_published() {
        let commits = std::sync::Arc::new(CommitController::new());
        let tick = commits.next_tick();
        assert_eq!(commits.enqueued(), tick);
        assert_eq!(commits.applied(), CommitTick(0));

        let publisher = commits.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            publisher.publish(tick);
        });

        commits.wait_for(tick, Duration::from_secs(5)).await.unwrap();
        assert_eq!(commits.applied(), tick);
    }

    #[tokio::test]
    async fn unpublished_tick_times_out() {
        let commits = CommitController::new();
        let tick = commits.next_tick();
        let err = commits
            .wait_for(tick, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConsistencyTimeout);
    }

    #[test]
    fn publish_never_moves_backwards() {
        let commits = CommitController::new();
        commits.publish(CommitTick(5));
        commits.publish(CommitTick(3));
        assert_eq!(commits.applied(), CommitTick(5));
    }
}
