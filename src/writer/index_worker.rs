use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{DocId, Document};
use crate::index::shard_index::ShardIndex;
use crate::mvcc::controller::{CommitController, CommitTick};
use crate::parallel::indexer::DocumentIndexer;

/// A collection shard as seen by one view link
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShardId {
    pub collection: Arc<str>,
    pub shard: u32,
}

impl ShardId {
    pub fn new(collection: Arc<str>, shard: u32) -> Self {
        ShardId { collection, shard }
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/s{}", self.collection, self.shard)
    }
}

/// Write forwarded from the document store to a shard's indexing worker
#[derive(Debug)]
pub enum IndexOp {
    Upsert { doc: Arc<Document>, tick: CommitTick },
    Remove { doc_id: DocId, tick: CommitTick },
}

/// Owner of one shard index and the worker that keeps it current
pub struct ShardHandle {
    pub id: ShardId,
    index: Arc<RwLock<ShardIndex>>,
    commits: Arc<CommitController>,
    sender: Mutex<mpsc::UnboundedSender<IndexOp>>,
}

impl ShardHandle {
    /// Starts the indexing worker on `runtime`. It stops once the handle is dropped.
    pub fn spawn(
        id: ShardId,
        index: ShardIndex,
        indexer: DocumentIndexer,
        runtime: &Handle,
    ) -> Arc<ShardHandle> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = Arc::new(ShardHandle {
            id,
            index: Arc::new(RwLock::new(index)),
            commits: Arc::new(CommitController::new()),
            sender: Mutex::new(sender),
        });

        let worker = IndexWorker {
            id: handle.id.clone(),
            index: handle.index.clone(),
            commits: handle.commits.clone(),
            indexer,
        };
        runtime.spawn(worker.run(receiver));
        handle
    }

    pub fn index(&self) -> &Arc<RwLock<ShardIndex>> {
        &self.index
    }

    pub fn commits(&self) -> &CommitController {
        &self.commits
    }

    pub fn submit_upsert(&self, doc: Arc<Document>) -> Result<CommitTick> {
        self.submit(|tick| IndexOp::Upsert { doc, tick })
    }

    pub fn submit_remove(&self, doc_id: DocId) -> Result<CommitTick> {
        self.submit(|tick| IndexOp::Remove { doc_id, tick })
    }

    fn submit(&self, op: impl FnOnce(CommitTick) -> IndexOp) -> Result<CommitTick> {
        // Ticks are drawn under the sender lock so queue order and tick order agree
        let sender = self.sender.lock();
        let tick = self.commits.next_tick();
        sender.send(op(tick)).map_err(|_| {
            Error::new(ErrorKind::Internal, format!("indexing worker for {} stopped", self.id))
        })?;
        Ok(tick)
    }

    /// Waits until every write submitted so far is visible
    pub async fn sync(&self, timeout: Duration) -> Result<()> {
        let tick = self.commits.enqueued();
        self.commits.wait_for(tick, timeout).await
    }

    pub async fn wait_visible(&self, tick: CommitTick, timeout: Duration) -> Result<()> {
        self.commits.wait_for(tick, timeout).await
    }
}

struct IndexWorker {
    id: ShardId,
    index: Arc<RwLock<ShardIndex>>,
    commits: Arc<CommitController>,
    indexer: DocumentIndexer,
}

impl IndexWorker {
    async fn run(self, mut receiver: mpsc::UnboundedReceiver<IndexOp>) {
        tracing::debug!(shard = %self.id, "indexing worker started");

        while let Some(op) = receiver.recv().await {
            match op {
                IndexOp::Upsert { doc, tick } => {
                    // Analyze outside the lock, apply in one step under it
                    match self.indexer.analyze(&doc, tick.0) {
                        Ok(indexed) => self.index.write().apply(indexed),
                        Err(e) => {
                            tracing::warn!(shard = %self.id, key = %doc.key, error = %e, "failed to index document");
                            self.index
                                .write()
                                .mark_corrupted(format!("document '{}' could not be indexed: {}", doc.key, e));
                        }
                    }
                    self.commits.publish(tick);
                }
                IndexOp::Remove { doc_id, tick } => {
                    self.index.write().remove(doc_id);
                    self.commits.publish(tick);
                }
            }
        }

        tracing::debug!(shard = %self.id, "indexing worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyzer::AnalyzerRegistry;
    use crate::schema::link::LinkConfig;

    #[tokio::test]
    async fn writes_become_visible_in_order() {
        let indexer = DocumentIndexer::new(
            Arc::new(LinkConfig::new().include_all_fields(true)),
            Arc::new(AnalyzerRegistry::new()),
        );
        let id = ShardId::new(Arc::from("c"), 0);
        let shard = ShardHandle::spawn(id.clone(), ShardIndex::new(id.to_string()), indexer, &Handle::current());

        let doc = Arc::new(
            Document::from_json(DocId(1), "k".to_string(), serde_json::json!({"a": "foo"})).unwrap(),
        );
        shard.submit_upsert(doc).unwrap();
        let tick = shard.submit_remove(DocId(1)).unwrap();
        assert_eq!(tick, CommitTick(2));

        shard.wait_visible(tick, Duration::from_secs(5)).await.unwrap();
        assert_eq!(shard.index().read().doc_count(), 0);
        assert_eq!(shard.commits().applied(), tick);
    }
}
