use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::Instrument;
use uuid::Uuid;
use crate::core::config::{Config, ScoringStatsMode};
use crate::core::error::{Error, ErrorKind, Result};
use crate::query::plan::{CompiledQuery, CompiledSort};
use crate::query::request::{Consistency, ViewQuery};
use crate::scoring::stats::ScoringStats;
use crate::search::executor::{ShardExecutor, ShardRequest};
use crate::search::results::{Hit, QueryStats, ShardResponse};
use crate::writer::index_worker::ShardHandle;

/// Per-query execution knobs derived from the request and the database config
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub offset: usize,
    pub limit: Option<usize>,
    pub wait_for_sync: bool,
    pub sync_timeout: Duration,
    pub shard_timeout: Option<Duration>,
}

impl SearchOptions {
    pub fn from_request(query: &ViewQuery, config: &Config) -> Self {
        SearchOptions {
            offset: query.offset,
            limit: query.limit,
            wait_for_sync: query.consistency == Consistency::WaitForSync,
            sync_timeout: config.sync_timeout(),
            shard_timeout: query.timeout.or_else(|| config.query_timeout()),
        }
    }

    /// Same options without offset/limit, used when several runs are merged afterwards
    pub fn unbounded(&self) -> Self {
        SearchOptions {
            offset: 0,
            limit: None,
            ..self.clone()
        }
    }

    /// Every hit up to the end of the window, leaving the offset to the caller
    pub fn through_window(&self) -> Self {
        SearchOptions {
            offset: 0,
            limit: self.window(),
            ..self.clone()
        }
    }

    fn window(&self) -> Option<usize> {
        self.limit.map(|limit| self.offset.saturating_add(limit))
    }
}

#[derive(Debug)]
pub struct SearchOutcome {
    pub hits: Vec<Hit>,
    pub stats: QueryStats,
}

/// Fans a compiled query out to shards and merges what comes back
pub struct Coordinator {
    scoring: ScoringStatsMode,
}

impl Coordinator {
    pub fn new(scoring: ScoringStatsMode) -> Self {
        Coordinator { scoring }
    }

    pub async fn execute(
        &self,
        shards: &[Arc<ShardHandle>],
        query: Arc<CompiledQuery>,
        options: &SearchOptions,
    ) -> Result<SearchOutcome> {
        let query_id = Uuid::new_v4();
        let span = tracing::info_span!("view_query", %query_id, shards = shards.len());
        self.run(query_id, shards, query, options).instrument(span).await
    }

    async fn run(
        &self,
        query_id: Uuid,
        shards: &[Arc<ShardHandle>],
        query: Arc<CompiledQuery>,
        options: &SearchOptions,
    ) -> Result<SearchOutcome> {
        let started = Instant::now();

        if options.wait_for_sync {
            for shard in shards {
                shard.sync(options.sync_timeout).await?;
            }
        }

        let stats = if query.needs_scores() && self.scoring == ScoringStatsMode::Global {
            Some(Arc::new(collect_global_stats(shards, &query)?))
        } else {
            None
        };

        // Truncating per shard is only safe when every shard ranks with the same numbers
        let local_limit = if query.needs_scores() && stats.is_none() {
            None
        } else {
            options.window()
        };

        let request = ShardRequest {
            query: query.clone(),
            stats,
            local_limit,
        };
        let responses = fan_out(shards, request, options.shard_timeout).await?;

        let total_matches = responses.iter().map(|r| r.total_matches).sum();
        let merged = if query.is_sorted() {
            merge_sorted(responses, &query.sort, options.window())
        } else {
            responses.into_iter().flat_map(|r| r.hits).collect()
        };
        let hits = apply_window(merged, options.offset, options.limit);

        let stats = QueryStats {
            query_id,
            shards_scanned: shards.len(),
            total_matches,
            elapsed: started.elapsed(),
        };
        tracing::debug!(total_matches, returned = hits.len(), elapsed_ms = stats.elapsed.as_millis() as u64, "query finished");
        Ok(SearchOutcome { hits, stats })
    }
}

fn collect_global_stats(shards: &[Arc<ShardHandle>], query: &CompiledQuery) -> Result<ScoringStats> {
    let mut global = ScoringStats::default();
    for shard in shards {
        let index = shard.index().read();
        index.ensure_healthy()?;
        global.merge(ScoringStats::collect(&index, &query.scoring_terms));
    }
    Ok(global)
}

/// Runs every shard concurrently; the first failure cancels the rest.
/// Responses come back in the order of `shards`.
async fn fan_out(
    shards: &[Arc<ShardHandle>],
    request: ShardRequest,
    shard_timeout: Option<Duration>,
) -> Result<Vec<ShardResponse>> {
    let deadline = shard_timeout.map(|timeout| tokio::time::Instant::now() + timeout);
    let mut tasks = JoinSet::new();

    for (position, shard) in shards.iter().enumerate() {
        let mut executor = ShardExecutor::new(shard.clone(), request.clone());
        let shard_id = shard.id.clone();
        tasks.spawn(async move {
            let work = tokio::task::spawn_blocking(move || executor.execute());
            let joined = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, work).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        return (
                            position,
                            Err(Error::new(
                                ErrorKind::ShardTimeout,
                                format!("shard {} missed the query deadline", shard_id),
                            )),
                        );
                    }
                },
                None => work.await,
            };
            let result = joined.unwrap_or_else(|e| {
                Err(Error::new(ErrorKind::Internal, format!("shard {} task failed: {}", shard_id, e)))
            });
            (position, result)
        });
    }

    let mut responses: Vec<Option<ShardResponse>> = vec![None; shards.len()];
    while let Some(joined) = tasks.join_next().await {
        let result = match joined {
            Ok((position, Ok(response))) => {
                responses[position] = Some(response);
                continue;
            }
            Ok((_, Err(e))) => e,
            Err(e) => Error::new(ErrorKind::Internal, format!("shard task panicked: {}", e)),
        };
        tracing::warn!(error = %result, "shard failed, cancelling query");
        tasks.abort_all();
        return Err(result);
    }

    Ok(responses.into_iter().flatten().collect())
}

struct MergeEntry<'a> {
    hit: Hit,
    source: usize,
    sort: &'a [CompiledSort],
}

impl PartialEq for MergeEntry<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MergeEntry<'_> {}

impl PartialOrd for MergeEntry<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MergeEntry<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap and the smallest hit must come out first
        other.hit.cmp_with(&self.hit, self.sort)
    }
}

/// k-way merge of per-shard lists that are already in final order
pub fn merge_sorted(responses: Vec<ShardResponse>, sort: &[CompiledSort], take: Option<usize>) -> Vec<Hit> {
    let total: usize = responses.iter().map(|r| r.hits.len()).sum();
    let capacity = take.map_or(total, |take| take.min(total));
    let mut sources: Vec<std::vec::IntoIter<Hit>> = responses.into_iter().map(|r| r.hits.into_iter()).collect();

    let mut heap = BinaryHeap::with_capacity(sources.len());
    for (source, hits) in sources.iter_mut().enumerate() {
        if let Some(hit) = hits.next() {
            heap.push(MergeEntry { hit, source, sort });
        }
    }

    let mut merged = Vec::with_capacity(capacity);
    while merged.len() < capacity {
        let Some(MergeEntry { hit, source, .. }) = heap.pop() else {
            break;
        };
        if let Some(next) = sources[source].next() {
            heap.push(MergeEntry { hit: next, source, sort });
        }
        merged.push(hit);
    }
    merged
}

pub fn apply_window<T>(items: Vec<T>, offset: usize, limit: Option<usize>) -> Vec<T> {
    let rest = items.into_iter().skip(offset);
    match limit {
        Some(limit) => rest.take(limit).collect(),
        None => rest.collect(),
    }
}
