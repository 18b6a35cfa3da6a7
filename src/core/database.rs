use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use parking_lot::RwLock;
use tokio::runtime::Handle;
use crate::analysis::analyzer::AnalyzerRegistry;
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::Document;
use crate::core::view::{CommitMode, View, ViewLink, ViewProperties, ARANGOSEARCH_VIEW_TYPE};
use crate::index::shard_index::ShardIndex;
use crate::mvcc::controller::CommitTick;
use crate::parallel::indexer::{DocumentIndexer, ParallelIndexer};
use crate::query::binder::Bindings;
use crate::query::compiler::FilterCompiler;
use crate::query::plan::CompiledQuery;
use crate::query::request::ViewQuery;
use crate::schema::link::LinkConfig;
use crate::search::coordinator::{apply_window, Coordinator, SearchOptions};
use crate::search::results::{Hit, QueryResult, QueryStats};
use crate::storage::collection::{Collection, CollectionOptions};
use crate::writer::index_worker::{ShardHandle, ShardId};

#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    /// Acknowledge only after every linked shard index applied the write
    pub wait_for_sync: bool,
}

impl WriteOptions {
    pub fn sync() -> Self {
        WriteOptions { wait_for_sync: true }
    }
}

#[derive(Default)]
struct Catalog {
    collections: BTreeMap<String, Arc<Collection>>,
    views: BTreeMap<String, View>,
}

impl Catalog {
    fn collection(&self, name: &str) -> Result<&Arc<Collection>> {
        self.collections
            .get(name)
            .ok_or_else(|| Error::not_found(format!("collection '{}' not found", name)))
    }

    fn view(&self, name: &str) -> Result<&View> {
        self.views
            .get(name)
            .ok_or_else(|| Error::not_found(format!("view '{}' not found", name)))
    }
}

/// A write handed to a shard indexing worker
struct PendingWrite {
    shard: Arc<ShardHandle>,
    tick: CommitTick,
    sync: bool,
}

/// Linked shards a query runs against, in collection-name then shard order
struct QueryTarget {
    shards: Vec<Arc<ShardHandle>>,
    collections: HashMap<Arc<str>, Arc<Collection>>,
}

/// Collections, search views over them, and the view query surface.
///
/// Lock order: catalog, then a collection shard, then a shard index. Writes
/// hold the catalog shared while they enqueue index operations, so link
/// backfills (catalog exclusive) never miss or double-apply a write.
pub struct Database {
    config: Arc<Config>,
    analyzers: Arc<AnalyzerRegistry>,
    catalog: RwLock<Catalog>,
    indexer: ParallelIndexer,
    coordinator: Coordinator,
    runtime: Handle,
}

impl Database {
    /// Must be called from within a tokio runtime; shard workers are spawned on it
    pub fn open(config: Config) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| {
            Error::new(ErrorKind::Internal, format!("database needs a tokio runtime: {}", e))
        })?;
        let indexer = ParallelIndexer::new(config.indexing_threads, config.backfill_batch_size)?;
        let coordinator = Coordinator::new(config.scoring_stats);

        tracing::info!(
            indexing_threads = indexer.workers,
            scoring_stats = ?config.scoring_stats,
            "database opened"
        );
        Ok(Database {
            config: Arc::new(config),
            analyzers: Arc::new(AnalyzerRegistry::new()),
            catalog: RwLock::new(Catalog::default()),
            indexer,
            coordinator,
            runtime,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn analyzers(&self) -> &AnalyzerRegistry {
        &self.analyzers
    }

    // Collections

    pub fn create_collection(&self, name: &str, options: Option<CollectionOptions>) -> Result<Arc<Collection>> {
        let options = options.unwrap_or_else(|| CollectionOptions::from_config(&self.config));
        let mut catalog = self.catalog.write();
        if catalog.collections.contains_key(name) {
            return Err(Error::new(ErrorKind::Duplicate, format!("collection '{}' already exists", name)));
        }

        let collection = Arc::new(Collection::new(name, options));
        catalog.collections.insert(name.to_string(), collection.clone());
        tracing::info!(collection = name, shards = collection.shard_count(), "created collection");
        Ok(collection)
    }

    pub fn collection(&self, name: &str) -> Result<Arc<Collection>> {
        self.catalog.read().collection(name).cloned()
    }

    /// Drops the collection and detaches it from every view
    pub fn drop_collection(&self, name: &str) -> Result<()> {
        let mut catalog = self.catalog.write();
        if catalog.collections.remove(name).is_none() {
            return Err(Error::not_found(format!("collection '{}' not found", name)));
        }
        for view in catalog.views.values_mut() {
            if view.links.remove(name).is_some() {
                tracing::info!(view = %view.name, collection = name, "link removed with its collection");
            }
        }
        tracing::info!(collection = name, "dropped collection");
        Ok(())
    }

    // Views

    pub fn create_view(&self, name: &str, view_type: &str, properties: ViewProperties) -> Result<ViewProperties> {
        if view_type != ARANGOSEARCH_VIEW_TYPE {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("unsupported view type '{}'", view_type),
            ));
        }

        let mut catalog = self.catalog.write();
        if catalog.views.contains_key(name) {
            return Err(Error::new(ErrorKind::Duplicate, format!("view '{}' already exists", name)));
        }

        let links = self.build_links(&catalog, &properties.links)?;
        let mut view = View::new(name);
        view.commit_mode = properties.commit_mode.unwrap_or_default();
        for (collection, link) in links {
            if let Some(link) = link {
                view.links.insert(collection, link);
            }
        }

        tracing::info!(view = name, id = %view.id, links = view.links.len(), "created view");
        let props = view.properties();
        catalog.views.insert(name.to_string(), view);
        Ok(props)
    }

    pub fn view_properties(&self, name: &str) -> Result<ViewProperties> {
        Ok(self.catalog.read().view(name)?.properties())
    }

    /// Partial update: only the listed links change, a `null` link is removed.
    /// Every new link is validated before any of them is applied.
    pub fn update_view_properties(&self, name: &str, properties: ViewProperties) -> Result<ViewProperties> {
        let mut catalog = self.catalog.write();
        catalog.view(name)?;

        let links = self.build_links(&catalog, &properties.links)?;
        let view = catalog
            .views
            .get_mut(name)
            .ok_or_else(|| Error::not_found(format!("view '{}' not found", name)))?;

        for (collection, link) in links {
            match link {
                Some(link) => {
                    tracing::info!(view = name, collection = %collection, "link installed");
                    view.links.insert(collection, link);
                }
                None => {
                    if view.links.remove(&collection).is_some() {
                        tracing::info!(view = name, collection = %collection, "link removed");
                    }
                }
            }
        }
        if let Some(mode) = properties.commit_mode {
            view.commit_mode = mode;
        }
        Ok(view.properties())
    }

    pub fn drop_view(&self, name: &str) -> Result<()> {
        let removed = self.catalog.write().views.remove(name);
        match removed {
            Some(view) => {
                tracing::info!(view = name, id = %view.id, "dropped view");
                Ok(())
            }
            None => Err(Error::not_found(format!("view '{}' not found", name))),
        }
    }

    fn build_links(
        &self,
        catalog: &Catalog,
        updates: &BTreeMap<String, Option<LinkConfig>>,
    ) -> Result<Vec<(String, Option<ViewLink>)>> {
        for (collection, config) in updates {
            if let Some(config) = config {
                catalog.collection(collection)?;
                config.validate(&self.analyzers)?;
            }
        }

        let mut links = Vec::with_capacity(updates.len());
        for (collection, config) in updates {
            let link = match config {
                Some(config) => {
                    let collection = catalog.collection(collection)?.clone();
                    Some(self.build_link(collection, config.clone())?)
                }
                None => None,
            };
            links.push((collection.clone(), link));
        }
        Ok(links)
    }

    /// Indexes the collection's current contents and starts one worker per shard
    fn build_link(&self, collection: Arc<Collection>, config: LinkConfig) -> Result<ViewLink> {
        let config = Arc::new(config);
        let indexer = DocumentIndexer::new(config.clone(), self.analyzers.clone());
        let started = Instant::now();

        let mut shards = Vec::with_capacity(collection.shard_count() as usize);
        let mut backfilled = 0;
        for shard in 0..collection.shard_count() {
            let id = ShardId::new(collection.name().clone(), shard);
            let documents = collection.shard_documents(shard);
            let mut index = ShardIndex::new(id.to_string());
            for doc in self.indexer.index_batch(&indexer, &documents)? {
                index.apply(doc);
            }
            backfilled += documents.len();
            shards.push(ShardHandle::spawn(id, index, indexer.clone(), &self.runtime));
        }

        tracing::debug!(
            collection = %collection.name(),
            documents = backfilled,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "link backfilled"
        );
        Ok(ViewLink {
            collection,
            config,
            shards,
        })
    }

    // Writes

    pub async fn insert(&self, collection: &str, value: serde_json::Value, options: WriteOptions) -> Result<Arc<Document>> {
        let (doc, pending) = {
            let catalog = self.catalog.read();
            let target = catalog.collection(collection)?;
            let (doc, pending) = target.insert(value, |shard, doc| {
                forward(&catalog, target.name(), shard, |handle| handle.submit_upsert(doc.clone()))
            })?;
            (doc, pending?)
        };
        self.await_visible(pending, options).await?;
        Ok(doc)
    }

    /// Upsert by `_key`
    pub async fn replace(
        &self,
        collection: &str,
        key: &str,
        value: serde_json::Value,
        options: WriteOptions,
    ) -> Result<Arc<Document>> {
        let (doc, pending) = {
            let catalog = self.catalog.read();
            let target = catalog.collection(collection)?;
            let (doc, pending) = target.replace(key, value, |shard, doc| {
                forward(&catalog, target.name(), shard, |handle| handle.submit_upsert(doc.clone()))
            })?;
            (doc, pending?)
        };
        self.await_visible(pending, options).await?;
        Ok(doc)
    }

    pub async fn remove(&self, collection: &str, key: &str, options: WriteOptions) -> Result<Arc<Document>> {
        let (doc, pending) = {
            let catalog = self.catalog.read();
            let target = catalog.collection(collection)?;
            let (doc, pending) = target.remove(key, |shard, doc_id| {
                forward(&catalog, target.name(), shard, |handle| handle.submit_remove(doc_id))
            })?;
            (doc, pending?)
        };
        self.await_visible(pending, options).await?;
        Ok(doc)
    }

    async fn await_visible(&self, pending: Vec<PendingWrite>, options: WriteOptions) -> Result<()> {
        for write in pending {
            if options.wait_for_sync || write.sync {
                write.shard.wait_visible(write.tick, self.config.sync_timeout()).await?;
            }
        }
        Ok(())
    }

    pub fn get(&self, collection: &str, key: &str) -> Result<Option<Arc<Document>>> {
        Ok(self.collection(collection)?.get(key))
    }

    pub fn all_documents(&self, collection: &str) -> Result<Vec<Arc<Document>>> {
        Ok(self.collection(collection)?.all_documents())
    }

    /// Index shards backing one link of a view
    pub fn view_shards(&self, view: &str, collection: &str) -> Result<Vec<Arc<ShardHandle>>> {
        let catalog = self.catalog.read();
        let link = catalog.view(view)?.link(collection).ok_or_else(|| link_not_found(view, collection))?;
        Ok(link.shards.clone())
    }

    // Queries

    /// `FOR doc IN VIEW .. FILTER .. SORT .. LIMIT ..`
    pub async fn for_each_in_view(&self, query: &ViewQuery) -> Result<QueryResult> {
        self.for_each_in_view_bound(query, &Bindings::new()).await
    }

    /// Same as [`Database::for_each_in_view`] with outer variables in scope
    pub async fn for_each_in_view_bound(&self, query: &ViewQuery, bindings: &Bindings) -> Result<QueryResult> {
        let compiled = Arc::new(self.compile(query, bindings)?);
        let target = self.resolve_target(query)?;
        let options = SearchOptions::from_request(query, &self.config);

        let mut outcome = self
            .coordinator
            .execute(&target.shards, compiled.clone(), &options.through_window())
            .await?;
        let mut documents = fetch_documents(&target, &outcome.hits);

        // Removals that raced the index read leave gaps; refill them from the full match set
        let truncated = (outcome.hits.len() as u64) < outcome.stats.total_matches;
        if documents.len() < outcome.hits.len() && truncated {
            tracing::debug!(
                view = %query.view,
                dropped = outcome.hits.len() - documents.len(),
                "refetching page after concurrent removals"
            );
            outcome = self
                .coordinator
                .execute(&target.shards, compiled, &options.unbounded())
                .await?;
            documents = fetch_documents(&target, &outcome.hits);
        }

        Ok(QueryResult {
            documents: apply_window(documents, options.offset, options.limit),
            stats: outcome.stats,
        })
    }

    /// View query nested inside an outer loop: runs once per outer row, then
    /// sorts and windows the combined rows
    pub async fn for_each_in_view_correlated(&self, query: &ViewQuery, rows: &[Bindings]) -> Result<QueryResult> {
        let started = Instant::now();
        let compiled = rows
            .iter()
            .map(|row| self.compile(query, row).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;
        let target = self.resolve_target(query)?;
        let options = SearchOptions::from_request(query, &self.config).unbounded();

        let mut hits: Vec<Hit> = Vec::new();
        let mut total_matches = 0;
        let mut query_id = None;
        for plan in &compiled {
            let outcome = self.coordinator.execute(&target.shards, plan.clone(), &options).await?;
            total_matches += outcome.stats.total_matches;
            query_id.get_or_insert(outcome.stats.query_id);
            hits.extend(outcome.hits);
        }

        if let Some(plan) = compiled.first().filter(|plan| plan.is_sorted()) {
            hits.sort_by(|a, b| a.cmp_with(b, &plan.sort));
        }
        let documents = fetch_documents(&target, &hits);

        Ok(QueryResult {
            documents: apply_window(documents, query.offset, query.limit),
            stats: QueryStats {
                query_id: query_id.unwrap_or_else(uuid::Uuid::new_v4),
                shards_scanned: target.shards.len() * compiled.len(),
                total_matches,
                elapsed: started.elapsed(),
            },
        })
    }

    fn compile(&self, query: &ViewQuery, bindings: &Bindings) -> Result<CompiledQuery> {
        FilterCompiler::new(&self.analyzers, bindings).compile(query.filter.as_ref(), &query.sort)
    }

    fn resolve_target(&self, query: &ViewQuery) -> Result<QueryTarget> {
        let catalog = self.catalog.read();
        let view = catalog.view(&query.view)?;

        let mut names: Vec<&str> = match &query.collections {
            Some(names) => names.iter().map(String::as_str).collect(),
            None => view.links.keys().map(String::as_str).collect(),
        };
        names.sort_unstable();
        names.dedup();

        let mut target = QueryTarget {
            shards: Vec::new(),
            collections: HashMap::new(),
        };
        for name in names {
            let Some(link) = view.link(name) else {
                // Not linked: contributes nothing, the query still runs
                let err = link_not_found(&query.view, name);
                tracing::warn!(view = %query.view, collection = name, error = %err, "skipping collection");
                continue;
            };
            target.shards.extend(link.shards.iter().cloned());
            target
                .collections
                .insert(link.collection.name().clone(), link.collection.clone());
        }
        Ok(target)
    }
}

/// Enqueues one index operation per view linked to `collection`. Runs under the
/// collection shard lock so index queues see writes in storage order.
fn forward(
    catalog: &Catalog,
    collection: &str,
    shard: u32,
    submit: impl Fn(&ShardHandle) -> Result<CommitTick>,
) -> Result<Vec<PendingWrite>> {
    let mut pending = Vec::new();
    for view in catalog.views.values() {
        let Some(handle) = view.link(collection).and_then(|link| link.shard(shard)) else {
            continue;
        };
        let tick = submit(handle)?;
        pending.push(PendingWrite {
            shard: handle.clone(),
            tick,
            sync: view.commit_mode == CommitMode::Sync,
        });
    }
    Ok(pending)
}

fn fetch_documents(target: &QueryTarget, hits: &[Hit]) -> Vec<Arc<Document>> {
    // A hit whose document left storage after the index read is dropped
    hits.iter()
        .filter_map(|hit| {
            target
                .collections
                .get(&hit.shard.collection)?
                .get_by_id(hit.shard.shard, hit.doc_id)
        })
        .collect()
}

fn link_not_found(view: &str, collection: &str) -> Error {
    Error::new(
        ErrorKind::LinkNotFound,
        format!("collection '{}' is not linked to view '{}'", collection, view),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removed_documents_do_not_shorten_the_page() {
        let collection = Arc::new(Collection::new("c", CollectionOptions::new(1, 1)));
        let mut hits = Vec::new();
        for i in 0..4 {
            let (doc, ()) = collection
                .insert(serde_json::json!({"_key": format!("k{}", i)}), |_, _| ())
                .unwrap();
            hits.push(Hit {
                shard: ShardId::new(collection.name().clone(), 0),
                doc_id: doc.id,
                key: doc.key.clone(),
                sort_values: Vec::new(),
            });
        }
        collection.remove("k1", |_, _| ()).unwrap();

        let target = QueryTarget {
            shards: Vec::new(),
            collections: HashMap::from([(collection.name().clone(), collection.clone())]),
        };
        let page = apply_window(fetch_documents(&target, &hits), 1, Some(2));
        let keys: Vec<&str> = page.iter().map(|doc| doc.key.as_str()).collect();
        assert_eq!(keys, vec!["k2", "k3"]);
    }
}
