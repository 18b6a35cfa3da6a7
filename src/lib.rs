pub mod core;
pub mod storage;
pub mod analysis;
pub mod schema;
pub mod index;
pub mod scoring;
pub mod search;
pub mod query;
pub mod mvcc;
pub mod writer;
pub mod parallel;

pub use crate::core::config::{Config, ScoringStatsMode};
pub use crate::core::database::{Database, WriteOptions};
pub use crate::core::error::{Error, ErrorKind, Result};
pub use crate::core::view::{CommitMode, ViewProperties};
pub use crate::query::ast::{Expr, FieldRef, Predicate, SortExpr, SortOrder};
pub use crate::query::binder::Bindings;
pub use crate::query::request::{Consistency, ViewQuery};
pub use crate::schema::link::LinkConfig;
pub use crate::search::results::QueryResult;
pub use crate::storage::collection::CollectionOptions;

/*
┌──────────────────────────────────────────────────────────────────────────────────────┐
│                              SEARCHVIEW ARCHITECTURE                                 │
└──────────────────────────────────────────────────────────────────────────────────────┘

┌────────────────────────────────────── CORE LAYER ───────────────────────────────────┐
│  struct Database                                                                     │
│  • config: Arc<Config>                 // shards, timeouts, scoring stats mode       │
│  • analyzers: Arc<AnalyzerRegistry>    // name -> Analyzer, read-mostly              │
│  • catalog: RwLock<Catalog>            // collections + views (links)                │
│  • indexer: ParallelIndexer            // rayon pool, link backfill                  │
│  • coordinator: Coordinator            // fan-out + merge                            │
│                                                                                      │
│  struct View { links: BTreeMap<collection, ViewLink> }                               │
│  struct ViewLink { collection, config: LinkConfig, shards: Vec<Arc<ShardHandle>> }   │
└──────────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────────── WRITE PATH ─────────────────────────────────────┐
│  Collection::insert/replace/remove  (collection shard lock held)                     │
│        │                                                                             │
│        ▼  IndexOp { doc, tick }                                                      │
│  ShardHandle ── mpsc ──► IndexWorker: DocumentIndexer::analyze, ShardIndex::apply   │
│        │                                  (one write lock per document)              │
│        ▼                                                                             │
│  CommitController: watch<applied tick>  ◄── waitForSync / Consistency::WaitForSync   │
└──────────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────────── INDEX LAYER ────────────────────────────────────┐
│  struct ShardIndex                                                                   │
│  • fields: (field) -> { analyzer -> InvertedIndex, NumericIndex, BoolIndex,          │
│                         null docs, KindIndex }                                       │
│  • snapshots: DocId -> DocSnapshot     // raw scalars for sorting                    │
│  • universe: RoaringTreemap            // every indexed doc, basis for NOT           │
│                                                                                      │
│  InvertedIndex: BTreeMap<term, PostingList>  (lookup, range, prefix, positions)      │
└──────────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────────── QUERY PATH ─────────────────────────────────────┐
│  ViewQuery + Bindings                                                                │
│        │  FilterCompiler (Binder folds vars/CONCAT/TOKENS, AnalyzerContext by value)│
│        ▼                                                                             │
│  CompiledQuery { root: PlanNode, scoring_terms, sort }                               │
│        │  Coordinator: [sync] -> [global ScoringStats] -> JoinSet fan-out            │
│        ▼                                                                             │
│  ShardExecutor (Compiled -> Running -> Completed | Failed)                           │
│        │  RoaringTreemap set algebra, phrase check, TF-IDF/BM25, local sort/limit    │
│        ▼                                                                             │
│  ShardResponse ... ──► k-way merge ──► offset/limit ──► QueryResult                  │
└──────────────────────────────────────────────────────────────────────────────────────┘
*/
