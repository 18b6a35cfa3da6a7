use std::time::Duration;
use crate::query::ast::{Predicate, SortExpr};

/// Whether a query must observe every write acknowledged before it started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Consistency {
    #[default]
    Eventual,
    WaitForSync,
}

/// `FOR doc IN VIEW <view> FILTER .. SORT .. LIMIT offset, limit`
#[derive(Debug, Clone)]
pub struct ViewQuery {
    pub view: String,
    pub filter: Option<Predicate>,
    pub sort: Vec<SortExpr>,
    pub offset: usize,
    pub limit: Option<usize>,
    pub consistency: Consistency,
    pub collections: Option<Vec<String>>,  // restrict to these linked collections
    pub timeout: Option<Duration>,         // per-shard deadline, overrides the config
}

impl ViewQuery {
    pub fn new(view: &str) -> Self {
        ViewQuery {
            view: view.to_string(),
            filter: None,
            sort: Vec::new(),
            offset: 0,
            limit: None,
            consistency: Consistency::Eventual,
            collections: None,
            timeout: None,
        }
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(predicate);
        self
    }

    pub fn sort(mut self, sort: SortExpr) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn limit(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }

    pub fn wait_for_sync(mut self) -> Self {
        self.consistency = Consistency::WaitForSync;
        self
    }

    pub fn collections<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.collections = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
