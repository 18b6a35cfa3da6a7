use std::collections::BTreeMap;
use std::sync::Arc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::core::error::Result;
use crate::schema::link::LinkConfig;
use crate::storage::collection::Collection;
use crate::writer::index_worker::ShardHandle;

pub const ARANGOSEARCH_VIEW_TYPE: &str = "arangosearch";

/// When a write through a linked collection becomes visible to view queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitMode {
    /// Writes are acknowledged before the shard indexes applied them
    #[default]
    Eventual,
    /// Writes are acknowledged once every linked shard index applied them
    Sync,
}

/// Persisted/updatable view definition.
///
/// `{links: {<collection>: <LinkConfig> | null}, commitMode: "eventual" | "sync"}`.
/// A `null` link removes the link on update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewProperties {
    #[serde(default)]
    pub links: BTreeMap<String, Option<LinkConfig>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_mode: Option<CommitMode>,
}

impl ViewProperties {
    pub fn new() -> Self {
        ViewProperties::default()
    }

    pub fn link(mut self, collection: &str, config: LinkConfig) -> Self {
        self.links.insert(collection.to_string(), Some(config));
        self
    }

    pub fn unlink(mut self, collection: &str) -> Self {
        self.links.insert(collection.to_string(), None);
        self
    }

    pub fn commit_mode(mut self, mode: CommitMode) -> Self {
        self.commit_mode = Some(mode);
        self
    }

    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// An active link: one index shard per collection shard
pub struct ViewLink {
    pub collection: Arc<Collection>,
    pub config: Arc<LinkConfig>,
    pub shards: Vec<Arc<ShardHandle>>,
}

impl ViewLink {
    pub fn shard(&self, shard: u32) -> Option<&Arc<ShardHandle>> {
        self.shards.get(shard as usize)
    }
}

pub struct View {
    pub name: String,
    pub id: Uuid,
    pub commit_mode: CommitMode,
    pub links: BTreeMap<String, ViewLink>,
}

impl View {
    pub fn new(name: &str) -> Self {
        View {
            name: name.to_string(),
            id: Uuid::new_v4(),
            commit_mode: CommitMode::default(),
            links: BTreeMap::new(),
        }
    }

    pub fn view_type(&self) -> &'static str {
        ARANGOSEARCH_VIEW_TYPE
    }

    pub fn link(&self, collection: &str) -> Option<&ViewLink> {
        self.links.get(collection)
    }

    pub fn properties(&self) -> ViewProperties {
        ViewProperties {
            links: self
                .links
                .iter()
                .map(|(name, link)| (name.clone(), Some(link.config.as_ref().clone())))
                .collect(),
            commit_mode: Some(self.commit_mode),
        }
    }
}
