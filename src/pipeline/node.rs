use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::job_data::{JobName, JobStatus, ServerUrl};

/// A node of the pipeline ownership tree.
///
/// Job nodes carry a `server` and map onto exactly one job record by `name`;
/// group nodes only organise their children. The root is a group node with an
/// empty name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineNode {
    pub name: String,
    /// Per-instance handle; a rebuilt tree gets fresh uuids
    pub uuid: Uuid,
    pub children: IndexMap<String, PipelineNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerUrl>,
    #[serde(default)]
    pub recurse: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downstream_status: Option<JobStatus>,
}

impl PipelineNode {
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uuid: Uuid::new_v4(),
            children: IndexMap::new(),
            server: None,
            recurse: false,
            label: None,
            status: None,
            downstream_status: None,
        }
    }

    pub fn job(name: impl Into<JobName>, server: impl Into<ServerUrl>) -> Self {
        Self {
            server: Some(server.into()),
            ..Self::group(name)
        }
    }

    pub fn root() -> Self {
        Self::group("")
    }

    pub fn with_recurse(mut self, recurse: bool) -> Self {
        self.recurse = recurse;
        self
    }

    #[cfg(test)]
    pub fn with_child(mut self, child: PipelineNode) -> Self {
        self.insert_child(child);
        self
    }

    pub fn is_job(&self) -> bool {
        self.server.is_some()
    }

    /// Label override if set, else the node name.
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    /// Add `child`, merging it into an existing child of the same name.
    pub fn insert_child(&mut self, child: PipelineNode) {
        match self.children.get_mut(&child.name) {
            Some(existing) => existing.merge(child),
            None => {
                self.children.insert(child.name.clone(), child);
            }
        }
    }

    /// Additive merge: children are unioned recursively.
    ///
    /// Scalar fields already set on `self` win; unset ones are taken from
    /// `other`. `recurse` is set if either side sets it. The uuid of `self`
    /// is kept.
    pub fn merge(&mut self, other: PipelineNode) {
        if self.server.is_none() {
            self.server = other.server;
        }
        if self.label.is_none() {
            self.label = other.label;
        }
        self.recurse |= other.recurse;
        for child in other.children.into_values() {
            self.insert_child(child);
        }
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        1 + self.children.values().map(PipelineNode::node_count).sum::<usize>()
    }
}
