//! Structural lookups over a pipeline tree.
//!
//! Predicates receive the name a node is stored under in its parent's
//! `children` (the empty string for the root) and the node itself. All
//! traversals are depth-first pre-order in children insertion order.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use uuid::Uuid;

use super::node::PipelineNode;
use crate::job_data::{JobDataMap, JobLookup, JobName, ServerUrl};

/// First node matching `predicate`, the root included.
pub fn find_node<F>(tree: &PipelineNode, predicate: F) -> Option<&PipelineNode>
where
    F: Fn(&str, &PipelineNode) -> bool,
{
    fn find<'t>(
        name: &str,
        node: &'t PipelineNode,
        predicate: &dyn Fn(&str, &PipelineNode) -> bool,
    ) -> Option<&'t PipelineNode> {
        if predicate(name, node) {
            return Some(node);
        }
        node.children
            .iter()
            .find_map(|(child_name, child)| find(child_name, child, predicate))
    }

    find("", tree, &predicate)
}

/// Child names leading from the root to the first match.
///
/// `Some(vec![])` when the root itself matches, `None` when nothing does.
pub fn find_path<F>(tree: &PipelineNode, predicate: F) -> Option<Vec<String>>
where
    F: Fn(&str, &PipelineNode) -> bool,
{
    fn find(
        name: &str,
        node: &PipelineNode,
        predicate: &dyn Fn(&str, &PipelineNode) -> bool,
        path: &mut Vec<String>,
    ) -> bool {
        if predicate(name, node) {
            return true;
        }
        for (child_name, child) in &node.children {
            path.push(child_name.clone());
            if find(child_name, child, predicate, path) {
                return true;
            }
            path.pop();
        }
        false
    }

    let mut path = Vec::new();
    find("", tree, &predicate, &mut path).then_some(path)
}

/// Every matching node, including matches nested under other matches.
pub fn find_all<F>(tree: &PipelineNode, predicate: F) -> Vec<&PipelineNode>
where
    F: Fn(&str, &PipelineNode) -> bool,
{
    fn collect<'t>(
        name: &str,
        node: &'t PipelineNode,
        predicate: &dyn Fn(&str, &PipelineNode) -> bool,
        matches: &mut Vec<&'t PipelineNode>,
    ) {
        if predicate(name, node) {
            matches.push(node);
        }
        for (child_name, child) in &node.children {
            collect(child_name, child, predicate, matches);
        }
    }

    let mut matches = Vec::new();
    collect("", tree, &predicate, &mut matches);
    matches
}

/// Walks `path` down from `tree`.
pub fn node_at_path<'t, S: AsRef<str>>(
    tree: &'t PipelineNode,
    path: &[S],
) -> Option<&'t PipelineNode> {
    path.iter()
        .try_fold(tree, |node, step| node.children.get(step.as_ref()))
}

pub fn find_by_uuid(tree: &PipelineNode, uuid: Uuid) -> Option<&PipelineNode> {
    find_node(tree, |_, node| node.uuid == uuid)
}

/// Resolves a uuid taken from `old_tree` to the node at the same structural
/// path in `new_tree`.
///
/// Returns `None` when the uuid is unknown in `old_tree` or its path no
/// longer exists in `new_tree`; callers fall back to the whole tree.
pub fn translate_uuid<'n>(
    uuid: Uuid,
    old_tree: &PipelineNode,
    new_tree: &'n PipelineNode,
) -> Option<(Uuid, &'n PipelineNode)> {
    let path = find_path(old_tree, |_, node| node.uuid == uuid)?;
    node_at_path(new_tree, &path).map(|node| (node.uuid, node))
}

/// Name to server of every job node; the first occurrence of a name wins.
pub fn job_servers(tree: &PipelineNode) -> IndexMap<JobName, ServerUrl> {
    let mut jobs = IndexMap::new();
    for node in find_all(tree, |_, node| node.is_job()) {
        if let Some(server) = &node.server {
            jobs.entry(node.name.clone()).or_insert_with(|| server.clone());
        }
    }
    jobs
}

/// Distinct serials reported by the job nodes under `node`.
///
/// A job node that has a serial contributes it and its own subtree is not
/// searched further.
pub fn get_downstream_serials(node: &PipelineNode, job_data: &JobDataMap) -> BTreeSet<String> {
    fn collect(node: &PipelineNode, job_data: &JobDataMap, serials: &mut BTreeSet<String>) {
        if node.is_job() {
            if let Some(serial) = &job_data.record(&node.name).serial {
                serials.insert(serial.clone());
                return;
            }
        }
        for child in node.children.values() {
            collect(child, job_data, serials);
        }
    }

    let mut serials = BTreeSet::new();
    collect(node, job_data, &mut serials);
    serials
}
