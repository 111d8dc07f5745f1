use indexmap::IndexMap;
use log::debug;

use super::node::PipelineNode;
use super::query::find_all;
use crate::job_data::{JobDataMap, JobLookup, JobName, ServerUrl};

/// Grafts the downstream jobs listed in `job_data` below every job node that
/// has `recurse` set, recursing into the grafted nodes as well.
///
/// An existing child of the same name is kept as is; only a missing `server`
/// is filled in. A job is never grafted below itself or one of its job
/// ancestors, so cyclic trigger relationships stay finite. Group names do not
/// block a graft. Returns the number of nodes
/// added; running it again with the same data adds nothing.
pub fn expand(tree: &mut PipelineNode, job_data: &JobDataMap) -> usize {
    let mut ancestors = Vec::new();
    let added = graft(tree, job_data, &mut ancestors);
    if added > 0 {
        debug!("Grafted {added} downstream jobs");
    }
    added
}

fn graft(node: &mut PipelineNode, job_data: &JobDataMap, ancestors: &mut Vec<String>) -> usize {
    let mut added = 0;

    if node.is_job() && node.recurse {
        for (name, server) in &job_data.record(&node.name).downstream {
            if *name == node.name || ancestors.contains(name) {
                continue;
            }
            let child = node.children.entry(name.clone()).or_insert_with(|| {
                added += 1;
                PipelineNode::job(name.clone(), server.clone()).with_recurse(true)
            });
            if child.server.is_none() {
                child.server = Some(server.clone());
            }
        }
    }

    let is_job = node.is_job();
    if is_job {
        ancestors.push(node.name.clone());
    }
    for child in node.children.values_mut() {
        added += graft(child, job_data, ancestors);
    }
    if is_job {
        ancestors.pop();
    }

    added
}

/// Downstream jobs of recurse-enabled job nodes that have no record yet.
///
/// This is the next fetch round of the expansion loop; an empty result means
/// the tree has reached its fixed point.
pub fn discover_new(tree: &PipelineNode, job_data: &JobDataMap) -> IndexMap<JobName, ServerUrl> {
    let mut to_fetch = IndexMap::new();
    for node in find_all(tree, |_, node| node.is_job() && node.recurse) {
        for (name, server) in &job_data.record(&node.name).downstream {
            if !job_data.contains_key(name) {
                to_fetch
                    .entry(name.clone())
                    .or_insert_with(|| server.clone());
            }
        }
    }
    to_fetch
}
