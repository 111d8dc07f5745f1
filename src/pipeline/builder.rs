use log::debug;
use serde_yaml::Value;

use super::node::PipelineNode;
use crate::config::{value_kind, Directive, PipelineConfig};
use crate::error::{PipelineDashError, Result};

/// Marks a name as a pure grouping node; stripped from the emitted name.
const TRANSPARENT_PREFIX: char = '.';

/// Values inherited from ancestors while descending the config.
#[derive(Debug, Clone, Copy)]
struct Scope<'a> {
    server: &'a str,
    recurse: bool,
}

/// Directive values found directly on one config mapping.
#[derive(Debug, Default)]
struct NodeDirectives {
    label: Option<String>,
    recurse: Option<bool>,
}

/// Builds the pipeline tree for a validated config.
///
/// `recurse` is the setting inherited by top-level pipelines that carry no
/// `$recurse` directive of their own.
///
/// Groups that appear under several servers are merged: their children are
/// the union of every server's contribution. Shape violations that validation
/// should have caught are returned as [`PipelineDashError::InvalidPipeline`].
pub fn build(config: &PipelineConfig, recurse: bool) -> Result<PipelineNode> {
    let mut root = PipelineNode::root();

    for (server, server_config) in &config.servers {
        let scope = Scope { server, recurse };
        let path = format!("servers:{server}:pipelines");
        for child in build_children(&path, &server_config.pipelines, scope)? {
            root.insert_child(child);
        }
    }

    debug!(
        "Built pipeline tree with {} nodes from {} servers",
        root.node_count(),
        config.servers.len()
    );

    Ok(root)
}

fn build_children(path: &str, value: &Value, scope: Scope<'_>) -> Result<Vec<PipelineNode>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Mapping(map) => {
            let mut children = Vec::with_capacity(map.len());
            for (key, child) in map {
                let key = key
                    .as_str()
                    .ok_or_else(|| invalid(path, format!("key {key:?} is not a string")))?;
                if Directive::is_directive_key(key) {
                    continue;
                }
                children.push(build_node(&format!("{path}:{key}"), key, child, scope)?);
            }
            Ok(children)
        }
        Value::Sequence(items) => {
            let mut children = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                let entry_path = format!("{path}[{index}]");
                let key = list_entry_name(&entry_path, item)?;
                if Directive::is_directive_key(key) {
                    continue;
                }
                children.push(build_node(&entry_path, key, &Value::Null, scope)?);
            }
            Ok(children)
        }
        other => Err(invalid(
            path,
            format!("expected mapping, list or null, found {}", value_kind(other)),
        )),
    }
}

fn build_node(path: &str, key: &str, value: &Value, scope: Scope<'_>) -> Result<PipelineNode> {
    let directives = read_directives(path, value)?;

    let mut node = match key.strip_prefix(TRANSPARENT_PREFIX) {
        Some(name) => PipelineNode::group(name),
        None => PipelineNode::job(key, scope.server),
    };
    if node.name.is_empty() {
        return Err(invalid(path, "empty pipeline name".to_string()));
    }

    // Nearest explicit setting wins, otherwise inherit.
    node.recurse = directives.recurse.unwrap_or(scope.recurse);
    node.label = directives.label;

    let child_scope = Scope {
        recurse: node.recurse,
        ..scope
    };
    for child in build_children(path, value, child_scope)? {
        node.insert_child(child);
    }

    Ok(node)
}

fn read_directives(path: &str, value: &Value) -> Result<NodeDirectives> {
    let mut directives = NodeDirectives::default();
    let Value::Mapping(map) = value else {
        return Ok(directives);
    };

    for (key, directive_value) in map {
        let Some(key) = key.as_str().filter(|k| Directive::is_directive_key(k)) else {
            continue;
        };
        let directive_path = format!("{path}:{key}");
        match Directive::from_key(key) {
            Some(Directive::Label) => {
                let label = directive_value
                    .as_str()
                    .ok_or_else(|| invalid(&directive_path, "expected string".to_string()))?;
                directives.label = Some(label.to_string());
            }
            Some(Directive::Recurse) => {
                let recurse = directive_value
                    .as_bool()
                    .ok_or_else(|| invalid(&directive_path, "expected bool".to_string()))?;
                directives.recurse = Some(recurse);
            }
            None => return Err(invalid(&directive_path, "unknown directive".to_string())),
        }
    }

    Ok(directives)
}

/// List entries are bare names, or mappings whose first key is the name.
fn list_entry_name<'v>(path: &str, item: &'v Value) -> Result<&'v str> {
    match item {
        Value::String(name) => Ok(name.as_str()),
        Value::Mapping(map) => map
            .keys()
            .next()
            .and_then(Value::as_str)
            .ok_or_else(|| invalid(path, "mapping entry without a string key".to_string())),
        other => Err(invalid(
            path,
            format!("expected job name, found {}", value_kind(other)),
        )),
    }
}

fn invalid(path: &str, message: String) -> PipelineDashError {
    PipelineDashError::InvalidPipeline {
        path: path.to_string(),
        message,
    }
}
