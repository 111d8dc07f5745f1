use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::path::Path;
use url::Url;

use crate::error::PipelineDashError;

/// Leading character of every reserved directive key.
pub const DIRECTIVE_SIGIL: char = '$';

/// Reserved keys that configure the enclosing pipeline node instead of naming a child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// `$label`: display text for the node
    Label,
    /// `$recurse`: graft downstream jobs below job nodes, inherited by descendants
    Recurse,
}

impl Directive {
    pub const ALL: [Directive; 2] = [Directive::Label, Directive::Recurse];

    pub fn key(self) -> &'static str {
        match self {
            Self::Label => "$label",
            Self::Recurse => "$recurse",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.key() == key)
    }

    pub fn is_directive_key(key: &str) -> bool {
        key.starts_with(DIRECTIVE_SIGIL)
    }
}

/// A pipeline config document.
///
/// ```yaml
/// name: nightly
/// url_translate:
///   "http://jenkins.internal": "https://jenkins.example.com"
/// servers:
///   "http://jenkins.internal":
///     pipelines:
///       .stage1:
///         $recurse: true
///         build-job:
///       stage2: [test-a, test-b]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Display name; defaults to the file name
    #[serde(default)]
    pub name: Option<String>,

    /// Find/replace pairs turning API urls into browsable urls
    #[serde(default)]
    pub url_translate: IndexMap<String, String>,

    /// Jenkins server url to the pipelines hosted on it
    pub servers: IndexMap<String, ServerConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Nested mapping, list or null; interpreted by the pipeline builder
    #[serde(default)]
    pub pipelines: Value,
}

impl PipelineConfig {
    /// Load a pipeline config from a specific file path.
    ///
    /// The format is picked from the extension; unknown extensions try YAML,
    /// then JSON, then TOML.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline config: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            _ => serde_yaml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| toml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display())),
        }
    }

    /// Name shown for this config: the `name` field, else the file name.
    pub fn display_name(&self, path: &Path) -> String {
        self.name.clone().unwrap_or_else(|| {
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string())
        })
    }

    /// Check the document shape before it reaches the pipeline builder.
    ///
    /// Every violation is reported, one per line, in a single `Config` error.
    pub fn validate(&self) -> crate::error::Result<()> {
        let issues = self.collect_issues();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(PipelineDashError::Config(issues.join("\n")))
        }
    }

    fn collect_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.servers.is_empty() {
            issues.push("servers: at least one server is required".to_string());
        }

        for (server, server_config) in &self.servers {
            let valid_url = Url::parse(server)
                .map(|url| matches!(url.scheme(), "http" | "https"))
                .unwrap_or(false);
            if !valid_url {
                issues.push(format!("servers:{server}: not an http(s) url"));
            }
            check_pipeline(
                &format!("servers:{server}:pipelines"),
                &server_config.pipelines,
                &mut issues,
            );
        }

        issues
    }
}

fn check_pipeline(path: &str, value: &Value, issues: &mut Vec<String>) {
    match value {
        Value::Null => {}
        Value::Mapping(map) => {
            for (key, child) in map {
                let Some(key) = key.as_str() else {
                    issues.push(format!("{path}: key {key:?} is not a string"));
                    continue;
                };
                let child_path = format!("{path}:{key}");
                if Directive::is_directive_key(key) {
                    check_directive(&child_path, key, child, issues);
                } else {
                    check_pipeline(&child_path, child, issues);
                }
            }
        }
        Value::Sequence(items) => {
            for (index, item) in items.iter().enumerate() {
                let valid = match item {
                    Value::String(_) => true,
                    Value::Mapping(map) => map.keys().next().is_some_and(Value::is_string),
                    _ => false,
                };
                if !valid {
                    issues.push(format!(
                        "{path}[{index}]: list entries must be job names or single-key mappings"
                    ));
                }
            }
        }
        other => issues.push(format!(
            "{path}: expected mapping, list or null, found {}",
            value_kind(other)
        )),
    }
}

fn check_directive(path: &str, key: &str, value: &Value, issues: &mut Vec<String>) {
    match Directive::from_key(key) {
        Some(Directive::Label) if !value.is_string() => {
            issues.push(format!("{path}: expected string, found {}", value_kind(value)));
        }
        Some(Directive::Recurse) if !value.is_bool() => {
            issues.push(format!("{path}: expected bool, found {}", value_kind(value)));
        }
        Some(_) => {}
        None => {
            let valid: Vec<_> = Directive::ALL.iter().map(|d| d.key()).collect();
            issues.push(format!(
                "{path}: unknown directive, expected one of {}",
                valid.join(", ")
            ));
        }
    }
}

pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "list",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}
