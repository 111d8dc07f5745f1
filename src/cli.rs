use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{error, info, warn};
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

use crate::auth::Credentials;
use crate::config::PipelineConfig;
use crate::dashboard::{Dashboard, DashboardOptions};
use crate::output::{bright_red, export_json, render_report, PipelineReport};
use crate::pipeline::{self, PipelineNode};
use crate::providers::{DownstreamCache, JenkinsClient};

#[derive(Parser)]
#[command(name = "pipeline-dash")]
#[command(author, version, about = "Jenkins pipeline status dashboard", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Debug logging; `RUST_LOG` takes precedence
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Args)]
struct FetchArgs {
    /// Pipeline config files (YAML, JSON or TOML)
    #[arg(required = true)]
    configs: Vec<PathBuf>,

    /// Follow downstream jobs of pipelines without a `$recurse` directive
    #[arg(short, long, default_value_t = false)]
    recurse: bool,

    /// Show only this node: a slash-separated path such as `stage1/build`,
    /// or a bare node name
    #[arg(short, long)]
    focus: Option<String>,

    /// YAML, JSON or TOML file with the Jenkins `user` and `token`
    #[arg(short, long, env = "PIPELINE_DASH_USER_FILE")]
    user_file: Option<PathBuf>,

    /// Do not read or write the downstream job cache
    #[arg(long, default_value_t = false)]
    no_cache: bool,

    /// Delete the downstream job cache of each config before loading it
    #[arg(long, default_value_t = false)]
    clear_cache: bool,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch job status once and print a report
    Report {
        #[command(flatten)]
        fetch: FetchArgs,

        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,

        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(short, long, default_value_t = false)]
        pretty: bool,
    },
    /// Refresh on a timer, printing a report after every refresh
    Watch {
        #[command(flatten)]
        fetch: FetchArgs,

        /// Seconds between refreshes
        #[arg(short, long, default_value_t = 60)]
        interval: u64,

        /// Stop after this many reports
        #[arg(short = 'n', long)]
        iterations: Option<usize>,
    },
    /// Load and validate pipeline configs without contacting Jenkins
    Validate {
        #[arg(required = true)]
        configs: Vec<PathBuf>,
    },
}

impl Cli {
    pub async fn execute(&self) -> Result<()> {
        match &self.command {
            Commands::Report {
                fetch,
                format,
                output,
                pretty,
            } => execute_report(fetch, *format, output.as_ref(), *pretty).await,
            Commands::Watch {
                fetch,
                interval,
                iterations,
            } => execute_watch(fetch, *interval, *iterations).await,
            Commands::Validate { configs } => execute_validate(configs),
        }
    }
}

async fn execute_report(
    fetch: &FetchArgs,
    format: OutputFormat,
    output: Option<&PathBuf>,
    pretty: bool,
) -> Result<()> {
    let dashboard = open_dashboard(fetch).await?;
    let focus = fetch.focus.as_deref();

    let mut buffer = Vec::new();
    match format {
        OutputFormat::Table => {
            for view in dashboard.views() {
                let subtree = resolve_focus(&view.tree, focus);
                let report = render_report(&view.name, subtree, &view.job_data, Utc::now());
                writeln!(buffer, "{report}")?;
            }
        }
        OutputFormat::Json => {
            let reports: Vec<_> = dashboard
                .views()
                .map(|view| {
                    PipelineReport::new(&view.name, resolve_focus(&view.tree, focus), &view.job_data)
                })
                .collect();
            export_json(&reports, pretty, &mut buffer)?;
        }
    }

    if let Some(output_path) = output {
        std::fs::write(output_path, buffer)
            .with_context(|| format!("Failed to write report: {}", output_path.display()))?;
        info!("Report written to: {}", output_path.display());
    } else {
        std::io::stdout().lock().write_all(&buffer)?;
    }

    Ok(())
}

async fn execute_watch(fetch: &FetchArgs, interval: u64, iterations: Option<usize>) -> Result<()> {
    let mut dashboard = open_dashboard(fetch).await?;

    // Focused node per config, as a uuid of its current tree.
    let mut focus: HashMap<String, Uuid> = dashboard
        .views()
        .map(|view| {
            let node = resolve_focus(&view.tree, fetch.focus.as_deref());
            (view.name.clone(), node.uuid)
        })
        .collect();

    let mut reports = 0;
    loop {
        for view in dashboard.views() {
            let subtree = focus
                .get(&view.name)
                .and_then(|uuid| pipeline::find_by_uuid(&view.tree, *uuid))
                .unwrap_or(&view.tree);
            println!("{}", render_report(&view.name, subtree, &view.job_data, Utc::now()));
        }

        reports += 1;
        if iterations.is_some_and(|limit| reports >= limit) {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_secs(interval)).await;

        for name in dashboard.names() {
            let previous = match dashboard.refresh(&name).await {
                Ok(previous) => previous,
                Err(e) => {
                    error!("Failed to refresh '{name}': {e}");
                    continue;
                }
            };
            let (Some(view), Some(&uuid)) = (dashboard.view(&name), focus.get(&name)) else {
                continue;
            };
            let new_uuid = match pipeline::translate_uuid(uuid, &previous, &view.tree) {
                Some((new_uuid, _)) => new_uuid,
                None => {
                    warn!("Focused node of '{name}' no longer exists, showing the whole tree");
                    view.tree.uuid
                }
            };
            focus.insert(name, new_uuid);
        }
    }
}

fn execute_validate(configs: &[PathBuf]) -> Result<()> {
    let mut failures = 0;

    for path in configs {
        let checked = PipelineConfig::load(path).and_then(|config| {
            config.validate()?;
            let tree = pipeline::build(&config, false)?;
            Ok((config.display_name(path), tree))
        });
        match checked {
            Ok((name, tree)) => println!(
                "✓ {name}: {} nodes, {} jobs",
                tree.node_count() - 1,
                pipeline::job_servers(&tree).len()
            ),
            Err(e) => {
                failures += 1;
                eprintln!("{} {}:\n{e:#}", bright_red("✗"), path.display());
            }
        }
    }

    if failures > 0 {
        bail!("{failures} of {} pipeline configs are invalid", configs.len());
    }
    Ok(())
}

async fn open_dashboard(fetch: &FetchArgs) -> Result<Dashboard<JenkinsClient>> {
    let credentials = match &fetch.user_file {
        Some(path) => {
            let credentials = Credentials::load(path)?;
            if credentials.is_none() {
                warn!(
                    "User file {} has no user/token pair, continuing without auth",
                    path.display()
                );
            }
            credentials
        }
        None => None,
    };

    let options = DashboardOptions {
        recurse: fetch.recurse,
        progress: console::Term::stderr().is_term(),
    };
    let mut dashboard = Dashboard::new(JenkinsClient::new(credentials)?, options);

    for path in &fetch.configs {
        let config = match PipelineConfig::load(path).and_then(|config| {
            config.validate()?;
            Ok(config)
        }) {
            Ok(config) => config,
            Err(e) => {
                error!("Skipping {}: {e:#}", path.display());
                continue;
            }
        };
        let name = config.display_name(path);

        if fetch.clear_cache {
            DownstreamCache::clear(&name)?;
        }
        let cache = DownstreamCache::new(&name, !fetch.no_cache).unwrap_or_else(|e| {
            warn!("Downstream cache unavailable for '{name}': {e}");
            DownstreamCache::disabled()
        });

        if let Err(e) = dashboard.load(name.clone(), config, cache).await {
            error!("Failed to load '{name}': {e}");
        }
    }

    if dashboard.views().next().is_none() {
        bail!("No pipeline configs could be loaded");
    }
    Ok(dashboard)
}

/// Node named by `focus`, falling back to the whole tree.
///
/// `focus` is tried as a slash-separated path first, then as a node name.
fn resolve_focus<'t>(tree: &'t PipelineNode, focus: Option<&str>) -> &'t PipelineNode {
    let Some(focus) = focus else {
        return tree;
    };
    let steps: Vec<&str> = focus.split('/').filter(|step| !step.is_empty()).collect();
    pipeline::node_at_path(tree, &steps)
        .or_else(|| pipeline::find_node(tree, |name, _| name == focus))
        .unwrap_or_else(|| {
            warn!("No pipeline node at '{focus}', showing the whole tree");
            tree
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> PipelineNode {
        PipelineNode::root().with_child(
            PipelineNode::group("stage1")
                .with_child(PipelineNode::job("build", "http://s"))
                .with_child(PipelineNode::job("test", "http://s")),
        )
    }

    #[test]
    fn test_resolve_focus_by_path() {
        let tree = tree();
        assert_eq!(resolve_focus(&tree, Some("stage1/test")).name, "test");
        assert_eq!(resolve_focus(&tree, Some("/stage1/")).name, "stage1");
    }

    #[test]
    fn test_resolve_focus_by_name() {
        let tree = tree();
        assert_eq!(resolve_focus(&tree, Some("build")).name, "build");
    }

    #[test]
    fn test_resolve_focus_falls_back_to_tree() {
        let tree = tree();
        assert_eq!(resolve_focus(&tree, None).uuid, tree.uuid);
        assert_eq!(resolve_focus(&tree, Some("stage1/nope")).uuid, tree.uuid);
    }

    #[test]
    fn test_cli_parses_report() {
        let cli = Cli::try_parse_from([
            "pipeline-dash",
            "report",
            "nightly.yaml",
            "--recurse",
            "--format",
            "json",
            "--focus",
            "stage1/build",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        let Commands::Report { fetch, format, .. } = cli.command else {
            panic!("Expected report command");
        };
        assert!(fetch.recurse);
        assert!(matches!(format, OutputFormat::Json));
        assert_eq!(fetch.focus.as_deref(), Some("stage1/build"));
    }

    #[test]
    fn test_cli_requires_configs() {
        assert!(Cli::try_parse_from(["pipeline-dash", "watch"]).is_err());
    }
}
