//! Refresh orchestration: build the tree, fetch job data, follow downstream
//! jobs to a fixed point, then aggregate status.

use indexmap::IndexMap;
use log::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineDashError, Result};
use crate::job_data::{add_human_urls, JobDataMap, JobName, JobRecord, JobStatus, ServerUrl};
use crate::output::PhaseProgress;
use crate::pipeline::{self, PipelineNode};
use crate::providers::{DownstreamCache, JobSource};

#[derive(Debug, Clone, Copy, Default)]
pub struct DashboardOptions {
    /// Default `recurse` for top-level pipelines without a `$recurse` directive.
    pub recurse: bool,
    /// Draw phase spinners on stderr.
    pub progress: bool,
}

/// One loaded pipeline config and the result of its last refresh.
pub struct PipelineView {
    pub name: String,
    pub config: PipelineConfig,
    pub tree: PipelineNode,
    pub job_data: JobDataMap,
    /// Downstream jobs grafted by the last expansion, fetched up front on the
    /// next refresh.
    discovered: IndexMap<JobName, ServerUrl>,
    cache: DownstreamCache,
}

pub struct Dashboard<S: JobSource> {
    source: S,
    options: DashboardOptions,
    views: IndexMap<String, PipelineView>,
}

impl<S: JobSource> Dashboard<S> {
    pub fn new(source: S, options: DashboardOptions) -> Self {
        Self {
            source,
            options,
            views: IndexMap::new(),
        }
    }

    /// Adds a config and runs its first refresh cycle.
    pub async fn load(
        &mut self,
        name: String,
        config: PipelineConfig,
        cache: DownstreamCache,
    ) -> Result<&PipelineView> {
        if self.views.contains_key(&name) {
            return Err(PipelineDashError::Config(format!(
                "Pipeline config '{name}' is already loaded"
            )));
        }

        let discovered = cache.jobs().clone();
        let mut view = PipelineView {
            name: name.clone(),
            config,
            tree: PipelineNode::root(),
            job_data: JobDataMap::new(),
            discovered,
            cache,
        };
        run_cycle(&self.source, self.options, &mut view).await?;
        Ok(self.views.entry(name).or_insert(view))
    }

    /// Rebuilds and re-fetches the named view.
    ///
    /// Returns the tree it replaced, so callers holding uuids of the old tree
    /// can translate them with [`pipeline::translate_uuid`]. `&mut self`
    /// keeps two refreshes from overlapping.
    pub async fn refresh(&mut self, name: &str) -> Result<PipelineNode> {
        let view = self
            .views
            .get_mut(name)
            .ok_or_else(|| PipelineDashError::Config(format!("Unknown pipeline config '{name}'")))?;
        let previous = view.tree.clone();
        run_cycle(&self.source, self.options, view).await?;
        Ok(previous)
    }

    pub fn view(&self, name: &str) -> Option<&PipelineView> {
        self.views.get(name)
    }

    pub fn views(&self) -> impl Iterator<Item = &PipelineView> {
        self.views.values()
    }

    pub fn names(&self) -> Vec<String> {
        self.views.keys().cloned().collect()
    }
}

async fn run_cycle<S: JobSource>(
    source: &S,
    options: DashboardOptions,
    view: &mut PipelineView,
) -> Result<()> {
    let progress = PhaseProgress::start(
        3,
        &format!("Fetching jobs of {}", view.name),
        options.progress,
    );

    let mut tree = pipeline::build(&view.config, options.recurse)?;
    let recursing = !pipeline::find_all(&tree, |_, node| node.recurse).is_empty();

    let configured = pipeline::job_servers(&tree);
    let mut jobs = configured.clone();
    if recursing {
        for (name, server) in &view.discovered {
            jobs.entry(name.clone()).or_insert_with(|| server.clone());
        }
    }
    info!("Fetching {} jobs for '{}'", jobs.len(), view.name);
    let mut job_data = fetch_complete(source, &jobs).await;

    let progress = progress.next("Fetched jobs", "Expanding downstream jobs");
    if recursing {
        expand_downstream(source, &mut tree, &mut job_data).await;
        // Jobs no longer triggered drop out here.
        view.discovered = pipeline::job_servers(&tree)
            .into_iter()
            .filter(|(name, _)| !configured.contains_key(name))
            .collect();
        if let Err(e) = view.cache.save(&view.discovered) {
            warn!("Failed to save downstream cache for '{}': {e}", view.name);
        }
    }

    let progress = progress.next("Expanded downstream jobs", "Aggregating status");
    add_human_urls(&mut job_data, &view.config.url_translate);
    pipeline::calculate_status(&mut tree, &job_data);
    progress.finish("Aggregated status");

    debug!("'{}' has {} nodes", view.name, tree.node_count());
    view.tree = tree;
    view.job_data = job_data;
    Ok(())
}

/// Grafts known downstream jobs and fetches newly discovered ones until
/// nothing new turns up.
async fn expand_downstream<S: JobSource>(
    source: &S,
    tree: &mut PipelineNode,
    job_data: &mut JobDataMap,
) {
    pipeline::expand(tree, job_data);

    let mut round = 0;
    loop {
        let to_fetch = pipeline::discover_new(tree, job_data);
        if to_fetch.is_empty() {
            break;
        }
        round += 1;
        info!("Downstream round {round}: fetching {} jobs", to_fetch.len());

        job_data.extend(fetch_complete(source, &to_fetch).await);
        pipeline::expand(tree, job_data);
    }
}

/// `fetch_all`, with an UNDEFINED record filled in for any name the source
/// left out. Every requested name ends up in the map, which is what lets the
/// expansion loop terminate.
async fn fetch_complete<S: JobSource>(
    source: &S,
    jobs: &IndexMap<JobName, ServerUrl>,
) -> JobDataMap {
    let mut job_data = source.fetch_all(jobs).await;
    for (name, server) in jobs {
        job_data.entry(name.clone()).or_insert_with(|| {
            warn!("No record returned for job '{name}'");
            let mut record = JobRecord::new(name.clone(), JobStatus::Undefined);
            record.server = Some(server.clone());
            record
        });
    }
    job_data
}
