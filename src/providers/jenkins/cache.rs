use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use log::{debug, info, warn};

use crate::error::{PipelineDashError, Result};
use crate::job_data::{JobName, ServerUrl};

/// Downstream jobs discovered by earlier runs, per pipeline config.
///
/// Seeding the first fetch with these saves one expansion round per level of
/// downstream jobs. Files live in the platform cache directory:
/// - Linux: `~/.cache/pipeline-dash/jenkins/{config-slug}.json`
/// - macOS: `~/Library/Caches/pipeline-dash/jenkins/{config-slug}.json`
pub struct DownstreamCache {
    cache_file: PathBuf,
    jobs: IndexMap<JobName, ServerUrl>,
    enabled: bool,
}

impl DownstreamCache {
    /// Opens the cache for `config_key`, loading what earlier runs saved.
    ///
    /// # Errors
    ///
    /// Returns error if the cache directory cannot be determined or created.
    pub fn new(config_key: &str, enabled: bool) -> Result<Self> {
        if !enabled {
            debug!("Downstream cache disabled");
            return Ok(Self::disabled());
        }
        let cache = Self::in_dir(&cache_dir()?, config_key)?;
        info!("Downstream cache enabled at: {}", cache.cache_file.display());
        Ok(cache)
    }

    pub fn disabled() -> Self {
        Self {
            cache_file: PathBuf::new(),
            jobs: IndexMap::new(),
            enabled: false,
        }
    }

    pub fn in_dir(dir: &Path, config_key: &str) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let cache_file = dir.join(cache_filename(config_key));

        let jobs = if cache_file.exists() {
            fs::read_to_string(&cache_file)
                .ok()
                .and_then(|content| serde_json::from_str(&content).ok())
                .inspect(|_| debug!("Loaded cache from: {}", cache_file.display()))
                .unwrap_or_else(|| {
                    warn!("Failed to load cache, starting with empty cache");
                    IndexMap::new()
                })
        } else {
            IndexMap::new()
        };

        Ok(Self {
            cache_file,
            jobs,
            enabled: true,
        })
    }

    /// Jobs saved by the last run; empty when disabled.
    pub fn jobs(&self) -> &IndexMap<JobName, ServerUrl> {
        &self.jobs
    }

    /// Replaces the cached jobs and writes them to disk.
    pub fn save(&mut self, jobs: &IndexMap<JobName, ServerUrl>) -> Result<()> {
        if !self.enabled || *jobs == self.jobs {
            return Ok(());
        }

        let content = serde_json::to_string(jobs)?;
        fs::write(&self.cache_file, content)?;
        self.jobs = jobs.clone();

        debug!(
            "Saved {} downstream jobs to cache: {}",
            jobs.len(),
            self.cache_file.display()
        );
        Ok(())
    }

    /// Removes the cache file of `config_key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache file cannot be removed.
    pub fn clear(config_key: &str) -> Result<()> {
        clear_in_dir(&cache_dir()?, config_key)
    }
}

fn cache_dir() -> Result<PathBuf> {
    Ok(dirs::cache_dir()
        .ok_or_else(|| PipelineDashError::Cache("No cache directory found".into()))?
        .join("pipeline-dash")
        .join("jenkins"))
}

fn clear_in_dir(dir: &Path, config_key: &str) -> Result<()> {
    let cache_file = dir.join(cache_filename(config_key));
    if cache_file.exists() {
        fs::remove_file(&cache_file)?;
        info!("Cache cleared: {}", cache_file.display());
    } else {
        info!("No cache file found for config: {config_key}");
    }
    Ok(())
}

/// `"My Pipeline/prod"` becomes `"my-pipeline-prod.json"`.
fn cache_filename(config_key: &str) -> String {
    let slug: String = config_key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    slug + ".json"
}
