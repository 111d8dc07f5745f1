mod jenkins;

use indexmap::IndexMap;

use crate::job_data::{JobDataMap, JobName, ServerUrl};

pub use jenkins::{DownstreamCache, JenkinsClient};

/// Source of job records.
pub trait JobSource {
    /// Fetches every job in `jobs` (name to server).
    ///
    /// Returns one record per requested name; a job that could not be read
    /// gets an UNDEFINED record instead of being left out.
    async fn fetch_all(&self, jobs: &IndexMap<JobName, ServerUrl>) -> JobDataMap;
}
