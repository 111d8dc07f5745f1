use chrono::DateTime;
use futures::future::join_all;
use indexmap::IndexMap;
use log::{debug, warn};
use url::Url;

use super::client::JenkinsClient;
use super::types::{BuildResponse, JobResponse};
use crate::error::{PipelineDashError, Result};
use crate::job_data::{JobDataMap, JobName, JobRecord, JobStatus, ServerUrl};
use crate::providers::JobSource;

/// Build parameter carrying the pipeline run serial.
pub const SERIAL_PARAMETER: &str = "SERIAL";

const JOB_TREE: &str = "name,lastBuild[url],downstreamProjects[name,url]";
const BUILD_TREE: &str = "id,result,timestamp,actions[parameters[name,value]]";

impl JenkinsClient {
    /// Fetches the last build of `name` on `server`.
    ///
    /// A job that was never built reads as NOT RUN; a last build that cannot
    /// be read reads as UNDEFINED.
    pub async fn fetch_one(&self, server: &str, name: &str) -> Result<JobRecord> {
        let server_url = Url::parse(server)
            .map_err(|e| PipelineDashError::Config(format!("Invalid server URL '{server}': {e}")))?;
        let job_url = format!("{}/job/{name}", server.trim_end_matches('/'));

        let mut record = JobRecord::new(name, JobStatus::Undefined);
        record.server = Some(server.to_string());

        let Some(job) = self.api_json::<JobResponse>(&job_url, JOB_TREE).await? else {
            return Ok(record);
        };

        record.downstream = job
            .downstream_projects
            .into_iter()
            .map(|project| (project.name, server.to_string()))
            .collect();

        let Some(last_build) = job.last_build else {
            debug!("Job '{name}' has never been built");
            record.status = JobStatus::NotRun;
            return Ok(record);
        };

        // Jenkins reports build URLs under its configured root URL, which
        // is not always the address we reach it by.
        let build_url = rebase_url(&last_build.url, &server_url);
        record.url = Some(build_url.clone());

        let Some(build) = self.api_json::<BuildResponse>(&build_url, BUILD_TREE).await? else {
            return Ok(record);
        };

        record.status = JobStatus::from_jenkins(build.result.as_deref());
        record.build_num = build.id.as_deref().and_then(|id| id.parse().ok());
        record.timestamp = build.timestamp.and_then(DateTime::from_timestamp_millis);
        record.serial = build.parameter(SERIAL_PARAMETER);

        Ok(record)
    }
}

impl JobSource for JenkinsClient {
    async fn fetch_all(&self, jobs: &IndexMap<JobName, ServerUrl>) -> JobDataMap {
        let fetches = jobs.iter().map(|(name, server)| async move {
            let record = match self.fetch_one(server, name).await {
                Ok(record) => record,
                Err(e) => {
                    warn!("Failed to fetch job '{name}' from {server}: {e}");
                    let mut record = JobRecord::new(name.clone(), JobStatus::Undefined);
                    record.server = Some(server.clone());
                    record
                }
            };
            (name.clone(), record)
        });

        join_all(fetches).await.into_iter().collect()
    }
}

/// Replaces scheme, host and port of `url` with those of `server`.
fn rebase_url(url: &str, server: &Url) -> String {
    let Ok(mut rebased) = Url::parse(url) else {
        return url.to_string();
    };
    if rebased.set_scheme(server.scheme()).is_err()
        || rebased.set_host(server.host_str()).is_err()
        || rebased.set_port(server.port()).is_err()
    {
        return url.to_string();
    }
    rebased.to_string()
}
