use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub type JobName = String;
pub type ServerUrl = String;

/// All fetched job records of one pipeline config, keyed by job name.
pub type JobDataMap = HashMap<JobName, JobRecord>;

/// Result of a single build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    #[serde(rename = "FAILURE")]
    Failure,
    #[serde(rename = "UNSTABLE")]
    Unstable,
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "NOT RUN")]
    NotRun,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "ABORTED")]
    Aborted,
    /// No data was fetched for the job.
    #[serde(rename = "UNDEFINED")]
    Undefined,
}

impl JobStatus {
    /// Maps the `result` field of a Jenkins build.
    ///
    /// A running build has no result yet, which maps to `Undefined` and is
    /// later read as "in progress" by the aggregator.
    pub fn from_jenkins(result: Option<&str>) -> Self {
        match result {
            Some("SUCCESS") => Self::Success,
            Some("FAILURE") => Self::Failure,
            Some("UNSTABLE") => Self::Unstable,
            Some("ABORTED") => Self::Aborted,
            Some("NOT_BUILT") => Self::NotRun,
            _ => Self::Undefined,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Failure => "FAILURE",
            Self::Unstable => "UNSTABLE",
            Self::Success => "SUCCESS",
            Self::NotRun => "NOT RUN",
            Self::InProgress => "In Progress",
            Self::Aborted => "ABORTED",
            Self::Undefined => "UNDEFINED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last known facts about a job, as returned by the fetcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub name: JobName,
    pub status: JobStatus,
    pub build_num: Option<u64>,
    pub timestamp: Option<DateTime<Utc>>,
    /// Value of the `SERIAL` build parameter
    pub serial: Option<String>,
    pub url: Option<String>,
    pub human_url: Option<String>,
    pub server: Option<ServerUrl>,
    /// Jobs triggered by this job, with the server each one lives on
    #[serde(default)]
    pub downstream: IndexMap<JobName, ServerUrl>,
}

static UNDEFINED: OnceLock<JobRecord> = OnceLock::new();

impl JobRecord {
    pub fn new(name: impl Into<JobName>, status: JobStatus) -> Self {
        Self {
            name: name.into(),
            status,
            build_num: None,
            timestamp: None,
            serial: None,
            url: None,
            human_url: None,
            server: None,
            downstream: IndexMap::new(),
        }
    }

    /// Shared stand-in for a job that was requested but has no record.
    pub fn undefined() -> &'static JobRecord {
        UNDEFINED.get_or_init(|| JobRecord::new("UNDEFINED", JobStatus::Undefined))
    }
}

pub fn parse_serial(serial: &str) -> Option<f64> {
    serial.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Lookup that never fails: absent jobs resolve to [`JobRecord::undefined`].
pub trait JobLookup {
    fn record(&self, name: &str) -> &JobRecord;
}

impl JobLookup for JobDataMap {
    fn record(&self, name: &str) -> &JobRecord {
        self.get(name).unwrap_or(JobRecord::undefined())
    }
}

/// Fills `human_url` by applying every find/replace pair of `translate` to `url`.
pub fn add_human_urls(job_data: &mut JobDataMap, translate: &IndexMap<String, String>) {
    for record in job_data.values_mut() {
        record.human_url = record.url.as_ref().map(|url| {
            translate
                .iter()
                .fold(url.clone(), |acc, (find, replace)| acc.replace(find, replace))
        });
    }
}
