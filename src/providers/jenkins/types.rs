//! Subsets of the Jenkins JSON API responses, as selected by the `tree`
//! query parameter.

use serde::Deserialize;

/// `GET {server}/job/{name}/api/json?tree=name,lastBuild[url],downstreamProjects[name,url]`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    /// `null` until the job has been built once
    pub last_build: Option<BuildRef>,
    #[serde(default)]
    pub downstream_projects: Vec<ProjectRef>,
}

#[derive(Debug, Deserialize)]
pub struct BuildRef {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct ProjectRef {
    pub name: String,
}

/// `GET {build_url}/api/json?tree=id,result,timestamp,actions[parameters[name,value]]`
#[derive(Debug, Deserialize)]
pub struct BuildResponse {
    pub id: Option<String>,
    /// `null` while the build is running
    pub result: Option<String>,
    /// Milliseconds since the epoch
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub actions: Vec<Option<Action>>,
}

#[derive(Debug, Deserialize)]
pub struct Action {
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

#[derive(Debug, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl BuildResponse {
    /// Value of the build parameter `name`, rendered as a string.
    pub fn parameter(&self, name: &str) -> Option<String> {
        self.actions
            .iter()
            .flatten()
            .flat_map(|action| &action.parameters)
            .find(|parameter| parameter.name == name)
            .and_then(|parameter| match &parameter.value {
                serde_json::Value::Null => None,
                serde_json::Value::String(value) => Some(value.clone()),
                other => Some(other.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_lookup() {
        let build: BuildResponse = serde_json::from_str(
            r#"{
  "_class": "hudson.model.FreeStyleBuild",
  "id": "42",
  "result": "SUCCESS",
  "timestamp": 1700000000000,
  "actions": [
    {"_class": "hudson.model.CauseAction"},
    {},
    {"_class": "hudson.model.ParametersAction", "parameters": [
      {"_class": "hudson.model.StringParameterValue", "name": "SERIAL", "value": "17"},
      {"_class": "hudson.model.BooleanParameterValue", "name": "CLEAN", "value": true}
    ]}
  ]
}"#,
        )
        .unwrap();

        assert_eq!(build.parameter("SERIAL").as_deref(), Some("17"));
        assert_eq!(build.parameter("CLEAN").as_deref(), Some("true"));
        assert_eq!(build.parameter("MISSING"), None);
    }

    #[test]
    fn test_unbuilt_job() {
        let job: JobResponse =
            serde_json::from_str(r#"{"name": "fresh", "lastBuild": null, "downstreamProjects": []}"#)
                .unwrap();
        assert!(job.last_build.is_none());
        assert!(job.downstream_projects.is_empty());
    }
}
