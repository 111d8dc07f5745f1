use super::node::PipelineNode;
use crate::job_data::{parse_serial, JobDataMap, JobLookup, JobStatus};

/// Stamps `status` on every job node and `downstream_status` on every node.
///
/// Derived fields are recomputed from scratch, so calling this again with the
/// same tree shape and job data yields the same result.
pub fn calculate_status(tree: &mut PipelineNode, job_data: &JobDataMap) {
    aggregate(tree, job_data, None);
}

/// Returns every status contributed by `node`'s subtree, its own included.
///
/// `ancestor_serial` is the serial of the nearest job ancestor that has one.
fn aggregate<'d>(
    node: &mut PipelineNode,
    job_data: &'d JobDataMap,
    ancestor_serial: Option<&'d str>,
) -> Vec<JobStatus> {
    let record = node.server.as_ref().map(|_| job_data.record(&node.name));
    let child_serial = record
        .and_then(|r| r.serial.as_deref())
        .or(ancestor_serial);

    let mut statuses: Vec<JobStatus> = node
        .children
        .values_mut()
        .flat_map(|child| aggregate(child, job_data, child_serial))
        .collect();

    let mut old_serial = false;
    node.status = record.map(|record| {
        let status = if is_stale(ancestor_serial, record.serial.as_deref()) {
            old_serial = true;
            JobStatus::NotRun
        } else if record.status == JobStatus::Undefined {
            JobStatus::InProgress
        } else {
            record.status
        };
        statuses.push(status);
        status
    });

    node.downstream_status = roll_up(&statuses, old_serial);
    statuses
}

/// A job is stale when its last build predates the serial its nearest job
/// ancestor reports on.
///
/// An unparsable ancestor serial imposes no constraint. A missing own serial
/// is stale; an unparsable one is not.
fn is_stale(ancestor_serial: Option<&str>, own_serial: Option<&str>) -> bool {
    let Some(ancestor) = ancestor_serial.and_then(parse_serial) else {
        return false;
    };
    match own_serial {
        None => true,
        Some(own) => parse_serial(own).is_some_and(|own| own < ancestor),
    }
}

/// Worst status wins, independent of counts.
fn roll_up(statuses: &[JobStatus], old_serial: bool) -> Option<JobStatus> {
    if statuses.is_empty() {
        return None;
    }
    let has = |status: JobStatus| statuses.contains(&status);

    Some(if old_serial {
        JobStatus::NotRun
    } else if has(JobStatus::Failure) {
        JobStatus::Failure
    } else if has(JobStatus::Unstable) {
        JobStatus::Unstable
    } else if has(JobStatus::InProgress) || has(JobStatus::Undefined) {
        JobStatus::InProgress
    } else if has(JobStatus::Success) {
        JobStatus::Success
    } else {
        JobStatus::NotRun
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::job_data::JobRecord;
    use crate::pipeline::builder::build;

    fn record(name: &str, status: JobStatus, serial: Option<&str>) -> (String, JobRecord) {
        let mut record = JobRecord::new(name, status);
        record.serial = serial.map(str::to_string);
        (name.to_string(), record)
    }

    /// (name, status, downstream_status) for every node, pre-order.
    fn stamps(node: &PipelineNode) -> Vec<(String, Option<JobStatus>, Option<JobStatus>)> {
        let mut out = vec![(node.name.clone(), node.status, node.downstream_status)];
        for child in node.children.values() {
            out.extend(stamps(child));
        }
        out
    }

    mod is_stale {
        use super::*;

        #[test]
        fn no_ancestor_serial_is_never_stale() {
            assert!(!is_stale(None, None));
            assert!(!is_stale(None, Some("1")));
        }

        #[test]
        fn lower_serial_is_stale() {
            assert!(is_stale(Some("5"), Some("3")));
        }

        #[test]
        fn equal_or_higher_serial_is_current() {
            assert!(!is_stale(Some("5"), Some("5")));
            assert!(!is_stale(Some("5"), Some("6")));
        }

        #[test]
        fn missing_own_serial_is_stale() {
            assert!(is_stale(Some("5"), None));
        }

        #[test]
        fn compares_numerically() {
            assert!(is_stale(Some("10"), Some("9")), "9 < 10 even though '9' > '10'");
            assert!(!is_stale(Some("2.5"), Some("10")));
        }

        #[test]
        fn unparsable_serials_impose_no_constraint() {
            assert!(!is_stale(Some("release-x"), None));
            assert!(!is_stale(Some("5"), Some("abc")));
        }
    }

    mod roll_up {
        use super::*;

        #[test]
        fn empty_is_undefined() {
            assert_eq!(roll_up(&[], false), None);
            assert_eq!(roll_up(&[], true), None);
        }

        #[test]
        fn failure_beats_everything() {
            let statuses = [JobStatus::Success, JobStatus::InProgress, JobStatus::Failure];
            assert_eq!(roll_up(&statuses, false), Some(JobStatus::Failure));
        }

        #[test]
        fn unstable_beats_in_progress() {
            let statuses = [JobStatus::InProgress, JobStatus::Unstable, JobStatus::Success];
            assert_eq!(roll_up(&statuses, false), Some(JobStatus::Unstable));
        }

        #[test]
        fn undefined_counts_as_in_progress() {
            let statuses = [JobStatus::Success, JobStatus::Undefined];
            assert_eq!(roll_up(&statuses, false), Some(JobStatus::InProgress));
        }

        #[test]
        fn success_beats_not_run() {
            let statuses = [JobStatus::NotRun, JobStatus::Success, JobStatus::NotRun];
            assert_eq!(roll_up(&statuses, false), Some(JobStatus::Success));
        }

        #[test]
        fn aborted_only_is_not_run() {
            assert_eq!(roll_up(&[JobStatus::Aborted], false), Some(JobStatus::NotRun));
        }

        #[test]
        fn old_serial_overrides_failures() {
            let statuses = [JobStatus::Failure, JobStatus::NotRun];
            assert_eq!(roll_up(&statuses, true), Some(JobStatus::NotRun));
        }
    }

    mod calculate_status {
        use super::*;

        fn build_yaml(yaml: &str) -> PipelineNode {
            let config: PipelineConfig = serde_yaml::from_str(yaml).unwrap();
            build(&config, false).unwrap()
        }

        #[test]
        fn single_stage_scenario() {
            let mut tree = build_yaml(
                r#"
servers:
  "http://s":
    pipelines:
      .stage1:
        job-a:
"#,
            );
            let job_data: JobDataMap = [record("job-a", JobStatus::Success, Some("1"))]
                .into_iter()
                .collect();

            calculate_status(&mut tree, &job_data);

            let stage1 = &tree.children["stage1"];
            assert_eq!(stage1.status, None, "Groups have no status of their own");
            assert_eq!(stage1.downstream_status, Some(JobStatus::Success));
            assert_eq!(stage1.children["job-a"].status, Some(JobStatus::Success));
            assert_eq!(tree.downstream_status, Some(JobStatus::Success));
        }

        #[test]
        fn undotted_parent_without_record_is_in_progress() {
            let mut tree = build_yaml(
                r#"
servers:
  "http://s":
    pipelines:
      stage1:
        job-a:
"#,
            );
            let job_data: JobDataMap = [record("job-a", JobStatus::Success, Some("1"))]
                .into_iter()
                .collect();

            calculate_status(&mut tree, &job_data);

            let stage1 = &tree.children["stage1"];
            assert_eq!(stage1.status, Some(JobStatus::InProgress));
            assert_eq!(stage1.downstream_status, Some(JobStatus::InProgress));
            assert_eq!(
                stage1.children["job-a"].status,
                Some(JobStatus::Success),
                "No parent serial, so no staleness"
            );
        }

        #[test]
        fn worst_child_wins() {
            let mut tree = PipelineNode::root().with_child(
                PipelineNode::group("g")
                    .with_child(PipelineNode::job("ok", "http://s"))
                    .with_child(PipelineNode::job("running", "http://s"))
                    .with_child(PipelineNode::job("broken", "http://s")),
            );
            let job_data: JobDataMap = [
                record("ok", JobStatus::Success, None),
                record("running", JobStatus::InProgress, None),
                record("broken", JobStatus::Failure, None),
            ]
            .into_iter()
            .collect();

            calculate_status(&mut tree, &job_data);

            assert_eq!(tree.children["g"].downstream_status, Some(JobStatus::Failure));
        }

        #[test]
        fn stale_child_is_not_run() {
            let mut tree = PipelineNode::root().with_child(
                PipelineNode::job("parent", "http://s")
                    .with_child(PipelineNode::job("child", "http://s")),
            );
            let job_data: JobDataMap = [
                record("parent", JobStatus::Success, Some("5")),
                record("child", JobStatus::Success, Some("3")),
            ]
            .into_iter()
            .collect();

            calculate_status(&mut tree, &job_data);

            let parent = &tree.children["parent"];
            let child = &parent.children["child"];
            assert_eq!(child.status, Some(JobStatus::NotRun));
            assert_eq!(
                child.downstream_status,
                Some(JobStatus::NotRun),
                "Stale job marks its own subtree as not run"
            );
            assert_eq!(parent.status, Some(JobStatus::Success));
            assert_eq!(parent.downstream_status, Some(JobStatus::Success));
        }

        #[test]
        fn staleness_uses_nearest_job_ancestor() {
            let mut tree = PipelineNode::root().with_child(
                PipelineNode::job("top", "http://s").with_child(
                    PipelineNode::group("g").with_child(
                        PipelineNode::job("middle", "http://s")
                            .with_child(PipelineNode::job("leaf", "http://s")),
                    ),
                ),
            );
            let job_data: JobDataMap = [
                record("top", JobStatus::Success, Some("5")),
                record("middle", JobStatus::Success, Some("8")),
                record("leaf", JobStatus::Success, Some("6")),
            ]
            .into_iter()
            .collect();

            calculate_status(&mut tree, &job_data);

            let middle = &tree.children["top"].children["g"].children["middle"];
            assert_eq!(middle.status, Some(JobStatus::Success));
            assert_eq!(
                middle.children["leaf"].status,
                Some(JobStatus::NotRun),
                "6 is compared against middle's 8, not top's 5"
            );
        }

        #[test]
        fn missing_record_reads_as_in_progress() {
            let mut tree = PipelineNode::root()
                .with_child(PipelineNode::group("g").with_child(PipelineNode::job("ghost", "http://s")));

            calculate_status(&mut tree, &JobDataMap::new());

            let g = &tree.children["g"];
            assert_eq!(g.children["ghost"].status, Some(JobStatus::InProgress));
            assert_eq!(g.downstream_status, Some(JobStatus::InProgress));
        }

        #[test]
        fn empty_group_has_no_downstream_status() {
            let mut tree = PipelineNode::root().with_child(PipelineNode::group("empty"));

            calculate_status(&mut tree, &JobDataMap::new());

            assert_eq!(tree.children["empty"].downstream_status, None);
            assert_eq!(tree.downstream_status, None);
        }

        #[test]
        fn is_idempotent() {
            let mut tree = PipelineNode::root()
                .with_child(
                    PipelineNode::job("parent", "http://s")
                        .with_child(PipelineNode::job("child", "http://s")),
                )
                .with_child(PipelineNode::group("g").with_child(PipelineNode::job("x", "http://s")));
            let job_data: JobDataMap = [
                record("parent", JobStatus::Unstable, Some("2")),
                record("child", JobStatus::Success, Some("1")),
                record("x", JobStatus::Undefined, None),
            ]
            .into_iter()
            .collect();

            calculate_status(&mut tree, &job_data);
            let first = stamps(&tree);
            calculate_status(&mut tree, &job_data);
            assert_eq!(stamps(&tree), first);
        }

        #[test]
        fn recomputes_after_data_changes() {
            let mut tree = PipelineNode::root().with_child(PipelineNode::job("a", "http://s"));
            let failing: JobDataMap = [record("a", JobStatus::Failure, None)].into_iter().collect();
            let fixed: JobDataMap = [record("a", JobStatus::Success, None)].into_iter().collect();

            calculate_status(&mut tree, &failing);
            assert_eq!(tree.downstream_status, Some(JobStatus::Failure));
            calculate_status(&mut tree, &fixed);
            assert_eq!(tree.downstream_status, Some(JobStatus::Success));
        }
    }
}
