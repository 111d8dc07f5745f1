use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use comfy_table::{Attribute, Cell};
use serde::Serialize;

use crate::job_data::{JobDataMap, JobLookup, JobRecord};
use crate::pipeline::{get_downstream_serials, PipelineNode};

use super::styling::{bright, cyan, dim, styled_status};
use super::tables::{create_cyan_header, create_table, status_cell};

/// Builds older than this are dimmed in the table.
const STALE_AFTER_HOURS: i64 = 24;

const INDENT: &str = "  ";

/// Status table of one pipeline config.
///
/// `subtree` is the root of the table: the whole tree, or a focused node of it.
/// Builds that started more than a day before `now` are dimmed.
pub fn render_report(
    name: &str,
    subtree: &PipelineNode,
    job_data: &JobDataMap,
    now: DateTime<Utc>,
) -> String {
    let mut output = String::new();

    let status = subtree.downstream_status.or(subtree.status);
    let _ = writeln!(
        output,
        "{} {}  {}",
        bright("📋"),
        cyan(name).bold(),
        styled_status(status)
    );

    let mut table = create_table();
    table.set_header(create_cyan_header(&[
        "Name", "Serial", "No.", "Time", "Status", "URL",
    ]));

    // The unnamed tree root gets no row; a focused node does.
    let start = if subtree.name.is_empty() {
        RowStart::Children
    } else {
        RowStart::Node
    };
    let mut rows = Vec::new();
    collect_rows(subtree, 0, start, job_data, now, &mut rows);

    if rows.is_empty() {
        let _ = writeln!(output, "  {}", dim("No pipelines configured"));
        return output;
    }
    for row in rows {
        table.add_row(row);
    }
    let _ = writeln!(output, "{table}");
    output
}

#[derive(Clone, Copy, PartialEq)]
enum RowStart {
    Node,
    Children,
}

fn collect_rows(
    node: &PipelineNode,
    depth: usize,
    start: RowStart,
    job_data: &JobDataMap,
    now: DateTime<Utc>,
    rows: &mut Vec<Vec<Cell>>,
) {
    let child_depth = if start == RowStart::Node {
        rows.push(node_row(node, depth, job_data, now));
        depth + 1
    } else {
        depth
    };
    for child in node.children.values() {
        collect_rows(child, child_depth, RowStart::Node, job_data, now, rows);
    }
}

fn node_row(
    node: &PipelineNode,
    depth: usize,
    job_data: &JobDataMap,
    now: DateTime<Utc>,
) -> Vec<Cell> {
    let name = format!("{}{}", INDENT.repeat(depth), node.display_name());

    let cells = if node.is_job() {
        let record = job_data.record(&node.name);
        vec![
            Cell::new(name),
            Cell::new(record.serial.as_deref().unwrap_or("")),
            Cell::new(record.build_num.map(|n| n.to_string()).unwrap_or_default()),
            Cell::new(format_time(record)),
            status_cell(node.status),
            Cell::new(record.human_url.as_deref().or(record.url.as_deref()).unwrap_or("")),
        ]
    } else {
        let serials: Vec<_> = get_downstream_serials(node, job_data).into_iter().collect();
        vec![
            Cell::new(name).add_attribute(Attribute::Bold),
            Cell::new(serials.join(", ")),
            Cell::new(""),
            Cell::new(""),
            status_cell(node.downstream_status),
            Cell::new(""),
        ]
    };

    if node.is_job() && is_old(job_data.record(&node.name), now) {
        cells
            .into_iter()
            .map(|cell| cell.add_attribute(Attribute::Dim))
            .collect()
    } else {
        cells
    }
}

fn format_time(record: &JobRecord) -> String {
    record
        .timestamp
        .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

/// Whether the last build of `record` started more than a day before `now`.
fn is_old(record: &JobRecord, now: DateTime<Utc>) -> bool {
    record
        .timestamp
        .is_some_and(|ts| now - ts > Duration::hours(STALE_AFTER_HOURS))
}

/// JSON document for one pipeline config.
#[derive(Debug, Serialize)]
pub struct PipelineReport<'a> {
    pub name: &'a str,
    pub collected_at: DateTime<Utc>,
    pub tree: &'a PipelineNode,
    /// Sorted for stable output.
    pub jobs: BTreeMap<&'a str, &'a JobRecord>,
}

impl<'a> PipelineReport<'a> {
    pub fn new(name: &'a str, tree: &'a PipelineNode, job_data: &'a JobDataMap) -> Self {
        Self {
            name,
            collected_at: Utc::now(),
            tree,
            jobs: job_data
                .iter()
                .map(|(name, record)| (name.as_str(), record))
                .collect(),
        }
    }
}

pub fn export_json(
    reports: &[PipelineReport<'_>],
    pretty: bool,
    output: &mut dyn Write,
) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(reports)?
    } else {
        serde_json::to_string(reports)?
    };
    writeln!(output, "{json}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job_data::JobStatus;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    fn sample() -> (PipelineNode, JobDataMap) {
        let mut build = PipelineNode::job("build", "http://s");
        build.status = Some(JobStatus::Success);
        let mut test = PipelineNode::job("test", "http://s");
        test.status = Some(JobStatus::Failure);
        test.label = Some("Unit tests".to_string());
        let mut stage = PipelineNode::group("stage1").with_child(build).with_child(test);
        stage.downstream_status = Some(JobStatus::Failure);
        let tree = PipelineNode::root().with_child(stage);

        let mut build_record = JobRecord::new("build", JobStatus::Success);
        build_record.serial = Some("41".to_string());
        build_record.build_num = Some(7);
        build_record.timestamp = Some(now() - Duration::hours(2));
        build_record.url = Some("http://internal/job/build/7/".to_string());
        build_record.human_url = Some("https://ci/job/build/7/".to_string());

        let mut test_record = JobRecord::new("test", JobStatus::Failure);
        test_record.serial = Some("41".to_string());
        test_record.timestamp = Some(now() - Duration::hours(30));

        let job_data = [build_record, test_record]
            .into_iter()
            .map(|r| (r.name.clone(), r))
            .collect();
        (tree, job_data)
    }

    #[test]
    fn test_render_report_lists_tree_rows() {
        let (tree, job_data) = sample();
        let output = render_report("nightly", &tree, &job_data, now());

        assert!(output.contains("nightly"));
        assert!(output.contains("stage1"));
        assert!(output.contains("│ stage1"));
        assert!(output.contains("│   build"), "Children are indented");
        assert!(output.contains("Unit tests"), "Labels replace names");
        assert!(output.contains("https://ci/job/build/7/"), "Human URL preferred");
        assert!(output.contains("2024-03-10 10:00"));
        assert!(output.contains("FAILURE"));
    }

    #[test]
    fn test_render_focused_subtree() {
        let (tree, job_data) = sample();
        let build = &tree.children["stage1"].children["build"];
        let output = render_report("nightly", build, &job_data, now());

        assert!(output.contains("build"));
        assert!(!output.contains("Unit tests"));
    }

    #[test]
    fn test_render_empty_tree() {
        let output = render_report("empty", &PipelineNode::root(), &JobDataMap::new(), now());
        assert!(output.contains("No pipelines configured"));
    }

    #[test]
    fn test_old_builds() {
        let (_, job_data) = sample();
        assert!(!is_old(&job_data["build"], now()));
        assert!(is_old(&job_data["test"], now()));
        assert!(!is_old(&JobRecord::new("x", JobStatus::NotRun), now()), "No timestamp, not old");
    }

    #[test]
    fn test_export_json() {
        let (tree, job_data) = sample();
        let reports = vec![PipelineReport::new("nightly", &tree, &job_data)];
        let mut buffer = Vec::new();

        export_json(&reports, false, &mut buffer).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(value[0]["name"], "nightly");
        assert_eq!(value[0]["tree"]["children"]["stage1"]["downstream_status"], "FAILURE");
        assert_eq!(value[0]["jobs"]["build"]["serial"], "41");
    }
}
