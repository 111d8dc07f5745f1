use console::style;

use crate::job_data::JobStatus;

/// Styling helpers for terminal output
pub fn bright_yellow(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).bright().yellow()
}

pub fn bright_green(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).bright().green()
}

pub fn bright_red(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).bright().red()
}

pub fn cyan(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).cyan()
}

pub fn dim(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).dim()
}

pub fn bright(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).bright()
}

pub fn magenta_bold(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).magenta().bold()
}

/// Status text in the colour used for it across the report.
pub fn styled_status(status: Option<JobStatus>) -> console::StyledObject<String> {
    match status {
        Some(JobStatus::Success) => bright_green(JobStatus::Success),
        Some(JobStatus::Failure) => bright_red(JobStatus::Failure).bold(),
        Some(JobStatus::Unstable) => bright_yellow(JobStatus::Unstable).bold(),
        Some(JobStatus::InProgress) => bright_yellow(JobStatus::InProgress),
        Some(status) => dim(status),
        None => dim("-"),
    }
}
