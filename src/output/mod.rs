mod progress;
mod report;
mod styling;
mod tables;

pub use progress::PhaseProgress;
pub use report::{export_json, render_report, PipelineReport};
pub use styling::{bright_red, dim, magenta_bold};

/// Prints the `pipeline-dash` banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("🚦 pipeline-dash"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("Jenkins pipeline status dashboard")
    );
}
