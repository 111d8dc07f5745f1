use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::{bright_green, bright_yellow};

/// Spinner line per phase of a refresh cycle, drawn on stderr.
pub struct PhaseProgress {
    pb: ProgressBar,
    phase: usize,
    total: usize,
}

impl PhaseProgress {
    pub fn start(total: usize, message: &str, visible: bool) -> Self {
        let mut progress = Self {
            pb: ProgressBar::hidden(),
            phase: 1,
            total,
        };
        progress.pb = if visible {
            create_spinner(bright_yellow(progress.label(message)).to_string())
        } else {
            ProgressBar::hidden()
        };
        progress
    }

    /// Marks the current phase done and starts the next one.
    pub fn next(mut self, done: &str, message: &str) -> Self {
        let visible = !self.pb.is_hidden();
        self.pb
            .finish_with_message(bright_green(format!("{} ✓", self.label(done))).to_string());
        self.phase += 1;
        self.pb = if visible {
            create_spinner(bright_yellow(self.label(message)).to_string())
        } else {
            ProgressBar::hidden()
        };
        self
    }

    pub fn finish(self, done: &str) {
        self.pb
            .finish_with_message(bright_green(format!("{} ✓", self.label(done))).to_string());
    }

    fn label(&self, message: &str) -> String {
        format!("Phase {}/{}: {message}", self.phase, self.total)
    }
}

fn create_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {msg} {spinner}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
