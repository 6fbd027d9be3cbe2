//! Progress indicators for warden runs.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use reconcile::{Stage, StageObserver};

/// Progress bar over a fleet run, fed by engine stage transitions.
pub struct FleetProgress {
    bar: ProgressBar,
}

impl FleetProgress {
    /// A bar counting finished targets. Hidden when `visible` is false.
    pub fn new(targets: usize, visible: bool) -> Self {
        if !visible {
            return Self {
                bar: ProgressBar::hidden(),
            };
        }

        let bar = ProgressBar::new(targets as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .map_or_else(|_| ProgressStyle::default_bar(), |s| s.progress_chars("=>-"));
        bar.set_style(style);
        bar.enable_steady_tick(std::time::Duration::from_millis(120));
        Self { bar }
    }

    /// Remove the bar from the terminal.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl StageObserver for FleetProgress {
    fn on_stage(&self, target: &str, stage: Stage) {
        match stage {
            Stage::Done => self.bar.inc(1),
            Stage::Failed => {
                self.bar.inc(1);
                self.bar
                    .println(format!("{} {target} failed", "✗".red()));
            }
            _ => self.bar.set_message(format!("{target}: {stage}")),
        }
    }

    fn on_command_applied(&self, target: &str, index: usize, total: usize, _display: &str) {
        self.bar
            .set_message(format!("{target}: applying [{index}/{total}]"));
    }
}
