//! Terminal progress for a run.

use crate::ui;
use converge::{ImportOutcome, ProgressCallback, Step};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const STEPS: usize = 4;

/// Spinner while a terraform verb runs, one line per import decision.
pub struct CliProgress {
    spinner: Option<ProgressBar>,
    quiet: bool,
    print_plan: bool,
}

impl CliProgress {
    /// `quiet` silences step and import lines; `print_plan` echoes the plan.
    pub fn new(quiet: bool, print_plan: bool) -> Self {
        Self {
            spinner: None,
            quiet,
            print_plan,
        }
    }

    fn spin(&mut self, msg: String) {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(msg);
        pb.enable_steady_tick(Duration::from_millis(100));
        self.spinner = Some(pb);
    }
}

fn step_number(step: Step) -> usize {
    match step {
        Step::Init => 1,
        Step::Import => 2,
        Step::Plan => 3,
        Step::Apply => 4,
    }
}

impl ProgressCallback for CliProgress {
    fn on_step_start(&mut self, step: Step) {
        if self.quiet {
            return;
        }
        match step {
            // Import prints a line per address; a spinner would fight it
            Step::Import => ui::step(step_number(step), STEPS, &step.to_string()),
            _ => self.spin(format!("[{}/{STEPS}] {step}...", step_number(step))),
        }
    }

    fn on_step_complete(&mut self, step: Step) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
        if !self.quiet && step != Step::Import {
            ui::step(step_number(step), STEPS, &format!("{step} done"));
        }
    }

    fn on_import(&mut self, address: &str, outcome: &ImportOutcome) {
        if self.quiet {
            return;
        }
        match outcome {
            ImportOutcome::Imported { id } => ui::success(&format!("{address} <- {id}")),
            ImportOutcome::AlreadyTracked => ui::dim(&format!("{address} already tracked")),
            ImportOutcome::Skipped { reason } => ui::dim(&format!("{address} skipped: {reason}")),
        }
    }

    fn on_plan(&mut self, plan: &str) {
        if self.print_plan {
            println!();
            println!("{plan}");
        }
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        if let Some(pb) = self.spinner.take() {
            pb.abandon();
        }
    }
}
