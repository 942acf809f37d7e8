//! Run sequencing: init, import, plan, guard, apply.
//!
//! The caller owns the working directory and has already written the
//! document into it; the executor in the [`Context`] is bound to it.

use crate::context::{Context, ProgressCallback, Step};
use crate::error::Result;
use crate::expand::Expanded;
use crate::guard;
use crate::model::WORKSPACE_KIND;
use crate::reconcile::{self, ImportSummary};
use serde::Serialize;
use std::path::PathBuf;
use tfexec::Plan;

/// Options for a run
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Import existing remote objects before planning
    pub import: bool,
    /// Apply the plan when it has changes
    pub apply: bool,
    /// Let the plan delete workspaces
    pub allow_workspace_deletion: bool,
    /// Where the plan artifact is written
    pub plan_file: PathBuf,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            import: true,
            apply: false,
            allow_workspace_deletion: false,
            plan_file: PathBuf::from("plan.tfplan"),
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub has_changes: bool,
    /// Human readable plan, when there were changes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    /// Structured plan, when there were changes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_json: Option<Plan>,
    pub imports: ImportSummary,
    pub applied: bool,
}

/// Run the full sequence.
///
/// Any failure aborts the run. Imports already performed are not undone.
pub fn run<P: ProgressCallback>(
    ctx: &Context<'_>,
    expanded: &mut Expanded,
    opts: &RunOptions,
    progress: &mut P,
) -> Result<RunReport> {
    let mut report = RunReport::default();

    progress.on_step_start(Step::Init);
    ctx.executor.init()?;
    progress.on_step_complete(Step::Init);

    if opts.import {
        progress.on_step_start(Step::Import);
        report.imports = reconcile::import_all(ctx, expanded, progress)?;
        progress.on_step_complete(Step::Import);
    }

    progress.on_step_start(Step::Plan);
    report.has_changes = ctx.executor.plan(&ctx.vars, &opts.plan_file)?;
    progress.on_step_complete(Step::Plan);

    if !report.has_changes {
        log::info!("no changes");
        return Ok(report);
    }

    let text = ctx.executor.show_plan_raw(&opts.plan_file)?;
    progress.on_plan(&text);
    report.plan = Some(text);

    let plan = ctx.executor.show_plan(&opts.plan_file)?;
    guard::check(&plan, WORKSPACE_KIND, opts.allow_workspace_deletion)?;
    report.plan_json = Some(plan);

    if opts.apply {
        progress.on_step_start(Step::Apply);
        ctx.executor.apply(&opts.plan_file)?;
        progress.on_step_complete(Step::Apply);
        report.applied = true;
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NoProgress;
    use crate::error::Error;
    use crate::expand::{ExpandInput, expand};
    use crate::reconcile::ImportOutcome;
    use tfe::{Client, MockBackend};
    use tfexec::{Action, MockExecutor};

    const WS: &str = r#"tfe_workspace.workspace["demo"]"#;

    fn demo() -> Expanded {
        expand(&ExpandInput {
            name: "demo".into(),
            ..Default::default()
        })
        .unwrap()
    }

    #[derive(Default)]
    struct Recorder {
        steps: Vec<Step>,
        imports: Vec<String>,
        plans: usize,
    }

    impl ProgressCallback for Recorder {
        fn on_step_start(&mut self, step: Step) {
            self.steps.push(step);
        }
        fn on_step_complete(&mut self, _step: Step) {}
        fn on_import(&mut self, address: &str, _outcome: &ImportOutcome) {
            self.imports.push(address.to_string());
        }
        fn on_plan(&mut self, _plan: &str) {
            self.plans += 1;
        }
    }

    #[test]
    fn test_fresh_workspace_plans_create() {
        let client = Client::with_backend(Box::new(MockBackend::new()));
        let executor = MockExecutor::new();
        executor.desire(WS);
        let ctx = Context::new("acme", &client, &executor);

        let mut expanded = demo();
        let mut progress = Recorder::default();
        let report = run(&ctx, &mut expanded, &RunOptions::default(), &mut progress).unwrap();

        assert!(report.has_changes);
        assert_eq!(report.imports.skipped, 1);
        let plan = report.plan_json.unwrap();
        assert_eq!(plan.resource_changes.len(), 1);
        assert_eq!(plan.resource_changes[0].address, WS);
        assert_eq!(plan.resource_changes[0].change.actions, vec![Action::Create]);
        assert!(report.plan.unwrap().contains("will be created"));
        assert!(!report.applied);
        assert!(!executor.applied());

        assert_eq!(progress.steps, vec![Step::Init, Step::Import, Step::Plan]);
        assert_eq!(progress.imports, vec![WS.to_string()]);
        assert_eq!(progress.plans, 1);
        assert_eq!(executor.init_count(), 1);
    }

    #[test]
    fn test_apply_then_converged() {
        let client = Client::with_backend(Box::new(MockBackend::new()));
        let executor = MockExecutor::new();
        executor.desire(WS);
        let ctx = Context::new("acme", &client, &executor);
        let opts = RunOptions {
            apply: true,
            ..Default::default()
        };

        let report = run(&ctx, &mut demo(), &opts, &mut NoProgress).unwrap();
        assert!(report.applied);
        assert_eq!(executor.tracked(), vec![WS.to_string()]);

        let second = run(&ctx, &mut demo(), &opts, &mut NoProgress).unwrap();
        assert!(!second.has_changes);
        assert!(!second.applied);
        assert!(second.plan.is_none());
        assert_eq!(second.imports.already_tracked, 1);
    }

    #[test]
    fn test_workspace_deletion_blocked() {
        let client = Client::with_backend(Box::new(MockBackend::new()));
        let executor = MockExecutor::new();
        executor.track(r#"tfe_workspace.workspace["old"]"#);
        executor.plan_delete(r#"tfe_workspace.workspace["old"]"#);
        let ctx = Context::new("acme", &client, &executor);
        let opts = RunOptions {
            apply: true,
            ..Default::default()
        };

        let mut progress = Recorder::default();
        let err = run(&ctx, &mut demo(), &opts, &mut progress).unwrap_err();
        assert!(matches!(err, Error::DestructiveActionBlocked { .. }));
        assert!(!executor.applied());
        // The plan is still shown before the run stops
        assert_eq!(progress.plans, 1);
    }

    #[test]
    fn test_workspace_deletion_allowed() {
        let client = Client::with_backend(Box::new(MockBackend::new()));
        let executor = MockExecutor::new();
        executor.track(r#"tfe_workspace.workspace["old"]"#);
        executor.plan_delete(r#"tfe_workspace.workspace["old"]"#);
        let ctx = Context::new("acme", &client, &executor);
        let opts = RunOptions {
            apply: true,
            allow_workspace_deletion: true,
            ..Default::default()
        };

        let report = run(&ctx, &mut demo(), &opts, &mut NoProgress).unwrap();
        assert!(report.applied);
    }

    #[test]
    fn test_import_disabled() {
        let mock = MockBackend::new();
        let client = Client::with_backend(Box::new(mock.clone()));
        let executor = MockExecutor::new();
        let ctx = Context::new("acme", &client, &executor);
        let opts = RunOptions {
            import: false,
            ..Default::default()
        };

        let mut progress = Recorder::default();
        let report = run(&ctx, &mut demo(), &opts, &mut progress).unwrap();
        assert_eq!(report.imports.total(), 0);
        assert_eq!(mock.calls("read_workspace"), 0);
        assert_eq!(progress.steps, vec![Step::Init, Step::Plan]);
    }

    #[test]
    fn test_init_failure_stops_run() {
        let client = Client::with_backend(Box::new(MockBackend::new()));
        let executor = MockExecutor::new();
        executor.fail_on("init");
        let ctx = Context::new("acme", &client, &executor);

        let err = run(&ctx, &mut demo(), &RunOptions::default(), &mut NoProgress).unwrap_err();
        assert!(matches!(err, Error::Subprocess(_)));
        assert_eq!(executor.import_count(), 0);
    }

    #[test]
    fn test_report_json() {
        let report = RunReport {
            has_changes: false,
            ..Default::default()
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "has_changes": false,
                "imports": {"imported": 0, "already_tracked": 0, "skipped": 0},
                "applied": false
            })
        );
    }
}
