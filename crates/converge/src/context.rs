//! Run context and progress callbacks
//!
//! These keep the engine independent of any particular API client setup,
//! working directory or terminal UI.

use crate::reconcile::ImportOutcome;
use std::fmt;
use tfexec::{Executor, Var};

/// Steps of a run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Initialize the working directory.
    Init,
    /// Import existing remote objects.
    Import,
    /// Compute the plan.
    Plan,
    /// Apply the plan.
    Apply,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "Initializing"),
            Self::Import => write!(f, "Importing existing resources"),
            Self::Plan => write!(f, "Planning"),
            Self::Apply => write!(f, "Applying"),
        }
    }
}

/// Progress callback for a run
///
/// Implement this trait to receive progress updates.
pub trait ProgressCallback: Send {
    /// Called when a step starts
    fn on_step_start(&mut self, step: Step);

    /// Called when a step completes
    fn on_step_complete(&mut self, step: Step);

    /// Called after each import decision
    fn on_import(&mut self, address: &str, outcome: &ImportOutcome);

    /// Called with the human readable plan before it is checked
    fn on_plan(&mut self, plan: &str);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_step_start(&mut self, _step: Step) {}
    fn on_step_complete(&mut self, _step: Step) {}
    fn on_import(&mut self, _address: &str, _outcome: &ImportOutcome) {}
    fn on_plan(&mut self, _plan: &str) {}
}

/// Everything the reconciler and the run need besides the entities.
pub struct Context<'a> {
    /// Organization owning the workspaces.
    pub organization: String,
    /// Remote API client.
    pub client: &'a tfe::Client,
    /// Execution tool bound to the working directory.
    pub executor: &'a dyn Executor,
    /// Input variables passed to `import` and `plan`.
    pub vars: Vec<Var>,
}

impl<'a> Context<'a> {
    /// Create a context without input variables
    pub fn new(
        organization: impl Into<String>,
        client: &'a tfe::Client,
        executor: &'a dyn Executor,
    ) -> Self {
        Self {
            organization: organization.into(),
            client,
            executor,
            vars: Vec::new(),
        }
    }

    /// Set the input variables
    #[must_use]
    pub fn with_vars(mut self, vars: Vec<Var>) -> Self {
        self.vars = vars;
        self
    }

    /// Import ID of an object nested under a workspace, `<org>/<workspace>/<id>`.
    pub fn nested_import_id(&self, workspace: &str, id: &str) -> String {
        format!("{}/{}/{}", self.organization, workspace, id)
    }
}
