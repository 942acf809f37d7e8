//! Backend abstraction for the execution tool.
//!
//! The [`Executor`] trait is the seam between callers and the `terraform`
//! binary: [`cli::TerraformCli`] runs the real subprocess, [`MockExecutor`]
//! simulates state and plans in memory for tests.

pub mod cli;

use crate::error::{Error, Result};
use crate::types::{Action, Plan, ResourceChange, State, Var};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Verbs of the execution tool.
///
/// Implementations are bound to one working directory that already holds
/// the configuration document.
pub trait Executor: Send + Sync {
    /// Initialize the working directory (`terraform init`).
    fn init(&self) -> Result<()>;

    /// Read the current tracking state (`terraform show -json`).
    fn show(&self) -> Result<State>;

    /// Bind an existing remote object to an address (`terraform import`).
    fn import(&self, address: &str, id: &str, vars: &[Var]) -> Result<()>;

    /// Write a plan to `out`. Returns `true` when the plan has changes.
    fn plan(&self, vars: &[Var], out: &Path) -> Result<bool>;

    /// Human readable rendering of a saved plan.
    fn show_plan_raw(&self, plan: &Path) -> Result<String>;

    /// Structured rendering of a saved plan.
    fn show_plan(&self, plan: &Path) -> Result<Plan>;

    /// Apply a saved plan.
    fn apply(&self, plan: &Path) -> Result<()>;
}

#[derive(Debug, Default)]
struct Simulation {
    tracked: BTreeSet<String>,
    desired: BTreeSet<String>,
    deletes: BTreeSet<String>,
    failing: HashSet<String>,
    imports: Vec<(String, String)>,
    import_vars: Vec<Vec<Var>>,
    inits: usize,
    applied: bool,
}

impl Simulation {
    fn changes(&self) -> Vec<ResourceChange> {
        let creates = self
            .desired
            .difference(&self.tracked)
            .map(|address| ResourceChange::new(address.clone(), vec![Action::Create]));
        let deletes = self
            .deletes
            .iter()
            .map(|address| ResourceChange::new(address.clone(), vec![Action::Delete]));
        creates.chain(deletes).collect()
    }
}

/// In-memory executor for testing without the `terraform` binary.
///
/// State starts empty. Addresses registered with [`MockExecutor::desire`]
/// are planned as creates until they are tracked (by `import` or `apply`);
/// [`MockExecutor::plan_delete`] adds a delete to every plan. Clones share
/// the same simulation.
#[derive(Debug, Clone, Default)]
pub struct MockExecutor {
    sim: Arc<Mutex<Simulation>>,
}

impl MockExecutor {
    /// Create a mock with empty state.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Simulation> {
        self.sim.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark an address as already tracked.
    pub fn track(&self, address: impl Into<String>) {
        self.lock().tracked.insert(address.into());
    }

    /// Declare an address the configuration wants to exist.
    pub fn desire(&self, address: impl Into<String>) {
        self.lock().desired.insert(address.into());
    }

    /// Make every plan include a delete of `address`.
    pub fn plan_delete(&self, address: impl Into<String>) {
        self.lock().deletes.insert(address.into());
    }

    /// Make a verb (`init`, `show`, `import`, `plan`, `apply`, ...) fail.
    pub fn fail_on(&self, verb: impl Into<String>) {
        self.lock().failing.insert(verb.into());
    }

    /// Every `(address, id)` pair imported so far, in call order.
    pub fn imports(&self) -> Vec<(String, String)> {
        self.lock().imports.clone()
    }

    /// Number of import calls so far.
    pub fn import_count(&self) -> usize {
        self.lock().imports.len()
    }

    /// Variables passed to the most recent import.
    pub fn last_import_vars(&self) -> Option<Vec<Var>> {
        self.lock().import_vars.last().cloned()
    }

    /// Number of init calls so far.
    pub fn init_count(&self) -> usize {
        self.lock().inits
    }

    /// Whether a plan has been applied.
    pub fn applied(&self) -> bool {
        self.lock().applied
    }

    /// Currently tracked addresses.
    pub fn tracked(&self) -> Vec<String> {
        self.lock().tracked.iter().cloned().collect()
    }

    fn check(&self, verb: &str) -> Result<()> {
        if self.lock().failing.contains(verb) {
            return Err(Error::from_output(verb, Some(1), "simulated failure"));
        }
        Ok(())
    }
}

impl Executor for MockExecutor {
    fn init(&self) -> Result<()> {
        self.check("init")?;
        self.lock().inits += 1;
        Ok(())
    }

    fn show(&self) -> Result<State> {
        self.check("show")?;
        let sim = self.lock();
        if sim.tracked.is_empty() {
            return Ok(State::default());
        }
        Ok(State::tracking(sim.tracked.iter().cloned()))
    }

    fn import(&self, address: &str, id: &str, vars: &[Var]) -> Result<()> {
        self.check("import")?;
        let mut sim = self.lock();
        if !sim.tracked.insert(address.to_string()) {
            return Err(Error::from_output(
                "import",
                Some(1),
                &format!("Resource already managed by Terraform: {address}"),
            ));
        }
        sim.imports.push((address.to_string(), id.to_string()));
        sim.import_vars.push(vars.to_vec());
        Ok(())
    }

    fn plan(&self, _vars: &[Var], _out: &Path) -> Result<bool> {
        self.check("plan")?;
        Ok(!self.lock().changes().is_empty())
    }

    fn show_plan_raw(&self, _plan: &Path) -> Result<String> {
        self.check("show_plan_raw")?;
        let changes = self.lock().changes();
        let mut text = String::new();
        for change in &changes {
            let verb = if change.is_delete() { "destroyed" } else { "created" };
            text.push_str(&format!("  # {} will be {}\n", change.address, verb));
        }
        Ok(text)
    }

    fn show_plan(&self, _plan: &Path) -> Result<Plan> {
        self.check("show_plan")?;
        Ok(Plan {
            resource_changes: self.lock().changes(),
            other: serde_json::Map::new(),
        })
    }

    fn apply(&self, _plan: &Path) -> Result<()> {
        self.check("apply")?;
        let mut sim = self.lock();
        let desired: Vec<String> = sim.desired.iter().cloned().collect();
        sim.tracked.extend(desired);
        let deletes: Vec<String> = sim.deletes.iter().cloned().collect();
        for address in deletes {
            sim.tracked.remove(&address);
        }
        sim.deletes.clear();
        sim.applied = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;

    const WS: &str = "tfe_workspace.workspace[\"demo\"]";

    #[test]
    fn test_mock_empty_state() {
        let mock = MockExecutor::new();
        let state = mock.show().unwrap();
        assert!(state.values.is_none());
    }

    #[test]
    fn test_mock_import_tracks_address() {
        let mock = MockExecutor::new();
        mock.import(WS, "ws-1", &[Var::new("a", "b")]).unwrap();

        let state = mock.show().unwrap();
        assert_eq!(state.addresses().collect::<Vec<_>>(), vec![WS]);
        assert_eq!(mock.imports(), vec![(WS.to_string(), "ws-1".to_string())]);
        assert_eq!(mock.last_import_vars(), Some(vec![Var::new("a", "b")]));
    }

    #[test]
    fn test_mock_double_import_fails() {
        let mock = MockExecutor::new();
        mock.import(WS, "ws-1", &[]).unwrap();
        assert!(mock.import(WS, "ws-1", &[]).is_err());
        assert_eq!(mock.import_count(), 1);
    }

    #[test]
    fn test_mock_plan_creates_untracked() {
        let mock = MockExecutor::new();
        mock.desire(WS);
        let out = Path::new("plan.tfplan");

        assert!(mock.plan(&[], out).unwrap());
        let plan = mock.show_plan(out).unwrap();
        assert_eq!(plan.resource_changes.len(), 1);
        assert_eq!(plan.resource_changes[0].change.actions, vec![Action::Create]);
        assert_eq!(plan.resource_changes[0].resource_type, "tfe_workspace");
        assert!(mock.show_plan_raw(out).unwrap().contains("will be created"));

        mock.track(WS);
        assert!(!mock.plan(&[], out).unwrap());
    }

    #[test]
    fn test_mock_apply_converges() {
        let mock = MockExecutor::new();
        mock.desire(WS);
        mock.plan_delete("tfe_workspace.workspace[\"old\"]");
        mock.track("tfe_workspace.workspace[\"old\"]");
        let out = Path::new("plan.tfplan");

        mock.apply(out).unwrap();
        assert!(mock.applied());
        assert_eq!(mock.tracked(), vec![WS.to_string()]);
        assert!(!mock.plan(&[], out).unwrap());
    }

    #[test]
    fn test_mock_fail_on() {
        let mock = MockExecutor::new();
        mock.fail_on("init");
        let err = mock.init().unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Command);
        assert_eq!(mock.init_count(), 0);
    }
}
