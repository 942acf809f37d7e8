//! Import reconciliation.
//!
//! Before planning, every entity whose address is not yet tracked is looked
//! up remotely. Objects that exist are imported so the plan treats them as
//! already provisioned; objects that do not exist are skipped and left for
//! the plan to create.
//!
//! Workspaces go first: variable and grant lookups need the workspace's
//! remote ID.

use crate::context::{Context, ProgressCallback};
use crate::error::{Error, Result};
use crate::expand::Expanded;
use crate::model::{AccessGrant, Variable, Workspace};
use serde::Serialize;
use std::fmt;
use tfexec::Executor;

/// Why an import step had nothing to bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The workspace does not exist remotely yet.
    WorkspaceMissing,
    /// The workspace exists but has no variable with this key.
    VariableMissing,
    /// The workspace exists but the team has no access grant on it.
    GrantMissing,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorkspaceMissing => write!(f, "workspace does not exist yet"),
            Self::VariableMissing => write!(f, "variable does not exist yet"),
            Self::GrantMissing => write!(f, "team access does not exist yet"),
        }
    }
}

/// Result of one import step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// The address is already in tracking state.
    AlreadyTracked,
    /// The remote object was bound to the address.
    Imported {
        /// Import ID passed to the execution tool.
        id: String,
    },
    /// Nothing to bind.
    Skipped {
        /// Why nothing was bound.
        reason: SkipReason,
    },
}

impl ImportOutcome {
    fn skipped(reason: SkipReason) -> Self {
        Self::Skipped { reason }
    }
}

/// Counts of import outcomes over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub already_tracked: usize,
    pub skipped: usize,
}

impl ImportSummary {
    /// Count one outcome.
    pub fn record(&mut self, outcome: &ImportOutcome) {
        match outcome {
            ImportOutcome::AlreadyTracked => self.already_tracked += 1,
            ImportOutcome::Imported { .. } => self.imported += 1,
            ImportOutcome::Skipped { .. } => self.skipped += 1,
        }
    }

    /// Total number of steps.
    pub fn total(&self) -> usize {
        self.imported + self.already_tracked + self.skipped
    }
}

/// Whether `address` needs an import: true unless tracking state holds it.
///
/// An empty or missing state counts as "not tracked".
pub fn should_import(executor: &dyn Executor, address: &str) -> Result<bool> {
    let state = executor.show()?;
    Ok(!state.addresses().any(|tracked| tracked == address))
}

/// Fill in the remote ID of every workspace that has none yet.
pub fn resolve_remote_ids(ctx: &Context<'_>, workspaces: &mut [Workspace]) -> Result<()> {
    for ws in workspaces.iter_mut().filter(|ws| ws.remote_id.is_none()) {
        if let Some(remote) = ctx.client.search_workspace(&ctx.organization, &ws.name)? {
            log::debug!("workspace {} is {}", ws.name, remote.id);
            ws.remote_id = Some(remote.id);
        }
    }
    Ok(())
}

/// Import a workspace by name, recording its remote ID.
pub fn import_workspace(ctx: &Context<'_>, ws: &mut Workspace) -> Result<ImportOutcome> {
    let address = ws.address();
    if !should_import(ctx.executor, &address)? {
        return Ok(ImportOutcome::AlreadyTracked);
    }

    let Some(remote) = ctx.client.find_workspace(&ctx.organization, &ws.name)? else {
        log::info!("workspace {} not found remotely, it will be created", ws.name);
        return Ok(ImportOutcome::skipped(SkipReason::WorkspaceMissing));
    };

    ctx.executor.import(&address, &remote.id, &ctx.vars)?;
    ws.remote_id = Some(remote.id.clone());
    Ok(ImportOutcome::Imported { id: remote.id })
}

/// Import a variable of a workspace whose remote ID is already resolved.
pub fn import_variable(ctx: &Context<'_>, var: &Variable, ws: &Workspace) -> Result<ImportOutcome> {
    let address = var.address();
    if !should_import(ctx.executor, &address)? {
        return Ok(ImportOutcome::AlreadyTracked);
    }

    let Some(workspace_id) = ws.remote_id.as_deref() else {
        log::info!("skipping variable {}: workspace {} does not exist yet", var.key, ws.name);
        return Ok(ImportOutcome::skipped(SkipReason::WorkspaceMissing));
    };

    let Some(remote) = ctx.client.find_variable(workspace_id, &var.key)? else {
        log::info!("variable {} not found on {}", var.key, ws.name);
        return Ok(ImportOutcome::skipped(SkipReason::VariableMissing));
    };

    let id = ctx.nested_import_id(&ws.name, &remote.id);
    ctx.executor.import(&address, &id, &ctx.vars)?;
    Ok(ImportOutcome::Imported { id })
}

/// Import a team access grant.
///
/// A grant on a workspace that does not exist yet is skipped. Once the
/// workspace exists, a grant naming an unknown team fails with
/// [`Error::TeamNotFound`].
pub fn import_grant(ctx: &Context<'_>, grant: &AccessGrant, ws: &Workspace) -> Result<ImportOutcome> {
    let address = grant.address();
    if !should_import(ctx.executor, &address)? {
        return Ok(ImportOutcome::AlreadyTracked);
    }

    let Some(workspace_id) = ws.remote_id.as_deref() else {
        log::info!("skipping team {}: workspace {} does not exist yet", grant.team_ref(), ws.name);
        return Ok(ImportOutcome::skipped(SkipReason::WorkspaceMissing));
    };

    let team = match grant.team_id.as_deref() {
        Some(id) => ctx.client.find_team_by_id(&ctx.organization, id)?,
        None => ctx.client.find_team_by_name(&ctx.organization, &grant.team_name)?,
    };
    let team = team.ok_or_else(|| Error::TeamNotFound {
        organization: ctx.organization.clone(),
        team: grant.team_ref().to_string(),
    })?;

    let Some(access) = ctx.client.find_team_access(workspace_id, &team.id)? else {
        log::info!("team {} has no access on {}", team.name, ws.name);
        return Ok(ImportOutcome::skipped(SkipReason::GrantMissing));
    };

    let id = ctx.nested_import_id(&ws.name, &access.id);
    ctx.executor.import(&address, &id, &ctx.vars)?;
    Ok(ImportOutcome::Imported { id })
}

/// Run every import pass: workspaces, then variables, then grants.
pub fn import_all<P: ProgressCallback>(
    ctx: &Context<'_>,
    expanded: &mut Expanded,
    progress: &mut P,
) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    resolve_remote_ids(ctx, &mut expanded.workspaces)?;

    for ws in &mut expanded.workspaces {
        let outcome = import_workspace(ctx, ws)?;
        progress.on_import(&ws.address(), &outcome);
        summary.record(&outcome);
    }

    for var in &expanded.variables {
        let ws = owner(expanded, &var.workspace, "variables")?;
        let outcome = import_variable(ctx, var, ws)?;
        progress.on_import(&var.address(), &outcome);
        summary.record(&outcome);
    }

    for grant in &expanded.grants {
        let ws = owner(expanded, &grant.workspace, "team_access")?;
        let outcome = import_grant(ctx, grant, ws)?;
        progress.on_import(&grant.address(), &outcome);
        summary.record(&outcome);
    }

    log::info!(
        "imports: {} imported, {} already tracked, {} skipped",
        summary.imported,
        summary.already_tracked,
        summary.skipped
    );

    Ok(summary)
}

fn owner<'e>(expanded: &'e Expanded, name: &str, field: &str) -> Result<&'e Workspace> {
    expanded.workspace(name).ok_or_else(|| Error::UnknownWorkspace {
        field: field.to_string(),
        name: name.to_string(),
    })
}
