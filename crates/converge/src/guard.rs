//! Destructive change guard.

use crate::error::{Error, Result};
use tfexec::Plan;

/// Addresses of `kind` resources the plan deletes, including replacements.
pub fn destroyed_addresses<'p>(plan: &'p Plan, kind: &str) -> Vec<&'p str> {
    plan.resource_changes
        .iter()
        .filter(|change| change.resource_type == kind && change.is_delete())
        .map(|change| change.address.as_str())
        .collect()
}

/// Fail with [`Error::DestructiveActionBlocked`] when the plan deletes any
/// `kind` resource and `allow_deletion` is not set.
pub fn check(plan: &Plan, kind: &str, allow_deletion: bool) -> Result<()> {
    let destroyed = destroyed_addresses(plan, kind);
    if destroyed.is_empty() {
        return Ok(());
    }

    if allow_deletion {
        log::warn!("plan deletes {} {kind} resources, deletion allowed", destroyed.len());
        return Ok(());
    }

    Err(Error::DestructiveActionBlocked {
        resource_type: kind.to_string(),
        addresses: destroyed.into_iter().map(String::from).collect(),
    })
}
