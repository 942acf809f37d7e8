//! # Converge
//!
//! Declarative convergence of Terraform Cloud workspaces.
//!
//! A run turns a handful of inputs into a set of workspaces, writes a
//! configuration document describing them, binds objects that already
//! exist remotely into tracking state, and plans (optionally applies) the
//! difference.
//!
//! ## Core Concepts
//!
//! - **Expansion**: base name plus suffixes become workspaces; global and
//!   per-workspace lists become one entity per (workspace, item) pair
//! - **Document**: a single `main.tf.json` whose resources iterate over the
//!   workspace set, so its size does not grow with the number of workspaces
//! - **Reconciliation**: every untracked address is looked up remotely and
//!   imported if found, so the plan is a no-op for existing infrastructure
//! - **Guard**: a plan that deletes workspaces stops the run unless deletion
//!   is explicitly allowed
//!
//! ## Example
//!
//! ```ignore
//! use converge::{expand, synthesize, pipeline, Context, ExpandInput, NoProgress, SynthInput};
//!
//! let mut expanded = expand(&ExpandInput {
//!     name: "demo".into(),
//!     suffixes: vec!["staging".into(), "production".into()],
//!     ..Default::default()
//! })?;
//!
//! let doc = synthesize(&client, &expanded, &synth_input)?;
//! std::fs::write(dir.join("main.tf.json"), doc.to_json_pretty()?)?;
//!
//! let ctx = Context::new("acme", &client, &executor).with_vars(expanded.vars()?);
//! let report = pipeline::run(&ctx, &mut expanded, &RunOptions::default(), &mut NoProgress)?;
//! ```
//!
//! Both seams are traits: [`tfe::Backend`] for the remote API and
//! [`tfexec::Executor`] for the execution tool, with in-memory mocks of
//! each for tests.

pub mod context;
pub mod document;
pub mod error;
pub mod expand;
pub mod guard;
pub mod model;
pub mod pipeline;
pub mod reconcile;
pub mod synth;

// Re-export main types at crate root
pub use context::{Context, NoProgress, ProgressCallback, Step};
pub use document::{Block, Document, WORKSPACE_NAMES_VAR, WORKSPACE_TAGS_VAR};
pub use error::{Error, ErrorCategory, Result};
pub use expand::{ExpandInput, Expanded, TagInput, TeamAccessInput, VariableInput, expand};
pub use model::{
    AccessGrant, Backend, Category, Permissions, Provider, RemoteStateReference, Tag, Variable,
    WORKSPACE_KIND, Workspace,
};
pub use pipeline::{RunOptions, RunReport};
pub use reconcile::{ImportOutcome, ImportSummary, SkipReason};
pub use synth::{SynthInput, VcsOptions, WorkspaceOptions, synthesize};
