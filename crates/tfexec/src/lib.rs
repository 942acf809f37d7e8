//! # tfexec
//!
//! Drive the `terraform` binary from Rust.
//!
//! This crate provides:
//! - The [`Executor`] trait covering the verbs a convergence run needs
//!   (init, show, import, plan, show plan, apply)
//! - [`TerraformCli`], which runs those verbs as subprocesses
//! - [`MockExecutor`], an in-memory stand-in for tests
//! - Typed views of `show -json` state and plan output
//!
//! ## Example
//!
//! ```no_run
//! use tfexec::{Executor, TerraformCli, Var, find_terraform};
//! use std::path::Path;
//!
//! let binary = find_terraform().expect("terraform not installed");
//! let tf = TerraformCli::new("/tmp/work", binary)
//!     .with_credentials("app.terraform.io", "token");
//!
//! tf.init().expect("init failed");
//! let out = Path::new("/tmp/work/plan.tfplan");
//! let vars = [Var::new("region", "eu-west-1")];
//! if tf.plan(&vars, out).expect("plan failed") {
//!     println!("{}", tf.show_plan_raw(out).expect("show failed"));
//! }
//! ```
//!
//! ## Testing
//!
//! ```
//! use tfexec::{Executor, MockExecutor};
//!
//! let mock = MockExecutor::new();
//! mock.import("null_resource.a", "id-1", &[]).unwrap();
//! assert_eq!(mock.show().unwrap().addresses().count(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod types;

pub use backend::cli::{TerraformCli, find_terraform, host_token_var};
pub use backend::{Executor, MockExecutor};
pub use error::{Error, ErrorCategory, Result};
pub use types::{
    Action, Change, Plan, ResourceChange, State, StateModule, StateResource, StateValues, Var,
    resource_type_of,
};
