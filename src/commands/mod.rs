pub mod render;
pub mod run;

/// Configuration document written into the working directory.
pub const DOCUMENT_FILE: &str = "main.tf.json";

/// Plan artifact written into the working directory.
pub const PLAN_FILE: &str = "plan.tfplan";
