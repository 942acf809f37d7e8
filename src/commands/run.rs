//! `run`: synthesize, import, plan and optionally apply.

use super::{DOCUMENT_FILE, PLAN_FILE};
use crate::Context;
use crate::cli::RunArgs;
use crate::progress::CliProgress;
use crate::ui;
use anyhow::{Context as _, Result};
use converge::pipeline::{self, RunOptions, RunReport};
use std::fs;
use std::path::Path;
use tfexec::TerraformCli;

pub fn run(ctx: &Context, args: RunArgs) -> Result<()> {
    let settings = args.source.load()?;
    let token = settings.token()?.to_string();
    let client = tfe::Client::new(&settings.host, token.as_str());

    let mut expanded = converge::expand(&settings.expand)?;
    let doc = converge::synthesize(&client, &expanded, &settings.synth)?;

    // Removed on drop, on every exit path
    let dir = tempfile::Builder::new()
        .prefix("tfc-workspace-")
        .tempdir()
        .context("Failed to create working directory")?;
    write_document(dir.path(), &doc.to_json_pretty()?)?;

    let binary = match args.terraform_bin {
        Some(path) => path,
        None => tfexec::find_terraform()?,
    };
    log::debug!("using {} in {}", binary.display(), dir.path().display());

    let executor = TerraformCli::new(dir.path(), binary).with_credentials(&settings.host, &token);
    let run_ctx = converge::Context::new(&settings.organization, &client, &executor)
        .with_vars(expanded.vars()?);

    let opts = RunOptions {
        import: settings.import,
        apply: settings.apply,
        allow_workspace_deletion: settings.allow_workspace_deletion,
        plan_file: dir.path().join(PLAN_FILE),
    };

    if !ctx.quiet && !args.json {
        ui::header(&format!("{} / {}", settings.organization, settings.expand.name));
        ui::kv("workspaces", &expanded.workspace_names().join(", "));
        ui::kv("variables", &expanded.variables.len().to_string());
        ui::kv("team access", &expanded.grants.len().to_string());
        println!();
    }

    let mut progress = CliProgress::new(ctx.quiet || args.json, !args.json);
    let report = pipeline::run(&run_ctx, &mut expanded, &opts, &mut progress)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !ctx.quiet {
        print_summary(&report);
    }

    Ok(())
}

fn write_document(dir: &Path, json: &str) -> Result<()> {
    let path = dir.join(DOCUMENT_FILE);
    fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))
}

fn print_summary(report: &RunReport) {
    let imports = &report.imports;
    if imports.total() > 0 {
        ui::info(&format!(
            "{}, {} already tracked, {} skipped",
            ui::count(imports.imported, "import"),
            imports.already_tracked,
            imports.skipped
        ));
    }

    if !report.has_changes {
        ui::success("No changes");
    } else if report.applied {
        ui::success("Applied");
    } else {
        ui::warn("Plan has changes; run with --apply true to apply them");
    }
}
