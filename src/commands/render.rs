//! `render`: print the synthesized configuration.

use crate::Context;
use crate::cli::RenderArgs;
use crate::config::Settings;
use crate::ui;
use anyhow::{Context as _, Result};
use std::fs;

pub fn run(ctx: &Context, args: RenderArgs) -> Result<()> {
    let settings = args.source.load()?;
    let json = render(&settings)?;

    match args.output {
        Some(path) => {
            fs::write(&path, &json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if !ctx.quiet {
                ui::success(&format!("Wrote {}", path.display()));
            }
        }
        None => println!("{json}"),
    }

    Ok(())
}

/// Expand and synthesize without touching tracking state.
///
/// The API is only called to look up a VCS token by provider type.
pub fn render(settings: &Settings) -> Result<String> {
    let token = settings.token.clone().unwrap_or_default();
    let client = tfe::Client::new(&settings.host, token);

    let expanded = converge::expand(&settings.expand)?;
    let doc = converge::synthesize(&client, &expanded, &settings.synth)?;
    Ok(doc.to_json_pretty()?)
}
