use anyhow::{Result, bail};
use declarative::PollConfig;
use segment_api::HttpClient;
use std::path::Path;
use std::sync::Arc;

use crate::Context;
use crate::config::Document;
use crate::resource::Registry;
use crate::ui;

pub fn run(ctx: &Context, file: &Path) -> Result<()> {
    ui::header("Validating Declarations");

    let document = Document::load(file)?;
    // Validation never reaches the API.
    let registry = Registry::new(Arc::new(HttpClient::new("", "")), PollConfig::default());

    let problems = check(&registry, &document);
    for (address, message) in &problems {
        ui::error(&format!("{address}: {message}"));
    }

    if !problems.is_empty() {
        bail!(
            "{} of {} resources are invalid",
            problems.len(),
            document.resources.len()
        );
    }

    if !ctx.quiet {
        ui::kv("file", &file.display().to_string());
        ui::kv("resources", &document.resources.len().to_string());
    }
    ui::success("All declarations are valid");
    Ok(())
}

/// Validate every declared resource, returning `(address, message)` for
/// each one that fails
pub fn check(registry: &Registry, document: &Document) -> Vec<(String, String)> {
    let mut problems = Vec::new();
    for declared in &document.resources {
        let result = registry
            .get(&declared.kind)
            .and_then(|resource| resource.validate_json(&declared.attributes_value()));
        if let Err(err) = result {
            problems.push((declared.address.clone(), format!("{err:#}")));
        }
    }
    problems
}
