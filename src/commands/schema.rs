use anyhow::{Result, bail};
use colored::Colorize;

use crate::Context;
use crate::resource::{self, SCHEMAS, Schema};
use crate::ui;

pub fn run(ctx: &Context, type_name: Option<&str>) -> Result<()> {
    let schemas: Vec<&Schema> = match type_name {
        Some(name) => match resource::schema(name) {
            Some(schema) => vec![schema],
            None => bail!(
                "Unknown resource type '{name}'. Expected one of: {}",
                SCHEMAS.map(|s| s.type_name).join(", ")
            ),
        },
        None => SCHEMAS.iter().collect(),
    };

    ui::header("Resource Types");
    for schema in schemas {
        print_schema(ctx, schema);
    }
    Ok(())
}

fn print_schema(ctx: &Context, schema: &Schema) {
    ui::section(schema.type_name);
    ui::kv("id", schema.id);
    ui::kv("import", schema.import_id);
    if ctx.quiet {
        return;
    }

    for attribute in schema.attributes {
        let mut flags = Vec::new();
        if attribute.required {
            flags.push("required".yellow().to_string());
        }
        if attribute.force_new {
            flags.push("forces replacement".red().to_string());
        }
        if attribute.computed {
            flags.push("computed".blue().to_string());
        }
        println!(
            "    {:<40} {:<36} {}",
            attribute.name.bold(),
            attribute.kind.dimmed(),
            flags.join(", ")
        );
        if ctx.verbose > 0 {
            ui::dim(&format!("    {}", attribute.description));
        }
    }
}
