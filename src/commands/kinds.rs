use anyhow::Result;
use colored::Colorize;
use reconcile::{AttributeSchema, KindSpec, PolymorphicSchema, SchemaCatalog, Version};

use crate::Context;
use crate::cli::KindsArgs;
use crate::ui;

pub fn run(ctx: &Context, args: &KindsArgs) -> Result<()> {
    let catalog = ctx.config.catalog()?;
    let version = ctx.config.product_version;

    let schemas: Vec<&PolymorphicSchema> = match &args.resource {
        Some(resource) => vec![catalog.require(resource)?],
        None => catalog
            .resources()
            .into_iter()
            .filter_map(|r| catalog.schema(r))
            .collect(),
    };

    ui::header(&format!("Resource types (product version {version})"));
    for schema in schemas {
        ui::section(&schema.resource);
        for kind in &schema.kinds {
            println!("  {} {}", kind.name.bold(), kind_notes(kind, &version).dimmed());
            if args.attributes {
                for attribute in schema.fields_for(&kind.name) {
                    println!(
                        "      {:<40} {}",
                        attribute.name,
                        attribute_notes(attribute, &version).dimmed()
                    );
                }
            }
        }
    }

    Ok(())
}

fn kind_notes(kind: &KindSpec, version: &Version) -> String {
    let mut notes = Vec::new();
    if kind.adopt_only {
        notes.push("adopt-only".to_string());
    }
    if let Some(min) = &kind.min_version {
        notes.push(gate(min, version));
    }
    bracket(&notes)
}

fn attribute_notes(attribute: &AttributeSchema, version: &Version) -> String {
    let mut notes = vec![attribute.attr_type.to_string()];
    if attribute.required {
        notes.push("required".to_string());
    }
    if !attribute.allowed_values.is_empty() {
        notes.push(attribute.allowed_values.join("|"));
    }
    if let Some(min) = &attribute.min_version {
        notes.push(gate(min, version));
    }
    bracket(&notes)
}

fn gate(min: &Version, current: &Version) -> String {
    if current.satisfies(Some(min)) {
        format!("since {min}")
    } else {
        format!("since {min}, unsupported")
    }
}

fn bracket(notes: &[String]) -> String {
    if notes.is_empty() {
        String::new()
    } else {
        format!("[{}]", notes.join(", "))
    }
}
