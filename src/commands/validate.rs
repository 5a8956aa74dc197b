use anyhow::{Result, bail};
use reconcile::{Catalog, SchemaCatalog, Version, validate};

use crate::Context;
use crate::cli::FileArgs;
use crate::declared::{Declaration, DeclaredConfig};
use crate::ui;

pub fn run(ctx: &Context, args: &FileArgs) -> Result<()> {
    let declared = DeclaredConfig::load(&args.file)?;
    let catalog = ctx.config.catalog()?;
    let version = ctx.config.product_version;

    ui::header(&format!(
        "Validating {} (product version {version})",
        args.file.display()
    ));

    let mut total = 0;
    for declaration in &declared.objects {
        let found = problems(&catalog, declaration, &version);
        if found.is_empty() {
            if ctx.verbose > 0 {
                ui::success(&declaration.address());
            }
            continue;
        }

        total += found.len();
        ui::error(&declaration.address());
        for problem in &found {
            eprintln!("    • {problem}");
        }
    }

    println!();
    if total > 0 {
        bail!(
            "{} in {}",
            ui::count(total, "violation"),
            args.file.display()
        );
    }
    if !ctx.quiet {
        ui::success(&format!(
            "{} valid",
            ui::count(declared.objects.len(), "object")
        ));
    }
    Ok(())
}

/// Every problem with one declared object, worst first
///
/// Type problems are only looked for once the object passes validation,
/// matching the order in which reconciliation would fail.
fn problems(catalog: &Catalog, declaration: &Declaration, version: &Version) -> Vec<String> {
    let Some(schema) = catalog.schema(&declaration.resource) else {
        return vec![format!(
            "unknown resource type '{}' (known: {})",
            declaration.resource,
            catalog.resources().join(", ")
        )];
    };

    let violations = validate(&declaration.object, version, schema);
    if !violations.is_empty() {
        return violations.iter().map(ToString::to_string).collect();
    }

    match schema.coerce(declaration.object.clone()) {
        Ok(_) => Vec::new(),
        Err(e) => vec![e.to_string()],
    }
}
