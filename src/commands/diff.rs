use anyhow::{Result, bail};
use colored::Colorize;
use reconcile::{Catalog, DiffSummary, Operation, SchemaCatalog};

use crate::Context;
use crate::cli::DiffArgs;
use crate::declared::{DeclaredConfig, address};
use crate::engine::differ::{display_operations, summary_line};
use crate::ui;

/// How one address compares between the two files
#[derive(Debug, PartialEq, Eq)]
enum Status {
    /// Present on both sides; operations may be empty
    Compared(Vec<Operation>),
    /// Only declared; operations would create it
    Missing(Vec<Operation>),
    /// Only in the actual file
    Undeclared,
    /// Discriminator differs between the two sides
    KindChanged { from: String, to: String },
    Failed(String),
}

#[derive(Debug)]
struct Comparison {
    address: String,
    status: Status,
}

pub fn run(ctx: &Context, args: &DiffArgs) -> Result<()> {
    let desired = DeclaredConfig::load(&args.desired)?;
    let actual = DeclaredConfig::load(&args.actual)?;
    let catalog = ctx.config.catalog()?;

    let comparisons = compare(&desired, &actual, &catalog);

    let mut totals = DiffSummary::default();
    let mut failed = 0;
    ui::header(&format!(
        "{} → {}",
        args.actual.display(),
        args.desired.display()
    ));
    for comparison in &comparisons {
        match &comparison.status {
            Status::Compared(operations) if operations.is_empty() => {
                if ctx.verbose > 0 {
                    println!("  {} {}", "○".dimmed(), comparison.address);
                }
            }
            Status::Compared(operations) => {
                println!("  {} {}", "~".yellow(), comparison.address.bold());
                display_operations(operations, "      ");
                totals.merge(&DiffSummary::from_operations(operations));
            }
            Status::Missing(operations) => {
                println!(
                    "  {} {} {}",
                    "+".green(),
                    comparison.address.bold(),
                    "(not present)".dimmed()
                );
                display_operations(operations, "      ");
                totals.merge(&DiffSummary::from_operations(operations));
            }
            Status::Undeclared => println!(
                "  {} {} {}",
                "?".dimmed(),
                comparison.address,
                "(not declared)".dimmed()
            ),
            Status::KindChanged { from, to } => println!(
                "  {} {} {}",
                "!".red(),
                comparison.address.bold(),
                format!("(type {from} → {to}, needs delete and create)").red()
            ),
            Status::Failed(error) => {
                failed += 1;
                ui::error(&format!("{}: {error}", comparison.address));
            }
        }
    }

    println!();
    if failed > 0 {
        bail!("{} could not be compared", ui::count(failed, "object"));
    }
    if totals.has_changes() {
        println!("  {}", summary_line(&totals));
    } else if !ctx.quiet {
        ui::success("No differences");
    }
    Ok(())
}

/// Compare both files address by address, desired order first
fn compare(desired: &DeclaredConfig, actual: &DeclaredConfig, catalog: &Catalog) -> Vec<Comparison> {
    let mut comparisons = Vec::new();

    for declaration in &desired.objects {
        let object = &declaration.object;
        let status = match catalog.require(&declaration.resource) {
            Err(e) => Status::Failed(e.to_string()),
            Ok(schema) => match actual.find(&declaration.resource, &object.id) {
                Some(current) if current.object.kind != object.kind => Status::KindChanged {
                    from: current.object.kind.clone(),
                    to: object.kind.clone(),
                },
                Some(current) => match reconcile::diff(object, &current.object, schema) {
                    Ok(operations) => Status::Compared(operations),
                    Err(e) => Status::Failed(e.to_string()),
                },
                None => match reconcile::diff(object, &object.empty_like(), schema) {
                    Ok(operations) => Status::Missing(operations),
                    Err(e) => Status::Failed(e.to_string()),
                },
            },
        };
        comparisons.push(Comparison {
            address: declaration.address(),
            status,
        });
    }

    for current in &actual.objects {
        if desired.find(&current.resource, &current.object.id).is_none() {
            comparisons.push(Comparison {
                address: address(&current.resource, &current.object.id),
                status: Status::Undeclared,
            });
        }
    }

    comparisons
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::{AttributeValue, OperationKind};

    fn parse(toml: &str) -> DeclaredConfig {
        toml::from_str(toml).unwrap()
    }

    const DESIRED: &str = r#"
[[object]]
resource = "data_security_auditor"
type = "expired-password"
id = "expired"

[object.attributes]
enabled = true
report_file = "logs/expired"
include_attribute = ["cn", "mail"]
audit_severity = "warning"

[[object]]
resource = "passphrase_provider"
type = "environment-variable"
id = "pin"

[object.attributes]
enabled = true
environment_variable = "DS_PIN"

[[object]]
resource = "passphrase_provider"
type = "vault"
id = "moved"
"#;

    const ACTUAL: &str = r#"
[[object]]
resource = "data_security_auditor"
type = "expired-password"
id = "expired"

[object.attributes]
enabled = true
report_file = "logs/expired"
include_attribute = ["cn", "uid"]
audit_severity = "warning"

[[object]]
resource = "passphrase_provider"
type = "file-based"
id = "moved"

[[object]]
resource = "passphrase_provider"
type = "file-based"
id = "extra"
"#;

    #[test]
    fn test_compare_files() {
        let catalog = reconcile::catalog::builtin().unwrap();
        let comparisons = compare(&parse(DESIRED), &parse(ACTUAL), &catalog);

        let addresses: Vec<&str> = comparisons.iter().map(|c| c.address.as_str()).collect();
        assert_eq!(
            addresses,
            vec![
                "data_security_auditor.expired",
                "passphrase_provider.pin",
                "passphrase_provider.moved",
                "passphrase_provider.extra",
            ]
        );

        assert_eq!(
            comparisons[0].status,
            Status::Compared(vec![
                Operation::add("include_attribute", "mail"),
                Operation::remove("include_attribute", "uid"),
            ])
        );

        match &comparisons[1].status {
            Status::Missing(operations) => {
                assert_eq!(operations.len(), 2);
                assert!(operations.iter().all(|o| o.op == OperationKind::Replace));
                assert_eq!(operations[0].value, AttributeValue::Bool(true));
            }
            other => panic!("unexpected status: {other:?}"),
        }

        assert_eq!(
            comparisons[2].status,
            Status::KindChanged {
                from: "file-based".into(),
                to: "vault".into()
            }
        );
        assert_eq!(comparisons[3].status, Status::Undeclared);
    }

    #[test]
    fn test_unknown_resource_fails() {
        let catalog = reconcile::catalog::builtin().unwrap();
        let desired = parse(
            r#"
[[object]]
resource = "nope"
type = "x"
id = "y"
"#,
        );
        let comparisons = compare(&desired, &DeclaredConfig::default(), &catalog);
        assert!(matches!(comparisons[0].status, Status::Failed(_)));
    }

    #[test]
    fn test_enum_outside_allowed_set_fails() {
        let catalog = reconcile::catalog::builtin().unwrap();
        let desired = parse(
            r#"
[[object]]
resource = "data_security_auditor"
type = "filter"
id = "admins"

[object.attributes]
audit_severity = "loud"
"#,
        );
        let actual = parse(
            r#"
[[object]]
resource = "data_security_auditor"
type = "filter"
id = "admins"
"#,
        );

        let comparisons = compare(&desired, &actual, &catalog);
        match &comparisons[0].status {
            Status::Failed(error) => assert!(error.contains("loud"), "{error}"),
            other => panic!("unexpected status: {other:?}"),
        }
    }
}
