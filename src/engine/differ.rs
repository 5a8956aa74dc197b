//! Plan and diff display

use colored::{ColoredString, Colorize};
use reconcile::{DiffSummary, Operation, OperationKind, Transition};
use std::collections::BTreeMap;

use super::planner::{ExecutionPlan, PlanItem};
use crate::ui;

fn operation_symbol(op: OperationKind) -> ColoredString {
    match op {
        OperationKind::Add => "+".green(),
        OperationKind::Remove => "-".red(),
        OperationKind::Replace => "~".yellow(),
    }
}

fn transition_symbol(transition: Transition) -> ColoredString {
    match transition {
        Transition::Create => "+".green(),
        Transition::Adopt => "⇠".cyan(),
        Transition::Update => "~".yellow(),
        Transition::Delete => "-".red(),
        Transition::NoOp | Transition::Forget => "○".dimmed(),
    }
}

/// Print one line per operation, indented under its object
pub fn display_operations(operations: &[Operation], indent: &str) {
    for op in operations {
        println!(
            "{indent}{} {:<36} {}",
            operation_symbol(op.op),
            op.field,
            op.value.to_string().dimmed()
        );
    }
}

/// One-line summary, e.g. "2 to add, 1 to remove, 3 to replace"
pub fn summary_line(summary: &DiffSummary) -> String {
    format!(
        "{} to add, {} to remove, {} to replace",
        summary.additions, summary.removals, summary.replacements
    )
}

/// Display a plan in a boxed, per-resource layout
pub fn display_plan(plan: &ExecutionPlan, prune: bool) {
    if plan.change_count(prune) == 0 {
        println!();
        println!("  {} No changes needed", "✓".green());
        if !prune && !plan.orphans.is_empty() {
            ui::dim(&format!(
                "{} managed but not declared (use --prune to release)",
                ui::count(plan.orphans.len(), "instance")
            ));
        }
        return;
    }

    // Group by resource type
    let mut by_resource: BTreeMap<&str, Vec<&PlanItem>> = BTreeMap::new();
    for item in plan.changes() {
        by_resource.entry(item.resource.as_str()).or_default().push(item);
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Configuration Plan".bold()
    );
    println!("│");

    let mut totals = DiffSummary::default();
    for (resource, items) in &by_resource {
        println!("│ {}", resource.bold());
        for item in items {
            let transition = item.change.transition;
            println!(
                "│   {} {:<30} {}",
                transition_symbol(transition),
                item.desired.id,
                format!("({}, {transition})", item.desired.kind).dimmed()
            );
            display_operations(&item.change.operations, "│       ");
            totals.merge(&DiffSummary::from_operations(&item.change.operations));
        }
        println!("│");
    }

    if prune && !plan.orphans.is_empty() {
        println!("│ {}", "Not declared".bold());
        for orphan in &plan.orphans {
            println!(
                "│   {} {:<30} {}",
                transition_symbol(orphan.transition),
                orphan.address(),
                format!("({})", orphan.transition).dimmed()
            );
        }
        println!("│");
    }

    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} ({})",
        ui::count(plan.change_count(prune), "change").bold(),
        summary_line(&totals)
    );
    println!("└─────────────────────────────────────────────────────┘");
}

/// Print every object that failed planning with its violations
pub fn display_failures(plan: &ExecutionPlan) {
    for failure in &plan.failures {
        let violations = failure.error.violations();
        if violations.is_empty() {
            ui::error(&format!("{}: {}", failure.address, failure.error));
            continue;
        }
        ui::error(&format!(
            "{}: {}",
            failure.address,
            ui::count(violations.len(), "violation")
        ));
        for violation in violations {
            eprintln!("    • {violation}");
        }
    }
}
