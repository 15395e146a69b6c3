//! Human-facing rendering for plans and apply reports

use colored::Colorize;
use groundwork_cloud::{Operation, Plan};
use groundwork_engine::{ApplyReport, ApplyStatus};

/// Render a plan as a line per action with a summary footer
pub fn render_plan(plan: &Plan) {
    println!();

    if plan.actions.is_empty() {
        println!("  {} Nothing to plan", "✓".green());
    } else {
        for action in &plan.actions {
            let symbol = match action.operation {
                Operation::Create => "+".green().to_string(),
                Operation::Update => "~".yellow().to_string(),
                Operation::Delete => "-".red().to_string(),
                Operation::Skip => "·".dimmed().to_string(),
            };
            println!(
                "  {} {:<7} {:<18} {}",
                symbol,
                action.operation.to_string(),
                action.kind.to_string(),
                action.resource_id
            );
        }

        println!();
        println!("  Summary: {}", plan.summary());
    }

    if !plan.orphaned.is_empty() {
        println!();
        println!(
            "  {} {} resource(s) recorded as applied but missing from the stack file:",
            "⚠".yellow(),
            plan.orphaned.len()
        );
        for id in &plan.orphaned {
            println!("    • {}", id);
        }
        println!("  Pass --prune to schedule their deletion.");
    }
}

/// Render an apply report, one line per action
pub fn render_report(report: &ApplyReport) {
    println!();

    for outcome in &report.outcomes {
        match &outcome.status {
            ApplyStatus::Applied => {
                println!("  {} {} {}", "✓".green(), outcome.operation, outcome.resource_id);
            }
            ApplyStatus::Deleted => {
                println!("  {} {} {}", "✓".green(), outcome.operation, outcome.resource_id);
            }
            ApplyStatus::Skipped => {
                println!(
                    "  {} {} {} {}",
                    "·".dimmed(),
                    outcome.operation,
                    outcome.resource_id,
                    "(unchanged)".dimmed()
                );
            }
            ApplyStatus::Failed { class, message } => {
                println!(
                    "  {} {} {} ({}): {}",
                    "✗".red(),
                    outcome.operation,
                    outcome.resource_id,
                    class,
                    message
                );
            }
            ApplyStatus::NotApplied => {
                println!(
                    "  {} {} {} {}",
                    "⊘".yellow(),
                    outcome.operation,
                    outcome.resource_id,
                    "(not applied)".dimmed()
                );
            }
        }
    }

    let summary = report.summary();
    println!();
    if report.cancelled {
        println!("  {} Apply cancelled", "⚠".yellow().bold());
    } else if report.is_success() {
        println!("  {} Stack applied successfully!", "✓".green().bold());
    } else {
        println!("  {} Apply stopped early", "⚠".yellow().bold());
    }

    if summary.applied > 0 {
        println!("    • {} resources applied", summary.applied);
    }
    if summary.deleted > 0 {
        println!("    • {} resources deleted", summary.deleted);
    }
    if summary.skipped > 0 {
        println!("    • {} resources unchanged", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "resources".red());
    }
    if summary.not_applied > 0 {
        println!("    • {} resources not applied", summary.not_applied);
    }
}
