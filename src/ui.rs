use colored::{ColoredString, Colorize};
use declarative::{ApplyResult, Change, DiffSummary, ExecuteSummary};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

// ============================================================================
// Plan and Apply Output
// ============================================================================

fn change_symbol(change: &Change) -> ColoredString {
    match change {
        Change::Create => change.symbol().green(),
        Change::Update { .. } => change.symbol().yellow(),
        Change::Replace { .. } => change.symbol().magenta(),
        Change::Delete => change.symbol().red(),
        Change::NoChange => change.symbol().dimmed(),
    }
}

/// Print one planned change
pub fn change(address: &str, kind: &str, change: &Change) {
    println!(
        "  {} {:<40} {}",
        change_symbol(change),
        address,
        format!("{kind}: {change}").dimmed()
    );
}

/// Symbol and label for an apply result
pub fn describe(result: &ApplyResult) -> (&'static str, String) {
    match result {
        ApplyResult::NoChange => ("○", "unchanged".to_string()),
        ApplyResult::Created => ("✓", "created".to_string()),
        ApplyResult::Modified => ("✓", "updated".to_string()),
        ApplyResult::Replaced => ("✓", "replaced".to_string()),
        ApplyResult::Removed => ("✓", "deleted".to_string()),
        ApplyResult::Failed { error } => ("✗", format!("failed: {error}")),
        ApplyResult::Skipped { reason } => ("⊘", reason.clone()),
    }
}

/// Print one apply result
pub fn result(address: &str, result: &ApplyResult) {
    let (symbol, label) = describe(result);
    let symbol = match result {
        ApplyResult::Failed { .. } => symbol.red(),
        ApplyResult::Skipped { .. } | ApplyResult::NoChange => symbol.dimmed(),
        _ => symbol.green(),
    };
    println!("  {} {:<40} {}", symbol, address, label.dimmed());
}

/// Print the totals of a plan
pub fn plan_summary(summary: &DiffSummary) {
    println!();
    if !summary.has_changes() {
        println!("  {} No changes needed", "✓".green());
        return;
    }
    println!(
        "  Plan: {} to create, {} to update, {} to replace, {} to delete",
        summary.creates.to_string().green(),
        summary.updates.to_string().yellow(),
        summary.replaces.to_string().magenta(),
        summary.deletes.to_string().red()
    );
}

/// Print final summary
pub fn apply_summary(summary: &ExecuteSummary) {
    println!();
    if summary.is_success() {
        println!("  {} Apply complete!", "✓".green().bold());
    } else {
        println!("  {} Apply finished with errors", "⚠".yellow().bold());
    }

    if summary.created > 0 {
        println!("    • {} resources created", summary.created);
    }
    if summary.modified > 0 {
        println!("    • {} resources updated", summary.modified);
    }
    if summary.replaced > 0 {
        println!("    • {} resources replaced", summary.replaced);
    }
    if summary.removed > 0 {
        println!("    • {} resources deleted", summary.removed);
    }
    if summary.skipped > 0 {
        println!("    • {} resources skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "resources".red());
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_results() {
        assert_eq!(describe(&ApplyResult::Created), ("✓", "created".to_string()));
        assert_eq!(describe(&ApplyResult::NoChange).0, "○");

        let (symbol, label) = describe(&ApplyResult::Failed {
            error: "boom".into(),
        });
        assert_eq!(symbol, "✗");
        assert_eq!(label, "failed: boom");

        let (_, label) = describe(&ApplyResult::Skipped {
            reason: "dry run: would create".into(),
        });
        assert_eq!(label, "dry run: would create");
    }
}
