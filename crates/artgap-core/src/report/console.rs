use crate::batch::{BatchSummary, RuleOutcome};
use crate::protocol::Verdict;

/// Progress line for a finished rule. Deterministic, unit-testable.
#[must_use]
pub fn format_progress_line(outcome: &RuleOutcome, done: usize, total: usize) -> String {
    match &outcome.result {
        Ok(report) => format!("[{}/{}] {} -> {}", done, total, outcome.rule, report.verdict),
        Err(e) => format!("[{}/{}] {} -> error ({})", done, total, outcome.rule, e.code()),
    }
}

/// One line per rule for the batch summary.
#[must_use]
pub fn format_outcome_line(outcome: &RuleOutcome) -> String {
    let report = match &outcome.result {
        Ok(report) => report,
        Err(e) => return format!("❌ {}: {}", outcome.rule, e),
    };

    let icon = match report.verdict {
        Verdict::ArticulationCorrect => "✅",
        Verdict::GenuineFailure => "🎯",
        Verdict::SpuriousFailure => "⚠️ ",
        Verdict::ClassificationFailed => "⏭️ ",
    };
    let mut line = format!(
        "{} {}: {:.1}% | {}",
        icon, report.rule, report.classification.accuracy, report.verdict
    );
    if let Some(record) = &report.consistency {
        line.push_str(&format!(
            " | training mismatches {}/{}",
            record.mismatch_count, record.total
        ));
    }
    line
}

pub fn print_progress(outcome: &RuleOutcome, done: usize, total: usize) {
    eprintln!("{}", format_progress_line(outcome, done, total));
}

pub fn print_batch_summary(outcomes: &[RuleOutcome]) {
    let stats = BatchSummary::from_outcomes(outcomes);

    eprintln!();
    eprintln!("{}", "=".repeat(60));
    eprintln!("BATCH SUMMARY");
    eprintln!("{}", "=".repeat(60));
    eprintln!("Total rules: {}", stats.total);
    eprintln!("Classification passed (>=90%): {}", stats.classification_passed);
    eprintln!("Classification failed: {}", stats.classification_failed);
    eprintln!("Errored: {}", stats.errored);
    for verdict in Verdict::ALL {
        eprintln!("  {:<22} {}", verdict.as_str(), stats.count(verdict));
    }
    eprintln!();
    for outcome in outcomes {
        eprintln!("  {}", format_outcome_line(outcome));
    }
}
