use super::super::args::ReportArgs;
use crate::exit_codes::SUCCESS;
use artgap_core::report::failures;

pub fn run(args: ReportArgs) -> anyhow::Result<i32> {
    let report = failures::build_report(&args.out, chrono::Utc::now())?;
    eprintln!("Total rules tested: {}", report.total_rules_tested);
    eprintln!("Genuine failures found: {}", report.genuine_failures_count);
    for failure in &report.genuine_failures {
        eprintln!(
            "  - {}: articulated \"{}\" ({} training mismatches)",
            failure.rule,
            failure.articulated_rule.as_deref().unwrap_or("N/A"),
            failure.training_mismatch_count.unwrap_or(0)
        );
    }

    match failures::save_report(&args.out, &report)? {
        Some(path) => println!("{}", path.display()),
        None => eprintln!("No genuine failures to report."),
    }
    Ok(SUCCESS)
}
