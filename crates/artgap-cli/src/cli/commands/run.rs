use super::super::args::RunArgs;
use super::config_error;
use super::run_output::execute_rules;
use super::runner_builder::build_runner;
use crate::exit_codes::CONFIG_ERROR;
use artgap_core::batch::load_rules;

pub(crate) async fn run(args: RunArgs) -> anyhow::Result<i32> {
    let rules = match load_rules(&args.rules) {
        Ok(rules) => rules,
        Err(e) => return Ok(config_error(&e)),
    };
    if rules.is_empty() {
        eprintln!("config error: no rules found in {}", args.rules.display());
        return Ok(CONFIG_ERROR);
    }

    let runner = match build_runner(&args.pipeline, args.rule_concurrency) {
        Ok(runner) => runner,
        Err(e) => return Ok(config_error(&e)),
    };

    eprintln!(
        "Running {} rule(s) from {} ({} at a time)",
        rules.len(),
        args.rules.display(),
        runner.config.rule_concurrency
    );
    execute_rules(runner, rules, &args.pipeline.out, !args.no_report).await
}
