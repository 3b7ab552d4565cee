use super::super::args::RuleArgs;
use super::config_error;
use super::run_output::execute_rules;
use super::runner_builder::build_runner;

pub async fn run(args: RuleArgs) -> anyhow::Result<i32> {
    let runner = match build_runner(&args.pipeline, Some(1)) {
        Ok(runner) => runner,
        Err(e) => return Ok(config_error(&e)),
    };
    execute_rules(runner, vec![args.rule], &args.pipeline.out, false).await
}
