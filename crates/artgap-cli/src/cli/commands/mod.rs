use super::args::*;

pub mod report;
pub mod rule;
pub(crate) mod run;
pub(crate) mod run_output;
pub(crate) mod runner_builder;

use crate::exit_codes::{CONFIG_ERROR, SUCCESS};
use artgap_core::errors::ConfigError;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Run(args) => run::run(args).await,
        Command::Rule(args) => rule::run(args).await,
        Command::Report(args) => report::run(args),
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(SUCCESS)
        }
    }
}

/// Print a configuration problem and return its exit code.
pub(crate) fn config_error(err: &ConfigError) -> i32 {
    eprintln!("config error: {err}");
    CONFIG_ERROR
}
