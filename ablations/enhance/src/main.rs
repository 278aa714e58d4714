//! 增强流水线实验编排与消融计时.
//!
//! 配置见 [`utils::config::ExperimentConfig`].

mod profile;
mod result;
mod runner;

use log::{error, info};
use std::process::ExitCode;
use utils::config::ExperimentConfig;

fn main() -> ExitCode {
    let config = match ExperimentConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Loading experiment config error: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = utils::init_logger(&config.log_level) {
        eprintln!("{e}");
    }

    let outcome = if config.ablation {
        runner::run_ablation(&config).and_then(|r| Ok(r.analyze()?))
    } else {
        runner::run_experiment(&config).map(|record| {
            info!(
                "{}: {} images enhanced, {} skipped",
                record.name, record.written, record.skipped
            );
        })
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
