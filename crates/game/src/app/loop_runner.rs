use std::process::ExitCode;

use ebb_engine::{run_app, run_headless};
use tracing::error;

use super::bootstrap::{AppWiring, RunMode};

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let AppWiring {
        config,
        mut world,
        mode,
    } = app;

    match mode {
        RunMode::ListMaps => {
            for zone in world.catalog().ids() {
                println!("{zone}");
            }
        }
        RunMode::Headless { ticks } => {
            if let Err(err) = run_headless(&mut world, ticks, config.fixed_dt()) {
                error!(error = %err, "world_stopped");
                return ExitCode::FAILURE;
            }
            match serde_json::to_string_pretty(&world.snapshot()) {
                Ok(json) => println!("{json}"),
                Err(err) => {
                    error!(error = %err, "snapshot_encode_failed");
                    return ExitCode::FAILURE;
                }
            }
        }
        RunMode::Windowed => {
            if let Err(err) = run_app(config, world) {
                error!(error = %err, "run_failed");
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}
