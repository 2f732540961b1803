//! Demo runner: builds the color-opponent topology against the recording
//! stub engine and drives the full frame loop with the built-in
//! opponent-contrast rate function. All constants are the production
//! defaults; there are no flags, environment variables or config files.

use std::fs;
use std::process;

use tracing::{error, info};

use chromasim::prelude::*;

fn main() {
    tracing_subscriber::fmt().init();

    let mut engine = StubEngine::new();
    let topology = match TopologyBuilder::default().build(&mut engine) {
        Ok(topology) => topology,
        Err(err) => {
            error!("engine setup failed: {err}");
            process::exit(1);
        }
    };
    info!(projections = topology.projections.len(), "topology ready");

    let cfg = RunConfig::default();
    if let Some(parent) = cfg.checkpoint_path.parent() {
        if let Err(err) = fs::create_dir_all(parent) {
            error!("could not create {}: {err}", parent.display());
            process::exit(1);
        }
    }

    let mut orchestrator = Orchestrator::new(cfg.clone());
    let report = match orchestrator.run(&mut engine, &mut OpponentContrast::default(), &topology.v1)
    {
        Ok(report) => report,
        Err(err) => {
            error!("{err}");
            process::exit(err.exit_code());
        }
    };

    // Persist the run summary next to the checkpoint.
    let summary_path = cfg.checkpoint_path.with_file_name("run.json");
    match serde_json::to_string_pretty(&report) {
        Ok(json) => {
            if let Err(err) = fs::write(&summary_path, json) {
                error!("could not write {}: {err}", summary_path.display());
            }
        }
        Err(err) => error!("could not serialize run report: {err}"),
    }

    info!(
        frames = report.frames_processed,
        checkpoints = report.checkpoints_written,
        simulated_ms = report.simulated_ms,
        "done"
    );
}
