//! Frame-driven simulation loop.
//!
//! One control thread converts successive video frames into V1 firing
//! rates, advances the engine by one frame duration per iteration, and
//! writes a single mid-run checkpoint. There is no recovery path: an
//! incomplete frame cannot produce a valid rate vector, so every failure
//! terminates the run.

use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use crate::cortex::V1Handles;
use crate::engine::{Engine, EngineError};
use crate::rates::{OpponentRates, Placement, RateBuffer, RateFn, AUX_CHANNELS};
use crate::video::{FrameSource, BYTES_PER_PIXEL};

/// Fatal run failures, mapped one-to-one onto process exit codes.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("could not open video source {path}: {source}")]
    ResourceUnavailable { path: PathBuf, source: io::Error },
    #[error("truncated read on frame {frame}")]
    TruncatedRead { frame: u64 },
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl RunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::ResourceUnavailable { .. } => 1,
            RunError::TruncatedRead { .. } => 2,
            RunError::Engine(_) => 1,
        }
    }
}

/// Run constants. Everything is fixed at build time; the defaults are the
/// production values and tests shrink them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub width: usize,
    pub height: usize,
    /// Total frames to process: three full passes over the 256-frame clip.
    pub frame_count: u64,
    pub frame_duration_ms: u32,
    /// Iteration index at which the one checkpoint is written.
    pub checkpoint_frame: u64,
    pub video_path: PathBuf,
    pub checkpoint_path: PathBuf,
    pub placement: Placement,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            width: 32,
            height: 32,
            frame_count: 256 * 3,
            frame_duration_ms: 100,
            checkpoint_frame: 1,
            video_path: PathBuf::from("videos/colorcycle.dat"),
            checkpoint_path: PathBuf::from("results/net.dat"),
            placement: Placement::Host,
        }
    }
}

/// Loop state. `Checkpointed` is passed through during the one checkpoint
/// write and does not pause streaming; `Done` is terminal, reached after
/// the configured frame count or on any fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Streaming,
    Checkpointed,
    Done,
}

/// Summary of a completed run, persisted by the binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub frames_processed: u64,
    pub checkpoints_written: u32,
    pub simulated_ms: u64,
}

pub struct Orchestrator {
    cfg: RunConfig,
    phase: RunPhase,
    frames_processed: u64,
    checkpoints_written: u32,
    simulated_ms: u64,
}

impl Orchestrator {
    pub fn new(cfg: RunConfig) -> Self {
        Self {
            cfg,
            phase: RunPhase::Idle,
            frames_processed: 0,
            checkpoints_written: 0,
            simulated_ms: 0,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Drive the full frame loop to completion.
    ///
    /// The engine's topology must already be compiled and `v1` must name
    /// its four driven populations. Frame and rate buffers are owned here
    /// and released on every exit path, fatal errors included.
    pub fn run<E: Engine, F: RateFn>(
        &mut self,
        engine: &mut E,
        rate_fn: &mut F,
        v1: &V1Handles,
    ) -> Result<RunReport, RunError> {
        let result = self.stream(engine, rate_fn, v1);
        self.phase = RunPhase::Done;
        if let Err(err) = &result {
            error!(
                frames_processed = self.frames_processed,
                "run aborted: {err}"
            );
        }
        result
    }

    fn stream<E: Engine, F: RateFn>(
        &mut self,
        engine: &mut E,
        rate_fn: &mut F,
        v1: &V1Handles,
    ) -> Result<RunReport, RunError> {
        let cfg = self.cfg.clone();
        let units = cfg.width * cfg.height;
        let mut frame = vec![0u8; units * BYTES_PER_PIXEL];
        let mut rates = OpponentRates::new(units, cfg.placement);
        let mut aux = RateBuffer::new(units * AUX_CHANNELS, cfg.placement);

        if cfg.frame_count == 0 {
            return Ok(RunReport {
                frames_processed: 0,
                checkpoints_written: 0,
                simulated_ms: 0,
            });
        }

        // Opened once for the whole run; a failure here is fatal before
        // any frame is counted.
        let mut src = FrameSource::open(&cfg.video_path, cfg.width, cfg.height).map_err(
            |source| RunError::ResourceUnavailable {
                path: cfg.video_path.clone(),
                source,
            },
        )?;
        info!(path = %cfg.video_path.display(), "video source opened");
        self.phase = RunPhase::Streaming;

        for i in 0..cfg.frame_count {
            src.read_frame(&mut frame)
                .map_err(|_| RunError::TruncatedRead { frame: i })?;

            // Synchronous: the four channel vectors and the aux vector are
            // complete when this returns.
            rate_fn.compute(
                cfg.width,
                cfg.height,
                &frame,
                &mut rates,
                &mut aux,
                cfg.placement,
            );

            for (channel, buffer) in rates.channels() {
                engine.inject_rates(v1.get(channel), buffer, true);
            }

            // Advance by exactly one frame duration; ask for a progress
            // summary whenever cumulative time crosses a whole second.
            let dur = u64::from(cfg.frame_duration_ms);
            let summary = ((i + 1) * dur) % 1000 == 0;
            engine.advance(cfg.frame_duration_ms / 1000, cfg.frame_duration_ms % 1000, summary);
            self.simulated_ms += dur;

            if i == cfg.checkpoint_frame {
                self.phase = RunPhase::Checkpointed;
                engine.checkpoint(&cfg.checkpoint_path)?;
                self.checkpoints_written += 1;
                info!(
                    path = %cfg.checkpoint_path.display(),
                    frame = i,
                    "checkpoint written"
                );
                self.phase = RunPhase::Streaming;
            }

            self.frames_processed += 1;
        }

        info!(
            frames = self.frames_processed,
            simulated_ms = self.simulated_ms,
            "run complete"
        );
        Ok(RunReport {
            frames_processed: self.frames_processed,
            checkpoints_written: self.checkpoints_written,
            simulated_ms: self.simulated_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cortex::Grid;
    use crate::engine::stub::StubEngine;
    use crate::rates::OpponentContrast;
    use std::fs;
    use std::path::Path;

    const SIDE: usize = 4;

    fn test_config(name: &str, frame_count: u64) -> RunConfig {
        let dir = std::env::temp_dir();
        RunConfig {
            width: SIDE,
            height: SIDE,
            frame_count,
            frame_duration_ms: 100,
            checkpoint_frame: 1,
            video_path: dir.join(format!("chromasim_{}_{}_video.dat", name, std::process::id())),
            checkpoint_path: dir.join(format!("chromasim_{}_{}_net.dat", name, std::process::id())),
            placement: Placement::Host,
        }
    }

    fn write_video(path: &Path, frames: usize, extra_bytes: usize) {
        let frame_len = SIDE * SIDE * 3;
        let mut data = Vec::with_capacity(frames * frame_len + extra_bytes);
        for f in 0..frames {
            for _ in 0..SIDE * SIDE {
                // Alternate red and green frames.
                if f % 2 == 0 {
                    data.extend_from_slice(&[255, 0, 0]);
                } else {
                    data.extend_from_slice(&[0, 255, 0]);
                }
            }
        }
        data.extend(std::iter::repeat(0u8).take(extra_bytes));
        fs::write(path, data).unwrap();
    }

    fn driven_v1(engine: &mut StubEngine) -> V1Handles {
        let grid = Grid::square(SIDE);
        V1Handles {
            red_green: engine.create_driven_population("red-green-cells", grid),
            blue_yellow: engine.create_driven_population("blue-yellow-cells", grid),
            green_red: engine.create_driven_population("green-red-cells", grid),
            yellow_blue: engine.create_driven_population("yellow-blue-cells", grid),
        }
    }

    fn cleanup(cfg: &RunConfig) {
        let _ = fs::remove_file(&cfg.video_path);
        let _ = fs::remove_file(&cfg.checkpoint_path);
    }

    #[test]
    fn full_run_processes_every_frame_and_checkpoints_once() {
        let cfg = test_config("full", 30);
        write_video(&cfg.video_path, 30, 0);

        let mut engine = StubEngine::new();
        let v1 = driven_v1(&mut engine);
        let mut orchestrator = Orchestrator::new(cfg.clone());
        assert_eq!(orchestrator.phase(), RunPhase::Idle);

        let report = orchestrator
            .run(&mut engine, &mut OpponentContrast::default(), &v1)
            .expect("run");

        assert_eq!(report.frames_processed, 30);
        assert_eq!(report.checkpoints_written, 1);
        assert_eq!(report.simulated_ms, 3000);
        assert_eq!(orchestrator.phase(), RunPhase::Done);
        assert_eq!(engine.checkpoints_written(), 1);
        assert!(cfg.checkpoint_path.exists());
        cleanup(&cfg);
    }

    #[test]
    fn clock_advances_one_frame_duration_per_iteration() {
        let cfg = test_config("clock", 25);
        write_video(&cfg.video_path, 25, 0);

        let mut engine = StubEngine::new();
        let v1 = driven_v1(&mut engine);
        Orchestrator::new(cfg.clone())
            .run(&mut engine, &mut OpponentContrast::default(), &v1)
            .expect("run");

        let calls = engine.advance_calls();
        assert_eq!(calls.len(), 25);
        for (i, call) in calls.iter().enumerate() {
            assert_eq!(call.seconds, 0);
            assert_eq!(call.millis, 100);
            // Summary exactly when cumulative 100 ms steps cross a second.
            assert_eq!(call.summary, (i + 1) % 10 == 0);
        }
        assert_eq!(engine.simulated_ms(), 2500);
        cleanup(&cfg);
    }

    #[test]
    fn rates_are_injected_per_channel_with_refresh() {
        let cfg = test_config("inject", 3);
        write_video(&cfg.video_path, 3, 0);

        let mut engine = StubEngine::new();
        let v1 = driven_v1(&mut engine);
        Orchestrator::new(cfg.clone())
            .run(&mut engine, &mut OpponentContrast::default(), &v1)
            .expect("run");

        let calls = engine.inject_calls();
        assert_eq!(calls.len(), 3 * 4);
        for call in calls {
            assert_eq!(call.len, SIDE * SIDE);
            assert!(call.refresh);
        }
        // Each frame drives all four channels exactly once.
        let first_frame = &calls[0..4];
        assert_eq!(first_frame[0].population, v1.red_green);
        assert_eq!(first_frame[1].population, v1.green_red);
        assert_eq!(first_frame[2].population, v1.blue_yellow);
        assert_eq!(first_frame[3].population, v1.yellow_blue);
        cleanup(&cfg);
    }

    #[test]
    fn missing_video_fails_with_exit_code_one_and_zero_frames() {
        let mut cfg = test_config("missing", 10);
        cfg.video_path = std::env::temp_dir().join("chromasim_does_not_exist.dat");

        let mut engine = StubEngine::new();
        let v1 = driven_v1(&mut engine);
        let mut orchestrator = Orchestrator::new(cfg.clone());
        let err = orchestrator
            .run(&mut engine, &mut OpponentContrast::default(), &v1)
            .unwrap_err();

        assert!(matches!(err, RunError::ResourceUnavailable { .. }));
        assert_eq!(err.exit_code(), 1);
        assert_eq!(orchestrator.frames_processed(), 0);
        assert_eq!(orchestrator.phase(), RunPhase::Done);
        assert!(engine.advance_calls().is_empty());
        cleanup(&cfg);
    }

    #[test]
    fn short_read_on_frame_k_leaves_k_minus_one_frames_processed() {
        let cfg = test_config("short", 10);
        // Five full frames plus half a frame: frame index 5 is short.
        write_video(&cfg.video_path, 5, SIDE * SIDE * 3 / 2);

        let mut engine = StubEngine::new();
        let v1 = driven_v1(&mut engine);
        let mut orchestrator = Orchestrator::new(cfg.clone());
        let err = orchestrator
            .run(&mut engine, &mut OpponentContrast::default(), &v1)
            .unwrap_err();

        assert!(matches!(err, RunError::TruncatedRead { frame: 5 }));
        assert_eq!(err.exit_code(), 2);
        assert_eq!(orchestrator.frames_processed(), 5);
        assert_eq!(engine.advance_calls().len(), 5);
        assert_eq!(orchestrator.phase(), RunPhase::Done);
        cleanup(&cfg);
    }

    #[test]
    fn checkpoint_frame_beyond_run_means_no_checkpoint() {
        let mut cfg = test_config("nockpt", 3);
        cfg.checkpoint_frame = 100;
        write_video(&cfg.video_path, 3, 0);

        let mut engine = StubEngine::new();
        let v1 = driven_v1(&mut engine);
        let report = Orchestrator::new(cfg.clone())
            .run(&mut engine, &mut OpponentContrast::default(), &v1)
            .expect("run");

        assert_eq!(report.checkpoints_written, 0);
        assert!(!cfg.checkpoint_path.exists());
        cleanup(&cfg);
    }
}
