//! # chromasim
//!
//! A biologically-inspired model of color-opponent visual processing: four
//! retinotopic V1 opponent channels drive six hue-selective V4
//! excitatory/inhibitory population pairs, with synapse-level connectivity
//! derived procedurally from grid geometry instead of an adjacency list.
//!
//! The crate builds the topology once against an external simulation
//! engine, then runs a closed frame loop: read a raw video frame, compute
//! per-channel firing rates, inject them into V1, advance simulated time
//! by one frame duration, and checkpoint network state once mid-run.
//!
//! ## Quick Start
//!
//! ```no_run
//! use chromasim::prelude::*;
//!
//! let mut engine = StubEngine::new();
//! let topology = TopologyBuilder::default().build(&mut engine)?;
//!
//! let mut orchestrator = Orchestrator::new(RunConfig::default());
//! let report = orchestrator.run(
//!     &mut engine,
//!     &mut OpponentContrast::default(),
//!     &topology.v1,
//! )?;
//! println!("{} frames", report.frames_processed);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Modules
//!
//! - [`falloff`]: Table-based radial falloff approximation
//! - [`wiring`]: Geometric connection policies
//! - [`cortex`]: Populations and the topology builder
//! - [`engine`]: External engine interface and recording stub
//! - [`rates`]: Rate buffers and the rate-computation interface
//! - [`video`]: Raw RGB frame source
//! - [`snapshot`]: Checkpoint container format
//! - [`orchestrator`]: The frame-driven run loop

pub mod cortex;
pub mod engine;
pub mod falloff;
pub mod orchestrator;
pub mod rates;
pub mod snapshot;
pub mod video;
pub mod wiring;

/// Prelude module for convenient imports.
///
/// ```
/// use chromasim::prelude::*;
/// ```
pub mod prelude {
    pub use crate::cortex::{
        Grid, Hue, NeuronParams, OpponentChannel, Polarity, PopulationId, ProjectionId,
        Topology, TopologyBuilder, TopologyConfig, V1Handles,
    };
    pub use crate::engine::{stub::StubEngine, Engine, EngineError};
    pub use crate::falloff::FalloffTable;
    pub use crate::orchestrator::{Orchestrator, RunConfig, RunError, RunPhase, RunReport};
    pub use crate::rates::{OpponentContrast, OpponentRates, Placement, RateBuffer, RateFn};
    pub use crate::video::FrameSource;
    pub use crate::wiring::{ConnectionDecision, ConnectionPolicy};
}
