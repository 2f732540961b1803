//! Interface to the external simulation engine.
//!
//! Membrane dynamics, synaptic integration and accelerator execution all
//! live behind [`Engine`]; this crate only creates populations and
//! projections through it, injects rates, advances simulated time and asks
//! for checkpoints. Every call is synchronous from the caller's point of
//! view; whatever the engine parallelizes internally is joined before the
//! call returns.

use std::path::Path;

use thiserror::Error;

use crate::cortex::{Grid, NeuronParams, Polarity, PopulationId, ProjectionId, SearchWindow, SynapseKind};
use crate::rates::RateBuffer;
use crate::wiring::ConnectionPolicy;

/// Failures inside the engine. All of them are fatal for the run; there is
/// no retry path anywhere in this core.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("network compile failed: {0}")]
    Compile(String),
    #[error("checkpoint write failed: {0}")]
    Checkpoint(#[from] std::io::Error),
}

pub trait Engine {
    /// Create a population with no intrinsic dynamics, driven by externally
    /// injected rates.
    fn create_driven_population(&mut self, name: &str, grid: Grid) -> PopulationId;

    /// Create a dynamical population with the given parameter tuple.
    fn create_population(
        &mut self,
        name: &str,
        grid: Grid,
        polarity: Polarity,
        params: NeuronParams,
    ) -> PopulationId;

    /// Register a projection. The engine invokes `policy` once per
    /// candidate (source unit, destination unit) pair inside `window` when
    /// it materializes synapses; decisions must not depend on sweep order.
    fn connect(
        &mut self,
        src: PopulationId,
        dst: PopulationId,
        policy: ConnectionPolicy,
        kind: SynapseKind,
        window: SearchWindow,
    ) -> ProjectionId;

    fn set_graded_conductances(&mut self, enabled: bool);
    fn set_weight_plasticity(&mut self, enabled: bool);
    fn set_short_term_plasticity(&mut self, enabled: bool);

    /// Finalize the topology. No populations or projections may be added
    /// afterwards.
    fn compile(&mut self) -> Result<(), EngineError>;

    /// Replace (`refresh = true`) or accumulate the instantaneous firing
    /// rates of a driven population.
    fn inject_rates(&mut self, population: PopulationId, rates: &RateBuffer, refresh: bool);

    /// Advance simulated time by `seconds` plus `millis`, optionally
    /// printing a progress summary.
    fn advance(&mut self, seconds: u32, millis: u32, summary: bool);

    /// Write a full snapshot of network state. Format is engine-defined.
    fn checkpoint(&mut self, path: &Path) -> Result<(), EngineError>;
}

pub mod stub {
    //! Recording engine used by tests and the demo binary.
    //!
    //! Performs the candidate-pair sweep and checkpoint serialization of a
    //! real engine but no neuron dynamics: `advance` only moves the clock.

    use std::fs::File;
    use std::io::BufWriter;
    use std::path::Path;

    use tracing::debug;

    use super::{Engine, EngineError};
    use crate::cortex::{
        Grid, NeuronParams, Polarity, PopulationId, ProjectionId, SearchWindow, SynapseKind,
    };
    use crate::rates::RateBuffer;
    use crate::snapshot;
    use crate::wiring::ConnectionPolicy;

    #[derive(Debug, Clone)]
    pub struct PopulationRecord {
        pub name: String,
        pub grid: Grid,
        pub polarity: Polarity,
        pub params: Option<NeuronParams>,
    }

    #[derive(Debug, Clone)]
    pub struct ProjectionRecord {
        pub src: PopulationId,
        pub dst: PopulationId,
        pub policy: ConnectionPolicy,
        pub kind: SynapseKind,
        pub window: SearchWindow,
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct Synapse {
        pub src_unit: u32,
        pub dst_unit: u32,
        pub weight: f32,
        pub delay: f32,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AdvanceCall {
        pub seconds: u32,
        pub millis: u32,
        pub summary: bool,
    }

    #[derive(Debug, Clone, Copy)]
    pub struct InjectCall {
        pub population: PopulationId,
        pub len: usize,
        pub refresh: bool,
    }

    #[derive(Debug, Default)]
    pub struct StubEngine {
        populations: Vec<PopulationRecord>,
        projections: Vec<ProjectionRecord>,
        graded_conductances: bool,
        weight_plasticity: bool,
        short_term_plasticity: bool,
        compile_count: u32,
        advance_calls: Vec<AdvanceCall>,
        inject_calls: Vec<InjectCall>,
        simulated_ms: u64,
        checkpoints_written: u32,
    }

    impl StubEngine {
        pub fn new() -> Self {
            Self {
                // Plasticity starts enabled so that the network-wide
                // disable during topology build is observable.
                weight_plasticity: true,
                short_term_plasticity: true,
                ..Self::default()
            }
        }

        pub fn populations(&self) -> &[PopulationRecord] {
            &self.populations
        }

        pub fn projections(&self) -> &[ProjectionRecord] {
            &self.projections
        }

        pub fn graded_conductances(&self) -> bool {
            self.graded_conductances
        }

        pub fn weight_plasticity(&self) -> bool {
            self.weight_plasticity
        }

        pub fn short_term_plasticity(&self) -> bool {
            self.short_term_plasticity
        }

        pub fn compile_count(&self) -> u32 {
            self.compile_count
        }

        pub fn advance_calls(&self) -> &[AdvanceCall] {
            &self.advance_calls
        }

        pub fn inject_calls(&self) -> &[InjectCall] {
            &self.inject_calls
        }

        pub fn simulated_ms(&self) -> u64 {
            self.simulated_ms
        }

        pub fn checkpoints_written(&self) -> u32 {
            self.checkpoints_written
        }

        /// Materialize one projection by sweeping the search window around
        /// every destination unit and keeping the connected decisions.
        pub fn materialize(&self, projection: ProjectionId) -> Vec<Synapse> {
            let proj = &self.projections[projection.0];
            let src_grid = self.populations[proj.src.0].grid;
            let dst_grid = self.populations[proj.dst.0].grid;
            let mut synapses = Vec::new();

            for dy in 0..dst_grid.height {
                for dx in 0..dst_grid.width {
                    let dst_unit = dy * dst_grid.width + dx;
                    let x0 = dx.saturating_sub(proj.window.x);
                    let x1 = (dx + proj.window.x).min(src_grid.width - 1);
                    let y0 = dy.saturating_sub(proj.window.y);
                    let y1 = (dy + proj.window.y).min(src_grid.height - 1);

                    for sy in y0..=y1 {
                        for sx in x0..=x1 {
                            let src_unit = sy * src_grid.width + sx;
                            let d = proj.policy.decide(src_unit, dst_unit);
                            if d.connected {
                                synapses.push(Synapse {
                                    src_unit: src_unit as u32,
                                    dst_unit: dst_unit as u32,
                                    weight: d.weight,
                                    delay: d.delay,
                                });
                            }
                        }
                    }
                }
            }
            synapses
        }
    }

    impl Engine for StubEngine {
        fn create_driven_population(&mut self, name: &str, grid: Grid) -> PopulationId {
            let id = PopulationId(self.populations.len());
            self.populations.push(PopulationRecord {
                name: name.to_string(),
                grid,
                polarity: Polarity::Driven,
                params: None,
            });
            id
        }

        fn create_population(
            &mut self,
            name: &str,
            grid: Grid,
            polarity: Polarity,
            params: NeuronParams,
        ) -> PopulationId {
            let id = PopulationId(self.populations.len());
            self.populations.push(PopulationRecord {
                name: name.to_string(),
                grid,
                polarity,
                params: Some(params),
            });
            id
        }

        fn connect(
            &mut self,
            src: PopulationId,
            dst: PopulationId,
            policy: ConnectionPolicy,
            kind: SynapseKind,
            window: SearchWindow,
        ) -> ProjectionId {
            let id = ProjectionId(self.projections.len());
            self.projections.push(ProjectionRecord {
                src,
                dst,
                policy,
                kind,
                window,
            });
            id
        }

        fn set_graded_conductances(&mut self, enabled: bool) {
            self.graded_conductances = enabled;
        }

        fn set_weight_plasticity(&mut self, enabled: bool) {
            self.weight_plasticity = enabled;
        }

        fn set_short_term_plasticity(&mut self, enabled: bool) {
            self.short_term_plasticity = enabled;
        }

        fn compile(&mut self) -> Result<(), EngineError> {
            if self.compile_count > 0 {
                return Err(EngineError::Compile(
                    "topology already finalized".to_string(),
                ));
            }
            self.compile_count += 1;
            debug!(
                populations = self.populations.len(),
                projections = self.projections.len(),
                "stub engine compiled"
            );
            Ok(())
        }

        fn inject_rates(&mut self, population: PopulationId, rates: &RateBuffer, refresh: bool) {
            debug_assert_eq!(
                rates.len(),
                self.populations[population.0].grid.unit_count(),
                "rate buffer length must match population unit count"
            );
            self.inject_calls.push(InjectCall {
                population,
                len: rates.len(),
                refresh,
            });
        }

        fn advance(&mut self, seconds: u32, millis: u32, summary: bool) {
            self.simulated_ms += u64::from(seconds) * 1000 + u64::from(millis);
            self.advance_calls.push(AdvanceCall {
                seconds,
                millis,
                summary,
            });
        }

        fn checkpoint(&mut self, path: &Path) -> Result<(), EngineError> {
            let file = File::create(path)?;
            let mut w = BufWriter::new(file);
            snapshot::write_header(&mut w)?;

            let mut modes = Vec::new();
            modes.push(self.graded_conductances as u8);
            modes.push(self.weight_plasticity as u8);
            modes.push(self.short_term_plasticity as u8);
            snapshot::write_u64_le(&mut modes, self.simulated_ms)?;
            snapshot::write_u64_le(&mut modes, self.advance_calls.len() as u64)?;
            snapshot::write_chunk(&mut w, snapshot::CHUNK_MODES, &modes)?;

            let mut pops = Vec::new();
            snapshot::write_u32_le(&mut pops, self.populations.len() as u32)?;
            for p in &self.populations {
                snapshot::write_string(&mut pops, &p.name)?;
                snapshot::write_u32_le(&mut pops, p.grid.width as u32)?;
                snapshot::write_u32_le(&mut pops, p.grid.height as u32)?;
                let polarity = match p.polarity {
                    Polarity::Excitatory => 0u8,
                    Polarity::Inhibitory => 1,
                    Polarity::Driven => 2,
                };
                pops.push(polarity);
                match p.params {
                    Some(params) => {
                        pops.push(1);
                        snapshot::write_f32_le(&mut pops, params.a)?;
                        snapshot::write_f32_le(&mut pops, params.b)?;
                        snapshot::write_f32_le(&mut pops, params.c)?;
                        snapshot::write_f32_le(&mut pops, params.d)?;
                    }
                    None => pops.push(0),
                }
            }
            snapshot::write_chunk(&mut w, snapshot::CHUNK_POPULATIONS, &pops)?;

            let mut syns = Vec::new();
            snapshot::write_u32_le(&mut syns, self.projections.len() as u32)?;
            for (idx, p) in self.projections.iter().enumerate() {
                let synapses = self.materialize(ProjectionId(idx));
                snapshot::write_u32_le(&mut syns, p.src.0 as u32)?;
                snapshot::write_u32_le(&mut syns, p.dst.0 as u32)?;
                snapshot::write_u64_le(&mut syns, synapses.len() as u64)?;
                for s in &synapses {
                    snapshot::write_u32_le(&mut syns, s.src_unit)?;
                    snapshot::write_u32_le(&mut syns, s.dst_unit)?;
                    snapshot::write_f32_le(&mut syns, s.weight)?;
                    snapshot::write_f32_le(&mut syns, s.delay)?;
                }
            }
            snapshot::write_chunk(&mut w, snapshot::CHUNK_SYNAPSES, &syns)?;

            self.checkpoints_written += 1;
            Ok(())
        }
    }

}
