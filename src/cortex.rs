//! Population and projection model of the color-opponent network.
//!
//! The network has two layers: a retinotopic V1 layer of four externally
//! driven opponent-channel populations, and a V4 layer of six hue-selective
//! excitatory/inhibitory population pairs. [`TopologyBuilder`] creates all
//! populations and projections against an [`Engine`] once at startup; the
//! engine owns the authoritative network state afterwards.

use std::sync::Arc;

use tracing::info;

use crate::engine::{Engine, EngineError};
use crate::falloff::FalloffTable;
use crate::wiring::ConnectionPolicy;

/// Side length of both the V1 and V4 grids.
pub const GRID_SIDE: usize = 32;

/// Handle to a population owned by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PopulationId(pub usize);

/// Handle to a projection owned by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProjectionId(pub usize);

/// Spatial extent of a population. Units are addressed by flat row-major
/// index over `width × height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    pub width: usize,
    pub height: usize,
}

impl Grid {
    pub const fn square(side: usize) -> Self {
        Self {
            width: side,
            height: side,
        }
    }

    pub const fn unit_count(&self) -> usize {
        self.width * self.height
    }
}

/// Dynamical role of a population.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Excitatory,
    Inhibitory,
    /// No intrinsic dynamics; driven by externally injected rates.
    Driven,
}

/// Izhikevich-style neuron parameter tuple. Two canonical regimes are used
/// network-wide, one per polarity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeuronParams {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
}

impl NeuronParams {
    /// Regular-spiking excitatory regime.
    pub const EXCITATORY: Self = Self {
        a: 0.02,
        b: 0.2,
        c: -65.0,
        d: 8.0,
    };

    /// Fast-spiking inhibitory regime.
    pub const INHIBITORY: Self = Self {
        a: 0.1,
        b: 0.2,
        c: -65.0,
        d: 2.0,
    };
}

/// Synapse-type tag for a projection. The whole network is non-plastic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynapseKind {
    Fixed,
}

/// Bounds, in grid units per axis, of the candidate-pair sweep the engine
/// performs around each destination unit when materializing a projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchWindow {
    pub x: usize,
    pub y: usize,
}

/// The four V1 color-opponent input channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpponentChannel {
    RedGreen,
    BlueYellow,
    GreenRed,
    YellowBlue,
}

impl OpponentChannel {
    pub const ALL: [OpponentChannel; 4] = [
        OpponentChannel::RedGreen,
        OpponentChannel::BlueYellow,
        OpponentChannel::GreenRed,
        OpponentChannel::YellowBlue,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            OpponentChannel::RedGreen => "red-green-cells",
            OpponentChannel::BlueYellow => "blue-yellow-cells",
            OpponentChannel::GreenRed => "green-red-cells",
            OpponentChannel::YellowBlue => "yellow-blue-cells",
        }
    }
}

/// The six V4 hue categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hue {
    Magenta,
    Blue,
    Cyan,
    Green,
    Yellow,
    Red,
}

impl Hue {
    pub const ALL: [Hue; 6] = [
        Hue::Magenta,
        Hue::Blue,
        Hue::Cyan,
        Hue::Green,
        Hue::Yellow,
        Hue::Red,
    ];

    pub fn excitatory_name(&self) -> &'static str {
        match self {
            Hue::Magenta => "Ev4magenta",
            Hue::Blue => "Ev4blue",
            Hue::Cyan => "Ev4cyan",
            Hue::Green => "Ev4green",
            Hue::Yellow => "Ev4yellow",
            Hue::Red => "Ev4red",
        }
    }

    pub fn inhibitory_name(&self) -> &'static str {
        match self {
            Hue::Magenta => "Iv4magenta",
            Hue::Blue => "Iv4blue",
            Hue::Cyan => "Iv4cyan",
            Hue::Green => "Iv4green",
            Hue::Yellow => "Iv4yellow",
            Hue::Red => "Iv4red",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// Handles to the four driven V1 populations, one per opponent channel.
#[derive(Debug, Clone, Copy)]
pub struct V1Handles {
    pub red_green: PopulationId,
    pub blue_yellow: PopulationId,
    pub green_red: PopulationId,
    pub yellow_blue: PopulationId,
}

impl V1Handles {
    pub fn get(&self, channel: OpponentChannel) -> PopulationId {
        match channel {
            OpponentChannel::RedGreen => self.red_green,
            OpponentChannel::BlueYellow => self.blue_yellow,
            OpponentChannel::GreenRed => self.green_red,
            OpponentChannel::YellowBlue => self.yellow_blue,
        }
    }
}

/// Handles produced by [`TopologyBuilder::build`].
#[derive(Debug, Clone)]
pub struct Topology {
    pub v1: V1Handles,
    pub v4_excitatory: [PopulationId; 6],
    pub v4_inhibitory: [PopulationId; 6],
    pub projections: Vec<ProjectionId>,
}

impl Topology {
    pub fn excitatory(&self, hue: Hue) -> PopulationId {
        self.v4_excitatory[hue.index()]
    }

    pub fn inhibitory(&self, hue: Hue) -> PopulationId {
        self.v4_inhibitory[hue.index()]
    }
}

/// Wiring constants. All values are fixed at build time; there is no
/// external configuration surface.
#[derive(Debug, Clone, Copy)]
pub struct TopologyConfig {
    pub grid_side: usize,
    /// Base feedforward excitatory weight scale.
    pub feedforward_weight: f32,
    /// Feedforward weight scale onto inhibitory hue populations.
    pub feedforward_inhibitory_weight: f32,
    /// Base squared radius of the feedforward retinotopic kernel.
    pub base_radius_sq: f32,
    /// Lateral suppression weight scale (negative).
    pub lateral_weight: f32,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            grid_side: GRID_SIDE,
            feedforward_weight: 0.5,
            feedforward_inhibitory_weight: 0.5,
            base_radius_sq: 3.0,
            lateral_weight: -0.3,
        }
    }
}

/// Builds the full population/projection graph against an engine, exactly
/// once, before any simulation step.
#[derive(Debug, Default)]
pub struct TopologyBuilder {
    cfg: TopologyConfig,
}

impl TopologyBuilder {
    pub fn new(cfg: TopologyConfig) -> Self {
        Self { cfg }
    }

    pub fn build<E: Engine>(&self, engine: &mut E) -> Result<Topology, EngineError> {
        let cfg = &self.cfg;
        let grid = Grid::square(cfg.grid_side);
        let table = Arc::new(FalloffTable::new());

        // V1: four driven opponent-channel populations.
        let v1_ids: Vec<PopulationId> = OpponentChannel::ALL
            .iter()
            .map(|ch| engine.create_driven_population(ch.name(), grid))
            .collect();
        let v1 = V1Handles {
            red_green: v1_ids[0],
            blue_yellow: v1_ids[1],
            green_red: v1_ids[2],
            yellow_blue: v1_ids[3],
        };

        // V4: one excitatory/inhibitory pair per hue.
        let mut v4_excitatory = [PopulationId(0); 6];
        let mut v4_inhibitory = [PopulationId(0); 6];
        for hue in Hue::ALL {
            v4_excitatory[hue.index()] = engine.create_population(
                hue.excitatory_name(),
                grid,
                Polarity::Excitatory,
                NeuronParams::EXCITATORY,
            );
            v4_inhibitory[hue.index()] = engine.create_population(
                hue.inhibitory_name(),
                grid,
                Polarity::Inhibitory,
                NeuronParams::INHIBITORY,
            );
        }

        let radius = cfg.base_radius_sq.sqrt();
        let retinotopic = |weight_scale: f32| ConnectionPolicy::Retinotopic {
            src_width: grid.width,
            src_height: grid.height,
            dst_width: grid.width,
            dst_height: grid.height,
            radius,
            weight_scale,
            table: Arc::clone(&table),
        };

        let secondary = retinotopic(cfg.feedforward_weight * 1.5);
        let primary = retinotopic(cfg.feedforward_weight);
        // Yellow gets twice the base drive. Explicit special case: the
        // yellow-blue channel is weaker than the other three and needs the
        // boost to compete.
        let yellow = retinotopic(cfg.feedforward_weight * 2.0);
        let inhib = retinotopic(cfg.feedforward_inhibitory_weight);

        let window = {
            let span = (cfg.base_radius_sq * 4.0) as usize;
            SearchWindow { x: span, y: span }
        };

        let mut projections = Vec::new();
        let connect = |engine: &mut E,
                       src: PopulationId,
                       dst: PopulationId,
                       policy: &ConnectionPolicy,
                       window: SearchWindow,
                       out: &mut Vec<ProjectionId>| {
            out.push(engine.connect(src, dst, policy.clone(), SynapseKind::Fixed, window));
        };

        // Feedforward excitatory wiring. Blend hues pool two opponent
        // channels; primaries take their single matching channel.
        for (channel, hue, policy) in [
            (OpponentChannel::RedGreen, Hue::Magenta, &secondary),
            (OpponentChannel::BlueYellow, Hue::Magenta, &secondary),
            (OpponentChannel::GreenRed, Hue::Cyan, &secondary),
            (OpponentChannel::BlueYellow, Hue::Cyan, &secondary),
            (OpponentChannel::RedGreen, Hue::Red, &primary),
            (OpponentChannel::GreenRed, Hue::Green, &primary),
            (OpponentChannel::BlueYellow, Hue::Blue, &primary),
            (OpponentChannel::YellowBlue, Hue::Yellow, &yellow),
        ] {
            connect(
                engine,
                v1.get(channel),
                v4_excitatory[hue.index()],
                policy,
                window,
                &mut projections,
            );
        }

        // Feedforward inhibition: the same connectivity pattern, targeting
        // each hue's inhibitory population at the inhibitory weight scale.
        for (channel, hue) in [
            (OpponentChannel::RedGreen, Hue::Magenta),
            (OpponentChannel::BlueYellow, Hue::Magenta),
            (OpponentChannel::GreenRed, Hue::Cyan),
            (OpponentChannel::BlueYellow, Hue::Cyan),
            (OpponentChannel::RedGreen, Hue::Red),
            (OpponentChannel::GreenRed, Hue::Green),
            (OpponentChannel::BlueYellow, Hue::Blue),
            (OpponentChannel::YellowBlue, Hue::Yellow),
        ] {
            connect(
                engine,
                v1.get(channel),
                v4_inhibitory[hue.index()],
                &inhib,
                window,
                &mut projections,
            );
        }

        // Lateral opponent suppression, inhibitory → excitatory, over a
        // quadrupled squared radius. Hand-specified graph between the
        // perceptually related blend hues and yellow; no general rule.
        let lateral_radius_sq = cfg.base_radius_sq * 4.0;
        let lateral = ConnectionPolicy::Lateral {
            grid_side: cfg.grid_side,
            radius_sq: lateral_radius_sq,
            weight_scale: cfg.lateral_weight,
            table: Arc::clone(&table),
        };
        let lateral_window = {
            let span = (lateral_radius_sq * 4.0) as usize;
            SearchWindow { x: span, y: span }
        };
        for (from, to) in [
            (Hue::Magenta, Hue::Cyan),
            (Hue::Magenta, Hue::Yellow),
            (Hue::Cyan, Hue::Magenta),
            (Hue::Cyan, Hue::Yellow),
            (Hue::Yellow, Hue::Cyan),
            (Hue::Yellow, Hue::Magenta),
        ] {
            connect(
                engine,
                v4_inhibitory[from.index()],
                v4_excitatory[to.index()],
                &lateral,
                lateral_window,
                &mut projections,
            );
        }

        // Global simulation-mode toggles, then freeze the topology.
        engine.set_graded_conductances(true);
        engine.set_weight_plasticity(false);
        engine.set_short_term_plasticity(false);
        engine.compile()?;

        info!(
            populations = 4 + 12,
            projections = projections.len(),
            grid_side = cfg.grid_side,
            "network topology compiled"
        );

        Ok(Topology {
            v1,
            v4_excitatory,
            v4_inhibitory,
            projections,
        })
    }
}
