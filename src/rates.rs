//! Firing-rate buffers and the external rate-computation interface.
//!
//! Each video frame is turned into four per-unit firing-rate vectors, one
//! per V1 opponent channel, plus an auxiliary motion-energy vector the
//! network never reads. Buffers are allocated once per run and overwritten
//! in place every frame.

use serde::{Deserialize, Serialize};

use crate::cortex::OpponentChannel;

/// Entries per grid unit in the auxiliary motion-energy buffer
/// (28 space-time filters × 3 temporal scales).
pub const AUX_CHANNELS: usize = 28 * 3;

/// Where rate buffers live for the duration of a run.
///
/// Chosen once at startup and used consistently for every buffer; mixing
/// placements for the same buffer across calls is undefined on the engine
/// side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Placement {
    #[default]
    Host,
    Accelerator,
}

/// Fixed-length vector of non-negative instantaneous firing rates, one per
/// unit of its target population.
#[derive(Debug, Clone)]
pub struct RateBuffer {
    placement: Placement,
    values: Vec<f32>,
}

impl RateBuffer {
    pub fn new(len: usize, placement: Placement) -> Self {
        Self {
            placement,
            values: vec![0.0; len],
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn placement(&self) -> Placement {
        self.placement
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f32] {
        &mut self.values
    }
}

/// The four opponent-channel rate buffers driving V1.
#[derive(Debug, Clone)]
pub struct OpponentRates {
    pub red_green: RateBuffer,
    pub green_red: RateBuffer,
    pub blue_yellow: RateBuffer,
    pub yellow_blue: RateBuffer,
}

impl OpponentRates {
    /// Allocate all four buffers with `units` entries each.
    pub fn new(units: usize, placement: Placement) -> Self {
        Self {
            red_green: RateBuffer::new(units, placement),
            green_red: RateBuffer::new(units, placement),
            blue_yellow: RateBuffer::new(units, placement),
            yellow_blue: RateBuffer::new(units, placement),
        }
    }

    pub fn channel(&self, channel: OpponentChannel) -> &RateBuffer {
        match channel {
            OpponentChannel::RedGreen => &self.red_green,
            OpponentChannel::GreenRed => &self.green_red,
            OpponentChannel::BlueYellow => &self.blue_yellow,
            OpponentChannel::YellowBlue => &self.yellow_blue,
        }
    }

    /// Channel/buffer pairs in injection order.
    pub fn channels(&self) -> [(OpponentChannel, &RateBuffer); 4] {
        [
            (OpponentChannel::RedGreen, &self.red_green),
            (OpponentChannel::GreenRed, &self.green_red),
            (OpponentChannel::BlueYellow, &self.blue_yellow),
            (OpponentChannel::YellowBlue, &self.yellow_blue),
        ]
    }
}

/// External rate-computation function.
///
/// Called synchronously once per frame with the raw frame bytes; writes all
/// four opponent-channel vectors plus the auxiliary motion-energy vector.
/// Pure with respect to persisted state.
pub trait RateFn {
    fn compute(
        &mut self,
        width: usize,
        height: usize,
        frame: &[u8],
        rates: &mut OpponentRates,
        aux: &mut RateBuffer,
        placement: Placement,
    );
}

/// Built-in per-pixel opponent-contrast rate function.
///
/// Stands in for the full motion-energy kernel when none is linked: each
/// unit's rate is the rectified opponent contrast of its pixel, scaled to
/// a firing-rate magnitude. The aux vector gets the pixel luminance in its
/// leading `width·height` entries and zeros elsewhere.
#[derive(Debug, Clone, Copy)]
pub struct OpponentContrast {
    /// Peak rate, in Hz, for a fully saturated opponent pixel.
    pub peak_rate: f32,
}

impl Default for OpponentContrast {
    fn default() -> Self {
        Self { peak_rate: 50.0 }
    }
}

impl RateFn for OpponentContrast {
    fn compute(
        &mut self,
        width: usize,
        height: usize,
        frame: &[u8],
        rates: &mut OpponentRates,
        aux: &mut RateBuffer,
        _placement: Placement,
    ) {
        let units = width * height;
        debug_assert_eq!(frame.len(), units * 3);

        for i in 0..units {
            let r = frame[i * 3] as f32 / 255.0;
            let g = frame[i * 3 + 1] as f32 / 255.0;
            let b = frame[i * 3 + 2] as f32 / 255.0;
            // Yellow is the red/green average; opponency is rectified so
            // each channel only reports its own sign of the contrast.
            let yellow = 0.5 * (r + g);

            rates.red_green.values_mut()[i] = (r - g).max(0.0) * self.peak_rate;
            rates.green_red.values_mut()[i] = (g - r).max(0.0) * self.peak_rate;
            rates.blue_yellow.values_mut()[i] = (b - yellow).max(0.0) * self.peak_rate;
            rates.yellow_blue.values_mut()[i] = (yellow - b).max(0.0) * self.peak_rate;
        }

        let aux_values = aux.values_mut();
        for v in aux_values.iter_mut() {
            *v = 0.0;
        }
        for i in 0..units.min(aux_values.len()) {
            let r = frame[i * 3] as f32;
            let g = frame[i * 3 + 1] as f32;
            let b = frame[i * 3 + 2] as f32;
            aux_values[i] = (0.299 * r + 0.587 * g + 0.114 * b) / 255.0;
        }
    }
}
