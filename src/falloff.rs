//! Table-based approximation of the radial connection falloff `exp(-x)`.
//!
//! Every connectivity decision in the topology evaluates the same negative
//! exponential, so the table is sampled once up front and shared between
//! policy values. Lookups are a single bounds check plus an index; there is
//! no interpolation. The absolute error is bounded by the bucket width times
//! the derivative at the bucket's left edge (worst case at x = 0:
//! `1 - exp(-0.05) ≈ 0.049`), which is well inside the tolerance of the
//! `falloff > 0.1` connect threshold downstream.

/// Number of samples in the lookup table.
pub const TABLE_SIZE: usize = 100;

/// Upper bound of the covered domain. `approx(x)` is exactly zero at and
/// beyond this point.
pub const X_MAX: f32 = 5.0;

/// Precomputed samples of `exp(-x)` over `[0, X_MAX)`.
///
/// Built eagerly at construction; the original sampled lazily into a
/// sentinel-guarded mutable global, which is unsound under concurrent first
/// callers. A pure constructor makes initialization trivially idempotent.
#[derive(Debug, Clone)]
pub struct FalloffTable {
    samples: [f32; TABLE_SIZE],
}

impl FalloffTable {
    pub fn new() -> Self {
        let mut samples = [0.0f32; TABLE_SIZE];
        for (i, s) in samples.iter_mut().enumerate() {
            *s = (-(i as f32) * X_MAX / TABLE_SIZE as f32).exp();
        }
        Self { samples }
    }

    /// Approximate `exp(-x)` for `x >= 0`.
    ///
    /// Returns the sample at the left edge of the bucket containing `x`,
    /// or exactly `0.0` for `x >= X_MAX`.
    #[inline]
    pub fn approx(&self, x: f32) -> f32 {
        if x < X_MAX {
            self.samples[(x / X_MAX * TABLE_SIZE as f32) as usize]
        } else {
            0.0
        }
    }
}

impl Default for FalloffTable {
    fn default() -> Self {
        Self::new()
    }
}
