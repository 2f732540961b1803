//! Geometric connection policies.
//!
//! A projection between two populations is not stored as an adjacency list;
//! instead the engine sweeps candidate (source, destination) pairs inside a
//! search window and asks a policy for a per-pair decision. Policies are pure
//! values: identical inputs always produce identical decisions, and no call
//! order is observable in the result.

use std::sync::Arc;

use crate::falloff::FalloffTable;

/// Gain applied to the normalized squared distance before the falloff
/// lookup. `exp(-3)` at the nominal radius lands just below the connect
/// threshold, so the radius is effectively the connection cutoff.
const FALLOFF_GAIN: f32 = 3.0;

/// Minimum falloff for a synapse to exist.
const CONNECT_THRESHOLD: f32 = 0.1;

/// Axonal delay of a feedforward synapse, in whole engine time-steps.
const DELAY_STEPS: u16 = 1;

/// Axonal delay of a lateral synapse, in fractional time units.
const LATERAL_DELAY: f32 = 1.0;

/// Outcome of a single candidate-pair evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectionDecision {
    pub connected: bool,
    pub weight: f32,
    pub delay: f32,
}

/// Connection policy, selected per projection.
///
/// Modeled as a tagged variant rather than a trait object: there are exactly
/// two wiring rules in this network and the topology builder picks between
/// them with plain data.
#[derive(Debug, Clone)]
pub enum ConnectionPolicy {
    /// Cross-layer projection between two retinotopic grids. Source and
    /// destination indices are decoded against their own grid widths and
    /// compared in raw grid coordinates (no rescaling for differing
    /// extents).
    Retinotopic {
        src_width: usize,
        src_height: usize,
        dst_width: usize,
        dst_height: usize,
        radius: f32,
        weight_scale: f32,
        table: Arc<FalloffTable>,
    },
    /// Same-layer projection; both indices are decoded against one shared
    /// grid side. The weight scale is typically negative (lateral
    /// suppression).
    Lateral {
        grid_side: usize,
        radius_sq: f32,
        weight_scale: f32,
        table: Arc<FalloffTable>,
    },
}

impl ConnectionPolicy {
    /// Decide whether a synapse exists between `src_index` and `dst_index`,
    /// and with what weight and delay.
    pub fn decide(&self, src_index: usize, dst_index: usize) -> ConnectionDecision {
        match self {
            ConnectionPolicy::Retinotopic {
                src_width,
                dst_width,
                radius,
                weight_scale,
                table,
                ..
            } => {
                let (sx, sy) = decode(src_index, *src_width);
                let (dx, dy) = decode(dst_index, *dst_width);
                let d2 = distance_sq(sx, sy, dx, dy);
                let falloff = table.approx(d2 / (radius * radius) * FALLOFF_GAIN);
                ConnectionDecision {
                    connected: falloff > CONNECT_THRESHOLD,
                    weight: falloff * weight_scale,
                    delay: f32::from(DELAY_STEPS),
                }
            }
            ConnectionPolicy::Lateral {
                grid_side,
                radius_sq,
                weight_scale,
                table,
            } => {
                let (sx, sy) = decode(src_index, *grid_side);
                let (dx, dy) = decode(dst_index, *grid_side);
                let d2 = distance_sq(sx, sy, dx, dy);
                let falloff = table.approx(d2 / radius_sq * FALLOFF_GAIN);
                ConnectionDecision {
                    connected: falloff > CONNECT_THRESHOLD,
                    weight: falloff * weight_scale,
                    delay: LATERAL_DELAY,
                }
            }
        }
    }
}

#[inline]
fn decode(index: usize, width: usize) -> (i64, i64) {
    ((index % width) as i64, (index / width) as i64)
}

#[inline]
fn distance_sq(sx: i64, sy: i64, dx: i64, dy: i64) -> f32 {
    let ddx = (dx - sx) as f32;
    let ddy = (dy - sy) as f32;
    ddx * ddx + ddy * ddy
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retinotopic(radius: f32, weight_scale: f32) -> ConnectionPolicy {
        ConnectionPolicy::Retinotopic {
            src_width: 32,
            src_height: 32,
            dst_width: 32,
            dst_height: 32,
            radius,
            weight_scale,
            table: Arc::new(FalloffTable::new()),
        }
    }

    fn lateral(radius_sq: f32, weight_scale: f32) -> ConnectionPolicy {
        ConnectionPolicy::Lateral {
            grid_side: 32,
            radius_sq,
            weight_scale,
            table: Arc::new(FalloffTable::new()),
        }
    }

    #[test]
    fn zero_displacement_connects_at_full_scale() {
        let policy = retinotopic(3.0f32.sqrt(), 0.5);
        // Same grid position in source and destination.
        let d = policy.decide(5 + 7 * 32, 5 + 7 * 32);
        assert!(d.connected);
        assert_eq!(d.weight, 0.5);
    }

    #[test]
    fn at_exactly_the_radius_the_pair_is_not_connected() {
        // Pick a radius whose square is an achievable squared grid
        // distance: r² = 4, units 2 columns apart.
        let policy = retinotopic(2.0, 0.5);
        let d = policy.decide(0, 2);
        // falloff = approx(3) ≈ exp(-3) ≈ 0.0498 < 0.1
        assert!(!d.connected);
        assert!(d.weight < 0.05 * 0.5 + 1e-3);
    }

    #[test]
    fn crossover_sits_near_ln10_over_gain_times_radius_sq() {
        // connected ⇔ falloff(d²/r²·3) > 0.1, i.e. d² just below
        // r²·ln(10)/3 ≈ 0.768·r² connects and just above does not (the
        // table quantizes the exact crossover to a bucket edge). With
        // r² = 12 the crossover lies between d² = 9 and d² = 10.
        let policy = retinotopic(12.0f32.sqrt(), 1.0);
        let below = policy.decide(0, 3); // d² = 9
        let above = policy.decide(0, 3 + 32); // d² = 9 + 1 = 10
        assert!(below.connected);
        assert!(!above.connected);
    }

    #[test]
    fn lateral_decision_carries_negative_weight_and_unit_delay() {
        let policy = lateral(12.0, -0.3);
        let d = policy.decide(10, 11);
        assert!(d.connected);
        assert!(d.weight < 0.0);
        assert_eq!(d.delay, 1.0);
    }

    #[test]
    fn feedforward_delay_is_one_whole_step() {
        let policy = retinotopic(3.0f32.sqrt(), 0.5);
        assert_eq!(policy.decide(0, 0).delay, 1.0);
    }

    #[test]
    fn decisions_are_deterministic_and_order_independent() {
        let policy = lateral(12.0, -0.3);
        let first = policy.decide(100, 200);
        // Interleave unrelated queries, then repeat.
        let _ = policy.decide(200, 100);
        let _ = policy.decide(0, 1023);
        assert_eq!(policy.decide(100, 200), first);
    }

    #[test]
    fn source_and_destination_grids_decode_independently() {
        // A 16-wide source against a 32-wide destination: index 17 is
        // (1, 1) in the source grid but (17, 0) in the destination grid.
        let policy = ConnectionPolicy::Retinotopic {
            src_width: 16,
            src_height: 16,
            dst_width: 32,
            dst_height: 32,
            radius: 2.0,
            weight_scale: 1.0,
            table: Arc::new(FalloffTable::new()),
        };
        let near = policy.decide(17, 1 + 32); // both at (1, 1)
        assert!(near.connected);
        assert_eq!(near.weight, 1.0);
        let far = policy.decide(17, 17); // (1,1) vs (17,0)
        assert!(!far.connected);
    }
}
