use serde::{Deserialize, Serialize};

/// Largest accepted `hard_pity_cap`.
pub const MAX_HARD_PITY_CAP: u32 = 10_000;

/// Hit-rate table for one rarity tier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PityCurve {
    pub base_rate: f64,
    /// First pity value that receives a ramp step.
    pub ramp_threshold: u32,
    pub step_increase: f64,
    /// Pity value at which the rate becomes 1.0.
    pub hard_pity_cap: u32,
}

impl PityCurve {
    pub fn rate(&self, pity: u32) -> f64 {
        rate(pity, self)
    }

    /// Longest possible run of draws up to and including a hit.
    pub fn max_draws_per_hit(&self) -> u32 {
        self.hard_pity_cap.saturating_add(1)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.base_rate) {
            return Err(format!("base_rate {} outside [0, 1]", self.base_rate));
        }
        if !self.step_increase.is_finite() || self.step_increase < 0.0 {
            return Err(format!("step_increase {} must be >= 0", self.step_increase));
        }
        if self.hard_pity_cap > MAX_HARD_PITY_CAP {
            return Err(format!(
                "hard_pity_cap {} exceeds {}",
                self.hard_pity_cap, MAX_HARD_PITY_CAP
            ));
        }
        Ok(())
    }
}

/// Probability of a hit on the next draw given `pity` draws since the last one.
pub fn rate(pity: u32, curve: &PityCurve) -> f64 {
    if pity >= curve.hard_pity_cap {
        return 1.0;
    }
    if pity < curve.ramp_threshold {
        return curve.base_rate.clamp(0.0, 1.0);
    }
    let steps = (pity - curve.ramp_threshold + 1) as f64;
    (curve.base_rate + steps * curve.step_increase).clamp(0.0, 1.0)
}

/// `result[k]` is the probability that the next hit lands on draw `k + 1`,
/// starting from zero pity.
pub fn hit_distribution(curve: &PityCurve) -> Vec<f64> {
    let mut out = Vec::with_capacity(curve.max_draws_per_hit() as usize);
    let mut survival = 1.0;
    for pity in 0..curve.max_draws_per_hit() {
        let p = rate(pity, curve);
        out.push(survival * p);
        survival *= 1.0 - p;
        if p >= 1.0 {
            break;
        }
    }
    out
}

pub fn expected_draws_per_hit(curve: &PityCurve) -> f64 {
    hit_distribution(curve)
        .iter()
        .enumerate()
        .map(|(k, p)| (k + 1) as f64 * p)
        .sum()
}
