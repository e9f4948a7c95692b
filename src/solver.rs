use crate::config::SolverSettings;
use crate::error::{GachaError, GachaResult};
use crate::estimate::{EstimationResult, Estimator};
use crate::goal::{Strategy, TrialPlan};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// Outcome of the `max(needed, high / 2)` lower-bound shortcut.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LowerBoundHeuristic {
    NotApplicable,
    /// Estimate at the shortcut bound was still below target.
    Accepted,
    /// Estimate already met the target there; searched from `needed`.
    Rejected,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequiredBudget {
    pub strategy: Strategy,
    pub confidence: f64,
    pub required_budget: u32,
    pub verified_probability: f64,
    pub verification: EstimationResult,
    /// Search bounds before bisection.
    pub low: u32,
    pub high: u32,
    pub iterations: u32,
    pub heuristic: LowerBoundHeuristic,
    /// The goal has no finite worst case and the search hit `max_budget`.
    pub hit_ceiling: bool,
}

pub struct Solver<'a> {
    pub estimator: Estimator<'a>,
    pub settings: &'a SolverSettings,
}

impl<'a> Solver<'a> {
    pub fn new(estimator: Estimator<'a>, settings: &'a SolverSettings) -> Self {
        Solver { estimator, settings }
    }

    /// Smallest budget whose estimated probability reaches `confidence`.
    pub fn required_pulls_for_confidence(
        &self,
        plan: &TrialPlan,
        confidence: f64,
        strategy: Strategy,
        seed: Option<u64>,
    ) -> GachaResult<RequiredBudget> {
        if !(confidence > 0.0 && confidence <= 1.0) {
            return Err(GachaError::invalid(
                "confidence",
                format!("{} is outside (0, 1]", confidence),
            ));
        }

        let needed = plan.total_needed();
        let bounded = plan.upper_bound();
        let high = match bounded {
            Some(bound) => bound.min(u32::MAX as u64) as u32,
            None => self.estimator.limits.max_budget.max(needed),
        };

        if needed == 0 {
            let verification =
                self.estimator
                    .estimate(0, plan, self.settings.verify_trials, strategy, seed)?;
            return Ok(RequiredBudget {
                strategy,
                confidence,
                required_budget: 0,
                verified_probability: verification.probability,
                verification,
                low: 0,
                high: 0,
                iterations: 0,
                heuristic: LowerBoundHeuristic::NotApplicable,
                hit_ceiling: false,
            });
        }

        let estimate_at = |budget: u32, trials: u32| {
            self.estimator.estimate(budget, plan, trials, strategy, seed)
        };

        let mut heuristic = LowerBoundHeuristic::NotApplicable;
        let mut lo = needed;
        if confidence >= self.settings.high_confidence {
            let candidate = needed.max(high / 2);
            let at_candidate = estimate_at(candidate, self.settings.coarse_trials)?;
            if at_candidate.probability < confidence {
                heuristic = LowerBoundHeuristic::Accepted;
                lo = (candidate + 1).min(high);
            } else {
                warn!(
                    "[Solver] Lower bound {} already reaches p={:.4}; searching from {}",
                    candidate, at_candidate.probability, needed
                );
                heuristic = LowerBoundHeuristic::Rejected;
            }
        }

        let low = lo;
        let mut hi = high;
        let mut iterations = 0u32;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let trials = if hi - lo > self.settings.fine_window.saturating_mul(2) {
                self.settings.coarse_trials
            } else {
                self.settings.fine_trials
            };
            let est = estimate_at(mid, trials)?;
            iterations += 1;
            debug!(
                "[Solver] [{}, {}] mid={} trials={} p={:.4}",
                lo, hi, mid, est.trials_used, est.probability
            );
            if est.probability >= confidence {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }

        let verification = estimate_at(lo, self.settings.verify_trials)?;
        let hit_ceiling = bounded.is_none() && lo == high && verification.probability < confidence;
        if hit_ceiling {
            warn!(
                "[Solver] Target {:.2} not reached within max budget {} (p={:.4})",
                confidence, high, verification.probability
            );
        }
        info!(
            "[Solver] strategy={} confidence={:.2} -> budget {} (verified p={:.4}, {} iterations)",
            strategy, confidence, lo, verification.probability, iterations
        );

        Ok(RequiredBudget {
            strategy,
            confidence,
            required_budget: lo,
            verified_probability: verification.probability,
            verification,
            low,
            high,
            iterations,
            heuristic,
            hit_ceiling,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::banner::DrawState;
    use crate::config::{BannerConfig, EngineLimits};
    use crate::goal::{BannerGoal, GoalSpec};

    fn plan_with(banner: BannerConfig, state: DrawState, item: &str, copies: u32) -> TrialPlan {
        let spec: GoalSpec = [(item.to_string(), copies)].into_iter().collect();
        TrialPlan::single(BannerGoal::new(banner, state, &spec).unwrap())
    }

    fn character_plan(copies: u32) -> TrialPlan {
        let banner = BannerConfig::character();
        let state = DrawState::new(&banner);
        plan_with(banner, state, "featured-character", copies)
    }

    fn settings() -> SolverSettings {
        SolverSettings {
            coarse_trials: 1000,
            fine_trials: 4000,
            verify_trials: 4000,
            ..SolverSettings::default()
        }
    }

    #[test]
    fn rejects_confidence_outside_unit_interval() {
        let limits = EngineLimits::default();
        let settings = settings();
        let solver = Solver::new(Estimator::new(&limits, None), &settings);
        let plan = character_plan(1);
        for c in [0.0, -0.5, 1.5, f64::NAN] {
            let res = solver.required_pulls_for_confidence(&plan, c, Strategy::GoalAFirst, None);
            assert!(res.is_err());
        }
    }

    #[test]
    fn zero_copy_goal_needs_nothing() {
        let limits = EngineLimits::default();
        let settings = settings();
        let solver = Solver::new(Estimator::new(&limits, None), &settings);
        let res = solver
            .required_pulls_for_confidence(&character_plan(0), 0.95, Strategy::GoalAFirst, None)
            .unwrap();
        assert_eq!(res.required_budget, 0);
        assert_eq!(res.verified_probability, 1.0);
    }

    #[test]
    fn median_budget_brackets_one_half() {
        let limits = EngineLimits::default();
        let settings = settings();
        let estimator = Estimator::new(&limits, None);
        let solver = Solver::new(estimator, &settings);
        let plan = character_plan(1);
        let res = solver
            .required_pulls_for_confidence(&plan, 0.5, Strategy::GoalAFirst, Some(7))
            .unwrap();
        assert_eq!(res.heuristic, LowerBoundHeuristic::NotApplicable);

        let b = res.required_budget;
        let at = estimator
            .estimate(b, &plan, settings.fine_trials, Strategy::GoalAFirst, Some(7))
            .unwrap();
        let below = estimator
            .estimate(b - 1, &plan, settings.fine_trials, Strategy::GoalAFirst, Some(7))
            .unwrap();
        assert!(at.probability >= 0.5 - 0.03, "p({}) = {}", b, at.probability);
        assert!(below.probability < 0.5 + 0.03, "p({}) = {}", b - 1, below.probability);
    }

    #[test]
    fn high_confidence_uses_half_upper_bound() {
        let limits = EngineLimits::default();
        let settings = settings();
        let solver = Solver::new(Estimator::new(&limits, None), &settings);
        let res = solver
            .required_pulls_for_confidence(&character_plan(1), 0.95, Strategy::GoalAFirst, None)
            .unwrap();
        assert_eq!(res.heuristic, LowerBoundHeuristic::Accepted);
        assert_eq!(res.high, 180);
        assert!(res.low > 90);
        assert!(res.required_budget > 90 && res.required_budget <= 180);
        assert!(res.verified_probability >= 0.95 - 0.02);
    }

    #[test]
    fn heuristic_is_rejected_when_half_bound_already_suffices() {
        // A pending guarantee makes the first rare boosted, so ~81 draws give 95%.
        let banner = BannerConfig::character_classic();
        let mut state = DrawState::new(&banner);
        state.guaranteed_rate_up = true;
        let plan = plan_with(banner, state, "featured-character", 1);

        let limits = EngineLimits::default();
        let settings = settings();
        let solver = Solver::new(Estimator::new(&limits, None), &settings);
        let res = solver
            .required_pulls_for_confidence(&plan, 0.95, Strategy::GoalAFirst, None)
            .unwrap();
        assert_eq!(res.heuristic, LowerBoundHeuristic::Rejected);
        assert_eq!(res.low, 1);
        assert!(
            (70..=90).contains(&res.required_budget),
            "budget {}",
            res.required_budget
        );
    }

    #[test]
    fn huge_fine_window_does_not_overflow() {
        let limits = EngineLimits::default();
        let settings = SolverSettings {
            fine_window: u32::MAX,
            ..settings()
        };
        let solver = Solver::new(Estimator::new(&limits, None), &settings);
        let res = solver
            .required_pulls_for_confidence(&character_plan(1), 0.5, Strategy::GoalAFirst, Some(3))
            .unwrap();
        assert!(res.required_budget > 1 && res.required_budget < 180);
    }

    #[test]
    fn unbounded_goal_searches_up_to_max_budget() {
        let mut banner = BannerConfig::weapon();
        banner.targeting = None;
        let state = DrawState::new(&banner);
        let plan = plan_with(banner, state, "featured-weapon-1", 1);
        let limits = EngineLimits {
            max_budget: 400,
            ..EngineLimits::default()
        };
        let settings = settings();
        let solver = Solver::new(Estimator::new(&limits, None), &settings);
        let res = solver
            .required_pulls_for_confidence(&plan, 0.5, Strategy::GoalAFirst, None)
            .unwrap();
        assert_eq!(res.high, 400);
        assert!(!res.hit_ceiling);
        assert!(res.required_budget < 400);
    }
}
