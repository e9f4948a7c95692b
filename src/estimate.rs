use crate::config::EngineLimits;
use crate::error::{GachaError, GachaResult};
use crate::goal::{Strategy, TrialPlan};
use crate::rng::{SeedSequence, DEFAULT_ROOT_SEED};
use crate::sim::simulate_trial;
use crate::worker::TrialWorker;
use log::{debug, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Two-sided 95% normal quantile.
pub const WILSON_Z95: f64 = 1.959963984540054;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateMethod {
    /// Decided without running trials.
    Exact,
    Simulated,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WilsonInterval {
    pub lo: f64,
    pub hi: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EstimationResult {
    pub strategy: Strategy,
    pub budget: u32,
    pub trials_requested: u32,
    pub trials_used: u32,
    pub successes: u32,
    /// `successes / trials_used`.
    pub frequency_estimate: f64,
    /// Jeffreys posterior mean; equals the frequency on exact results.
    pub probability: f64,
    pub ci95_wilson: WilsonInterval,
    pub method: EstimateMethod,
}

impl EstimationResult {
    fn exact(strategy: Strategy, budget: u32, trials_requested: u32, p: f64) -> Self {
        EstimationResult {
            strategy,
            budget,
            trials_requested,
            trials_used: 0,
            successes: 0,
            frequency_estimate: p,
            probability: p,
            ci95_wilson: WilsonInterval { lo: p, hi: p },
            method: EstimateMethod::Exact,
        }
    }
}

pub fn wilson_ci95(successes: u32, n: u32) -> WilsonInterval {
    if n == 0 {
        return WilsonInterval { lo: 0.0, hi: 1.0 };
    }
    let n = n as f64;
    let z2 = WILSON_Z95 * WILSON_Z95;
    let phat = successes as f64 / n;
    let denom = 1.0 + z2 / n;
    let center = (phat + z2 / (2.0 * n)) / denom;
    let half = (WILSON_Z95 / denom) * ((phat * (1.0 - phat) + z2 / (4.0 * n)) / n).sqrt();
    WilsonInterval {
        lo: (center - half).clamp(0.0, 1.0),
        hi: (center + half).clamp(0.0, 1.0),
    }
}

/// Posterior mean under a Beta(1/2, 1/2) prior; never exactly 0 or 1.
pub fn jeffreys(successes: u32, n: u32) -> f64 {
    ((successes as f64 + 0.5) / (n as f64 + 1.0)).clamp(0.0, 1.0)
}

/// Trial count after the work caps: never more than requested, never more
/// than `max_trials`, and at most `max_total_draws / budget` (but at least 1).
pub fn capped_trials(trials: u32, budget: u32, limits: &EngineLimits) -> u32 {
    let by_draws = if budget == 0 {
        u64::MAX
    } else {
        (limits.max_total_draws / budget as u64).max(1)
    };
    (trials.min(limits.max_trials) as u64).min(by_draws) as u32
}

/// Monte Carlo estimator bound to work limits and an optional pool.
#[derive(Clone, Copy)]
pub struct Estimator<'a> {
    pub limits: &'a EngineLimits,
    pub worker: Option<&'a TrialWorker>,
}

impl<'a> Estimator<'a> {
    pub fn new(limits: &'a EngineLimits, worker: Option<&'a TrialWorker>) -> Self {
        Estimator { limits, worker }
    }

    pub fn estimate(
        &self,
        budget: u32,
        plan: &TrialPlan,
        trials: u32,
        strategy: Strategy,
        seed: Option<u64>,
    ) -> GachaResult<EstimationResult> {
        if trials == 0 {
            return Err(GachaError::invalid("trials", "must be > 0"));
        }
        let needed = plan.total_needed();
        if needed == 0 {
            return Ok(EstimationResult::exact(strategy, budget, trials, 1.0));
        }
        if budget < needed {
            return Ok(EstimationResult::exact(strategy, budget, trials, 0.0));
        }
        if let Some(bound) = plan.upper_bound() {
            if budget as u64 >= bound {
                return Ok(EstimationResult::exact(strategy, budget, trials, 1.0));
            }
        }

        let trials_used = capped_trials(trials, budget, self.limits);
        let seq = SeedSequence::new(seed.unwrap_or(DEFAULT_ROOT_SEED));
        let successes = self.count_successes(trials_used, |i| {
            simulate_trial(budget, plan, strategy, seq.spawn(i))
        });

        let frequency = successes as f64 / trials_used as f64;
        let result = EstimationResult {
            strategy,
            budget,
            trials_requested: trials,
            trials_used,
            successes,
            frequency_estimate: frequency.clamp(0.0, 1.0),
            probability: jeffreys(successes, trials_used),
            ci95_wilson: wilson_ci95(successes, trials_used),
            method: EstimateMethod::Simulated,
        };
        debug!(
            "[Estimate] budget={} strategy={} trials={}/{} successes={} p={:.4}",
            budget, strategy, trials_used, trials, successes, result.probability
        );
        Ok(result)
    }

    /// Counts successful trials `0..n`. Runs in chunks on the pool when one
    /// is present; a pool failure reruns every trial sequentially.
    pub fn count_successes<F>(&self, n: u32, trial: F) -> u32
    where
        F: Fn(u64) -> bool + Sync,
    {
        let run = |start: u64, end: u64| (start..end).filter(|&i| trial(i)).count() as u32;
        let n = n as u64;

        if let Some(worker) = self.worker {
            let chunk_size = worker.chunk_size() as u64;
            let chunk_count = (n + chunk_size - 1) / chunk_size;
            let parallel = worker.execute(|| {
                (0..chunk_count)
                    .into_par_iter()
                    .map(|chunk_idx| {
                        let start = chunk_idx * chunk_size;
                        run(start, (start + chunk_size).min(n))
                    })
                    .sum::<u32>()
            });
            match parallel {
                Ok(successes) => return successes,
                Err(e) => warn!("[Estimate] {}; rerunning {} trials sequentially", e, n),
            }
        }
        run(0, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::banner::DrawState;
    use crate::config::BannerConfig;
    use crate::goal::{BannerGoal, GoalSpec};

    fn character_plan(copies: u32) -> TrialPlan {
        let banner = BannerConfig::character();
        let spec: GoalSpec = [("featured-character".to_string(), copies)].into_iter().collect();
        let state = DrawState::new(&banner);
        TrialPlan::single(BannerGoal::new(banner, state, &spec).unwrap())
    }

    #[test]
    fn zero_trials_is_rejected() {
        let limits = EngineLimits::default();
        let est = Estimator::new(&limits, None);
        let err = est.estimate(100, &character_plan(1), 0, Strategy::GoalAFirst, None);
        assert!(matches!(err, Err(GachaError::InvalidInput { field: "trials", .. })));
    }

    #[test]
    fn budget_zero_is_exactly_impossible() {
        let limits = EngineLimits::default();
        let res = Estimator::new(&limits, None)
            .estimate(0, &character_plan(1), 1000, Strategy::GoalAFirst, None)
            .unwrap();
        assert_eq!(res.probability, 0.0);
        assert_eq!(res.method, EstimateMethod::Exact);
        assert_eq!(res.trials_used, 0);
    }

    #[test]
    fn upper_bound_budget_is_exactly_certain() {
        let limits = EngineLimits::default();
        let plan = character_plan(2);
        let bound = plan.upper_bound().unwrap() as u32;
        let res = Estimator::new(&limits, None)
            .estimate(bound, &plan, 1000, Strategy::GoalAFirst, Some(9))
            .unwrap();
        assert_eq!(res.probability, 1.0);
        assert_eq!(res.trials_used, 0);
        assert_eq!(res.method, EstimateMethod::Exact);
    }

    #[test]
    fn overflowing_worst_case_is_simulated() {
        let mut banner = BannerConfig::weapon();
        banner.targeting = Some(crate::config::TargetingRule { fate_cap: 53_687_092 });
        let spec: GoalSpec = [("featured-weapon-1".to_string(), 1)].into_iter().collect();
        let state = DrawState::new(&banner);
        let plan = TrialPlan::single(BannerGoal::new(banner, state, &spec).unwrap());
        assert_eq!(plan.upper_bound(), None);

        let limits = EngineLimits::default();
        let res = Estimator::new(&limits, None)
            .estimate(144, &plan, 500, Strategy::GoalAFirst, Some(5))
            .unwrap();
        assert_eq!(res.method, EstimateMethod::Simulated);
        assert!(res.probability < 1.0);
    }

    #[test]
    fn empty_goal_is_exactly_certain() {
        let limits = EngineLimits::default();
        let res = Estimator::new(&limits, None)
            .estimate(0, &character_plan(0), 10, Strategy::GoalBFirst, None)
            .unwrap();
        assert_eq!(res.probability, 1.0);
        assert_eq!(res.successes, 0);
    }

    #[test]
    fn trial_count_is_capped_and_reported() {
        let limits = EngineLimits {
            max_total_draws: 10_000,
            ..EngineLimits::default()
        };
        let res = Estimator::new(&limits, None)
            .estimate(100, &character_plan(1), 5000, Strategy::GoalAFirst, None)
            .unwrap();
        assert_eq!(res.trials_requested, 5000);
        assert_eq!(res.trials_used, 100);
        assert_eq!(res.method, EstimateMethod::Simulated);

        assert_eq!(capped_trials(50_000, 10, &EngineLimits::default()), 10_000);
        assert_eq!(capped_trials(10, 1_000_000_000, &EngineLimits::default()), 1);
    }

    #[test]
    fn parallel_matches_sequential() {
        let limits = EngineLimits::default();
        let worker = TrialWorker::with_threads(4).unwrap();
        let plan = character_plan(1);
        let seq = Estimator::new(&limits, None)
            .estimate(80, &plan, 3000, Strategy::GoalAFirst, Some(42))
            .unwrap();
        let par = Estimator::new(&limits, Some(&worker))
            .estimate(80, &plan, 3000, Strategy::GoalAFirst, Some(42))
            .unwrap();
        assert_eq!(seq, par);
        assert!(seq.successes > 0 && seq.successes < 3000);
    }

    #[test]
    fn worker_failure_falls_back_to_identical_sequential_run() {
        let limits = EngineLimits::default();
        let worker = TrialWorker::with_threads(2).unwrap();
        let est = Estimator::new(&limits, Some(&worker));
        let trial = |i: u64| {
            if rayon::current_thread_index().is_some() {
                panic!("pool unavailable");
            }
            i % 3 == 0
        };
        assert_eq!(est.count_successes(300, trial), 100);
    }

    #[test]
    fn root_seed_controls_the_whole_estimate() {
        let limits = EngineLimits::default();
        let est = Estimator::new(&limits, None);
        let plan = character_plan(1);
        let a = est.estimate(80, &plan, 2000, Strategy::GoalAFirst, Some(1)).unwrap();
        let a2 = est.estimate(80, &plan, 2000, Strategy::GoalAFirst, Some(1)).unwrap();
        assert_eq!(a, a2);

        let one = SeedSequence::new(1);
        let two = SeedSequence::new(2);
        let differs = (0..200).any(|i| {
            simulate_trial(80, &plan, Strategy::GoalAFirst, one.spawn(i))
                != simulate_trial(80, &plan, Strategy::GoalAFirst, two.spawn(i))
        });
        assert!(differs);
    }

    #[test]
    fn wilson_bounds_contain_point_estimate() {
        for n in [1u32, 5, 30, 1000] {
            for s in 0..=n {
                let ci = wilson_ci95(s, n);
                let p = s as f64 / n as f64;
                assert!(0.0 <= ci.lo && ci.lo <= p + 1e-12);
                assert!(p <= ci.hi + 1e-12 && ci.hi <= 1.0);
            }
        }
    }

    #[test]
    fn jeffreys_never_hits_the_extremes() {
        for n in [1u32, 10, 10_000] {
            assert!(jeffreys(0, n) > 0.0);
            assert!(jeffreys(n, n) < 1.0);
        }
        assert_eq!(jeffreys(1, 1), 0.75);
    }
}
