use crate::banner::{draw_once, DrawCounts, DrawState};
use crate::config::BannerConfig;
use crate::goal::{BannerGoal, Strategy, TrialPlan};
use crate::rng::{Rng, UniformSource};
use serde::{Deserialize, Serialize};

// --- Goal trials ---

struct Lane<'a> {
    goal: &'a BannerGoal,
    state: DrawState,
    rng: Rng,
    /// Copies still missing, aligned with `goal.requirements`.
    deficits: Vec<u32>,
}

impl<'a> Lane<'a> {
    fn new(goal: &'a BannerGoal, rng: Rng) -> Self {
        Lane {
            goal,
            state: goal.start.clone(),
            rng,
            deficits: goal.requirements.iter().map(|&(_, c)| c).collect(),
        }
    }

    fn unmet(&self) -> u32 {
        self.deficits.iter().sum()
    }

    // Open item with the largest deficit; requirements are index-ordered so
    // ties resolve to the lower featured index.
    fn pick_target(&self) -> Option<usize> {
        let mut best: Option<(usize, u32)> = None;
        for (&(index, _), &deficit) in self.goal.requirements.iter().zip(&self.deficits) {
            if deficit > 0 && best.map_or(true, |(_, d)| deficit > d) {
                best = Some((index, deficit));
            }
        }
        best.map(|(index, _)| index)
    }

    /// Records a rare hit on `featured`; returns true if it filled a copy.
    fn record(&mut self, featured: usize) -> bool {
        for (&(index, _), deficit) in self.goal.requirements.iter().zip(self.deficits.iter_mut()) {
            if index == featured && *deficit > 0 {
                *deficit -= 1;
                return true;
            }
        }
        false
    }
}

/// Per-goal result of one trial, indexed by plan slot (0 = goal A).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrialOutcome {
    pub goals_met: Vec<bool>,
}

impl TrialOutcome {
    pub fn success(&self) -> bool {
        self.goals_met.iter().all(|&met| met)
    }
}

/// Runs one trial of `plan` under `budget` draws, pulling goals in the order
/// `strategy` gives. Each banner goal draws from its own generator split off
/// `seed` in plan order, so the pull order does not change the streams a goal
/// sees.
pub fn run_trial(budget: u32, plan: &TrialPlan, strategy: Strategy, seed: u64) -> TrialOutcome {
    let order = plan.ordered(strategy);
    let mut goals_met = vec![false; plan.goal_count()];
    for &(slot, goal) in &order {
        goals_met[slot] = goal.needed() == 0;
    }
    let mut unmet_total = plan.total_needed();
    if unmet_total == 0 || budget < unmet_total {
        return TrialOutcome { goals_met };
    }

    let mut root = Rng::from_seed(seed);
    let streams: Vec<Rng> = (0..plan.goal_count()).map(|_| root.split()).collect();

    let mut remaining = budget;
    for (slot, goal) in order {
        let mut lane = Lane::new(goal, streams[slot].clone());
        let targeting = goal.banner.has_targeting();
        if targeting {
            let target = lane.pick_target();
            lane.state.retarget(target);
        }
        while lane.unmet() > 0 {
            if remaining < unmet_total {
                return TrialOutcome { goals_met };
            }
            let res = draw_once(&mut lane.state, &goal.banner, &mut lane.rng);
            remaining -= 1;
            if !res.hit {
                continue;
            }
            if let Some(featured) = res.featured {
                if lane.record(featured) {
                    unmet_total -= 1;
                }
            }
            if targeting {
                let target = lane.pick_target();
                lane.state.retarget(target);
            }
        }
        goals_met[slot] = true;
    }
    TrialOutcome { goals_met }
}

/// True when every goal of `plan` is met within `budget` draws.
pub fn simulate_trial(budget: u32, plan: &TrialPlan, strategy: Strategy, seed: u64) -> bool {
    run_trial(budget, plan, strategy, seed).success()
}

// --- Session summaries ---

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntervalStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub min: u32,
    pub max: u32,
}

impl IntervalStats {
    pub fn from_samples(samples: &[u32]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let n = samples.len() as f64;
        let mean = samples.iter().map(|&x| x as f64).sum::<f64>() / n;
        let var = samples.iter().map(|&x| (x as f64 - mean).powi(2)).sum::<f64>() / n;
        let mut sorted = samples.to_vec();
        sorted.sort_unstable();
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] as f64 + sorted[mid] as f64) / 2.0
        } else {
            sorted[mid] as f64
        };
        Some(IntervalStats {
            count: samples.len(),
            mean,
            median,
            std_dev: var.sqrt(),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub draws: u64,
    /// Counts accumulated during this session only.
    pub counts: DrawCounts,
    pub draws_per_rare: Option<f64>,
    pub draws_per_boosted: Option<f64>,
    /// Draws between boosted rares, the first one measured from the
    /// starting `boosted_pity`.
    pub boosted_intervals: Option<IntervalStats>,
    pub on_target_intervals: Option<IntervalStats>,
    pub final_state: DrawState,
}

/// Runs `draws` draws on a copy of `start` and summarizes them.
pub fn simulate_session<R: UniformSource + ?Sized>(
    start: &DrawState,
    banner: &BannerConfig,
    rng: &mut R,
    draws: u32,
) -> SessionSummary {
    let mut state = start.clone();
    state.counts.featured.resize(banner.featured.len(), 0);
    let before = state.counts.clone();

    let mut boosted_gaps = Vec::new();
    let mut target_gaps = Vec::new();
    for _ in 0..draws {
        let boosted_pity = state.boosted_pity;
        let target_pity = state.target_pity;
        let res = draw_once(&mut state, banner, rng);
        if res.hit && res.boosted {
            boosted_gaps.push(boosted_pity.saturating_add(1));
        }
        if res.on_target {
            target_gaps.push(target_pity.saturating_add(1));
        }
    }

    let counts = state.counts.since(&before);
    let per = |hits: u64| (hits > 0).then(|| counts.total_draws as f64 / hits as f64);
    SessionSummary {
        draws: counts.total_draws,
        draws_per_rare: per(counts.rare()),
        draws_per_boosted: per(counts.boosted()),
        boosted_intervals: IntervalStats::from_samples(&boosted_gaps),
        on_target_intervals: IntervalStats::from_samples(&target_gaps),
        counts,
        final_state: state,
    }
}
