use crate::banner::{self, DrawResult, DrawState};
use crate::config::{BannerConfig, Config};
use crate::error::{non_negative, GachaError, GachaResult};
use crate::estimate::{EstimationResult, Estimator};
use crate::goal::{Strategy, TrialPlan};
use crate::request::{
    DrawRecord, DrawRequest, DrawResponse, EstimateRequest, Request, RequiredBudgetRequest,
    Response,
};
use crate::rng::{Rng, UniformSource};
use crate::sim::{self, SessionSummary};
use crate::solver::{RequiredBudget, Solver};
use crate::worker::TrialWorker;
use log::{info, warn};

/// Configuration plus an optional trial pool; every operation is a pure
/// function of its arguments and the configuration.
pub struct GachaEngine {
    config: Config,
    worker: Option<TrialWorker>,
}

impl GachaEngine {
    /// Engine that runs every trial on the calling thread.
    pub fn sequential(config: Config) -> Self {
        GachaEngine { config, worker: None }
    }

    /// Engine with a pool built from `config.worker`. A pool that fails to
    /// start leaves the engine sequential.
    pub fn new(config: Config) -> Self {
        let worker = match TrialWorker::new(&config.worker) {
            Ok(worker) => Some(worker),
            Err(e) => {
                warn!("[Engine] {}; running trials sequentially", e);
                None
            }
        };
        GachaEngine { config, worker }
    }

    pub fn with_worker(config: Config, worker: TrialWorker) -> Self {
        GachaEngine {
            config,
            worker: Some(worker),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn banner(&self, name: &str) -> GachaResult<&BannerConfig> {
        self.config.banner(name)
    }

    pub fn estimator(&self) -> Estimator<'_> {
        Estimator::new(&self.config.limits, self.worker.as_ref())
    }

    pub fn draw_once<R: UniformSource + ?Sized>(
        &self,
        state: &mut DrawState,
        banner: &str,
        rng: &mut R,
    ) -> GachaResult<DrawResult> {
        let banner = self.banner(banner)?;
        Ok(banner::draw_once(state, banner, rng))
    }

    pub fn draw_n<R: UniformSource + ?Sized>(
        &self,
        state: &mut DrawState,
        banner: &str,
        rng: &mut R,
        n: u32,
    ) -> GachaResult<Vec<DrawResult>> {
        self.check_draw_count(n)?;
        let banner = self.banner(banner)?;
        Ok(banner::draw_n(state, banner, rng, n as usize))
    }

    pub fn simulate_trial(
        &self,
        budget: u32,
        plan: &TrialPlan,
        strategy: Strategy,
        seed: u64,
    ) -> bool {
        sim::simulate_trial(budget, plan, strategy, seed)
    }

    pub fn estimate_goal_probability(
        &self,
        budget: u32,
        plan: &TrialPlan,
        trials: u32,
        strategy: Strategy,
        seed: Option<u64>,
    ) -> GachaResult<EstimationResult> {
        self.estimator().estimate(budget, plan, trials, strategy, seed)
    }

    /// Estimates every strategy and returns the best (first on ties).
    pub fn best_strategy(
        &self,
        budget: u32,
        plan: &TrialPlan,
        trials: u32,
        seed: Option<u64>,
    ) -> GachaResult<EstimationResult> {
        let mut best: Option<EstimationResult> = None;
        for strategy in Strategy::ALL {
            let est = self.estimate_goal_probability(budget, plan, trials, strategy, seed)?;
            if best.as_ref().map_or(true, |b| est.probability > b.probability) {
                best = Some(est);
            }
        }
        best.ok_or_else(|| GachaError::invalid("strategy", "no strategies available"))
    }

    pub fn required_pulls_for_confidence(
        &self,
        plan: &TrialPlan,
        confidence: f64,
        strategy: Strategy,
        seed: Option<u64>,
    ) -> GachaResult<RequiredBudget> {
        Solver::new(self.estimator(), &self.config.solver).required_pulls_for_confidence(
            plan, confidence, strategy, seed,
        )
    }

    pub fn simulate_session<R: UniformSource + ?Sized>(
        &self,
        start: &DrawState,
        banner: &str,
        rng: &mut R,
        draws: u32,
    ) -> GachaResult<SessionSummary> {
        self.check_draw_count(draws)?;
        let banner = self.banner(banner)?;
        Ok(sim::simulate_session(start, banner, rng, draws))
    }

    fn check_draw_count(&self, n: u32) -> GachaResult<()> {
        let max = self.config.limits.max_draws_per_request;
        if n > max {
            return Err(GachaError::invalid(
                "count",
                format!("{} exceeds the per-request limit {}", n, max),
            ));
        }
        Ok(())
    }

    // --- Request records ---

    pub fn handle_draw(&self, req: &DrawRequest) -> GachaResult<DrawResponse> {
        let banner = self.banner(&req.banner)?;
        let mut state = DrawState::from_snapshot(&req.state, banner)?;
        let count = non_negative("count", req.count)?;
        let mut rng = match req.seed {
            Some(seed) => Rng::from_seed(seed),
            None => Rng::from_entropy(),
        };
        let results = self.draw_n(&mut state, &req.banner, &mut rng, count)?;
        Ok(DrawResponse {
            banner: banner.name.clone(),
            results: results
                .into_iter()
                .map(|result| DrawRecord {
                    item: result.item_name(banner),
                    result,
                })
                .collect(),
            state,
        })
    }

    pub fn handle_estimate(&self, req: &EstimateRequest) -> GachaResult<EstimationResult> {
        let call = req.validate(&self.config)?;
        self.estimate_goal_probability(
            call.budget,
            &call.plan,
            call.trials,
            call.strategy,
            call.seed,
        )
    }

    pub fn handle_required(&self, req: &RequiredBudgetRequest) -> GachaResult<RequiredBudget> {
        let call = req.validate(&self.config)?;
        self.required_pulls_for_confidence(&call.plan, call.confidence, call.strategy, call.seed)
    }

    pub fn handle(&self, req: &Request) -> GachaResult<Response> {
        let response = match req {
            Request::Draw(r) => Response::Draw(self.handle_draw(r)?),
            Request::Estimate(r) => Response::Estimate(self.handle_estimate(r)?),
            Request::RequiredBudget(r) => Response::RequiredBudget(self.handle_required(r)?),
        };
        info!("[Engine] Handled {} request", operation_name(req));
        Ok(response)
    }
}

fn operation_name(req: &Request) -> &'static str {
    match req {
        Request::Draw(_) => "draw",
        Request::Estimate(_) => "estimate",
        Request::RequiredBudget(_) => "required_budget",
    }
}
