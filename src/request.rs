//! Plain request/response records for callers that speak JSON.
//!
//! Integer fields are signed on purpose: negative values are rejected with a
//! descriptive error instead of failing deserialization.

use crate::banner::{DrawResult, DrawState, StateSnapshot};
use crate::config::Config;
use crate::error::{non_negative, GachaError, GachaResult};
use crate::estimate::EstimationResult;
use crate::goal::{
    constellation_to_copies, goal_spec_from_signed, refinement_to_copies, BannerGoal, Strategy,
    TrialPlan,
};
use crate::solver::RequiredBudget;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_strategy() -> String {
    Strategy::default().label().to_string()
}

fn default_count() -> i64 {
    1
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GoalRequest {
    pub banner: String,
    #[serde(default)]
    pub state: StateSnapshot,
    /// Featured item name -> copies.
    #[serde(default)]
    pub targets: BTreeMap<String, i64>,
    /// Item the level fields below apply to; defaults to the selected
    /// target, then to the first featured item.
    #[serde(default)]
    pub item: Option<String>,
    #[serde(default)]
    pub constellation: Option<i64>,
    #[serde(default)]
    pub refinement: Option<i64>,
}

impl GoalRequest {
    pub fn to_goal(&self, config: &Config) -> GachaResult<BannerGoal> {
        let banner = config.banner(&self.banner)?;
        let start = DrawState::from_snapshot(&self.state, banner)?;
        let mut targets = self.targets.clone();

        let level_copies = match (self.constellation, self.refinement) {
            (Some(_), Some(_)) => {
                return Err(GachaError::invalid(
                    "constellation",
                    "give either constellation or refinement, not both",
                ))
            }
            (Some(c), None) => Some(constellation_to_copies(c)?),
            (None, Some(r)) => Some(refinement_to_copies(r)?),
            (None, None) => None,
        };
        if let Some(copies) = level_copies {
            let item = self
                .item
                .clone()
                .or_else(|| self.state.selected_target.clone())
                .or_else(|| banner.featured.first().cloned())
                .ok_or_else(|| GachaError::invalid("item", "banner has no featured items"))?;
            targets.insert(item, copies as i64);
        }

        let spec = goal_spec_from_signed(banner, &targets)?;
        BannerGoal::new(banner.clone(), start, &spec)
    }
}

fn plan_from(
    config: &Config,
    goal_a: &GoalRequest,
    goal_b: Option<&GoalRequest>,
) -> GachaResult<TrialPlan> {
    let a = goal_a.to_goal(config)?;
    Ok(match goal_b {
        Some(b) => TrialPlan::pair(a, b.to_goal(config)?),
        None => TrialPlan::single(a),
    })
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DrawRequest {
    pub banner: String,
    #[serde(default)]
    pub state: StateSnapshot,
    #[serde(default = "default_count")]
    pub count: i64,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DrawRecord {
    #[serde(flatten)]
    pub result: DrawResult,
    pub item: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DrawResponse {
    pub banner: String,
    pub results: Vec<DrawRecord>,
    pub state: DrawState,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EstimateRequest {
    pub resources: i64,
    pub goal_a: GoalRequest,
    #[serde(default)]
    pub goal_b: Option<GoalRequest>,
    pub trials: i64,
    #[serde(default = "default_strategy")]
    pub strategy: String,
    #[serde(default)]
    pub seed: Option<u64>,
}

/// An [`EstimateRequest`] after validation.
#[derive(Clone, Debug)]
pub struct EstimateCall {
    pub budget: u32,
    pub plan: TrialPlan,
    pub trials: u32,
    pub strategy: Strategy,
    pub seed: Option<u64>,
}

impl EstimateRequest {
    pub fn validate(&self, config: &Config) -> GachaResult<EstimateCall> {
        let budget = non_negative("resources", self.resources)?;
        let trials = non_negative("trials", self.trials)?;
        if trials == 0 {
            return Err(GachaError::invalid("trials", "must be > 0"));
        }
        Ok(EstimateCall {
            budget,
            plan: plan_from(config, &self.goal_a, self.goal_b.as_ref())?,
            trials,
            strategy: self.strategy.parse()?,
            seed: self.seed,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequiredBudgetRequest {
    pub goal_a: GoalRequest,
    #[serde(default)]
    pub goal_b: Option<GoalRequest>,
    pub confidence: f64,
    #[serde(default = "default_strategy")]
    pub strategy: String,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Clone, Debug)]
pub struct RequiredBudgetCall {
    pub plan: TrialPlan,
    pub confidence: f64,
    pub strategy: Strategy,
    pub seed: Option<u64>,
}

impl RequiredBudgetRequest {
    pub fn validate(&self, config: &Config) -> GachaResult<RequiredBudgetCall> {
        if !(self.confidence > 0.0 && self.confidence <= 1.0) {
            return Err(GachaError::invalid(
                "confidence",
                format!("{} is outside (0, 1]", self.confidence),
            ));
        }
        Ok(RequiredBudgetCall {
            plan: plan_from(config, &self.goal_a, self.goal_b.as_ref())?,
            confidence: self.confidence,
            strategy: self.strategy.parse()?,
            seed: self.seed,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Request {
    Draw(DrawRequest),
    Estimate(EstimateRequest),
    RequiredBudget(RequiredBudgetRequest),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Response {
    Draw(DrawResponse),
    Estimate(EstimationResult),
    RequiredBudget(RequiredBudget),
}
