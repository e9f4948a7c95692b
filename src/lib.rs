//! Gacha draw engine with pity bookkeeping and a Monte Carlo goal solver.

pub mod banner;
pub mod config;
pub mod engine;
pub mod error;
pub mod estimate;
pub mod goal;
pub mod pity;
pub mod report;
pub mod request;
pub mod rng;
pub mod sim;
pub mod solver;
pub mod worker;

pub use banner::{draw_n, draw_once, DrawResult, DrawState, StateSnapshot, Tier};
pub use config::{BannerConfig, Config};
pub use engine::GachaEngine;
pub use error::{GachaError, GachaResult};
pub use estimate::{EstimationResult, Estimator};
pub use goal::{BannerGoal, GoalSpec, Strategy, TrialPlan};
pub use pity::{rate, PityCurve};
pub use rng::{Rng, SeedSequence, UniformSource};
pub use sim::{run_trial, simulate_session, simulate_trial, TrialOutcome};
pub use solver::{RequiredBudget, Solver};
