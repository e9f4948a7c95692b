use crate::error::{GachaError, GachaResult};
use crate::pity::PityCurve;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

// --- Banner rules (data-driven) ---

/// Display label only. Draw behaviour comes from the optional rules on
/// [`BannerConfig`], never from the kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BannerKind {
    Character,
    Weapon,
}

impl BannerKind {
    pub fn label(&self) -> &'static str {
        match self {
            BannerKind::Character => "character",
            BannerKind::Weapon => "weapon",
        }
    }
}

/// Independent chance to bypass the rate-up roll, forced after a streak of
/// guarantee-path wins.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverrideRule {
    pub base_rate: f64,
    pub counter_cap: u32,
}

/// Largest accepted `fate_cap`.
pub const MAX_FATE_CAP: u32 = 100;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetingRule {
    pub fate_cap: u32,
}

/// Lower rarity tier rolled on draws without a rare hit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SecondaryTier {
    pub curve: PityCurve,
    pub rate_up_fraction: f64,
    pub featured: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BannerConfig {
    #[serde(default)]
    pub name: String,
    /// Shown in reports; see [`BannerKind`].
    pub kind: BannerKind,
    pub curve: PityCurve,
    pub rate_up_fraction: f64,
    pub featured: Vec<String>,
    #[serde(default)]
    pub override_rule: Option<OverrideRule>,
    #[serde(default)]
    pub targeting: Option<TargetingRule>,
    #[serde(default)]
    pub secondary: Option<SecondaryTier>,
    pub max_copies: u32,
}

impl BannerConfig {
    /// Character event banner with the override ("capturing radiance") rule.
    pub fn character() -> Self {
        BannerConfig {
            name: "character".to_string(),
            kind: BannerKind::Character,
            curve: PityCurve {
                base_rate: 0.006,
                ramp_threshold: 73,
                step_increase: 0.06,
                hard_pity_cap: 89,
            },
            rate_up_fraction: 0.5,
            featured: vec!["featured-character".to_string()],
            override_rule: Some(OverrideRule {
                base_rate: 0.00018,
                counter_cap: 3,
            }),
            targeting: None,
            secondary: Some(SecondaryTier {
                curve: PityCurve {
                    base_rate: 0.051,
                    ramp_threshold: 8,
                    step_increase: 0.51,
                    hard_pity_cap: 9,
                },
                rate_up_fraction: 0.5,
                featured: vec![
                    "four-star-character-1".to_string(),
                    "four-star-character-2".to_string(),
                    "four-star-character-3".to_string(),
                ],
            }),
            max_copies: 7,
        }
    }

    /// Plain 50/50 character banner: no override rule, no secondary tier.
    pub fn character_classic() -> Self {
        BannerConfig {
            name: "character-classic".to_string(),
            override_rule: None,
            secondary: None,
            ..Self::character()
        }
    }

    pub fn weapon() -> Self {
        BannerConfig {
            name: "weapon".to_string(),
            kind: BannerKind::Weapon,
            curve: PityCurve {
                base_rate: 0.007,
                ramp_threshold: 63,
                step_increase: 0.07,
                hard_pity_cap: 79,
            },
            rate_up_fraction: 0.75,
            featured: vec!["featured-weapon-1".to_string(), "featured-weapon-2".to_string()],
            override_rule: None,
            targeting: Some(TargetingRule { fate_cap: 1 }),
            secondary: Some(SecondaryTier {
                curve: PityCurve {
                    base_rate: 0.06,
                    ramp_threshold: 7,
                    step_increase: 0.6,
                    hard_pity_cap: 8,
                },
                rate_up_fraction: 0.75,
                featured: (1..=5).map(|i| format!("four-star-weapon-{}", i)).collect(),
            }),
            max_copies: 5,
        }
    }

    pub fn has_override(&self) -> bool {
        self.override_rule.is_some()
    }

    pub fn has_targeting(&self) -> bool {
        self.targeting.is_some()
    }

    pub fn override_cap(&self) -> u32 {
        self.override_rule.as_ref().map_or(0, |r| r.counter_cap)
    }

    pub fn fate_cap(&self) -> u32 {
        self.targeting.as_ref().map_or(0, |t| t.fate_cap)
    }

    pub fn featured_index(&self, name: &str) -> Option<usize> {
        self.featured.iter().position(|f| f == name)
    }

    /// Worst-case number of draws needed for one copy of a featured item,
    /// or `None` when no finite bound exists or it does not fit in a `u32`.
    pub fn worst_case_draws_per_copy(&self) -> Option<u32> {
        let hits_per_copy = match &self.targeting {
            Some(t) => t.fate_cap.checked_add(1)?,
            None if self.featured.len() == 1 => 2,
            None => return None,
        };
        self.curve
            .hard_pity_cap
            .checked_add(1)?
            .checked_mul(hits_per_copy)
    }

    pub fn validate(&self) -> GachaResult<()> {
        let fail = |reason: String| GachaError::InvalidConfig {
            banner: self.name.clone(),
            reason,
        };
        self.curve.validate().map_err(fail)?;
        if !(0.0..=1.0).contains(&self.rate_up_fraction) {
            return Err(fail(format!("rate_up_fraction {} outside [0, 1]", self.rate_up_fraction)));
        }
        if self.featured.is_empty() {
            return Err(fail("at least one featured item is required".to_string()));
        }
        if let Some(rule) = &self.override_rule {
            if !(0.0..=1.0).contains(&rule.base_rate) {
                return Err(fail(format!("override base_rate {} outside [0, 1]", rule.base_rate)));
            }
            if rule.counter_cap == 0 {
                return Err(fail("override counter_cap must be >= 1".to_string()));
            }
        }
        if let Some(t) = &self.targeting {
            if t.fate_cap == 0 || t.fate_cap > MAX_FATE_CAP {
                return Err(fail(format!("fate_cap {} outside 1..={}", t.fate_cap, MAX_FATE_CAP)));
            }
        }
        if let Some(tier) = &self.secondary {
            tier.curve.validate().map_err(|e| fail(format!("secondary: {}", e)))?;
            if !(0.0..=1.0).contains(&tier.rate_up_fraction) {
                return Err(fail("secondary rate_up_fraction outside [0, 1]".to_string()));
            }
            if tier.featured.is_empty() {
                return Err(fail("secondary tier needs at least one featured item".to_string()));
            }
        }
        Ok(())
    }
}

// --- Engine-wide settings ---

/// Hard caps protecting the host from unbounded work.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineLimits {
    pub max_trials: u32,
    /// Cap on budget * trials for one estimate.
    pub max_total_draws: u64,
    /// Search ceiling when a goal has no finite worst case.
    pub max_budget: u32,
    pub max_draws_per_request: u32,
}

impl Default for EngineLimits {
    fn default() -> Self {
        EngineLimits {
            max_trials: 10_000,
            max_total_draws: 50_000_000,
            max_budget: 20_000,
            max_draws_per_request: 100_000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    pub coarse_trials: u32,
    pub fine_trials: u32,
    pub verify_trials: u32,
    /// Half-width of the search window below which fine trials are used.
    pub fine_window: u32,
    /// Confidence at or above which the `high / 2` lower bound is tried.
    pub high_confidence: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        SolverSettings {
            coarse_trials: 1_000,
            fine_trials: 5_000,
            verify_trials: 5_000,
            fine_window: 50,
            high_confidence: 0.95,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// 0 means "all cores minus the reserve".
    pub max_threads: usize,
    pub reserve_cores: usize,
    pub stack_size_mb: usize,
    /// Trials handed to one rayon task.
    pub chunk_size: usize,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        WorkerSettings {
            max_threads: 0,
            reserve_cores: 1,
            stack_size_mb: 4,
            chunk_size: 64,
        }
    }
}

// --- Configuration (Data-Driven) ---

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub banners: BTreeMap<String, BannerConfig>,
    pub limits: EngineLimits,
    pub solver: SolverSettings,
    pub worker: WorkerSettings,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            banners: preset_banners(),
            limits: EngineLimits::default(),
            solver: SolverSettings::default(),
            worker: WorkerSettings::default(),
        }
    }
}

fn preset_banners() -> BTreeMap<String, BannerConfig> {
    [
        BannerConfig::character(),
        BannerConfig::character_classic(),
        BannerConfig::weapon(),
    ]
    .into_iter()
    .map(|b| (b.name.clone(), b))
    .collect()
}

impl Config {
    pub fn from_json(contents: &str) -> GachaResult<Self> {
        let mut config: Config = serde_json::from_str(contents)?;
        for (name, banner) in config.banners.iter_mut() {
            if banner.name.is_empty() {
                banner.name = name.clone();
            }
        }
        // File banners override presets of the same name; other presets stay available.
        for (name, preset) in preset_banners() {
            config.banners.entry(name).or_insert(preset);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &str) -> GachaResult<Self> {
        // Also look two levels up (running from target/release).
        let contents = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(first) => {
                let alt = format!("../../{}", path);
                if Path::new(&alt).exists() {
                    info!("[Config] Found in parent directory: {}", alt);
                    fs::read_to_string(&alt)?
                } else {
                    return Err(first.into());
                }
            }
        };
        Self::from_json(&contents)
    }

    pub fn validate(&self) -> GachaResult<()> {
        for banner in self.banners.values() {
            banner.validate()?;
        }
        if self.limits.max_trials == 0 {
            return Err(GachaError::invalid("limits.max_trials", "must be >= 1"));
        }
        let solver = &self.solver;
        if solver.coarse_trials == 0 || solver.fine_trials == 0 || solver.verify_trials == 0 {
            return Err(GachaError::invalid("solver", "trial counts must be >= 1"));
        }
        Ok(())
    }

    pub fn banner(&self, name: &str) -> GachaResult<&BannerConfig> {
        self.banners
            .get(name)
            .ok_or_else(|| GachaError::UnknownBanner(name.to_string()))
    }
}
