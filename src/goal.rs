use crate::banner::DrawState;
use crate::config::BannerConfig;
use crate::error::{GachaError, GachaResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Featured item name -> copies wanted.
pub type GoalSpec = BTreeMap<String, u32>;

/// Pull order across the two goals of a [`TrialPlan`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    #[default]
    #[serde(rename = "goal-a-first", alias = "character_then_weapon", alias = "a")]
    GoalAFirst,
    #[serde(rename = "goal-b-first", alias = "weapon_then_character", alias = "b")]
    GoalBFirst,
}

impl Strategy {
    pub const ALL: [Strategy; 2] = [Strategy::GoalAFirst, Strategy::GoalBFirst];

    pub fn label(&self) -> &'static str {
        match self {
            Strategy::GoalAFirst => "goal-a-first",
            Strategy::GoalBFirst => "goal-b-first",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Strategy {
    type Err = GachaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "goal-a-first" | "character_then_weapon" | "a" => Ok(Strategy::GoalAFirst),
            "goal-b-first" | "weapon_then_character" | "b" => Ok(Strategy::GoalBFirst),
            _ => Err(GachaError::UnknownStrategy(s.to_string())),
        }
    }
}

/// One banner's share of a plan: rules, starting state and requirements.
#[derive(Clone, Debug)]
pub struct BannerGoal {
    pub banner: BannerConfig,
    pub start: DrawState,
    /// `(featured index, copies)` for every item with copies > 0, by index.
    pub requirements: Vec<(usize, u32)>,
}

impl BannerGoal {
    pub fn new(banner: BannerConfig, start: DrawState, goals: &GoalSpec) -> GachaResult<Self> {
        let mut requirements = Vec::with_capacity(goals.len());
        for (name, &copies) in goals {
            let index = banner.featured_index(name).ok_or_else(|| GachaError::UnknownTarget {
                banner: banner.name.clone(),
                target: name.clone(),
            })?;
            if copies > banner.max_copies {
                return Err(GachaError::CopiesOutOfRange {
                    banner: banner.name.clone(),
                    target: name.clone(),
                    copies: copies as i64,
                    max: banner.max_copies,
                });
            }
            if copies > 0 {
                requirements.push((index, copies));
            }
        }
        requirements.sort_unstable_by_key(|&(index, _)| index);
        Ok(BannerGoal {
            banner,
            start,
            requirements,
        })
    }

    pub fn needed(&self) -> u32 {
        self.requirements.iter().map(|&(_, c)| c).sum()
    }

    /// Draws after which the goal is certainly met, or `None` if unbounded.
    pub fn upper_bound(&self) -> Option<u64> {
        if self.needed() == 0 {
            return Some(0);
        }
        self.banner
            .worst_case_draws_per_copy()
            .and_then(|per_copy| (per_copy as u64).checked_mul(self.needed() as u64))
    }
}

/// Validates signed copy counts from a request into a [`GoalSpec`].
pub fn goal_spec_from_signed(
    banner: &BannerConfig,
    targets: &BTreeMap<String, i64>,
) -> GachaResult<GoalSpec> {
    let mut spec = GoalSpec::new();
    for (name, &copies) in targets {
        if copies < 0 || copies > banner.max_copies as i64 {
            return Err(GachaError::CopiesOutOfRange {
                banner: banner.name.clone(),
                target: name.clone(),
                copies,
                max: banner.max_copies,
            });
        }
        spec.insert(name.clone(), copies as u32);
    }
    Ok(spec)
}

#[derive(Clone, Debug)]
pub struct TrialPlan {
    pub goal_a: BannerGoal,
    pub goal_b: Option<BannerGoal>,
}

impl TrialPlan {
    pub fn single(goal: BannerGoal) -> Self {
        TrialPlan {
            goal_a: goal,
            goal_b: None,
        }
    }

    pub fn pair(goal_a: BannerGoal, goal_b: BannerGoal) -> Self {
        TrialPlan {
            goal_a,
            goal_b: Some(goal_b),
        }
    }

    pub fn goal_count(&self) -> usize {
        1 + self.goal_b.is_some() as usize
    }

    /// Goals in the order `strategy` pulls them, each paired with its slot
    /// in the plan (0 for goal A, 1 for goal B).
    pub fn ordered(&self, strategy: Strategy) -> Vec<(usize, &BannerGoal)> {
        match (&self.goal_b, strategy) {
            (None, _) => vec![(0, &self.goal_a)],
            (Some(b), Strategy::GoalAFirst) => vec![(0, &self.goal_a), (1, b)],
            (Some(b), Strategy::GoalBFirst) => vec![(1, b), (0, &self.goal_a)],
        }
    }

    pub fn total_needed(&self) -> u32 {
        self.goal_a.needed() + self.goal_b.as_ref().map_or(0, |b| b.needed())
    }

    pub fn upper_bound(&self) -> Option<u64> {
        let a = self.goal_a.upper_bound()?;
        let b = match &self.goal_b {
            Some(goal) => goal.upper_bound()?,
            None => 0,
        };
        a.checked_add(b)
    }
}

// --- Copy-level conversions ---

/// Constellation level 0..=6 means `level + 1` copies of the character.
pub fn constellation_to_copies(level: i64) -> GachaResult<u32> {
    if !(0..=6).contains(&level) {
        return Err(GachaError::invalid("constellation", format!("{} is outside 0..=6", level)));
    }
    Ok(level as u32 + 1)
}

/// Refinement level 1..=5 means `level` copies; 0 means no weapon wanted.
pub fn refinement_to_copies(level: i64) -> GachaResult<u32> {
    if !(0..=5).contains(&level) {
        return Err(GachaError::invalid("refinement", format!("{} is outside 0..=5", level)));
    }
    Ok(level as u32)
}

/// Accepts `c<N>` (constellation), `r<N>` (refinement) or a bare copy count.
pub fn parse_copies(text: &str) -> GachaResult<u32> {
    let text = text.trim();
    let parse = |digits: &str| {
        digits
            .parse::<i64>()
            .map_err(|_| GachaError::invalid("copies", format!("cannot parse '{}'", text)))
    };
    match text.chars().next() {
        Some('c') | Some('C') => constellation_to_copies(parse(&text[1..])?),
        Some('r') | Some('R') => refinement_to_copies(parse(&text[1..])?),
        _ => {
            let n = parse(text)?;
            crate::error::non_negative("copies", n)
        }
    }
}
