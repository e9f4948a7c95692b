//! Draw state machine shared by every banner kind.
//!
//! Character and weapon banners run the same transition; the differences are
//! carried by [`BannerConfig`] (override rule, targeting rule, secondary tier).

use crate::config::{BannerConfig, SecondaryTier};
use crate::error::{non_negative, GachaError, GachaResult};
use crate::pity::rate;
use crate::rng::UniformSource;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Filler,
    Secondary,
    Rare,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawCounts {
    pub total_draws: u64,
    /// Rare hits that were not a featured item.
    pub standard: u64,
    /// Rare hits per featured item, indexed like `BannerConfig::featured`.
    pub featured: Vec<u64>,
    pub overrides: u64,
    pub on_target: u64,
    pub secondary_featured: u64,
    pub secondary_standard: u64,
}

impl DrawCounts {
    pub fn boosted(&self) -> u64 {
        self.featured.iter().sum()
    }

    pub fn rare(&self) -> u64 {
        self.boosted() + self.standard
    }

    /// Counts accumulated since `earlier`, which must be a previous snapshot.
    pub fn since(&self, earlier: &DrawCounts) -> DrawCounts {
        DrawCounts {
            total_draws: self.total_draws - earlier.total_draws,
            standard: self.standard - earlier.standard,
            featured: self
                .featured
                .iter()
                .enumerate()
                .map(|(i, &c)| c - earlier.featured.get(i).copied().unwrap_or(0))
                .collect(),
            overrides: self.overrides - earlier.overrides,
            on_target: self.on_target - earlier.on_target,
            secondary_featured: self.secondary_featured - earlier.secondary_featured,
            secondary_standard: self.secondary_standard - earlier.secondary_standard,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawState {
    /// Draws since the last rare hit.
    pub pity: u32,
    /// Draws since the last featured rare hit.
    pub boosted_pity: u32,
    pub guaranteed_rate_up: bool,
    pub override_counter: u32,
    pub fate_point: u32,
    /// Draws since the last rare hit on the selected target.
    pub target_pity: u32,
    pub selected_target: Option<usize>,
    pub secondary_pity: u32,
    pub secondary_guaranteed: bool,
    pub counts: DrawCounts,
}

/// Request-side view of a [`DrawState`]. Integer fields are signed so that
/// malformed input can be rejected instead of wrapping.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateSnapshot {
    pub pity: i64,
    /// Defaults to `pity` when absent.
    pub boosted_pity: Option<i64>,
    pub guarantee_up: bool,
    pub override_counter: i64,
    pub fate_point: i64,
    pub selected_target: Option<String>,
    pub secondary_pity: i64,
    pub secondary_guarantee: bool,
    pub total_pulls: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DrawResult {
    /// Rare (top-tier) hit.
    pub hit: bool,
    pub tier: Tier,
    /// Pity after the draw.
    pub pity: u32,
    /// Rare-hit probability used for this draw.
    pub probability: f64,
    /// The hit tier resolved to a featured item.
    pub boosted: bool,
    pub override_fired: bool,
    pub fate_fired: bool,
    pub on_target: bool,
    /// Index into the hit tier's featured list; `None` for standard items.
    pub featured: Option<usize>,
}

impl DrawResult {
    pub fn item_name(&self, banner: &BannerConfig) -> String {
        match (self.tier, self.featured) {
            (Tier::Rare, Some(i)) => banner.featured[i].clone(),
            (Tier::Rare, None) => "standard rare".to_string(),
            (Tier::Secondary, Some(i)) => banner
                .secondary
                .as_ref()
                .and_then(|t| t.featured.get(i))
                .cloned()
                .unwrap_or_else(|| format!("secondary #{}", i)),
            (Tier::Secondary, None) => "standard secondary".to_string(),
            (Tier::Filler, _) => "filler".to_string(),
        }
    }
}

impl DrawState {
    pub fn new(banner: &BannerConfig) -> Self {
        DrawState {
            pity: 0,
            boosted_pity: 0,
            guaranteed_rate_up: false,
            override_counter: 0,
            fate_point: 0,
            target_pity: 0,
            selected_target: None,
            secondary_pity: 0,
            secondary_guaranteed: false,
            counts: DrawCounts {
                featured: vec![0; banner.featured.len()],
                ..DrawCounts::default()
            },
        }
    }

    pub fn from_snapshot(snapshot: &StateSnapshot, banner: &BannerConfig) -> GachaResult<Self> {
        let mut state = DrawState::new(banner);

        state.pity = non_negative("pity", snapshot.pity)?;
        if state.pity > banner.curve.hard_pity_cap {
            return Err(GachaError::invalid(
                "pity",
                format!(
                    "{} exceeds hard pity cap {} of banner '{}'",
                    state.pity, banner.curve.hard_pity_cap, banner.name
                ),
            ));
        }
        state.boosted_pity = non_negative(
            "boosted_pity",
            snapshot.boosted_pity.unwrap_or(snapshot.pity),
        )?;
        state.target_pity = state.boosted_pity;
        state.guaranteed_rate_up = snapshot.guarantee_up;

        let override_counter = non_negative("override_counter", snapshot.override_counter)?;
        if override_counter > banner.override_cap() {
            return Err(GachaError::invalid(
                "override_counter",
                format!(
                    "{} exceeds cap {} of banner '{}'",
                    override_counter,
                    banner.override_cap(),
                    banner.name
                ),
            ));
        }
        state.override_counter = override_counter;

        let fate_point = non_negative("fate_point", snapshot.fate_point)?;
        if fate_point > banner.fate_cap() {
            return Err(GachaError::invalid(
                "fate_point",
                format!(
                    "{} exceeds cap {} of banner '{}'",
                    fate_point,
                    banner.fate_cap(),
                    banner.name
                ),
            ));
        }
        state.fate_point = fate_point;

        if let Some(name) = &snapshot.selected_target {
            state.set_target(banner, Some(name.as_str()))?;
            // set_target only resets when switching; the snapshot value applies to this target
            state.fate_point = fate_point;
        }

        state.secondary_pity = non_negative("secondary_pity", snapshot.secondary_pity)?;
        state.secondary_guaranteed = snapshot.secondary_guarantee;
        state.counts.total_draws = non_negative("total_pulls", snapshot.total_pulls)? as u64;
        Ok(state)
    }

    /// Selects a target by name; `None` cancels targeting.
    pub fn set_target(&mut self, banner: &BannerConfig, name: Option<&str>) -> GachaResult<()> {
        let index = match name {
            None => None,
            Some(name) => {
                if !banner.has_targeting() {
                    return Err(GachaError::invalid(
                        "selected_target",
                        format!("banner '{}' has no targeting", banner.name),
                    ));
                }
                let idx = banner.featured_index(name).ok_or_else(|| GachaError::UnknownTarget {
                    banner: banner.name.clone(),
                    target: name.to_string(),
                })?;
                Some(idx)
            }
        };
        self.retarget(index);
        Ok(())
    }

    /// Moving away from an existing target resets the fate point; picking a
    /// target when none was selected keeps it.
    pub fn retarget(&mut self, target: Option<usize>) {
        if self.selected_target == target {
            return;
        }
        if self.selected_target.is_some() {
            self.fate_point = 0;
        }
        self.selected_target = target;
    }
}

struct RareOutcome {
    featured: Option<usize>,
    override_fired: bool,
    fate_fired: bool,
    on_target: bool,
}

fn pick<R: UniformSource + ?Sized>(len: usize, rng: &mut R) -> usize {
    if len <= 1 {
        0
    } else {
        rng.below(len as u64) as usize
    }
}

// Returns whether `item` is the selected target, moving the fate point.
fn advance_fate(state: &mut DrawState, banner: &BannerConfig, item: Option<usize>) -> bool {
    let Some(target) = state.selected_target.filter(|_| banner.has_targeting()) else {
        return false;
    };
    if item == Some(target) {
        state.fate_point = 0;
        true
    } else {
        state.fate_point = (state.fate_point + 1).min(banner.fate_cap());
        false
    }
}

fn resolve_rare<R: UniformSource + ?Sized>(
    state: &mut DrawState,
    banner: &BannerConfig,
    rng: &mut R,
) -> RareOutcome {
    let featured_len = banner.featured.len();

    if let Some(target) = state.selected_target.filter(|_| banner.has_targeting()) {
        if state.fate_point >= banner.fate_cap() {
            state.fate_point = 0;
            state.guaranteed_rate_up = false;
            return RareOutcome {
                featured: Some(target),
                override_fired: false,
                fate_fired: true,
                on_target: true,
            };
        }
    }

    if let Some(rule) = &banner.override_rule {
        if state.override_counter >= rule.counter_cap {
            state.override_counter = 0;
            state.guaranteed_rate_up = false;
            let item = pick(featured_len, rng);
            let on_target = advance_fate(state, banner, Some(item));
            return RareOutcome {
                featured: Some(item),
                override_fired: true,
                fate_fired: false,
                on_target,
            };
        }
    }

    if state.guaranteed_rate_up {
        state.guaranteed_rate_up = false;
        let item = pick(featured_len, rng);
        if let Some(rule) = &banner.override_rule {
            state.override_counter = (state.override_counter + 1).min(rule.counter_cap);
        }
        let on_target = advance_fate(state, banner, Some(item));
        return RareOutcome {
            featured: Some(item),
            override_fired: false,
            fate_fired: false,
            on_target,
        };
    }

    if let Some(rule) = &banner.override_rule {
        if rng.uniform() < rule.base_rate {
            state.override_counter = 0;
            let item = pick(featured_len, rng);
            let on_target = advance_fate(state, banner, Some(item));
            return RareOutcome {
                featured: Some(item),
                override_fired: true,
                fate_fired: false,
                on_target,
            };
        }
    }

    if rng.uniform() < banner.rate_up_fraction {
        // a won roll breaks the streak of guarantee-path wins
        state.override_counter = 0;
        let item = pick(featured_len, rng);
        let on_target = advance_fate(state, banner, Some(item));
        RareOutcome {
            featured: Some(item),
            override_fired: false,
            fate_fired: false,
            on_target,
        }
    } else {
        state.guaranteed_rate_up = true;
        advance_fate(state, banner, None);
        RareOutcome {
            featured: None,
            override_fired: false,
            fate_fired: false,
            on_target: false,
        }
    }
}

fn roll_secondary<R: UniformSource + ?Sized>(
    state: &mut DrawState,
    tier: &SecondaryTier,
    rng: &mut R,
) -> (Tier, Option<usize>) {
    if rng.uniform() >= rate(state.secondary_pity, &tier.curve) {
        state.secondary_pity = state.secondary_pity.saturating_add(1);
        return (Tier::Filler, None);
    }
    state.secondary_pity = 0;
    let boosted = if state.secondary_guaranteed {
        state.secondary_guaranteed = false;
        true
    } else if rng.uniform() < tier.rate_up_fraction {
        true
    } else {
        state.secondary_guaranteed = true;
        false
    };
    if boosted {
        state.counts.secondary_featured += 1;
        (Tier::Secondary, Some(pick(tier.featured.len(), rng)))
    } else {
        state.counts.secondary_standard += 1;
        (Tier::Secondary, None)
    }
}

/// Performs one draw, mutating `state`.
pub fn draw_once<R: UniformSource + ?Sized>(
    state: &mut DrawState,
    banner: &BannerConfig,
    rng: &mut R,
) -> DrawResult {
    debug_assert!(state.override_counter <= banner.override_cap());
    debug_assert!(state.fate_point <= banner.fate_cap());
    if state.counts.featured.len() != banner.featured.len() {
        state.counts.featured.resize(banner.featured.len(), 0);
    }

    let probability = rate(state.pity, &banner.curve);
    let hit = rng.uniform() < probability;

    if !hit {
        state.pity += 1;
        state.boosted_pity = state.boosted_pity.saturating_add(1);
        state.target_pity = state.target_pity.saturating_add(1);
        let (tier, featured) = match &banner.secondary {
            Some(tier) => roll_secondary(state, tier, rng),
            None => (Tier::Filler, None),
        };
        state.counts.total_draws += 1;
        return DrawResult {
            hit: false,
            tier,
            pity: state.pity,
            probability,
            boosted: featured.is_some(),
            override_fired: false,
            fate_fired: false,
            on_target: false,
            featured,
        };
    }

    let outcome = resolve_rare(state, banner, rng);
    let boosted = outcome.featured.is_some();

    state.pity = 0;
    state.boosted_pity = if boosted { 0 } else { state.boosted_pity.saturating_add(1) };
    state.target_pity = if outcome.on_target { 0 } else { state.target_pity.saturating_add(1) };
    state.secondary_pity = state.secondary_pity.saturating_add(1);

    match outcome.featured {
        Some(i) => state.counts.featured[i] += 1,
        None => state.counts.standard += 1,
    }
    if outcome.override_fired {
        state.counts.overrides += 1;
    }
    if outcome.on_target {
        state.counts.on_target += 1;
    }
    state.counts.total_draws += 1;

    DrawResult {
        hit: true,
        tier: Tier::Rare,
        pity: 0,
        probability,
        boosted,
        override_fired: outcome.override_fired,
        fate_fired: outcome.fate_fired,
        on_target: outcome.on_target,
        featured: outcome.featured,
    }
}

pub fn draw_n<R: UniformSource + ?Sized>(
    state: &mut DrawState,
    banner: &BannerConfig,
    rng: &mut R,
    n: usize,
) -> Vec<DrawResult> {
    (0..n).map(|_| draw_once(state, banner, rng)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetingRule;
    use crate::rng::Rng;
    use rand_core::{Error, RngCore};
    use std::collections::VecDeque;

    /// Replays a fixed list of raw words; panics when exhausted.
    struct Scripted {
        words: VecDeque<u64>,
    }

    impl Scripted {
        fn new(words: &[u64]) -> Self {
            Scripted {
                words: words.iter().copied().collect(),
            }
        }

        fn remaining(&self) -> usize {
            self.words.len()
        }
    }

    /// Raw word that `uniform()` maps back to (almost exactly) `v`.
    fn u(v: f64) -> u64 {
        ((v * 9007199254740992.0) as u64) << 11
    }

    impl RngCore for Scripted {
        fn next_u32(&mut self) -> u32 {
            self.next_u64() as u32
        }

        fn next_u64(&mut self) -> u64 {
            self.words.pop_front().expect("script exhausted")
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            for b in dest.iter_mut() {
                *b = self.next_u64() as u8;
            }
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    #[test]
    fn miss_increments_pity_only() {
        let banner = BannerConfig::character_classic();
        let mut state = DrawState::new(&banner);
        let mut rng = Scripted::new(&[u(0.99)]);
        let res = draw_once(&mut state, &banner, &mut rng);
        assert!(!res.hit);
        assert_eq!(res.tier, Tier::Filler);
        assert_eq!(state.pity, 1);
        assert_eq!(state.counts.total_draws, 1);
        assert_eq!(res.probability, 0.006);
    }

    #[test]
    fn lost_rate_up_sets_guarantee_and_next_hit_is_boosted() {
        let banner = BannerConfig::character_classic();
        let mut state = DrawState::new(&banner);
        state.pity = 40;

        let mut rng = Scripted::new(&[u(0.0), u(0.9)]);
        let res = draw_once(&mut state, &banner, &mut rng);
        assert!(res.hit && !res.boosted);
        assert!(state.guaranteed_rate_up);
        assert_eq!(state.pity, 0);
        assert_eq!(state.counts.standard, 1);

        // single featured item: the guarantee path consumes no extra randomness
        let mut rng = Scripted::new(&[u(0.0)]);
        let res = draw_once(&mut state, &banner, &mut rng);
        assert!(res.hit && res.boosted);
        assert_eq!(res.featured, Some(0));
        assert!(!state.guaranteed_rate_up);
        assert_eq!(rng.remaining(), 0);
        assert_eq!(state.counts.featured, vec![1]);
    }

    #[test]
    fn hard_pity_always_hits() {
        let banner = BannerConfig::character_classic();
        let mut state = DrawState::new(&banner);
        state.pity = 89;
        let mut rng = Scripted::new(&[u(0.999999), u(0.1)]);
        let res = draw_once(&mut state, &banner, &mut rng);
        assert!(res.hit);
        assert_eq!(res.probability, 1.0);
    }

    #[test]
    fn override_counter_at_cap_forces_override() {
        let banner = BannerConfig::character();
        let mut state = DrawState::new(&banner);
        state.override_counter = 3;
        state.guaranteed_rate_up = true;
        let mut rng = Scripted::new(&[u(0.0)]);
        let res = draw_once(&mut state, &banner, &mut rng);
        assert!(res.override_fired && res.boosted);
        assert_eq!(state.override_counter, 0);
        assert!(!state.guaranteed_rate_up);
        assert_eq!(state.counts.overrides, 1);
    }

    #[test]
    fn guarantee_path_advances_override_counter_up_to_cap() {
        let banner = BannerConfig::character();
        let mut state = DrawState::new(&banner);
        state.override_counter = 2;
        state.guaranteed_rate_up = true;
        let mut rng = Scripted::new(&[u(0.0)]);
        let res = draw_once(&mut state, &banner, &mut rng);
        assert!(res.boosted && !res.override_fired);
        assert_eq!(state.override_counter, 3);
    }

    #[test]
    fn won_rate_up_roll_resets_override_counter() {
        let banner = BannerConfig::character();
        let mut state = DrawState::new(&banner);
        state.override_counter = 2;
        // hit, override roll misses, rate-up roll wins
        let mut rng = Scripted::new(&[u(0.0), u(0.5), u(0.1)]);
        let res = draw_once(&mut state, &banner, &mut rng);
        assert!(res.boosted && !res.override_fired);
        assert_eq!(state.override_counter, 0);
    }

    #[test]
    fn lost_rate_up_roll_keeps_override_counter() {
        let banner = BannerConfig::character();
        let mut state = DrawState::new(&banner);
        state.override_counter = 2;
        let mut rng = Scripted::new(&[u(0.0), u(0.5), u(0.9)]);
        let res = draw_once(&mut state, &banner, &mut rng);
        assert!(!res.boosted);
        assert_eq!(state.override_counter, 2);
        assert!(state.guaranteed_rate_up);
    }

    #[test]
    fn natural_override_trigger() {
        let banner = BannerConfig::character();
        let mut state = DrawState::new(&banner);
        state.override_counter = 1;
        let mut rng = Scripted::new(&[u(0.0), u(0.0)]);
        let res = draw_once(&mut state, &banner, &mut rng);
        assert!(res.override_fired && res.boosted);
        assert_eq!(state.override_counter, 0);
        assert_eq!(rng.remaining(), 0);
    }

    #[test]
    fn fate_point_at_cap_forces_target_and_clears_guarantee() {
        let banner = BannerConfig::weapon();
        let mut state = DrawState::new(&banner);
        state.selected_target = Some(1);
        state.fate_point = 1;
        state.guaranteed_rate_up = true;
        let mut rng = Scripted::new(&[u(0.0)]);
        let res = draw_once(&mut state, &banner, &mut rng);
        assert!(res.fate_fired && res.on_target);
        assert_eq!(res.featured, Some(1));
        assert_eq!(state.fate_point, 0);
        assert!(!state.guaranteed_rate_up);
        assert_eq!(res.item_name(&banner), "featured-weapon-2");
    }

    #[test]
    fn weapon_standard_hit_advances_fate_point() {
        let banner = BannerConfig::weapon();
        let mut state = DrawState::new(&banner);
        state.selected_target = Some(0);
        let mut rng = Scripted::new(&[u(0.0), u(0.9)]);
        let res = draw_once(&mut state, &banner, &mut rng);
        assert!(res.hit && !res.boosted && !res.on_target);
        assert_eq!(state.fate_point, 1);
        assert!(state.guaranteed_rate_up);
    }

    #[test]
    fn weapon_off_target_featured_hit_advances_fate_point() {
        let banner = BannerConfig::weapon();
        let mut state = DrawState::new(&banner);
        state.selected_target = Some(0);
        // hit, rate-up won, item index 1
        let mut rng = Scripted::new(&[u(0.0), u(0.1), 1]);
        let res = draw_once(&mut state, &banner, &mut rng);
        assert_eq!(res.featured, Some(1));
        assert!(res.boosted && !res.on_target);
        assert_eq!(state.fate_point, 1);
    }

    #[test]
    fn guarantee_hitting_target_resets_fate_point() {
        let mut banner = BannerConfig::weapon();
        banner.targeting = Some(TargetingRule { fate_cap: 2 });
        let mut state = DrawState::new(&banner);
        state.selected_target = Some(1);
        state.fate_point = 1;
        state.guaranteed_rate_up = true;
        let mut rng = Scripted::new(&[u(0.0), 1]);
        let res = draw_once(&mut state, &banner, &mut rng);
        assert!(res.on_target && !res.fate_fired);
        assert_eq!(state.fate_point, 0);
        assert_eq!(state.counts.on_target, 1);
    }

    #[test]
    fn untargeted_weapon_banner_never_moves_fate_point() {
        let banner = BannerConfig::weapon();
        let mut state = DrawState::new(&banner);
        let mut rng = Scripted::new(&[u(0.0), u(0.9)]);
        draw_once(&mut state, &banner, &mut rng);
        assert_eq!(state.fate_point, 0);
    }

    #[test]
    fn secondary_tier_rolls_on_rare_miss() {
        let banner = BannerConfig::weapon();
        let mut state = DrawState::new(&banner);
        state.secondary_pity = 3;
        // rare miss, secondary hit, secondary rate-up won, item index 3
        let mut rng = Scripted::new(&[u(0.99), u(0.0), u(0.5), 3]);
        let res = draw_once(&mut state, &banner, &mut rng);
        assert!(!res.hit);
        assert_eq!(res.tier, Tier::Secondary);
        assert_eq!(res.featured, Some(3));
        assert_eq!(state.secondary_pity, 0);
        assert_eq!(res.item_name(&banner), "four-star-weapon-4");
    }

    #[test]
    fn secondary_guarantee_after_standard() {
        let banner = BannerConfig::character();
        let mut state = DrawState::new(&banner);
        let mut rng = Scripted::new(&[u(0.99), u(0.0), u(0.9)]);
        let res = draw_once(&mut state, &banner, &mut rng);
        assert_eq!(res.tier, Tier::Secondary);
        assert_eq!(res.featured, None);
        assert!(state.secondary_guaranteed);
        assert_eq!(state.counts.secondary_standard, 1);
    }

    #[test]
    fn invariants_hold_over_long_runs() {
        for banner in [BannerConfig::character(), BannerConfig::weapon()] {
            let mut state = DrawState::new(&banner);
            if banner.has_targeting() {
                state.selected_target = Some(0);
            }
            let mut rng = Rng::from_seed(77);
            let mut expect_boosted = false;
            for _ in 0..200_000 {
                let before = state.pity;
                let res = draw_once(&mut state, &banner, &mut rng);
                assert!(state.override_counter <= banner.override_cap());
                assert!(state.fate_point <= banner.fate_cap());
                if res.hit {
                    assert_eq!(state.pity, 0);
                    if expect_boosted {
                        assert!(res.boosted, "hit after a lost rate-up was not boosted");
                    }
                    expect_boosted = !res.boosted;
                    assert_eq!(expect_boosted, state.guaranteed_rate_up);
                } else {
                    assert_eq!(state.pity, before + 1);
                }
            }
            assert_eq!(state.counts.total_draws, 200_000);
        }
    }

    #[test]
    fn snapshot_validation_fails_fast() {
        let character = BannerConfig::character();
        let weapon = BannerConfig::weapon();

        let bad_pity = StateSnapshot { pity: -1, ..Default::default() };
        assert!(DrawState::from_snapshot(&bad_pity, &character).is_err());

        let over_cap = StateSnapshot { pity: 95, ..Default::default() };
        assert!(DrawState::from_snapshot(&over_cap, &character).is_err());

        let bad_override = StateSnapshot { override_counter: 4, ..Default::default() };
        assert!(DrawState::from_snapshot(&bad_override, &character).is_err());

        let fate_on_character = StateSnapshot { fate_point: 1, ..Default::default() };
        assert!(DrawState::from_snapshot(&fate_on_character, &character).is_err());

        let unknown_target = StateSnapshot {
            selected_target: Some("nope".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            DrawState::from_snapshot(&unknown_target, &weapon),
            Err(GachaError::UnknownTarget { .. })
        ));

        let ok = StateSnapshot {
            pity: 50,
            guarantee_up: true,
            fate_point: 1,
            selected_target: Some("featured-weapon-2".to_string()),
            total_pulls: 300,
            ..Default::default()
        };
        let state = DrawState::from_snapshot(&ok, &weapon).unwrap();
        assert_eq!(state.pity, 50);
        assert_eq!(state.boosted_pity, 50);
        assert_eq!(state.fate_point, 1);
        assert_eq!(state.selected_target, Some(1));
        assert_eq!(state.counts.total_draws, 300);
        assert_eq!(state.counts.featured.len(), 2);
    }

    #[test]
    fn retarget_resets_fate_only_when_switching() {
        let banner = BannerConfig::weapon();
        let mut state = DrawState::new(&banner);
        state.fate_point = 1;
        state.retarget(Some(0));
        assert_eq!(state.fate_point, 1);
        state.retarget(Some(0));
        assert_eq!(state.fate_point, 1);
        state.retarget(Some(1));
        assert_eq!(state.fate_point, 0);
        state.fate_point = 1;
        state.retarget(None);
        assert_eq!(state.fate_point, 0);
        assert!(state.set_target(&BannerConfig::character(), Some("featured-character")).is_err());
    }

    #[test]
    fn draw_n_returns_one_result_per_draw() {
        let banner = BannerConfig::character();
        let mut state = DrawState::new(&banner);
        let mut rng = Rng::from_seed(5);
        let results = draw_n(&mut state, &banner, &mut rng, 10);
        assert_eq!(results.len(), 10);
        assert_eq!(state.counts.total_draws, 10);
    }
}
