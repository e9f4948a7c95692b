use crate::banner::Tier;
use crate::config::BannerConfig;
use crate::estimate::{EstimateMethod, EstimationResult};
use crate::pity::{expected_draws_per_hit, hit_distribution};
use crate::request::DrawRecord;
use crate::sim::{IntervalStats, SessionSummary};
use crate::solver::{LowerBoundHeuristic, RequiredBudget};
use colored::*;
use std::fmt::Write;

pub fn percent(p: f64) -> String {
    format!("{:.2}%", p * 100.0)
}

pub fn format_rates(banner: &BannerConfig) -> String {
    let mut out = String::new();
    let curve = &banner.curve;
    let header = format!("=== Banner: {} ({}) ===", banner.name, banner.kind.label());
    let _ = writeln!(out, "{}", header.cyan().bold());
    let _ = writeln!(out, "Featured: {}", banner.featured.join(", "));
    let _ = writeln!(
        out,
        "Rare rate {} (ramp from pity {} by +{} per draw, certain at pity {})",
        percent(curve.base_rate),
        curve.ramp_threshold,
        percent(curve.step_increase),
        curve.hard_pity_cap
    );
    let _ = writeln!(out, "Rate-up share: {}", percent(banner.rate_up_fraction));
    if let Some(rule) = &banner.override_rule {
        let _ = writeln!(
            out,
            "Override: {} per rare, forced after {} guarantee wins",
            percent(rule.base_rate),
            rule.counter_cap
        );
    }
    if let Some(t) = &banner.targeting {
        let _ = writeln!(out, "Targeting: forced target after {} misses", t.fate_cap);
    }
    let _ = writeln!(
        out,
        "Expected draws per rare: {}",
        format!("{:.2}", expected_draws_per_hit(curve)).green()
    );
    match banner.worst_case_draws_per_copy() {
        Some(n) => {
            let _ = writeln!(out, "Worst case per featured copy: {} draws", n);
        }
        None => {
            let _ = writeln!(out, "Worst case per featured copy: {}", "unbounded".yellow());
        }
    }

    let dist = hit_distribution(curve);
    let mut cumulative = 0.0;
    let _ = writeln!(out, "{}", "  pity | rate    | P(rare by here)".dimmed());
    for (pity, p) in dist.iter().enumerate() {
        cumulative += p;
        let pity = pity as u32;
        if pity + 1 < curve.ramp_threshold && pity % 10 != 0 {
            continue;
        }
        let _ = writeln!(
            out,
            "  {:>4} | {:>7} | {:>8}",
            pity,
            percent(curve.rate(pity)),
            percent(cumulative.min(1.0))
        );
    }
    out
}

pub fn format_draws(banner: &BannerConfig, records: &[DrawRecord]) -> String {
    let mut out = String::new();
    let header = format!("=== {} draw(s) on {} ===", records.len(), banner.name);
    let _ = writeln!(out, "{}", header.cyan().bold());
    for (i, record) in records.iter().enumerate() {
        let r = &record.result;
        let label = match r.tier {
            Tier::Rare if r.boosted => record.item.yellow().bold(),
            Tier::Rare => record.item.yellow(),
            Tier::Secondary => record.item.magenta(),
            Tier::Filler => continue,
        };
        let mut flags = Vec::new();
        if r.override_fired {
            flags.push("override");
        }
        if r.fate_fired {
            flags.push("fate");
        }
        if r.on_target {
            flags.push("on target");
        }
        let suffix = if flags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", flags.join(", "))
        };
        let _ = writeln!(out, "{:>5}. {} (p={}){}", i + 1, label, percent(r.probability), suffix);
    }
    let rares = records.iter().filter(|r| r.result.hit).count();
    let _ = writeln!(out, "Rare hits: {} / {}", rares, records.len());
    out
}

pub fn format_estimate(res: &EstimationResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", "=== Goal Probability ===".cyan().bold());
    let _ = writeln!(out, "Strategy: {} | Budget: {} draws", res.strategy, res.budget);
    let p = percent(res.probability);
    let colored_p = if res.probability >= 0.9 {
        p.green().bold()
    } else if res.probability >= 0.5 {
        p.yellow().bold()
    } else {
        p.red().bold()
    };
    match res.method {
        EstimateMethod::Exact => {
            let _ = writeln!(out, "Probability: {} (exact)", colored_p);
        }
        EstimateMethod::Simulated => {
            let _ = writeln!(out, "Probability: {}", colored_p);
            let _ = writeln!(
                out,
                "Raw frequency: {} ({}/{} trials, {} requested)",
                percent(res.frequency_estimate),
                res.successes,
                res.trials_used,
                res.trials_requested
            );
            let _ = writeln!(
                out,
                "Wilson 95% CI: [{}, {}]",
                percent(res.ci95_wilson.lo),
                percent(res.ci95_wilson.hi)
            );
        }
    }
    out
}

pub fn format_required(res: &RequiredBudget) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", "=== Required Budget ===".cyan().bold());
    let _ = writeln!(
        out,
        "Target confidence: {} | Strategy: {}",
        percent(res.confidence),
        res.strategy
    );
    let _ = writeln!(
        out,
        "Required draws: {}",
        res.required_budget.to_string().green().bold()
    );
    let _ = writeln!(
        out,
        "Verified probability: {} ({} trials)",
        percent(res.verified_probability),
        res.verification.trials_used
    );
    let _ = writeln!(
        out,
        "Search: [{}, {}] in {} bisection steps",
        res.low, res.high, res.iterations
    );
    match res.heuristic {
        LowerBoundHeuristic::Accepted => {
            let _ = writeln!(out, "Lower bound: half of worst case (verified)");
        }
        LowerBoundHeuristic::Rejected => {
            let note = "Lower bound: half of worst case rejected, searched from minimum";
            let _ = writeln!(out, "{}", note.yellow());
        }
        LowerBoundHeuristic::NotApplicable => {}
    }
    if res.hit_ceiling {
        let _ = writeln!(out, "{}", "Target not reached within the configured max budget".red());
    }
    out
}

fn format_intervals(label: &str, stats: &Option<IntervalStats>) -> String {
    match stats {
        Some(s) => format!(
            "{}: n={} mean={:.2} median={:.1} std={:.2} min={} max={}",
            label, s.count, s.mean, s.median, s.std_dev, s.min, s.max
        ),
        None => format!("{}: none", label),
    }
}

pub fn format_session(banner: &BannerConfig, summary: &SessionSummary) -> String {
    let mut out = String::new();
    let c = &summary.counts;
    let header = format!("=== Session: {} draws on {} ===", summary.draws, banner.name);
    let _ = writeln!(out, "{}", header.cyan().bold());
    let _ = writeln!(
        out,
        "Rares: {} (featured {}, standard {})",
        c.rare(),
        c.boosted(),
        c.standard
    );
    for (name, count) in banner.featured.iter().zip(&c.featured) {
        let _ = writeln!(out, "  {}: {}", name, count);
    }
    if banner.has_override() {
        let _ = writeln!(out, "Override triggers: {}", c.overrides);
    }
    if banner.secondary.is_some() {
        let _ = writeln!(
            out,
            "Secondary: featured {}, standard {}",
            c.secondary_featured, c.secondary_standard
        );
    }
    if let Some(per) = summary.draws_per_rare {
        let _ = writeln!(out, "Draws per rare: {:.2}", per);
    }
    if let Some(per) = summary.draws_per_boosted {
        let _ = writeln!(out, "Draws per featured rare: {:.2}", per);
    }
    let featured = format_intervals("Featured intervals", &summary.boosted_intervals);
    let _ = writeln!(out, "{}", featured);
    if banner.has_targeting() {
        let on_target = format_intervals("On-target intervals", &summary.on_target_intervals);
        let _ = writeln!(out, "{}", on_target);
    }
    out
}
