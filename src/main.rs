use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use gacha_goal::banner::StateSnapshot;
use gacha_goal::goal::parse_copies;
use gacha_goal::report::{
    format_draws, format_estimate, format_rates, format_required, format_session,
};
use gacha_goal::request::{
    DrawRequest, EstimateRequest, GoalRequest, Request, RequiredBudgetRequest,
};
use gacha_goal::{Config, DrawState, GachaEngine, GachaError, Rng};
use log::{info, warn};
use serde::Serialize;
use std::io::Read;
use std::time::Instant;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "data/config.json")]
    config: String,

    /// Print machine-readable JSON instead of a report
    #[arg(long, global = true)]
    json: bool,

    /// Run trials on the calling thread only
    #[arg(long, global = true)]
    sequential: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone)]
enum Commands {
    /// Show the pity curve and rules of one or all banners
    Rates {
        #[arg(short, long)]
        banner: Option<String>,
    },
    /// Draw on a banner from a given state
    Draw {
        #[arg(short, long, default_value = "character")]
        banner: String,
        #[arg(short = 'n', long, default_value_t = 10)]
        count: i64,
        #[arg(short, long)]
        seed: Option<u64>,
        #[arg(long, default_value_t = 0)]
        pity: i64,
        #[arg(long)]
        guarantee: bool,
        #[arg(long)]
        target: Option<String>,
        /// Summarize the run instead of listing every draw
        #[arg(long)]
        session: bool,
    },
    /// Estimate the probability of reaching a goal within a budget
    ///
    /// Goals are written as `BANNER[,key=value...]` with keys item, copies
    /// (c<N>, r<N> or a count), pity, guarantee, override, fate, target.
    Estimate {
        #[arg(short, long)]
        resources: i64,
        #[arg(short = 'a', long)]
        goal_a: String,
        #[arg(short = 'b', long)]
        goal_b: Option<String>,
        #[arg(short, long, default_value_t = 10_000)]
        trials: i64,
        #[arg(long, default_value = "goal-a-first")]
        strategy: String,
        /// Try every strategy and report the best
        #[arg(long)]
        best: bool,
        #[arg(short, long)]
        seed: Option<u64>,
    },
    /// Find the smallest budget reaching a target confidence
    Required {
        #[arg(short = 'a', long)]
        goal_a: String,
        #[arg(short = 'b', long)]
        goal_b: Option<String>,
        #[arg(short = 'p', long, default_value_t = 0.5)]
        confidence: f64,
        #[arg(long, default_value = "goal-a-first")]
        strategy: String,
        #[arg(short, long)]
        seed: Option<u64>,
    },
    /// Answer a JSON request read from a file (`-` for stdin)
    Request { path: String },
}

fn load_config(path: &str) -> Result<Config> {
    match Config::load(path) {
        Ok(config) => {
            info!("[Config] Loaded {} ({} banners)", path, config.banners.len());
            Ok(config)
        }
        Err(GachaError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("[Config] {} not found, using built-in presets", path);
            Ok(Config::default())
        }
        Err(e) => Err(e).with_context(|| format!("failed to load config {}", path)),
    }
}

/// Parses `BANNER[,key=value...]` into a goal request.
fn parse_goal(spec: &str, config: &Config) -> Result<GoalRequest> {
    let mut parts = spec.split(',').map(str::trim);
    let banner_name = parts.next().filter(|s| !s.is_empty()).context("goal needs a banner name")?;
    let banner = config.banner(banner_name)?;

    let mut goal = GoalRequest {
        banner: banner_name.to_string(),
        ..GoalRequest::default()
    };
    let mut copies = None;
    for part in parts {
        let (key, value) = part.split_once('=').unwrap_or((part, "true"));
        let int = || {
            value
                .parse::<i64>()
                .with_context(|| format!("{} expects an integer, got '{}'", key, value))
        };
        match key {
            "item" => goal.item = Some(value.to_string()),
            "copies" => copies = Some(parse_copies(value)?),
            "pity" => goal.state.pity = int()?,
            "guarantee" => {
                goal.state.guarantee_up =
                    value.parse::<bool>().context("guarantee expects true/false")?
            }
            "override" => goal.state.override_counter = int()?,
            "fate" => goal.state.fate_point = int()?,
            "target" => goal.state.selected_target = Some(value.to_string()),
            other => bail!("unknown goal key '{}'", other),
        }
    }

    let item = goal
        .item
        .clone()
        .or_else(|| goal.state.selected_target.clone())
        .or_else(|| banner.featured.first().cloned())
        .context("banner has no featured items")?;
    goal.targets.insert(item, copies.unwrap_or(1) as i64);
    goal.item = None;
    Ok(goal)
}

fn emit<T: Serialize>(json: bool, value: &T, report: impl FnOnce() -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print!("{}", report());
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = load_config(&args.config)?;
    let engine = if args.sequential {
        GachaEngine::sequential(config)
    } else {
        GachaEngine::new(config)
    };

    match args.command.clone() {
        Commands::Rates { banner } => {
            let banners: Vec<_> = match banner {
                Some(name) => vec![engine.banner(&name)?],
                None => engine.config().banners.values().collect(),
            };
            emit(args.json, &banners, || {
                banners.iter().map(|b| format_rates(b)).collect::<Vec<_>>().join("\n")
            })?;
        }
        Commands::Draw {
            banner,
            count,
            seed,
            pity,
            guarantee,
            target,
            session,
        } => {
            let state = StateSnapshot {
                pity,
                guarantee_up: guarantee,
                selected_target: target,
                ..StateSnapshot::default()
            };
            if session {
                let config = engine.banner(&banner)?;
                let start = DrawState::from_snapshot(&state, config)?;
                let draws = u32::try_from(count)
                    .context("count must be a non-negative 32-bit number")?;
                let mut rng = seed.map_or_else(Rng::from_entropy, Rng::from_seed);
                let started = Instant::now();
                let summary = engine.simulate_session(&start, &banner, &mut rng, draws)?;
                info!("[Draw] {} draws in {:.2?}", draws, started.elapsed());
                emit(args.json, &summary, || format_session(config, &summary))?;
            } else {
                let response = engine.handle_draw(&DrawRequest {
                    banner: banner.clone(),
                    state,
                    count,
                    seed,
                })?;
                let config = engine.banner(&banner)?;
                emit(args.json, &response, || format_draws(config, &response.results))?;
            }
        }
        Commands::Estimate {
            resources,
            goal_a,
            goal_b,
            trials,
            strategy,
            best,
            seed,
        } => {
            let request = EstimateRequest {
                resources,
                goal_a: parse_goal(&goal_a, engine.config())?,
                goal_b: goal_b.map(|g| parse_goal(&g, engine.config())).transpose()?,
                trials,
                strategy,
                seed,
            };
            let started = Instant::now();
            let result = if best {
                let call = request.validate(engine.config())?;
                engine.best_strategy(call.budget, &call.plan, call.trials, call.seed)?
            } else {
                engine.handle_estimate(&request)?
            };
            info!("[Estimate] Finished in {:.2?}", started.elapsed());
            emit(args.json, &result, || format_estimate(&result))?;
        }
        Commands::Required {
            goal_a,
            goal_b,
            confidence,
            strategy,
            seed,
        } => {
            let request = RequiredBudgetRequest {
                goal_a: parse_goal(&goal_a, engine.config())?,
                goal_b: goal_b.map(|g| parse_goal(&g, engine.config())).transpose()?,
                confidence,
                strategy,
                seed,
            };
            let started = Instant::now();
            let result = engine.handle_required(&request)?;
            info!("[Solver] Finished in {:.2?}", started.elapsed());
            emit(args.json, &result, || format_required(&result))?;
        }
        Commands::Request { path } => {
            let mut contents = String::new();
            if path == "-" {
                std::io::stdin().read_to_string(&mut contents)?;
            } else {
                contents = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path))?;
            }
            let request: Request = serde_json::from_str(&contents).context("malformed request")?;
            let response = engine.handle(&request)?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }
    Ok(())
}
