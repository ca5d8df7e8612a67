use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;

use signal_control::control::{self, Action, ActionEncoding, EnvConfig, SignalEnv};
use signal_control::roadnet::{grid_flows, GridOptions, RoadnetFile};
use signal_control::simulation::{EngineSettings, SimWorld};

#[derive(Parser)]
#[command(name = "signal_control")]
#[command(about = "Run traffic signal control episodes against the reference engine")]
struct Cli {
    /// Env config JSON naming an engine config; a generated grid is used when absent
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of episodes to run
    #[arg(long, default_value = "1")]
    episodes: u32,

    /// Random seed for the engine and the random policy
    #[arg(long)]
    seed: Option<u64>,

    /// Rows of the generated grid
    #[arg(long, default_value = "1", conflicts_with = "config")]
    rows: usize,

    /// Columns of the generated grid
    #[arg(long, default_value = "1", conflicts_with = "config")]
    cols: usize,

    /// Let the engine run its fixed-time programs on the generated grid
    #[arg(long, conflicts_with = "config")]
    fixed_time: bool,

    #[arg(long)]
    green: Option<u64>,

    #[arg(long)]
    yellow: Option<u64>,

    #[arg(long)]
    red: Option<u64>,

    /// Tick budget of an episode
    #[arg(long)]
    max_duration: Option<u64>,

    /// How actions are chosen
    #[arg(long, value_enum, default_value = "cycle")]
    policy: Policy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Policy {
    /// Keep every intersection on its current green
    Hold,
    /// Move every intersection to its next green each step
    Cycle,
    /// Pick uniformly random greens
    Random,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("warn,signal_control=info"),
    )
    .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EnvConfig::from_file(path)?,
        None => EnvConfig::default(),
    };
    if let Some(green) = cli.green {
        config.green_duration = green;
    }
    if let Some(yellow) = cli.yellow {
        config.yellow_duration = yellow;
    }
    if let Some(red) = cli.red {
        config.red_duration = red;
    }
    if let Some(max_duration) = cli.max_duration {
        config.max_episode_duration = max_duration;
    }

    let mut env = match config.config_path {
        Some(_) => control::open(config)?,
        None => grid_env(&cli, config)?,
    };

    let flat_actions = match env.action_count() {
        Some(count) => count.to_string(),
        None => "too many".to_string(),
    };
    println!(
        "Controlling {} intersections, {} flat actions, observation length {}",
        env.topology().len(),
        flat_actions,
        env.observation_len()
    );

    let mut rng = StdRng::seed_from_u64(cli.seed.unwrap_or_default());
    if let Some(seed) = cli.seed {
        env.seed(seed)?;
    }
    for episode in 1..=cli.episodes {
        let total = run_episode(&mut env, cli.policy, &mut rng)
            .with_context(|| format!("Episode {} failed", episode))?;
        println!(
            "Episode {} finished after {} ticks: total reward {:.1} | {}",
            episode,
            env.elapsed(),
            total,
            env.engine().summary()
        );
    }
    env.close()?;

    Ok(())
}

/// Build an environment over a generated grid scenario
fn grid_env(cli: &Cli, config: EnvConfig) -> Result<SignalEnv<SimWorld>> {
    let options = GridOptions::default();
    let roadnet = RoadnetFile::grid(cli.rows, cli.cols, &options);
    let flows = grid_flows(cli.rows, cli.cols, &options);
    let settings = EngineSettings {
        seed: cli.seed.unwrap_or_default(),
        rl_traffic_light: !cli.fixed_time,
        ..EngineSettings::default()
    };
    info!(
        "Generated {}x{} grid with {} flows",
        cli.rows,
        cli.cols,
        flows.len()
    );
    let engine = SimWorld::new(&roadnet, &flows, settings)?;
    let env = SignalEnv::new(engine, &roadnet, settings.rl_traffic_light, config)?;
    Ok(env)
}

fn run_episode(env: &mut SignalEnv<SimWorld>, policy: Policy, rng: &mut StdRng) -> Result<f32> {
    env.reset()?;
    loop {
        let phases = choose(env, policy, rng);
        let action = match env.config().action_encoding {
            ActionEncoding::PerIntersection => Action::Phases(phases),
            ActionEncoding::FlatDiscrete => Action::Flat(env.codec().encode(&phases)?),
        };
        let result = env.step(&action)?;
        if result.done {
            return Ok(result.info.final_eval_reward.unwrap_or(env.total_reward()));
        }
    }
}

fn choose(env: &SignalEnv<SimWorld>, policy: Policy, rng: &mut StdRng) -> Vec<usize> {
    let current = env.current_phases();
    let radices = env.action_radices();
    match policy {
        Policy::Hold => current.to_vec(),
        Policy::Cycle => current
            .iter()
            .zip(radices)
            .map(|(phase, radix)| (phase + 1) % radix)
            .collect(),
        Policy::Random => radices
            .iter()
            .map(|radix| rng.random_range(0..*radix))
            .collect(),
    }
}
