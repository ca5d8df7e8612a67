//! Episode driver
//!
//! Gym-style `reset`/`step` loop over a [`SimulationEngine`]. One driver owns
//! one engine; vectorised rollouts use one driver per episode.

use anyhow::Context;
use log::{debug, info};

use super::action_codec::{Action, ActionCodec};
use super::config::{ActionEncoding, EnvConfig};
use super::error::{EngineResultExt, EnvError, EnvResult};
use super::phase_controller::{PhaseController, TransitionPlan};
use super::scheduler::TickScheduler;
use super::telemetry::{IntersectionRewards, Observation, TelemetryAggregator};
use super::topology::Topology;
use crate::engine::SimulationEngine;
use crate::roadnet::RoadnetFile;
use crate::simulation::SimWorld;

/// Result of a single [`SignalEnv::step`]
#[derive(Debug, Clone)]
pub struct StepResult {
    /// Flat observation after the step
    pub observation: Vec<f32>,
    /// Sum of the per-intersection rewards
    pub reward: f32,
    pub done: bool,
    pub info: StepInfo,
}

#[derive(Debug, Clone, Default)]
pub struct StepInfo {
    /// Ticks consumed since reset
    pub elapsed: u64,
    pub rewards: IntersectionRewards,
    /// What the phase controller did; `None` when the engine runs its own programs
    pub plan: Option<TransitionPlan>,
    /// Accumulated episode reward, set on the terminating step
    pub final_eval_reward: Option<f32>,
}

/// A signal control environment over an owned engine
pub struct SignalEnv<E: SimulationEngine> {
    engine: E,
    topology: Topology,
    config: EnvConfig,
    actions_enabled: bool,
    codec: ActionCodec,
    controller: PhaseController,
    scheduler: TickScheduler,
    telemetry: TelemetryAggregator,
    total_reward: f32,
    started: bool,
    released: bool,
}

impl<E: SimulationEngine> SignalEnv<E> {
    /// Build the environment around `engine`.
    ///
    /// `roadnet` must describe the network the engine simulates. With
    /// `actions_enabled` false the engine is expected to run its own signal
    /// programs and actions passed to `step` are ignored.
    pub fn new(
        engine: E,
        roadnet: &RoadnetFile,
        actions_enabled: bool,
        config: EnvConfig,
    ) -> EnvResult<Self> {
        let lanes = engine
            .lane_vehicle_count()
            .engine_call("lane_vehicle_count")?;
        let topology = Topology::build(roadnet, lanes.keys().map(String::as_str))?;
        if topology.is_empty() {
            return Err(EnvError::InvalidRoadnet(
                "no controlled intersection in the road network".to_string(),
            ));
        }

        let durations = config.durations();
        if actions_enabled {
            topology.validate_clearance(&durations)?;
        }
        let codec = ActionCodec::new(topology.green_counts())?;
        if actions_enabled && config.action_encoding == ActionEncoding::FlatDiscrete {
            codec.flat_cardinality()?;
        }
        let telemetry = TelemetryAggregator::new(&topology, &config.obs_type);

        info!(
            "Signal env ready: {} intersections, action radices {:?}, observation length {}, durations r{}/y{}/g{}",
            topology.len(),
            codec.radices(),
            telemetry.observation_len(),
            durations.red,
            durations.yellow,
            durations.green
        );

        Ok(Self {
            controller: PhaseController::new(topology.len(), durations),
            scheduler: TickScheduler::new(config.max_episode_duration),
            engine,
            topology,
            config,
            actions_enabled,
            codec,
            telemetry,
            total_reward: 0.0,
            started: false,
            released: false,
        })
    }

    pub fn seed(&mut self, seed: u64) -> EnvResult<()> {
        self.engine
            .set_random_seed(seed)
            .engine_call("set_random_seed")
    }

    /// Start a new episode and return the initial flat observation
    pub fn reset(&mut self) -> EnvResult<Vec<f32>> {
        self.engine.reset().engine_call("reset")?;
        self.controller
            .reset(&self.topology, &mut self.engine, self.actions_enabled)?;
        self.scheduler.reset();
        self.total_reward = 0.0;
        self.started = true;
        self.released = false;

        info!("Episode reset");
        Ok(self.observe()?.flatten())
    }

    pub fn step(&mut self, action: &Action) -> EnvResult<StepResult> {
        if !self.started {
            return Err(EnvError::EpisodeNotStarted);
        }

        let plan = if self.actions_enabled {
            let targets = self.targets(action)?;
            Some(self.controller.apply(
                &targets,
                &self.topology,
                &mut self.scheduler,
                &mut self.engine,
            )?)
        } else {
            let ticks = self.controller.durations().step_ticks();
            self.scheduler.run(&mut self.engine, ticks)?;
            None
        };

        let observation = self.observe()?.flatten();
        let rewards = self.telemetry.build_reward(&self.topology, &self.engine)?;
        let reward = rewards.total();
        self.total_reward += reward;
        let done = self.scheduler.is_done();

        debug!(
            "Step to t={}: reward {:.1}, {} intersections changed",
            self.scheduler.elapsed(),
            reward,
            plan.as_ref().map_or(0, |plan| plan.changed.len())
        );

        let final_eval_reward = if done {
            self.release_engine()?;
            Some(self.total_reward)
        } else {
            None
        };

        Ok(StepResult {
            observation,
            reward,
            done,
            info: StepInfo {
                elapsed: self.scheduler.elapsed(),
                rewards,
                plan,
                final_eval_reward,
            },
        })
    }

    /// Release engine resources. Safe to call more than once.
    pub fn close(&mut self) -> EnvResult<()> {
        self.release_engine()
    }

    /// Current observation, per intersection
    pub fn observe(&self) -> EnvResult<Observation> {
        self.telemetry
            .build_observation(&self.topology, self.controller.current(), &self.engine)
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    pub fn actions_enabled(&self) -> bool {
        self.actions_enabled
    }

    pub fn observation_len(&self) -> usize {
        self.telemetry.observation_len()
    }

    /// Green phase count per intersection
    pub fn action_radices(&self) -> &[usize] {
        self.codec.radices()
    }

    /// Size of the flat discrete action space, `None` when it overflows
    pub fn action_count(&self) -> Option<usize> {
        self.codec.cardinality()
    }

    pub fn codec(&self) -> &ActionCodec {
        &self.codec
    }

    pub fn current_phases(&self) -> &[usize] {
        self.controller.current()
    }

    pub fn elapsed(&self) -> u64 {
        self.scheduler.elapsed()
    }

    /// Reward accumulated since the last reset
    pub fn total_reward(&self) -> f32 {
        self.total_reward
    }

    pub fn is_done(&self) -> bool {
        self.started && self.scheduler.is_done()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Turn an action into validated per-intersection targets
    fn targets(&self, action: &Action) -> EnvResult<Vec<usize>> {
        match (self.config.action_encoding, action) {
            (ActionEncoding::PerIntersection, Action::Phases(phases)) => {
                self.codec.validate(phases)?;
                Ok(phases.clone())
            }
            (ActionEncoding::FlatDiscrete, Action::Flat(flat)) => self.codec.decode(*flat),
            (encoding, action) => Err(EnvError::InvalidAction(format!(
                "{:?} does not match the {:?} action encoding",
                action, encoding
            ))),
        }
    }

    fn release_engine(&mut self) -> EnvResult<()> {
        if self.released {
            return Ok(());
        }
        self.engine.release().engine_call("release")?;
        self.released = true;
        info!(
            "Episode finished at t={} with total reward {:.1}",
            self.scheduler.elapsed(),
            self.total_reward
        );
        Ok(())
    }
}

/// Build an environment over the reference engine from an env config.
///
/// The env config must name an engine config file; its `rlTrafficLight` flag
/// decides whether actions are enabled.
pub fn open(config: EnvConfig) -> anyhow::Result<SignalEnv<SimWorld>> {
    let path = config
        .config_path
        .clone()
        .context("Env config does not name an engine config file")?;
    let (engine, roadnet) = SimWorld::from_config_file(&path)?;
    let actions_enabled = engine.settings().rl_traffic_light;
    let env = SignalEnv::new(engine, &roadnet, actions_enabled, config)
        .with_context(|| format!("Failed to build signal env from {}", path.display()))?;
    Ok(env)
}
