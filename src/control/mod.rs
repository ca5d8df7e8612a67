//! Signal control core
//!
//! Turns agent actions into staged phase transitions on a simulation engine
//! and folds the engine's lane counts back into observations and rewards.

pub mod action_codec;
pub mod config;
pub mod env;
pub mod error;
pub mod phase_controller;
pub mod scheduler;
pub mod telemetry;
pub mod topology;
pub mod types;

pub use action_codec::{decode, encode, Action, ActionCodec};
pub use config::{ActionEncoding, Durations, EnvConfig, ObservationChannel};
pub use env::{open, SignalEnv, StepInfo, StepResult};
pub use error::{EngineResultExt, EnvError, EnvResult};
pub use phase_controller::{PhaseController, Transition, TransitionPlan};
pub use scheduler::TickScheduler;
pub use telemetry::{IntersectionRewards, Observation, TelemetryAggregator};
pub use topology::{IntersectionTopology, LaneBinding, PhaseClass, PhaseSet, Topology};
pub use types::{Direction, IntersectionId, LaneId, RoadId};
