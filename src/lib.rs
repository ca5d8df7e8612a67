//! Traffic Signal Control Library
//!
//! A reinforcement-learning environment for traffic-signal phase control,
//! with a reference traffic engine to run it against.

pub mod control;
pub mod engine;
pub mod roadnet;
pub mod simulation;
