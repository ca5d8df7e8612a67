//! Error kinds raised by the signal controller

use thiserror::Error;

/// Every controller failure is a configuration or invariant violation; none are retryable.
#[derive(Debug, Error)]
pub enum EnvError {
    /// The action does not fit the declared action space
    #[error("invalid action: {0}")]
    InvalidAction(String),

    #[error(
        "intersection {intersection} phase {phase} has {links} available road links, expected 0, 4 or more than 4"
    )]
    UnrecognizedPhase {
        intersection: String,
        phase: usize,
        links: usize,
    },

    #[error("observation shape mismatch: {0}")]
    ObservationShapeMismatch(String),

    #[error("simulation engine unavailable during {call}: {reason}")]
    EngineUnavailable { call: &'static str, reason: String },

    #[error("invalid road network: {0}")]
    InvalidRoadnet(String),

    #[error("step called before reset")]
    EpisodeNotStarted,
}

pub type EnvResult<T> = Result<T, EnvError>;

/// Maps engine failures onto [`EnvError::EngineUnavailable`]
pub trait EngineResultExt<T> {
    fn engine_call(self, call: &'static str) -> EnvResult<T>;
}

impl<T> EngineResultExt<T> for anyhow::Result<T> {
    fn engine_call(self, call: &'static str) -> EnvResult<T> {
        self.map_err(|err| EnvError::EngineUnavailable {
            call,
            reason: format!("{:#}", err),
        })
    }
}
