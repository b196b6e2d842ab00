use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while configuring or stepping a simulation.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    #[error("unknown material tag {0:?}")]
    UnknownMaterial(String),

    /// The level set was sampled on a grid of another size.
    #[error("level set has {found:?} nodes, the simulator grid has {expected:?}")]
    LevelSetMismatch { expected: [u32; 2], found: [u32; 2] },

    #[error("non-finite grid velocity at node ({i}, {j})")]
    NonFiniteVelocity { i: u32, j: u32 },

    #[error("particle {0} has a non-finite position or velocity")]
    NonFiniteParticle(usize),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
