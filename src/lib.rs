use std::{
    collections::HashMap,
    ops::{Deref, Index, IndexMut},
};

use log::{debug, info, trace, warn};
use nalgebra::{Matrix2, SVector as Vector, Vector2};
use rand::{Rng, RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;
use smallvec::SmallVec;

pub mod base;
pub mod config;
pub mod error;
pub mod ext;
pub mod grid;
pub mod levelset;
pub mod material;
pub mod packing;
pub mod particle;
pub mod shape;
pub mod simulator;
pub mod transfer;
pub mod utils;
use base::*;
pub use base::VolumeCore;
pub use config::SimulatorConfig;
pub use error::{Error, Result};
pub use ext::{GridSettings, PackedSettings, SeedSettings, Volume};
pub use grid::Grid;
pub use levelset::LevelSet;
pub use material::Material;
use packing::*;
pub use particle::{Particle, ParticleBatch, Particles, Seeding};
pub use simulator::{Simulator, Trigger};
use utils::*;

/// Builds a simulator with default physics for everything but the four
/// parameters a scene usually tunes.
pub fn create_mpm_simulator(
    resolution: [u32; 2],
    particles_per_cell: f32,
    initial_dt: f32,
    max_delta_t: f32,
) -> Result<Simulator> {
    Simulator::new(SimulatorConfig {
        resolution,
        particles_per_cell,
        initial_dt,
        max_delta_t,
        ..Default::default()
    })
}
