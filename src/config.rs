use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Grid cells along x and y. Cell size is `1 / resolution[0]`.
    pub resolution: [u32; 2],

    /// Particles seeded per grid cell; the fraction is realized per cell.
    #[serde(default = "default_particles_per_cell")]
    pub particles_per_cell: f32,

    /// Candidate for the first sub-step.
    #[serde(default = "default_initial_dt")]
    pub initial_dt: f32,

    /// No sub-step is ever longer than this.
    #[serde(default = "default_max_delta_t")]
    pub max_delta_t: f32,

    /// Floor for the adaptive sub-step.
    #[serde(default = "default_min_delta_t")]
    pub min_delta_t: f32,

    /// Simulated time per frame.
    #[serde(default = "default_frame_dt")]
    pub frame_dt: f32,

    #[serde(default = "default_gravity")]
    pub gravity: [f32; 2],

    /// Fraction of a cell the fastest signal may cross per sub-step.
    #[serde(default = "default_cfl")]
    pub cfl: f32,

    /// 0 is pure APIC, 1 is pure FLIP.
    #[serde(default)]
    pub flip_alpha: f32,

    /// Seed for particle jitter; entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Fail a step as soon as a grid velocity goes non-finite.
    #[serde(default)]
    pub check_velocities: bool,
}

fn default_particles_per_cell() -> f32 {
    4.0
}

fn default_initial_dt() -> f32 {
    1e-4
}

fn default_max_delta_t() -> f32 {
    2e-3
}

fn default_min_delta_t() -> f32 {
    1e-6
}

fn default_frame_dt() -> f32 {
    0.02
}

fn default_gravity() -> [f32; 2] {
    [0.0, -9.8]
}

fn default_cfl() -> f32 {
    0.5
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            resolution: [128, 128],
            particles_per_cell: default_particles_per_cell(),
            initial_dt: default_initial_dt(),
            max_delta_t: default_max_delta_t(),
            min_delta_t: default_min_delta_t(),
            frame_dt: default_frame_dt(),
            gravity: default_gravity(),
            cfl: default_cfl(),
            flip_alpha: 0.0,
            seed: None,
            check_velocities: false,
        }
    }
}

fn positive(name: &str, value: f32) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(Error::InvalidParam(format!(
            "{name} must be finite and > 0, got {value}"
        )));
    }
    Ok(())
}

impl SimulatorConfig {
    pub const MIN_RESOLUTION: u32 = 8;

    pub fn validate(&self) -> Result<()> {
        if self.resolution.iter().any(|&r| r < Self::MIN_RESOLUTION) {
            return Err(Error::InvalidParam(format!(
                "resolution must be at least {0}x{0}, got {1:?}",
                Self::MIN_RESOLUTION,
                self.resolution
            )));
        }
        positive("particles_per_cell", self.particles_per_cell)?;
        positive("initial_dt", self.initial_dt)?;
        positive("max_delta_t", self.max_delta_t)?;
        positive("min_delta_t", self.min_delta_t)?;
        positive("frame_dt", self.frame_dt)?;
        positive("cfl", self.cfl)?;
        if self.min_delta_t > self.max_delta_t {
            return Err(Error::InvalidParam(format!(
                "min_delta_t ({}) exceeds max_delta_t ({})",
                self.min_delta_t, self.max_delta_t
            )));
        }
        if !(0.0..=1.0).contains(&self.flip_alpha) {
            return Err(Error::InvalidParam(format!(
                "flip_alpha must be in [0, 1], got {}",
                self.flip_alpha
            )));
        }
        if !self.gravity.iter().all(|g| g.is_finite()) {
            return Err(Error::InvalidParam("gravity must be finite".into()));
        }
        Ok(())
    }

    pub fn dx(&self) -> f32 {
        1.0 / self.resolution[0] as f32
    }

    pub fn gravity(&self) -> Vector2<f32> {
        Vector2::from(self.gravity)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path.as_ref(), serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
