//! Constitutive models for MPM particles.
//!
//! Every material turns a deformation gradient into a Kirchhoff stress and,
//! for the plastic ones, projects the deformation gradient back onto its yield
//! surface after each sub-step:
//! - [`SnowParams`]: elastoplastic snow with hardening (material tag `ep`)
//! - [`DruckerPrager`]: Drucker-Prager sand with Hencky strain (tag `dp`)
//! - [`ElasticCoefficients`]: fixed-corotated elasticity (tag `e`)

use std::str::FromStr;

use super::*;

/// Computes Lamé parameters (λ, μ) from Young's modulus and Poisson's ratio.
pub fn lame_lambda_mu(young_modulus: f32, poisson_ratio: f32) -> (f32, f32) {
    (
        young_modulus * poisson_ratio / ((1.0 + poisson_ratio) * (1.0 - 2.0 * poisson_ratio)),
        young_modulus / (2.0 * (1.0 + poisson_ratio)),
    )
}

/// SVD with proper rotations on both sides. An inverted `f` shows up as a
/// negative second singular value.
pub fn svd2(f: &Matrix2<f32>) -> (Matrix2<f32>, Vector2<f32>, Matrix2<f32>) {
    let svd = f.svd(true, true);
    let (mut u, mut v, mut sigma) = match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => (u, v_t.transpose(), svd.singular_values),
        _ => return (Matrix2::identity(), Vector2::new(f[(0, 0)], f[(1, 1)]), Matrix2::identity()),
    };
    if u.determinant() < 0.0 {
        let flipped = -u.column(1).clone_owned();
        u.set_column(1, &flipped);
        sigma.y = -sigma.y;
    }
    if v.determinant() < 0.0 {
        let flipped = -v.column(1).clone_owned();
        v.set_column(1, &flipped);
        sigma.y = -sigma.y;
    }
    (u, sigma, v)
}

fn fixed_corotated(f: &Matrix2<f32>, lambda: f32, mu: f32) -> Matrix2<f32> {
    let (u, _, v) = svd2(f);
    let r = u * v.transpose();
    let j = f.determinant();
    (f - r) * f.transpose() * (2.0 * mu) + Matrix2::identity() * (lambda * (j - 1.0) * j)
}

/// Lamé parameters for linear elastic materials.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct ElasticCoefficients {
    /// Lamé's first parameter λ (bulk response).
    pub lambda: f32,
    /// Lamé's second parameter μ (shear modulus).
    pub mu: f32,
    /// Rest density (kg/m^2 in 2D).
    pub density: f32,
}

impl ElasticCoefficients {
    pub fn from_young_modulus(young_modulus: f32, poisson_ratio: f32, density: f32) -> Self {
        let (lambda, mu) = lame_lambda_mu(young_modulus, poisson_ratio);
        Self {
            lambda,
            mu,
            density,
        }
    }
}

impl Default for ElasticCoefficients {
    fn default() -> Self {
        Self::from_young_modulus(1.0e4, 0.3, 1000.0)
    }
}

/// Elastoplastic snow: singular values of the elastic deformation are
/// clamped to `[1 - theta_c, 1 + theta_s]` and compaction stiffens the
/// material by `exp(hardening * (1 - jp))`.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct SnowParams {
    pub elastic: ElasticCoefficients,
    /// Critical compression.
    pub theta_c: f32,
    /// Critical stretch.
    pub theta_s: f32,
    pub hardening: f32,
}

impl SnowParams {
    // Keeps the hardening exponent in a range the explicit integrator survives.
    const MIN_JP: f32 = 0.6;
    const MAX_JP: f32 = 20.0;

    fn hardening_factor(&self, jp: f32) -> f32 {
        (self.hardening * (1.0 - jp)).exp()
    }
}

impl Default for SnowParams {
    fn default() -> Self {
        Self {
            elastic: ElasticCoefficients::from_young_modulus(1.4e5, 0.2, 400.0),
            theta_c: 2.5e-2,
            theta_s: 7.5e-3,
            hardening: 10.0,
        }
    }
}

/// Drucker-Prager plasticity for granular materials. The friction angle
/// evolves with the accumulated plastic strain `q` as
/// `h0 + (h1 q - h3) exp(-h2 q)` (angles in radians).
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct DruckerPrager {
    pub h0: f32,
    pub h1: f32,
    pub h2: f32,
    pub h3: f32,
    pub lambda: f32,
    pub mu: f32,
    pub density: f32,
}

impl DruckerPrager {
    pub fn new(young_modulus: f32, poisson_ratio: f32, density: f32) -> Self {
        let (lambda, mu) = lame_lambda_mu(young_modulus, poisson_ratio);
        Self {
            h0: 35.0f32.to_radians(),
            h1: 9.0f32.to_radians(),
            h2: 0.2,
            h3: 10.0f32.to_radians(),
            lambda,
            mu,
            density,
        }
    }

    pub fn friction_angle(&self, q: f32) -> f32 {
        self.h0 + (self.h1 * q - self.h3) * (-self.h2 * q).exp()
    }

    fn alpha(&self, q: f32) -> f32 {
        let s = self.friction_angle(q).sin();
        (2.0f32 / 3.0).sqrt() * 2.0 * s / (3.0 - s)
    }

    /// Returns the projected log-singular-values and the plastic strain increment.
    fn return_mapping(&self, eps: Vector2<f32>, q: f32) -> (Vector2<f32>, f32) {
        let tr = eps.sum();
        if tr >= 0.0 {
            // Pulled apart: the grains separate and lose all elastic strain.
            return (Vector2::zeros(), eps.norm());
        }
        let eps_hat = eps - Vector2::repeat(tr / 2.0);
        let eps_hat_norm = eps_hat.norm();
        if eps_hat_norm == 0.0 {
            return (eps, 0.0);
        }
        let dgamma =
            eps_hat_norm + (2.0 * self.lambda + 2.0 * self.mu) / (2.0 * self.mu) * tr * self.alpha(q);
        if dgamma <= 0.0 {
            return (eps, 0.0);
        }
        (eps - eps_hat * (dgamma / eps_hat_norm), dgamma)
    }
}

impl Default for DruckerPrager {
    fn default() -> Self {
        Self::new(3.537e5, 0.3, 2200.0)
    }
}

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Material {
    Snow(SnowParams),
    Sand(DruckerPrager),
    Elastic(ElasticCoefficients),
}

impl Material {
    pub fn snow() -> Self {
        Material::Snow(SnowParams::default())
    }
    pub fn sand() -> Self {
        Material::Sand(DruckerPrager::default())
    }
    pub fn elastic() -> Self {
        Material::Elastic(ElasticCoefficients::default())
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Material::Snow(_) => "ep",
            Material::Sand(_) => "dp",
            Material::Elastic(_) => "e",
        }
    }

    pub fn density(&self) -> f32 {
        match self {
            Material::Snow(p) => p.elastic.density,
            Material::Sand(p) => p.density,
            Material::Elastic(p) => p.density,
        }
    }

    /// Lamé parameters in effect for the given plastic volume ratio.
    pub fn lame(&self, jp: f32) -> (f32, f32) {
        match self {
            Material::Snow(p) => {
                let e = p.hardening_factor(jp);
                (p.elastic.lambda * e, p.elastic.mu * e)
            }
            Material::Sand(p) => (p.lambda, p.mu),
            Material::Elastic(p) => (p.lambda, p.mu),
        }
    }

    /// P-wave speed, the fastest signal the material carries.
    pub fn wave_speed(&self, jp: f32) -> f32 {
        let (lambda, mu) = self.lame(jp);
        ((lambda + 2.0 * mu) / self.density()).sqrt()
    }

    /// Kirchhoff stress `P F^T` for the elastic deformation `f`.
    pub fn kirchhoff_stress(&self, f: &Matrix2<f32>, jp: f32) -> Matrix2<f32> {
        let (lambda, mu) = self.lame(jp);
        match self {
            Material::Snow(_) | Material::Elastic(_) => fixed_corotated(f, lambda, mu),
            Material::Sand(_) => {
                let (u, sigma, _) = svd2(f);
                let log_sigma = sigma.map(|s| s.max(1e-6).ln());
                let tr = log_sigma.sum();
                let diag = log_sigma * (2.0 * mu) + Vector2::repeat(lambda * tr);
                u * Matrix2::from_diagonal(&diag) * u.transpose()
            }
        }
    }

    /// Projects `f` back onto the yield surface, updating the plastic state.
    pub fn project_plasticity(&self, f: &mut Matrix2<f32>, jp: &mut f32, hardening: &mut f32) {
        match self {
            Material::Elastic(_) => {}
            Material::Snow(p) => {
                let (u, sigma, v) = svd2(f);
                let clamped = sigma.map(|s| s.clamp(1.0 - p.theta_c, 1.0 + p.theta_s));
                let new_jp = *jp * (sigma.x * sigma.y) / (clamped.x * clamped.y);
                *jp = new_jp.clamp(SnowParams::MIN_JP, SnowParams::MAX_JP);
                *f = u * Matrix2::from_diagonal(&clamped) * v.transpose();
            }
            Material::Sand(p) => {
                let (u, sigma, v) = svd2(f);
                let eps = sigma.map(|s| s.max(1e-4).ln());
                let (eps, dq) = p.return_mapping(eps, *hardening);
                *hardening += dq;
                *f = u * Matrix2::from_diagonal(&eps.map(f32::exp)) * v.transpose();
            }
        }
    }
}

impl FromStr for Material {
    type Err = Error;

    fn from_str(tag: &str) -> Result<Self> {
        match tag {
            "ep" | "snow" => Ok(Material::snow()),
            "dp" | "sand" => Ok(Material::sand()),
            "e" | "elastic" => Ok(Material::elastic()),
            _ => Err(Error::UnknownMaterial(tag.to_string())),
        }
    }
}
