use super::*;

/// A material point.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub position: Vector2<f32>,
    pub velocity: Vector2<f32>,
    /// APIC affine velocity field `C`.
    pub affine: Matrix2<f32>,
    /// Elastic deformation gradient `F`.
    pub deformation: Matrix2<f32>,
    pub mass: f32,
    /// Rest volume.
    pub volume: f32,
    pub material: Material,
    /// Plastic volume ratio (snow).
    pub jp: f32,
    /// Accumulated plastic strain (sand).
    pub hardening: f32,
}

impl Particle {
    pub fn new(
        position: Vector2<f32>,
        velocity: Vector2<f32>,
        mass: f32,
        volume: f32,
        material: Material,
    ) -> Result<Self> {
        if !mass.is_finite() || mass <= 0.0 {
            return Err(Error::InvalidParam("particle mass must be finite and > 0".into()));
        }
        if !volume.is_finite() || volume <= 0.0 {
            return Err(Error::InvalidParam("particle volume must be finite and > 0".into()));
        }
        if !position.iter().all(|x| x.is_finite()) {
            return Err(Error::InvalidParam("particle position must be finite".into()));
        }
        if !velocity.iter().all(|x| x.is_finite()) {
            return Err(Error::InvalidParam("particle velocity must be finite".into()));
        }
        Ok(Self {
            position,
            velocity,
            affine: Matrix2::zeros(),
            deformation: Matrix2::identity(),
            mass,
            volume,
            material,
            jp: 1.0,
            hardening: 0.0,
        })
    }

    #[inline]
    pub fn kinetic_energy(&self) -> f32 {
        0.5 * self.mass * self.velocity.norm_squared()
    }

    #[inline]
    pub fn momentum(&self) -> Vector2<f32> {
        self.velocity * self.mass
    }

    pub fn is_finite(&self) -> bool {
        self.position.iter().chain(self.velocity.iter()).all(|x| x.is_finite())
    }

    /// Kirchhoff stress of the current elastic deformation.
    pub fn stress(&self) -> Matrix2<f32> {
        self.material.kirchhoff_stress(&self.deformation, self.jp)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Particles {
    list: Vec<Particle>,
}

impl Particles {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn push(&mut self, particle: Particle) {
        self.list.push(particle);
    }
    pub fn len(&self) -> usize {
        self.list.len()
    }
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
    pub fn iter(&self) -> std::slice::Iter<'_, Particle> {
        self.list.iter()
    }
    pub fn as_slice(&self) -> &[Particle] {
        &self.list
    }
    pub fn as_mut_slice(&mut self) -> &mut [Particle] {
        &mut self.list
    }
    pub fn total_mass(&self) -> f32 {
        self.list.iter().map(|p| p.mass).sum()
    }
    pub fn kinetic_energy(&self) -> f32 {
        self.list.iter().map(Particle::kinetic_energy).sum()
    }
    pub fn momentum(&self) -> Vector2<f32> {
        self.list.iter().map(Particle::momentum).sum()
    }
    pub fn center_of_mass(&self) -> Option<Vector2<f32>> {
        let mass = self.total_mass();
        (mass > 0.0).then(|| {
            self.list
                .iter()
                .map(|p| p.position * p.mass)
                .sum::<Vector2<f32>>()
                / mass
        })
    }
    pub fn max_speed(&self) -> f32 {
        self.list
            .iter()
            .map(|p| p.velocity.norm())
            .fold(0.0, f32::max)
    }
}

impl<'a> IntoIterator for &'a Particles {
    type Item = &'a Particle;
    type IntoIter = std::slice::Iter<'a, Particle>;
    fn into_iter(self) -> Self::IntoIter {
        self.list.iter()
    }
}

/// How a batch fills its shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Seeding {
    /// Random points per grid cell.
    #[default]
    Jittered,
    /// A regular lattice, offset half a spacing from the cell corners.
    Lattice,
    /// Jittered points relaxed until they stop overlapping.
    Packed,
}

/// Particles to seed from a shape.
#[derive(Debug, Clone)]
pub struct ParticleBatch<V: VolumeCore<2>> {
    pub shape: V,
    pub material: Material,
    pub velocity: Vector2<f32>,
    pub seeding: Seeding,
}

impl<V: VolumeCore<2>> ParticleBatch<V> {
    pub fn new(shape: V, material: Material, velocity: Vector2<f32>) -> Self {
        Self {
            shape,
            material,
            velocity,
            seeding: Seeding::Jittered,
        }
    }
    pub fn packed(self) -> Self {
        Self {
            seeding: Seeding::Packed,
            ..self
        }
    }
    pub fn lattice(self) -> Self {
        Self {
            seeding: Seeding::Lattice,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_particle_starts_undeformed() -> Result<()> {
        let p = Particle::new(
            Vector2::new(0.5, 0.35),
            Vector2::new(0.0, -0.1),
            0.02,
            1e-5,
            Material::sand(),
        )?;
        assert_eq!(p.deformation, Matrix2::identity());
        assert_eq!(p.affine, Matrix2::zeros());
        assert_eq!(p.jp, 1.0);
        assert!((p.kinetic_energy() - 0.5 * 0.02 * 0.01).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn invalid_particles_rejected() {
        let v = Vector2::zeros();
        let err = Particle::new(v, v, 0.0, 1.0, Material::snow()).unwrap_err();
        assert!(err.to_string().contains("mass"));
        let err = Particle::new(Vector2::new(f32::NAN, 0.0), v, 1.0, 1.0, Material::snow())
            .unwrap_err();
        assert!(err.to_string().contains("position"));
    }

    #[test]
    fn aggregates() -> Result<()> {
        let mut particles = Particles::new();
        particles.push(Particle::new(
            Vector2::new(0.0, 0.0),
            Vector2::new(1.0, 0.0),
            1.0,
            1.0,
            Material::snow(),
        )?);
        particles.push(Particle::new(
            Vector2::new(1.0, 0.0),
            Vector2::new(0.0, -2.0),
            3.0,
            1.0,
            Material::snow(),
        )?);
        assert_eq!(particles.total_mass(), 4.0);
        assert_eq!(particles.momentum(), Vector2::new(1.0, -6.0));
        assert_eq!(particles.center_of_mass(), Some(Vector2::new(0.75, 0.0)));
        assert_eq!(particles.max_speed(), 2.0);
        Ok(())
    }
}
