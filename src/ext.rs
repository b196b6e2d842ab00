use super::*;

pub trait Volume<const N: usize>: VolumeCore<N> {
    fn pad(self, offset: f32) -> PaddedVolume<Self, N> {
        PaddedVolume {
            offset,
            field: self,
        }
    }

    /// Regular lattice points inside the volume.
    fn grid_points(self, settings: impl Into<GridSettings<N>>) -> Vec<Vector<f32, N>> {
        let settings = settings.into();
        let offset = settings
            .offset
            .unwrap_or_else(|| self.min_bound().map(|x| x + 0.0001));
        let cell_size = settings.spacing.max();
        let sampler = Sampler::new(self, cell_size);
        let mut points = vec![];
        sampler.fill_lattice(settings.spacing, offset, |p| points.push(p));
        points
    }

    /// Jittered points at a fixed density per cell, the usual MPM seeding.
    fn seed_points(self, settings: SeedSettings, rng: impl RngCore) -> Vec<Vector<f32, N>> {
        let mut sampler = Sampler::with_rng(self, settings.cell_size, rng);
        let mut points = Vec::with_capacity(
            (sampler.volume.covered_cells() as f32 * settings.per_cell).ceil() as usize,
        );
        sampler.fill_cells(settings.per_cell, |p| points.push(p));
        points
    }

    /// Seeded points relaxed until they stop overlapping.
    fn packed_points(self, settings: impl Into<PackedSettings>, rng: impl RngCore) -> PackedPoints<N> {
        let settings = settings.into();
        if settings.pad_border {
            let domain = self.pad(settings.radius);
            packed_points_impl(domain, settings, rng)
        } else {
            packed_points_impl(self, settings, rng)
        }
    }
}
impl<const N: usize, X> Volume<N> for X where X: VolumeCore<N> {}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeedSettings {
    pub cell_size: f32,
    pub per_cell: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct GridSettings<const N: usize> {
    pub spacing: Vector<f32, N>,
    // If None, starts at the min bound of the shape.
    pub offset: Option<Vector<f32, N>>,
}
impl<const N: usize> From<f32> for GridSettings<N> {
    fn from(spacing: f32) -> Self {
        Self {
            spacing: Vector::repeat(spacing),
            offset: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PackedSettings {
    pub radius: f32,
    pub pad_border: bool,
    pub max_iters: usize,
    pub cutoff: f32,
    pub density: f32,
}
impl Default for PackedSettings {
    fn default() -> Self {
        Self {
            radius: 1.0,
            pad_border: true,
            max_iters: 500,
            cutoff: 0.1,
            density: 0.0,
        }
    }
}
impl From<f32> for PackedSettings {
    fn from(radius: f32) -> Self {
        Self {
            radius,
            ..Default::default()
        }
    }
}

/// Shrinks (positive offset) or grows a volume.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PaddedVolume<V: VolumeCore<N>, const N: usize> {
    offset: f32,
    field: V,
}
impl<V: VolumeCore<N>, const N: usize> VolumeCore<N> for PaddedVolume<V, N> {
    fn distance(&self, point: Vector<f32, N>) -> f32 {
        self.field.distance(point) + self.offset
    }
    fn gradient(&self, point: Vector<f32, N>) -> Vector<f32, N> {
        self.field.gradient(point)
    }
    fn min_bound(&self) -> Vector<f32, N> {
        self.field.min_bound() + Vector::repeat(self.offset)
    }
    fn max_bound(&self) -> Vector<f32, N> {
        self.field.max_bound() - Vector::repeat(self.offset)
    }
}

pub struct PackedPoints<const N: usize> {
    pub points: Vec<Vector<f32, N>>,
    pub iters: usize,
    pub max_penetration: f32,
}
impl<const N: usize> Deref for PackedPoints<N> {
    type Target = Vec<Vector<f32, N>>;
    fn deref(&self) -> &Self::Target {
        &self.points
    }
}

pub fn default_packed_density<const N: usize>() -> f32 {
    match N {
        2 => 1.0, // Max 1.2
        3 => 1.5,
        _ => 1.0,
    }
}

fn packed_points_impl<const N: usize>(
    domain: impl VolumeCore<N>,
    settings: PackedSettings,
    rng: impl RngCore,
) -> PackedPoints<N> {
    let mut sampler = Sampler::with_rng(domain, settings.radius * 2.0, rng);
    let mut points = vec![];
    let density = if settings.density <= 0.0 {
        default_packed_density::<N>()
    } else {
        settings.density
    };
    sampler.fill_cells(density, |p| points.push(p));
    let mut packer = Packer::new(sampler.volume, points, settings.radius);
    let iters = packer.solve(settings.max_iters, settings.cutoff);
    PackedPoints {
        points: packer.points,
        iters,
        max_penetration: packer.max_penetration,
    }
}
