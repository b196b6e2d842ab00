use super::*;

/// Signed distance to the solid boundary, sampled on the grid nodes.
/// Positive in free space, zero or negative inside solids.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelSet {
    phi: Array<f32, 2>,
    dx: f32,
    friction: f32,
}

impl LevelSet {
    /// Value of an empty level set: far away from any solid.
    pub const FAR: f32 = 1.0e6;

    pub fn new(width: u32, height: u32, dx: f32) -> Self {
        Self {
            phi: Array::repeat(Vector2::new(width + 1, height + 1), Self::FAR),
            dx,
            friction: 0.0,
        }
    }

    pub fn node_shape(&self) -> Vector2<u32> {
        self.phi.shape()
    }
    pub fn dx(&self) -> f32 {
        self.dx
    }
    pub fn is_empty(&self) -> bool {
        self.phi.as_slice().iter().all(|&phi| phi >= Self::FAR)
    }

    pub fn friction(&self) -> f32 {
        self.friction
    }
    /// Coulomb friction against the boundary; negative makes it sticky.
    pub fn set_friction(&mut self, mu: f32) {
        self.friction = mu;
    }

    /// Adds a closed polygon. Its interior is solid, or its exterior when
    /// `inside_out` is set (a container).
    pub fn add_polygon(&mut self, points: &[Vector2<f32>], inside_out: bool) -> Result<()> {
        if points.len() < 3 {
            return Err(Error::InvalidParam(format!(
                "a boundary polygon needs at least 3 points, got {}",
                points.len()
            )));
        }
        if !points.iter().all(|p| p.iter().all(|x| x.is_finite())) {
            return Err(Error::InvalidParam("polygon points must be finite".into()));
        }
        self.add_volume(&shape::Polygon::new().add_loop(points), inside_out);
        Ok(())
    }

    /// Unions a solid shape into the boundary.
    pub fn add_volume(&mut self, volume: &impl VolumeCore<2>, inside_out: bool) {
        let sign = if inside_out { -1.0 } else { 1.0 };
        let shape = self.phi.shape();
        let dx = self.dx;
        for (linear, phi) in self.phi.as_mut_slice().iter_mut().enumerate() {
            let position = from_linear(linear, shape).cast::<f32>() * dx;
            *phi = phi.min(sign * volume.distance(position));
        }
        debug!(
            "level set now spans [{}, {}]",
            self.phi.as_slice().iter().copied().fold(f32::INFINITY, f32::min),
            self.phi.as_slice().iter().copied().fold(f32::NEG_INFINITY, f32::max)
        );
    }

    pub fn node(&self, node: Vector2<u32>) -> f32 {
        self.phi[node]
    }

    /// Bilinear interpolation; positions outside the grid are clamped onto it.
    pub fn sample(&self, position: Vector2<f32>) -> f32 {
        let last = self.phi.shape() - Vector2::repeat(1);
        let g = (position / self.dx).zip_map(&last, |x, l| x.clamp(0.0, l as f32));
        let base = g.zip_map(&last, |x, l| (x.floor() as u32).min(l.saturating_sub(1)));
        let t = g - base.cast::<f32>();
        let at = |di: u32, dj: u32| self.phi[base + Vector2::new(di, dj)];
        let bottom = at(0, 0) * (1.0 - t.x) + at(1, 0) * t.x;
        let top = at(0, 1) * (1.0 - t.x) + at(1, 1) * t.x;
        bottom * (1.0 - t.y) + top * t.y
    }

    pub fn gradient(&self, position: Vector2<f32>) -> Vector2<f32> {
        let h = self.dx * 0.5;
        let ex = Vector2::new(h, 0.0);
        let ey = Vector2::new(0.0, h);
        Vector2::new(
            self.sample(position + ex) - self.sample(position - ex),
            self.sample(position + ey) - self.sample(position - ey),
        ) / (2.0 * h)
    }

    /// Unit normal pointing into free space, or zero where it is undefined.
    pub fn normal(&self, position: Vector2<f32>) -> Vector2<f32> {
        self.gradient(position)
            .try_normalize(1e-6)
            .unwrap_or_else(Vector2::zeros)
    }

    /// Pushes a point that ended up inside a solid back to the surface and
    /// removes its velocity into the solid. Returns whether it moved.
    pub fn project(&self, position: &mut Vector2<f32>, velocity: &mut Vector2<f32>) -> bool {
        let phi = self.sample(*position);
        if phi >= 0.0 {
            return false;
        }
        let n = self.normal(*position);
        if n == Vector2::zeros() {
            return false;
        }
        *position -= n * phi;
        let vn = velocity.dot(&n);
        if vn < 0.0 {
            *velocity -= n * vn;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Ball;

    fn container(res: u32) -> Result<LevelSet> {
        let mut levelset = LevelSet::new(res, res, 1.0 / res as f32);
        levelset.add_polygon(
            &[
                Vector2::new(0.05, 0.05),
                Vector2::new(0.95, 0.05),
                Vector2::new(0.95, 0.95),
                Vector2::new(0.05, 0.95),
            ],
            true,
        )?;
        Ok(levelset)
    }

    #[test]
    fn container_is_free_inside() -> Result<()> {
        let levelset = container(32)?;
        assert!((levelset.sample(Vector2::new(0.5, 0.5)) - 0.45).abs() < 1e-5);
        assert!((levelset.sample(Vector2::new(0.5, 0.1)) - 0.05).abs() < 1e-5);
        assert!(levelset.sample(Vector2::new(0.02, 0.5)) < 0.0);
        let n = levelset.normal(Vector2::new(0.5, 0.1));
        assert!((n - Vector2::new(0.0, 1.0)).norm() < 1e-4);
        Ok(())
    }

    #[test]
    fn solid_polygon_is_negative_inside() -> Result<()> {
        let mut levelset = LevelSet::new(32, 32, 1.0 / 32.0);
        levelset.add_polygon(
            &[
                Vector2::new(0.25, 0.25),
                Vector2::new(0.75, 0.25),
                Vector2::new(0.5, 0.75),
            ],
            false,
        )?;
        assert!(levelset.sample(Vector2::new(0.5, 0.4)) < 0.0);
        assert!(levelset.sample(Vector2::new(0.5, 0.1)) > 0.0);
        Ok(())
    }

    #[test]
    fn shapes_union_by_min() -> Result<()> {
        let mut levelset = container(32)?;
        levelset.add_volume(&Ball::new(Vector2::new(0.5, 0.5), 0.1), false);
        assert!(levelset.sample(Vector2::new(0.5, 0.5)) < 0.0);
        assert!(levelset.sample(Vector2::new(0.02, 0.5)) < 0.0);
        assert!(levelset.sample(Vector2::new(0.25, 0.25)) > 0.0);
        Ok(())
    }

    #[test]
    fn empty_levelset_is_far() {
        let levelset = LevelSet::new(16, 8, 1.0 / 16.0);
        assert!(levelset.is_empty());
        assert_eq!(levelset.node_shape(), Vector2::new(17, 9));
        assert_eq!(levelset.sample(Vector2::new(0.3, 0.2)), LevelSet::FAR);
        assert_eq!(levelset.normal(Vector2::new(0.3, 0.2)), Vector2::zeros());
    }

    #[test]
    fn degenerate_polygon_rejected() {
        let mut levelset = LevelSet::new(16, 16, 1.0 / 16.0);
        let err = levelset
            .add_polygon(&[Vector2::new(0.0, 0.0), Vector2::new(1.0, 0.0)], true)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParam(_)));
    }

    #[test]
    fn projection_pushes_out_of_walls() -> Result<()> {
        let levelset = container(32)?;
        let mut position = Vector2::new(0.5, 0.03);
        let mut velocity = Vector2::new(0.3, -1.0);
        assert!(levelset.project(&mut position, &mut velocity));
        assert!((position.y - 0.05).abs() < 1e-4, "{position}");
        assert!((velocity - Vector2::new(0.3, 0.0)).norm() < 1e-4);

        let mut inside = Vector2::new(0.5, 0.5);
        assert!(!levelset.project(&mut inside, &mut velocity));
        Ok(())
    }
}
