use super::*;

/// Relaxes seeded points until discs of `radius` no longer overlap, keeping
/// every point inside the volume.
#[derive(Debug, Clone)]
pub struct Packer<V: VolumeCore<N>, const N: usize> {
    pub volume: VolumeGrid<V, N>,
    pub buckets: HashMap<Vector<i32, N>, SmallVec<[u32; 4]>>,
    pub points: Vec<Vector<f32, N>>,
    pub radius: f32,
    pub max_penetration: f32,
    pub boundary_penetration: f32,
}

impl<V: VolumeCore<N>, const N: usize> Packer<V, N> {
    pub fn new(volume: VolumeGrid<V, N>, points: Vec<Vector<f32, N>>, radius: f32) -> Self {
        Self {
            volume,
            buckets: HashMap::new(),
            points,
            radius,
            max_penetration: f32::INFINITY,
            boundary_penetration: f32::INFINITY,
        }
    }
    fn rebucket(&mut self) {
        self.buckets.clear();
        for (i, point) in self.points.iter().enumerate() {
            let cell = self.volume.containing_cell(*point);
            self.buckets.entry(cell).or_default().push(i as u32);
        }
    }
    pub fn neighbors(&self, point_index: usize, mut f: impl FnMut(u32, Vector<f32, N>)) {
        let cell = self.volume.containing_cell(self.points[point_index]);
        for i in 0..3_usize.pow(N as u32) {
            let offset =
                from_linear(i, Vector::<_, N>::repeat(3)).cast::<i32>() - Vector::repeat(1);
            if let Some(bucket) = self.buckets.get(&(cell + offset)) {
                for &other in bucket {
                    if other != point_index as u32 {
                        f(other, self.points[other as usize]);
                    }
                }
            }
        }
    }
    pub fn step_collisions(&mut self, delta_factor: f32) {
        self.rebucket();
        let mut max_penetration: f32 = 0.0;
        let deltas = (0..self.points.len())
            .map(|i| {
                let p = self.points[i];
                let mut delta = Vector::zeros();
                self.neighbors(i, |_, q| {
                    let dist = (p - q).norm();
                    let penetration = self.radius * 2.0 - dist;
                    if penetration > 0.0 && dist > 0.0 {
                        delta += (p - q) / dist * penetration / 2.0;
                    }
                    max_penetration = max_penetration.max(penetration);
                });
                delta
            })
            .collect::<Vec<_>>();
        for (point, delta) in self.points.iter_mut().zip(deltas) {
            *point += delta * delta_factor;
        }
        self.max_penetration = max_penetration;
    }
    pub fn step_boundary(&mut self, delta_factor: f32) {
        self.boundary_penetration = 0.0;
        for point in &mut self.points {
            let dist = self.volume.distance(*point);
            if dist > 0.0 {
                *point -= self.volume.gradient(*point) * dist * delta_factor;
                self.boundary_penetration =
                    self.boundary_penetration.max(self.volume.distance(*point));
            }
        }
    }
    /// Alternates overlap and boundary passes; returns the iterations used.
    pub fn solve(&mut self, max_iters: usize, cutoff: f32) -> usize {
        let mut iters = 0;
        while (self.max_penetration > cutoff * self.radius
            || self.boundary_penetration > 0.0001 * self.radius)
            && iters < max_iters
        {
            self.step_collisions(2.0);
            self.step_boundary(1.0);
            iters += 1;
        }
        iters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Cuboid;

    #[test]
    fn overlapping_pair_is_separated() {
        let room = Cuboid::new(Vector2::new(0.0, 0.0), Vector2::new(1.0, 1.0)).create_grid(0.1);
        let points = vec![Vector2::new(0.5, 0.5), Vector2::new(0.52, 0.5)];
        let mut packer = Packer::new(room, points, 0.05);
        packer.solve(100, 0.01);
        let gap = (packer.points[0] - packer.points[1]).norm();
        assert!(gap >= 0.1 * 0.99, "gap {gap}");
        assert!(packer.max_penetration <= 0.01 * 0.05);
    }

    #[test]
    fn stray_points_are_pulled_inside() {
        let room = Cuboid::new(Vector2::new(0.0, 0.0), Vector2::new(1.0, 1.0)).create_grid(0.1);
        let mut packer = Packer::new(room, vec![Vector2::new(1.2, 0.5)], 0.01);
        packer.step_boundary(1.0);
        assert!(packer.points[0].x <= 1.0 + 1e-6);
    }
}
