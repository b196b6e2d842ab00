use super::*;

#[derive(Debug, Clone, PartialEq)]
pub struct Cuboid<const N: usize> {
    min: Vector<f32, N>,
    max: Vector<f32, N>,
}
impl<const N: usize> Cuboid<N> {
    pub fn new(min: Vector<f32, N>, max: Vector<f32, N>) -> Self {
        Cuboid {
            min: min.inf(&max),
            max: min.sup(&max),
        }
    }
    fn nearest_face(&self, point: Vector<f32, N>) -> (usize, bool, f32) {
        let mut best = (0, false, f32::INFINITY);
        for i in 0..N {
            let to_min = point[i] - self.min[i];
            if to_min < best.2 {
                best = (i, false, to_min);
            }
            let to_max = self.max[i] - point[i];
            if to_max < best.2 {
                best = (i, true, to_max);
            }
        }
        best
    }
}
impl<const N: usize> VolumeCore<N> for Cuboid<N> {
    fn distance(&self, point: Vector<f32, N>) -> f32 {
        let nearest = point.zip_zip_map(&self.min, &self.max, |x, a, b| x.clamp(a, b));
        if nearest != point {
            return (point - nearest).norm();
        }
        -self.nearest_face(point).2
    }
    fn gradient(&self, point: Vector<f32, N>) -> Vector<f32, N> {
        let nearest = point.zip_zip_map(&self.min, &self.max, |x, a, b| x.clamp(a, b));
        if nearest != point {
            return (point - nearest).normalize();
        }
        let (axis, max_side, _) = self.nearest_face(point);
        let mut g = Vector::zeros();
        g[axis] = if max_side { 1.0 } else { -1.0 };
        g
    }
    fn contains(&self, point: Vector<f32, N>) -> bool {
        point.zip_fold(&self.min, true, |acc, a, b| acc && (a >= b))
            && point.zip_fold(&self.max, true, |acc, a, b| acc && (a <= b))
    }
    fn min_bound(&self) -> Vector<f32, N> {
        self.min
    }
    fn max_bound(&self) -> Vector<f32, N> {
        self.max
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ball<const N: usize> {
    center: Vector<f32, N>,
    radius: f32,
}
impl<const N: usize> Ball<N> {
    pub fn new(center: Vector<f32, N>, radius: f32) -> Self {
        Ball { center, radius }
    }
    pub fn center(&self) -> Vector<f32, N> {
        self.center
    }
    pub fn radius(&self) -> f32 {
        self.radius
    }
}
impl<const N: usize> VolumeCore<N> for Ball<N> {
    fn distance(&self, point: Vector<f32, N>) -> f32 {
        (point - self.center).norm() - self.radius
    }
    fn gradient(&self, point: Vector<f32, N>) -> Vector<f32, N> {
        (point - self.center)
            .try_normalize(1e-12)
            .unwrap_or_else(Vector::zeros)
    }
    fn contains(&self, point: Vector<f32, N>) -> bool {
        (point - self.center).norm_squared() <= self.radius * self.radius
    }
    fn min_bound(&self) -> Vector<f32, N> {
        self.center - Vector::repeat(self.radius)
    }
    fn max_bound(&self) -> Vector<f32, N> {
        self.center + Vector::repeat(self.radius)
    }
}

/// A 2D region bounded by one or more closed loops, filled with the even-odd
/// rule so inner loops cut holes.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    loops: Vec<Vec<Vector2<f32>>>,
    min: Vector2<f32>,
    max: Vector2<f32>,
}
impl Default for Polygon {
    fn default() -> Self {
        Self::new()
    }
}
impl Polygon {
    pub fn new() -> Self {
        Polygon {
            loops: Vec::new(),
            min: Vector2::repeat(f32::INFINITY),
            max: Vector2::repeat(f32::NEG_INFINITY),
        }
    }
    pub fn add_loop(self, points: &[Vector2<f32>]) -> Self {
        let min = points.iter().fold(self.min, |x, y| y.inf(&x));
        let max = points.iter().fold(self.max, |x, y| y.sup(&x));
        let mut loops = self.loops;
        loops.push(points.to_vec());
        Polygon { loops, min, max }
    }
    pub fn add_rect(self, half_size: Vector2<f32>, center: Vector2<f32>) -> Self {
        self.add_loop(&[
            center - half_size,
            center + Vector2::new(half_size.x, -half_size.y),
            center + half_size,
            center + Vector2::new(-half_size.x, half_size.y),
        ])
    }
    pub fn loops(&self) -> &[Vec<Vector2<f32>>] {
        &self.loops
    }
}
impl VolumeCore<2> for Polygon {
    fn distance(&self, point: Vector2<f32>) -> f32 {
        polygon_signed_distance(&self.loops, point)
    }
    fn gradient(&self, point: Vector2<f32>) -> Vector2<f32> {
        let extent = (self.max - self.min).amax();
        let h = if extent.is_finite() && extent > 0.0 {
            extent * 1e-4
        } else {
            1e-4
        };
        let dx = Vector2::new(h, 0.0);
        let dy = Vector2::new(0.0, h);
        Vector2::new(
            self.distance(point + dx) - self.distance(point - dx),
            self.distance(point + dy) - self.distance(point - dy),
        )
        .try_normalize(1e-12)
        .unwrap_or_else(Vector2::zeros)
    }
    fn contains(&self, point: Vector2<f32>) -> bool {
        if point.zip_fold(&self.min, false, |acc, a, b| acc | (a < b))
            || point.zip_fold(&self.max, false, |acc, a, b| acc | (a > b))
        {
            return false;
        }
        polygon_contains(&self.loops, point)
    }
    fn min_bound(&self) -> Vector2<f32> {
        self.min
    }
    fn max_bound(&self) -> Vector2<f32> {
        self.max
    }
}
