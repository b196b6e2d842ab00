use super::*;

/// Collocated background grid. Node `(i, j)` sits at `(i dx, j dx)`; a grid of
/// `width x height` cells has `(width + 1) x (height + 1)` nodes.
///
/// During the scatter `velocity` holds momentum; [`Grid::normalize_velocity`]
/// turns it into velocity.
#[derive(Debug, Clone)]
pub struct Grid {
    pub velocity: Array<Vector2<f32>, 2>,
    pub velocity_backup: Array<Vector2<f32>, 2>,
    pub mass: Array<f32, 2>,
    /// Dense id of every node with mass, -1 elsewhere.
    pub id: Array<i32, 2>,
    active: Vec<Vector2<u32>>,
    width: u32,
    height: u32,
    dx: f32,
}

impl Grid {
    /// Nodes this close to the domain edge only allow inward motion.
    pub const WALL_NODES: u32 = 2;

    pub fn new(width: u32, height: u32, dx: f32) -> Self {
        let shape = Vector2::new(width + 1, height + 1);
        Self {
            velocity: Array::repeat(shape, Vector2::zeros()),
            velocity_backup: Array::repeat(shape, Vector2::zeros()),
            mass: Array::repeat(shape, 0.0),
            id: Array::repeat(shape, -1),
            active: Vec::new(),
            width,
            height,
            dx,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }
    pub fn height(&self) -> u32 {
        self.height
    }
    pub fn dx(&self) -> f32 {
        self.dx
    }
    pub fn node_shape(&self) -> Vector2<u32> {
        self.mass.shape()
    }
    pub fn node_position(&self, node: Vector2<u32>) -> Vector2<f32> {
        node.cast::<f32>() * self.dx
    }

    pub fn reset(&mut self) {
        self.velocity.fill(Vector2::zeros());
        self.mass.fill(0.0);
    }

    pub fn backup_velocity(&mut self) {
        self.velocity_backup
            .as_mut_slice()
            .copy_from_slice(self.velocity.as_slice());
    }

    pub fn normalize_velocity(&mut self) {
        for (v, &m) in self
            .velocity
            .as_mut_slice()
            .iter_mut()
            .zip(self.mass.as_slice())
        {
            // Strictly positive: tiny masses still carry their momentum.
            *v = if m > 0.0 { *v / m } else { Vector2::zeros() };
        }
    }

    pub fn apply_external_force(&mut self, acc: Vector2<f32>, dt: f32) {
        for (v, &m) in self
            .velocity
            .as_mut_slice()
            .iter_mut()
            .zip(self.mass.as_slice())
        {
            if m > 0.0 {
                *v += acc * dt;
            }
        }
    }

    /// Enforces the level set and the domain walls on every active node.
    /// Call after [`Grid::reorder`].
    pub fn apply_boundary_conditions(&mut self, levelset: &LevelSet) {
        let band = self.dx;
        let mu = levelset.friction();
        let last = self.node_shape() - Vector2::repeat(1);
        for &node in &self.active {
            let mut v = self.velocity[node];
            let phi = levelset.node(node);
            if phi <= 0.0 {
                v = Vector2::zeros();
            } else if phi <= band {
                let n = levelset.normal(node.cast::<f32>() * self.dx);
                v = collide(v, n, mu);
            }
            for axis in 0..2 {
                if node[axis] <= Self::WALL_NODES && v[axis] < 0.0 {
                    v[axis] = 0.0;
                }
                if node[axis] + Self::WALL_NODES >= last[axis] && v[axis] > 0.0 {
                    v[axis] = 0.0;
                }
            }
            self.velocity[node] = v;
        }
    }

    /// Numbers the nodes that received mass, in storage order.
    pub fn reorder(&mut self) {
        self.active.clear();
        for (linear, (&m, id)) in self
            .mass
            .as_slice()
            .iter()
            .zip(self.id.as_mut_slice())
            .enumerate()
        {
            if m > 0.0 {
                *id = self.active.len() as i32;
                self.active.push(from_linear(linear, self.mass.shape()));
            } else {
                *id = -1;
            }
        }
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
    pub fn active_nodes(&self) -> &[Vector2<u32>] {
        &self.active
    }

    pub fn check_velocity(&self) -> Result<()> {
        for (linear, v) in self.velocity.as_slice().iter().enumerate() {
            if !v.iter().all(|x| x.is_finite()) {
                let node = self.velocity.position_of(linear);
                return Err(Error::NonFiniteVelocity {
                    i: node.x,
                    j: node.y,
                });
            }
        }
        Ok(())
    }

    pub fn total_mass(&self) -> f32 {
        self.mass.as_slice().iter().sum()
    }

    /// Sum of `m v`. Only meaningful once velocities are normalized.
    pub fn total_momentum(&self) -> Vector2<f32> {
        self.velocity
            .as_slice()
            .iter()
            .zip(self.mass.as_slice())
            .map(|(v, &m)| v * m)
            .sum()
    }
}

/// Removes the part of `v` that moves into a surface with outward normal `n`,
/// with Coulomb friction `mu` on the tangential part. Negative `mu` sticks.
pub fn collide(v: Vector2<f32>, n: Vector2<f32>, mu: f32) -> Vector2<f32> {
    let vn = v.dot(&n);
    if vn >= 0.0 || n == Vector2::zeros() {
        return v;
    }
    if mu < 0.0 {
        return Vector2::zeros();
    }
    let vt = v - n * vn;
    let vt_norm = vt.norm();
    if vt_norm <= -mu * vn {
        return Vector2::zeros();
    }
    vt * (1.0 + mu * vn / vt_norm)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(i: u32, j: u32) -> Vector2<u32> {
        Vector2::new(i, j)
    }

    #[test]
    fn normalize_skips_massless_nodes() {
        let mut grid = Grid::new(8, 8, 0.125);
        grid.velocity[node(3, 3)] = Vector2::new(2.0, 4.0);
        grid.mass[node(3, 3)] = 2.0;
        grid.velocity[node(5, 5)] = Vector2::new(1.0, 1.0);
        grid.normalize_velocity();
        assert_eq!(grid.velocity[node(3, 3)], Vector2::new(1.0, 2.0));
        assert_eq!(grid.velocity[node(5, 5)], Vector2::zeros());
    }

    #[test]
    fn external_force_only_where_mass() {
        let mut grid = Grid::new(8, 8, 0.125);
        grid.mass[node(4, 4)] = 1.0;
        grid.apply_external_force(Vector2::new(0.0, -10.0), 0.1);
        assert_eq!(grid.velocity[node(4, 4)], Vector2::new(0.0, -1.0));
        assert_eq!(grid.velocity[node(4, 5)], Vector2::zeros());
    }

    #[test]
    fn reorder_numbers_massive_nodes() {
        let mut grid = Grid::new(8, 8, 0.125);
        grid.mass[node(2, 1)] = 1.0;
        grid.mass[node(1, 2)] = 1.0;
        grid.mass[node(7, 0)] = 1e-30;
        grid.reorder();
        assert_eq!(grid.active_count(), 3);
        assert_eq!(grid.active_nodes(), &[node(7, 0), node(2, 1), node(1, 2)][..]);
        assert_eq!(grid.id[node(1, 2)], 2);
        assert_eq!(grid.id[node(0, 0)], -1);

        grid.reset();
        grid.reorder();
        assert_eq!(grid.active_count(), 0);
    }

    #[test]
    fn backup_keeps_old_velocity() {
        let mut grid = Grid::new(4, 4, 0.25);
        grid.velocity[node(1, 1)] = Vector2::new(1.0, 0.0);
        grid.backup_velocity();
        grid.velocity[node(1, 1)] = Vector2::new(5.0, 0.0);
        assert_eq!(grid.velocity_backup[node(1, 1)], Vector2::new(1.0, 0.0));
    }

    #[test]
    fn check_velocity_reports_node() {
        let mut grid = Grid::new(4, 4, 0.25);
        assert!(grid.check_velocity().is_ok());
        grid.velocity[node(3, 2)] = Vector2::new(f32::NAN, 0.0);
        assert!(matches!(
            grid.check_velocity(),
            Err(Error::NonFiniteVelocity { i: 3, j: 2 })
        ));
    }

    #[test]
    fn collide_keeps_slip_and_removes_penetration() {
        let n = Vector2::new(0.0, 1.0);
        assert_eq!(collide(Vector2::new(1.0, -2.0), n, 0.0), Vector2::new(1.0, 0.0));
        assert_eq!(collide(Vector2::new(1.0, 2.0), n, 0.0), Vector2::new(1.0, 2.0));
        assert_eq!(collide(Vector2::new(1.0, -2.0), n, 1.0), Vector2::zeros());
        let v = collide(Vector2::new(3.0, -2.0), n, 0.5);
        assert!((v - Vector2::new(2.0, 0.0)).norm() < 1e-6);
        assert_eq!(collide(Vector2::new(3.0, -2.0), n, -1.0), Vector2::zeros());
    }

    #[test]
    fn walls_stop_outward_motion() {
        let mut grid = Grid::new(8, 8, 0.125);
        let levelset = LevelSet::new(8, 8, 0.125);
        grid.mass[node(1, 4)] = 1.0;
        grid.velocity[node(1, 4)] = Vector2::new(-1.0, 1.0);
        grid.mass[node(4, 8)] = 1.0;
        grid.velocity[node(4, 8)] = Vector2::new(0.5, 1.0);
        grid.reorder();
        grid.apply_boundary_conditions(&levelset);
        assert_eq!(grid.velocity[node(1, 4)], Vector2::new(0.0, 1.0));
        assert_eq!(grid.velocity[node(4, 8)], Vector2::new(0.5, 0.0));
    }
}
