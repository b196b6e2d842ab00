use super::*;

/// A signed-distance volume. Distances are negative inside.
pub trait VolumeCore<const N: usize>: Sized + Sync {
    fn distance(&self, point: Vector<f32, N>) -> f32;
    // Normalized gradient of the distance. May be 0 where there is no single
    // direction to move in.
    fn gradient(&self, point: Vector<f32, N>) -> Vector<f32, N>;

    fn contains(&self, point: Vector<f32, N>) -> bool {
        self.distance(point) <= 0.0
    }
    fn min_bound(&self) -> Vector<f32, N>;
    fn max_bound(&self) -> Vector<f32, N>;

    fn create_grid(self, cell_size: f32) -> VolumeGrid<Self, N> {
        let offset = self.min_bound().map(|x| (x / cell_size).floor() as i32);
        let size = (self.max_bound().map(|x| (x / cell_size).ceil() as i32) - offset)
            .map(|x| x.max(0) as u32);
        let half_diagonal = cell_size * (N as f32).sqrt() / 2.0;
        let mut inside_cells = vec![];
        let mut border_cells = vec![];
        let cells = Array::from_fn(size, |pos| {
            let pos = pos.cast::<i32>() + offset;
            let center = (pos.cast::<f32>() + Vector::repeat(0.5)) * cell_size;
            let dist = self.distance(center) / half_diagonal;
            let ty = match dist {
                ..-1.0 => Cell::Inside,
                -1.0..=1.0 => Cell::Border,
                _ => Cell::Outside,
            };
            match ty {
                Cell::Inside => inside_cells.push(pos),
                Cell::Border => border_cells.push(pos),
                Cell::Outside => {}
            }
            ty
        });
        VolumeGrid {
            volume: self,
            cell_size,
            offset,
            cells,
            inside_cells,
            border_cells,
        }
    }
}

/// Dense N-dimensional storage, first axis fastest.
#[derive(Debug, Clone, PartialEq)]
pub struct Array<T, const N: usize> {
    shape: Vector<u32, N>,
    data: Box<[T]>,
}

impl<T, const N: usize> Array<T, N> {
    pub fn from_fn(shape: Vector<u32, N>, mut f: impl FnMut(Vector<u32, N>) -> T) -> Self {
        let size = shape.cast::<usize>().product();
        let data = (0..size)
            .map(|index| f(from_linear(index, shape)))
            .collect();
        Self { shape, data }
    }
    pub fn repeat(shape: Vector<u32, N>, t: T) -> Self
    where
        T: Clone,
    {
        Self::from_fn(shape, |_| t.clone())
    }
    pub fn shape(&self) -> Vector<u32, N> {
        self.shape
    }
    pub fn len(&self) -> usize {
        self.data.len()
    }
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
    pub fn contains(&self, index: Vector<u32, N>) -> bool {
        index.zip_fold(&self.shape, true, |lt, i, s| lt && i < s)
    }
    /// Bounds-checked lookup for signed indices.
    pub fn get(&self, index: Vector<i32, N>) -> Option<&T> {
        if index.iter().any(|&i| i < 0) {
            return None;
        }
        let index = index.map(|i| i as u32);
        self.contains(index)
            .then(|| &self.data[to_linear(index, self.shape)])
    }
    pub fn linear_index(&self, index: Vector<u32, N>) -> usize {
        to_linear(index, self.shape)
    }
    pub fn position_of(&self, linear: usize) -> Vector<u32, N> {
        from_linear(linear, self.shape)
    }
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }
    pub fn fill(&mut self, t: T)
    where
        T: Clone,
    {
        self.data.fill(t);
    }
}
impl<T, const N: usize> Index<Vector<u32, N>> for Array<T, N> {
    type Output = T;
    fn index(&self, index: Vector<u32, N>) -> &T {
        assert!(self.contains(index));
        &self.data[to_linear(index, self.shape)]
    }
}
impl<T, const N: usize> IndexMut<Vector<u32, N>> for Array<T, N> {
    fn index_mut(&mut self, index: Vector<u32, N>) -> &mut T {
        assert!(self.contains(index));
        &mut self.data[to_linear(index, self.shape)]
    }
}

/// Fills the cells of a volume with points.
#[derive(Debug, Clone)]
pub struct Sampler<V: VolumeCore<N>, const N: usize, R: Rng> {
    pub volume: VolumeGrid<V, N>,
    pub rng: R,
}
impl<V: VolumeCore<N>, const N: usize> Sampler<V, N, Pcg64Mcg> {
    pub fn new(volume: V, cell_size: f32) -> Self {
        Self {
            volume: volume.create_grid(cell_size),
            rng: Pcg64Mcg::from_entropy(),
        }
    }
}
impl<V: VolumeCore<N>, const N: usize, R: Rng> Sampler<V, N, R> {
    pub fn with_rng(volume: V, cell_size: f32, rng: R) -> Self {
        Self {
            volume: volume.create_grid(cell_size),
            rng,
        }
    }
    pub fn contains(&self, point: Vector<f32, N>) -> bool {
        match self.volume.cell_at(point) {
            Some(Cell::Inside) => true,
            Some(Cell::Border) => self.volume.contains(point),
            Some(Cell::Outside) | None => false,
        }
    }
    fn jitter(&mut self, cell: Vector<i32, N>) -> Vector<f32, N> {
        let size = self.volume.cell_size;
        Vector::from_fn(|_, _| self.rng.gen_range(0.0..size)) + cell.cast::<f32>() * size
    }
    /// Drops `samples_per_cell` jittered points into every covered cell. The
    /// fractional part of the density is realized as a coin flip per cell.
    pub fn fill_cells(&mut self, samples_per_cell: f32, mut f: impl FnMut(Vector<f32, N>)) {
        let whole = samples_per_cell.floor() as u32;
        let fract = samples_per_cell.fract() as f64;
        for i in 0..self.volume.inside_cells.len() {
            let cell = self.volume.inside_cells[i];
            let count = whole + self.rng.gen_bool(fract) as u32;
            for _ in 0..count {
                f(self.jitter(cell));
            }
        }
        for i in 0..self.volume.border_cells.len() {
            let cell = self.volume.border_cells[i];
            let count = whole + self.rng.gen_bool(fract) as u32;
            for _ in 0..count {
                let point = self.jitter(cell);
                if self.volume.contains(point) {
                    f(point);
                }
            }
        }
    }
    pub fn fill_lattice(
        &self,
        spacing: Vector<f32, N>,
        offset: Vector<f32, N>,
        mut f: impl FnMut(Vector<f32, N>),
    ) {
        let size = Vector::repeat(self.volume.cell_size);
        for cell in &self.volume.inside_cells {
            foreach_lattice_point_in_rect(
                offset,
                spacing,
                cell.cast::<f32>() * self.volume.cell_size,
                size,
                &mut f,
            );
        }
        for cell in &self.volume.border_cells {
            foreach_lattice_point_in_rect(
                offset,
                spacing,
                cell.cast::<f32>() * self.volume.cell_size,
                size,
                |point| {
                    if self.volume.contains(point) {
                        f(point);
                    }
                },
            );
        }
    }
}

/// A volume together with a classification of the cells that cover it.
#[derive(Debug, Clone)]
pub struct VolumeGrid<V: VolumeCore<N>, const N: usize> {
    pub volume: V,
    pub cell_size: f32,
    pub offset: Vector<i32, N>,
    pub cells: Array<Cell, N>,
    pub inside_cells: Vec<Vector<i32, N>>,
    pub border_cells: Vec<Vector<i32, N>>,
}
impl<V: VolumeCore<N>, const N: usize> Deref for VolumeGrid<V, N> {
    type Target = V;
    fn deref(&self) -> &Self::Target {
        &self.volume
    }
}
impl<V: VolumeCore<N>, const N: usize> VolumeGrid<V, N> {
    pub fn containing_cell(&self, point: Vector<f32, N>) -> Vector<i32, N> {
        (point / self.cell_size).map(|x| x.floor() as i32)
    }
    pub fn cell_at(&self, point: Vector<f32, N>) -> Option<Cell> {
        self.cells
            .get(self.containing_cell(point) - self.offset)
            .copied()
    }
    pub fn covered_cells(&self) -> usize {
        self.inside_cells.len() + self.border_cells.len()
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cell {
    Inside,
    Outside,
    Border,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Ball;

    #[test]
    fn ball_cells_are_classified() {
        let grid = Ball::new(Vector2::new(0.5, 0.5), 0.25).create_grid(0.05);
        assert_eq!(grid.cell_at(Vector2::new(0.5, 0.5)), Some(Cell::Inside));
        assert_eq!(grid.cell_at(Vector2::new(0.26, 0.26)), Some(Cell::Outside));
        assert_eq!(grid.cell_at(Vector2::new(2.0, 2.0)), None);
        assert!(!grid.border_cells.is_empty());
    }

    #[test]
    fn fill_cells_respects_density() {
        let ball = Ball::new(Vector2::new(0.5, 0.5), 0.25);
        let mut sampler = Sampler::with_rng(ball.clone(), 0.01, Pcg64Mcg::seed_from_u64(7));
        let mut count = 0;
        sampler.fill_cells(4.0, |p| {
            assert!(ball.contains(p));
            count += 1;
        });
        let expected = std::f32::consts::PI * 0.25 * 0.25 / (0.01 * 0.01) * 4.0;
        assert!((count as f32 - expected).abs() / expected < 0.05, "{count} vs {expected}");
    }

    #[test]
    fn array_get_rejects_out_of_range() {
        let array = Array::from_fn(Vector::<u32, 2>::new(3, 2), |p| p.x + 10 * p.y);
        assert_eq!(array.get(Vector::<i32, 2>::new(2, 1)), Some(&12));
        assert_eq!(array.get(Vector::<i32, 2>::new(-1, 0)), None);
        assert_eq!(array.get(Vector::<i32, 2>::new(0, 2)), None);
        assert_eq!(array.len(), 6);
    }
}
