//! MLS-MPM scatter and APIC gather over the 3x3 quadratic B-spline stencil.

use super::*;

/// B-spline weights of the three stencil nodes along each axis for a
/// particle at `fx` cells past the first node, `fx` in `[0.5, 1.5)`.
#[inline]
pub fn quadratic_weights(fx: Vector2<f32>) -> [Vector2<f32>; 3] {
    [
        fx.map(|x| 0.5 * (1.5 - x) * (1.5 - x)),
        fx.map(|x| 0.75 - (x - 1.0) * (x - 1.0)),
        fx.map(|x| 0.5 * (x - 0.5) * (x - 0.5)),
    ]
}

/// First stencil node and the particle offset from it, in cells.
#[inline]
pub fn stencil(position: Vector2<f32>, dx: f32) -> (Vector2<i32>, Vector2<f32>) {
    let g = position / dx;
    let base = g.map(|x| (x - 0.5).floor() as i32);
    (base, g - base.cast::<f32>())
}

fn node_in(shape: Vector2<u32>, node: Vector2<i32>) -> Option<Vector2<u32>> {
    (node.x >= 0 && node.y >= 0 && (node.x as u32) < shape.x && (node.y as u32) < shape.y)
        .then(|| node.map(|x| x as u32))
}

/// Scatters particles onto a freshly reset grid. Afterwards `grid.velocity`
/// holds momentum.
pub fn particles_to_grid(grid: &mut Grid, particles: &Particles, dt: f32) {
    let dx = grid.dx();
    let inv_dx = 1.0 / dx;
    let shape = grid.node_shape();
    for p in particles {
        let (base, fx) = stencil(p.position, dx);
        let w = quadratic_weights(fx);
        let stress = p.stress() * (-dt * p.volume * 4.0 * inv_dx * inv_dx);
        let affine = stress + p.affine * p.mass;
        let momentum = p.velocity * p.mass;
        for i in 0..3 {
            for j in 0..3 {
                let offset = Vector2::new(i as i32, j as i32);
                let Some(node) = node_in(shape, base + offset) else {
                    continue;
                };
                let weight = w[i].x * w[j].y;
                let dpos = (offset.cast::<f32>() - fx) * dx;
                grid.velocity[node] += (momentum + affine * dpos) * weight;
                grid.mass[node] += p.mass * weight;
            }
        }
    }
}

fn gather(grid: &Grid, p: &mut Particle, dt: f32, flip_alpha: f32) {
    let dx = grid.dx();
    let inv_dx = 1.0 / dx;
    let shape = grid.node_shape();
    let (base, fx) = stencil(p.position, dx);
    let w = quadratic_weights(fx);
    let mut velocity = Vector2::zeros();
    let mut old_velocity = Vector2::zeros();
    let mut affine = Matrix2::zeros();
    for i in 0..3 {
        for j in 0..3 {
            let offset = Vector2::new(i as i32, j as i32);
            let Some(node) = node_in(shape, base + offset) else {
                continue;
            };
            let weight = w[i].x * w[j].y;
            let dpos = (offset.cast::<f32>() - fx) * dx;
            let v = grid.velocity[node];
            velocity += v * weight;
            old_velocity += grid.velocity_backup[node] * weight;
            affine += v * dpos.transpose() * (4.0 * inv_dx * inv_dx * weight);
        }
    }
    if flip_alpha > 0.0 {
        let flip = p.velocity + velocity - old_velocity;
        velocity = flip * flip_alpha + velocity * (1.0 - flip_alpha);
    }
    p.velocity = velocity;
    p.affine = affine;
    p.position += velocity * dt;
    p.deformation = (Matrix2::identity() + affine * dt) * p.deformation;
    let material = p.material;
    material.project_plasticity(&mut p.deformation, &mut p.jp, &mut p.hardening);
}

/// Gathers grid velocities back onto the particles and advects them.
pub fn grid_to_particles(grid: &Grid, particles: &mut Particles, dt: f32, flip_alpha: f32) {
    #[cfg(feature = "rayon")]
    {
        use rayon::prelude::*;
        particles
            .as_mut_slice()
            .par_iter_mut()
            .for_each(|p| gather(grid, p, dt, flip_alpha));
    }
    #[cfg(not(feature = "rayon"))]
    for p in particles.as_mut_slice() {
        gather(grid, p, dt, flip_alpha);
    }
}
