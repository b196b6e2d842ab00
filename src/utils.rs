use super::*;

pub fn distance_to_segment<const N: usize>(
    a: Vector<f32, N>,
    b: Vector<f32, N>,
    x: Vector<f32, N>,
) -> f32 {
    (x - project_segment(a, b, x)).norm()
}

pub fn project_segment<const N: usize>(
    a: Vector<f32, N>,
    b: Vector<f32, N>,
    x: Vector<f32, N>,
) -> Vector<f32, N> {
    let c = b - a;
    let l2 = c.norm_squared();
    if l2 == 0.0 {
        return a;
    }
    let t = ((x - a).dot(&c) / l2).clamp(0.0, 1.0);
    a + t * c
}

/// Calls `f` for every lattice point `offset + k * spacing` that falls in the
/// half-open box `[rect_offset, rect_offset + rect_size)`.
pub fn foreach_lattice_point_in_rect<const N: usize>(
    offset: Vector<f32, N>,
    spacing: Vector<f32, N>,
    rect_offset: Vector<f32, N>,
    rect_size: Vector<f32, N>,
    mut f: impl FnMut(Vector<f32, N>),
) {
    let start = (offset - rect_offset).zip_map(&spacing, |x, s| x.rem_euclid(s));
    let shape = (rect_size - start)
        .component_div(&spacing)
        .map(|x| x.ceil().max(0.0) as u32);
    let total = shape.cast::<usize>().product();
    for i in 0..total {
        f(rect_offset + start + from_linear(i, shape).cast::<f32>().component_mul(&spacing));
    }
}

pub fn from_linear<const N: usize>(mut index: usize, shape: Vector<u32, N>) -> Vector<u32, N> {
    Vector::from_fn(|i, _| {
        let si = shape[i] as usize;
        let res = index % si;
        index /= si;
        res as u32
    })
}

// First axis varies fastest.
pub fn to_linear<const N: usize>(index: Vector<u32, N>, shape: Vector<u32, N>) -> usize {
    index
        .zip_fold(&shape, (1, 0), |(step, res), ix, s| {
            (step * s as usize, res + step * ix as usize)
        })
        .1
}

/// Signed distance to a set of closed loops, filled with the even-odd rule.
/// Negative inside.
pub fn polygon_signed_distance(loops: &[Vec<Vector2<f32>>], point: Vector2<f32>) -> f32 {
    let mut dist = f32::INFINITY;
    for points in loops {
        let Some(mut b) = points.last() else {
            continue;
        };
        for a in points {
            dist = dist.min(distance_to_segment(*a, *b, point));
            b = a;
        }
    }
    if polygon_contains(loops, point) {
        -dist
    } else {
        dist
    }
}

// https://wrfranklin.org/Research/Short_Notes/pnpoly.html
pub fn polygon_contains(loops: &[Vec<Vector2<f32>>], point: Vector2<f32>) -> bool {
    let mut interior = false;
    for points in loops {
        let Some(mut b) = points.last() else {
            continue;
        };
        for a in points {
            if (a.y > point.y) != (b.y > point.y)
                && point.x < (b.x - a.x) * (point.y - a.y) / (b.y - a.y) + a.x
            {
                interior = !interior;
            }
            b = a;
        }
    }
    interior
}
