// sat.rs — Narrow-phase swept SAT between two hulls

use crate::hull::{span, BoxHull, Hull};
use crate::shared::{
    cross_product, dot_product, mat3_is_identity, rotate_vector, vector_negate,
    vector_normalize, vector_subtract, Mat3, Trace, Vec3, AXES, CROSS_EPSILON,
};
use crate::sweep::SweepState;

/// Sweep hull A from `a` to `b` with orientation `ori_a` against hull B resting at
/// `pos_b` with `ori_b`.
///
/// Everything is evaluated in A's rest frame: B sits at `pos_b - a` and A moves by
/// `b - a`. The returned normal points from B toward A and the MTV moves A out of B.
pub fn collide(
    hull_a: &Hull,
    ori_a: &Mat3,
    a: &Vec3,
    b: &Vec3,
    hull_b: &Hull,
    pos_b: &Vec3,
    ori_b: &Mat3,
) -> Trace {
    let rel = vector_subtract(pos_b, a);
    let velocity = vector_subtract(b, a);

    match (hull_a, hull_b) {
        (Hull::Box(ba), Hull::Box(bb)) if mat3_is_identity(ori_a) && mat3_is_identity(ori_b) => {
            box_box_aligned(ba, bb, &rel, &velocity)
        }
        (Hull::Convex(_), Hull::Box(_)) => {
            // B sweeps against a resting A; flip the answer back to A's point of view
            let trace = sweep_pair(
                hull_b,
                ori_b,
                hull_a,
                ori_a,
                &vector_negate(&rel),
                &vector_negate(&velocity),
            );
            mirror(trace)
        }
        _ => sweep_pair(hull_a, ori_a, hull_b, ori_b, &rel, &velocity),
    }
}

fn mirror(mut trace: Trace) -> Trace {
    trace.normal = vector_negate(&trace.normal);
    trace.mtv_dir = vector_negate(&trace.mtv_dir);
    trace
}

/// Both boxes axis aligned: the three world axes are the only distinct candidates.
fn box_box_aligned(a: &BoxHull, b: &BoxHull, rel: &Vec3, velocity: &Vec3) -> Trace {
    let mut state = SweepState::new(*velocity);
    for i in 0..3 {
        let min = rel[i] + b.mins[i] - a.maxs[i];
        let max = rel[i] + b.maxs[i] - a.mins[i];
        if !state.add_axis(min, max, velocity[i], &AXES[i]) {
            break;
        }
    }
    state.verdict()
}

#[inline]
fn to_world(orientation: &Mat3, v: &Vec3) -> Vec3 {
    if mat3_is_identity(orientation) {
        *v
    } else {
        rotate_vector(orientation, v)
    }
}

/// Feed one world axis given both spans.
#[inline]
fn test_axis(
    state: &mut SweepState,
    axis: &Vec3,
    span_a: [f32; 2],
    span_b: [f32; 2],
    rel: &Vec3,
    velocity: &Vec3,
) -> bool {
    let offset = dot_product(axis, rel);
    let min = offset + span_b[0] - span_a[1];
    let max = offset + span_b[1] - span_a[0];
    state.add_axis(min, max, dot_product(axis, velocity), axis)
}

/// General case: face normals of both hulls, then every edge-edge cross product.
fn sweep_pair(
    hull_a: &Hull,
    ori_a: &Mat3,
    hull_b: &Hull,
    ori_b: &Mat3,
    rel: &Vec3,
    velocity: &Vec3,
) -> Trace {
    let mut state = SweepState::new(*velocity);

    for (i, local) in hull_a.normal_axes().iter().enumerate() {
        let axis = to_world(ori_a, local);
        let span_a = hull_a.normal_span(i);
        let span_b = span(hull_b, ori_b, &axis);
        if !test_axis(&mut state, &axis, span_a, span_b, rel, velocity) {
            return state.verdict();
        }
    }

    for (i, local) in hull_b.normal_axes().iter().enumerate() {
        let axis = to_world(ori_b, local);
        let span_a = span(hull_a, ori_a, &axis);
        let span_b = hull_b.normal_span(i);
        if !test_axis(&mut state, &axis, span_a, span_b, rel, velocity) {
            return state.verdict();
        }
    }

    let edges_b: Vec<Vec3> = hull_b
        .edge_axes()
        .iter()
        .map(|e| to_world(ori_b, e))
        .collect();
    for local_a in hull_a.edge_axes() {
        let edge_a = to_world(ori_a, local_a);
        for edge_b in &edges_b {
            let mut axis = cross_product(&edge_a, edge_b);
            if vector_normalize(&mut axis) < CROSS_EPSILON {
                continue;
            }
            let span_a = span(hull_a, ori_a, &axis);
            let span_b = span(hull_b, ori_b, &axis);
            if !test_axis(&mut state, &axis, span_a, span_b, rel, velocity) {
                return state.verdict();
            }
        }
    }

    state.verdict()
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hull::ConvexHull;
    use crate::shared::{mat3_from_axis_angle, ContactState, MAT3_IDENTITY};

    fn unit_box() -> Hull {
        Hull::Box(BoxHull::new([-0.5; 3], [0.5; 3]))
    }

    fn unit_convex() -> Hull {
        Hull::Convex(ConvexHull::from_box([-0.5; 3], [0.5; 3]))
    }

    #[test]
    fn test_swept_box_hits_box() {
        let trace = collide(
            &unit_box(),
            &MAT3_IDENTITY,
            &[-2.0, 0.0, 0.0],
            &[2.0, 0.0, 0.0],
            &unit_box(),
            &[0.0; 3],
            &MAT3_IDENTITY,
        );
        assert_eq!(trace.contact, ContactState::Hit);
        assert_eq!(trace.normal, [-1.0, 0.0, 0.0]);
        // gap of 1 unit over a 4 unit move
        assert!((trace.time_first - 0.25).abs() < 1e-5);
        assert!((trace.time_last - 0.75).abs() < 1e-5);
    }

    #[test]
    fn test_overlapping_boxes_intersect() {
        let trace = collide(
            &unit_box(),
            &MAT3_IDENTITY,
            &[0.8, 0.3, 0.1],
            &[0.8, 0.3, 0.1],
            &unit_box(),
            &[0.0; 3],
            &MAT3_IDENTITY,
        );
        assert_eq!(trace.contact, ContactState::Intersect);
        assert!((trace.mtv_mag - 0.2).abs() < 1e-5);
        assert_eq!(trace.mtv_dir, [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_miss_is_none() {
        let trace = collide(
            &unit_box(),
            &MAT3_IDENTITY,
            &[-2.0, 2.0, 0.0],
            &[2.0, 2.0, 0.0],
            &unit_box(),
            &[0.0; 3],
            &MAT3_IDENTITY,
        );
        assert!(trace.is_none());
    }

    #[test]
    fn test_convex_box_matches_box_box() {
        let start = [-2.0, 0.2, -0.1];
        let end = [1.0, 0.1, 0.0];
        let boxes = collide(
            &unit_box(),
            &MAT3_IDENTITY,
            &start,
            &end,
            &unit_box(),
            &[0.0; 3],
            &MAT3_IDENTITY,
        );
        let mixed = collide(
            &unit_convex(),
            &MAT3_IDENTITY,
            &start,
            &end,
            &unit_box(),
            &[0.0; 3],
            &MAT3_IDENTITY,
        );
        let reverse = collide(
            &unit_box(),
            &MAT3_IDENTITY,
            &start,
            &end,
            &unit_convex(),
            &[0.0; 3],
            &MAT3_IDENTITY,
        );
        for trace in [mixed, reverse] {
            assert_eq!(trace.contact, ContactState::Hit);
            assert!((trace.time_first - boxes.time_first).abs() < 1e-5);
            for i in 0..3 {
                assert!((trace.normal[i] - boxes.normal[i]).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_swapped_intersection_points_out_of_obstacle() {
        let trace = collide(
            &unit_convex(),
            &MAT3_IDENTITY,
            &[0.0, 0.0, 0.7],
            &[0.0, 0.0, 0.7],
            &unit_box(),
            &[0.0; 3],
            &MAT3_IDENTITY,
        );
        assert_eq!(trace.contact, ContactState::Intersect);
        assert!((trace.mtv_mag - 0.3).abs() < 1e-5);
        assert!((trace.mtv_dir[2] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_rotated_box_reaches_further() {
        // a box turned 45 degrees about z reaches sqrt(0.5) along x
        let turned = mat3_from_axis_angle(&AXES[2], std::f32::consts::FRAC_PI_4);
        let trace = collide(
            &unit_box(),
            &MAT3_IDENTITY,
            &[-3.0, 0.0, 0.0],
            &[0.0, 0.0, 0.0],
            &unit_box(),
            &[0.0; 3],
            &turned,
        );
        assert_eq!(trace.contact, ContactState::Hit);
        let gap = 3.0 - 0.5 - 0.5f32.sqrt();
        assert!((trace.time_first - gap / 3.0).abs() < 1e-4);
    }

    #[test]
    fn test_edge_axis_separates_rotated_boxes() {
        // vertical edge of A facing horizontal edge of B; no face normal separates them
        let ori_a = mat3_from_axis_angle(&AXES[2], std::f32::consts::FRAC_PI_4);
        let ori_b = mat3_from_axis_angle(&AXES[1], std::f32::consts::FRAC_PI_4);
        let reach = 0.5f32.sqrt();
        let trace = collide(
            &unit_box(),
            &ori_a,
            &[-(reach + reach + 0.05), 0.0, 0.0],
            &[-(reach + reach + 0.05), 0.0, 0.0],
            &unit_box(),
            &[0.0; 3],
            &ori_b,
        );
        assert!(trace.is_none());
    }
}
