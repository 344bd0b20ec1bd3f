// pmove.rs — Movement resolution: stop, climb and slide built on swept tests

use crate::cvar::MoveConfig;
use crate::hull::Hull;
use crate::shared::{
    cross_product, dot_product, vector_add, vector_length, vector_ma, vector_normalize,
    vector_scale, vector_subtract, ContactState, Mat3, Trace, Vec3, CROSS_EPSILON,
    VELOCITY_EPSILON,
};
use crate::world::Tracer;

/// Smallest approach steepness used when scaling the stop back-off.
const MIN_STEEPNESS: f32 = 0.05;

#[derive(Debug, Clone, Copy)]
pub struct MoveOutcome {
    pub position: Vec3,
    pub trace: Trace,
}

// ============================================================
// Stop
// ============================================================

/// Where a move from `a` toward `b` should end given its test result.
///
/// A hit stops short of the contact by `stop_epsilon` measured along the surface
/// normal, so grazing approaches back off further along the move. An intersection
/// pushes `a` out along the MTV.
pub fn respond_stop(trace: &Trace, a: &Vec3, b: &Vec3, config: &MoveConfig) -> Vec3 {
    match trace.contact {
        ContactState::None => *b,
        ContactState::Hit => {
            let mut dir = vector_subtract(b, a);
            let len = vector_normalize(&mut dir);
            if len <= 0.0 {
                return *a;
            }
            let steepness = dot_product(&trace.normal, &dir).abs().max(MIN_STEEPNESS);
            let backoff = config.stop_epsilon / steepness;
            let t = (trace.time_first - backoff / len).max(0.0);
            vector_ma(a, t * len, &dir)
        }
        ContactState::Intersect => {
            vector_ma(a, trace.mtv_mag + config.push_nudge, &trace.mtv_dir)
        }
    }
}

/// One test and response, retried once from the pushed-out position if the first
/// test found the hull already embedded.
pub fn move_stop(
    tracer: &mut impl Tracer,
    hull: &Hull,
    orientation: &Mat3,
    a: &Vec3,
    b: &Vec3,
    config: &MoveConfig,
) -> MoveOutcome {
    let trace = tracer.trace(hull, orientation, a, b);
    let mut position = respond_stop(&trace, a, b, config);

    if trace.is_intersect() {
        let retry = tracer.trace(hull, orientation, &position, &position);
        if retry.is_intersect() {
            log::debug!(
                "move_stop: still embedded after push-out ({}), second pass",
                retry.mtv_mag
            );
            position = respond_stop(&retry, &position, &position, config);
        }
    }

    MoveOutcome { position, trace }
}

// ============================================================
// Climb
// ============================================================

fn horizontal(v: &Vec3, up: &Vec3) -> Vec3 {
    vector_ma(v, -dot_product(v, up), up)
}

fn cancel_climb(base: MoveOutcome, reason: &str) -> MoveOutcome {
    log::debug!("climb cancelled: {}", reason);
    base
}

/// Move toward `b`, stepping up onto a ledge when a wall blocks the way.
///
/// Steps: the plain move, straight up by `climb_height`, across at the raised height,
/// then down by however far the up step rose. Any step that fails leaves the plain
/// move's result in place.
pub fn move_climb(
    tracer: &mut impl Tracer,
    hull: &Hull,
    orientation: &Mat3,
    a: &Vec3,
    b: &Vec3,
    config: &MoveConfig,
) -> MoveOutcome {
    let base = move_stop(tracer, hull, orientation, a, b, config);
    if !base.trace.is_hit() {
        return base;
    }

    let up = config.up_vector();
    if dot_product(&base.trace.normal, &up).abs() >= config.wall_normal {
        return base;
    }

    let delta = vector_subtract(b, a);
    let mut forward = horizontal(&delta, &up);
    if vector_normalize(&mut forward) <= 0.0 {
        return base;
    }
    let base_progress = dot_product(&vector_subtract(&base.position, a), &forward);

    // up
    let raised_target = vector_ma(a, config.climb_height, &up);
    let raised = move_stop(tracer, hull, orientation, a, &raised_target, config);
    if raised.trace.is_intersect() {
        return cancel_climb(base, "embedded on the way up");
    }
    let rise = dot_product(&vector_subtract(&raised.position, a), &up);
    if rise <= config.stop_epsilon {
        return cancel_climb(base, "no headroom");
    }

    // across
    let across_target = vector_add(&raised.position, &delta);
    let across = move_stop(tracer, hull, orientation, &raised.position, &across_target, config);
    if across.trace.is_intersect() {
        return cancel_climb(base, "embedded at the raised height");
    }
    let across_progress = dot_product(&vector_subtract(&across.position, a), &forward);
    if across_progress <= base_progress + config.stop_epsilon {
        return cancel_climb(base, "no progress past the blocker");
    }

    // down
    let settle_target = vector_ma(&across.position, -rise, &up);
    let settle = move_stop(tracer, hull, orientation, &across.position, &settle_target, config);
    if !settle.trace.is_hit() {
        return cancel_climb(base, "no floor under the ledge");
    }
    if dot_product(&settle.trace.normal, &up) < config.min_floor_normal {
        return cancel_climb(base, "ledge too steep");
    }

    MoveOutcome {
        position: settle.position,
        trace: across.trace,
    }
}

// ============================================================
// Slide
// ============================================================

/// Remove the part of `velocity` going into `normal`.
///
/// When a `previous` contact normal from the same stuck sequence is given, the hull
/// is wedged between both planes and the velocity is kept only along the crease
/// they form. Parallel normals fall back to the plain projection.
pub fn clip_velocity(velocity: &Vec3, normal: &Vec3, previous: Option<&Vec3>) -> Vec3 {
    if let Some(previous) = previous {
        let mut crease = cross_product(previous, normal);
        if vector_normalize(&mut crease) > CROSS_EPSILON {
            return vector_scale(&crease, dot_product(velocity, &crease));
        }
    }
    vector_ma(velocity, -dot_product(velocity, normal), normal)
}

/// Contact memory across the bumps of one tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlideState {
    pub previous_normal: Option<Vec3>,
}

#[derive(Debug, Clone, Copy)]
pub struct SlideOutcome {
    pub position: Vec3,
    pub velocity: Vec3,
    pub trace: Trace,
    pub time_used: f32,
}

/// One climbing move along `velocity` for `dt`, then project the velocity onto the
/// contact surface for the next move.
pub fn move_slide(
    tracer: &mut impl Tracer,
    hull: &Hull,
    orientation: &Mat3,
    position: &Vec3,
    velocity: &Vec3,
    dt: f32,
    state: &mut SlideState,
    config: &MoveConfig,
) -> SlideOutcome {
    let end = vector_ma(position, dt, velocity);
    let outcome = move_climb(tracer, hull, orientation, position, &end, config);
    let trace = outcome.trace;

    if trace.is_none() {
        return SlideOutcome {
            position: outcome.position,
            velocity: *velocity,
            trace,
            time_used: dt,
        };
    }

    let traveled = vector_length(&vector_subtract(&outcome.position, position));
    let stuck = trace.is_intersect() || traveled <= config.stop_epsilon;
    if !stuck {
        state.previous_normal = None;
    }

    let normal = trace.contact_normal();
    let new_velocity = clip_velocity(velocity, &normal, state.previous_normal.as_ref());
    state.previous_normal = Some(normal);

    let time_used = if trace.is_hit() {
        trace.time_first * dt
    } else {
        0.0
    };

    SlideOutcome {
        position: outcome.position,
        velocity: new_velocity,
        trace,
        time_used,
    }
}

/// Up to `slide_bumps` slides, each consuming the time the previous contact left over.
pub fn slide_tick(
    tracer: &mut impl Tracer,
    hull: &Hull,
    orientation: &Mat3,
    position: &Vec3,
    velocity: &Vec3,
    dt: f32,
    config: &MoveConfig,
) -> SlideOutcome {
    let mut state = SlideState::default();
    let mut current = SlideOutcome {
        position: *position,
        velocity: *velocity,
        trace: Trace::none(),
        time_used: 0.0,
    };
    let mut time_left = dt;

    for _bump in 0..config.slide_bumps {
        if time_left <= 0.0 || vector_length(&current.velocity) < VELOCITY_EPSILON {
            break;
        }
        let step = move_slide(
            tracer,
            hull,
            orientation,
            &current.position,
            &current.velocity,
            time_left,
            &mut state,
            config,
        );
        time_left -= step.time_used;
        current.position = step.position;
        current.velocity = step.velocity;
        current.trace = step.trace;
        if step.trace.is_none() {
            break;
        }
    }

    current.time_used = dt - time_left.max(0.0);
    current
}

// ============================================================
// Tests
// ============================================================
