// sweep.rs — Swept axis-interval test and running per-pair state

use crate::shared::{
    dot_product, vector_negate, Trace, Vec3, TIME_EPSILON, VEC3_ORIGIN, VELOCITY_EPSILON,
};

/// Result of projecting one candidate axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AxisInterval {
    /// The bodies never overlap on this axis during the move.
    Separated,
    /// Zero relative speed with the bodies overlapping: this axis places no bound on time.
    Unbounded,
    /// Overlap is possible only for `time_first < t < time_last`.
    Window {
        time_first: f32,
        time_last: f32,
        normal: Vec3,
    },
}

/// Classify one axis.
///
/// `[min, max]` is the range of displacements (along `axis`) of the moving body for which
/// it overlaps the obstacle on this axis, already offset by the rest positions. `speed` is
/// the relative velocity projected on `axis`. `axis` must be unit length.
pub fn axis_interval(min: f32, max: f32, speed: f32, axis: &Vec3) -> AxisInterval {
    if speed.abs() < VELOCITY_EPSILON {
        if min < 0.0 && max > 0.0 {
            return AxisInterval::Unbounded;
        }
        return AxisInterval::Separated;
    }

    let tf = min / speed;
    let tl = max / speed;
    if tf > tl {
        AxisInterval::Window {
            time_first: tl,
            time_last: tf,
            normal: *axis,
        }
    } else {
        AxisInterval::Window {
            time_first: tf,
            time_last: tl,
            normal: vector_negate(axis),
        }
    }
}

// ============================================================
// Running state
// ============================================================

/// Accumulates axis results for one hull pair: the latest entry, the earliest exit and,
/// while every axis so far overlaps at t = 0, the shallowest push-out.
#[derive(Debug, Clone, Copy)]
pub struct SweepState {
    pub time_first: f32,
    pub time_last: f32,
    pub normal: Vec3,
    best_alignment: f32,
    pub overlapping: bool,
    pub mtv_mag: f32,
    pub mtv_dir: Vec3,
    pub separated: bool,
    velocity: Vec3,
}

impl SweepState {
    pub fn new(velocity: Vec3) -> Self {
        Self {
            time_first: f32::NEG_INFINITY,
            time_last: f32::INFINITY,
            normal: VEC3_ORIGIN,
            best_alignment: f32::NEG_INFINITY,
            overlapping: true,
            mtv_mag: f32::INFINITY,
            mtv_dir: VEC3_ORIGIN,
            separated: false,
            velocity,
        }
    }

    /// Feed one axis. Returns false once a separating axis has been found, at which point
    /// callers stop testing further axes.
    pub fn add_axis(&mut self, min: f32, max: f32, speed: f32, axis: &Vec3) -> bool {
        if self.separated {
            return false;
        }

        if self.overlapping {
            if min < 0.0 && max > 0.0 {
                let (mag, dir) = if -min < max {
                    (-min, vector_negate(axis))
                } else {
                    (max, *axis)
                };
                if mag < self.mtv_mag {
                    self.mtv_mag = mag;
                    self.mtv_dir = dir;
                }
            } else {
                self.overlapping = false;
            }
        }

        match axis_interval(min, max, speed, axis) {
            AxisInterval::Separated => {
                self.separated = true;
                return false;
            }
            AxisInterval::Unbounded => {}
            AxisInterval::Window {
                time_first,
                time_last,
                normal,
            } => {
                let alignment = dot_product(&normal, &self.velocity).abs();
                if time_first > self.time_first + TIME_EPSILON {
                    self.time_first = time_first;
                    self.normal = normal;
                    self.best_alignment = alignment;
                } else if time_first >= self.time_first - TIME_EPSILON {
                    // seam: prefer the face the motion drives into hardest
                    if alignment > self.best_alignment {
                        self.normal = normal;
                        self.best_alignment = alignment;
                    }
                    self.time_first = self.time_first.max(time_first);
                }
                if time_last < self.time_last {
                    self.time_last = time_last;
                }
            }
        }

        if self.time_first > self.time_last && !self.overlapping {
            self.separated = true;
            return false;
        }
        true
    }

    pub fn verdict(&self) -> Trace {
        if self.separated {
            return Trace::none();
        }
        if self.overlapping {
            return Trace::intersect(self.mtv_mag, self.mtv_dir);
        }
        if self.time_first >= 0.0
            && self.time_first <= 1.0
            && self.time_first <= self.time_last
            && self.time_last > 0.0
        {
            return Trace::hit(self.time_first, self.time_last, self.normal);
        }
        Trace::none()
    }
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::{ContactState, AXES};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_zero_speed_separates_iff_disjoint() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..1000 {
            // static projections of A and B
            let a0: f32 = rng.gen_range(-10.0..10.0);
            let a1 = a0 + rng.gen_range(0.1..5.0);
            let b0: f32 = rng.gen_range(-10.0..10.0);
            let b1 = b0 + rng.gen_range(0.1..5.0);
            let disjoint = a1 <= b0 || b1 <= a0;
            let result = axis_interval(b0 - a1, b1 - a0, 0.0, &AXES[0]);
            assert_eq!(result == AxisInterval::Separated, disjoint);
        }
    }

    #[test]
    fn test_window_ordering() {
        match axis_interval(1.0, 3.0, 4.0, &AXES[0]) {
            AxisInterval::Window {
                time_first,
                time_last,
                normal,
            } => {
                assert!((time_first - 0.25).abs() < 1e-6);
                assert!((time_last - 0.75).abs() < 1e-6);
                assert_eq!(normal, [-1.0, 0.0, 0.0]);
            }
            other => panic!("unexpected {:?}", other),
        }
        match axis_interval(-3.0, -1.0, -4.0, &AXES[0]) {
            AxisInterval::Window {
                time_first,
                time_last,
                normal,
            } => {
                assert!(time_first <= time_last);
                assert!((time_first - 0.25).abs() < 1e-6);
                assert_eq!(normal, [1.0, 0.0, 0.0]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_tie_prefers_aligned_axis() {
        // diagonal approach onto an edge: x and y enter at the same time
        let velocity = [4.0, 1.0, 0.0];
        let mut state = SweepState::new(velocity);
        assert!(state.add_axis(1.0, 3.0, 4.0, &AXES[0]));
        assert!(state.add_axis(0.25, 2.0, 1.0, &AXES[1]));
        assert!(state.add_axis(-1.0, 1.0, 0.0, &AXES[2]));
        let trace = state.verdict();
        assert_eq!(trace.contact, ContactState::Hit);
        assert_eq!(trace.normal, [-1.0, 0.0, 0.0]);

        let mut state = SweepState::new(velocity);
        assert!(state.add_axis(0.25, 2.0, 1.0, &AXES[1]));
        assert!(state.add_axis(1.0, 3.0, 4.0, &AXES[0]));
        assert_eq!(state.verdict().normal, [-1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_overlap_reports_shallowest_axis() {
        let mut state = SweepState::new([0.0; 3]);
        state.add_axis(-0.2, 1.8, 0.0, &AXES[0]);
        state.add_axis(-1.5, 0.5, 0.0, &AXES[1]);
        state.add_axis(-1.0, 1.0, 0.0, &AXES[2]);
        let trace = state.verdict();
        assert_eq!(trace.contact, ContactState::Intersect);
        assert!((trace.mtv_mag - 0.2).abs() < 1e-6);
        assert_eq!(trace.mtv_dir, [-1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_disjoint_windows_separate() {
        let mut state = SweepState::new([1.0, 1.0, 0.0]);
        assert!(state.add_axis(0.5, 0.6, 1.0, &AXES[0]));
        assert!(!state.add_axis(0.7, 0.9, 1.0, &AXES[1]));
        assert!(state.verdict().is_none());
    }

    #[test]
    fn test_contact_past_end_is_none() {
        let mut state = SweepState::new([1.0, 0.0, 0.0]);
        state.add_axis(2.0, 3.0, 1.0, &AXES[0]);
        state.add_axis(-1.0, 1.0, 0.0, &AXES[1]);
        assert!(state.verdict().is_none());
    }

    #[test]
    fn test_moving_away_is_none() {
        let mut state = SweepState::new([-1.0, 0.0, 0.0]);
        state.add_axis(0.5, 2.0, -1.0, &AXES[0]);
        state.add_axis(-1.0, 1.0, 0.0, &AXES[1]);
        assert!(state.verdict().is_none());
    }
}
