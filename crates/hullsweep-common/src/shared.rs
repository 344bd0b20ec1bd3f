// shared.rs — Math helpers and value types shared by every collision module

// ============================================================
// Basic types
// ============================================================

pub type Vec3 = [f32; 3];

/// Row-major 3x3 rotation. Column `j` is local axis `j` expressed in world space,
/// so `world = m * local` and `local = mᵀ * world`.
pub type Mat3 = [[f32; 3]; 3];

pub const VEC3_ORIGIN: Vec3 = [0.0, 0.0, 0.0];

pub const MAT3_IDENTITY: Mat3 = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// Unit axes in x, y, z order.
pub const AXES: [Vec3; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

// ============================================================
// Tolerances
// ============================================================

/// Two entry times closer than this are considered a tie.
pub const TIME_EPSILON: f32 = 1e-6;

/// Projected relative speeds at or below this are treated as zero.
pub const VELOCITY_EPSILON: f32 = 1e-7;

/// Cross products of edge axes shorter than this are parallel edges and skipped.
pub const CROSS_EPSILON: f32 = 1e-6;

/// Relative tolerance for separating-axis deduplication, scaled by vertex magnitude.
pub const AXIS_DEDUP_SCALE: f32 = 16.0 * f32::EPSILON;

// ============================================================
// Identifiers and flags
// ============================================================

/// Opaque handle of a dynamic entity, assigned by scene code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u32);

bitflags::bitflags! {
    /// Which collision sources a test consults.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct SourceMask: u8 {
        /// The static world tree.
        const STATIC    = 0x01;
        /// Dynamic entities.
        const DYNAMIC   = 0x02;
        /// The alternate tree variant, when the world carries one.
        const ALTERNATE = 0x04;
    }
}

impl Default for SourceMask {
    fn default() -> Self {
        SourceMask::STATIC | SourceMask::DYNAMIC
    }
}

bitflags::bitflags! {
    /// Leaf faces that open onto a portal. Consumed by penetration recovery.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct PortalExits: u8 {
        const NEG_X = 0x01;
        const POS_X = 0x02;
        const NEG_Y = 0x04;
        const POS_Y = 0x08;
        const NEG_Z = 0x10;
        const POS_Z = 0x20;
    }
}

// ============================================================
// MATHLIB — Vector operations
// ============================================================

#[inline]
pub fn dot_product(a: &Vec3, b: &Vec3) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn vector_subtract(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn vector_add(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

#[inline]
pub fn vector_negate(v: &Vec3) -> Vec3 {
    [-v[0], -v[1], -v[2]]
}

/// veca + scale * vecb
#[inline]
pub fn vector_ma(veca: &Vec3, scale: f32, vecb: &Vec3) -> Vec3 {
    [
        veca[0] + scale * vecb[0],
        veca[1] + scale * vecb[1],
        veca[2] + scale * vecb[2],
    ]
}

#[inline]
pub fn vector_scale(v: &Vec3, scale: f32) -> Vec3 {
    [v[0] * scale, v[1] * scale, v[2] * scale]
}

/// a + frac * (b - a)
#[inline]
pub fn vector_lerp(a: &Vec3, b: &Vec3, frac: f32) -> Vec3 {
    [
        a[0] + frac * (b[0] - a[0]),
        a[1] + frac * (b[1] - a[1]),
        a[2] + frac * (b[2] - a[2]),
    ]
}

pub fn vector_length(v: &Vec3) -> f32 {
    dot_product(v, v).sqrt()
}

/// Normalize in place, returns original length.
pub fn vector_normalize(v: &mut Vec3) -> f32 {
    let length = vector_length(v);
    if length != 0.0 {
        let ilength = 1.0 / length;
        v[0] *= ilength;
        v[1] *= ilength;
        v[2] *= ilength;
    }
    length
}

pub fn cross_product(v1: &Vec3, v2: &Vec3) -> Vec3 {
    [
        v1[1] * v2[2] - v1[2] * v2[1],
        v1[2] * v2[0] - v1[0] * v2[2],
        v1[0] * v2[1] - v1[1] * v2[0],
    ]
}

pub fn vector_is_finite(v: &Vec3) -> bool {
    v.iter().all(|c| c.is_finite())
}

pub fn add_point_to_bounds(v: &Vec3, mins: &mut Vec3, maxs: &mut Vec3) {
    for i in 0..3 {
        if v[i] < mins[i] {
            mins[i] = v[i];
        }
        if v[i] > maxs[i] {
            maxs[i] = v[i];
        }
    }
}

pub fn bounds_overlap(mins1: &Vec3, maxs1: &Vec3, mins2: &Vec3, maxs2: &Vec3) -> bool {
    !(mins1[0] > maxs2[0]
        || mins1[1] > maxs2[1]
        || mins1[2] > maxs2[2]
        || maxs1[0] < mins2[0]
        || maxs1[1] < mins2[1]
        || maxs1[2] < mins2[2])
}

// ============================================================
// Matrix operations
// ============================================================

pub fn mat3_is_identity(m: &Mat3) -> bool {
    *m == MAT3_IDENTITY
}

/// Local-space vector to world space.
#[inline]
pub fn rotate_vector(m: &Mat3, v: &Vec3) -> Vec3 {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

/// World-space vector to local space (multiply by the transpose).
#[inline]
pub fn unrotate_vector(m: &Mat3, v: &Vec3) -> Vec3 {
    [
        m[0][0] * v[0] + m[1][0] * v[1] + m[2][0] * v[2],
        m[0][1] * v[0] + m[1][1] * v[1] + m[2][1] * v[2],
        m[0][2] * v[0] + m[1][2] * v[1] + m[2][2] * v[2],
    ]
}

/// Column `i` of the matrix: local axis `i` in world space.
#[inline]
pub fn mat3_axis(m: &Mat3, i: usize) -> Vec3 {
    [m[0][i], m[1][i], m[2][i]]
}

/// Rotation of `radians` about a unit `axis` (Rodrigues).
pub fn mat3_from_axis_angle(axis: &Vec3, radians: f32) -> Mat3 {
    let (s, c) = radians.sin_cos();
    let t = 1.0 - c;
    let [x, y, z] = *axis;
    [
        [t * x * x + c, t * x * y - s * z, t * x * z + s * y],
        [t * x * y + s * z, t * y * y + c, t * y * z - s * x],
        [t * x * z - s * y, t * y * z + s * x, t * z * z + c],
    ]
}

// ============================================================
// Plane
// ============================================================

pub const PLANE_X: u8 = 0;
pub const PLANE_Y: u8 = 1;
pub const PLANE_Z: u8 = 2;
pub const PLANE_ANYZ: u8 = 3;

/// Oriented plane `normal · x = dist`; the front side is where the distance is positive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub dist: f32,
    /// `PLANE_X..PLANE_Z` when the normal is a positive unit axis, else `PLANE_ANYZ`.
    pub plane_type: u8,
    /// Bit `i` set when `normal[i]` is negative.
    pub signbits: u8,
}

impl Default for Plane {
    fn default() -> Self {
        Self::new([0.0, 0.0, 1.0], 0.0)
    }
}

impl Plane {
    pub fn new(normal: Vec3, dist: f32) -> Self {
        let plane_type = if normal == AXES[0] {
            PLANE_X
        } else if normal == AXES[1] {
            PLANE_Y
        } else if normal == AXES[2] {
            PLANE_Z
        } else {
            PLANE_ANYZ
        };
        let mut signbits = 0u8;
        for (j, &c) in normal.iter().enumerate() {
            if c < 0.0 {
                signbits |= 1 << j;
            }
        }
        Self {
            normal,
            dist,
            plane_type,
            signbits,
        }
    }

    /// Signed distance from `p`, with the axial fast path.
    #[inline]
    pub fn distance(&self, p: &Vec3) -> f32 {
        if self.plane_type < 3 {
            p[self.plane_type as usize] - self.dist
        } else {
            dot_product(&self.normal, p) - self.dist
        }
    }

    /// Returns 1 (front), 2 (back), or 3 (crossing) for a box vs. plane test.
    pub fn box_side(&self, emins: &Vec3, emaxs: &Vec3) -> i32 {
        // fast axial cases
        if self.plane_type < 3 {
            let t = self.plane_type as usize;
            if self.dist <= emins[t] {
                return 1;
            }
            if self.dist >= emaxs[t] {
                return 2;
            }
            return 3;
        }

        let n = &self.normal;
        let (dist1, dist2) = match self.signbits {
            0 => (
                n[0] * emaxs[0] + n[1] * emaxs[1] + n[2] * emaxs[2],
                n[0] * emins[0] + n[1] * emins[1] + n[2] * emins[2],
            ),
            1 => (
                n[0] * emins[0] + n[1] * emaxs[1] + n[2] * emaxs[2],
                n[0] * emaxs[0] + n[1] * emins[1] + n[2] * emins[2],
            ),
            2 => (
                n[0] * emaxs[0] + n[1] * emins[1] + n[2] * emaxs[2],
                n[0] * emins[0] + n[1] * emaxs[1] + n[2] * emins[2],
            ),
            3 => (
                n[0] * emins[0] + n[1] * emins[1] + n[2] * emaxs[2],
                n[0] * emaxs[0] + n[1] * emaxs[1] + n[2] * emins[2],
            ),
            4 => (
                n[0] * emaxs[0] + n[1] * emaxs[1] + n[2] * emins[2],
                n[0] * emins[0] + n[1] * emins[1] + n[2] * emaxs[2],
            ),
            5 => (
                n[0] * emins[0] + n[1] * emaxs[1] + n[2] * emins[2],
                n[0] * emaxs[0] + n[1] * emins[1] + n[2] * emaxs[2],
            ),
            6 => (
                n[0] * emaxs[0] + n[1] * emins[1] + n[2] * emins[2],
                n[0] * emins[0] + n[1] * emaxs[1] + n[2] * emaxs[2],
            ),
            _ => (
                n[0] * emins[0] + n[1] * emins[1] + n[2] * emins[2],
                n[0] * emaxs[0] + n[1] * emaxs[1] + n[2] * emaxs[2],
            ),
        };

        let mut sides = 0;
        if dist1 >= self.dist {
            sides = 1;
        }
        if dist2 < self.dist {
            sides |= 2;
        }
        sides
    }
}

// ============================================================
// Trace
// ============================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContactState {
    #[default]
    None,
    /// The swept bodies meet during the move.
    Hit,
    /// The bodies already overlap at the start of the move.
    Intersect,
}

/// Outcome of a swept test.
///
/// `time_first`/`time_last` are fractions of the move and only meaningful for
/// [`ContactState::Hit`]; `mtv_mag`/`mtv_dir` only for [`ContactState::Intersect`].
/// `normal` points from the obstacle toward the moving body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trace {
    pub contact: ContactState,
    pub time_first: f32,
    pub time_last: f32,
    pub normal: Vec3,
    pub mtv_mag: f32,
    pub mtv_dir: Vec3,
    pub entity: Option<EntityId>,
}

impl Default for Trace {
    fn default() -> Self {
        Self {
            contact: ContactState::None,
            time_first: 1.0,
            time_last: 1.0,
            normal: VEC3_ORIGIN,
            mtv_mag: 0.0,
            mtv_dir: VEC3_ORIGIN,
            entity: None,
        }
    }
}

impl Trace {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn hit(time_first: f32, time_last: f32, normal: Vec3) -> Self {
        Self {
            contact: ContactState::Hit,
            time_first,
            time_last,
            normal,
            ..Self::default()
        }
    }

    pub fn intersect(mtv_mag: f32, mtv_dir: Vec3) -> Self {
        Self {
            contact: ContactState::Intersect,
            time_first: 0.0,
            time_last: 0.0,
            mtv_mag,
            mtv_dir,
            ..Self::default()
        }
    }

    #[inline]
    pub fn is_hit(&self) -> bool {
        self.contact == ContactState::Hit
    }

    #[inline]
    pub fn is_intersect(&self) -> bool {
        self.contact == ContactState::Intersect
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        self.contact == ContactState::None
    }

    /// Contact direction for response: the hit normal, or the push-out direction.
    pub fn contact_normal(&self) -> Vec3 {
        match self.contact {
            ContactState::Intersect => self.mtv_dir,
            _ => self.normal,
        }
    }

    /// Intersections outrank hits, which outrank no contact. Deeper intersections
    /// and earlier hits win within a rank.
    pub fn is_better_than(&self, other: &Trace) -> bool {
        match (self.contact, other.contact) {
            (ContactState::None, _) => false,
            (_, ContactState::None) => true,
            (ContactState::Intersect, ContactState::Hit) => true,
            (ContactState::Hit, ContactState::Intersect) => false,
            (ContactState::Intersect, ContactState::Intersect) => self.mtv_mag > other.mtv_mag,
            (ContactState::Hit, ContactState::Hit) => self.time_first < other.time_first,
        }
    }
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cross_product_axes() {
        assert_eq!(cross_product(&AXES[0], &AXES[1]), AXES[2]);
        assert_eq!(cross_product(&AXES[1], &AXES[2]), AXES[0]);
    }

    #[test]
    fn test_rotate_unrotate_roundtrip() {
        let m = mat3_from_axis_angle(&[0.0, 0.0, 1.0], 0.7);
        let v = [1.0, -2.0, 3.0];
        let back = unrotate_vector(&m, &rotate_vector(&m, &v));
        for i in 0..3 {
            assert!((back[i] - v[i]).abs() < 1e-5);
        }
    }

    #[test]
    fn test_quarter_turn_maps_x_to_y() {
        let m = mat3_from_axis_angle(&[0.0, 0.0, 1.0], std::f32::consts::FRAC_PI_2);
        let x = mat3_axis(&m, 0);
        assert!(x[0].abs() < 1e-6);
        assert!((x[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_plane_axial_type() {
        assert_eq!(Plane::new([0.0, 1.0, 0.0], 4.0).plane_type, PLANE_Y);
        let p = Plane::new([0.0, -1.0, 0.0], 4.0);
        assert_eq!(p.plane_type, PLANE_ANYZ);
        assert_eq!(p.signbits, 2);
        assert!((p.distance(&[0.0, -6.0, 0.0]) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_box_side() {
        let p = Plane::new([0.6, 0.8, 0.0], 0.0);
        assert_eq!(p.box_side(&[1.0, 1.0, 0.0], &[2.0, 2.0, 1.0]), 1);
        assert_eq!(p.box_side(&[-2.0, -2.0, 0.0], &[-1.0, -1.0, 1.0]), 2);
        assert_eq!(p.box_side(&[-1.0, -1.0, 0.0], &[1.0, 1.0, 1.0]), 3);
    }

    #[test]
    fn test_trace_ranking() {
        let early = Trace::hit(0.2, 0.5, AXES[0]);
        let late = Trace::hit(0.6, 0.9, AXES[0]);
        let shallow = Trace::intersect(0.1, AXES[1]);
        let deep = Trace::intersect(0.4, AXES[1]);
        assert!(early.is_better_than(&late));
        assert!(!late.is_better_than(&early));
        assert!(shallow.is_better_than(&early));
        assert!(deep.is_better_than(&shallow));
        assert!(!Trace::none().is_better_than(&late));
        assert!(late.is_better_than(&Trace::none()));
    }

    #[test]
    fn test_source_mask_default() {
        let m = SourceMask::default();
        assert!(m.contains(SourceMask::STATIC));
        assert!(m.contains(SourceMask::DYNAMIC));
        assert!(!m.contains(SourceMask::ALTERNATE));
    }
}
