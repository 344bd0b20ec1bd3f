// descent.rs — Explicit BSP descent context: line, thick-volume and sphere traversal

use crate::bsp::{child_leafnum, BspTree};
use crate::hull::{span, GenerationMarks, Hull};
use crate::shared::{vector_lerp, vector_negate, Mat3, Vec3, VEC3_ORIGIN};

/// How a stack element came to be pushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescentOp {
    Root,
    /// Whole segment behind the plane.
    Left,
    /// Whole segment in front of the plane.
    Right,
    /// Coplanar line, or a volume child reachable along the whole segment.
    Copy,
    /// Line cut at the plane crossing.
    Split,
    /// Volume child reachable along part of the segment.
    Clip,
}

/// Line classification against one split plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineStep {
    Left,
    Right,
    Copy,
    /// Crossing at `frac` of the segment.
    Split(f32),
}

/// Per-child outcome of a thick-plane test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Discard,
    Clip,
    Copy,
}

/// Classify segment endpoint distances `da`, `db` to a plane.
pub fn classify_line(da: f32, db: f32) -> LineStep {
    if da == 0.0 && db == 0.0 {
        LineStep::Copy
    } else if da <= 0.0 && db <= 0.0 {
        LineStep::Left
    } else if da >= 0.0 && db >= 0.0 {
        LineStep::Right
    } else {
        LineStep::Split(da / (da - db))
    }
}

/// `sa`, `sb` measure how far each endpoint reaches into one side (positive = inside).
pub fn thick_verdict(sa: f32, sb: f32) -> Verdict {
    if sa > 0.0 && sb > 0.0 {
        Verdict::Copy
    } else if sa <= 0.0 && sb <= 0.0 {
        Verdict::Discard
    } else {
        Verdict::Clip
    }
}

// ============================================================
// Extents
// ============================================================

/// Projection of the moving volume onto a split normal, relative to its origin.
pub trait PlaneExtent {
    fn extent(&self, normal: &Vec3) -> [f32; 2];
}

pub struct SphereExtent(pub f32);

impl PlaneExtent for SphereExtent {
    fn extent(&self, _normal: &Vec3) -> [f32; 2] {
        [-self.0, self.0]
    }
}

pub struct HullExtent<'a> {
    pub hull: &'a Hull,
    pub orientation: &'a Mat3,
}

impl PlaneExtent for HullExtent<'_> {
    fn extent(&self, normal: &Vec3) -> [f32; 2] {
        span(self.hull, self.orientation, normal)
    }
}

// ============================================================
// Descent context
// ============================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraceStats {
    pub traces: u32,
    pub leafs: u32,
    pub narrow_tests: u32,
}

impl TraceStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DescentElement {
    pub node: i32,
    pub a: Vec3,
    pub b: Vec3,
    pub ta: f32,
    pub tb: f32,
    /// Normal of the plane this fragment entered through.
    pub normal: Vec3,
    pub op: DescentOp,
    pub contains_start: bool,
}

/// A leaf reached by the descent with the fragment of the move inside it.
#[derive(Debug, Clone, Copy)]
pub struct LeafVisit {
    pub leaf: usize,
    pub a: Vec3,
    pub b: Vec3,
    pub ta: f32,
    pub tb: f32,
    pub normal: Vec3,
    pub op: DescentOp,
    pub contains_start: bool,
}

/// Scratch state for one in-flight descent. Nested queries that must interleave with
/// another descent use their own instance.
#[derive(Debug, Default)]
pub struct Descent {
    stack: Vec<DescentElement>,
    cutoff: f32,
    pub stats: TraceStats,
    leaf_marks: GenerationMarks,
    leaf_generation: u32,
    zone_marks: GenerationMarks,
}

impl Descent {
    pub fn new() -> Self {
        Self {
            cutoff: f32::INFINITY,
            ..Self::default()
        }
    }

    /// Size scratch buffers for `tree`. Growth only happens for a deeper tree than any
    /// seen before.
    pub fn reserve_for(&mut self, tree: &BspTree) {
        let want = tree.depth() + 2;
        if self.stack.capacity() < want {
            self.stack.reserve(want.saturating_sub(self.stack.len()));
        }
        self.leaf_marks.ensure_len(tree.leaves().len());
        self.zone_marks.ensure_len(tree.zone_count());
    }

    /// Start a new descent of the move `a` -> `b` from the tree root.
    pub fn begin(&mut self, tree: &BspTree, a: &Vec3, b: &Vec3) {
        self.stack.clear();
        self.reserve_for(tree);
        self.cutoff = f32::INFINITY;
        self.leaf_generation = self.leaf_marks.next_generation();
        self.stats.traces += 1;
        self.stack.push(DescentElement {
            node: tree.root(),
            a: *a,
            b: *b,
            ta: 0.0,
            tb: 1.0,
            normal: VEC3_ORIGIN,
            op: DescentOp::Root,
            contains_start: true,
        });
    }

    /// Fragments starting after `time` are dropped when popped.
    pub fn set_cutoff(&mut self, time: f32) {
        self.cutoff = time;
    }

    pub fn pending(&self) -> usize {
        self.stack.len()
    }

    pub fn capacity(&self) -> usize {
        self.stack.capacity()
    }

    /// True the first time `leaf` is offered during the current descent.
    pub fn first_visit(&self, leaf: usize) -> bool {
        self.leaf_marks.mark(leaf, self.leaf_generation)
    }

    fn pop_live(&mut self) -> Option<DescentElement> {
        while let Some(e) = self.stack.pop() {
            if e.ta > self.cutoff {
                continue;
            }
            return Some(e);
        }
        None
    }

    fn visit(&mut self, e: &DescentElement) -> LeafVisit {
        self.stats.leafs += 1;
        LeafVisit {
            leaf: child_leafnum(e.node),
            a: e.a,
            b: e.b,
            ta: e.ta,
            tb: e.tb,
            normal: e.normal,
            op: e.op,
            contains_start: e.contains_start,
        }
    }

    // ============================================================
    // Zero-thickness line
    // ============================================================

    /// Next leaf along the line, nearest first.
    pub fn next_line_leaf(&mut self, tree: &BspTree) -> Option<LeafVisit> {
        loop {
            let e = self.pop_live()?;
            if e.node < 0 {
                return Some(self.visit(&e));
            }

            let node = tree.node(e.node as usize);
            let da = node.plane.distance(&e.a);
            let db = node.plane.distance(&e.b);

            match classify_line(da, db) {
                LineStep::Copy => {
                    self.stack.push(DescentElement {
                        node: node.children[1],
                        op: DescentOp::Copy,
                        ..e
                    });
                    self.stack.push(DescentElement {
                        node: node.children[0],
                        op: DescentOp::Copy,
                        ..e
                    });
                }
                LineStep::Left => self.stack.push(DescentElement {
                    node: node.children[1],
                    op: DescentOp::Left,
                    ..e
                }),
                LineStep::Right => self.stack.push(DescentElement {
                    node: node.children[0],
                    op: DescentOp::Right,
                    ..e
                }),
                LineStep::Split(frac) => {
                    let (near, far) = if da < 0.0 { (1, 0) } else { (0, 1) };
                    let mid = vector_lerp(&e.a, &e.b, frac);
                    let tm = e.ta + (e.tb - e.ta) * frac;
                    let far_normal = if far == 0 {
                        vector_negate(&node.plane.normal)
                    } else {
                        node.plane.normal
                    };
                    // far first so the near fragment pops next
                    self.stack.push(DescentElement {
                        node: node.children[far],
                        a: mid,
                        b: e.b,
                        ta: tm,
                        tb: e.tb,
                        normal: far_normal,
                        op: DescentOp::Split,
                        contains_start: false,
                    });
                    self.stack.push(DescentElement {
                        node: node.children[near],
                        a: e.a,
                        b: mid,
                        ta: e.ta,
                        tb: tm,
                        normal: e.normal,
                        op: DescentOp::Split,
                        contains_start: e.contains_start,
                    });
                }
            }
        }
    }

    // ============================================================
    // Thick volume
    // ============================================================

    /// Next leaf touched by a volume swept along the segment, nearest first.
    pub fn next_volume_leaf<E: PlaneExtent>(
        &mut self,
        tree: &BspTree,
        extent: &E,
    ) -> Option<LeafVisit> {
        loop {
            let e = self.pop_live()?;
            if e.node < 0 {
                return Some(self.visit(&e));
            }

            let node = tree.node(e.node as usize);
            let [emin, emax] = extent.extent(&node.plane.normal);
            let da = node.plane.distance(&e.a);
            let db = node.plane.distance(&e.b);

            let front = thick_child(
                &e,
                node.children[0],
                da + emax,
                db + emax,
                vector_negate(&node.plane.normal),
            );
            let back = thick_child(
                &e,
                node.children[1],
                -(da + emin),
                -(db + emin),
                node.plane.normal,
            );

            // the side holding the start is pushed last
            let (first, last) = if db < da { (back, front) } else { (front, back) };
            if let Some(child) = first {
                self.stack.push(child);
            }
            if let Some(child) = last {
                self.stack.push(child);
            }
        }
    }

    /// Empty-leaf zones within `radius` of `center`, each reported once.
    pub fn zones_in_sphere(
        &mut self,
        tree: &BspTree,
        center: &Vec3,
        radius: f32,
        zones: &mut Vec<i32>,
    ) {
        self.begin(tree, center, center);
        let generation = self.zone_marks.next_generation();
        let extent = SphereExtent(radius);
        while let Some(visit) = self.next_volume_leaf(tree, &extent) {
            let leaf = tree.leaf(visit.leaf);
            if leaf.solid || leaf.zone < 0 {
                continue;
            }
            if self.zone_marks.mark(leaf.zone as usize, generation) {
                zones.push(leaf.zone);
            }
        }
    }
}

/// Restrict `e` to the part of the move that reaches one side of a thick plane.
fn thick_child(
    e: &DescentElement,
    child: i32,
    sa: f32,
    sb: f32,
    entering_normal: Vec3,
) -> Option<DescentElement> {
    match thick_verdict(sa, sb) {
        Verdict::Discard => None,
        Verdict::Copy => Some(DescentElement {
            node: child,
            op: DescentOp::Copy,
            ..*e
        }),
        Verdict::Clip => {
            let frac = sa / (sa - sb);
            let mid = vector_lerp(&e.a, &e.b, frac);
            let tm = e.ta + (e.tb - e.ta) * frac;
            if sa > 0.0 {
                Some(DescentElement {
                    node: child,
                    b: mid,
                    tb: tm,
                    op: DescentOp::Clip,
                    ..*e
                })
            } else {
                Some(DescentElement {
                    node: child,
                    a: mid,
                    ta: tm,
                    normal: entering_normal,
                    op: DescentOp::Clip,
                    contains_start: false,
                    ..*e
                })
            }
        }
    }
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bsp::{leaf_child, BspLeaf, BspNode};
    use crate::hull::BoxHull;
    use crate::shared::{vector_length, vector_subtract, Plane, MAT3_IDENTITY};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// One horizontal plane at z = 0: leaf 0 above, leaf 1 below.
    fn floor_split() -> BspTree {
        BspTree::new(
            vec![BspNode {
                plane: Plane::new([0.0, 0.0, 1.0], 0.0),
                children: [leaf_child(0), leaf_child(1)],
            }],
            vec![
                BspLeaf {
                    zone: 0,
                    ..BspLeaf::default()
                },
                BspLeaf {
                    solid: true,
                    zone: -1,
                    ..BspLeaf::default()
                },
            ],
            Vec::new(),
            0,
        )
        .unwrap()
    }

    fn random_point(rng: &mut StdRng) -> Vec3 {
        [
            rng.gen_range(-20.0..60.0),
            rng.gen_range(-20.0..40.0),
            rng.gen_range(-20.0..40.0),
        ]
    }

    #[test]
    fn test_classify_line() {
        assert_eq!(classify_line(0.0, 0.0), LineStep::Copy);
        assert_eq!(classify_line(-1.0, 0.0), LineStep::Left);
        assert_eq!(classify_line(2.0, 1.0), LineStep::Right);
        assert_eq!(classify_line(1.0, -3.0), LineStep::Split(0.25));
    }

    #[test]
    fn test_thick_verdicts() {
        assert_eq!(thick_verdict(1.0, 2.0), Verdict::Copy);
        assert_eq!(thick_verdict(-1.0, 0.0), Verdict::Discard);
        assert_eq!(thick_verdict(1.0, -1.0), Verdict::Clip);
    }

    #[test]
    fn test_line_split_nearest_first() {
        let tree = floor_split();
        let mut descent = Descent::new();
        descent.begin(&tree, &[0.0, 0.0, 5.0], &[0.0, 0.0, -5.0]);
        let first = descent.next_line_leaf(&tree).unwrap();
        assert_eq!(first.leaf, 0);
        assert!(first.contains_start);
        assert!((first.tb - 0.5).abs() < 1e-6);
        let second = descent.next_line_leaf(&tree).unwrap();
        assert_eq!(second.leaf, 1);
        assert_eq!(second.op, DescentOp::Split);
        assert_eq!(second.normal, [0.0, 0.0, 1.0]);
        assert!(!second.contains_start);
        assert!(descent.next_line_leaf(&tree).is_none());
    }

    #[test]
    fn test_line_descent_reconstructs_segment() {
        let tree = BspTree::from_boxes(&[
            ([0.0, 0.0, 0.0], [10.0, 10.0, 10.0]),
            ([20.0, 0.0, 0.0], [30.0, 10.0, 5.0]),
            ([5.0, 12.0, -4.0], [25.0, 20.0, 2.0]),
        ])
        .unwrap();
        let mut descent = Descent::new();
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..200 {
            let a = random_point(&mut rng);
            let b = random_point(&mut rng);
            descent.begin(&tree, &a, &b);
            let capacity = descent.capacity();

            let mut expect_t = 0.0f32;
            let mut expect_p = a;
            while let Some(visit) = descent.next_line_leaf(&tree) {
                assert!(descent.pending() <= tree.depth() + 1);
                assert_eq!(visit.ta, expect_t);
                assert_eq!(visit.a, expect_p);
                expect_t = visit.tb;
                expect_p = visit.b;

                if vector_length(&vector_subtract(&visit.b, &visit.a)) > 0.01 {
                    let mid = vector_lerp(&visit.a, &visit.b, 0.5);
                    assert_eq!(tree.point_leaf(&mid), visit.leaf);
                }
            }
            assert_eq!(expect_t, 1.0);
            assert_eq!(expect_p, b);
            assert_eq!(descent.capacity(), capacity);
        }
    }

    #[test]
    fn test_cutoff_drops_later_fragments() {
        let tree = floor_split();
        let mut descent = Descent::new();
        descent.begin(&tree, &[0.0, 0.0, 5.0], &[0.0, 0.0, -5.0]);
        let first = descent.next_line_leaf(&tree).unwrap();
        descent.set_cutoff(first.ta);
        assert!(descent.next_line_leaf(&tree).is_none());
    }

    #[test]
    fn test_volume_descent_order_and_entry() {
        let tree = floor_split();
        let hull = Hull::Box(BoxHull::new([-1.0; 3], [1.0; 3]));
        let extent = HullExtent {
            hull: &hull,
            orientation: &MAT3_IDENTITY,
        };
        let mut descent = Descent::new();
        descent.begin(&tree, &[0.0, 0.0, 5.0], &[0.0, 0.0, -5.0]);

        let first = descent.next_volume_leaf(&tree, &extent).unwrap();
        assert_eq!(first.leaf, 0);
        assert!(first.contains_start);
        assert!((first.tb - 0.6).abs() < 1e-6);

        let second = descent.next_volume_leaf(&tree, &extent).unwrap();
        assert_eq!(second.leaf, 1);
        assert_eq!(second.op, DescentOp::Clip);
        assert!((second.ta - 0.4).abs() < 1e-6);
        assert_eq!(second.normal, [0.0, 0.0, 1.0]);
        assert!(!second.contains_start);
        assert!(descent.next_volume_leaf(&tree, &extent).is_none());
        assert_eq!(descent.stats.leafs, 2);
    }

    #[test]
    fn test_volume_straddling_copies_both_sides() {
        let tree = floor_split();
        let mut descent = Descent::new();
        descent.begin(&tree, &[0.0, 0.0, 0.5], &[3.0, 0.0, 0.5]);
        let mut leaves = Vec::new();
        while let Some(visit) = descent.next_volume_leaf(&tree, &SphereExtent(1.0)) {
            assert_eq!(visit.op, DescentOp::Copy);
            leaves.push(visit.leaf);
        }
        leaves.sort();
        assert_eq!(leaves, vec![0, 1]);
    }

    #[test]
    fn test_zones_in_sphere() {
        let tree = BspTree::from_boxes(&[([0.0; 3], [10.0; 3])]).unwrap();
        let mut descent = Descent::new();

        let mut zones = Vec::new();
        descent.zones_in_sphere(&tree, &[5.0, 5.0, 15.0], 1.0, &mut zones);
        assert_eq!(zones, vec![4]);

        zones.clear();
        descent.zones_in_sphere(&tree, &[5.0, 5.0, 15.0], 12.0, &mut zones);
        zones.sort();
        assert_eq!(zones, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_zones_reported_once() {
        let tree = BspTree::new(
            vec![BspNode {
                plane: Plane::new([1.0, 0.0, 0.0], 0.0),
                children: [leaf_child(0), leaf_child(1)],
            }],
            vec![
                BspLeaf {
                    zone: 7,
                    ..BspLeaf::default()
                },
                BspLeaf {
                    zone: 7,
                    ..BspLeaf::default()
                },
            ],
            Vec::new(),
            0,
        )
        .unwrap();
        assert_eq!(tree.zone_count(), 8);
        let mut descent = Descent::new();
        let mut zones = Vec::new();
        descent.zones_in_sphere(&tree, &[0.0; 3], 2.0, &mut zones);
        assert_eq!(zones, vec![7]);
    }

    #[test]
    fn test_first_visit_marks_per_descent() {
        let tree = floor_split();
        let mut descent = Descent::new();
        descent.begin(&tree, &[0.0; 3], &[1.0, 0.0, 0.0]);
        assert!(descent.first_visit(1));
        assert!(!descent.first_visit(1));
        descent.begin(&tree, &[0.0; 3], &[1.0, 0.0, 0.0]);
        assert!(descent.first_visit(1));
    }
}
