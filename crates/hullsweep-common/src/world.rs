// world.rs — Top-level test entry over the static tree, alternate tree and entities

use crate::bsp::BspTree;
use crate::descent::{Descent, HullExtent, LeafVisit};
use crate::hull::{span, Hull};
use crate::sat::collide;
use crate::shared::{
    bounds_overlap, dot_product, EntityId, Mat3, Plane, SourceMask, Trace, Vec3, MAT3_IDENTITY,
};

/// A dynamic solid placed in the world.
#[derive(Debug, Clone, Copy)]
pub struct Solid<'a> {
    pub id: EntityId,
    pub hull: &'a Hull,
    pub origin: Vec3,
    pub orientation: Mat3,
}

impl<'a> Solid<'a> {
    pub fn new(id: EntityId, hull: &'a Hull, origin: Vec3) -> Self {
        Self {
            id,
            hull,
            origin,
            orientation: MAT3_IDENTITY,
        }
    }
}

/// Per-call selection of what a test may collide with.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceFilter<'a> {
    pub ignore: &'a [EntityId],
    pub mask: SourceMask,
}

impl<'a> TraceFilter<'a> {
    pub fn new(ignore: &'a [EntityId], mask: SourceMask) -> Self {
        Self { ignore, mask }
    }

    pub fn ignoring(ignore: &'a [EntityId]) -> Self {
        Self {
            ignore,
            mask: SourceMask::default(),
        }
    }
}

/// Collision sources for one simulation step. Trees are shared and immutable; the entity
/// list is rebuilt by scene code between ticks.
#[derive(Debug, Clone)]
pub struct CollisionWorld<'a> {
    pub tree: &'a BspTree,
    pub alternate: Option<&'a BspTree>,
    pub solids: Vec<Solid<'a>>,
}

impl<'a> CollisionWorld<'a> {
    pub fn new(tree: &'a BspTree) -> Self {
        Self {
            tree,
            alternate: None,
            solids: Vec::new(),
        }
    }

    pub fn add_solid(&mut self, solid: Solid<'a>) {
        self.solids.push(solid);
    }

    /// Sweep a zero-size point from `a` to `b`.
    pub fn test_line(
        &self,
        descent: &mut Descent,
        a: &Vec3,
        b: &Vec3,
        filter: &TraceFilter,
    ) -> Trace {
        let point = Hull::point();
        self.test_hull(descent, &point, &MAT3_IDENTITY, a, b, filter)
    }

    /// Sweep `hull` from `a` to `b` through every source selected by `filter`.
    /// The best result wins: intersections over hits, deeper over shallower, earlier
    /// over later.
    pub fn test_hull(
        &self,
        descent: &mut Descent,
        hull: &Hull,
        orientation: &Mat3,
        a: &Vec3,
        b: &Vec3,
        filter: &TraceFilter,
    ) -> Trace {
        let mut best = Trace::none();

        if filter.mask.contains(SourceMask::STATIC) {
            best = trace_tree(self.tree, descent, hull, orientation, a, b);
        }

        if filter.mask.contains(SourceMask::ALTERNATE) && !best.is_intersect() {
            if let Some(alternate) = self.alternate {
                let trace = trace_tree(alternate, descent, hull, orientation, a, b);
                if trace.is_better_than(&best) {
                    best = trace;
                }
            }
        }

        if filter.mask.contains(SourceMask::DYNAMIC) && !best.is_intersect() {
            let trace = self.trace_solids(descent, hull, orientation, a, b, filter.ignore);
            if trace.is_better_than(&best) {
                best = trace;
            }
        }

        log::trace!(
            "trace {:?}: {} leafs, {} narrow tests so far",
            best.contact,
            descent.stats.leafs,
            descent.stats.narrow_tests
        );
        best
    }

    fn trace_solids(
        &self,
        descent: &mut Descent,
        hull: &Hull,
        orientation: &Mat3,
        a: &Vec3,
        b: &Vec3,
        ignore: &[EntityId],
    ) -> Trace {
        let (boxmins, boxmaxs) = trace_bounds(hull, orientation, a, b);
        let mut best = Trace::none();

        for solid in &self.solids {
            if ignore.contains(&solid.id) {
                continue;
            }
            let (mins, maxs) = solid.hull.world_bounds(&solid.origin, &solid.orientation);
            if !bounds_overlap(&boxmins, &boxmaxs, &mins, &maxs) {
                continue;
            }

            // might intersect, so do an exact test
            descent.stats.narrow_tests += 1;
            let mut trace = collide(
                hull,
                orientation,
                a,
                b,
                solid.hull,
                &solid.origin,
                &solid.orientation,
            );
            if trace.is_none() {
                continue;
            }
            trace.entity = Some(solid.id);
            if trace.is_better_than(&best) {
                best = trace;
            }
        }
        best
    }
}

/// Box enclosing the whole move, padded by one unit.
pub fn trace_bounds(hull: &Hull, orientation: &Mat3, start: &Vec3, end: &Vec3) -> (Vec3, Vec3) {
    let (mins, maxs) = hull.world_bounds(&[0.0; 3], orientation);
    let mut boxmins = [0.0f32; 3];
    let mut boxmaxs = [0.0f32; 3];
    for i in 0..3 {
        if end[i] > start[i] {
            boxmins[i] = start[i] + mins[i] - 1.0;
            boxmaxs[i] = end[i] + maxs[i] + 1.0;
        } else {
            boxmins[i] = end[i] + mins[i] - 1.0;
            boxmaxs[i] = start[i] + maxs[i] + 1.0;
        }
    }
    (boxmins, boxmaxs)
}

// ============================================================
// Static tree
// ============================================================

fn is_point(hull: &Hull) -> bool {
    matches!(hull, Hull::Box(b) if b.is_point())
}

fn trace_tree(
    tree: &BspTree,
    descent: &mut Descent,
    hull: &Hull,
    orientation: &Mat3,
    a: &Vec3,
    b: &Vec3,
) -> Trace {
    let point = is_point(hull);
    let extent = HullExtent { hull, orientation };
    let mut best = Trace::none();

    descent.begin(tree, a, b);
    loop {
        let visit = if point {
            descent.next_line_leaf(tree)
        } else {
            descent.next_volume_leaf(tree, &extent)
        };
        let Some(visit) = visit else {
            break;
        };

        if !tree.leaf(visit.leaf).solid {
            continue;
        }

        let bevels = tree.leaf_bevels(visit.leaf);
        let trace = if bevels.is_empty() {
            bare_leaf_contact(&visit)
        } else if descent.first_visit(visit.leaf) {
            descent.stats.narrow_tests += 1;
            clip_to_bevels(bevels, hull, orientation, a, b)
        } else {
            continue;
        };

        if trace.is_better_than(&best) {
            best = trace;
            if best.is_intersect() {
                break;
            }
            descent.set_cutoff(best.time_first);
        }
    }
    best
}

/// Solid leaf without bevel planes: contact where the fragment entered.
fn bare_leaf_contact(visit: &LeafVisit) -> Trace {
    if visit.contains_start {
        Trace::intersect(0.0, visit.normal)
    } else {
        Trace::hit(visit.ta, visit.tb, visit.normal)
    }
}

/// Clip the whole move against a solid cell's bevel planes, each pushed out by the
/// hull's extent along its normal.
fn clip_to_bevels(planes: &[Plane], hull: &Hull, orientation: &Mat3, a: &Vec3, b: &Vec3) -> Trace {
    let mut enterfrac: f32 = -1.0;
    let mut leavefrac: f32 = 1.0;
    let mut clip_normal = [0.0f32; 3];
    let mut startout = false;
    let mut shallow_depth = f32::INFINITY;
    let mut shallow_normal = [0.0f32; 3];

    for plane in planes {
        let [emin, _] = span(hull, orientation, &plane.normal);
        let dist = plane.dist - emin;

        let d1 = dot_product(a, &plane.normal) - dist;
        let d2 = dot_product(b, &plane.normal) - dist;

        if d1 > 0.0 {
            startout = true;
        } else if -d1 < shallow_depth {
            shallow_depth = -d1;
            shallow_normal = plane.normal;
        }

        // completely in front of this face, no contact
        if d1 > 0.0 && d2 >= d1 {
            return Trace::none();
        }
        if d1 <= 0.0 && d2 <= 0.0 {
            continue;
        }

        let f = d1 / (d1 - d2);
        if d1 > d2 {
            if f > enterfrac {
                enterfrac = f;
                clip_normal = plane.normal;
            }
        } else if f < leavefrac {
            leavefrac = f;
        }
    }

    if !startout {
        return Trace::intersect(shallow_depth, shallow_normal);
    }

    if enterfrac < leavefrac && enterfrac >= 0.0 && enterfrac <= 1.0 {
        return Trace::hit(enterfrac, leavefrac, clip_normal);
    }
    Trace::none()
}

// ============================================================
// Tracer seam
// ============================================================

/// Anything movement code can sweep a hull through.
pub trait Tracer {
    fn trace(&mut self, hull: &Hull, orientation: &Mat3, start: &Vec3, end: &Vec3) -> Trace;
}

/// Binds a world, a descent context and a per-call filter into a [`Tracer`].
pub struct WorldTracer<'w, 'a> {
    pub world: &'w CollisionWorld<'a>,
    pub descent: &'w mut Descent,
    pub filter: TraceFilter<'w>,
}

impl Tracer for WorldTracer<'_, '_> {
    fn trace(&mut self, hull: &Hull, orientation: &Mat3, start: &Vec3, end: &Vec3) -> Trace {
        self.world
            .test_hull(self.descent, hull, orientation, start, end, &self.filter)
    }
}

// ============================================================
// Tests
// ============================================================
