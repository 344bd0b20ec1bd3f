// hull.rs — Collision hull variants and axis span queries

use std::cell::Cell;

use rayon::prelude::*;

use crate::shared::{
    add_point_to_bounds, cross_product, dot_product, mat3_is_identity, rotate_vector,
    unrotate_vector, vector_is_finite, vector_length, vector_negate, vector_normalize,
    vector_scale, Mat3, Vec3, AXES, AXIS_DEDUP_SCALE, VEC3_ORIGIN,
};

/// Hulls with at most this many vertices are projected by a plain scan
/// instead of hill-climbing.
pub const LINEAR_SCAN_MAX_VERTS: usize = 16;

/// Parallel threshold for span precomputation - below this count, sequential is faster
const PARALLEL_SPAN_THRESHOLD: usize = 64;

// ============================================================
// Generation marks
// ============================================================

/// Per-element "visited" marks cleared in O(1) by bumping a generation counter.
///
/// Marks live in `Cell`s so that span queries can climb a shared hull through `&self`.
/// When the counter would overflow every mark is reset in one O(n) pass.
#[derive(Debug, Clone, Default)]
pub struct GenerationMarks {
    marks: Vec<Cell<u32>>,
    generation: Cell<u32>,
}

impl GenerationMarks {
    pub fn new(len: usize) -> Self {
        Self {
            marks: vec![Cell::new(0); len],
            generation: Cell::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    /// Grow (never shrink) the mark array. New entries start unmarked.
    pub fn ensure_len(&mut self, len: usize) {
        if self.marks.len() < len {
            self.marks.resize(len, Cell::new(0));
        }
    }

    /// Start a new visit. Every element is unmarked for the returned generation.
    pub fn next_generation(&self) -> u32 {
        let g = self.generation.get();
        if g == u32::MAX {
            for m in &self.marks {
                m.set(0);
            }
            self.generation.set(1);
            return 1;
        }
        self.generation.set(g + 1);
        g + 1
    }

    /// Mark element `i`; returns false if it was already marked this generation.
    #[inline]
    pub fn mark(&self, i: usize, generation: u32) -> bool {
        let m = &self.marks[i];
        if m.get() == generation {
            return false;
        }
        m.set(generation);
        true
    }

    #[inline]
    pub fn is_marked(&self, i: usize, generation: u32) -> bool {
        self.marks[i].get() == generation
    }

    pub(crate) fn set_generation(&self, generation: u32) {
        self.generation.set(generation);
    }
}

// ============================================================
// Box
// ============================================================

/// Axis-aligned (in its local frame) box relative to the hull origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxHull {
    pub mins: Vec3,
    pub maxs: Vec3,
}

impl BoxHull {
    pub fn new(mins: Vec3, maxs: Vec3) -> Self {
        let mut b = Self {
            mins: VEC3_ORIGIN,
            maxs: VEC3_ORIGIN,
        };
        b.resize(mins, maxs);
        b
    }

    /// Zero-size hull used for line tests.
    pub fn point() -> Self {
        Self {
            mins: VEC3_ORIGIN,
            maxs: VEC3_ORIGIN,
        }
    }

    pub fn is_point(&self) -> bool {
        self.mins == VEC3_ORIGIN && self.maxs == VEC3_ORIGIN
    }

    /// Replace the extents, swapping any inverted component pair.
    pub fn resize(&mut self, mins: Vec3, maxs: Vec3) {
        for i in 0..3 {
            self.mins[i] = mins[i].min(maxs[i]);
            self.maxs[i] = mins[i].max(maxs[i]);
        }
    }

    /// Projection onto a local-space axis.
    ///
    /// The sign pattern of the axis selects the extreme corners directly; bit `i` of the
    /// code is set when component `i` is negative.
    pub fn span_local(&self, axis: &Vec3) -> [f32; 2] {
        let (n, lo, hi) = (axis, &self.mins, &self.maxs);
        let code = (axis[0] < 0.0) as u8 | ((axis[1] < 0.0) as u8) << 1 | ((axis[2] < 0.0) as u8) << 2;
        match code {
            0 => [
                n[0] * lo[0] + n[1] * lo[1] + n[2] * lo[2],
                n[0] * hi[0] + n[1] * hi[1] + n[2] * hi[2],
            ],
            1 => [
                n[0] * hi[0] + n[1] * lo[1] + n[2] * lo[2],
                n[0] * lo[0] + n[1] * hi[1] + n[2] * hi[2],
            ],
            2 => [
                n[0] * lo[0] + n[1] * hi[1] + n[2] * lo[2],
                n[0] * hi[0] + n[1] * lo[1] + n[2] * hi[2],
            ],
            3 => [
                n[0] * hi[0] + n[1] * hi[1] + n[2] * lo[2],
                n[0] * lo[0] + n[1] * lo[1] + n[2] * hi[2],
            ],
            4 => [
                n[0] * lo[0] + n[1] * lo[1] + n[2] * hi[2],
                n[0] * hi[0] + n[1] * hi[1] + n[2] * lo[2],
            ],
            5 => [
                n[0] * hi[0] + n[1] * lo[1] + n[2] * hi[2],
                n[0] * lo[0] + n[1] * hi[1] + n[2] * lo[2],
            ],
            6 => [
                n[0] * lo[0] + n[1] * hi[1] + n[2] * hi[2],
                n[0] * hi[0] + n[1] * lo[1] + n[2] * lo[2],
            ],
            _ => [
                n[0] * hi[0] + n[1] * hi[1] + n[2] * hi[2],
                n[0] * lo[0] + n[1] * lo[1] + n[2] * lo[2],
            ],
        }
    }
}

// ============================================================
// Convex
// ============================================================

/// Loader-side description of a convex hull. Produced by the hull authoring step.
#[derive(Debug, Clone, Default)]
pub struct HullData {
    pub vertices: Vec<Vec3>,
    /// `adjacency[v]` lists the vertices sharing an edge with `v`.
    pub adjacency: Vec<Vec<u32>>,
    pub normal_axes: Vec<Vec3>,
    pub edge_axes: Vec<Vec3>,
    /// Optional `[min, max]` projections matching `normal_axes` one for one.
    pub normal_spans: Option<Vec<[f32; 2]>>,
}

/// Convex polytope: vertex array with an index-based adjacency graph, deduplicated
/// separating-axis candidates and a cache of the projection onto each face normal.
#[derive(Debug, Clone)]
pub struct ConvexHull {
    vertices: Vec<Vec3>,
    /// Neighbors of vertex `v` are `adjacency[adjacency_start[v]..adjacency_start[v + 1]]`.
    adjacency_start: Vec<u32>,
    adjacency: Vec<u32>,
    normal_axes: Vec<Vec3>,
    edge_axes: Vec<Vec3>,
    normal_spans: Vec<[f32; 2]>,
    mins: Vec3,
    maxs: Vec3,
    marks: GenerationMarks,
}

impl ConvexHull {
    pub fn new(
        vertices: Vec<Vec3>,
        adjacency: Vec<Vec<u32>>,
        normal_axes: Vec<Vec3>,
        edge_axes: Vec<Vec3>,
    ) -> Self {
        Self::from_data(HullData {
            vertices,
            adjacency,
            normal_axes,
            edge_axes,
            normal_spans: None,
        })
    }

    /// Build from loader data. Degenerate input falls back to a one-vertex hull.
    pub fn from_data(data: HullData) -> Self {
        if let Some(reason) = Self::degenerate_reason(&data) {
            log::warn!("degenerate convex hull ({reason}), using a point hull");
            let origin = data
                .vertices
                .first()
                .copied()
                .filter(vector_is_finite)
                .unwrap_or(VEC3_ORIGIN);
            return Self::trivial(origin);
        }

        let HullData {
            vertices,
            adjacency,
            normal_axes,
            edge_axes,
            normal_spans,
        } = data;

        let supplied_axes = normal_axes.len();
        let magnitude = vertices
            .iter()
            .flat_map(|v| v.iter())
            .fold(1.0f32, |m, c| m.max(c.abs()));
        let epsilon = AXIS_DEDUP_SCALE * magnitude;

        let (normal_axes, kept) = dedup_axes(&normal_axes, epsilon);
        let (edge_axes, _) = dedup_axes(&edge_axes, epsilon);

        let mut adjacency_start = Vec::with_capacity(vertices.len() + 1);
        let mut flat = Vec::new();
        for neighbors in &adjacency {
            adjacency_start.push(flat.len() as u32);
            flat.extend_from_slice(neighbors);
        }
        adjacency_start.push(flat.len() as u32);

        let mut mins = [f32::MAX; 3];
        let mut maxs = [f32::MIN; 3];
        for v in &vertices {
            add_point_to_bounds(v, &mut mins, &mut maxs);
        }

        let marks = GenerationMarks::new(vertices.len());
        let mut hull = Self {
            vertices,
            adjacency_start,
            adjacency: flat,
            normal_axes,
            edge_axes,
            normal_spans: Vec::new(),
            mins,
            maxs,
            marks,
        };

        hull.normal_spans = match normal_spans {
            Some(spans) if spans.len() == supplied_axes => kept
                .iter()
                .map(|&(src, length)| [spans[src][0] / length, spans[src][1] / length])
                .collect(),
            _ => hull.compute_normal_spans(),
        };
        hull
    }

    /// One vertex, one axis: the fallback for unusable input.
    pub fn trivial(origin: Vec3) -> Self {
        Self {
            vertices: vec![origin],
            adjacency_start: vec![0, 0],
            adjacency: Vec::new(),
            normal_axes: vec![AXES[0]],
            edge_axes: Vec::new(),
            normal_spans: vec![[origin[0], origin[0]]],
            mins: origin,
            maxs: origin,
            marks: GenerationMarks::new(1),
        }
    }

    /// Box topology as a convex hull. Vertex `i` takes `maxs[k]` when bit `k` of `i` is set,
    /// so neighbors differ in exactly one bit.
    pub fn from_box(mins: Vec3, maxs: Vec3) -> Self {
        let vertices = (0..8)
            .map(|i| {
                [
                    if i & 1 != 0 { maxs[0] } else { mins[0] },
                    if i & 2 != 0 { maxs[1] } else { mins[1] },
                    if i & 4 != 0 { maxs[2] } else { mins[2] },
                ]
            })
            .collect();
        Self::new(vertices, box_adjacency(), AXES.to_vec(), AXES.to_vec())
    }

    /// View frustum looking down local +x with +z up.
    ///
    /// `fov_y` is the full vertical field of view in radians, `aspect` is width over height.
    pub fn frustum(fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        let th = (fov_y * 0.5).tan();
        let tw = th * aspect;

        // bit 0: +y side, bit 1: +z side, bit 2: far plane
        let vertices = (0..8)
            .map(|i| {
                let d = if i & 4 != 0 { far } else { near };
                let y = if i & 1 != 0 { d * tw } else { -d * tw };
                let z = if i & 2 != 0 { d * th } else { -d * th };
                [d, y, z]
            })
            .collect();

        let normal_axes = vec![
            AXES[0],
            [-tw, 1.0, 0.0],
            [-tw, -1.0, 0.0],
            [-th, 0.0, 1.0],
            [-th, 0.0, -1.0],
        ];
        let edge_axes = vec![
            AXES[1],
            AXES[2],
            [1.0, tw, th],
            [1.0, -tw, th],
            [1.0, tw, -th],
            [1.0, -tw, -th],
        ];
        Self::new(vertices, box_adjacency(), normal_axes, edge_axes)
    }

    /// Re-derive a frustum hull in place from new view parameters.
    pub fn reshape_frustum(&mut self, fov_y: f32, aspect: f32, near: f32, far: f32) {
        *self = Self::frustum(fov_y, aspect, near, far);
    }

    fn degenerate_reason(data: &HullData) -> Option<&'static str> {
        if data.vertices.is_empty() {
            return Some("no vertices");
        }
        if !data.vertices.iter().all(vector_is_finite) {
            return Some("non-finite vertex");
        }
        if data.adjacency.len() != data.vertices.len() {
            return Some("adjacency does not match vertex count");
        }
        let n = data.vertices.len() as u32;
        if data.adjacency.iter().flatten().any(|&v| v >= n) {
            return Some("adjacency index out of range");
        }
        if !data
            .normal_axes
            .iter()
            .any(|a| vector_is_finite(a) && vector_length(a) > 0.0)
        {
            return Some("no usable normal axis");
        }
        None
    }

    fn compute_normal_spans(&self) -> Vec<[f32; 2]> {
        // the marks are Cell-based, so only the vertex slice may cross threads
        let vertices = &self.vertices;
        if self.normal_axes.len() >= PARALLEL_SPAN_THRESHOLD {
            self.normal_axes
                .par_iter()
                .map(|axis| scan_span(vertices, axis))
                .collect()
        } else {
            self.normal_axes
                .iter()
                .map(|axis| scan_span(vertices, axis))
                .collect()
        }
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn neighbors(&self, v: usize) -> &[u32] {
        let start = self.adjacency_start[v] as usize;
        let end = self.adjacency_start[v + 1] as usize;
        &self.adjacency[start..end]
    }

    pub fn normal_axes(&self) -> &[Vec3] {
        &self.normal_axes
    }

    pub fn edge_axes(&self) -> &[Vec3] {
        &self.edge_axes
    }

    pub fn normal_spans(&self) -> &[[f32; 2]] {
        &self.normal_spans
    }

    pub fn bounds(&self) -> (Vec3, Vec3) {
        (self.mins, self.maxs)
    }

    /// Projection onto a local-space axis.
    pub fn span_local(&self, axis: &Vec3) -> [f32; 2] {
        if self.vertices.len() <= LINEAR_SCAN_MAX_VERTS {
            return scan_span(&self.vertices, axis);
        }
        let max = self.climb(axis);
        let min = -self.climb(&vector_negate(axis));
        [min, max]
    }

    /// Largest `axis · v` over the hull, found by walking uphill through the adjacency
    /// graph. Convexity makes the first local maximum the global one.
    fn climb(&self, axis: &Vec3) -> f32 {
        let generation = self.marks.next_generation();
        let mut best = 0usize;
        let mut best_d = dot_product(&self.vertices[0], axis);
        self.marks.mark(0, generation);

        loop {
            let current = best;
            for &n in self.neighbors(current) {
                let n = n as usize;
                if !self.marks.mark(n, generation) {
                    continue;
                }
                let d = dot_product(&self.vertices[n], axis);
                if d > best_d {
                    best_d = d;
                    best = n;
                }
            }
            if best == current {
                return best_d;
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn marks(&self) -> &GenerationMarks {
        &self.marks
    }
}

fn box_adjacency() -> Vec<Vec<u32>> {
    (0u32..8).map(|i| vec![i ^ 1, i ^ 2, i ^ 4]).collect()
}

fn scan_span(vertices: &[Vec3], axis: &Vec3) -> [f32; 2] {
    let mut min = f32::MAX;
    let mut max = f32::MIN;
    for v in vertices {
        let d = dot_product(v, axis);
        min = min.min(d);
        max = max.max(d);
    }
    [min, max]
}

/// Normalize and drop zero-length or (anti)parallel repeats.
/// Returns the kept unit axes and, for each, its source index and original length.
fn dedup_axes(axes: &[Vec3], epsilon: f32) -> (Vec<Vec3>, Vec<(usize, f32)>) {
    let mut out: Vec<Vec3> = Vec::with_capacity(axes.len());
    let mut kept = Vec::with_capacity(axes.len());
    for (i, axis) in axes.iter().enumerate() {
        if !vector_is_finite(axis) {
            continue;
        }
        let mut unit = *axis;
        let length = vector_normalize(&mut unit);
        if length <= epsilon {
            continue;
        }
        let duplicate = out
            .iter()
            .any(|u| vector_length(&cross_product(u, &unit)) <= epsilon);
        if !duplicate {
            out.push(unit);
            kept.push((i, length));
        }
    }
    (out, kept)
}

// ============================================================
// Hull
// ============================================================

#[derive(Debug, Clone)]
pub enum Hull {
    Box(BoxHull),
    Convex(ConvexHull),
}

impl Hull {
    pub fn point() -> Self {
        Hull::Box(BoxHull::point())
    }

    pub fn span_local(&self, axis: &Vec3) -> [f32; 2] {
        match self {
            Hull::Box(b) => b.span_local(axis),
            Hull::Convex(c) => c.span_local(axis),
        }
    }

    /// Local face normals.
    pub fn normal_axes(&self) -> &[Vec3] {
        match self {
            Hull::Box(_) => &AXES,
            Hull::Convex(c) => c.normal_axes(),
        }
    }

    /// Local edge directions.
    pub fn edge_axes(&self) -> &[Vec3] {
        match self {
            Hull::Box(_) => &AXES,
            Hull::Convex(c) => c.edge_axes(),
        }
    }

    /// Cached projection onto local normal axis `i`.
    #[inline]
    pub fn normal_span(&self, i: usize) -> [f32; 2] {
        match self {
            Hull::Box(b) => [b.mins[i], b.maxs[i]],
            Hull::Convex(c) => c.normal_spans[i],
        }
    }

    pub fn bounds(&self) -> (Vec3, Vec3) {
        match self {
            Hull::Box(b) => (b.mins, b.maxs),
            Hull::Convex(c) => c.bounds(),
        }
    }

    /// World-space bounds of the hull placed at `origin` with `orientation`.
    pub fn world_bounds(&self, origin: &Vec3, orientation: &Mat3) -> (Vec3, Vec3) {
        let (mins, maxs) = self.bounds();
        let mut wmins = [0.0f32; 3];
        let mut wmaxs = [0.0f32; 3];
        if mat3_is_identity(orientation) {
            for i in 0..3 {
                wmins[i] = origin[i] + mins[i];
                wmaxs[i] = origin[i] + maxs[i];
            }
            return (wmins, wmaxs);
        }
        let center = vector_scale(
            &[mins[0] + maxs[0], mins[1] + maxs[1], mins[2] + maxs[2]],
            0.5,
        );
        let half = vector_scale(
            &[maxs[0] - mins[0], maxs[1] - mins[1], maxs[2] - mins[2]],
            0.5,
        );
        let wc = rotate_vector(orientation, &center);
        for i in 0..3 {
            let r = orientation[i][0].abs() * half[0]
                + orientation[i][1].abs() * half[1]
                + orientation[i][2].abs() * half[2];
            wmins[i] = origin[i] + wc[i] - r;
            wmaxs[i] = origin[i] + wc[i] + r;
        }
        (wmins, wmaxs)
    }
}

/// Projection of `hull` with `orientation` onto a world-space `axis`, relative to the
/// hull origin.
#[inline]
pub fn span(hull: &Hull, orientation: &Mat3, axis: &Vec3) -> [f32; 2] {
    if mat3_is_identity(orientation) {
        hull.span_local(axis)
    } else {
        hull.span_local(&unrotate_vector(orientation, axis))
    }
}

// ============================================================
// Tests
// ============================================================
