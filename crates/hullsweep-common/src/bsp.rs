// bsp.rs — Immutable BSP tree: nodes, leaves, bevel planes, point and box queries

use thiserror::Error;

use crate::shared::{vector_is_finite, vector_length, Plane, PortalExits, Vec3};

/// Trees deeper than this are rejected at load time.
pub const MAX_TREE_DEPTH: usize = 1024;

/// Internal node. `children[0]` is the front (positive) side, `children[1]` the back.
/// Negative children are leaves: leaf `n` is stored as `-1 - n`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BspNode {
    pub plane: Plane,
    pub children: [i32; 2],
}

/// Solid leaves should carry bevel planes. Without them a start inside the leaf
/// reports an intersection with no push-out direction.
#[derive(Debug, Clone, Copy, Default)]
pub struct BspLeaf {
    pub solid: bool,
    /// Zone (cluster) of an empty leaf; -1 for solid leaves.
    pub zone: i32,
    pub first_bevel: u32,
    pub num_bevels: u32,
    pub portal_exits: PortalExits,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TreeError {
    #[error("node {node} child {child} is out of range")]
    ChildOutOfRange { node: usize, child: i32 },
    #[error("node {node} has a non-finite or zero-length plane normal")]
    BadPlane { node: usize },
    #[error("leaf {leaf} bevel range is out of range or malformed")]
    BadBevels { leaf: usize },
    #[error("node {node} is reachable more than once")]
    NodeRevisited { node: usize },
    #[error("tree depth exceeds {}", MAX_TREE_DEPTH)]
    TooDeep,
    #[error("root {0} is out of range")]
    BadRoot(i32),
}

#[inline]
pub fn leaf_child(leafnum: usize) -> i32 {
    -1 - leafnum as i32
}

#[inline]
pub fn child_leafnum(child: i32) -> usize {
    (-1 - child) as usize
}

#[derive(Debug, Clone)]
pub struct BspTree {
    nodes: Vec<BspNode>,
    leaves: Vec<BspLeaf>,
    bevels: Vec<Plane>,
    root: i32,
    depth: usize,
    zone_count: usize,
}

impl BspTree {
    /// Validate and take ownership of loaded tree data.
    pub fn new(
        nodes: Vec<BspNode>,
        leaves: Vec<BspLeaf>,
        bevels: Vec<Plane>,
        root: i32,
    ) -> Result<Self, TreeError> {
        let num_nodes = nodes.len() as i64;
        let num_leaves = leaves.len() as i64;
        let child_ok = |c: i32| {
            if c >= 0 {
                (c as i64) < num_nodes
            } else {
                (-1 - c as i64) < num_leaves
            }
        };

        if !child_ok(root) {
            return Err(TreeError::BadRoot(root));
        }

        for (i, node) in nodes.iter().enumerate() {
            if !vector_is_finite(&node.plane.normal)
                || !node.plane.dist.is_finite()
                || vector_length(&node.plane.normal) == 0.0
            {
                return Err(TreeError::BadPlane { node: i });
            }
            for &child in &node.children {
                if !child_ok(child) {
                    return Err(TreeError::ChildOutOfRange { node: i, child });
                }
            }
        }

        for (i, leaf) in leaves.iter().enumerate() {
            let end = leaf.first_bevel as usize + leaf.num_bevels as usize;
            if end > bevels.len() {
                return Err(TreeError::BadBevels { leaf: i });
            }
            let planes = &bevels[leaf.first_bevel as usize..end];
            if planes
                .iter()
                .any(|p| !vector_is_finite(&p.normal) || !p.dist.is_finite())
            {
                return Err(TreeError::BadBevels { leaf: i });
            }
        }

        let depth = Self::measure_depth(&nodes, root)?;
        let zone_count = leaves
            .iter()
            .filter(|l| !l.solid && l.zone >= 0)
            .map(|l| l.zone as usize + 1)
            .max()
            .unwrap_or(0);

        Ok(Self {
            nodes,
            leaves,
            bevels,
            root,
            depth,
            zone_count,
        })
    }

    /// Iterative walk from the root; every node must be reached exactly once.
    fn measure_depth(nodes: &[BspNode], root: i32) -> Result<usize, TreeError> {
        if root < 0 {
            return Ok(0);
        }
        let mut seen = vec![false; nodes.len()];
        let mut stack = vec![(root as usize, 1usize)];
        let mut depth = 0;
        while let Some((num, d)) = stack.pop() {
            if d > MAX_TREE_DEPTH {
                return Err(TreeError::TooDeep);
            }
            if seen[num] {
                return Err(TreeError::NodeRevisited { node: num });
            }
            seen[num] = true;
            depth = depth.max(d);
            for &child in &nodes[num].children {
                if child >= 0 {
                    stack.push((child as usize, d + 1));
                }
            }
        }
        Ok(depth)
    }

    /// A tree with no nodes: everything is one leaf.
    pub fn single_leaf(solid: bool) -> Self {
        Self {
            nodes: Vec::new(),
            leaves: vec![BspLeaf {
                solid,
                zone: if solid { -1 } else { 0 },
                ..BspLeaf::default()
            }],
            bevels: Vec::new(),
            root: leaf_child(0),
            depth: 0,
            zone_count: if solid { 0 } else { 1 },
        }
    }

    /// Build a tree whose solid space is the union of axis-aligned boxes.
    ///
    /// Each solid leaf carries its box's six faces as bevel planes.
    pub fn from_boxes(boxes: &[(Vec3, Vec3)]) -> Result<Self, TreeError> {
        let mut builder = BoxTreeBuilder {
            boxes,
            nodes: Vec::new(),
            leaves: Vec::new(),
            bevels: Vec::new(),
            zones: 0,
        };
        let all: Vec<usize> = (0..boxes.len()).collect();
        let root = builder.build(&all);
        Self::new(builder.nodes, builder.leaves, builder.bevels, root)
    }

    pub fn root(&self) -> i32 {
        self.root
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn zone_count(&self) -> usize {
        self.zone_count
    }

    pub fn nodes(&self) -> &[BspNode] {
        &self.nodes
    }

    pub fn leaves(&self) -> &[BspLeaf] {
        &self.leaves
    }

    #[inline]
    pub fn node(&self, num: usize) -> &BspNode {
        &self.nodes[num]
    }

    #[inline]
    pub fn leaf(&self, num: usize) -> &BspLeaf {
        &self.leaves[num]
    }

    pub fn leaf_bevels(&self, num: usize) -> &[Plane] {
        let leaf = &self.leaves[num];
        let start = leaf.first_bevel as usize;
        &self.bevels[start..start + leaf.num_bevels as usize]
    }

    // ============================================================
    // Point / leaf queries
    // ============================================================

    pub fn point_leaf(&self, p: &Vec3) -> usize {
        let mut num = self.root;
        while num >= 0 {
            let node = &self.nodes[num as usize];
            num = if node.plane.distance(p) < 0.0 {
                node.children[1]
            } else {
                node.children[0]
            };
        }
        child_leafnum(num)
    }

    pub fn point_solid(&self, p: &Vec3) -> bool {
        self.leaves[self.point_leaf(p)].solid
    }

    // ============================================================
    // Box leaf enumeration
    // ============================================================

    /// Append every leaf touched by the box to `list`.
    pub fn box_leaves(&self, mins: &Vec3, maxs: &Vec3, list: &mut Vec<usize>) {
        self.box_leaves_r(self.root, mins, maxs, list);
    }

    fn box_leaves_r(&self, mut num: i32, mins: &Vec3, maxs: &Vec3, list: &mut Vec<usize>) {
        loop {
            if num < 0 {
                list.push(child_leafnum(num));
                return;
            }
            let node = &self.nodes[num as usize];
            match node.plane.box_side(mins, maxs) {
                1 => num = node.children[0],
                2 => num = node.children[1],
                _ => {
                    self.box_leaves_r(node.children[0], mins, maxs, list);
                    num = node.children[1];
                }
            }
        }
    }
}

// ============================================================
// Box tree construction
// ============================================================

struct BoxTreeBuilder<'a> {
    boxes: &'a [(Vec3, Vec3)],
    nodes: Vec<BspNode>,
    leaves: Vec<BspLeaf>,
    bevels: Vec<Plane>,
    zones: i32,
}

impl BoxTreeBuilder<'_> {
    fn face_plane(&self, b: usize, face: usize) -> Plane {
        let (mins, maxs) = &self.boxes[b];
        let axis = face / 2;
        let mut normal = [0.0f32; 3];
        if face & 1 == 0 {
            normal[axis] = 1.0;
            Plane::new(normal, maxs[axis])
        } else {
            normal[axis] = -1.0;
            Plane::new(normal, -mins[axis])
        }
    }

    fn build(&mut self, boxes: &[usize]) -> i32 {
        if boxes.is_empty() {
            let num = self.leaves.len();
            self.leaves.push(BspLeaf {
                solid: false,
                zone: self.zones,
                ..BspLeaf::default()
            });
            self.zones += 1;
            return leaf_child(num);
        }
        self.build_chain(boxes, 0)
    }

    /// Carve `boxes[0]` out face by face. Whatever lies in front of a face is built
    /// without it; the back side continues with the next face.
    fn build_chain(&mut self, boxes: &[usize], face: usize) -> i32 {
        let current = boxes[0];
        if face == 6 {
            let first_bevel = self.bevels.len() as u32;
            for f in 0..6 {
                let plane = self.face_plane(current, f);
                self.bevels.push(plane);
            }
            let num = self.leaves.len();
            self.leaves.push(BspLeaf {
                solid: true,
                zone: -1,
                first_bevel,
                num_bevels: 6,
                portal_exits: PortalExits::empty(),
            });
            return leaf_child(num);
        }

        let plane = self.face_plane(current, face);
        let front: Vec<usize> = boxes[1..]
            .iter()
            .copied()
            .filter(|&b| plane.box_side(&self.boxes[b].0, &self.boxes[b].1) & 1 != 0)
            .collect();
        let back: Vec<usize> = boxes
            .iter()
            .copied()
            .filter(|&b| b == current || plane.box_side(&self.boxes[b].0, &self.boxes[b].1) & 2 != 0)
            .collect();

        let num = self.nodes.len();
        self.nodes.push(BspNode {
            plane,
            children: [0, 0],
        });
        let front_child = self.build(&front);
        let back_child = self.build_chain(&back, face + 1);
        self.nodes[num].children = [front_child, back_child];
        num as i32
    }
}

// ============================================================
// Tests
// ============================================================
