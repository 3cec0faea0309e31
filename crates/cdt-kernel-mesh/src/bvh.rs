//! Bounding Volume Hierarchy for box overlap queries.
//!
//! Uses Surface Area Heuristic (SAH) for construction.

use cdt_kernel_math::{Aabb3, Point3};

/// A BVH node - either a leaf holding items or an internal node with children.
#[derive(Debug, Clone)]
pub enum BvhNode<T> {
    /// Leaf node.
    Leaf {
        /// Bounds of every item in the leaf.
        aabb: Aabb3,
        /// Items with their own boxes.
        items: Vec<(T, Aabb3)>,
    },
    /// Internal node with two children.
    Internal {
        /// Bounds of both children.
        aabb: Aabb3,
        /// Left child node.
        left: Box<BvhNode<T>>,
        /// Right child node.
        right: Box<BvhNode<T>>,
    },
}

impl<T> BvhNode<T> {
    /// Bounds of this node.
    pub fn aabb(&self) -> &Aabb3 {
        match self {
            BvhNode::Leaf { aabb, .. } | BvhNode::Internal { aabb, .. } => aabb,
        }
    }
}

/// Bounding Volume Hierarchy over items keyed by axis-aligned boxes.
///
/// Stands in for an R-tree: build once from `(item, box)` pairs, then run
/// box queries or tree-against-tree overlap queries. Rebuild after edits.
#[derive(Debug, Clone)]
pub struct Bvh<T> {
    root: Option<BvhNode<T>>,
    len: usize,
}

impl<T> Default for Bvh<T> {
    fn default() -> Self {
        Self { root: None, len: 0 }
    }
}

impl<T: Copy> Bvh<T> {
    /// Build a tree using SAH construction.
    pub fn build(items: impl IntoIterator<Item = (T, Aabb3)>) -> Self {
        let mut data: Vec<(T, Aabb3, Point3)> = items
            .into_iter()
            .map(|(item, aabb)| (item, aabb, aabb.center()))
            .collect();
        let len = data.len();
        let root = if data.is_empty() {
            None
        } else {
            Some(build_node(&mut data))
        };
        Self { root, len }
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the tree holds no items.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bounds of all items (empty box for an empty tree).
    pub fn bounds(&self) -> Aabb3 {
        self.root
            .as_ref()
            .map_or_else(Aabb3::empty, |r| *r.aabb())
    }

    /// Get a reference to the root node, if any.
    pub fn root(&self) -> Option<&BvhNode<T>> {
        self.root.as_ref()
    }

    /// Items whose boxes overlap `query` (touching counts).
    pub fn query(&self, query: &Aabb3) -> Vec<T> {
        let mut out = Vec::new();
        if let Some(root) = &self.root {
            query_node(root, query, &mut out);
        }
        out
    }

    /// Every pair `(a, b)` with `a` from this tree and `b` from `other`
    /// whose boxes overlap.
    pub fn overlapping_pairs<U: Copy>(&self, other: &Bvh<U>) -> Vec<(T, U)> {
        let mut out = Vec::new();
        if let (Some(a), Some(b)) = (&self.root, &other.root) {
            pair_nodes(a, b, &mut out);
        }
        out
    }
}

fn query_node<T: Copy>(node: &BvhNode<T>, query: &Aabb3, out: &mut Vec<T>) {
    if !node.aabb().overlaps(query) {
        return;
    }
    match node {
        BvhNode::Leaf { items, .. } => {
            out.extend(items.iter().filter(|(_, b)| b.overlaps(query)).map(|(t, _)| *t));
        }
        BvhNode::Internal { left, right, .. } => {
            query_node(left, query, out);
            query_node(right, query, out);
        }
    }
}

fn pair_nodes<T: Copy, U: Copy>(a: &BvhNode<T>, b: &BvhNode<U>, out: &mut Vec<(T, U)>) {
    if !a.aabb().overlaps(b.aabb()) {
        return;
    }
    match (a, b) {
        (BvhNode::Leaf { items: ia, .. }, BvhNode::Leaf { items: ib, .. }) => {
            for (ta, ba) in ia {
                for (tb, bb) in ib {
                    if ba.overlaps(bb) {
                        out.push((*ta, *tb));
                    }
                }
            }
        }
        (BvhNode::Internal { left, right, .. }, BvhNode::Leaf { .. }) => {
            pair_nodes(left, b, out);
            pair_nodes(right, b, out);
        }
        (BvhNode::Leaf { .. }, BvhNode::Internal { left, right, .. }) => {
            pair_nodes(a, left, out);
            pair_nodes(a, right, out);
        }
        (
            BvhNode::Internal {
                aabb: aa,
                left: al,
                right: ar,
            },
            BvhNode::Internal {
                aabb: ab,
                left: bl,
                right: br,
            },
        ) => {
            // Descend the larger box first.
            if aa.surface_area() >= ab.surface_area() {
                pair_nodes(al, b, out);
                pair_nodes(ar, b, out);
            } else {
                pair_nodes(a, bl, out);
                pair_nodes(a, br, out);
            }
        }
    }
}

/// Build a BVH node recursively using SAH.
fn build_node<T: Copy>(data: &mut [(T, Aabb3, Point3)]) -> BvhNode<T> {
    let mut bounds = Aabb3::empty();
    for (_, aabb, _) in data.iter() {
        bounds.include_box(aabb);
    }

    if data.len() <= 4 {
        return BvhNode::Leaf {
            aabb: bounds,
            items: data.iter().map(|(t, b, _)| (*t, *b)).collect(),
        };
    }

    let (best_axis, best_pos) = find_best_split(data, &bounds);
    let mut mid = partition(data, best_axis, best_pos);

    // Fallback if partition fails
    if mid == 0 || mid == data.len() {
        mid = data.len() / 2;
    }

    let (left_data, right_data) = data.split_at_mut(mid);
    BvhNode::Internal {
        aabb: bounds,
        left: Box::new(build_node(left_data)),
        right: Box::new(build_node(right_data)),
    }
}

/// Find the best split axis and position using SAH.
fn find_best_split<T>(data: &[(T, Aabb3, Point3)], bounds: &Aabb3) -> (usize, f64) {
    const NUM_BUCKETS: usize = 12;

    let extent = bounds.max - bounds.min;
    let total_area = bounds.surface_area();

    let mut best_cost = f64::INFINITY;
    let mut best_axis = 0;
    let mut best_pos = 0.0;

    for axis in 0..3 {
        let axis_extent = extent[axis];
        if axis_extent < 1e-10 {
            continue;
        }
        let axis_min = bounds.min[axis];

        let mut bucket_counts = [0usize; NUM_BUCKETS];
        let mut bucket_bounds = [Aabb3::empty(); NUM_BUCKETS];

        for (_, aabb, centroid) in data {
            let b = ((centroid[axis] - axis_min) / axis_extent * NUM_BUCKETS as f64) as usize;
            let b = b.min(NUM_BUCKETS - 1);
            bucket_counts[b] += 1;
            bucket_bounds[b].include_box(aabb);
        }

        for split in 1..NUM_BUCKETS {
            let mut left_count = 0;
            let mut left_bounds = Aabb3::empty();
            for i in 0..split {
                left_count += bucket_counts[i];
                left_bounds.include_box(&bucket_bounds[i]);
            }

            let mut right_count = 0;
            let mut right_bounds = Aabb3::empty();
            for i in split..NUM_BUCKETS {
                right_count += bucket_counts[i];
                right_bounds.include_box(&bucket_bounds[i]);
            }

            if left_count == 0 || right_count == 0 {
                continue;
            }

            // Flat trees (2D boxes at z = 0) have zero area; fall back to counts.
            let cost = if total_area > 0.0 {
                0.125
                    + left_bounds.surface_area() / total_area * left_count as f64
                    + right_bounds.surface_area() / total_area * right_count as f64
            } else {
                (left_count as f64 - right_count as f64).abs()
            };

            if cost < best_cost {
                best_cost = cost;
                best_axis = axis;
                best_pos = axis_min + (split as f64 / NUM_BUCKETS as f64) * axis_extent;
            }
        }
    }

    (best_axis, best_pos)
}

/// Partition items by centroid along an axis.
fn partition<T>(data: &mut [(T, Aabb3, Point3)], axis: usize, pos: f64) -> usize {
    let mut left = 0;
    let mut right = data.len();

    while left < right {
        if data[left].2[axis] < pos {
            left += 1;
        } else {
            right -= 1;
            data.swap(left, right);
        }
    }

    left
}
