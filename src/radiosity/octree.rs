// Copyright @yucwang 2026

//! Sparse octree over world space, addressed by integer cell ids.
//!
//! A cell with id `(x, y, z, size)` has edge length `2^(size - 127)` and its
//! lower corner at `(x, y, z) * edge - OT_BIAS`. Blocks are filed at the cell
//! whose extended region (the cell grown by half an edge on every side) holds
//! the block's sphere of influence, so a lookup only has to visit cells whose
//! extended region contains the query point.

use std::sync::{PoisonError, RwLock};

use crate::math::constants::{Float, Vector3f};

use super::block::SampleBlock;

/// Added to every coordinate so that cell ids stay non-negative in practice.
pub const OT_BIAS: Float = 1.0e7;

const SIZE_UNIT: i32 = 127;
// Keeps ids within i32 range.
const MAX_ORDINATE: Float = 1.0e9;
const MAX_SIZE: i32 = SIZE_UNIT + 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub size: i32,
}

impl BlockId {
    pub fn new(x: i32, y: i32, z: i32, size: i32) -> Self {
        Self { x, y, z, size }
    }

    pub fn edge(&self) -> Float {
        (2.0 as Float).powi(self.size - SIZE_UNIT)
    }

    /// `(0:1)` and `(-1:0)` share a parent, so that any two ids eventually
    /// meet at a common ancestor.
    pub fn parent(&self) -> BlockId {
        let halve = |c: i32| if c >= 0 { c >> 1 } else { (c + 1) / 2 };
        BlockId {
            x: halve(self.x),
            y: halve(self.y),
            z: halve(self.z),
            size: self.size + 1,
        }
    }

    pub fn ancestor(&self, size: i32) -> BlockId {
        let mut id = *self;
        while id.size < size {
            id = id.parent();
        }
        id
    }

    /// Slot of this cell in its parent's kid array.
    pub fn kid_index(&self) -> usize {
        (((self.x & 1) * 4) + ((self.y & 1) * 2) + (self.z & 1)) as usize
    }

    /// Whether `point` lies in the extended region of this cell.
    pub fn contains_point(&self, point: &Vector3f) -> bool {
        let edge = self.edge();
        (point.x + OT_BIAS - (self.x as Float + 0.5) * edge).abs() < edge
            && (point.y + OT_BIAS - (self.y as Float + 0.5) * edge).abs() < edge
            && (point.z + OT_BIAS - (self.z as Float + 0.5) * edge).abs() < edge
    }

    pub fn index_sphere(point: &Vector3f, radius: Float) -> BlockId {
        let r = Vector3f::repeat(radius);
        BlockId::index_box(&(point - r), &(point + r))
    }

    /// Smallest cell whose extended region holds the box `[min, max]`.
    pub fn index_box(min: &Vector3f, max: &Vector3f) -> BlockId {
        let extent = max - min;
        let desired = extent.x.max(extent.y).max(extent.z);
        let (mut edge, mut size) = floor_pow2(desired);

        let max_ord = min.x.abs().max(min.y.abs()).max(min.z.abs()) + OT_BIAS;
        while max_ord / edge > MAX_ORDINATE && size < MAX_SIZE {
            edge *= 2.0;
            size += 1;
        }

        let center = (min + max) * 0.5;
        let mut id = BlockId {
            x: ((center.x + OT_BIAS) / edge).floor() as i32,
            y: ((center.y + OT_BIAS) / edge).floor() as i32,
            z: ((center.z + OT_BIAS) / edge).floor() as i32,
            size,
        };

        while (!id.contains_point(min) || !id.contains_point(max)) && id.size < MAX_SIZE {
            id = id.parent();
        }
        id
    }
}

// Largest power of two not above `value`, with its size code. Degenerate
// extents get a unit cell.
fn floor_pow2(value: Float) -> (Float, i32) {
    if !(value > 0.0) || !value.is_finite() {
        return (1.0, SIZE_UNIT);
    }
    let mut exp = value.log2().floor() as i32;
    exp = exp.clamp(-(SIZE_UNIT - 1), MAX_SIZE - SIZE_UNIT);
    let mut edge = (2.0 as Float).powi(exp);
    if edge > value {
        exp -= 1;
        edge *= 0.5;
    } else if edge * 2.0 <= value {
        exp += 1;
        edge *= 2.0;
    }
    (edge, exp + SIZE_UNIT)
}

struct OctreeNode {
    id: BlockId,
    kids: [Option<usize>; 8],
    blocks: RwLock<Vec<SampleBlock>>,
}

impl OctreeNode {
    fn new(id: BlockId) -> Self {
        Self { id, kids: [None; 8], blocks: RwLock::new(Vec::new()) }
    }
}

#[derive(Default)]
struct Arena {
    nodes: Vec<OctreeNode>,
    root: Option<usize>,
}

impl Arena {
    fn find(&self, id: BlockId) -> Option<usize> {
        let root = self.root?;
        let root_id = self.nodes[root].id;
        if root_id.size < id.size || id.ancestor(root_id.size) != root_id {
            return None;
        }

        let mut node = root;
        while self.nodes[node].id.size > id.size {
            let kid = id.ancestor(self.nodes[node].id.size - 1);
            node = self.nodes[node].kids[kid.kid_index()]?;
        }
        Some(node)
    }

    fn push(&mut self, node: OctreeNode) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn grow_root(&mut self, old_root: usize) -> usize {
        let old_id = self.nodes[old_root].id;
        let mut node = OctreeNode::new(old_id.parent());
        node.kids[old_id.kid_index()] = Some(old_root);
        let index = self.push(node);
        self.root = Some(index);
        index
    }

    // Grows the tree upwards until it covers `id`, then downwards to it.
    fn create(&mut self, id: BlockId, created: &mut u64) -> usize {
        let mut root = match self.root {
            Some(root) => root,
            None => {
                let index = self.push(OctreeNode::new(id));
                self.root = Some(index);
                *created += 1;
                return index;
            }
        };

        while self.nodes[root].id.size < id.size {
            root = self.grow_root(root);
            *created += 1;
        }

        let mut cursor = id.ancestor(self.nodes[root].id.size);
        while cursor != self.nodes[root].id {
            root = self.grow_root(root);
            cursor = cursor.parent();
            *created += 1;
        }

        let mut node = root;
        while self.nodes[node].id.size > id.size {
            let kid_id = id.ancestor(self.nodes[node].id.size - 1);
            let slot = kid_id.kid_index();
            node = match self.nodes[node].kids[slot] {
                Some(kid) => kid,
                None => {
                    let kid = self.push(OctreeNode::new(kid_id));
                    self.nodes[node].kids[slot] = Some(kid);
                    *created += 1;
                    kid
                }
            };
        }
        node
    }
}

/// Nodes are never removed, so an index handed out once stays valid for the
/// lifetime of the tree. The arena lock is taken for writing only to create
/// nodes; block lists have their own locks.
#[derive(Default)]
pub struct Octree {
    arena: RwLock<Arena>,
}

impl Octree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Files `block` at the node `id`, creating nodes as needed. Returns the
    /// number of nodes created.
    pub fn insert(&self, id: BlockId, block: SampleBlock) -> u64 {
        let mut created = 0;

        let found = self.arena.read().unwrap_or_else(PoisonError::into_inner).find(id);
        let index = match found {
            Some(index) => index,
            None => {
                let mut arena = self.arena.write().unwrap_or_else(PoisonError::into_inner);
                // Another thread may have created it while we waited.
                match arena.find(id) {
                    Some(index) => index,
                    None => arena.create(id, &mut created),
                }
            }
        };

        let arena = self.arena.read().unwrap_or_else(PoisonError::into_inner);
        arena.nodes[index].blocks.write().unwrap_or_else(PoisonError::into_inner).push(block);
        created
    }

    /// Calls `f` for every block of the given bounce depth filed at a node
    /// whose extended region contains `point`; kids are visited before their
    /// parent, newer blocks before older ones.
    pub fn dist_traverse<F>(&self, point: &Vector3f, bounce_depth: u8, f: &mut F)
        where F: FnMut(&SampleBlock) {
        let arena = self.arena.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(root) = arena.root {
            dist_traverse_node(&arena, root, point, bounce_depth, f);
        }
    }

    /// Calls `f` for every block in the tree, kids first.
    pub fn traverse_all<F>(&self, f: &mut F) where F: FnMut(&SampleBlock) {
        let arena = self.arena.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(root) = arena.root {
            traverse_node(&arena, root, f);
        }
    }

    pub fn node_count(&self) -> usize {
        self.arena.read().unwrap_or_else(PoisonError::into_inner).nodes.len()
    }

    pub fn root_id(&self) -> Option<BlockId> {
        let arena = self.arena.read().unwrap_or_else(PoisonError::into_inner);
        arena.root.map(|root| arena.nodes[root].id)
    }
}

fn dist_traverse_node<F>(arena: &Arena, node: usize, point: &Vector3f, bounce_depth: u8, f: &mut F)
    where F: FnMut(&SampleBlock) {
    let this = &arena.nodes[node];
    for kid in this.kids.iter().flatten() {
        if arena.nodes[*kid].id.contains_point(point) {
            dist_traverse_node(arena, *kid, point, bounce_depth, f);
        }
    }

    let blocks = this.blocks.read().unwrap_or_else(PoisonError::into_inner);
    for block in blocks.iter().rev() {
        if block.bounce_depth == bounce_depth {
            f(block);
        }
    }
}

fn traverse_node<F>(arena: &Arena, node: usize, f: &mut F) where F: FnMut(&SampleBlock) {
    let this = &arena.nodes[node];
    for kid in this.kids.iter().flatten() {
        traverse_node(arena, *kid, f);
    }

    let blocks = this.blocks.read().unwrap_or_else(PoisonError::into_inner);
    for block in blocks.iter().rev() {
        f(block);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::spectrum::RGBSpectrum;

    fn block_at(point: Vector3f, depth: u8) -> SampleBlock {
        let mut block = SampleBlock::new(point, Vector3f::new(0.0, 1.0, 0.0), RGBSpectrum::splat(0.5), 1.0);
        block.bounce_depth = depth;
        block
    }

    fn collect(tree: &Octree, point: &Vector3f, depth: u8) -> Vec<Vector3f> {
        let mut found = Vec::new();
        tree.dist_traverse(point, depth, &mut |b: &SampleBlock| found.push(b.point));
        found
    }

    #[test]
    fn test_block_id_edge_and_parent() {
        assert_eq!(BlockId::new(0, 0, 0, 127).edge(), 1.0);
        assert_eq!(BlockId::new(0, 0, 0, 125).edge(), 0.25);

        let parent = BlockId::new(3, 4, -3, 10).parent();
        assert_eq!(parent, BlockId::new(1, 2, -1, 11));
        // -1 and 0 meet at the same parent.
        assert_eq!(BlockId::new(-1, 0, 1, 5).parent(), BlockId::new(0, 0, 0, 6));
        assert_eq!(BlockId::new(1, 0, 1, 5).kid_index(), 5);
    }

    #[test]
    fn test_index_sphere_fits_with_overhang() {
        let point = Vector3f::new(0.49, 0.49, 0.49);
        let id = BlockId::index_sphere(&point, 1.0);
        assert_eq!(id.size, 128);
        assert_eq!(id.x, 5_000_000);
        assert!(id.contains_point(&Vector3f::new(-0.51, -0.51, -0.51)));
        assert!(id.contains_point(&Vector3f::new(1.49, 1.49, 1.49)));

        for (p, r) in [(Vector3f::new(-3.2, 7.5, 0.01), 0.03),
                       (Vector3f::new(1234.5, -0.5, 88.0), 17.0),
                       (Vector3f::new(0.0, 0.0, 0.0), 0.0)] {
            let id = BlockId::index_sphere(&p, r);
            assert!(id.contains_point(&(p - Vector3f::repeat(r))));
            assert!(id.contains_point(&(p + Vector3f::repeat(r))));
        }
    }

    #[test]
    fn test_insert_and_lookup_by_depth() {
        let tree = Octree::new();
        let p = Vector3f::new(1.0, 2.0, 3.0);
        tree.insert(BlockId::index_sphere(&p, 0.5), block_at(p, 0));
        tree.insert(BlockId::index_sphere(&p, 0.5), block_at(p, 1));

        assert_eq!(collect(&tree, &p, 0), vec![p]);
        assert_eq!(collect(&tree, &p, 1), vec![p]);
        assert!(collect(&tree, &p, 2).is_empty());
    }

    #[test]
    fn test_growth_keeps_existing_blocks() {
        let tree = Octree::new();
        let near = Vector3f::new(0.1, 0.0, 0.0);
        let created = tree.insert(BlockId::index_sphere(&near, 0.01), block_at(near, 0));
        assert_eq!(created, 1);
        let first_root = tree.root_id().expect("root after first insert");

        let far = Vector3f::new(5.0e4, -3.0e3, 10.0);
        let far_id = BlockId::index_sphere(&far, 0.01);
        let created = tree.insert(far_id, block_at(far, 0));
        assert!(created > 1);

        let root = tree.root_id().expect("root after growth");
        assert!(root.size > first_root.size);
        assert_eq!(far_id.ancestor(root.size), root);
        assert_eq!(first_root.ancestor(root.size), root);

        assert_eq!(collect(&tree, &near, 0), vec![near]);
        assert_eq!(collect(&tree, &far, 0), vec![far]);
        assert_eq!(tree.node_count() as u64, 1 + created);
    }

    #[test]
    fn test_traverse_all_visits_every_block() {
        let tree = Octree::new();
        for i in 0..20 {
            let p = Vector3f::new(i as Float * 3.0, (i % 3) as Float, -(i as Float));
            tree.insert(BlockId::index_sphere(&p, 0.1 * (1 + i % 4) as Float), block_at(p, (i % 2) as u8));
        }
        let mut count = 0;
        tree.traverse_all(&mut |_b: &SampleBlock| count += 1);
        assert_eq!(count, 20);
    }
}
